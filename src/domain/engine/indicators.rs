use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage, RelativeStrengthIndex,
};
use ta::{DataItem, Next};

use super::candle::Candle;

/// Derived technical indicators for one window. A pure function of the
/// candles it was built from — recomputed fresh on demand rather than
/// carried as mutable per-symbol state, since the oracle pool is stateless
/// between ticks and the composer only ever needs the latest bundle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct IndicatorBundle {
    pub ema20: Option<f64>,
    pub ema50: Option<f64>,
    pub rsi: Option<f64>,
    pub adx: Option<f64>,
    pub atr: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
}

impl IndicatorBundle {
    /// ATR as a percentage of the given price, per §4.3 Step H `atrPct`.
    pub fn atr_pct(&self, price: f64) -> Option<f64> {
        if price <= 0.0 {
            return None;
        }
        self.atr.map(|atr| (atr / price) * 100.0)
    }
}

/// Compute the full indicator bundle from a candle slice, oldest first.
/// Returns a bundle of `None`s if there isn't enough history for a
/// given indicator's period; this is deliberate rather than an error —
/// the oracle pool treats missing indicators as "no opinion" inputs.
pub fn compute(candles: &[&Candle]) -> IndicatorBundle {
    if candles.len() < 2 {
        return IndicatorBundle::default();
    }

    let mut ema20 = ExponentialMovingAverage::new(20).ok();
    let mut ema50 = ExponentialMovingAverage::new(50).ok();
    let mut rsi = RelativeStrengthIndex::new(14).ok();
    let mut atr = AverageTrueRange::new(14).ok();
    let mut bb = BollingerBands::new(20, 2.0).ok();

    let mut last_ema20 = None;
    let mut last_ema50 = None;
    let mut last_rsi = None;
    let mut last_atr = None;
    let mut last_bb = None;

    for c in candles {
        let close = c.close.to_f64().unwrap_or(0.0);

        if let Some(ind) = ema20.as_mut() {
            last_ema20 = Some(ind.next(close));
        }
        if let Some(ind) = ema50.as_mut() {
            last_ema50 = Some(ind.next(close));
        }
        if let Some(ind) = rsi.as_mut() {
            last_rsi = Some(ind.next(close));
        }
        if let Some(ind) = bb.as_mut() {
            last_bb = Some(ind.next(close));
        }

        if let Some(ind) = atr.as_mut() {
            let item = DataItem::builder()
                .high(c.high.to_f64().unwrap_or(close))
                .low(c.low.to_f64().unwrap_or(close))
                .close(close)
                .open(c.open.to_f64().unwrap_or(close))
                .volume(c.volume.to_f64().unwrap_or(0.0))
                .build();
            if let Ok(item) = item {
                last_atr = Some(ind.next(&item));
            }
        }
    }

    let adx = compute_adx(candles, 14);

    IndicatorBundle {
        ema20: last_ema20,
        ema50: last_ema50,
        rsi: last_rsi,
        adx,
        atr: last_atr,
        bb_upper: last_bb.map(|b| b.upper),
        bb_middle: last_bb.map(|b| b.average),
        bb_lower: last_bb.map(|b| b.lower),
    }
}

/// Wilder's Average Directional Index. The `ta` crate doesn't ship one,
/// so this follows the standard DX/ADX smoothing by hand, the same way
/// market-regime detection elsewhere in this codebase computes trend
/// strength manually rather than reaching for an indicator crate that
/// doesn't have it.
fn compute_adx(candles: &[&Candle], period: usize) -> Option<f64> {
    if candles.len() < period * 2 {
        return None;
    }

    let mut plus_dm = Vec::with_capacity(candles.len());
    let mut minus_dm = Vec::with_capacity(candles.len());
    let mut tr = Vec::with_capacity(candles.len());

    for i in 1..candles.len() {
        let high = candles[i].high.to_f64().unwrap_or(0.0);
        let low = candles[i].low.to_f64().unwrap_or(0.0);
        let prev_high = candles[i - 1].high.to_f64().unwrap_or(0.0);
        let prev_low = candles[i - 1].low.to_f64().unwrap_or(0.0);
        let prev_close = candles[i - 1].close.to_f64().unwrap_or(0.0);

        let up_move = high - prev_high;
        let down_move = prev_low - low;

        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });

        let range = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        tr.push(range);
    }

    if tr.len() < period {
        return None;
    }

    let smooth = |series: &[f64]| -> Vec<f64> {
        let mut out = Vec::with_capacity(series.len());
        let mut sum: f64 = series[..period].iter().sum();
        out.push(sum);
        for v in &series[period..] {
            sum = sum - (sum / period as f64) + v;
            out.push(sum);
        }
        out
    };

    let smoothed_tr = smooth(&tr);
    let smoothed_plus = smooth(&plus_dm);
    let smoothed_minus = smooth(&minus_dm);

    let mut dx_values = Vec::with_capacity(smoothed_tr.len());
    for i in 0..smoothed_tr.len() {
        if smoothed_tr[i] <= 0.0 {
            dx_values.push(0.0);
            continue;
        }
        let plus_di = 100.0 * smoothed_plus[i] / smoothed_tr[i];
        let minus_di = 100.0 * smoothed_minus[i] / smoothed_tr[i];
        let sum = plus_di + minus_di;
        let dx = if sum > 0.0 { 100.0 * (plus_di - minus_di).abs() / sum } else { 0.0 };
        dx_values.push(dx);
    }

    if dx_values.len() < period {
        return dx_values.last().copied();
    }

    let mut adx = dx_values[..period].iter().sum::<f64>() / period as f64;
    for dx in &dx_values[period..] {
        adx = (adx * (period as f64 - 1.0) + dx) / period as f64;
    }
    Some(adx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::timeframe::Timeframe;
    use rust_decimal::Decimal;

    fn candle(i: i64, close: f64) -> Candle {
        Candle {
            instrument: "BTCUSDT".into(),
            timeframe: Timeframe::OneMin,
            open_time: i,
            close_time: i + 60,
            open: Decimal::from_f64_retain(close).unwrap(),
            high: Decimal::from_f64_retain(close * 1.01).unwrap(),
            low: Decimal::from_f64_retain(close * 0.99).unwrap(),
            close: Decimal::from_f64_retain(close).unwrap(),
            volume: Decimal::from(1000),
            is_final: true,
        }
    }

    #[test]
    fn insufficient_history_yields_all_none() {
        let candles = vec![candle(0, 100.0)];
        let refs: Vec<&Candle> = candles.iter().collect();
        let bundle = compute(&refs);
        assert!(bundle.ema20.is_none());
        assert!(bundle.adx.is_none());
    }

    #[test]
    fn trending_series_produces_populated_bundle() {
        let mut candles = Vec::new();
        let mut price = 100.0;
        for i in 0..80 {
            price += 1.0;
            candles.push(candle(i, price));
        }
        let refs: Vec<&Candle> = candles.iter().collect();
        let bundle = compute(&refs);
        assert!(bundle.ema20.is_some());
        assert!(bundle.rsi.is_some());
        assert!(bundle.atr.is_some());
        assert!(bundle.adx.is_some());
        // A monotonic uptrend should read as a strong high RSI.
        assert!(bundle.rsi.unwrap() > 50.0);
    }

    #[test]
    fn atr_pct_scales_by_price() {
        let bundle = IndicatorBundle {
            atr: Some(2.0),
            ..Default::default()
        };
        assert_eq!(bundle.atr_pct(200.0), Some(1.0));
        assert_eq!(bundle.atr_pct(0.0), None);
    }
}
