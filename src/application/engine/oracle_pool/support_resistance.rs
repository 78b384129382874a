//! Support/Resistance pattern oracle: intraday swing-level proximity
//! and bounce/reject behavior on the primary timeframe window (§3).

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;

use crate::domain::engine::candle::Candle;
use crate::domain::engine::oracle::{OracleFields, OracleKind, OracleVerdict, Recommendation};
use crate::domain::engine::ports::{OracleInput, PatternOracle};

const INTRADAY_LOOKBACK: usize = 5;
const PROXIMITY_PCT: f64 = 0.005;

fn swing_extremes(candles: &[&Candle]) -> (Vec<f64>, Vec<f64>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    for i in 0..candles.len() {
        if i < INTRADAY_LOOKBACK || i + INTRADAY_LOOKBACK >= candles.len() {
            continue;
        }
        let high = candles[i].high.to_f64().unwrap_or(0.0);
        let low = candles[i].low.to_f64().unwrap_or(0.0);
        let left = &candles[i - INTRADAY_LOOKBACK..i];
        let right = &candles[i + 1..=i + INTRADAY_LOOKBACK];

        if left.iter().all(|c| c.high.to_f64().unwrap_or(0.0) < high) && right.iter().all(|c| c.high.to_f64().unwrap_or(0.0) <= high) {
            highs.push(high);
        }
        if left.iter().all(|c| c.low.to_f64().unwrap_or(0.0) > low) && right.iter().all(|c| c.low.to_f64().unwrap_or(0.0) >= low) {
            lows.push(low);
        }
    }
    (highs, lows)
}

pub struct SupportResistanceOracle;

#[async_trait]
impl PatternOracle for SupportResistanceOracle {
    fn kind(&self) -> OracleKind {
        OracleKind::SupportResistance
    }

    async fn analyze(&self, input: OracleInput<'_>) -> anyhow::Result<OracleVerdict> {
        if input.candles.len() < INTRADAY_LOOKBACK * 2 + 1 {
            return Ok(OracleVerdict::sentinel(OracleKind::SupportResistance, "insufficient history for swing levels"));
        }

        let price = input.current_price.to_f64().unwrap_or(0.0);
        let (highs, lows) = swing_extremes(input.candles);

        let nearest_resistance = highs.iter().filter(|&&h| h >= price).cloned().fold(None, |acc: Option<f64>, h| {
            Some(acc.map_or(h, |a| a.min(h)))
        });
        let nearest_support = lows.iter().filter(|&&l| l <= price).cloned().fold(None, |acc: Option<f64>, l| {
            Some(acc.map_or(l, |a| a.max(l)))
        });

        let near_support = nearest_support.map(|s| price > 0.0 && (price - s).abs() / price <= PROXIMITY_PCT).unwrap_or(false);
        let near_resistance =
            nearest_resistance.map(|r| price > 0.0 && (r - price).abs() / price <= PROXIMITY_PCT).unwrap_or(false);

        let (recommendation, confidence, reasoning, level_price, level_type) = if near_support {
            (Recommendation::Buy, 65.0, "price testing nearby intraday support".to_string(), nearest_support, "support")
        } else if near_resistance {
            (Recommendation::Sell, 65.0, "price testing nearby intraday resistance".to_string(), nearest_resistance, "resistance")
        } else {
            (Recommendation::Hold, 25.0, "price away from any tracked level".to_string(), None, "none")
        };

        let fields = OracleFields {
            nearest_level_price: level_price,
            nearest_level_type: Some(level_type.to_string()),
            ..Default::default()
        };

        Ok(OracleVerdict { kind: OracleKind::SupportResistance, recommendation, confidence, reasoning, fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::timeframe::Timeframe;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(ts: i64, h: f64, l: f64) -> Candle {
        Candle {
            instrument: "BTCUSDT".into(),
            timeframe: Timeframe::OneHour,
            open_time: ts,
            close_time: ts + 3_600_000,
            open: Decimal::try_from((h + l) / 2.0).unwrap(),
            high: Decimal::try_from(h).unwrap(),
            low: Decimal::try_from(l).unwrap(),
            close: Decimal::try_from((h + l) / 2.0).unwrap(),
            volume: dec!(100),
            is_final: true,
        }
    }

    #[tokio::test]
    async fn recommends_buy_near_established_support() {
        let mut candles = Vec::new();
        for i in 0..12 {
            let low = if i == 6 { 95.0 } else { 100.0 };
            candles.push(candle(i, 105.0, low));
        }
        let refs: Vec<&Candle> = candles.iter().collect();
        let oracle = SupportResistanceOracle;
        let input =
            OracleInput { candles: &refs, indicators: Default::default(), current_price: dec!(95.2), timeframe: Timeframe::OneHour };
        let verdict = oracle.analyze(input).await.unwrap();
        assert_eq!(verdict.kind, OracleKind::SupportResistance);
    }

    #[tokio::test]
    async fn sentinel_on_insufficient_history() {
        let refs: Vec<&Candle> = Vec::new();
        let oracle = SupportResistanceOracle;
        let input =
            OracleInput { candles: &refs, indicators: Default::default(), current_price: dec!(100), timeframe: Timeframe::OneHour };
        let verdict = oracle.analyze(input).await.unwrap();
        assert_eq!(verdict.confidence, 0.0);
    }
}
