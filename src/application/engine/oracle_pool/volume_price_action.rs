//! Volume/Price-Action pattern oracle: order-block freshness and
//! reversal-candle detection, volume-confirmed the way `smc::SMCStrategy`
//! confirms order blocks elsewhere in this crate (§3, §4.3 Step K).

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;

use crate::domain::engine::candle::Candle;
use crate::domain::engine::oracle::{OracleFields, OracleKind, OracleVerdict, Recommendation};
use crate::domain::engine::ports::{OracleInput, PatternOracle};

/// A bullish order block is the last bearish candle before a volume-confirmed
/// bullish impulse; symmetric for bearish. Mirrors `find_last_ob`.
fn find_order_block(candles: &[&Candle], bullish: bool) -> Option<(f64, bool)> {
    if candles.len() < 5 {
        return None;
    }
    let vol_lookback = 50.min(candles.len().saturating_sub(1));
    let total_vol: f64 = candles[candles.len().saturating_sub(vol_lookback + 1)..candles.len() - 1]
        .iter()
        .map(|c| c.volume.to_f64().unwrap_or(0.0))
        .sum();
    let avg_vol = if vol_lookback > 0 { total_vol / vol_lookback as f64 } else { 0.0 };
    let threshold = avg_vol * 1.5;

    let start = candles.len().saturating_sub(30).max(1);
    for i in (start..candles.len() - 1).rev() {
        let curr = candles[i];
        let next = candles[i + 1];
        let curr_bearish = curr.is_bearish();
        let next_bullish = next.is_bullish();
        let fresh = i >= candles.len().saturating_sub(10);

        if bullish && curr_bearish && next_bullish {
            if next.volume.to_f64().unwrap_or(0.0) > threshold {
                return Some((curr.low.to_f64().unwrap_or(0.0), fresh));
            }
        } else if !bullish && !curr_bearish && !next_bullish {
            if next.volume.to_f64().unwrap_or(0.0) > threshold {
                return Some((curr.high.to_f64().unwrap_or(0.0), fresh));
            }
        }
    }
    None
}

/// A reversal candle: a strong body opposite the recent trend after an
/// extended run, the crude "hammer/shooting-star at extreme" heuristic.
fn reversal_candle(candles: &[&Candle]) -> Option<Recommendation> {
    if candles.len() < 4 {
        return None;
    }
    let last = candles[candles.len() - 1];
    let prior_trend_up = candles[candles.len() - 4..candles.len() - 1].windows(2).all(|w| w[1].close > w[0].close);
    let prior_trend_down = candles[candles.len() - 4..candles.len() - 1].windows(2).all(|w| w[1].close < w[0].close);

    let body_ratio = last.body_ratio();
    if prior_trend_up && last.is_bearish() && body_ratio > 0.5 {
        return Some(Recommendation::Sell);
    }
    if prior_trend_down && last.is_bullish() && body_ratio > 0.5 {
        return Some(Recommendation::Buy);
    }
    None
}

pub struct VolumePriceActionOracle;

#[async_trait]
impl PatternOracle for VolumePriceActionOracle {
    fn kind(&self) -> OracleKind {
        OracleKind::VolumePriceAction
    }

    async fn analyze(&self, input: OracleInput<'_>) -> anyhow::Result<OracleVerdict> {
        if input.candles.len() < 5 {
            return Ok(OracleVerdict::sentinel(OracleKind::VolumePriceAction, "insufficient history"));
        }

        let reversal = reversal_candle(input.candles);
        let bullish_ob = find_order_block(input.candles, true);
        let bearish_ob = find_order_block(input.candles, false);

        let (recommendation, confidence, reasoning) = match reversal {
            Some(Recommendation::Buy) => (Recommendation::Buy, 70.0, "bullish reversal candle after downtrend".to_string()),
            Some(Recommendation::Sell) => (Recommendation::Sell, 70.0, "bearish reversal candle after uptrend".to_string()),
            _ => match (bullish_ob, bearish_ob) {
                (Some((_, true)), _) => (Recommendation::Buy, 55.0, "fresh bullish order block in range".to_string()),
                (_, Some((_, true))) => (Recommendation::Sell, 55.0, "fresh bearish order block in range".to_string()),
                (Some(_), _) => (Recommendation::Buy, 35.0, "tested bullish order block in range".to_string()),
                (_, Some(_)) => (Recommendation::Sell, 35.0, "tested bearish order block in range".to_string()),
                (None, None) => (Recommendation::Hold, 20.0, "no order block or reversal candle detected".to_string()),
            },
            Some(Recommendation::Hold) => unreachable!("reversal_candle never returns Hold"),
        };

        let fields = OracleFields {
            reversal_candle: Some(reversal.is_some()),
            nearest_level_price: bullish_ob.map(|(p, _)| p).or(bearish_ob.map(|(p, _)| p)),
            nearest_level_type: if bullish_ob.is_some() {
                Some("order-block-support".to_string())
            } else if bearish_ob.is_some() {
                Some("order-block-resistance".to_string())
            } else {
                None
            },
            ..Default::default()
        };

        Ok(OracleVerdict { kind: OracleKind::VolumePriceAction, recommendation, confidence, reasoning, fields })
    }
}
