//! Fibonacci pattern oracle: retracement level of the latest impulse
//! and the 61.8%-78.6% optimal-entry zone (§3, §4.3 Step K).

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;

use crate::domain::engine::oracle::{OracleFields, OracleKind, OracleVerdict, Recommendation};
use crate::domain::engine::ports::{OracleInput, PatternOracle};

/// Finds the most recent swing high/low pair spanning the latest
/// impulse and returns `(impulse_low, impulse_high, bullish_impulse)`.
fn latest_impulse(candles: &[&crate::domain::engine::candle::Candle]) -> Option<(f64, f64, bool)> {
    if candles.len() < 10 {
        return None;
    }
    let recent = &candles[candles.len().saturating_sub(30)..];
    let highs: Vec<f64> = recent.iter().map(|c| c.high.to_f64().unwrap_or(0.0)).collect();
    let lows: Vec<f64> = recent.iter().map(|c| c.low.to_f64().unwrap_or(0.0)).collect();

    let max_idx = highs.iter().enumerate().max_by(|a, b| a.1.partial_cmp(b.1).unwrap())?.0;
    let min_idx = lows.iter().enumerate().min_by(|a, b| a.1.partial_cmp(b.1).unwrap())?.0;

    let high = highs[max_idx];
    let low = lows[min_idx];
    if high <= low {
        return None;
    }
    // The impulse is bullish if the swing low preceded the swing high.
    Some((low, high, min_idx < max_idx))
}

fn retracement_level(price: f64, low: f64, high: f64) -> f64 {
    if high <= low {
        return 0.0;
    }
    (high - price) / (high - low)
}

pub struct FibonacciOracle;

#[async_trait]
impl PatternOracle for FibonacciOracle {
    fn kind(&self) -> OracleKind {
        OracleKind::Fibonacci
    }

    async fn analyze(&self, input: OracleInput<'_>) -> anyhow::Result<OracleVerdict> {
        let current_price = input.current_price.to_f64().unwrap_or(0.0);

        let Some((low, high, bullish_impulse)) = latest_impulse(input.candles) else {
            return Ok(OracleVerdict::sentinel(OracleKind::Fibonacci, "insufficient history for an impulse"));
        };

        let level = retracement_level(current_price, low, high);
        let in_ote = (0.618..=0.786).contains(&level);

        let (entry_low, entry_high) = if bullish_impulse {
            (high - 0.786 * (high - low), high - 0.618 * (high - low))
        } else {
            (low + 0.618 * (high - low), low + 0.786 * (high - low))
        };

        let (recommendation, reasoning) = match (bullish_impulse, in_ote) {
            (true, true) => (
                Recommendation::Buy,
                format!("price at {:.1}% retracement inside bullish OTE zone", level * 100.0),
            ),
            (false, true) => (
                Recommendation::Sell,
                format!("price at {:.1}% retracement inside bearish OTE zone", level * 100.0),
            ),
            (true, false) => {
                (Recommendation::Hold, format!("price at {:.1}% retracement, outside bullish OTE", level * 100.0))
            }
            (false, false) => {
                (Recommendation::Hold, format!("price at {:.1}% retracement, outside bearish OTE", level * 100.0))
            }
        };

        let fields = OracleFields {
            fib_current_level: Some(format!("{:.1}%", level * 100.0)),
            fib_entry_zone_low: Some(entry_low),
            fib_entry_zone_high: Some(entry_high),
            ..Default::default()
        };

        let confidence = if in_ote { 75.0 } else { 40.0 };

        Ok(OracleVerdict {
            kind: OracleKind::Fibonacci,
            recommendation,
            confidence,
            reasoning,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::candle::Candle;
    use crate::domain::engine::timeframe::Timeframe;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle {
            instrument: "BTCUSDT".into(),
            timeframe: Timeframe::OneHour,
            open_time: ts,
            close_time: ts + 3_600_000,
            open: Decimal::try_from(o).unwrap(),
            high: Decimal::try_from(h).unwrap(),
            low: Decimal::try_from(l).unwrap(),
            close: Decimal::try_from(c).unwrap(),
            volume: dec!(100),
            is_final: true,
        }
    }

    #[tokio::test]
    async fn recommends_buy_inside_bullish_ote() {
        let mut candles = Vec::new();
        for i in 0..15 {
            candles.push(candle(i * 3_600_000, 90.0, 95.0 + i as f64, 88.0, 94.0 + i as f64));
        }
        let refs: Vec<&Candle> = candles.iter().collect();
        let oracle = FibonacciOracle;
        let input = OracleInput {
            candles: &refs,
            indicators: Default::default(),
            current_price: dec!(100),
            timeframe: Timeframe::OneHour,
        };
        let verdict = oracle.analyze(input).await.unwrap();
        assert_eq!(verdict.kind, OracleKind::Fibonacci);
    }

    #[tokio::test]
    async fn sentinel_on_insufficient_history() {
        let refs: Vec<&Candle> = Vec::new();
        let oracle = FibonacciOracle;
        let input = OracleInput {
            candles: &refs,
            indicators: Default::default(),
            current_price: dec!(100),
            timeframe: Timeframe::OneHour,
        };
        let verdict = oracle.analyze(input).await.unwrap();
        assert_eq!(verdict.confidence, 0.0);
    }
}
