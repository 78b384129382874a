//! Oracle Pool (§3, §4.3 Step B): the four concrete pattern oracles plus
//! the fan-out-with-timeout dispatch that substitutes a sentinel verdict
//! for any oracle that fails or overruns its deadline.

mod fibonacci;
mod support_resistance;
mod trend_momentum;
mod volume_price_action;

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::domain::engine::candle::Candle;
use crate::domain::engine::indicators::{self, IndicatorBundle};
use crate::domain::engine::oracle::{OracleKind, OracleVerdict, TimeframeAnalysis};
use crate::domain::engine::ports::{OracleInput, PatternOracle};
use crate::domain::engine::timeframe::Timeframe;
use crate::infrastructure::core::{CircuitBreaker, CircuitBreakerError};

pub use fibonacci::FibonacciOracle;
pub use support_resistance::SupportResistanceOracle;
pub use trend_momentum::TrendMomentumOracle;
pub use volume_price_action::VolumePriceActionOracle;

/// Per-call deadline for an oracle invocation (§5 "Cancellation & timeouts").
const ORACLE_TIMEOUT: Duration = Duration::from_secs(30);
/// Consecutive failures/timeouts an individual oracle tolerates before its
/// breaker opens and the panel substitutes sentinels without invoking it.
const ORACLE_BREAKER_FAILURE_THRESHOLD: usize = 5;
const ORACLE_BREAKER_SUCCESS_THRESHOLD: usize = 2;
const ORACLE_BREAKER_COOLDOWN: Duration = Duration::from_secs(120);

/// The fixed four-oracle panel, dispatched concurrently on every request.
/// Each oracle sits behind its own breaker so one consistently misbehaving
/// grader degrades to its sentinel without dragging the other three down.
pub struct OraclePool {
    oracles: [Arc<dyn PatternOracle>; 4],
    breakers: [CircuitBreaker; 4],
}

impl OraclePool {
    pub fn new() -> Self {
        Self {
            oracles: [
                Arc::new(FibonacciOracle) as Arc<dyn PatternOracle>,
                Arc::new(TrendMomentumOracle) as Arc<dyn PatternOracle>,
                Arc::new(VolumePriceActionOracle) as Arc<dyn PatternOracle>,
                Arc::new(SupportResistanceOracle) as Arc<dyn PatternOracle>,
            ],
            breakers: [
                CircuitBreaker::new("oracle-fibonacci", ORACLE_BREAKER_FAILURE_THRESHOLD, ORACLE_BREAKER_SUCCESS_THRESHOLD, ORACLE_BREAKER_COOLDOWN),
                CircuitBreaker::new("oracle-trend-momentum", ORACLE_BREAKER_FAILURE_THRESHOLD, ORACLE_BREAKER_SUCCESS_THRESHOLD, ORACLE_BREAKER_COOLDOWN),
                CircuitBreaker::new("oracle-volume-price-action", ORACLE_BREAKER_FAILURE_THRESHOLD, ORACLE_BREAKER_SUCCESS_THRESHOLD, ORACLE_BREAKER_COOLDOWN),
                CircuitBreaker::new("oracle-support-resistance", ORACLE_BREAKER_FAILURE_THRESHOLD, ORACLE_BREAKER_SUCCESS_THRESHOLD, ORACLE_BREAKER_COOLDOWN),
            ],
        }
    }

    /// Runs all four oracles concurrently against one timeframe's window
    /// and returns the full analysis (verdicts, tally, consensus pattern).
    pub async fn analyze_timeframe(
        &self,
        timeframe: Timeframe,
        candles: &[&Candle],
        current_price: rust_decimal::Decimal,
    ) -> TimeframeAnalysis {
        let indicators = indicators::compute(candles);
        let verdicts = self.run_panel(timeframe, candles, indicators, current_price).await;
        TimeframeAnalysis::new(timeframe, verdicts)
    }

    async fn run_panel(
        &self,
        timeframe: Timeframe,
        candles: &[&Candle],
        indicators: IndicatorBundle,
        current_price: rust_decimal::Decimal,
    ) -> [OracleVerdict; 4] {
        let futures = self.oracles.iter().zip(self.breakers.iter()).map(|(oracle, breaker)| {
            let oracle = oracle.clone();
            let input = OracleInput { candles, indicators, current_price, timeframe };
            async move {
                let kind = oracle.kind();
                let outcome = breaker
                    .call(async {
                        match tokio::time::timeout(ORACLE_TIMEOUT, oracle.analyze(input)).await {
                            Ok(inner) => inner,
                            Err(_) => Err(anyhow::anyhow!("timeout")),
                        }
                    })
                    .await;
                match outcome {
                    Ok(verdict) => verdict,
                    Err(CircuitBreakerError::Inner(e)) => {
                        warn!("oracle {:?} failed, substituting sentinel: {}", kind, e);
                        OracleVerdict::sentinel(kind, format!("error: {e}"))
                    }
                    Err(CircuitBreakerError::Open(_)) => {
                        warn!("oracle {:?} circuit open, substituting sentinel without invoking it", kind);
                        OracleVerdict::sentinel(kind, "circuit open")
                    }
                }
            }
        });

        let results = futures::future::join_all(futures).await;
        // `self.oracles` is a fixed 4-element panel, so this always succeeds.
        results.try_into().unwrap_or_else(|_| OracleKind::all().map(|k| OracleVerdict::sentinel(k, "panel dispatch failure")))
    }
}

impl Default for OraclePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(ts: i64, price: f64) -> Candle {
        Candle {
            instrument: "BTCUSDT".into(),
            timeframe: Timeframe::OneHour,
            open_time: ts,
            close_time: ts + 3_600_000,
            open: rust_decimal::Decimal::try_from(price).unwrap(),
            high: rust_decimal::Decimal::try_from(price * 1.01).unwrap(),
            low: rust_decimal::Decimal::try_from(price * 0.99).unwrap(),
            close: rust_decimal::Decimal::try_from(price).unwrap(),
            volume: dec!(100),
            is_final: true,
        }
    }

    #[tokio::test]
    async fn panel_always_returns_exactly_four_verdicts() {
        let pool = OraclePool::new();
        let mut candles = Vec::new();
        let mut price = 100.0;
        for i in 0..60 {
            price += 0.5;
            candles.push(candle(i, price));
        }
        let refs: Vec<&Candle> = candles.iter().collect();
        let analysis = pool.analyze_timeframe(Timeframe::OneHour, &refs, dec!(130)).await;
        assert_eq!(analysis.verdicts.len(), 4);
    }

    #[tokio::test]
    async fn insufficient_history_yields_all_sentinels() {
        let pool = OraclePool::new();
        let refs: Vec<&Candle> = Vec::new();
        let analysis = pool.analyze_timeframe(Timeframe::OneHour, &refs, dec!(100)).await;
        assert!(analysis.verdicts.iter().all(|v| v.confidence == 0.0));
    }
}
