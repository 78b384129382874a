//! Trend/Momentum pattern oracle: EMA20/EMA50 relationship plus
//! RSI/ADX-derived momentum strength (§3).

use async_trait::async_trait;

use crate::domain::engine::oracle::{OracleFields, OracleKind, OracleVerdict, Recommendation};
use crate::domain::engine::ports::{OracleInput, PatternOracle};

fn momentum_label(rsi: Option<f64>, adx: Option<f64>) -> &'static str {
    match (rsi, adx) {
        (Some(rsi), Some(adx)) if adx >= 25.0 && (rsi >= 60.0 || rsi <= 40.0) => "strong",
        (Some(_), Some(adx)) if adx >= 20.0 => "moderate",
        _ => "weak",
    }
}

pub struct TrendMomentumOracle;

#[async_trait]
impl PatternOracle for TrendMomentumOracle {
    fn kind(&self) -> OracleKind {
        OracleKind::TrendMomentum
    }

    async fn analyze(&self, input: OracleInput<'_>) -> anyhow::Result<OracleVerdict> {
        let bundle = &input.indicators;

        let (Some(ema20), Some(ema50)) = (bundle.ema20, bundle.ema50) else {
            return Ok(OracleVerdict::sentinel(OracleKind::TrendMomentum, "insufficient history for EMA cross"));
        };

        let ema_trend = if ema20 > ema50 { "bullish" } else if ema20 < ema50 { "bearish" } else { "flat" };
        let momentum = momentum_label(bundle.rsi, bundle.adx);

        let recommendation = match ema_trend {
            "bullish" if momentum != "weak" => Recommendation::Buy,
            "bearish" if momentum != "weak" => Recommendation::Sell,
            _ => Recommendation::Hold,
        };

        let confidence = match (ema_trend, momentum) {
            (_, "strong") => 85.0,
            (_, "moderate") => 65.0,
            _ => 30.0,
        };

        let reasoning = format!(
            "EMA20 {} EMA50 ({} trend), momentum {}",
            if ema20 > ema50 { ">" } else { "<=" },
            ema_trend,
            momentum
        );

        let fields = OracleFields {
            ema_trend: Some(ema_trend.to_string()),
            momentum: Some(momentum.to_string()),
            ..Default::default()
        };

        Ok(OracleVerdict { kind: OracleKind::TrendMomentum, recommendation, confidence, reasoning, fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::candle::Candle;
    use crate::domain::engine::indicators::IndicatorBundle;
    use crate::domain::engine::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn strong_bullish_momentum_recommends_buy() {
        let bundle =
            IndicatorBundle { ema20: Some(110.0), ema50: Some(100.0), rsi: Some(65.0), adx: Some(30.0), ..Default::default() };
        let candles: Vec<&Candle> = Vec::new();
        let oracle = TrendMomentumOracle;
        let input = OracleInput { candles: &candles, indicators: bundle, current_price: dec!(110), timeframe: Timeframe::OneHour };
        let verdict = oracle.analyze(input).await.unwrap();
        assert_eq!(verdict.recommendation, Recommendation::Buy);
        assert_eq!(verdict.confidence, 85.0);
    }

    #[tokio::test]
    async fn weak_momentum_holds_despite_ema_cross() {
        let bundle =
            IndicatorBundle { ema20: Some(101.0), ema50: Some(100.0), rsi: Some(50.0), adx: Some(10.0), ..Default::default() };
        let candles: Vec<&Candle> = Vec::new();
        let oracle = TrendMomentumOracle;
        let input = OracleInput { candles: &candles, indicators: bundle, current_price: dec!(101), timeframe: Timeframe::OneHour };
        let verdict = oracle.analyze(input).await.unwrap();
        assert_eq!(verdict.recommendation, Recommendation::Hold);
    }

    #[tokio::test]
    async fn sentinel_when_emas_unavailable() {
        let candles: Vec<&Candle> = Vec::new();
        let oracle = TrendMomentumOracle;
        let input =
            OracleInput { candles: &candles, indicators: IndicatorBundle::default(), current_price: dec!(100), timeframe: Timeframe::OneHour };
        let verdict = oracle.analyze(input).await.unwrap();
        assert_eq!(verdict.confidence, 0.0);
    }
}
