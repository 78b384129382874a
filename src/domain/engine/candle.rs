use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::timeframe::Timeframe;

/// A finalized OHLCV bar for one `(instrument, timeframe)`. Immutable
/// once constructed — the ingestor never mutates a `Candle` in place,
/// it replaces the tail entry on duplicate `open_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub is_final: bool,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// Fraction of the move accounted for by the body, used by
    /// reversal/liquidity-sweep heuristics. Returns 0 for a zero-range bar.
    pub fn body_ratio(&self) -> f64 {
        let range = self.range();
        if range <= Decimal::ZERO {
            return 0.0;
        }
        (self.body() / range).to_f64().unwrap_or(0.0)
    }
}

/// An inbound candle event as delivered by the market-data transport,
/// before it has been validated against the window invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleEvent {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub is_final: bool,
}

impl From<CandleEvent> for Candle {
    fn from(e: CandleEvent) -> Self {
        Self {
            instrument: e.instrument,
            timeframe: e.timeframe,
            open_time: e.open_time,
            close_time: e.close_time,
            open: e.open,
            high: e.high,
            low: e.low,
            close: e.close,
            volume: e.volume,
            is_final: e.is_final,
        }
    }
}
