use serde::{Deserialize, Serialize};
use std::fmt;

/// A candle cadence the pipeline can subscribe to. Kept separate from
/// `domain::market::timeframe::Timeframe` (which only covers intraday
/// strategy cadences) because the pipeline also needs the weekly bar
/// for HTF structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    FiveMin,
    FifteenMin,
    OneHour,
    FourHour,
    OneDay,
    OneWeek,
}

impl Timeframe {
    pub fn to_minutes(self) -> i64 {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::OneDay => 1440,
            Timeframe::OneWeek => 10080,
        }
    }

    pub fn to_seconds(self) -> i64 {
        self.to_minutes() * 60
    }

    /// True for the three higher timeframes HTF Context derives structure from.
    pub fn is_htf(self) -> bool {
        matches!(self, Timeframe::FourHour | Timeframe::OneDay | Timeframe::OneWeek)
    }

    pub fn to_binance_string(self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::FiveMin => "5m",
            Timeframe::FifteenMin => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "1w",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_string())
    }
}

/// The three timeframes HTF Context maintains structure for, narrowed
/// from the general `Timeframe` so level-construction code cannot be
/// handed an intraday cadence by mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HtfTimeframe {
    FourHour,
    OneDay,
    OneWeek,
}

impl HtfTimeframe {
    pub fn as_timeframe(self) -> Timeframe {
        match self {
            HtfTimeframe::FourHour => Timeframe::FourHour,
            HtfTimeframe::OneDay => Timeframe::OneDay,
            HtfTimeframe::OneWeek => Timeframe::OneWeek,
        }
    }

    /// Swing-high/low lookback depth per §4.2.
    pub fn swing_lookback(self) -> usize {
        match self {
            HtfTimeframe::FourHour => 8,
            HtfTimeframe::OneDay => 5,
            HtfTimeframe::OneWeek => 3,
        }
    }

    /// Higher timeframes outrank lower ones in dedup tie-breaks.
    pub fn rank(self) -> u8 {
        match self {
            HtfTimeframe::OneWeek => 3,
            HtfTimeframe::OneDay => 2,
            HtfTimeframe::FourHour => 1,
        }
    }

    pub fn all() -> [HtfTimeframe; 3] {
        [HtfTimeframe::FourHour, HtfTimeframe::OneDay, HtfTimeframe::OneWeek]
    }
}

impl fmt::Display for HtfTimeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_timeframe())
    }
}
