use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::oracle::Recommendation;
use super::signal::ComposedSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionLifecycle {
    Opened,
    Monitored,
    Closed,
}

/// Where an open position's origin signal came from, for
/// startup reconstruction (§4.5 "Persistence"). A position recovered
/// without its origin metadata degrades to `HoldingOnly` — only
/// broker-side SL/TP apply, no early-exit voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PositionOrigin {
    Signal(Box<ComposedSignal>),
    HoldingOnly,
}

/// An open position under monitor supervision (§3 "Open position").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub trade_id: String,
    pub agent_id: String,
    pub instrument: String,
    pub side: Recommendation,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub broker_ticket: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub origin: PositionOrigin,
    pub lifecycle: PositionLifecycle,
    pub taken_partial: bool,
}

impl OpenPosition {
    pub fn pnl(&self, current_price: Decimal) -> Decimal {
        match self.side {
            Recommendation::Buy => (current_price - self.entry_price) * self.quantity,
            _ => (self.entry_price - current_price) * self.quantity,
        }
    }

    pub fn pnl_pct(&self, current_price: Decimal) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        if self.entry_price.is_zero() {
            return 0.0;
        }
        let diff = match self.side {
            Recommendation::Buy => current_price - self.entry_price,
            _ => self.entry_price - current_price,
        };
        (diff / self.entry_price).to_f64().unwrap_or(0.0) * 100.0
    }
}

/// Aggregate exit decision from the Monitor's four oracle-derived exit
/// votes (§4.5 "Monitor").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitDecision {
    Hold,
    PartialExit { fraction_bps: u16 },
    FullExit,
}
