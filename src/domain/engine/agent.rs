use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::signal::ComposedSignal;

/// A trading agent as the Broadcast & Validator sees it. Owned by the
/// agent catalog; the pipeline only ever reads a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub is_active: bool,
    pub category: String,
    pub risk_level: u8,
    pub budget: Decimal,
    pub allowed_categories: Option<Vec<String>>,
    pub min_confidence: f64,
    pub max_open_positions: usize,
    pub enable_expensive_validation: bool,
    pub broker: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskBand {
    Safe,
    Moderate,
    Risky,
}

impl RiskBand {
    /// Position-size percentage of available balance, per §4.4 step 3.
    pub fn size_percent(self) -> Decimal {
        use rust_decimal_macros::dec;
        match self {
            RiskBand::Safe => dec!(1.00),
            RiskBand::Moderate => dec!(0.70),
            RiskBand::Risky => dec!(0.40),
        }
    }
}

/// A composed signal validated (and possibly re-priced) for one agent,
/// ready for the validated-signal queue. Keyed by `(signal_id, agent_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedSignal {
    pub signal: ComposedSignal,
    pub agent_id: String,
    pub position_size: Decimal,
    pub size_percent: Decimal,
    pub risk_band: RiskBand,
    pub stop_price_override: Option<Decimal>,
    pub target_price_override: Option<Decimal>,
    pub validated_at: DateTime<Utc>,
}

impl ValidatedSignal {
    pub fn key(&self) -> (Uuid, String) {
        (self.signal.id, self.agent_id.clone())
    }

    pub fn priority(&self) -> i64 {
        (self.signal.confidence * 100.0).round() as i64
    }

    pub fn effective_stop(&self) -> Decimal {
        self.stop_price_override.unwrap_or(self.signal.stop)
    }

    pub fn effective_target(&self) -> Decimal {
        self.target_price_override.unwrap_or(self.signal.target)
    }
}
