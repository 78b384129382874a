//! Broadcast & Validator knobs (§4.4 / §6 base notional).

use std::env;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
pub struct BroadcastEnvConfig {
    pub minimum_balance: Decimal,
}

impl BroadcastEnvConfig {
    pub fn from_env() -> Result<Self> {
        let minimum_balance = match env::var("MINIMUM_AGENT_BALANCE") {
            Ok(raw) => raw
                .parse::<Decimal>()
                .with_context(|| format!("MINIMUM_AGENT_BALANCE = '{}'", raw))?,
            Err(_) => dec!(10),
        };
        Ok(Self { minimum_balance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_broadcast_validator_defaults() {
        let config = BroadcastEnvConfig::from_env().unwrap();
        assert_eq!(config.minimum_balance, dec!(10));
    }
}
