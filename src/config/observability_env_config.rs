//! Metrics reporter knobs (§A.2 periodic counter push).

use std::env;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub metrics_interval_seconds: u64,
}

impl ObservabilityEnvConfig {
    pub fn from_env() -> Result<Self> {
        let metrics_interval_seconds: u64 = match env::var("METRICS_REPORT_INTERVAL_SECONDS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("METRICS_REPORT_INTERVAL_SECONDS = '{}'", raw))?,
            Err(_) => 60,
        };
        Ok(Self { metrics_interval_seconds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_a_one_minute_interval() {
        let config = ObservabilityEnvConfig::from_env().unwrap();
        assert_eq!(config.metrics_interval_seconds, 60);
    }
}
