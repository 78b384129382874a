//! Composer knobs (§4.3 / §6 "minimum inter-signal interval, confidence
//! floor").

use std::env;

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;

#[derive(Debug, Clone)]
pub struct ComposerEnvConfig {
    pub min_signal_interval: ChronoDuration,
    pub inversion_threshold: f64,
    pub confidence_floor: f64,
}

impl ComposerEnvConfig {
    pub fn from_env() -> Result<Self> {
        let min_signal_interval_secs: i64 = parse_env("MIN_SIGNAL_INTERVAL_SECS", 60)?;
        let inversion_threshold: f64 = parse_env("HTF_INVERSION_THRESHOLD", 55.0)?;
        let confidence_floor: f64 = parse_env("CONFIDENCE_FLOOR", 50.0)?;
        Ok(Self {
            min_signal_interval: ChronoDuration::seconds(min_signal_interval_secs),
            inversion_threshold,
            confidence_floor,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|e| anyhow::anyhow!("{} = '{}': {}", key, raw, e)),
        Err(_) => Ok(default),
    }
    .with_context(|| format!("parsing {}", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_composer_defaults() {
        let config = ComposerEnvConfig::from_env().unwrap();
        assert_eq!(config.min_signal_interval, ChronoDuration::seconds(60));
        assert_eq!(config.inversion_threshold, 55.0);
        assert_eq!(config.confidence_floor, 50.0);
    }
}
