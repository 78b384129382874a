//! HTF Context knobs (§4.2 / §6 "HTF proximity threshold, HTF lock
//! duration").

use std::env;

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;

#[derive(Debug, Clone)]
pub struct HtfEnvConfig {
    pub critical_proximity_pct: f64,
    pub trend_lock: ChronoDuration,
    pub cache_ttl: ChronoDuration,
}

impl HtfEnvConfig {
    pub fn from_env() -> Result<Self> {
        let critical_proximity_pct: f64 = parse_env("HTF_CRITICAL_PROXIMITY_PCT", 0.009)?;
        let trend_lock_hours: i64 = parse_env("HTF_TREND_LOCK_HOURS", 1)?;
        let cache_ttl_hours: i64 = parse_env("HTF_CACHE_TTL_HOURS", 1)?;
        Ok(Self {
            critical_proximity_pct,
            trend_lock: ChronoDuration::hours(trend_lock_hours),
            cache_ttl: ChronoDuration::hours(cache_ttl_hours),
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
    fn defaults_match_the_htf_context_defaults() {
        let config = HtfEnvConfig::from_env().unwrap();
        assert_eq!(config.critical_proximity_pct, 0.009);
        assert_eq!(config.trend_lock, ChronoDuration::hours(1));
        assert_eq!(config.cache_ttl, ChronoDuration::hours(1));
    }
}
