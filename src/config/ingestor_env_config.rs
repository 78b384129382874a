//! Instrument and timeframe subscription knobs (§4.1 / §6 "primary TF,
//! supporting TFs, HTF TFs").

use std::env;

use anyhow::{Context, Result};

use crate::domain::engine::timeframe::{HtfTimeframe, Timeframe};

fn parse_timeframe(raw: &str) -> Result<Timeframe> {
    match raw.to_lowercase().as_str() {
        "1m" => Ok(Timeframe::OneMin),
        "5m" => Ok(Timeframe::FiveMin),
        "15m" => Ok(Timeframe::FifteenMin),
        "1h" => Ok(Timeframe::OneHour),
        "4h" => Ok(Timeframe::FourHour),
        "1d" => Ok(Timeframe::OneDay),
        "1w" => Ok(Timeframe::OneWeek),
        other => anyhow::bail!("Invalid timeframe '{}': expected one of 1m,5m,15m,1h,4h,1d,1w", other),
    }
}

fn parse_htf_timeframe(raw: &str) -> Result<HtfTimeframe> {
    match parse_timeframe(raw)? {
        Timeframe::FourHour => Ok(HtfTimeframe::FourHour),
        Timeframe::OneDay => Ok(HtfTimeframe::OneDay),
        Timeframe::OneWeek => Ok(HtfTimeframe::OneWeek),
        other => anyhow::bail!("'{}' is not a higher timeframe", other),
    }
}

/// One instrument and its timeframe subscriptions, parsed from a single
/// `INSTRUMENTS` entry of the form `SYMBOL:primary:supporting,...`.
#[derive(Debug, Clone)]
pub struct IngestorEnvConfig {
    pub instrument: String,
    pub primary: Timeframe,
    pub supporting: Vec<Timeframe>,
    pub htf: Vec<HtfTimeframe>,
}

impl IngestorEnvConfig {
    /// `INSTRUMENTS` is a `;`-separated list of `SYMBOL:primary:supporting1,supporting2`
    /// entries, e.g. `BTC-USD:15m:5m,1h`. HTF subscriptions are always
    /// the full 4h/1d/1w set (§4.2 covers all three unconditionally).
    /// Defaults to a single `BTC-USD:15m:5m,1h` instrument when unset,
    /// matching §4's stated example.
    pub fn from_env() -> Result<Vec<Self>> {
        let raw = env::var("INSTRUMENTS").unwrap_or_else(|_| "BTC-USD:15m:5m,1h".to_string());
        raw.split(';')
            .filter(|entry| !entry.trim().is_empty())
            .map(Self::parse_entry)
            .collect()
    }

    fn parse_entry(entry: &str) -> Result<Self> {
        let mut parts = entry.trim().split(':');
        let instrument = parts
            .next()
            .filter(|s| !s.is_empty())
            .with_context(|| format!("INSTRUMENTS entry '{}' is missing a symbol", entry))?
            .to_string();
        let primary_raw = parts
            .next()
            .with_context(|| format!("INSTRUMENTS entry '{}' is missing a primary timeframe", entry))?;
        let primary = parse_timeframe(primary_raw)
            .with_context(|| format!("INSTRUMENTS entry '{}'", entry))?;
        let supporting = match parts.next() {
            Some(s) if !s.is_empty() => s
                .split(',')
                .map(parse_timeframe)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("INSTRUMENTS entry '{}'", entry))?,
            _ => Vec::new(),
        };
        let htf = HtfTimeframe::all()
            .into_iter()
            .map(|h| parse_htf_timeframe(&h.as_timeframe().to_string()).unwrap())
            .collect();
        Ok(Self { instrument, primary, supporting, htf })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_default_style_entry() {
        let parsed = IngestorEnvConfig::parse_entry("BTC-USD:15m:5m,1h").unwrap();
        assert_eq!(parsed.instrument, "BTC-USD");
        assert!(matches!(parsed.primary, Timeframe::FifteenMin));
        assert_eq!(parsed.supporting.len(), 2);
        assert_eq!(parsed.htf.len(), 3);
    }

    #[test]
    fn rejects_an_unknown_timeframe_token() {
        assert!(IngestorEnvConfig::parse_entry("BTC-USD:3m:").is_err());
    }
}
