//! Configuration for the signal generation, validation and execution
//! pipeline.
//!
//! Structured loading from environment variables, organized by the
//! component each knob belongs to: Ingestor, Composer, HTF Context,
//! Broadcast, Executor and the metrics reporter. Each sub-module owns
//! a `from_env()`; `PipelineConfig::from_env()` aggregates all of them
//! into one value with sane defaults matching the pipeline's stated
//! constants.

mod broadcast_env_config;
mod composer_env_config;
mod executor_env_config;
mod htf_env_config;
mod ingestor_env_config;
mod observability_env_config;

pub use broadcast_env_config::BroadcastEnvConfig;
pub use composer_env_config::ComposerEnvConfig;
pub use executor_env_config::ExecutorEnvConfig;
pub use htf_env_config::HtfEnvConfig;
pub use ingestor_env_config::IngestorEnvConfig;
pub use observability_env_config::ObservabilityEnvConfig;

use anyhow::{Context, Result};

/// Aggregates every static knob the pipeline exposes (§6 "CLI/config
/// surface"): instrument/timeframe subscriptions plus the Composer,
/// HTF Context, Broadcast and Executor tunables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub instruments: Vec<IngestorEnvConfig>,
    pub composer: ComposerEnvConfig,
    pub htf: HtfEnvConfig,
    pub broadcast: BroadcastEnvConfig,
    pub executor: ExecutorEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            instruments: IngestorEnvConfig::from_env().context("loading INSTRUMENTS")?,
            composer: ComposerEnvConfig::from_env().context("loading composer configuration")?,
            htf: HtfEnvConfig::from_env().context("loading HTF context configuration")?,
            broadcast: BroadcastEnvConfig::from_env().context("loading broadcast configuration")?,
            executor: ExecutorEnvConfig::from_env().context("loading executor configuration")?,
            observability: ObservabilityEnvConfig::from_env().context("loading observability configuration")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_with_no_environment_overrides() {
        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.instruments.len(), 1);
        assert_eq!(config.executor.worker_count, 4);
    }
}
