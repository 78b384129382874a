//! Executor & Monitor knobs (§4.5 / §5 "bounded worker pool").

use std::env;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ExecutorEnvConfig {
    pub worker_count: usize,
}

impl ExecutorEnvConfig {
    pub fn from_env() -> Result<Self> {
        let worker_count: usize = match env::var("EXECUTOR_WORKER_COUNT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("EXECUTOR_WORKER_COUNT = '{}'", raw))?,
            Err(_) => 4,
        };
        Ok(Self { worker_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_executor_defaults() {
        let config = ExecutorEnvConfig::from_env().unwrap();
        assert_eq!(config.worker_count, 4);
    }
}
