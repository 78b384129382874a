//! Headless entry point for the signal generation, validation and
//! execution pipeline. No UI, no HTTP server: structured logs to
//! stdout are the only observability surface.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use rust_decimal_macros::dec;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

use rustrade::application::engine::broadcast::{BroadcastConfig, BroadcastValidator};
use rustrade::application::engine::composer::{ComposerConfig, SignalComposer};
use rustrade::application::engine::executor::{Executor, ExecutorConfig, Monitor};
use rustrade::application::engine::htf_context::HtfContextProvider;
use rustrade::application::engine::observability::{MetricsReporter, PipelineMetrics};
use rustrade::application::engine::oracle_pool::OraclePool;
use rustrade::application::engine::system::{InstrumentSpec, Pipeline};
use rustrade::config::PipelineConfig;
use rustrade::domain::engine::agent::Agent;
use rustrade::infrastructure::engine_mock::MockCollaborators;

fn seed_agents() -> Vec<Agent> {
    vec![Agent {
        id: "agent-1".to_string(),
        is_active: true,
        category: "default".to_string(),
        risk_level: 2,
        budget: dec!(10_000),
        allowed_categories: None,
        min_confidence: 50.0,
        max_open_positions: 5,
        enable_expensive_validation: true,
        broker: "mock".to_string(),
    }]
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("signal pipeline {} starting...", env!("CARGO_PKG_VERSION"));

    let config = PipelineConfig::from_env()?;
    info!("configuration loaded: {} instrument(s)", config.instruments.len());

    let collaborators = MockCollaborators::new(seed_agents());

    let oracle_pool = Arc::new(OraclePool::new());
    let htf_provider = Arc::new(HtfContextProvider::new());

    let composer = Arc::new(SignalComposer::new(
        oracle_pool.clone(),
        htf_provider.clone(),
        ComposerConfig {
            min_signal_interval: config.composer.min_signal_interval,
            inversion_threshold: config.composer.inversion_threshold,
            confidence_floor: config.composer.confidence_floor,
        },
    ));

    let broadcast = Arc::new(BroadcastValidator::new(
        collaborators.catalog.clone(),
        collaborators.broker.clone(),
        collaborators.admissibility.clone(),
        collaborators.validation_oracle.clone(),
        collaborators.performance.clone(),
        collaborators.notifications.clone(),
        collaborators.audit.clone(),
        collaborators.queue.clone(),
        BroadcastConfig { minimum_balance: config.broadcast.minimum_balance },
    ));

    let monitor = Arc::new(Monitor::new(
        oracle_pool.clone(),
        collaborators.broker.clone(),
        collaborators.catalog.clone(),
        collaborators.positions.clone(),
        collaborators.notifications.clone(),
    ));

    let executor = Arc::new(Executor::new(
        collaborators.queue.clone(),
        collaborators.catalog.clone(),
        collaborators.admissibility.clone(),
        collaborators.broker.clone(),
        collaborators.positions.clone(),
        collaborators.notifications.clone(),
        collaborators.audit.clone(),
        monitor.clone(),
        ExecutorConfig { worker_count: config.executor.worker_count },
    ));

    let specs = config
        .instruments
        .iter()
        .map(|i| InstrumentSpec {
            instrument: i.instrument.clone(),
            primary: i.primary,
            supporting: i.supporting.clone(),
            htf: i.htf.clone(),
        })
        .collect();

    let metrics = Arc::new(PipelineMetrics::new());

    let pipeline = Arc::new(Pipeline::new(
        collaborators.transport.clone(),
        oracle_pool,
        htf_provider,
        composer,
        broadcast,
        executor,
        monitor.clone(),
        collaborators.audit.clone(),
        specs,
        metrics.clone(),
    ));

    let reporter_cancel = Arc::new(tokio::sync::Notify::new());
    let reporter = MetricsReporter::new(
        metrics,
        collaborators.queue.clone(),
        monitor,
        Duration::from_secs(config.observability.metrics_interval_seconds),
    );
    tokio::spawn(reporter.run(reporter_cancel.clone()));

    pipeline.start(Utc::now()).await;
    info!("pipeline running. press Ctrl+C to shut down.");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping pipeline...");
    pipeline.stop();
    reporter_cancel.notify_waiters();

    Ok(())
}
