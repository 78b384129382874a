//! Top-level orchestration (§2, §5): wires the six components together
//! per instrument, dispatches `primary-closed` events through the
//! Composer and Monitor with single-flight-per-instrument coalescing,
//! and owns graceful shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::domain::engine::candle::Candle;
use crate::domain::engine::ports::{AuditLogRepository, MarketDataTransport};
use crate::domain::engine::timeframe::{HtfTimeframe, Timeframe};

use super::broadcast::BroadcastValidator;
use super::composer::{ComposeRequest, ComposerOutcome, SignalComposer};
use super::executor::{Executor, Monitor};
use super::htf_context::HtfContextProvider;
use super::ingestor::{IngestorHandle, MarketDataIngestor, WindowStore};
use super::observability::PipelineMetrics;
use super::oracle_pool::OraclePool;

/// One instrument's timeframe configuration (§6 "CLI/config surface").
#[derive(Debug, Clone)]
pub struct InstrumentSpec {
    pub instrument: String,
    pub primary: Timeframe,
    pub supporting: Vec<Timeframe>,
    pub htf: Vec<HtfTimeframe>,
}

/// The running state for one instrument: its ingestor and the windows it
/// publishes, kept alive for the lifetime of the pipeline.
struct InstrumentRuntime {
    ingestor: Arc<MarketDataIngestor>,
    windows: Arc<WindowStore>,
    spec: InstrumentSpec,
}

/// Owns every component of §2 and drives the event-driven dataflow
/// between them. One `Pipeline` instance serves any number of
/// instruments, each independently ingested and composed.
pub struct Pipeline {
    transport: Arc<dyn MarketDataTransport>,
    oracle_pool: Arc<OraclePool>,
    htf_provider: Arc<HtfContextProvider>,
    composer: Arc<SignalComposer>,
    broadcast: Arc<BroadcastValidator>,
    executor: Arc<Executor>,
    monitor: Arc<Monitor>,
    audit: Arc<dyn AuditLogRepository>,
    specs: Vec<InstrumentSpec>,
    metrics: Arc<PipelineMetrics>,
    cancel: Arc<Notify>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn MarketDataTransport>,
        oracle_pool: Arc<OraclePool>,
        htf_provider: Arc<HtfContextProvider>,
        composer: Arc<SignalComposer>,
        broadcast: Arc<BroadcastValidator>,
        executor: Arc<Executor>,
        monitor: Arc<Monitor>,
        audit: Arc<dyn AuditLogRepository>,
        specs: Vec<InstrumentSpec>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self { transport, oracle_pool, htf_provider, composer, broadcast, executor, monitor, audit, specs, metrics, cancel: Arc::new(Notify::new()) }
    }

    /// Shared handle to this pipeline's counters, for wiring a
    /// `MetricsReporter` alongside it.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Restores open positions, starts every instrument's ingestor, and
    /// spawns the executor worker pool plus one dispatch task per
    /// instrument. Idempotent only in the sense that each `Pipeline` is
    /// meant to be started once; call `stop()` before a restart.
    pub async fn start(self: &Arc<Self>, reconstruct_since: chrono::DateTime<Utc>) {
        self.monitor.restore(reconstruct_since).await;

        self.executor.spawn_workers(self.cancel.clone());

        for spec in &self.specs {
            let (ingestor, handle) = MarketDataIngestor::new(
                spec.instrument.clone(),
                spec.primary,
                spec.supporting.clone(),
                spec.htf.iter().map(|h| h.as_timeframe()).collect(),
                self.transport.clone(),
            );
            let ingestor = Arc::new(ingestor);
            if let Err(e) = ingestor.start().await {
                warn!("Pipeline: failed to start ingestor for {}: {}", spec.instrument, e);
                continue;
            }

            let pipeline = self.clone();
            let spec = spec.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move { pipeline.dispatch_loop(ingestor, handle, spec, cancel).await });
        }

        info!("Pipeline: started {} instrument(s)", self.specs.len());
    }

    /// Cancels every spawned task. Idempotent; safe to call more than
    /// once or before `start()`.
    pub fn stop(&self) {
        self.cancel.notify_waiters();
    }

    /// Single-flight-per-instrument dispatch (§5): composition runs
    /// sequentially off the event channel, so at most one is ever in
    /// flight; any events that accumulated while a tick was running are
    /// drained without launching extra composes, coalescing them into
    /// the next iteration's fresh window snapshot.
    async fn dispatch_loop(
        self: Arc<Self>,
        ingestor: Arc<MarketDataIngestor>,
        mut handle: IngestorHandle,
        spec: InstrumentSpec,
        cancel: Arc<Notify>,
    ) {
        loop {
            tokio::select! {
                _ = cancel.notified() => {
                    ingestor.stop().await;
                    info!("Pipeline [{}]: dispatch loop stopped", spec.instrument);
                    return;
                }
                event = handle.events.recv() => {
                    let Some(event) = event else {
                        warn!("Pipeline [{}]: ingestor event channel closed", spec.instrument);
                        return;
                    };
                    self.handle_primary_closed(&handle.windows, &spec).await;
                    // Coalesce: drop any further events queued while this
                    // tick ran, since the next iteration re-snapshots the
                    // windows fresh anyway.
                    while handle.events.try_recv().is_ok() {}
                    let _ = event;
                }
            }
        }
    }

    async fn handle_primary_closed(&self, windows: &Arc<WindowStore>, spec: &InstrumentSpec) {
        let primary_candles = windows.snapshot(spec.primary).await;
        if primary_candles.is_empty() {
            return;
        }
        self.metrics.record_tick();

        let mut supporting = Vec::with_capacity(spec.supporting.len());
        for tf in &spec.supporting {
            supporting.push((*tf, windows.snapshot(*tf).await));
        }

        let mut htf_candles: HashMap<HtfTimeframe, Vec<Candle>> = HashMap::new();
        for htf in &spec.htf {
            let candles = windows.snapshot(htf.as_timeframe()).await;
            if !candles.is_empty() {
                htf_candles.insert(*htf, candles);
            }
        }

        let now = Utc::now();
        let request = ComposeRequest {
            instrument: spec.instrument.clone(),
            primary_timeframe: spec.primary,
            primary_candles: primary_candles.clone(),
            supporting,
            htf_candles,
            now,
        };

        match self.composer.compose(request).await {
            ComposerOutcome::Emitted(signal) => {
                self.metrics.record_signal_emitted();
                if let Err(e) = self.audit.record_signal(&signal).await {
                    warn!("Pipeline [{}]: failed to record signal audit: {}", spec.instrument, e);
                }
                self.broadcast.broadcast(signal).await;
            }
            ComposerOutcome::Rejected { instrument, reason } => {
                self.metrics.record_rejection(reason).await;
                let _ = self.audit.record_rejection(&instrument, reason.as_str(), now).await;
            }
        }

        self.monitor.on_primary_closed(&spec.instrument, &primary_candles, spec.primary).await;

        // HTF context is also refreshed here so its 1h cache stays warm
        // even on instruments that reject every tick.
        if let Some(tail) = primary_candles.last() {
            let _ = self.htf_provider.context(&spec.instrument, tail.close, &HashMap::new(), now).await;
        }
    }
}
