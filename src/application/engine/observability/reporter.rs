//! Push-based periodic metrics report (§A.2), grounded on the
//! teacher's `infrastructure::observability::MetricsReporter`: no
//! incoming connections, just a JSON line pushed to stdout on an
//! interval. This pipeline never runs an HTTP server, so there is no
//! scrape endpoint to back a Prometheus-style registry; a plain JSON
//! snapshot on a timer is the whole of it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::engine::ports::ValidatedSignalQueueRepository;

use super::super::executor::Monitor;
use super::metrics::PipelineMetrics;

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub ticks_processed: u64,
    pub signals_emitted: u64,
    pub rejections: std::collections::HashMap<&'static str, u64>,
    pub queue_depth: usize,
    pub open_positions: usize,
}

/// Periodically snapshots `PipelineMetrics` alongside live queue depth
/// and open-position counts, and logs the result as structured JSON.
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    queue: Arc<dyn ValidatedSignalQueueRepository>,
    monitor: Arc<Monitor>,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, queue: Arc<dyn ValidatedSignalQueueRepository>, monitor: Arc<Monitor>, interval: Duration) -> Self {
        Self { metrics, queue, monitor, start_time: Instant::now(), interval }
    }

    /// Runs until `cancel` fires. Intended to be spawned as its own
    /// task alongside the executor workers and dispatch loops.
    pub async fn run(self, cancel: Arc<tokio::sync::Notify>) {
        info!("MetricsReporter: pushing JSON snapshots every {:?}", self.interval);
        loop {
            tokio::select! {
                _ = cancel.notified() => {
                    info!("MetricsReporter: stop requested");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {
                    let snapshot = self.collect_snapshot().await;
                    match serde_json::to_string(&snapshot) {
                        Ok(json) => {
                            println!("METRICS_JSON:{}", json);
                            info!(
                                "ticks={} signals={} open_positions={} queue_depth={} uptime={}s",
                                snapshot.ticks_processed,
                                snapshot.signals_emitted,
                                snapshot.open_positions,
                                snapshot.queue_depth,
                                snapshot.uptime_seconds,
                            );
                        }
                        Err(e) => warn!("MetricsReporter: failed to serialize snapshot: {}", e),
                    }
                }
            }
        }
    }

    async fn collect_snapshot(&self) -> MetricsSnapshot {
        let queue_depth = match self.queue.len().await {
            Ok(len) => len,
            Err(e) => {
                warn!("MetricsReporter: failed to read queue depth: {}", e);
                0
            }
        };

        MetricsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            ticks_processed: self.metrics.ticks_processed(),
            signals_emitted: self.metrics.signals_emitted(),
            rejections: self.metrics.rejection_counts().await,
            queue_depth,
            open_positions: self.monitor.open_count().await,
        }
    }
}
