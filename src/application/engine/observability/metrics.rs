//! Process-lifetime pipeline counters (§A.2): plain atomics, no
//! Prometheus registry and no scrape endpoint. Grounded on the
//! teacher's `infrastructure::observability::Metrics` gauge/counter
//! set, trimmed to what this pipeline actually has to report and
//! reshaped for a periodic push instead of a `/metrics` pull.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use crate::domain::engine::signal::RejectionReason;

/// Ticks, signals, and rejection-reason counts accumulated since the
/// pipeline started. Shared via `Arc` between every instrument's
/// dispatch loop and the periodic reporter.
#[derive(Default)]
pub struct PipelineMetrics {
    ticks_processed: AtomicU64,
    signals_emitted: AtomicU64,
    rejections: RwLock<HashMap<&'static str, u64>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One primary-candle close handled, regardless of outcome.
    pub fn record_tick(&self) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signal_emitted(&self) {
        self.signals_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn record_rejection(&self, reason: RejectionReason) {
        let mut counts = self.rejections.write().await;
        *counts.entry(reason.as_str()).or_insert(0) += 1;
    }

    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed.load(Ordering::Relaxed)
    }

    pub fn signals_emitted(&self) -> u64 {
        self.signals_emitted.load(Ordering::Relaxed)
    }

    pub async fn rejection_counts(&self) -> HashMap<&'static str, u64> {
        self.rejections.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tallies_ticks_signals_and_rejections_by_reason() {
        let metrics = PipelineMetrics::new();
        metrics.record_tick();
        metrics.record_tick();
        metrics.record_signal_emitted();
        metrics.record_rejection(RejectionReason::Spacing).await;
        metrics.record_rejection(RejectionReason::Spacing).await;
        metrics.record_rejection(RejectionReason::Split).await;

        assert_eq!(metrics.ticks_processed(), 2);
        assert_eq!(metrics.signals_emitted(), 1);

        let rejections = metrics.rejection_counts().await;
        assert_eq!(rejections.get("spacing"), Some(&2));
        assert_eq!(rejections.get("split"), Some(&1));
        assert_eq!(rejections.len(), 2);
    }

    #[test]
    fn starts_at_zero() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.ticks_processed(), 0);
        assert_eq!(metrics.signals_emitted(), 0);
    }
}
