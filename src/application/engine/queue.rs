//! In-memory `ValidatedSignalQueueRepository` (§4.4 step 4, §5, §6): a
//! multi-producer/multi-consumer priority queue keyed by `(signal_id,
//! agent_id)`, ties broken by arrival order, with an idempotent-consumer
//! marker so executor restarts cannot double-place an order (§8).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::engine::agent::ValidatedSignal;
use crate::domain::engine::ports::ValidatedSignalQueueRepository;

/// Wraps a queued entry with its priority and an arrival sequence number
/// so `BinaryHeap` (a max-heap) yields highest-priority-then-earliest.
struct Entry {
    priority: i64,
    arrival: u64,
    validated: ValidatedSignal,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.arrival == other.arrival
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first; among equal priorities, earlier arrival
        // first — so invert arrival to keep it a max-heap on "should pop
        // first".
        self.priority.cmp(&other.priority).then_with(|| other.arrival.cmp(&self.arrival))
    }
}

/// In-memory priority queue for per-agent validated signals. Suitable
/// for a single-instance deployment; swap for a durable broker-backed
/// queue to survive process restarts without losing in-flight entries.
pub struct InMemoryValidatedSignalQueue {
    heap: Arc<RwLock<BinaryHeap<Entry>>>,
    consumed: Arc<RwLock<HashSet<(Uuid, String)>>>,
    arrival_seq: AtomicU64,
}

impl InMemoryValidatedSignalQueue {
    pub fn new() -> Self {
        Self {
            heap: Arc::new(RwLock::new(BinaryHeap::new())),
            consumed: Arc::new(RwLock::new(HashSet::new())),
            arrival_seq: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryValidatedSignalQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidatedSignalQueueRepository for InMemoryValidatedSignalQueue {
    async fn push(&self, validated: ValidatedSignal) -> Result<()> {
        let arrival = self.arrival_seq.fetch_add(1, AtomicOrdering::SeqCst);
        let priority = validated.priority();
        self.heap.write().await.push(Entry { priority, arrival, validated });
        Ok(())
    }

    async fn pop_highest_priority(&self) -> Result<Option<ValidatedSignal>> {
        Ok(self.heap.write().await.pop().map(|e| e.validated))
    }

    async fn is_consumed(&self, signal_id: Uuid, agent_id: &str) -> Result<bool> {
        Ok(self.consumed.read().await.contains(&(signal_id, agent_id.to_string())))
    }

    async fn mark_consumed(&self, signal_id: Uuid, agent_id: &str) -> Result<()> {
        self.consumed.write().await.insert((signal_id, agent_id.to_string()));
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.heap.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::agent::RiskBand;
    use crate::domain::engine::htf::{HtfContext, TrendLabel};
    use crate::domain::engine::oracle::{ConsensusPattern, Recommendation, VoteTally};
    use crate::domain::engine::signal::{ComposedSignal, QualityBreakdown, QualityGrade, SignalAudit};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn signal(confidence: f64) -> ComposedSignal {
        ComposedSignal {
            id: Uuid::new_v4(),
            instrument: "BTCUSDT".into(),
            direction: Recommendation::Buy,
            confidence,
            entry: dec!(100),
            stop: dec!(99),
            target: dec!(102),
            risk_reward: 2.0,
            quality_grade: QualityGrade::A,
            quality_total: 70.0,
            size_multiplier: 1.0,
            reasoning: String::new(),
            origin_oracles: VoteTally::default(),
            audit: SignalAudit {
                primary_tally: VoteTally::default(),
                primary_pattern: ConsensusPattern::UnanimousBuy,
                confluence_pct: 100.0,
                htf_snapshot: HtfContext {
                    levels: vec![],
                    nearest_support: None,
                    nearest_resistance: None,
                    is_near_critical_level: false,
                    critical_level_type: None,
                    trend: TrendLabel::Bullish,
                    trend_confirmed_at: Utc::now(),
                },
                htf_aligned: true,
                htf_neutral: false,
                htf_counter: false,
                inverted: false,
                professional_score_raw: 70.0,
                professional_score_adjusted: 70.0,
                warnings: 0,
                quality: QualityBreakdown { consensus: 25.0, confidence: 20.0, risk_reward: 20.0, htf_alignment: 15.0, professional_score: 14.0 },
            },
            emitted_at: Utc::now(),
        }
    }

    fn validated(agent_id: &str, confidence: f64) -> ValidatedSignal {
        ValidatedSignal {
            signal: signal(confidence),
            agent_id: agent_id.into(),
            position_size: dec!(100),
            size_percent: dec!(0.70),
            risk_band: RiskBand::Moderate,
            stop_price_override: None,
            target_price_override: None,
            validated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn pops_highest_priority_first() {
        let queue = InMemoryValidatedSignalQueue::new();
        queue.push(validated("agent-a", 60.0)).await.unwrap();
        queue.push(validated("agent-b", 90.0)).await.unwrap();
        queue.push(validated("agent-c", 75.0)).await.unwrap();

        let first = queue.pop_highest_priority().await.unwrap().unwrap();
        assert_eq!(first.agent_id, "agent-b");
        let second = queue.pop_highest_priority().await.unwrap().unwrap();
        assert_eq!(second.agent_id, "agent-c");
    }

    #[tokio::test]
    async fn ties_break_by_arrival_order() {
        let queue = InMemoryValidatedSignalQueue::new();
        queue.push(validated("first", 80.0)).await.unwrap();
        queue.push(validated("second", 80.0)).await.unwrap();

        let first = queue.pop_highest_priority().await.unwrap().unwrap();
        assert_eq!(first.agent_id, "first");
    }

    #[tokio::test]
    async fn consumption_marker_is_idempotent() {
        let queue = InMemoryValidatedSignalQueue::new();
        let entry = validated("agent-a", 80.0);
        let key = entry.key();
        assert!(!queue.is_consumed(key.0, &key.1).await.unwrap());
        queue.mark_consumed(key.0, &key.1).await.unwrap();
        assert!(queue.is_consumed(key.0, &key.1).await.unwrap());
        // Marking twice is a no-op, not an error.
        queue.mark_consumed(key.0, &key.1).await.unwrap();
        assert!(queue.is_consumed(key.0, &key.1).await.unwrap());
    }
}
