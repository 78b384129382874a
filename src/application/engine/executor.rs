//! Executor & Monitor (§4.5): dequeues validated per-agent signals,
//! places market orders, and supervises open positions for early exit
//! by re-consulting the pattern oracles on every subsequent primary
//! close.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::engine::agent::ValidatedSignal;
use crate::domain::engine::candle::Candle;
use crate::domain::engine::oracle::{OracleKind, Recommendation};
use crate::domain::engine::ports::{
    AgentCatalog, AuditLogRepository, BrokerAdapter, Notification, NotificationBus, OpenPositionRepository,
    SymbolAdmissibilityLookup, ValidatedSignalQueueRepository,
};
use crate::domain::engine::position::{ExitDecision, OpenPosition, PositionLifecycle, PositionOrigin};
use crate::infrastructure::core::{CircuitBreaker, CircuitBreakerError};

use super::oracle_pool::OraclePool;

/// Per-broker-call deadline (§5 "Cancellation & timeouts").
const BROKER_TIMEOUT: Duration = Duration::from_secs(15);
/// Idle-poll interval when the queue is empty (§5 bounded worker pool).
const IDLE_POLL: Duration = Duration::from_millis(100);
/// Consecutive broker failures (timeout, error, or rejection) before the
/// breaker opens and short-circuits further calls for `BROKER_BREAKER_COOLDOWN`.
const BROKER_BREAKER_FAILURE_THRESHOLD: usize = 5;
const BROKER_BREAKER_SUCCESS_THRESHOLD: usize = 2;
const BROKER_BREAKER_COOLDOWN: Duration = Duration::from_secs(60);

fn broker_circuit_breaker(name: &str) -> CircuitBreaker {
    CircuitBreaker::new(name, BROKER_BREAKER_FAILURE_THRESHOLD, BROKER_BREAKER_SUCCESS_THRESHOLD, BROKER_BREAKER_COOLDOWN)
}

pub struct ExecutorConfig {
    pub worker_count: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { worker_count: 4 }
    }
}

/// Pops the highest-priority validated signal and turns it into an open
/// position. One `Executor` is shared by `worker_count` draining tasks.
pub struct Executor {
    queue: Arc<dyn ValidatedSignalQueueRepository>,
    catalog: Arc<dyn AgentCatalog>,
    admissibility: Arc<dyn SymbolAdmissibilityLookup>,
    broker: Arc<dyn BrokerAdapter>,
    positions: Arc<dyn OpenPositionRepository>,
    notifications: Arc<dyn NotificationBus>,
    audit: Arc<dyn AuditLogRepository>,
    monitor: Arc<Monitor>,
    config: ExecutorConfig,
    broker_breaker: CircuitBreaker,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<dyn ValidatedSignalQueueRepository>,
        catalog: Arc<dyn AgentCatalog>,
        admissibility: Arc<dyn SymbolAdmissibilityLookup>,
        broker: Arc<dyn BrokerAdapter>,
        positions: Arc<dyn OpenPositionRepository>,
        notifications: Arc<dyn NotificationBus>,
        audit: Arc<dyn AuditLogRepository>,
        monitor: Arc<Monitor>,
        config: ExecutorConfig,
    ) -> Self {
        let broker_breaker = broker_circuit_breaker("executor-broker-orders");
        Self { queue, catalog, admissibility, broker, positions, notifications, audit, monitor, config, broker_breaker }
    }

    /// Spawns `worker_count` tasks draining the priority queue until
    /// `cancel` fires. Each worker is independent; there is no shared
    /// ordering requirement between them beyond the queue's own priority.
    pub fn spawn_workers(self: &Arc<Self>, cancel: Arc<tokio::sync::Notify>) {
        for id in 0..self.config.worker_count {
            let executor = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { executor.run_worker(id, cancel).await });
        }
    }

    async fn run_worker(&self, id: usize, cancel: Arc<tokio::sync::Notify>) {
        loop {
            tokio::select! {
                _ = cancel.notified() => {
                    info!("Executor worker {}: stop requested", id);
                    return;
                }
                processed = self.drain_once() => {
                    if !processed {
                        tokio::time::sleep(IDLE_POLL).await;
                    }
                }
            }
        }
    }

    /// Pops and processes at most one queued entry. Returns `false` when
    /// the queue was empty so callers can back off.
    pub async fn drain_once(&self) -> bool {
        let validated = match self.queue.pop_highest_priority().await {
            Ok(Some(v)) => v,
            Ok(None) => return false,
            Err(e) => {
                warn!("Executor: queue pop failed: {}", e);
                return false;
            }
        };
        self.process(validated).await;
        true
    }

    async fn process(&self, validated: ValidatedSignal) {
        let (signal_id, agent_id) = validated.key();

        match self.queue.is_consumed(signal_id, &agent_id).await {
            Ok(true) => {
                info!("Executor: skipping already-consumed entry ({}, {})", signal_id, agent_id);
                return;
            }
            Ok(false) => {}
            Err(e) => warn!("Executor: consumption check failed, proceeding anyway: {}", e),
        }

        let Ok(Some(agent)) = self.catalog.get(&agent_id).await else {
            warn!("Executor: agent {} vanished from catalog before execution", agent_id);
            let _ = self.queue.mark_consumed(signal_id, &agent_id).await;
            return;
        };

        let broker_symbol = match self.admissibility.check(&validated.signal.instrument, &agent.broker, Some(agent.category.as_str())).await {
            Ok(result) if result.allowed => result.broker_symbol.unwrap_or_else(|| validated.signal.instrument.clone()),
            _ => {
                warn!("Executor: symbol {} not admissible on broker {} for agent {}", validated.signal.instrument, agent.broker, agent_id);
                let _ = self.audit.record_validation(&validated, false, "symbol-not-admissible").await;
                let _ = self.queue.mark_consumed(signal_id, &agent_id).await;
                return;
            }
        };

        let quantity = if validated.signal.entry.is_zero() {
            Decimal::ZERO
        } else {
            validated.position_size / validated.signal.entry
        };

        let order = self
            .broker_breaker
            .call(async {
                match tokio::time::timeout(
                    BROKER_TIMEOUT,
                    self.broker.place_market_order(
                        &agent,
                        &broker_symbol,
                        validated.signal.direction,
                        quantity,
                        Some(validated.effective_stop()),
                        Some(validated.effective_target()),
                    ),
                )
                .await
                {
                    Ok(inner) => inner,
                    Err(_) => Err(anyhow::anyhow!("broker call timed out")),
                }
            })
            .await;

        match order {
            Ok(result) if result.accepted => {
                let trade_id = result.broker_ticket.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                let position = OpenPosition {
                    trade_id: trade_id.clone(),
                    agent_id: agent_id.clone(),
                    instrument: validated.signal.instrument.clone(),
                    side: validated.signal.direction,
                    entry_price: validated.signal.entry,
                    quantity,
                    broker_ticket: result.broker_ticket,
                    opened_at: Utc::now(),
                    origin: PositionOrigin::Signal(Box::new(validated.signal.clone())),
                    lifecycle: PositionLifecycle::Opened,
                    taken_partial: false,
                };

                if let Err(e) = self.positions.save(&position).await {
                    warn!("Executor: failed to persist open position {}: {}", trade_id, e);
                }
                self.monitor.register(position).await;
                self.notifications
                    .publish(Notification::PositionOpened { trade_id, agent_id: agent_id.clone(), instrument: validated.signal.instrument.clone() })
                    .await;
                let _ = self.audit.record_validation(&validated, true, "order placed").await;
                info!("Executor: opened position for agent {} on {}", agent_id, validated.signal.instrument);
            }
            Ok(result) => {
                let code = result.error.unwrap_or_else(|| "rejected".into());
                warn!("Executor: broker rejected order for agent {}: {}", agent_id, code);
                let _ = self.audit.record_validation(&validated, false, &code).await;
            }
            Err(CircuitBreakerError::Inner(e)) => {
                warn!("Executor: broker call failed for agent {}: {}", agent_id, e);
                let _ = self.audit.record_validation(&validated, false, &e.to_string()).await;
            }
            Err(CircuitBreakerError::Open(msg)) => {
                warn!("Executor: broker circuit open, skipping order for agent {}: {}", agent_id, msg);
                let _ = self.audit.record_validation(&validated, false, "broker circuit open").await;
            }
        }

        // Broker rejection is terminal (§7 BrokerRejected): never retried
        // automatically, so the entry is always marked consumed here.
        let _ = self.queue.mark_consumed(signal_id, &agent_id).await;
    }
}

/// Exit votes cast by the four oracles against one monitored position,
/// aggregated per §4.5.
struct ExitVotes {
    fibonacci: bool,
    trend_momentum: bool,
    volume_price_action: bool,
    support_resistance: bool,
}

impl ExitVotes {
    fn count(&self) -> u8 {
        [self.fibonacci, self.trend_momentum, self.volume_price_action, self.support_resistance]
            .iter()
            .filter(|&&v| v)
            .count() as u8
    }
}

/// Supervises open positions, re-voting on every primary close. Exclusive
/// writer to the position map; the Executor only ever reaches it through
/// `register`/`close`.
pub struct Monitor {
    positions: RwLock<HashMap<String, OpenPosition>>,
    oracle_pool: Arc<OraclePool>,
    broker: Arc<dyn BrokerAdapter>,
    catalog: Arc<dyn AgentCatalog>,
    repository: Arc<dyn OpenPositionRepository>,
    notifications: Arc<dyn NotificationBus>,
    broker_breaker: CircuitBreaker,
}

impl Monitor {
    pub fn new(
        oracle_pool: Arc<OraclePool>,
        broker: Arc<dyn BrokerAdapter>,
        catalog: Arc<dyn AgentCatalog>,
        repository: Arc<dyn OpenPositionRepository>,
        notifications: Arc<dyn NotificationBus>,
    ) -> Self {
        let broker_breaker = broker_circuit_breaker("monitor-broker-closes");
        Self { positions: RwLock::new(HashMap::new()), oracle_pool, broker, catalog, repository, notifications, broker_breaker }
    }

    /// Reconstructs the monitored set from persisted open positions at
    /// startup (§4.5 "Persistence"). Positions whose origin is
    /// `HoldingOnly` still register but will never cast exit votes.
    pub async fn restore(&self, since: DateTime<Utc>) {
        match self.repository.load_open_within(since).await {
            Ok(positions) => {
                let mut guard = self.positions.write().await;
                for position in positions {
                    info!("Monitor: restored open position {} for agent {}", position.trade_id, position.agent_id);
                    guard.insert(position.trade_id.clone(), position);
                }
            }
            Err(e) => warn!("Monitor: failed to restore open positions: {}", e),
        }
    }

    pub async fn register(&self, position: OpenPosition) {
        self.positions.write().await.insert(position.trade_id.clone(), position);
    }

    pub async fn open_count(&self) -> usize {
        self.positions.read().await.len()
    }

    /// Re-votes every position on `instrument` against a fresh primary
    /// close, closing (in full or part) the ones whose aggregate vote
    /// demands it.
    pub async fn on_primary_closed(&self, instrument: &str, primary_candles: &[Candle], timeframe: crate::domain::engine::timeframe::Timeframe) {
        let Some(tail) = primary_candles.last() else { return };
        let current_price = tail.close;
        let refs: Vec<&Candle> = primary_candles.iter().collect();

        let trade_ids: Vec<String> = {
            let guard = self.positions.read().await;
            guard.values().filter(|p| p.instrument == instrument && p.lifecycle != PositionLifecycle::Closed).map(|p| p.trade_id.clone()).collect()
        };
        if trade_ids.is_empty() {
            return;
        }

        let current = self.oracle_pool.analyze_timeframe(timeframe, &refs, current_price).await;

        for trade_id in trade_ids {
            let position = {
                let guard = self.positions.read().await;
                guard.get(&trade_id).cloned()
            };
            let Some(position) = position else { continue };
            let PositionOrigin::Signal(entry_signal) = &position.origin else {
                // Holding-only positions never cast exit votes (§4.5).
                continue;
            };

            let votes = cast_exit_votes(&position, &current, &entry_signal.audit.primary_verdicts, current_price);
            let opposite = opposite_direction(position.side);
            let reversal = current.direction == Some(opposite) && current.tally.agreeing(opposite) >= 3;
            let pnl_pct = position.pnl_pct(current_price);
            let target_pct = target_r_pct(&entry_signal);

            let decision = if reversal || votes.count() >= 3 {
                ExitDecision::FullExit
            } else if !position.taken_partial && pnl_pct >= 0.618 * target_pct && votes.count() >= 2 {
                ExitDecision::PartialExit { fraction_bps: 5_000 }
            } else {
                ExitDecision::Hold
            };

            self.apply_decision(position, decision).await;
        }
    }

    async fn apply_decision(&self, position: OpenPosition, decision: ExitDecision) {
        match decision {
            ExitDecision::Hold => {}
            ExitDecision::FullExit => self.close(position, 1.0).await,
            ExitDecision::PartialExit { fraction_bps } => {
                let fraction = fraction_bps as f64 / 10_000.0;
                self.close(position, fraction).await;
            }
        }
    }

    async fn close(&self, position: OpenPosition, fraction: f64) {
        let Some(agent) = self.catalog.get(&position.agent_id).await.ok().flatten() else {
            warn!("Monitor: cannot close position {}, agent {} not found", position.trade_id, position.agent_id);
            return;
        };
        let Some(ticket) = position.broker_ticket.clone() else {
            warn!("Monitor: position {} has no broker ticket, cannot close", position.trade_id);
            return;
        };

        let close = self
            .broker_breaker
            .call(async {
                match tokio::time::timeout(BROKER_TIMEOUT, self.broker.close_position(&agent, &ticket, fraction)).await {
                    Ok(inner) => inner,
                    Err(_) => Err(anyhow::anyhow!("broker close call timed out")),
                }
            })
            .await;

        match close {
            Ok(result) if result.accepted && fraction < 1.0 && !result.supports_partial => {
                // §9 open question: partial-close support is broker-
                // dependent; downgrade unsupported partials to a logged
                // no-op rather than force a full exit.
                info!("Monitor: partial close unsupported by broker for {}, no-op", position.trade_id);
            }
            Ok(result) if result.accepted && fraction < 1.0 => {
                let mut guard = self.positions.write().await;
                if let Some(p) = guard.get_mut(&position.trade_id) {
                    p.taken_partial = true;
                    p.lifecycle = PositionLifecycle::Monitored;
                }
                info!("Monitor: partially closed position {} ({:.0}%)", position.trade_id, fraction * 100.0);
            }
            Ok(result) if result.accepted => {
                let _ = self.repository.remove(&position.trade_id).await;
                self.positions.write().await.remove(&position.trade_id);
                self.notifications
                    .publish(Notification::PositionClosed { trade_id: position.trade_id.clone(), agent_id: position.agent_id.clone(), realized_pnl: result.realized_pnl })
                    .await;
                info!("Monitor: closed position {} (full)", position.trade_id);
            }
            Ok(result) => warn!("Monitor: broker declined close of {}: {:?}", position.trade_id, result.error),
            Err(CircuitBreakerError::Inner(e)) => warn!("Monitor: close call errored for {}: {}", position.trade_id, e),
            Err(CircuitBreakerError::Open(msg)) => warn!("Monitor: broker circuit open, skipping close of {}: {}", position.trade_id, msg),
        }
    }
}

fn opposite_direction(side: Recommendation) -> Recommendation {
    match side {
        Recommendation::Buy => Recommendation::Sell,
        Recommendation::Sell => Recommendation::Buy,
        Recommendation::Hold => Recommendation::Hold,
    }
}

fn target_r_pct(signal: &crate::domain::engine::signal::ComposedSignal) -> f64 {
    let entry = signal.entry.to_f64().unwrap_or(0.0);
    if entry == 0.0 {
        return 0.0;
    }
    let reward = signal.reward().to_f64().unwrap_or(0.0);
    (reward / entry) * 100.0
}

/// Casts the four §4.5 exit votes for one position against a fresh
/// timeframe analysis and the entry-time verdict snapshot.
fn cast_exit_votes(
    position: &OpenPosition,
    current: &crate::domain::engine::oracle::TimeframeAnalysis,
    entry_verdicts: &[crate::domain::engine::oracle::OracleVerdict; 4],
    current_price: Decimal,
) -> ExitVotes {
    let find = |kind: OracleKind| current.verdicts.iter().find(|v| v.kind == kind);
    let find_entry = |kind: OracleKind| entry_verdicts.iter().find(|v| v.kind == kind);

    let fibonacci = match (find(OracleKind::Fibonacci), find_entry(OracleKind::Fibonacci)) {
        (Some(now), Some(entry)) => now.fields.fib_current_level != entry.fields.fib_current_level && now.fields.fib_current_level.is_some(),
        _ => false,
    };

    let trend_momentum = match (find(OracleKind::TrendMomentum), find_entry(OracleKind::TrendMomentum)) {
        (Some(now), Some(entry)) => {
            let trend_flipped = now.fields.ema_trend.is_some() && now.fields.ema_trend != entry.fields.ema_trend;
            let momentum_downgraded = matches!(entry.fields.momentum.as_deref(), Some("STRONG"))
                && matches!(now.fields.momentum.as_deref(), Some("WEAK"));
            trend_flipped || momentum_downgraded
        }
        _ => false,
    };

    let in_profit = position.pnl(current_price) > Decimal::ZERO;
    let volume_price_action = find(OracleKind::VolumePriceAction).map(|v| v.fields.reversal_candle == Some(true)).unwrap_or(false) && in_profit;

    let support_resistance = match find_entry(OracleKind::SupportResistance).and_then(|v| v.fields.nearest_level_price) {
        Some(level) => {
            let level = Decimal::try_from(level).unwrap_or(Decimal::ZERO);
            match position.side {
                Recommendation::Buy => current_price < level,
                _ => current_price > level,
            }
        }
        None => false,
    };

    ExitVotes { fibonacci, trend_momentum, volume_price_action, support_resistance }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::htf::{HtfContext, TrendLabel};
    use crate::domain::engine::oracle::{ConsensusPattern, OracleFields, OracleVerdict, VoteTally};
    use crate::domain::engine::ports::{BrokerCloseResult, BrokerOrderResult, SymbolAdmissibility, Ticker};
    use crate::domain::engine::signal::{ComposedSignal, QualityBreakdown, QualityGrade, SignalAudit};
    use crate::domain::engine::agent::{Agent, RiskBand};
    use crate::application::engine::queue::InMemoryValidatedSignalQueue;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct NullCatalog;
    #[async_trait]
    impl AgentCatalog for NullCatalog {
        async fn list_active(&self) -> anyhow::Result<Vec<Agent>> {
            Ok(vec![])
        }
        async fn get(&self, _: &str) -> anyhow::Result<Option<Agent>> {
            Ok(Some(Agent {
                id: "agent-1".into(),
                is_active: true,
                category: "general".into(),
                risk_level: 2,
                budget: dec!(1000),
                allowed_categories: None,
                min_confidence: 50.0,
                max_open_positions: 5,
                enable_expensive_validation: false,
                broker: "mock".into(),
            }))
        }
        async fn open_position_count(&self, _: &str) -> anyhow::Result<usize> {
            Ok(0)
        }
    }

    struct AcceptingBroker;
    #[async_trait]
    impl BrokerAdapter for AcceptingBroker {
        async fn place_market_order(&self, _: &Agent, _: &str, _: Recommendation, _: Decimal, _: Option<Decimal>, _: Option<Decimal>) -> anyhow::Result<BrokerOrderResult> {
            Ok(BrokerOrderResult { accepted: true, broker_ticket: Some("ticket-1".into()), error: None })
        }
        async fn close_position(&self, _: &Agent, _: &str, _: f64) -> anyhow::Result<BrokerCloseResult> {
            Ok(BrokerCloseResult { accepted: true, realized_pnl: Some(dec!(10)), error: None, supports_partial: true })
        }
        async fn get_balance(&self, _: &Agent) -> anyhow::Result<Decimal> {
            Ok(dec!(1000))
        }
        async fn ticker(&self, _: &str) -> anyhow::Result<Ticker> {
            Ok(Ticker { bid: dec!(99), ask: dec!(101), last: dec!(100), change_24h_pct: 0.0, quote_volume: dec!(1_000_000) })
        }
    }

    struct AllowAll;
    #[async_trait]
    impl SymbolAdmissibilityLookup for AllowAll {
        async fn check(&self, _: &str, _: &str, _: Option<&str>) -> anyhow::Result<SymbolAdmissibility> {
            Ok(SymbolAdmissibility { allowed: true, broker_symbol: Some("BTC-USD".into()) })
        }
    }

    struct NullNotifications;
    #[async_trait]
    impl NotificationBus for NullNotifications {
        async fn publish(&self, _: Notification) {}
    }

    struct NullAudit;
    #[async_trait]
    impl AuditLogRepository for NullAudit {
        async fn record_signal(&self, _: &ComposedSignal) -> anyhow::Result<()> {
            Ok(())
        }
        async fn record_rejection(&self, _: &str, _: &str, _: DateTime<Utc>) -> anyhow::Result<()> {
            Ok(())
        }
        async fn record_exclusion(&self, _: &str, _: Uuid, _: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn record_validation(&self, _: &ValidatedSignal, _: bool, _: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct NullPositions;
    #[async_trait]
    impl OpenPositionRepository for NullPositions {
        async fn save(&self, _: &OpenPosition) -> anyhow::Result<()> {
            Ok(())
        }
        async fn remove(&self, _: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn load_open_within(&self, _: DateTime<Utc>) -> anyhow::Result<Vec<OpenPosition>> {
            Ok(vec![])
        }
    }

    fn signal() -> ComposedSignal {
        ComposedSignal {
            id: Uuid::new_v4(),
            instrument: "BTCUSDT".into(),
            direction: Recommendation::Buy,
            confidence: 80.0,
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
                primary_verdicts: [
                    OracleVerdict { kind: OracleKind::Fibonacci, recommendation: Recommendation::Buy, confidence: 75.0, reasoning: String::new(), fields: OracleFields::default() },
                    OracleVerdict { kind: OracleKind::TrendMomentum, recommendation: Recommendation::Buy, confidence: 75.0, reasoning: String::new(), fields: OracleFields::default() },
                    OracleVerdict { kind: OracleKind::VolumePriceAction, recommendation: Recommendation::Buy, confidence: 75.0, reasoning: String::new(), fields: OracleFields::default() },
                    OracleVerdict { kind: OracleKind::SupportResistance, recommendation: Recommendation::Buy, confidence: 75.0, reasoning: String::new(), fields: OracleFields::default() },
                ],
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

    fn validated() -> ValidatedSignal {
        ValidatedSignal {
            signal: signal(),
            agent_id: "agent-1".into(),
            position_size: dec!(700),
            size_percent: dec!(0.70),
            risk_band: RiskBand::Moderate,
            stop_price_override: None,
            target_price_override: None,
            validated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn executor_opens_a_position_on_successful_order() {
        let monitor = Arc::new(Monitor::new(Arc::new(OraclePool::new()), Arc::new(AcceptingBroker), Arc::new(NullCatalog), Arc::new(NullPositions), Arc::new(NullNotifications)));
        let queue = Arc::new(InMemoryValidatedSignalQueue::new());
        queue.push(validated()).await.unwrap();

        let executor = Executor::new(
            queue.clone(),
            Arc::new(NullCatalog),
            Arc::new(AllowAll),
            Arc::new(AcceptingBroker),
            Arc::new(NullPositions),
            Arc::new(NullNotifications),
            Arc::new(NullAudit),
            monitor.clone(),
            ExecutorConfig::default(),
        );

        let processed = executor.drain_once().await;
        assert!(processed);
        assert_eq!(monitor.open_count().await, 1);
    }

    #[tokio::test]
    async fn idempotent_consumer_skips_already_consumed_entries() {
        let monitor = Arc::new(Monitor::new(Arc::new(OraclePool::new()), Arc::new(AcceptingBroker), Arc::new(NullCatalog), Arc::new(NullPositions), Arc::new(NullNotifications)));
        let queue = Arc::new(InMemoryValidatedSignalQueue::new());
        let entry = validated();
        let key = entry.key();
        queue.mark_consumed(key.0, &key.1).await.unwrap();
        queue.push(entry).await.unwrap();

        let executor = Executor::new(
            queue.clone(),
            Arc::new(NullCatalog),
            Arc::new(AllowAll),
            Arc::new(AcceptingBroker),
            Arc::new(NullPositions),
            Arc::new(NullNotifications),
            Arc::new(NullAudit),
            monitor.clone(),
            ExecutorConfig::default(),
        );

        executor.drain_once().await;
        assert_eq!(monitor.open_count().await, 0);
    }
}
