//! Broadcast & Validator (§4.4): fans a composed signal out to the
//! current agent population, filters for cheap local eligibility, then
//! runs per-agent validation (light or full mode) concurrently. Survivors
//! are enqueued with priority and notified; everything else is an audit
//! exclusion, never a crash.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::domain::engine::agent::{Agent, RiskBand, ValidatedSignal};
use crate::domain::engine::ports::{
    AgentCatalog, AgentPerformanceProvider, AuditLogRepository, BrokerAdapter, MarketConditions, Notification,
    NotificationBus, SymbolAdmissibilityLookup, ValidatedSignalQueueRepository, ValidationInput, ValidationOracle,
};
use crate::domain::engine::signal::ComposedSignal;

/// Per-agent full-mode validation deadline (§5).
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BroadcastConfig {
    /// Minimum available balance required for eligibility, in quote currency.
    pub minimum_balance: Decimal,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { minimum_balance: dec!(10) }
    }
}

enum Eligibility {
    Eligible { broker_symbol: String, balance: Decimal },
    Excluded(&'static str),
}

/// Outcome of one agent's run through the fan-out, for counting and
/// audit only — the persisted effects (queue push, notifications,
/// audit log) already happened by the time this is produced.
enum AgentOutcome {
    Validated,
    Excluded,
    Rejected,
}

pub struct BroadcastValidator {
    catalog: Arc<dyn AgentCatalog>,
    broker: Arc<dyn BrokerAdapter>,
    admissibility: Arc<dyn SymbolAdmissibilityLookup>,
    validation_oracle: Arc<dyn ValidationOracle>,
    performance: Arc<dyn AgentPerformanceProvider>,
    notifications: Arc<dyn NotificationBus>,
    audit: Arc<dyn AuditLogRepository>,
    queue: Arc<dyn ValidatedSignalQueueRepository>,
    config: BroadcastConfig,
}

impl BroadcastValidator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<dyn AgentCatalog>,
        broker: Arc<dyn BrokerAdapter>,
        admissibility: Arc<dyn SymbolAdmissibilityLookup>,
        validation_oracle: Arc<dyn ValidationOracle>,
        performance: Arc<dyn AgentPerformanceProvider>,
        notifications: Arc<dyn NotificationBus>,
        audit: Arc<dyn AuditLogRepository>,
        queue: Arc<dyn ValidatedSignalQueueRepository>,
        config: BroadcastConfig,
    ) -> Self {
        Self { catalog, broker, admissibility, validation_oracle, performance, notifications, audit, queue, config }
    }

    /// Runs the full §4.4 fan-out for one composed signal.
    pub async fn broadcast(&self, signal: ComposedSignal) {
        let agents = match self.catalog.list_active().await {
            Ok(agents) => agents,
            Err(e) => {
                warn!("Broadcast [{}]: failed to list agent population: {}", signal.instrument, e);
                return;
            }
        };

        let outcomes = futures::future::join_all(agents.into_iter().map(|agent| self.run_one(agent, &signal))).await;

        let eligible = outcomes.iter().filter(|o| !matches!(o, AgentOutcome::Excluded)).count();
        let validated = outcomes.iter().filter(|o| matches!(o, AgentOutcome::Validated)).count();

        self.notifications
            .publish(Notification::SignalBroadcastComplete { signal_id: signal.id, eligible, validated })
            .await;
        info!(
            "Broadcast [{}]: signal {} reached {} eligible agents, {} validated",
            signal.instrument, signal.id, eligible, validated
        );
    }

    async fn run_one(&self, agent: Agent, signal: &ComposedSignal) -> AgentOutcome {
        let eligibility = self.check_eligibility(&agent, signal).await;
        let (broker_symbol, balance) = match eligibility {
            Eligibility::Eligible { broker_symbol, balance } => (broker_symbol, balance),
            Eligibility::Excluded(reason) => {
                let _ = self.audit.record_exclusion(&agent.id, signal.id, reason).await;
                return AgentOutcome::Excluded;
            }
        };

        let outcome = if agent.enable_expensive_validation {
            self.validate_full(&agent, signal, balance, &broker_symbol).await
        } else {
            self.validate_light(&agent, signal, balance)
        };

        match outcome {
            Some(validated) => {
                let _ = self.audit.record_validation(&validated, true, "accepted").await;
                if let Err(e) = self.queue.push(validated.clone()).await {
                    warn!("Broadcast [{}]: failed to enqueue validated signal for agent {}: {}", signal.instrument, agent.id, e);
                    return AgentOutcome::Rejected;
                }
                self.notifications
                    .publish(Notification::SignalAgentValidated { signal_id: signal.id, agent_id: agent.id.clone(), accepted: true })
                    .await;
                AgentOutcome::Validated
            }
            None => {
                self.notifications
                    .publish(Notification::SignalAgentValidated { signal_id: signal.id, agent_id: agent.id.clone(), accepted: false })
                    .await;
                AgentOutcome::Rejected
            }
        }
    }

    async fn check_eligibility(&self, agent: &Agent, signal: &ComposedSignal) -> Eligibility {
        if !agent.is_active {
            return Eligibility::Excluded("inactive");
        }
        if let Some(allowed) = &agent.allowed_categories {
            if !allowed.iter().any(|c| c == &agent.category) {
                return Eligibility::Excluded("category-not-allowed");
            }
        }

        let admissibility = match self
            .admissibility
            .check(&signal.instrument, &agent.broker, Some(agent.category.as_str()))
            .await
        {
            Ok(result) => result,
            Err(_) => return Eligibility::Excluded("symbol-admissibility-check-failed"),
        };
        if !admissibility.allowed {
            return Eligibility::Excluded("symbol-not-admissible");
        }
        let broker_symbol = admissibility.broker_symbol.unwrap_or_else(|| signal.instrument.clone());

        let open_positions = match self.catalog.open_position_count(&agent.id).await {
            Ok(count) => count,
            Err(_) => return Eligibility::Excluded("excluded: failed to check"),
        };
        if open_positions >= agent.max_open_positions {
            return Eligibility::Excluded("max-open-positions-reached");
        }

        if signal.confidence < agent.min_confidence {
            return Eligibility::Excluded("below-min-confidence");
        }

        let balance = match self.broker.get_balance(agent).await {
            Ok(balance) => balance,
            Err(_) => return Eligibility::Excluded("excluded: failed to check"),
        };
        if balance < self.config.minimum_balance {
            return Eligibility::Excluded("insufficient-balance");
        }

        Eligibility::Eligible { broker_symbol, balance }
    }

    /// Light mode (§4.4 step 3): fixed MODERATE band at 70% of balance,
    /// stop/target pass through. Balance floor is enforced in
    /// `check_eligibility`.
    fn validate_light(&self, agent: &Agent, signal: &ComposedSignal, balance: Decimal) -> Option<ValidatedSignal> {
        let size_percent = RiskBand::Moderate.size_percent();
        Some(ValidatedSignal {
            signal: signal.clone(),
            agent_id: agent.id.clone(),
            position_size: (balance * size_percent).min(balance),
            size_percent,
            risk_band: RiskBand::Moderate,
            stop_price_override: None,
            target_price_override: None,
            validated_at: Utc::now(),
        })
    }

    /// Full mode (§4.4 step 3): submit the agent/signal/market bundle to
    /// the opaque validation oracle, translating its risk band into a
    /// balance percentage. Balance floor is enforced in
    /// `check_eligibility`.
    async fn validate_full(&self, agent: &Agent, signal: &ComposedSignal, balance: Decimal, broker_symbol: &str) -> Option<ValidatedSignal> {
        let performance = match self.performance.snapshot(&agent.id).await {
            Ok(snapshot) => snapshot,
            Err(_) => Default::default(),
        };

        let conditions = self.market_conditions(broker_symbol).await;

        let input = ValidationInput { agent: agent.clone(), signal: signal.clone(), performance, conditions };

        let output = match tokio::time::timeout(VALIDATION_TIMEOUT, self.validation_oracle.validate(input)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Broadcast [{}]: validation oracle error for agent {}: {}", signal.instrument, agent.id, e);
                return None;
            }
            Err(_) => {
                warn!("Broadcast [{}]: validation oracle timed out for agent {}", signal.instrument, agent.id);
                return None;
            }
        };

        if !output.should_execute {
            return None;
        }

        let size_percent = output.risk_band.size_percent();
        Some(ValidatedSignal {
            signal: signal.clone(),
            agent_id: agent.id.clone(),
            position_size: (balance * size_percent).min(balance),
            size_percent,
            risk_band: output.risk_band,
            stop_price_override: output.stop_override,
            target_price_override: output.target_override,
            validated_at: Utc::now(),
        })
    }

    async fn market_conditions(&self, broker_symbol: &str) -> MarketConditions {
        match self.broker.ticker(broker_symbol).await {
            Ok(ticker) => {
                let mid = (ticker.bid + ticker.ask) / dec!(2);
                let spread_bps = if mid.is_zero() {
                    0.0
                } else {
                    ((ticker.ask - ticker.bid) / mid * dec!(10000)).to_f64().unwrap_or(0.0)
                };
                let liquidity_bucket = if ticker.quote_volume >= dec!(10_000_000) {
                    "high"
                } else if ticker.quote_volume >= dec!(1_000_000) {
                    "medium"
                } else {
                    "low"
                };
                MarketConditions { liquidity_bucket: liquidity_bucket.into(), spread_bps, volatility_pct: ticker.change_24h_pct.abs() }
            }
            Err(_) => MarketConditions { liquidity_bucket: "unknown".into(), spread_bps: 0.0, volatility_pct: 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::htf::{HtfContext, TrendLabel};
    use crate::domain::engine::oracle::{ConsensusPattern, Recommendation, VoteTally};
    use crate::domain::engine::ports::{AgentPerformanceSnapshot, BrokerCloseResult, BrokerOrderResult, SymbolAdmissibility, Ticker, ValidationOutput};
    use crate::domain::engine::signal::{QualityBreakdown, QualityGrade, SignalAudit};
    use crate::application::engine::queue::InMemoryValidatedSignalQueue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubCatalog(Vec<Agent>);
    #[async_trait]
    impl AgentCatalog for StubCatalog {
        async fn list_active(&self) -> anyhow::Result<Vec<Agent>> {
            Ok(self.0.clone())
        }
        async fn get(&self, agent_id: &str) -> anyhow::Result<Option<Agent>> {
            Ok(self.0.iter().find(|a| a.id == agent_id).cloned())
        }
        async fn open_position_count(&self, _agent_id: &str) -> anyhow::Result<usize> {
            Ok(0)
        }
    }

    struct StubBroker;
    #[async_trait]
    impl BrokerAdapter for StubBroker {
        async fn place_market_order(&self, _: &Agent, _: &str, _: Recommendation, _: Decimal, _: Option<Decimal>, _: Option<Decimal>) -> anyhow::Result<BrokerOrderResult> {
            Ok(BrokerOrderResult { accepted: true, broker_ticket: Some("t1".into()), error: None })
        }
        async fn close_position(&self, _: &Agent, _: &str, _: f64) -> anyhow::Result<BrokerCloseResult> {
            Ok(BrokerCloseResult { accepted: true, realized_pnl: Some(dec!(0)), error: None, supports_partial: true })
        }
        async fn get_balance(&self, _: &Agent) -> anyhow::Result<Decimal> {
            Ok(dec!(1000))
        }
        async fn ticker(&self, _: &str) -> anyhow::Result<Ticker> {
            Ok(Ticker { bid: dec!(99.9), ask: dec!(100.1), last: dec!(100), change_24h_pct: 1.5, quote_volume: dec!(5_000_000) })
        }
    }

    struct AllowAll;
    #[async_trait]
    impl SymbolAdmissibilityLookup for AllowAll {
        async fn check(&self, _: &str, _: &str, _: Option<&str>) -> anyhow::Result<SymbolAdmissibility> {
            Ok(SymbolAdmissibility { allowed: true, broker_symbol: Some("BTC-USD".into()) })
        }
    }

    struct AcceptAll;
    #[async_trait]
    impl ValidationOracle for AcceptAll {
        async fn validate(&self, input: ValidationInput) -> anyhow::Result<ValidationOutput> {
            Ok(ValidationOutput {
                should_execute: true,
                risk_band: RiskBand::Safe,
                reasoning: "ok".into(),
                stop_override: None,
                target_override: None,
                confidence: input.signal.confidence,
                key_risks: vec![],
                key_opportunities: vec![],
            })
        }
    }

    struct DefaultPerformance;
    #[async_trait]
    impl AgentPerformanceProvider for DefaultPerformance {
        async fn snapshot(&self, _: &str) -> anyhow::Result<AgentPerformanceSnapshot> {
            Ok(AgentPerformanceSnapshot::default())
        }
    }

    struct CountingBus(AtomicUsize);
    #[async_trait]
    impl NotificationBus for CountingBus {
        async fn publish(&self, _: Notification) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NullAudit;
    #[async_trait]
    impl AuditLogRepository for NullAudit {
        async fn record_signal(&self, _: &ComposedSignal) -> anyhow::Result<()> {
            Ok(())
        }
        async fn record_rejection(&self, _: &str, _: &str, _: chrono::DateTime<Utc>) -> anyhow::Result<()> {
            Ok(())
        }
        async fn record_exclusion(&self, _: &str, _: uuid::Uuid, _: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn record_validation(&self, _: &ValidatedSignal, _: bool, _: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn agent(id: &str, enable_expensive: bool) -> Agent {
        Agent {
            id: id.into(),
            is_active: true,
            category: "general".into(),
            risk_level: 3,
            budget: dec!(10000),
            allowed_categories: None,
            min_confidence: 50.0,
            max_open_positions: 5,
            enable_expensive_validation: enable_expensive,
            broker: "mock".into(),
        }
    }

    fn signal() -> ComposedSignal {
        ComposedSignal {
            id: uuid::Uuid::new_v4(),
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
                    crate::domain::engine::oracle::OracleVerdict::sentinel(crate::domain::engine::oracle::OracleKind::Fibonacci, "test fixture"),
                    crate::domain::engine::oracle::OracleVerdict::sentinel(crate::domain::engine::oracle::OracleKind::TrendMomentum, "test fixture"),
                    crate::domain::engine::oracle::OracleVerdict::sentinel(crate::domain::engine::oracle::OracleKind::VolumePriceAction, "test fixture"),
                    crate::domain::engine::oracle::OracleVerdict::sentinel(crate::domain::engine::oracle::OracleKind::SupportResistance, "test fixture"),
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

    #[tokio::test]
    async fn fifty_agent_fanout_queues_only_survivors() {
        let mut agents = Vec::new();
        for i in 0..10 {
            let mut a = agent(&format!("inactive-{i}"), false);
            a.is_active = false;
            agents.push(a);
        }
        for i in 0..15 {
            agents.push(agent(&format!("light-{i}"), false));
        }
        for i in 0..25 {
            agents.push(agent(&format!("full-{i}"), true));
        }

        let queue = Arc::new(InMemoryValidatedSignalQueue::new());
        let broadcast = BroadcastValidator::new(
            Arc::new(StubCatalog(agents)),
            Arc::new(StubBroker),
            Arc::new(AllowAll),
            Arc::new(AcceptAll),
            Arc::new(DefaultPerformance),
            Arc::new(CountingBus(AtomicUsize::new(0))),
            Arc::new(NullAudit),
            queue.clone(),
            BroadcastConfig::default(),
        );

        broadcast.broadcast(signal()).await;

        // 15 light-mode + 25 full-mode (AcceptAll always executes) = 40.
        assert_eq!(queue.len().await.unwrap(), 40);
    }
}
