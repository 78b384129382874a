//! In-memory/mock implementations of every §6 collaborator port the
//! signal pipeline depends on. These are the only concrete adapters
//! this crate ships (§1: concrete exchange adapters, the HTTP/WS
//! transports and the oracle prompting are out of scope); they exist
//! to exercise the pipeline end-to-end in tests and as a template for
//! a real deployment's adapters, the way [`crate::infrastructure::mock`]
//! does for the rest of this crate's services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{mpsc, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::domain::engine::agent::{Agent, RiskBand, ValidatedSignal};
use crate::domain::engine::candle::CandleEvent;
use crate::domain::engine::oracle::Recommendation;
use crate::domain::engine::ports::{
    AgentCatalog, AgentPerformanceProvider, AgentPerformanceSnapshot, AuditLogRepository, BrokerAdapter,
    BrokerCloseResult, BrokerOrderResult, MarketDataTransport, Notification, NotificationBus, SymbolAdmissibility,
    SymbolAdmissibilityLookup, Ticker, ValidatedSignalQueueRepository, ValidationInput, ValidationOracle,
    ValidationOutput,
};
use crate::domain::engine::position::OpenPosition;
use crate::domain::engine::signal::ComposedSignal;
use crate::domain::engine::timeframe::Timeframe;
use crate::infrastructure::core::TokenBucket;

/// A transport with no live feed: `subscribe` returns an open-but-silent
/// channel and `backfill` always fails. Useful as a null object when a
/// pipeline is assembled for components that don't touch the ingestor.
pub struct NullMarketDataTransport;

#[async_trait]
impl MarketDataTransport for NullMarketDataTransport {
    async fn subscribe(&self, _instrument: &str, _timeframes: &[Timeframe]) -> Result<mpsc::Receiver<CandleEvent>> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn backfill(&self, instrument: &str, timeframe: Timeframe, _limit: usize) -> Result<Vec<CandleEvent>> {
        anyhow::bail!("no backfill available for {instrument} {timeframe} (null transport)")
    }
}

/// A scripted transport that replays a fixed candle sequence as backfill
/// and never emits live events, for composer/HTF-context smoke tests
/// that need real history but no streaming.
pub struct StaticMarketDataTransport {
    history: HashMap<(String, Timeframe), Vec<CandleEvent>>,
}

impl StaticMarketDataTransport {
    pub fn new() -> Self {
        Self { history: HashMap::new() }
    }

    pub fn with_history(mut self, instrument: &str, timeframe: Timeframe, candles: Vec<CandleEvent>) -> Self {
        self.history.insert((instrument.to_string(), timeframe), candles);
        self
    }
}

impl Default for StaticMarketDataTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataTransport for StaticMarketDataTransport {
    async fn subscribe(&self, _instrument: &str, _timeframes: &[Timeframe]) -> Result<mpsc::Receiver<CandleEvent>> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn backfill(&self, instrument: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<CandleEvent>> {
        let key = (instrument.to_string(), timeframe);
        let candles = self.history.get(&key).cloned().unwrap_or_default();
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }
}

/// A broker that accepts every order and close at the requested size,
/// handing back a sequential ticket and a fixed ticker. Mirrors
/// `infrastructure::mock::MockExecutionService`'s always-fill posture.
pub struct MockBrokerAdapter {
    next_ticket: AtomicI64,
    balance: Decimal,
    ticker: Ticker,
    supports_partial: bool,
    rate_limiter: TokenBucket,
}

impl MockBrokerAdapter {
    /// A generous default, wide enough that no test or single-instrument
    /// deployment observes throttling; a real exchange adapter would size
    /// this from the broker's published rate limits.
    const DEFAULT_CAPACITY: i64 = 50;
    const DEFAULT_REFILL_PER_SEC: f64 = 20.0;

    pub fn new() -> Self {
        Self {
            next_ticket: AtomicI64::new(1),
            balance: dec!(10_000),
            ticker: Ticker { bid: dec!(99.9), ask: dec!(100.1), last: dec!(100), change_24h_pct: 0.5, quote_volume: dec!(5_000_000) },
            supports_partial: true,
            rate_limiter: TokenBucket::new(Self::DEFAULT_CAPACITY, Self::DEFAULT_REFILL_PER_SEC),
        }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn without_partial_close(mut self) -> Self {
        self.supports_partial = false;
        self
    }
}

impl Default for MockBrokerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerAdapter for MockBrokerAdapter {
    async fn place_market_order(
        &self,
        agent: &Agent,
        symbol: &str,
        side: Recommendation,
        quantity: Decimal,
        _stop: Option<Decimal>,
        _target: Option<Decimal>,
    ) -> Result<BrokerOrderResult> {
        self.rate_limiter.acquire().await;
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        info!("MockBroker: filled {:?} {} {} for agent {}", side, quantity, symbol, agent.id);
        Ok(BrokerOrderResult { accepted: true, broker_ticket: Some(format!("mock-{ticket}")), error: None })
    }

    async fn close_position(&self, _agent: &Agent, broker_ticket: &str, fraction: f64) -> Result<BrokerCloseResult> {
        self.rate_limiter.acquire().await;
        info!("MockBroker: closing {:.0}% of {}", fraction * 100.0, broker_ticket);
        Ok(BrokerCloseResult { accepted: true, realized_pnl: Some(Decimal::ZERO), error: None, supports_partial: self.supports_partial })
    }

    async fn get_balance(&self, _agent: &Agent) -> Result<Decimal> {
        Ok(self.balance)
    }

    async fn ticker(&self, _symbol: &str) -> Result<Ticker> {
        Ok(self.ticker.clone())
    }
}

/// Accepts every signal at the agent's own risk level bucketed into a
/// risk band, a conservative stand-in for the opaque validation oracle.
pub struct ConservativeValidationOracle;

#[async_trait]
impl ValidationOracle for ConservativeValidationOracle {
    async fn validate(&self, input: ValidationInput) -> Result<ValidationOutput> {
        let risk_band = match input.agent.risk_level {
            1..=2 => RiskBand::Safe,
            3 => RiskBand::Moderate,
            _ => RiskBand::Risky,
        };
        Ok(ValidationOutput {
            should_execute: input.performance.consecutive_losses < 5,
            risk_band,
            reasoning: "mock validation: accepted on agent risk level and recent performance".into(),
            stop_override: None,
            target_override: None,
            confidence: input.signal.confidence,
            key_risks: vec![],
            key_opportunities: vec![],
        })
    }
}

/// Admits every symbol unchanged, with no broker-specific remapping.
pub struct PermissiveAdmissibilityLookup;

#[async_trait]
impl SymbolAdmissibilityLookup for PermissiveAdmissibilityLookup {
    async fn check(&self, universal_symbol: &str, _broker: &str, _agent_category: Option<&str>) -> Result<SymbolAdmissibility> {
        Ok(SymbolAdmissibility { allowed: true, broker_symbol: Some(universal_symbol.to_string()) })
    }
}

/// Flat default performance snapshot for every agent — no losing
/// streak, a neutral win rate, no drawdown (§9 open question A.6).
pub struct StaticAgentPerformanceProvider;

#[async_trait]
impl AgentPerformanceProvider for StaticAgentPerformanceProvider {
    async fn snapshot(&self, _agent_id: &str) -> Result<AgentPerformanceSnapshot> {
        Ok(AgentPerformanceSnapshot::default())
    }
}

/// `tracing`-backed fire-and-forget notification bus (§6): publishing
/// never fails and never blocks the caller beyond a log write.
pub struct TracingNotificationBus;

#[async_trait]
impl NotificationBus for TracingNotificationBus {
    async fn publish(&self, notification: Notification) {
        match notification {
            Notification::SignalBroadcastComplete { signal_id, eligible, validated } => {
                info!("notification signal.broadcast.complete: {} reached {} eligible, {} validated", signal_id, eligible, validated);
            }
            Notification::SignalAgentValidated { signal_id, agent_id, accepted } => {
                info!("notification signal.agent.validated: {} agent {} accepted={}", signal_id, agent_id, accepted);
            }
            Notification::PositionOpened { trade_id, agent_id, instrument } => {
                info!("notification position.opened: {} agent {} on {}", trade_id, agent_id, instrument);
            }
            Notification::PositionClosed { trade_id, agent_id, realized_pnl } => {
                info!("notification position.closed: {} agent {} pnl={:?}", trade_id, agent_id, realized_pnl);
            }
        }
    }
}

/// In-memory, process-lifetime agent population. A durable catalog
/// (backed by the user-facing CRUD, out of scope per §1) would
/// implement the same trait against a real store.
pub struct InMemoryAgentCatalog {
    agents: RwLock<HashMap<String, Agent>>,
    open_positions: RwLock<HashMap<String, usize>>,
}

impl InMemoryAgentCatalog {
    pub fn new(agents: Vec<Agent>) -> Self {
        let open_positions = agents.iter().map(|a| (a.id.clone(), 0)).collect();
        let agents = agents.into_iter().map(|a| (a.id.clone(), a)).collect();
        Self { agents: RwLock::new(agents), open_positions: RwLock::new(open_positions) }
    }

    pub async fn set_open_positions(&self, agent_id: &str, count: usize) {
        self.open_positions.write().await.insert(agent_id.to_string(), count);
    }
}

#[async_trait]
impl AgentCatalog for InMemoryAgentCatalog {
    async fn list_active(&self) -> Result<Vec<Agent>> {
        Ok(self.agents.read().await.values().filter(|a| a.is_active).cloned().collect())
    }

    async fn get(&self, agent_id: &str) -> Result<Option<Agent>> {
        Ok(self.agents.read().await.get(agent_id).cloned())
    }

    async fn open_position_count(&self, agent_id: &str) -> Result<usize> {
        Ok(self.open_positions.read().await.get(agent_id).copied().unwrap_or(0))
    }
}

/// Append-only, in-process audit log (§6 "Persistence of observability").
/// Every record is also emitted through `tracing` so a log shipper sees
/// it without touching this store.
#[derive(Default)]
pub struct InMemoryAuditLog {
    signals: RwLock<Vec<ComposedSignal>>,
    rejections: RwLock<Vec<(String, String, DateTime<Utc>)>>,
    exclusions: RwLock<Vec<(String, Uuid, String)>>,
    validations: RwLock<Vec<(ValidatedSignal, bool, String)>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn signal_count(&self) -> usize {
        self.signals.read().await.len()
    }

    pub async fn rejection_count(&self) -> usize {
        self.rejections.read().await.len()
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLog {
    async fn record_signal(&self, signal: &ComposedSignal) -> Result<()> {
        info!("audit signal: {} {:?} grade {:?}", signal.id, signal.direction, signal.quality_grade);
        self.signals.write().await.push(signal.clone());
        Ok(())
    }

    async fn record_rejection(&self, instrument: &str, reason: &str, at: DateTime<Utc>) -> Result<()> {
        info!("audit rejection: {} reason={}", instrument, reason);
        self.rejections.write().await.push((instrument.to_string(), reason.to_string(), at));
        Ok(())
    }

    async fn record_exclusion(&self, agent_id: &str, signal_id: Uuid, reason: &str) -> Result<()> {
        self.exclusions.write().await.push((agent_id.to_string(), signal_id, reason.to_string()));
        Ok(())
    }

    async fn record_validation(&self, validated: &ValidatedSignal, accepted: bool, reasoning: &str) -> Result<()> {
        self.validations.write().await.push((validated.clone(), accepted, reasoning.to_string()));
        Ok(())
    }
}

/// In-memory open-position store, reconstructed at startup by scanning
/// whatever is currently resident (§4.5 "Persistence"). A durable
/// implementation would instead query a trade store for status="open"
/// rows within the lookback window.
#[derive(Default)]
pub struct InMemoryOpenPositionRepository {
    positions: RwLock<HashMap<String, OpenPosition>>,
}

impl InMemoryOpenPositionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl crate::domain::engine::ports::OpenPositionRepository for InMemoryOpenPositionRepository {
    async fn save(&self, position: &OpenPosition) -> Result<()> {
        self.positions.write().await.insert(position.trade_id.clone(), position.clone());
        Ok(())
    }

    async fn remove(&self, trade_id: &str) -> Result<()> {
        self.positions.write().await.remove(trade_id);
        Ok(())
    }

    async fn load_open_within(&self, since: DateTime<Utc>) -> Result<Vec<OpenPosition>> {
        Ok(self.positions.read().await.values().filter(|p| p.opened_at >= since).cloned().collect())
    }
}

/// Bundles every mock adapter the pipeline needs, built once and shared
/// across `Arc`s the way `application::bootstrap::services` assembles
/// its `ServicesHandle`.
pub struct MockCollaborators {
    pub transport: Arc<dyn MarketDataTransport>,
    pub broker: Arc<dyn BrokerAdapter>,
    pub admissibility: Arc<dyn SymbolAdmissibilityLookup>,
    pub validation_oracle: Arc<dyn ValidationOracle>,
    pub performance: Arc<dyn AgentPerformanceProvider>,
    pub notifications: Arc<dyn NotificationBus>,
    pub audit: Arc<InMemoryAuditLog>,
    pub queue: Arc<dyn ValidatedSignalQueueRepository>,
    pub catalog: Arc<InMemoryAgentCatalog>,
    pub positions: Arc<InMemoryOpenPositionRepository>,
}

impl MockCollaborators {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self {
            transport: Arc::new(NullMarketDataTransport),
            broker: Arc::new(MockBrokerAdapter::new()),
            admissibility: Arc::new(PermissiveAdmissibilityLookup),
            validation_oracle: Arc::new(ConservativeValidationOracle),
            performance: Arc::new(StaticAgentPerformanceProvider),
            notifications: Arc::new(TracingNotificationBus),
            audit: Arc::new(InMemoryAuditLog::new()),
            queue: Arc::new(crate::application::engine::queue::InMemoryValidatedSignalQueue::new()),
            catalog: Arc::new(InMemoryAgentCatalog::new(agents)),
            positions: Arc::new(InMemoryOpenPositionRepository::new()),
        }
    }
}
