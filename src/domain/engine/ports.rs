//! Narrow, transport-agnostic boundary traits for every external
//! collaborator named in §6. Concrete exchange adapters, the HTTP/WS
//! transports, and the validation-oracle prompting are all out of
//! scope (§1) — only these interfaces are specified.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc::Receiver;

use super::agent::{Agent, RiskBand, ValidatedSignal};
use super::candle::CandleEvent;
use super::oracle::{OracleFields, OracleVerdict, Recommendation};
use super::position::OpenPosition;
use super::signal::ComposedSignal;
use super::timeframe::Timeframe;

/// Inbound candle stream plus the backfill request of §6.
#[async_trait]
pub trait MarketDataTransport: Send + Sync {
    async fn subscribe(
        &self,
        instrument: &str,
        timeframes: &[Timeframe],
    ) -> Result<Receiver<CandleEvent>>;

    async fn backfill(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<CandleEvent>>;
}

/// Input handed to a pattern oracle: a timeframe snapshot plus current price.
#[derive(Debug, Clone)]
pub struct OracleInput<'a> {
    pub candles: &'a [&'a super::candle::Candle],
    pub indicators: super::indicators::IndicatorBundle,
    pub current_price: Decimal,
    pub timeframe: Timeframe,
}

/// One of the four pattern graders (§3, §9). Opaque, potentially slow,
/// individually fallible — callers are expected to apply their own
/// timeout and substitute `OracleVerdict::sentinel` on failure.
#[async_trait]
pub trait PatternOracle: Send + Sync {
    fn kind(&self) -> super::oracle::OracleKind;
    async fn analyze(&self, input: OracleInput<'_>) -> Result<OracleVerdict>;
}

/// Parse a recommendation from kind-specific fields if present, else
/// fall back to directional-keyword counting in free-text reasoning —
/// ties resolve to HOLD, never a silent BUY bias (§4.3 Step B).
pub fn parse_recommendation(fields: &OracleFields, reasoning: &str) -> Recommendation {
    if let Some(level) = &fields.ema_trend {
        let lower = level.to_lowercase();
        if lower.contains("bull") {
            return Recommendation::Buy;
        }
        if lower.contains("bear") {
            return Recommendation::Sell;
        }
    }

    let lower = reasoning.to_lowercase();
    const BUY_WORDS: [&str; 6] = ["bullish", "buy", "long", "uptrend", "breakout", "support hold"];
    const SELL_WORDS: [&str; 6] = ["bearish", "sell", "short", "downtrend", "breakdown", "resistance reject"];

    let buy_hits = BUY_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let sell_hits = SELL_WORDS.iter().filter(|w| lower.contains(*w)).count();

    match buy_hits.cmp(&sell_hits) {
        std::cmp::Ordering::Greater => Recommendation::Buy,
        std::cmp::Ordering::Less => Recommendation::Sell,
        std::cmp::Ordering::Equal => Recommendation::Hold,
    }
}

/// Market-conditions bundle submitted alongside the agent/signal context
/// for full-mode validation (§4.4 step 3, §6).
#[derive(Debug, Clone)]
pub struct MarketConditions {
    pub liquidity_bucket: String,
    pub spread_bps: f64,
    pub volatility_pct: f64,
}

#[derive(Debug, Clone)]
pub struct ValidationInput {
    pub agent: Agent,
    pub signal: ComposedSignal,
    pub performance: AgentPerformanceSnapshot,
    pub conditions: MarketConditions,
}

#[derive(Debug, Clone)]
pub struct ValidationOutput {
    pub should_execute: bool,
    pub risk_band: RiskBand,
    pub reasoning: String,
    pub stop_override: Option<Decimal>,
    pub target_override: Option<Decimal>,
    pub confidence: f64,
    pub key_risks: Vec<String>,
    pub key_opportunities: Vec<String>,
}

/// Per-agent full-mode validation oracle. Treated as a black box — the
/// pipeline commits only to this input/output schema (§9).
#[async_trait]
pub trait ValidationOracle: Send + Sync {
    async fn validate(&self, input: ValidationInput) -> Result<ValidationOutput>;
}

#[derive(Debug, Clone, Copy)]
pub struct AgentPerformanceSnapshot {
    pub consecutive_losses: u32,
    pub recent_win_rate: f64,
    pub recent_pnl: Decimal,
    pub current_drawdown_pct: f64,
}

impl Default for AgentPerformanceSnapshot {
    fn default() -> Self {
        Self {
            consecutive_losses: 0,
            recent_win_rate: 0.5,
            recent_pnl: Decimal::ZERO,
            current_drawdown_pct: 0.0,
        }
    }
}

/// Resolves an agent's trading history into the performance snapshot
/// consumed by full-mode validation. §9 open question: the source's
/// contract for this store wasn't specified, so this crate defines and
/// tests it explicitly.
#[async_trait]
pub trait AgentPerformanceProvider: Send + Sync {
    async fn snapshot(&self, agent_id: &str) -> Result<AgentPerformanceSnapshot>;
}

#[derive(Debug, Clone)]
pub struct BrokerOrderResult {
    pub accepted: bool,
    pub broker_ticket: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BrokerCloseResult {
    pub accepted: bool,
    pub realized_pnl: Option<Decimal>,
    pub error: Option<String>,
    /// `false` when the broker cannot natively partial-close — callers
    /// must downgrade to a logged no-op (§4.5 Monitor).
    pub supports_partial: bool,
}

#[derive(Debug, Clone)]
pub struct Ticker {
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub change_24h_pct: f64,
    pub quote_volume: Decimal,
}

/// Out-of-scope broker execution surface (§1, §6). Concrete exchange
/// adapters live outside this crate; this is only the seam the
/// Executor and Monitor call through.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    async fn place_market_order(
        &self,
        agent: &Agent,
        symbol: &str,
        side: Recommendation,
        quantity: Decimal,
        stop: Option<Decimal>,
        target: Option<Decimal>,
    ) -> Result<BrokerOrderResult>;

    async fn close_position(
        &self,
        agent: &Agent,
        broker_ticket: &str,
        fraction: f64,
    ) -> Result<BrokerCloseResult>;

    async fn get_balance(&self, agent: &Agent) -> Result<Decimal>;

    async fn ticker(&self, symbol: &str) -> Result<Ticker>;
}

/// Read-mostly agent population (§6 "Agent catalog").
#[async_trait]
pub trait AgentCatalog: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Agent>>;
    async fn get(&self, agent_id: &str) -> Result<Option<Agent>>;
    async fn open_position_count(&self, agent_id: &str) -> Result<usize>;
}

/// Universal-symbol → broker-symbol capability lookup (§4.6).
#[derive(Debug, Clone)]
pub struct SymbolAdmissibility {
    pub allowed: bool,
    pub broker_symbol: Option<String>,
}

#[async_trait]
pub trait SymbolAdmissibilityLookup: Send + Sync {
    async fn check(
        &self,
        universal_symbol: &str,
        broker: &str,
        agent_category: Option<&str>,
    ) -> Result<SymbolAdmissibility>;
}

/// Fire-and-forget notification topics (§6).
#[derive(Debug, Clone)]
pub enum Notification {
    SignalBroadcastComplete { signal_id: uuid::Uuid, eligible: usize, validated: usize },
    SignalAgentValidated { signal_id: uuid::Uuid, agent_id: String, accepted: bool },
    PositionOpened { trade_id: String, agent_id: String, instrument: String },
    PositionClosed { trade_id: String, agent_id: String, realized_pnl: Option<Decimal> },
}

#[async_trait]
pub trait NotificationBus: Send + Sync {
    async fn publish(&self, notification: Notification);
}

/// Append-only audit log for composed signals, exclusions, validations
/// and open/close events (§6 "Persistence of observability"). JSON-ish,
/// re-readable by tooling external to the pipeline.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn record_signal(&self, signal: &ComposedSignal) -> Result<()>;
    async fn record_rejection(&self, instrument: &str, reason: &str, at: DateTime<Utc>) -> Result<()>;
    async fn record_exclusion(&self, agent_id: &str, signal_id: uuid::Uuid, reason: &str) -> Result<()>;
    async fn record_validation(&self, validated: &ValidatedSignal, accepted: bool, reasoning: &str) -> Result<()>;
}

/// At-least-once, idempotent-consumer queue keyed by `(signal_id,
/// agent_id)` (§6, §8 "executor idempotence").
#[async_trait]
pub trait ValidatedSignalQueueRepository: Send + Sync {
    async fn push(&self, validated: ValidatedSignal) -> Result<()>;
    async fn pop_highest_priority(&self) -> Result<Option<ValidatedSignal>>;
    async fn is_consumed(&self, signal_id: uuid::Uuid, agent_id: &str) -> Result<bool>;
    async fn mark_consumed(&self, signal_id: uuid::Uuid, agent_id: &str) -> Result<()>;
    async fn len(&self) -> Result<usize>;
}

/// Open-position persistence for startup reconstruction (§4.5).
#[async_trait]
pub trait OpenPositionRepository: Send + Sync {
    async fn save(&self, position: &OpenPosition) -> Result<()>;
    async fn remove(&self, trade_id: &str) -> Result<()>;
    async fn load_open_within(&self, since: DateTime<Utc>) -> Result<Vec<OpenPosition>>;
}
