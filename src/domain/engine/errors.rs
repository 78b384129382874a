use thiserror::Error;

/// Errors surfaced by the Market Data Ingestor.
#[derive(Debug, Error)]
pub enum IngestorError {
    #[error("transport disconnected: {reason}")]
    Disconnected { reason: String },

    #[error("backfill failed for {instrument} {timeframe}: {reason}")]
    BackfillFailed { instrument: String, timeframe: String, reason: String },

    #[error("subscription failed: {reason}")]
    SubscriptionFailed { reason: String },
}

/// Errors surfaced by HTF Context.
#[derive(Debug, Error)]
pub enum HtfError {
    #[error("HTF cache stale and refresh failed for {instrument}: {reason}")]
    Stale { instrument: String, reason: String },

    #[error("insufficient HTF history for {instrument} {timeframe}")]
    InsufficientHistory { instrument: String, timeframe: String },
}

/// Errors surfaced by an individual pattern oracle invocation.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("oracle returned malformed output: {reason}")]
    Malformed { reason: String },
}

/// Canonical rejection/error surface for the Signal Composer. A
/// rejection is not an error in the Rust sense (§7 "rejections are
/// audit events, not errors") but is represented here so the composer's
/// step functions can use `?` while keeping the distinction explicit at
/// the call site via `ComposerOutcome`.
#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("precondition violated: {reason}")]
    PreconditionViolation { reason: String },

    #[error("HTF context unavailable: {0}")]
    Htf(#[from] HtfError),
}

/// Errors surfaced by Broadcast & Validator.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to check balance for agent {agent_id}: {reason}")]
    BalanceCheckFailed { agent_id: String, reason: String },

    #[error("failed to check open positions for agent {agent_id}: {reason}")]
    OpenPositionsCheckFailed { agent_id: String, reason: String },

    #[error("validation oracle timed out for agent {agent_id}")]
    ValidationTimeout { agent_id: String },
}

/// Errors surfaced by the Executor and Monitor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("broker rejected order for {instrument}: {code}")]
    BrokerRejected { instrument: String, code: String },

    #[error("broker call timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("symbol {instrument} not admissible on broker {broker}")]
    SymbolNotAdmissible { instrument: String, broker: String },
}

/// The top-level domain error taxonomy of §7, used at component
/// boundaries that need to distinguish retryable conditions from ones
/// that halt the component.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transient external failure: {0}")]
    TransientExternal(String),

    #[error("malformed external response: {0}")]
    MalformedExternal(String),

    #[error("stale cache: {0}")]
    Stale(String),

    #[error("precondition violation: {0}")]
    PreconditionViolation(String),

    #[error("broker rejected: {0}")]
    BrokerRejected(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<IngestorError> for PipelineError {
    fn from(e: IngestorError) -> Self {
        match e {
            IngestorError::Disconnected { .. } | IngestorError::SubscriptionFailed { .. } => {
                PipelineError::TransientExternal(e.to_string())
            }
            IngestorError::BackfillFailed { .. } => PipelineError::TransientExternal(e.to_string()),
        }
    }
}

impl From<HtfError> for PipelineError {
    fn from(e: HtfError) -> Self {
        PipelineError::Stale(e.to_string())
    }
}

impl From<OracleError> for PipelineError {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::Timeout { .. } => PipelineError::TransientExternal(e.to_string()),
            OracleError::Malformed { .. } => PipelineError::MalformedExternal(e.to_string()),
        }
    }
}

impl From<ExecutorError> for PipelineError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::BrokerRejected { .. } => PipelineError::BrokerRejected(e.to_string()),
            ExecutorError::Timeout { .. } => PipelineError::TransientExternal(e.to_string()),
            ExecutorError::SymbolNotAdmissible { .. } => PipelineError::PreconditionViolation(e.to_string()),
        }
    }
}
