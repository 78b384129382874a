//! Domain types for the real-time signal generation, validation and
//! execution pipeline: candles and timeframe windows, oracle verdicts,
//! higher-timeframe context, composed signals, agents and positions.
//!
//! Everything here is a plain data type or a narrow port trait. The
//! behavior that produces and consumes these types lives under
//! `application::engine`.

pub mod agent;
pub mod candle;
pub mod errors;
pub mod htf;
pub mod indicators;
pub mod oracle;
pub mod ports;
pub mod position;
pub mod signal;
pub mod timeframe;
pub mod window;

pub use agent::{Agent, RiskBand, ValidatedSignal};
pub use candle::Candle;
pub use errors::{BroadcastError, ComposerError, ExecutorError, HtfError, IngestorError, OracleError, PipelineError};
pub use htf::{HtfContext, HtfLevel, HtfLevelSource, HtfLevelType, HtfStrength, HtfTimeframe, Trend};
pub use indicators::IndicatorBundle;
pub use oracle::{
    ConsensusPattern, OracleKind, OracleVerdict, Recommendation, TimeframeAnalysis, VoteTally,
};
pub use position::{ExitDecision, OpenPosition, PositionOrigin};
pub use signal::{ComposedSignal, QualityBreakdown, QualityGrade, RejectionReason};
pub use timeframe::Timeframe;
pub use window::TimeframeWindow;
