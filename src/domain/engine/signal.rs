use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::htf::HtfContext;
use super::oracle::{ConsensusPattern, OracleVerdict, Recommendation, VoteTally};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
}

impl QualityGrade {
    /// §4.3 Step L grade thresholds.
    pub fn from_score(score: f64) -> Self {
        if score >= 67.0 {
            QualityGrade::A
        } else if score >= 52.0 {
            QualityGrade::B
        } else if score >= 35.0 {
            QualityGrade::C
        } else {
            QualityGrade::D
        }
    }

    /// Quality size multiplier, A=1.0 / B=0.5, else 0.25 (a worse-than-C
    /// grade still emits per Step L's "never-reject" framing elsewhere in
    /// the filter stack, but should not size like a B).
    pub fn size_multiplier(self) -> f64 {
        match self {
            QualityGrade::A => 1.0,
            QualityGrade::B => 0.5,
            QualityGrade::C => 0.25,
            QualityGrade::D => 0.1,
        }
    }
}

/// The five §4.3 Step L components, each already capped, for audit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityBreakdown {
    pub consensus: f64,
    pub confidence: f64,
    pub risk_reward: f64,
    pub htf_alignment: f64,
    pub professional_score: f64,
}

impl QualityBreakdown {
    pub fn total(&self) -> f64 {
        self.consensus + self.confidence + self.risk_reward + self.htf_alignment + self.professional_score
    }
}

/// Canonical rejection reasons recorded by the filter stack (§4.3
/// "State machine"). Every rejection carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    Spacing,
    CounterSplit,
    Split,
    InsufficientConsensus,
    BelowConfidenceFloor,
    MissingStopOrTarget,
    NonPositiveReward,
    BelowRiskRewardFloor,
    HtfCounterBelowInversionThreshold,
    OracleDegraded,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::Spacing => "spacing",
            RejectionReason::CounterSplit => "counter-split",
            RejectionReason::Split => "split",
            RejectionReason::InsufficientConsensus => "insufficient-consensus",
            RejectionReason::BelowConfidenceFloor => "below-confidence-floor",
            RejectionReason::MissingStopOrTarget => "missing-stop-or-target",
            RejectionReason::NonPositiveReward => "non-positive-reward",
            RejectionReason::BelowRiskRewardFloor => "below-risk-reward-floor",
            RejectionReason::HtfCounterBelowInversionThreshold => "htf-counter-below-inversion-threshold",
            RejectionReason::OracleDegraded => "oracle-degraded",
        }
    }
}

/// Audit trail for a composed signal: the inputs that produced it,
/// preserved verbatim for replay and external review (§6 "Persistence
/// of observability").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalAudit {
    pub primary_tally: VoteTally,
    pub primary_pattern: ConsensusPattern,
    /// The four primary-timeframe verdicts as they stood at composition,
    /// preserved so the Monitor can diff entry-time typed fields (fib
    /// level, EMA trend, momentum) against a later primary close (§4.5).
    pub primary_verdicts: [OracleVerdict; 4],
    pub confluence_pct: f64,
    pub htf_snapshot: HtfContext,
    pub htf_aligned: bool,
    pub htf_neutral: bool,
    pub htf_counter: bool,
    pub inverted: bool,
    pub professional_score_raw: f64,
    pub professional_score_adjusted: f64,
    pub warnings: u8,
    pub quality: QualityBreakdown,
}

/// The final output of the Signal Composer (§3 "Composed signal").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedSignal {
    pub id: Uuid,
    pub instrument: String,
    pub direction: Recommendation,
    pub confidence: f64,
    pub entry: Decimal,
    pub stop: Decimal,
    pub target: Decimal,
    pub risk_reward: f64,
    pub quality_grade: QualityGrade,
    pub quality_total: f64,
    pub size_multiplier: f64,
    pub reasoning: String,
    pub origin_oracles: VoteTally,
    pub audit: SignalAudit,
    pub emitted_at: DateTime<Utc>,
}

impl ComposedSignal {
    /// Realized risk:reward — entry/stop/target must already be finite
    /// and on the correct side for this to be meaningful; callers check
    /// I3 before relying on it.
    pub fn risk(&self) -> Decimal {
        (self.entry - self.stop).abs()
    }

    pub fn reward(&self) -> Decimal {
        (self.target - self.entry).abs()
    }
}
