//! Quality score & grade (§4.3 Step L): five capped components summed
//! into a 0-100 total and mapped to a grade-driven size multiplier.

use crate::domain::engine::htf::TrendLabel;
use crate::domain::engine::oracle::ConsensusPattern;
use crate::domain::engine::signal::QualityBreakdown;

fn consensus_points(pattern: ConsensusPattern) -> f64 {
    match pattern {
        ConsensusPattern::UnanimousBuy | ConsensusPattern::UnanimousSell => 25.0,
        ConsensusPattern::Supermajority => 20.0,
        ConsensusPattern::MajorityWithNeutrals => 15.0,
        ConsensusPattern::MildSplit => 10.0,
        ConsensusPattern::CounterSplit | ConsensusPattern::Split => 0.0,
    }
}

/// Scaled from 60-100 confidence onto 0-25, capped.
fn confidence_points(confidence: f64) -> f64 {
    (((confidence - 60.0) / 40.0) * 25.0).clamp(0.0, 25.0)
}

/// Scaled from 1.0-3.0 R:R onto 0-20, capped.
fn risk_reward_points(risk_reward: f64) -> f64 {
    (((risk_reward - 1.0) / 2.0) * 20.0).clamp(0.0, 20.0)
}

fn htf_alignment_points(htf_aligned: bool, htf_neutral: bool) -> f64 {
    if htf_aligned {
        15.0
    } else if htf_neutral {
        8.0
    } else {
        0.0
    }
}

/// Scaled from 35-100 professional score onto 0-15, capped.
fn professional_score_points(professional_score: f64) -> f64 {
    (((professional_score - 35.0) / 65.0) * 15.0).clamp(0.0, 15.0)
}

pub fn compute(
    pattern: ConsensusPattern,
    confidence: f64,
    risk_reward: f64,
    trend: TrendLabel,
    htf_aligned: bool,
    professional_score: f64,
) -> QualityBreakdown {
    let _ = trend;
    QualityBreakdown {
        consensus: consensus_points(pattern),
        confidence: confidence_points(confidence),
        risk_reward: risk_reward_points(risk_reward),
        htf_alignment: htf_alignment_points(htf_aligned, !htf_aligned && trend_is_neutral(trend)),
        professional_score: professional_score_points(professional_score),
    }
}

fn trend_is_neutral(trend: TrendLabel) -> bool {
    trend == TrendLabel::Neutral
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unanimous_high_confidence_strong_rr_grades_a() {
        let breakdown = compute(ConsensusPattern::UnanimousBuy, 90.0, 2.5, TrendLabel::Bullish, true, 80.0);
        assert!(breakdown.total() >= 67.0);
    }

    #[test]
    fn mild_split_low_confidence_grades_low() {
        let breakdown = compute(ConsensusPattern::MildSplit, 55.0, 1.0, TrendLabel::Neutral, false, 40.0);
        assert!(breakdown.total() < 52.0);
    }

    #[test]
    fn components_stay_within_their_caps() {
        let breakdown = compute(ConsensusPattern::UnanimousBuy, 1000.0, 1000.0, TrendLabel::Bullish, true, 1000.0);
        assert_eq!(breakdown.confidence, 25.0);
        assert_eq!(breakdown.risk_reward, 20.0);
        assert_eq!(breakdown.professional_score, 15.0);
    }
}
