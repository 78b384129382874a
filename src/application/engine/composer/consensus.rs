//! Multi-timeframe confluence (§4.3 Step D) and the dynamic required-
//! consensus check (§4.3 Step F).

use crate::domain::engine::oracle::{Recommendation, TimeframeAnalysis};

/// Fraction of `supporting` timeframes whose direction matches
/// `primary_direction`, expressed as a 0-100 percentage.
pub fn confluence_pct(primary_direction: Recommendation, supporting: &[TimeframeAnalysis]) -> f64 {
    if supporting.is_empty() {
        return 0.0;
    }
    let matching = supporting.iter().filter(|a| a.direction == Some(primary_direction)).count();
    (matching as f64 / supporting.len() as f64) * 100.0
}

/// Non-punitive confidence blend (§4.3 Step D): confluence amplifies
/// rather than dilutes the primary oracle confidence.
pub fn overall_confidence(primary_confidence: f64, confluence_pct: f64) -> f64 {
    primary_confidence * 0.7 + primary_confidence * (confluence_pct / 100.0) * 0.3
}

/// Required agreeing-vote count is 2 when confidence >= 80 and HTF
/// aligned, else 3 (§4.3 Step F).
pub fn required_consensus(overall_confidence: f64, htf_aligned: bool) -> u8 {
    if overall_confidence >= 80.0 && htf_aligned {
        2
    } else {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::oracle::{ConsensusPattern, OracleFields, OracleKind, OracleVerdict, VoteTally};

    fn analysis(direction: Option<Recommendation>) -> TimeframeAnalysis {
        let verdict = OracleVerdict {
            kind: OracleKind::Fibonacci,
            recommendation: direction.unwrap_or(Recommendation::Hold),
            confidence: 50.0,
            reasoning: String::new(),
            fields: OracleFields::default(),
        };
        TimeframeAnalysis {
            timeframe: crate::domain::engine::timeframe::Timeframe::FifteenMin,
            verdicts: [verdict.clone(), verdict.clone(), verdict.clone(), verdict],
            tally: VoteTally::default(),
            pattern: ConsensusPattern::Split,
            direction,
        }
    }

    #[test]
    fn confluence_counts_matching_direction() {
        let supporting = vec![analysis(Some(Recommendation::Buy)), analysis(Some(Recommendation::Sell))];
        assert_eq!(confluence_pct(Recommendation::Buy, &supporting), 50.0);
    }

    #[test]
    fn confluence_amplifies_not_dilutes() {
        let blended = overall_confidence(80.0, 100.0);
        assert!((blended - 80.0).abs() < 1e-9);
        let blended_partial = overall_confidence(80.0, 0.0);
        assert!((blended_partial - 56.0).abs() < 1e-9);
    }

    #[test]
    fn required_consensus_relaxes_at_high_confidence_and_alignment() {
        assert_eq!(required_consensus(85.0, true), 2);
        assert_eq!(required_consensus(85.0, false), 3);
        assert_eq!(required_consensus(60.0, true), 3);
    }
}
