use serde::{Deserialize, Serialize};

use super::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

impl Recommendation {
    pub fn is_directional(self) -> bool {
        !matches!(self, Recommendation::Hold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OracleKind {
    Fibonacci,
    TrendMomentum,
    VolumePriceAction,
    SupportResistance,
}

impl OracleKind {
    pub fn all() -> [OracleKind; 4] {
        [
            OracleKind::Fibonacci,
            OracleKind::TrendMomentum,
            OracleKind::VolumePriceAction,
            OracleKind::SupportResistance,
        ]
    }
}

/// Kind-specific fields a verdict may carry, per §3 "typedFields".
/// Narrow, non-overlapping structural data each grader can populate;
/// the composer and monitor read these without reaching into one
/// another's analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleFields {
    pub fib_current_level: Option<String>,
    pub fib_entry_zone_low: Option<f64>,
    pub fib_entry_zone_high: Option<f64>,
    pub ema_trend: Option<String>,
    pub momentum: Option<String>,
    pub reversal_candle: Option<bool>,
    pub nearest_level_price: Option<f64>,
    pub nearest_level_type: Option<String>,
}

/// A single oracle's opinion on one timeframe snapshot. If an oracle
/// fails or times out, this is the sentinel `{kind, Hold, 0}` per §3 —
/// it must never block composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleVerdict {
    pub kind: OracleKind,
    pub recommendation: Recommendation,
    pub confidence: f64,
    pub reasoning: String,
    pub fields: OracleFields,
}

impl OracleVerdict {
    /// The sentinel verdict substituted when an oracle fails, times out,
    /// or returns an unparseable structure (§7 MalformedExternal).
    pub fn sentinel(kind: OracleKind, reasoning: impl Into<String>) -> Self {
        Self {
            kind,
            recommendation: Recommendation::Hold,
            confidence: 0.0,
            reasoning: reasoning.into(),
            fields: OracleFields::default(),
        }
    }
}

/// Raw vote tally across the four oracle recommendations.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub buy: u8,
    pub sell: u8,
    pub hold: u8,
}

impl VoteTally {
    pub fn from_verdicts(verdicts: &[OracleVerdict; 4]) -> Self {
        let mut tally = VoteTally::default();
        for v in verdicts {
            match v.recommendation {
                Recommendation::Buy => tally.buy += 1,
                Recommendation::Sell => tally.sell += 1,
                Recommendation::Hold => tally.hold += 1,
            }
        }
        tally
    }

    pub fn total(&self) -> u8 {
        self.buy + self.sell + self.hold
    }

    /// Count agreeing with `side` (the candidate direction).
    pub fn agreeing(&self, side: Recommendation) -> u8 {
        match side {
            Recommendation::Buy => self.buy,
            Recommendation::Sell => self.sell,
            Recommendation::Hold => self.hold,
        }
    }
}

/// The categorical token from §4.3 Step C, derived from the 4-oracle
/// vote tally on the primary timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusPattern {
    UnanimousBuy,
    UnanimousSell,
    Supermajority,
    MajorityWithNeutrals,
    MildSplit,
    CounterSplit,
    Split,
}

impl ConsensusPattern {
    /// Classify a tally into the §4.3 Step C table, alongside the
    /// dominant directional side when one exists.
    pub fn classify(tally: VoteTally) -> (ConsensusPattern, Option<Recommendation>) {
        let VoteTally { buy, sell, hold } = tally;

        if buy == 4 {
            return (ConsensusPattern::UnanimousBuy, Some(Recommendation::Buy));
        }
        if sell == 4 {
            return (ConsensusPattern::UnanimousSell, Some(Recommendation::Sell));
        }
        if buy == 3 {
            return (ConsensusPattern::Supermajority, Some(Recommendation::Buy));
        }
        if sell == 3 {
            return (ConsensusPattern::Supermajority, Some(Recommendation::Sell));
        }
        if buy == 2 && sell == 0 && hold == 2 {
            return (ConsensusPattern::MajorityWithNeutrals, Some(Recommendation::Buy));
        }
        if sell == 2 && buy == 0 && hold == 2 {
            return (ConsensusPattern::MajorityWithNeutrals, Some(Recommendation::Sell));
        }
        if buy == 2 && sell == 1 && hold == 1 {
            return (ConsensusPattern::MildSplit, Some(Recommendation::Buy));
        }
        if sell == 2 && buy == 1 && hold == 1 {
            return (ConsensusPattern::MildSplit, Some(Recommendation::Sell));
        }
        if buy == 2 && sell == 2 {
            return (ConsensusPattern::CounterSplit, None);
        }
        (ConsensusPattern::Split, None)
    }

    /// Patterns that can never yield a trade, independent of any later step.
    pub fn is_rejected_outright(self) -> bool {
        matches!(self, ConsensusPattern::CounterSplit | ConsensusPattern::Split)
    }
}

/// Bundle of the four oracle verdicts for one timeframe, plus the
/// consensus summary (primary timeframe only — supporting timeframes
/// only need `direction` for confluence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeAnalysis {
    pub timeframe: Timeframe,
    pub verdicts: [OracleVerdict; 4],
    pub tally: VoteTally,
    pub pattern: ConsensusPattern,
    pub direction: Option<Recommendation>,
}

impl TimeframeAnalysis {
    pub fn new(timeframe: Timeframe, verdicts: [OracleVerdict; 4]) -> Self {
        let tally = VoteTally::from_verdicts(&verdicts);
        let (pattern, direction) = ConsensusPattern::classify(tally);
        Self {
            timeframe,
            verdicts,
            tally,
            pattern,
            direction,
        }
    }

    pub fn confidence_for(&self, kind: OracleKind) -> f64 {
        self.verdicts
            .iter()
            .find(|v| v.kind == kind)
            .map(|v| v.confidence)
            .unwrap_or(0.0)
    }

    /// Mean confidence across the four verdicts on the primary timeframe.
    pub fn mean_confidence(&self) -> f64 {
        self.verdicts.iter().map(|v| v.confidence).sum::<f64>() / 4.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(kind: OracleKind, rec: Recommendation, conf: f64) -> OracleVerdict {
        OracleVerdict {
            kind,
            recommendation: rec,
            confidence: conf,
            reasoning: String::new(),
            fields: OracleFields::default(),
        }
    }

    #[test]
    fn classifies_unanimous_buy() {
        let tally = VoteTally { buy: 4, sell: 0, hold: 0 };
        let (pattern, dir) = ConsensusPattern::classify(tally);
        assert_eq!(pattern, ConsensusPattern::UnanimousBuy);
        assert_eq!(dir, Some(Recommendation::Buy));
    }

    #[test]
    fn classifies_counter_split_as_rejected() {
        let tally = VoteTally { buy: 2, sell: 2, hold: 0 };
        let (pattern, dir) = ConsensusPattern::classify(tally);
        assert_eq!(pattern, ConsensusPattern::CounterSplit);
        assert_eq!(dir, None);
        assert!(pattern.is_rejected_outright());
    }

    #[test]
    fn classifies_supermajority_with_mixed_remainder() {
        // 3 buy, 1 hold: supermajority.
        let tally = VoteTally { buy: 3, sell: 0, hold: 1 };
        let (pattern, dir) = ConsensusPattern::classify(tally);
        assert_eq!(pattern, ConsensusPattern::Supermajority);
        assert_eq!(dir, Some(Recommendation::Buy));
    }

    #[test]
    fn timeframe_analysis_tallies_votes() {
        let verdicts = [
            verdict(OracleKind::Fibonacci, Recommendation::Buy, 80.0),
            verdict(OracleKind::TrendMomentum, Recommendation::Buy, 75.0),
            verdict(OracleKind::VolumePriceAction, Recommendation::Buy, 70.0),
            verdict(OracleKind::SupportResistance, Recommendation::Hold, 0.0),
        ];
        let analysis = TimeframeAnalysis::new(Timeframe::OneMin, verdicts);
        assert_eq!(analysis.tally.buy, 3);
        assert_eq!(analysis.pattern, ConsensusPattern::Supermajority);
        assert_eq!(analysis.direction, Some(Recommendation::Buy));
    }
}
