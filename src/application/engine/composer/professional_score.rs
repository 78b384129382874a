//! Professional-entry score (§4.3 Step K): market structure, optimal
//! entry zone, order block and liquidity sweep sub-analyses, combined
//! into a 0-100 score and a never-reject size-multiplier tier.

use rust_decimal::prelude::ToPrimitive;

use crate::domain::engine::candle::Candle;
use crate::domain::engine::oracle::Recommendation;

pub struct ProfessionalScore {
    pub raw: f64,
    pub adjusted: f64,
    pub warnings: u8,
    pub tier_multiplier: f64,
}

fn market_structure_points(candles: &[&Candle], direction: Recommendation) -> (f64, bool) {
    if candles.len() < 6 {
        return (0.0, true);
    }
    let recent = &candles[candles.len() - 6..];
    let highs: Vec<f64> = recent.iter().map(|c| c.high.to_f64().unwrap_or(0.0)).collect();
    let lows: Vec<f64> = recent.iter().map(|c| c.low.to_f64().unwrap_or(0.0)).collect();

    let hh_hl = highs.windows(2).filter(|w| w[1] > w[0]).count() + lows.windows(2).filter(|w| w[1] > w[0]).count();
    let lh_ll = highs.windows(2).filter(|w| w[1] < w[0]).count() + lows.windows(2).filter(|w| w[1] < w[0]).count();

    let aligned_pairs = match direction {
        Recommendation::Buy => hh_hl,
        Recommendation::Sell => lh_ll,
        Recommendation::Hold => 0,
    };
    let total_pairs = 10usize;

    let score = 30.0 * (aligned_pairs as f64 / total_pairs as f64).min(1.0);
    (score, score < 10.0)
}

/// 30 points inside the direction's OTE zone, 15 on the correct side of
/// the 50% equilibrium, else 0.
fn ote_points(current_price: f64, fib_entry_zone_low: Option<f64>, fib_entry_zone_high: Option<f64>, direction: Recommendation) -> (f64, bool) {
    match (fib_entry_zone_low, fib_entry_zone_high) {
        (Some(low), Some(high)) => {
            if current_price >= low && current_price <= high {
                (30.0, false)
            } else {
                let midpoint = (low + high) / 2.0;
                let correct_side = match direction {
                    Recommendation::Buy => current_price <= midpoint,
                    Recommendation::Sell => current_price >= midpoint,
                    Recommendation::Hold => false,
                };
                if correct_side {
                    (15.0, false)
                } else {
                    (0.0, true)
                }
            }
        }
        _ => (0.0, true),
    }
}

/// 25 if fresh (recent), 15 if tested (older), 0 if absent.
fn order_block_points(order_block_fresh: Option<bool>) -> (f64, bool) {
    match order_block_fresh {
        Some(true) => (25.0, false),
        Some(false) => (15.0, false),
        None => (0.0, true),
    }
}

/// 15 when a reversal/sweep is on the side consistent with direction.
fn liquidity_sweep_points(reversal_candle: Option<bool>) -> (f64, bool) {
    match reversal_candle {
        Some(true) => (15.0, false),
        _ => (0.0, true),
    }
}

pub struct ProfessionalScoreInputs {
    pub current_price: f64,
    pub direction: Recommendation,
    pub fib_entry_zone_low: Option<f64>,
    pub fib_entry_zone_high: Option<f64>,
    pub order_block_fresh: Option<bool>,
    pub reversal_candle: Option<bool>,
    pub overall_confidence: f64,
    pub unanimous_consensus: bool,
    pub htf_aligned: bool,
}

/// Computes the Step K score and resolves it to the never-reject tier
/// multiplier, penalized 0.1 per warning and floored at half the tier.
pub fn compute(candles: &[&Candle], inputs: &ProfessionalScoreInputs) -> ProfessionalScore {
    let (structure, w1) = market_structure_points(candles, inputs.direction);
    let (ote, w2) = ote_points(inputs.current_price, inputs.fib_entry_zone_low, inputs.fib_entry_zone_high, inputs.direction);
    let (ob, w3) = order_block_points(inputs.order_block_fresh);
    let (sweep, w4) = liquidity_sweep_points(inputs.reversal_candle);

    let warnings = [w1, w2, w3, w4].iter().filter(|&&w| w).count() as u8;

    let mut raw = structure + ote + ob + sweep;
    if inputs.overall_confidence >= 80.0 {
        raw += 10.0;
    }
    if inputs.unanimous_consensus {
        raw += 10.0;
    }
    if inputs.htf_aligned {
        raw += 5.0;
    }
    let adjusted = raw.min(100.0);

    let tier = if adjusted >= 60.0 {
        1.0
    } else if adjusted >= 40.0 {
        0.75
    } else if adjusted >= 25.0 {
        0.5
    } else {
        0.35
    };

    let penalized = tier - 0.1 * warnings as f64;
    let tier_multiplier = penalized.max(tier * 0.5);

    ProfessionalScore { raw, adjusted, warnings, tier_multiplier }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bonuses_accumulate_and_cap_at_one_hundred() {
        let inputs = ProfessionalScoreInputs {
            current_price: 100.0,
            direction: Recommendation::Buy,
            fib_entry_zone_low: Some(95.0),
            fib_entry_zone_high: Some(105.0),
            order_block_fresh: Some(true),
            reversal_candle: Some(true),
            overall_confidence: 85.0,
            unanimous_consensus: true,
            htf_aligned: true,
        };
        let score = compute(&[], &inputs);
        assert_eq!(score.adjusted, 100.0);
        assert_eq!(score.warnings, 1); // market structure warning (no candles)
    }

    #[test]
    fn low_score_never_rejects_only_sizes_down() {
        let inputs = ProfessionalScoreInputs {
            current_price: 100.0,
            direction: Recommendation::Buy,
            fib_entry_zone_low: None,
            fib_entry_zone_high: None,
            order_block_fresh: None,
            reversal_candle: None,
            overall_confidence: 50.0,
            unanimous_consensus: false,
            htf_aligned: false,
        };
        let score = compute(&[], &inputs);
        assert!(score.tier_multiplier > 0.0);
        assert!(score.tier_multiplier <= 0.35);
    }
}
