//! Entry/stop/target construction, the dynamic R:R floor, and HTF
//! counter-trend inversion (§4.3 Steps H, I, J).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::engine::htf::{HtfContext, HtfLevelType, TrendLabel};
use crate::domain::engine::oracle::{OracleFields, Recommendation};

pub struct EntryPlan {
    pub entry: Decimal,
    pub stop: Decimal,
    pub target: Decimal,
    pub risk_reward: f64,
    pub direction: Recommendation,
    pub inverted: bool,
}

/// R:R by realized ATR% volatility (§4.3 Step H).
fn rr_by_volatility(atr_pct: f64) -> f64 {
    if atr_pct < 0.3 {
        1.5
    } else if atr_pct < 0.6 {
        2.0
    } else {
        2.5
    }
}

/// Minimum R:R floor by overall confidence (§4.3 Step I).
pub fn required_min_rr(confidence: f64) -> f64 {
    if confidence >= 80.0 {
        0.5
    } else if confidence >= 75.0 {
        0.55
    } else if confidence >= 70.0 {
        0.75
    } else {
        0.7
    }
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

fn from_f64(v: f64) -> Option<Decimal> {
    Decimal::try_from(v).ok()
}

/// Builds entry/stop/target for `direction` given the primary fields,
/// HTF context and ATR. Stop is the tighter of the fib entry-zone
/// boundary, the nearest matching S/R level, and `entry ∓ 1.5·ATR`.
/// Returns `None` if stop or target would be missing or non-positive
/// reward (I3).
pub fn build(
    direction: Recommendation,
    entry: Decimal,
    atr: f64,
    fields: &OracleFields,
    htf: &HtfContext,
) -> Option<EntryPlan> {
    let entry_f = to_f64(entry);
    if entry_f <= 0.0 || atr <= 0.0 {
        return None;
    }

    let atr_pct = (atr / entry_f) * 100.0;

    let fib_boundary = match direction {
        Recommendation::Buy => fields.fib_entry_zone_low,
        Recommendation::Sell => fields.fib_entry_zone_high,
        Recommendation::Hold => None,
    };

    let sr_boundary = match direction {
        Recommendation::Buy => htf.nearest_support.as_ref().map(|l| l.price),
        Recommendation::Sell => htf.nearest_resistance.as_ref().map(|l| l.price),
        Recommendation::Hold => None,
    };

    let atr_stop = match direction {
        Recommendation::Buy => entry_f - 1.5 * atr,
        Recommendation::Sell => entry_f + 1.5 * atr,
        Recommendation::Hold => entry_f,
    };

    let stop_f = match direction {
        Recommendation::Buy => [Some(atr_stop), fib_boundary, sr_boundary]
            .into_iter()
            .flatten()
            .filter(|&s| s < entry_f)
            .fold(f64::MIN, f64::max),
        Recommendation::Sell => [Some(atr_stop), fib_boundary, sr_boundary]
            .into_iter()
            .flatten()
            .filter(|&s| s > entry_f)
            .fold(f64::MAX, f64::min),
        Recommendation::Hold => return None,
    };

    if !stop_f.is_finite() || stop_f == f64::MIN || stop_f == f64::MAX {
        return None;
    }

    let rr = rr_by_volatility(atr_pct);
    let risk = (entry_f - stop_f).abs();
    let raw_target = match direction {
        Recommendation::Buy => entry_f + rr * risk,
        Recommendation::Sell => entry_f - rr * risk,
        Recommendation::Hold => return None,
    };

    let target_f = match direction {
        Recommendation::Buy => raw_target.min(entry_f + 2.0 * atr),
        Recommendation::Sell => raw_target.max(entry_f - 2.0 * atr),
        Recommendation::Hold => return None,
    };

    let reward = (target_f - entry_f).abs();
    if reward <= 0.0 {
        return None;
    }

    let stop = from_f64(stop_f)?;
    let target = from_f64(target_f)?;
    let realized_rr = reward / risk.max(f64::EPSILON);

    Some(EntryPlan { entry, stop, target, risk_reward: realized_rr, direction, inverted: false })
}

/// HTF counter-trend handling (§4.3 Step J). Returns `None` if the plan
/// should be rejected outright (counter and below the inversion floor).
pub fn apply_htf_trend(
    plan: EntryPlan,
    htf: &HtfContext,
    overall_confidence: f64,
    inversion_threshold: f64,
) -> Option<(EntryPlan, f64)> {
    let candidate_label = match plan.direction {
        Recommendation::Buy => TrendLabel::Bullish,
        Recommendation::Sell => TrendLabel::Bearish,
        Recommendation::Hold => return None,
    };

    let htf_aligned = htf.trend == candidate_label;
    let htf_neutral = htf.trend == TrendLabel::Neutral;
    let htf_counter = !htf_aligned && !htf_neutral;

    if htf_counter {
        if overall_confidence < inversion_threshold {
            return None;
        }
        let inverted_direction = match plan.direction {
            Recommendation::Buy => Recommendation::Sell,
            Recommendation::Sell => Recommendation::Buy,
            Recommendation::Hold => return None,
        };
        let risk = plan.entry - plan.stop;
        let reward = plan.target - plan.entry;
        let inverted = EntryPlan {
            entry: plan.entry,
            stop: plan.entry + risk,
            target: plan.entry - reward,
            risk_reward: plan.risk_reward,
            direction: inverted_direction,
            inverted: true,
        };
        return Some((inverted, 1.0));
    }

    let mut size = if htf_aligned { 1.0 } else { 0.5 };

    let critical_conflict = match (htf.is_near_critical_level, htf.critical_level_type, plan.direction) {
        (true, Some(HtfLevelType::Resistance), Recommendation::Buy) => true,
        (true, Some(HtfLevelType::Support), Recommendation::Sell) => true,
        _ => false,
    };
    if critical_conflict {
        size *= 0.5;
    }

    Some((plan, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn htf(trend: TrendLabel) -> HtfContext {
        HtfContext {
            levels: vec![],
            nearest_support: None,
            nearest_resistance: None,
            is_near_critical_level: false,
            critical_level_type: None,
            trend,
            trend_confirmed_at: Utc::now(),
        }
    }

    #[test]
    fn builds_buy_plan_within_cap() {
        let fields = OracleFields::default();
        let plan = build(Recommendation::Buy, dec!(100), 0.5, &fields, &htf(TrendLabel::Bullish)).unwrap();
        assert!(plan.target > plan.entry);
        assert!(plan.stop < plan.entry);
        assert!(plan.risk_reward > 0.0);
    }

    #[test]
    fn rejects_when_atr_is_zero() {
        let fields = OracleFields::default();
        assert!(build(Recommendation::Buy, dec!(100), 0.0, &fields, &htf(TrendLabel::Neutral)).is_none());
    }

    #[test]
    fn counter_trend_inverts_above_threshold() {
        let fields = OracleFields::default();
        let plan = build(Recommendation::Buy, dec!(100), 0.5, &fields, &htf(TrendLabel::Bearish)).unwrap();
        let (inverted, size) = apply_htf_trend(plan, &htf(TrendLabel::Bearish), 60.0, 55.0).unwrap();
        assert_eq!(inverted.direction, Recommendation::Sell);
        assert!(inverted.inverted);
        assert_eq!(size, 1.0);
    }

    #[test]
    fn counter_trend_rejects_below_threshold() {
        let fields = OracleFields::default();
        let plan = build(Recommendation::Buy, dec!(100), 0.5, &fields, &htf(TrendLabel::Bearish)).unwrap();
        assert!(apply_htf_trend(plan, &htf(TrendLabel::Bearish), 50.0, 55.0).is_none());
    }

    #[test]
    fn required_min_rr_scales_with_confidence() {
        assert_eq!(required_min_rr(85.0), 0.5);
        assert_eq!(required_min_rr(76.0), 0.55);
        assert_eq!(required_min_rr(71.0), 0.75);
        assert_eq!(required_min_rr(60.0), 0.7);
    }
}
