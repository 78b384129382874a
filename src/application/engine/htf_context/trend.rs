//! Trend candidate derivation (§4.2 "Trend"): the primary 4h
//! higher-high/lower-low count, and the level-geometry fallback used
//! when 4h data is unavailable.

use crate::domain::engine::candle::Candle;
use crate::domain::engine::htf::{HtfLevel, HtfLevelType, HtfStrength, TrendLabel};

/// Primary rule: analyze the last 5 closes of the 4h series and count
/// higher-highs/lower-highs/higher-lows/lower-lows among consecutive
/// pairs. BULLISH requires `higherHighs >= 2 && higherHighs >
/// lowerHighs`; BEARISH is symmetric; else NEUTRAL.
pub fn candidate_from_four_hour_closes(closes: &[f64]) -> TrendLabel {
    if closes.len() < 5 {
        return TrendLabel::Neutral;
    }
    let window = &closes[closes.len() - 5..];

    let mut higher_highs = 0;
    let mut lower_highs = 0;
    let mut higher_lows = 0;
    let mut lower_lows = 0;

    for pair in window.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if curr > prev {
            higher_highs += 1;
            higher_lows += 1;
        } else if curr < prev {
            lower_highs += 1;
            lower_lows += 1;
        }
    }

    if higher_highs >= 2 && higher_highs > lower_highs {
        TrendLabel::Bullish
    } else if lower_lows >= 2 && lower_lows > higher_lows {
        TrendLabel::Bearish
    } else {
        TrendLabel::Neutral
    }
}

pub fn closes_from_candles(candles: &[&Candle]) -> Vec<f64> {
    use rust_decimal::prelude::ToPrimitive;
    candles.iter().map(|c| c.close.to_f64().unwrap_or(0.0)).collect()
}

/// Fallback when 4h data is unavailable: compare distance to nearest
/// resistance vs support (>=1.5x ratio decides direction), break ties
/// by counting STRONG levels on each side.
pub fn fallback_from_levels(
    current_price: f64,
    nearest_support: Option<&HtfLevel>,
    nearest_resistance: Option<&HtfLevel>,
    levels: &[HtfLevel],
) -> TrendLabel {
    let support_distance = nearest_support.map(|l| (current_price - l.price).abs());
    let resistance_distance = nearest_resistance.map(|l| (current_price - l.price).abs());

    match (support_distance, resistance_distance) {
        (Some(sd), Some(rd)) if sd > 0.0 && rd > 0.0 => {
            if rd >= 1.5 * sd {
                TrendLabel::Bullish
            } else if sd >= 1.5 * rd {
                TrendLabel::Bearish
            } else {
                strong_level_tiebreak(levels)
            }
        }
        _ => strong_level_tiebreak(levels),
    }
}

fn strong_level_tiebreak(levels: &[HtfLevel]) -> TrendLabel {
    let strong_support = levels
        .iter()
        .filter(|l| l.level_type == HtfLevelType::Support && l.strength == HtfStrength::Strong)
        .count();
    let strong_resistance = levels
        .iter()
        .filter(|l| l.level_type == HtfLevelType::Resistance && l.strength == HtfStrength::Strong)
        .count();

    match strong_support.cmp(&strong_resistance) {
        std::cmp::Ordering::Greater => TrendLabel::Bullish,
        std::cmp::Ordering::Less => TrendLabel::Bearish,
        std::cmp::Ordering::Equal => TrendLabel::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_consecutive_higher_highs_is_bullish() {
        let closes = [100.0, 101.0, 102.0, 103.0, 104.0];
        assert_eq!(candidate_from_four_hour_closes(&closes), TrendLabel::Bullish);
    }

    #[test]
    fn two_consecutive_lower_lows_is_bearish() {
        let closes = [104.0, 103.0, 102.0, 101.0, 100.0];
        assert_eq!(candidate_from_four_hour_closes(&closes), TrendLabel::Bearish);
    }

    #[test]
    fn choppy_series_is_neutral() {
        let closes = [100.0, 101.0, 99.0, 101.0, 99.0];
        assert_eq!(candidate_from_four_hour_closes(&closes), TrendLabel::Neutral);
    }

    #[test]
    fn insufficient_history_is_neutral() {
        assert_eq!(candidate_from_four_hour_closes(&[100.0, 101.0]), TrendLabel::Neutral);
    }

    #[test]
    fn fallback_prefers_direction_with_farther_opposing_distance() {
        let support = HtfLevel {
            price: 99.0,
            timeframe: crate::domain::engine::timeframe::HtfTimeframe::OneDay,
            level_type: HtfLevelType::Support,
            strength: HtfStrength::Moderate,
            source: crate::domain::engine::htf::HtfLevelSource::Swing,
            fib_label: None,
        };
        let resistance = HtfLevel { price: 130.0, level_type: HtfLevelType::Resistance, ..support.clone() };
        let label = fallback_from_levels(100.0, Some(&support), Some(&resistance), &[]);
        assert_eq!(label, TrendLabel::Bullish);
    }
}
