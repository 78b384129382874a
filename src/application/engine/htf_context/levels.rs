//! Swing-level and Fibonacci-pivot construction for one HTF timeframe
//! (§4.2). Swing detection follows the fractal-high/fractal-low scan
//! used elsewhere in this crate for structure detection, parameterized
//! by timeframe-dependent lookback instead of a fixed range.

use rust_decimal::prelude::ToPrimitive;

use crate::domain::engine::candle::Candle;
use crate::domain::engine::htf::{HtfLevel, HtfLevelSource, HtfLevelType, HtfStrength, HtfTimeframe};

/// Two levels of the same type within this fraction of each other collapse (§4.2).
const DEDUP_PROXIMITY_PCT: f64 = 0.003;
/// A prior bar's extreme counts toward strength when within this fraction of the level (§4.2).
const STRENGTH_PROXIMITY_PCT: f64 = 0.002;

fn is_swing_high(candles: &[&Candle], index: usize, lookback: usize) -> bool {
    if index < lookback || index + lookback >= candles.len() {
        return false;
    }
    let high = candles[index].high;
    for i in 1..=lookback {
        if candles[index - i].high >= high {
            return false;
        }
    }
    for i in 1..=lookback {
        if candles[index + i].high > high {
            return false;
        }
    }
    true
}

fn is_swing_low(candles: &[&Candle], index: usize, lookback: usize) -> bool {
    if index < lookback || index + lookback >= candles.len() {
        return false;
    }
    let low = candles[index].low;
    for i in 1..=lookback {
        if candles[index - i].low <= low {
            return false;
        }
    }
    for i in 1..=lookback {
        if candles[index + i].low < low {
            return false;
        }
    }
    true
}

fn touches_within(candles: &[&Candle], price: f64, extreme: impl Fn(&Candle) -> f64) -> u32 {
    if price == 0.0 {
        return 0;
    }
    candles
        .iter()
        .filter(|c| {
            let v = extreme(c);
            (v - price).abs() / price <= STRENGTH_PROXIMITY_PCT
        })
        .count() as u32
}

/// Scans `candles` (oldest-first) for swing highs/lows at `timeframe`'s
/// standard lookback depth (§4.2: weekly ≈ 3, daily ≈ 5, 4h ≈ 8).
pub fn swing_levels(candles: &[&Candle], timeframe: HtfTimeframe) -> Vec<HtfLevel> {
    let lookback = timeframe.swing_lookback();
    let mut levels = Vec::new();

    for i in 0..candles.len() {
        if is_swing_high(candles, i, lookback) {
            let price = candles[i].high.to_f64().unwrap_or(0.0);
            let touches = touches_within(candles, price, |c| c.high.to_f64().unwrap_or(0.0));
            levels.push(HtfLevel {
                price,
                timeframe,
                level_type: HtfLevelType::Resistance,
                strength: HtfStrength::from_touch_count(touches),
                source: HtfLevelSource::Swing,
                fib_label: None,
            });
        }
        if is_swing_low(candles, i, lookback) {
            let price = candles[i].low.to_f64().unwrap_or(0.0);
            let touches = touches_within(candles, price, |c| c.low.to_f64().unwrap_or(0.0));
            levels.push(HtfLevel {
                price,
                timeframe,
                level_type: HtfLevelType::Support,
                strength: HtfStrength::from_touch_count(touches),
                source: HtfLevelSource::Swing,
                fib_label: None,
            });
        }
    }

    levels
}

/// Fibonacci pivot set derived from the previous finalized bar (§4.2).
/// PP publishes as SUPPORT by convention; R1/R2/R3 are RESISTANCE,
/// S1/S2/S3 are SUPPORT.
pub fn fibonacci_pivots(previous_bar: &Candle, timeframe: HtfTimeframe) -> Vec<HtfLevel> {
    let h = previous_bar.high.to_f64().unwrap_or(0.0);
    let l = previous_bar.low.to_f64().unwrap_or(0.0);
    let c = previous_bar.close.to_f64().unwrap_or(0.0);
    let range = h - l;
    let pp = (h + l + c) / 3.0;

    let level = |price: f64, level_type: HtfLevelType, label: &str| HtfLevel {
        price,
        timeframe,
        level_type,
        strength: HtfStrength::Moderate,
        source: HtfLevelSource::FibPivot,
        fib_label: Some(label.to_string()),
    };

    vec![
        level(pp, HtfLevelType::Support, "PP"),
        level(pp + 0.382 * range, HtfLevelType::Resistance, "R1"),
        level(pp - 0.382 * range, HtfLevelType::Support, "S1"),
        level(pp + 0.618 * range, HtfLevelType::Resistance, "R2"),
        level(pp - 0.618 * range, HtfLevelType::Support, "S2"),
        level(pp + 1.000 * range, HtfLevelType::Resistance, "R3"),
        level(pp - 1.000 * range, HtfLevelType::Support, "S3"),
    ]
}

/// Collapses levels of the same type within `DEDUP_PROXIMITY_PCT` of
/// each other; the survivor is the one with more touches (approximated
/// here by strength), else the one from the higher timeframe.
pub fn dedup_levels(mut levels: Vec<HtfLevel>) -> Vec<HtfLevel> {
    levels.sort_by(|a, b| {
        a.level_type
            .cmp(&b.level_type)
            .then(a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut survivors: Vec<HtfLevel> = Vec::new();
    for level in levels {
        if let Some(last) = survivors.last_mut() {
            if last.level_type == level.level_type && last.price != 0.0 {
                let distance = (last.price - level.price).abs() / last.price;
                if distance <= DEDUP_PROXIMITY_PCT {
                    if beats(&level, last) {
                        *last = level;
                    }
                    continue;
                }
            }
        }
        survivors.push(level);
    }
    survivors
}

fn beats(candidate: &HtfLevel, incumbent: &HtfLevel) -> bool {
    match candidate.strength.cmp(&incumbent.strength) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate.timeframe.rank() > incumbent.timeframe.rank(),
    }
}
