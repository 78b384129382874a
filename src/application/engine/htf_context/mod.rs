//! HTF Context (§4.2): level construction, deduplication, proximity and
//! trend hysteresis for one instrument, cached for one hour and
//! refreshed lazily.

mod levels;
mod trend;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::engine::candle::Candle;
use crate::domain::engine::htf::{HtfContext, HtfLevel, HtfLevelType, Trend, TrendLabel};
use crate::domain::engine::timeframe::HtfTimeframe;

/// Critical-level proximity threshold, a fraction of price (§4.2).
const CRITICAL_PROXIMITY_PCT: f64 = 0.009;
/// How long a constructed level set is cached before a full rebuild (§4.2).
const CACHE_TTL: ChronoDuration = ChronoDuration::hours(1);
/// One-hour post-promotion trend lock (§4.2).
const TREND_LOCK: ChronoDuration = ChronoDuration::hours(1);

struct CachedLevels {
    levels: Vec<HtfLevel>,
    built_at: DateTime<Utc>,
}

/// Per-instrument HTF state: the cached level set and the trend
/// hysteresis machine. Levels are writer-exclusive / reader-shared;
/// trend advances are serialized by the same lock.
struct InstrumentState {
    cached: Option<CachedLevels>,
    trend: Trend,
}

/// Supplies `HtfContext` snapshots for any number of instruments, each
/// independently cached and trended.
pub struct HtfContextProvider {
    states: RwLock<HashMap<String, InstrumentState>>,
}

impl HtfContextProvider {
    pub fn new() -> Self {
        Self { states: RwLock::new(HashMap::new()) }
    }

    /// Returns the HTF context for `instrument` at `current_price`,
    /// rebuilding the level set if the cache is absent or stale.
    /// `candles_by_timeframe` supplies oldest-first windows for each
    /// HTF timeframe currently available (an unavailable HTF is simply
    /// omitted, degrading level coverage but not failing the call).
    pub async fn context(
        &self,
        instrument: &str,
        current_price: Decimal,
        candles_by_timeframe: &HashMap<HtfTimeframe, Vec<Candle>>,
        now: DateTime<Utc>,
    ) -> HtfContext {
        let mut states = self.states.write().await;
        let state = states.entry(instrument.to_string()).or_insert_with(|| InstrumentState {
            cached: None,
            trend: Trend::initial(now),
        });

        let stale = state.cached.as_ref().map(|c| now - c.built_at >= CACHE_TTL).unwrap_or(true);
        if stale {
            let levels = build_levels(candles_by_timeframe);
            state.cached = Some(CachedLevels { levels, built_at: now });
        }

        let levels = state.cached.as_ref().map(|c| c.levels.clone()).unwrap_or_default();
        let price = current_price.to_f64().unwrap_or(0.0);
        let (nearest_support, nearest_resistance) = nearest(&levels, price);
        let (is_near_critical_level, critical_level_type) =
            proximity(price, nearest_support.as_ref(), nearest_resistance.as_ref());

        let candidate = candle_refs(candles_by_timeframe.get(&HtfTimeframe::FourHour))
            .map(|refs| trend::candidate_from_four_hour_closes(&trend::closes_from_candles(&refs)))
            .unwrap_or_else(|| {
                trend::fallback_from_levels(price, nearest_support.as_ref(), nearest_resistance.as_ref(), &levels)
            });

        state.trend.observe(candidate, now, TREND_LOCK);

        HtfContext {
            levels,
            nearest_support,
            nearest_resistance,
            is_near_critical_level,
            critical_level_type,
            trend: state.trend.label,
            trend_confirmed_at: state.trend.confirmed_at,
        }
    }
}

impl Default for HtfContextProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn candle_refs(candles: Option<&Vec<Candle>>) -> Option<Vec<&Candle>> {
    let candles = candles?;
    if candles.len() < 5 {
        return None;
    }
    Some(candles.iter().collect())
}

fn build_levels(candles_by_timeframe: &HashMap<HtfTimeframe, Vec<Candle>>) -> Vec<HtfLevel> {
    let mut all = Vec::new();
    for timeframe in HtfTimeframe::all() {
        let Some(candles) = candles_by_timeframe.get(&timeframe) else { continue };
        if candles.is_empty() {
            continue;
        }
        let refs: Vec<&Candle> = candles.iter().collect();
        all.extend(levels::swing_levels(&refs, timeframe));
        if let Some(previous) = candles.last() {
            all.extend(levels::fibonacci_pivots(previous, timeframe));
        }
    }
    levels::dedup_levels(all)
}

fn nearest(levels: &[HtfLevel], price: f64) -> (Option<HtfLevel>, Option<HtfLevel>) {
    let support = levels
        .iter()
        .filter(|l| l.level_type == HtfLevelType::Support && l.price <= price)
        .min_by(|a, b| (price - a.price).partial_cmp(&(price - b.price)).unwrap())
        .cloned();

    let resistance = levels
        .iter()
        .filter(|l| l.level_type == HtfLevelType::Resistance && l.price >= price)
        .min_by(|a, b| (a.price - price).partial_cmp(&(b.price - price)).unwrap())
        .cloned();

    (support, resistance)
}

fn proximity(
    price: f64,
    support: Option<&HtfLevel>,
    resistance: Option<&HtfLevel>,
) -> (bool, Option<HtfLevelType>) {
    if price == 0.0 {
        return (false, None);
    }
    let support_near = support.map(|l| (price - l.price).abs() / price <= CRITICAL_PROXIMITY_PCT).unwrap_or(false);
    let resistance_near =
        resistance.map(|l| (price - l.price).abs() / price <= CRITICAL_PROXIMITY_PCT).unwrap_or(false);

    match (support_near, resistance_near) {
        (true, true) | (true, false) => (true, Some(HtfLevelType::Support)),
        (false, true) => (true, Some(HtfLevelType::Resistance)),
        (false, false) => (false, None),
    }
}

/// The provider is cheap to share across the Composer's per-instrument tasks.
pub type SharedHtfContextProvider = Arc<HtfContextProvider>;
