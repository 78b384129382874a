use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timeframe::HtfTimeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HtfLevelType {
    Support,
    Resistance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HtfStrength {
    Weak,
    Moderate,
    Strong,
}

impl HtfStrength {
    /// Bucket by touch count per §4.2 "Swing levels".
    pub fn from_touch_count(touches: usize) -> Self {
        match touches {
            0..=1 => HtfStrength::Weak,
            2 => HtfStrength::Moderate,
            _ => HtfStrength::Strong,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtfLevelSource {
    Swing,
    FibPivot,
}

/// A single support/resistance level derived from one HTF timeframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtfLevel {
    pub price: f64,
    pub timeframe: HtfTimeframe,
    pub level_type: HtfLevelType,
    pub strength: HtfStrength,
    pub source: HtfLevelSource,
    pub fib_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendLabel {
    Bullish,
    Bearish,
    Neutral,
}

/// The HTF trend hysteresis state machine (§4.2 "Trend", §9 design
/// note). `pending_candidate`/`pending_confirmations` track a
/// not-yet-promoted transition; `locked_until` enforces the one-hour
/// lock after a promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub label: TrendLabel,
    pub pending_candidate: Option<TrendLabel>,
    pub pending_confirmations: u8,
    pub confirmed_at: DateTime<Utc>,
    pub locked_until: DateTime<Utc>,
}

impl Trend {
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            label: TrendLabel::Neutral,
            pending_candidate: None,
            pending_confirmations: 0,
            confirmed_at: now,
            locked_until: now,
        }
    }

    /// Feed a freshly-computed candidate label through the state
    /// machine. `lock_duration` is the §4.2 one-hour post-promotion
    /// lock. Returns `true` if the published label changed this call.
    pub fn observe(
        &mut self,
        candidate: TrendLabel,
        now: DateTime<Utc>,
        lock_duration: chrono::Duration,
    ) -> bool {
        if now < self.locked_until {
            return false;
        }

        if candidate == self.label {
            self.pending_candidate = None;
            self.pending_confirmations = 0;
            return false;
        }

        // A first transition out of NEUTRAL needs no confirmation.
        if self.label == TrendLabel::Neutral {
            self.promote(candidate, now, lock_duration);
            return true;
        }

        match self.pending_candidate {
            Some(pending) if pending == candidate => {
                self.pending_confirmations += 1;
                if self.pending_confirmations >= 2 {
                    self.promote(candidate, now, lock_duration);
                    return true;
                }
                false
            }
            _ => {
                self.pending_candidate = Some(candidate);
                self.pending_confirmations = 1;
                false
            }
        }
    }

    fn promote(&mut self, label: TrendLabel, now: DateTime<Utc>, lock_duration: chrono::Duration) {
        self.label = label;
        self.pending_candidate = None;
        self.pending_confirmations = 0;
        self.confirmed_at = now;
        self.locked_until = now + lock_duration;
    }
}

/// The full HTF context returned to the composer for a given current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtfContext {
    pub levels: Vec<HtfLevel>,
    pub nearest_support: Option<HtfLevel>,
    pub nearest_resistance: Option<HtfLevel>,
    pub is_near_critical_level: bool,
    pub critical_level_type: Option<HtfLevelType>,
    pub trend: TrendLabel,
    pub trend_confirmed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn first_transition_out_of_neutral_is_immediate() {
        let mut trend = Trend::initial(t(0));
        let changed = trend.observe(TrendLabel::Bullish, t(10), Duration::hours(1));
        assert!(changed);
        assert_eq!(trend.label, TrendLabel::Bullish);
    }

    #[test]
    fn directional_flip_requires_two_confirmations() {
        let mut trend = Trend::initial(t(0));
        trend.observe(TrendLabel::Bullish, t(10), Duration::hours(1));
        // Force past the lock so the flip attempt isn't swallowed by it.
        trend.locked_until = t(10);

        let changed1 = trend.observe(TrendLabel::Bearish, t(20), Duration::hours(1));
        assert!(!changed1);
        assert_eq!(trend.label, TrendLabel::Bullish);

        let changed2 = trend.observe(TrendLabel::Bearish, t(30), Duration::hours(1));
        assert!(changed2);
        assert_eq!(trend.label, TrendLabel::Bearish);
    }

    #[test]
    fn lock_suppresses_new_candidates_until_expiry() {
        let mut trend = Trend::initial(t(0));
        trend.observe(TrendLabel::Bullish, t(10), Duration::hours(1));
        assert_eq!(trend.label, TrendLabel::Bullish);

        // Within the lock window, even repeated bearish candidates don't stick.
        trend.observe(TrendLabel::Bearish, t(100), Duration::hours(1));
        trend.observe(TrendLabel::Bearish, t(200), Duration::hours(1));
        assert_eq!(trend.label, TrendLabel::Bullish);
    }

    #[test]
    fn same_candidate_as_current_label_clears_pending() {
        let mut trend = Trend::initial(t(0));
        trend.observe(TrendLabel::Bullish, t(10), Duration::hours(1));
        trend.locked_until = t(10);
        trend.observe(TrendLabel::Bearish, t(20), Duration::hours(1));
        assert_eq!(trend.pending_confirmations, 1);
        trend.observe(TrendLabel::Bullish, t(30), Duration::hours(1));
        assert_eq!(trend.pending_confirmations, 0);
        assert!(trend.pending_candidate.is_none());
    }

    #[test]
    fn strength_buckets_by_touch_count() {
        assert_eq!(HtfStrength::from_touch_count(0), HtfStrength::Weak);
        assert_eq!(HtfStrength::from_touch_count(2), HtfStrength::Moderate);
        assert_eq!(HtfStrength::from_touch_count(5), HtfStrength::Strong);
    }
}
