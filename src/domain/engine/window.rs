use std::collections::VecDeque;

use super::candle::Candle;

/// An ordered, bounded, gap-aware sequence of candles for one
/// `(instrument, timeframe)`. Owned by the Ingestor; everything else
/// reads a snapshot (`as_slice`).
///
/// Invariants upheld by `push`:
/// - monotonic `open_time` in the live region (I1 depends on this),
/// - duplicate `open_time` replaces the existing entry rather than
///   extending the window (§8 "duplicates do not extend length"),
/// - length bounded by `retention`.
#[derive(Debug, Clone)]
pub struct TimeframeWindow {
    retention: usize,
    candles: VecDeque<Candle>,
}

impl TimeframeWindow {
    pub fn new(retention: usize) -> Self {
        Self {
            retention,
            candles: VecDeque::with_capacity(retention),
        }
    }

    /// Insert a finalized candle. Returns `true` if it extended the
    /// window (a genuinely new tail), `false` if it was a dedup
    /// replacement or an out-of-order / stale delivery that was ignored.
    pub fn push(&mut self, candle: Candle) -> bool {
        if let Some(tail) = self.candles.back() {
            if candle.open_time == tail.open_time {
                // Duplicate open_time: most recent version wins, length unchanged.
                *self.candles.back_mut().unwrap() = candle;
                return false;
            }
            if candle.open_time < tail.open_time {
                // Reordered delivery older than the tail: ignore.
                return false;
            }
        }

        self.candles.push_back(candle);
        while self.candles.len() > self.retention {
            self.candles.pop_front();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn tail(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn as_slice(&self) -> Vec<&Candle> {
        self.candles.iter().collect()
    }

    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }

    /// Last `n` candles, oldest first. Shorter than `n` if the window
    /// hasn't filled yet.
    pub fn last_n(&self, n: usize) -> Vec<&Candle> {
        let len = self.candles.len();
        let start = len.saturating_sub(n);
        self.candles.iter().skip(start).collect()
    }

    /// Replace the whole window, e.g. after a backfill reconciliation.
    /// Candles are deduplicated by `open_time` (latest wins) and sorted,
    /// then truncated to `retention`.
    pub fn reconcile(&mut self, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.open_time);
        let mut deduped: VecDeque<Candle> = VecDeque::new();
        for c in candles {
            if deduped.back().map(|b: &Candle| b.open_time) == Some(c.open_time) {
                *deduped.back_mut().unwrap() = c;
            } else {
                deduped.push_back(c);
            }
        }
        while deduped.len() > self.retention {
            deduped.pop_front();
        }
        self.candles = deduped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::timeframe::Timeframe;
    use rust_decimal::Decimal;

    fn candle(open_time: i64, close: i64) -> Candle {
        Candle {
            instrument: "BTCUSDT".into(),
            timeframe: Timeframe::OneMin,
            open_time,
            close_time: open_time + 60,
            open: Decimal::from(close),
            high: Decimal::from(close),
            low: Decimal::from(close),
            close: Decimal::from(close),
            volume: Decimal::ONE,
            is_final: true,
        }
    }

    #[test]
    fn push_extends_and_trims_to_retention() {
        let mut w = TimeframeWindow::new(3);
        assert!(w.push(candle(1, 1)));
        assert!(w.push(candle(2, 2)));
        assert!(w.push(candle(3, 3)));
        assert!(w.push(candle(4, 4)));
        assert_eq!(w.len(), 3);
        assert_eq!(w.tail().unwrap().open_time, 4);
        assert_eq!(w.as_slice()[0].open_time, 2);
    }

    #[test]
    fn duplicate_open_time_replaces_without_extending() {
        let mut w = TimeframeWindow::new(10);
        w.push(candle(1, 100));
        assert_eq!(w.len(), 1);
        let extended = w.push(candle(1, 105));
        assert!(!extended);
        assert_eq!(w.len(), 1);
        assert_eq!(w.tail().unwrap().close, Decimal::from(105));
    }

    #[test]
    fn stale_reordered_delivery_is_ignored() {
        let mut w = TimeframeWindow::new(10);
        w.push(candle(5, 1));
        w.push(candle(10, 2));
        let extended = w.push(candle(3, 3));
        assert!(!extended);
        assert_eq!(w.len(), 2);
        assert_eq!(w.tail().unwrap().open_time, 10);
    }
}
