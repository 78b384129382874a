use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Token-bucket limiter for outbound broker/data-feed calls (§5 "Rate
/// limits"). This crate defines the limiter and its seam; concrete
/// exchange rate tables stay with the excluded concrete adapters (§1).
pub struct TokenBucket {
    capacity: i64,
    refill_per_sec: f64,
    tokens: AtomicI64,
    last_refill: Mutex<Instant>,
}

impl TokenBucket {
    pub fn new(capacity: i64, refill_per_sec: f64) -> Self {
        Self { capacity, refill_per_sec, tokens: AtomicI64::new(capacity), last_refill: Mutex::new(Instant::now()) }
    }

    /// Blocks until a token is available, refilling proportionally to
    /// elapsed wall-clock time since the last refill.
    pub async fn acquire(&self) {
        loop {
            self.refill().await;
            if self.tokens.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| if t > 0 { Some(t - 1) } else { None }).is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn refill(&self) {
        let mut last = self.last_refill.lock().await;
        let elapsed = last.elapsed().as_secs_f64();
        let add = (elapsed * self.refill_per_sec) as i64;
        if add > 0 {
            let current = self.tokens.load(Ordering::SeqCst);
            self.tokens.store((current + add).min(self.capacity), Ordering::SeqCst);
            *last = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_and_refills() {
        let bucket = TokenBucket::new(2, 1000.0);
        bucket.acquire().await;
        bucket.acquire().await;
        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }
}
