//! Hand-rolled token-bucket rate limiter for the Semantic Analysis Layer.
//!
//! Small enough to implement directly rather than pull in a dependency:
//! the bucket refills to full capacity at each period boundary rather
//! than leaking continuously.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// A token bucket that refills to `capacity` every `period`.
pub struct TokenBucket {
    capacity: u32,
    period: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    #[must_use]
    pub fn new(capacity: u32, period: Duration) -> Self {
        Self {
            capacity,
            period,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Attempt to take one token without blocking.
    pub async fn try_take(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.last_refill.elapsed() >= self.period {
            state.tokens = self.capacity;
            state.last_refill = Instant::now();
        }
        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Duration until the next refill, from the current instant.
    pub async fn time_until_refill(&self) -> Duration {
        let state = self.state.lock().await;
        self.period.saturating_sub(state.last_refill.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_capacity_then_denies() {
        let bucket = TokenBucket::new(3, Duration::from_secs(60));
        assert!(bucket.try_take().await);
        assert!(bucket.try_take().await);
        assert!(bucket.try_take().await);
        assert!(!bucket.try_take().await);
    }

    #[tokio::test]
    async fn refills_after_period() {
        let bucket = TokenBucket::new(1, Duration::from_millis(20));
        assert!(bucket.try_take().await);
        assert!(!bucket.try_take().await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(bucket.try_take().await);
    }

    #[tokio::test]
    async fn never_admits_more_than_capacity_under_burst() {
        let bucket = TokenBucket::new(10, Duration::from_secs(60));
        let mut admitted = 0;
        for _ in 0..100 {
            if bucket.try_take().await {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }
}
