use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Snapshot of a bucket used to populate rate-limit response headers.
///
/// `retry_after` is an estimate (`burst / rate`), not an exact refill
/// schedule; token buckets do not expose the next-available-token instant.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitStatus {
    /// Configured burst capacity.
    pub limit: u32,
    /// Whole tokens currently available.
    pub remaining: u32,
    /// Time until the bucket is full again.
    pub reset: Duration,
    /// Suggested client back-off.
    pub retry_after: Duration,
}

struct BucketState {
    tokens: f64,
    refreshed: Instant,
}

/// Token bucket: `rate` tokens/second refill up to a `burst` capacity.
///
/// Buckets start full so a configured burst is available immediately.
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            rate,
            burst: f64::from(burst),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst),
                refreshed: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.refreshed).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.refreshed = now;
    }

    /// Take one token if available.
    #[must_use]
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current status for header population.
    #[must_use]
    pub fn status(&self) -> RateLimitStatus {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        let deficit = (self.burst - state.tokens).max(0.0);
        RateLimitStatus {
            limit: self.burst as u32,
            remaining: state.tokens.floor() as u32,
            reset: Duration::from_secs_f64(deficit / self.rate),
            retry_after: Duration::from_secs_f64(self.burst / self.rate),
        }
    }

    /// Time since this bucket was last touched (used by the sweeper).
    pub fn idle_for(&self) -> Duration {
        self.state.lock().unwrap().refreshed.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_deny() {
        let bucket = TokenBucket::new(2.0, 2);
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());
        let status = bucket.status();
        assert_eq!(status.limit, 2);
        assert_eq!(status.remaining, 0);
        assert!(status.retry_after > Duration::ZERO);
    }

    #[test]
    fn test_refill_restores_tokens() {
        let bucket = TokenBucket::new(100.0, 1);
        assert!(bucket.allow());
        assert!(!bucket.allow());
        std::thread::sleep(Duration::from_millis(25));
        assert!(bucket.allow());
    }
}
