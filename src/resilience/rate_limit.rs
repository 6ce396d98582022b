//! Token bucket limiter shared by every key of the work queue.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Token bucket state.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    /// Take one token, going into debt if necessary, and return how long
    /// the caller must wait for that token to exist.
    fn reserve(&mut self, capacity: f64, refill_rate: f64) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / refill_rate)
        }
    }
}

/// Overall rate limiter: `qps` sustained, `burst` immediate.
pub struct BucketLimiter {
    bucket: Mutex<TokenBucket>,
    qps: f64,
    burst: f64,
}

impl BucketLimiter {
    pub fn new(qps: u32, burst: u32) -> Self {
        let qps = f64::from(qps.max(1));
        let burst = f64::from(burst.max(1));
        Self {
            bucket: Mutex::new(TokenBucket::new(burst)),
            qps,
            burst,
        }
    }

    /// Delay before the next admitted item.
    pub fn when(&self) -> Duration {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        bucket.reserve(self.burst, self.qps)
    }
}

impl std::fmt::Debug for BucketLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketLimiter")
            .field("qps", &self.qps)
            .field("burst", &self.burst)
            .finish()
    }
}
