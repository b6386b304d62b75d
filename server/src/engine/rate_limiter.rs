use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Token-bucket rate limiter keyed by string (client IP, user ID).
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    max_tokens: u32,
    refill_rate: f64, // tokens per second
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a rate limiter.
    /// - `max_tokens`: burst capacity
    /// - `per_seconds`: refill one token every N seconds
    pub fn new(max_tokens: u32, per_seconds: f64) -> Self {
        Self {
            buckets: DashMap::new(),
            max_tokens,
            refill_rate: 1.0 / per_seconds,
        }
    }

    /// Take a token for `key`. Returns true if the action is allowed.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.max_tokens as f64,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.max_tokens as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets untouched for longer than `older_than`.
    pub fn cleanup(&self, older_than: Duration) {
        let Some(cutoff) = Instant::now().checked_sub(older_than) else {
            return;
        };
        self.buckets.retain(|_, b| b.last_refill > cutoff);
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}
