use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Per-key token bucket. Each key gets `max` tokens that refill
/// continuously at `max / window_secs` per second; one send costs one
/// token. Buckets are created on first use and never persisted — a restart
/// simply hands everyone a full bucket.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Verdict for one charge attempt against a key's bucket.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub allowed: bool,
    pub limit: usize,
    /// Whole tokens left after this charge.
    pub remaining: usize,
    /// How long until the bucket holds a whole token again; 0 when the
    /// charge went through.
    pub retry_after_secs: u64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Charge one token from `key`'s bucket. True when the charge fit.
    pub fn check(&self, key: &str, max: usize, window_secs: u64) -> bool {
        self.check_with_info(key, max, window_secs).allowed
    }

    /// Charge one token and report the bucket state for error frames.
    pub fn check_with_info(&self, key: &str, max: usize, window_secs: u64) -> RateLimitInfo {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let capacity = max as f64;
        let rate = capacity / window_secs.max(1) as f64;

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: capacity,
            refilled_at: now,
        });

        // Top up for the time elapsed since the last charge, capped at the
        // bucket capacity.
        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(capacity);
        bucket.refilled_at = now;

        if bucket.tokens < 1.0 {
            let deficit = 1.0 - bucket.tokens;
            return RateLimitInfo {
                allowed: false,
                limit: max,
                remaining: 0,
                retry_after_secs: (deficit / rate).ceil() as u64,
            };
        }

        bucket.tokens -= 1.0;
        RateLimitInfo {
            allowed: true,
            limit: max,
            remaining: bucket.tokens as usize,
            retry_after_secs: 0,
        }
    }
}
