use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Whose budget a request is charged to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketKey {
    /// A caller presenting an API key gets a bucket of its own.
    ApiKey(String),
    /// Every caller without a key shares one bucket.
    Anonymous,
}

impl BucketKey {
    /// Bucket for an optional presented key.
    pub fn for_key(key: Option<&str>) -> Self {
        match key {
            Some(k) => BucketKey::ApiKey(k.to_string()),
            None => BucketKey::Anonymous,
        }
    }
}

/// Request budget applied to every bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimits {
    /// Tokens restored per second.
    pub requests_per_second: f64,
    /// Capacity of a keyed bucket.
    pub burst: f64,
    /// Capacity of the shared anonymous bucket.
    pub anonymous_burst: f64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst: 50.0,
            anonymous_burst: 10.0,
        }
    }
}

impl RateLimits {
    fn capacity(&self, key: &BucketKey) -> f64 {
        match key {
            BucketKey::ApiKey(_) => self.burst,
            BucketKey::Anonymous => self.anonymous_burst,
        }
    }
}

/// Outcome of charging one request to a bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    /// Request admitted; whole tokens left afterwards.
    Allowed {
        /// Whole tokens left after this request.
        remaining: u32,
    },
    /// Bucket empty; one token is back after `retry_after`.
    Limited {
        /// Time until the next token is available.
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

struct Bucket {
    tokens: f64,
    last_seen: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.duration_since(self.last_seen).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_seen = now;
    }
}

/// Token-bucket limiter with one bucket per API key and a smaller shared
/// bucket for anonymous callers.
pub struct RateLimiter {
    limits: RateLimits,
    buckets: Mutex<HashMap<BucketKey, Bucket>>,
}

impl RateLimiter {
    /// Limiter enforcing `limits`. Buckets start full.
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// The budget this limiter enforces.
    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    /// Charge one request to `key`.
    pub async fn check(&self, key: &BucketKey) -> RateDecision {
        let capacity = self.limits.capacity(key);
        let rate = self.limits.requests_per_second;
        let now = Instant::now();

        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(key.clone()).or_insert(Bucket {
            tokens: capacity,
            last_seen: now,
        });
        bucket.refill(now, rate, capacity);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateDecision::Allowed {
                remaining: bucket.tokens.floor() as u32,
            }
        } else {
            // A zero refill rate never recovers.
            let retry_after =
                Duration::try_from_secs_f64((1.0 - bucket.tokens) / rate).unwrap_or(Duration::MAX);
            RateDecision::Limited { retry_after }
        }
    }

    /// Forget buckets idle for at least `max_idle`. Returns how many were dropped.
    pub async fn sweep(&self, max_idle: Duration) -> usize {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        let before = buckets.len();
        buckets.retain(|_, b| now.duration_since(b.last_seen) < max_idle);
        before - buckets.len()
    }

    /// Number of buckets currently held.
    pub async fn tracked(&self) -> usize {
        self.buckets.lock().await.len()
    }
}
