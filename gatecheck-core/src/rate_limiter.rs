//! Component D — per-`(ip, rule)` token-bucket rate limiting.
//!
//! Bucket state lives in a [`DashMap`], sharded internally the same way
//! `r2e_openfga::cache::DecisionCache` shards its entries, so two requests
//! against different keys never contend on the same lock.

use crate::model::{BucketKey, RateLimitConfig, RateLimitOutcome};
use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

/// Token-bucket limiter keyed by `(ip, rule_id)`.
#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<BucketKey, Mutex<Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Evaluate and, if allowed, consume one token.
    ///
    /// Refill is elapsed-time based: `capacity / window_seconds` tokens
    /// accrue per second since the bucket's last refill, capped at
    /// `capacity`. A denied request never decrements — only an allowed one
    /// does.
    pub fn check(&self, key: BucketKey, config: &RateLimitConfig, now: Instant) -> RateLimitOutcome {
        let capacity = config.requests_per_window as f64;
        let window = (config.window_seconds.max(1)) as f64;
        let refill_rate = capacity / window;

        let entry = self
            .buckets
            .entry(key)
            .or_insert_with(|| Mutex::new(Bucket { tokens: capacity, last_refill: now, last_seen: now }));
        let mut bucket = entry.lock().unwrap();

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * refill_rate).min(capacity);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitOutcome::Allowed
        } else {
            RateLimitOutcome::RateLimitExceeded
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop every bucket untouched for longer than `ttl`, as of `now`.
    pub fn sweep(&self, ttl: Duration, now: Instant) {
        self.buckets.retain(|_, bucket| {
            now.saturating_duration_since(bucket.lock().unwrap().last_seen) < ttl
        });
    }

    /// Spawn a periodic background sweep. Returns a [`CancellationToken`]
    /// the caller can use to stop it (e.g. on shutdown).
    pub fn spawn_cleanup(self: std::sync::Arc<Self>, ttl: Duration, interval: Duration) -> CancellationToken {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep(ttl, Instant::now());
                    }
                }
            }
        });
        token
    }
}
