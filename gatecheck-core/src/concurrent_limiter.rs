//! Component E — caps the number of in-flight requests per `(ip, rule)`.
//!
//! Counters are bare [`AtomicI64`]s behind a [`DashMap`], so `acquire` and
//! `release` never block on each other across keys. Release happens through
//! a [`ConcurrencyToken`] guard so a cancelled or panicking handler still
//! frees its slot — same shape as a `tower` service's request-completion
//! guard.

use crate::model::{BucketKey, ConcurrentLimitOutcome};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// One key's in-flight counter plus a heartbeat of its last `acquire`/
/// `release`, used by [`ConcurrentLimiter::spawn_stale_sweep`] to reclaim
/// slots a caller forgot to release.
struct Slot {
    count: AtomicI64,
    last_activity: Mutex<Instant>,
}

impl Slot {
    fn new(now: Instant) -> Self {
        Self { count: AtomicI64::new(0), last_activity: Mutex::new(now) }
    }

    fn touch(&self, now: Instant) {
        *self.last_activity.lock().unwrap() = now;
    }
}

/// Shared in-flight-request counters.
#[derive(Default)]
pub struct ConcurrentLimiter {
    counters: Arc<DashMap<BucketKey, Slot>>,
}

impl ConcurrentLimiter {
    pub fn new() -> Self {
        Self { counters: Arc::new(DashMap::new()) }
    }

    /// Attempt to take a slot. On success, the returned [`ConcurrencyToken`]
    /// must be held for the lifetime of the request; dropping it (including
    /// via cancellation or panic unwind) releases the slot exactly once.
    pub fn try_acquire(
        &self,
        key: BucketKey,
        max_concurrent: u64,
    ) -> Result<ConcurrencyToken, ConcurrentLimitOutcome> {
        let now = Instant::now();
        let entry = self.counters.entry(key).or_insert_with(|| Slot::new(now));
        let max = max_concurrent as i64;

        loop {
            let current = entry.count.load(Ordering::Acquire);
            if current >= max {
                return Err(ConcurrentLimitOutcome::ConcurrentLimitExceeded);
            }
            if entry
                .count
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                entry.touch(now);
                return Ok(ConcurrencyToken {
                    counters: self.counters.clone(),
                    key,
                    consumed: AtomicBool::new(false),
                });
            }
        }
    }

    pub fn current(&self, key: BucketKey) -> i64 {
        self.counters.get(&key).map(|c| c.count.load(Ordering::Acquire)).unwrap_or(0)
    }

    /// Drop every counter that is currently zero, as a housekeeping sweep
    /// for keys that will never be touched again.
    pub fn sweep_idle(&self) {
        self.counters.retain(|_, slot| slot.count.load(Ordering::Acquire) != 0);
    }

    /// Reclaim slots whose heartbeat is older than `threshold` and whose
    /// count is still nonzero — i.e. a caller acquired a slot and never
    /// released it (a dropped [`ConcurrencyToken`] always decrements, so
    /// this only fires on an integration that bypasses the guard). Also
    /// drops zeroed, long-idle counters as routine housekeeping. Logs a
    /// warning per reclaimed key, since a nonzero reclaim indicates a bug
    /// upstream rather than expected behavior.
    pub fn sweep_stale(&self, threshold: Duration, now: Instant) {
        self.counters.retain(|key, slot| {
            let idle = now.saturating_duration_since(*slot.last_activity.lock().unwrap());
            if idle < threshold {
                return true;
            }
            let stuck = slot.count.swap(0, Ordering::AcqRel);
            if stuck != 0 {
                tracing::warn!(ip = %key.ip, rule_id = key.rule_id.0, stuck, "reclaimed stale concurrency slot");
            }
            false
        });
    }

    /// Spawn a periodic background sweep. Returns a [`CancellationToken`]
    /// the caller can use to stop it. Not started automatically by
    /// `gatecheck_core::init` — opt-in for hosts whose integration can't
    /// guarantee [`ConcurrencyToken`]'s `Drop` guard always runs.
    pub fn spawn_stale_sweep(
        self: Arc<Self>,
        threshold: Duration,
        interval: Duration,
    ) -> CancellationToken {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep_stale(threshold, Instant::now());
                    }
                }
            }
        });
        token
    }
}

/// RAII handle for one acquired concurrency slot.
pub struct ConcurrencyToken {
    counters: Arc<DashMap<BucketKey, Slot>>,
    key: BucketKey,
    consumed: AtomicBool,
}

impl ConcurrencyToken {
    /// Release the slot early, before the guard would otherwise drop.
    pub fn release(&self) {
        if self.consumed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(slot) = self.counters.get(&self.key) {
            slot.count.fetch_sub(1, Ordering::AcqRel);
            slot.touch(Instant::now());
        }
    }
}

impl Drop for ConcurrencyToken {
    fn drop(&mut self) {
        self.release();
    }
}
