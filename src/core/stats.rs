//! Cache and render counters for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics, shared via `Arc` so a UI thread can read them.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    dispatched: AtomicU64,
    adopted: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
    evicted: AtomicU64,
    released: AtomicU64,
}

/// Plain copy of the counters at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Position updates whose window was already cached
    pub hits: u64,
    /// Renders sent to the pool
    pub dispatched: u64,
    /// Renders whose tile entered the cache
    pub adopted: u64,
    /// Stale renders dropped without entering the cache
    pub discarded: u64,
    pub failed: u64,
    /// Tiles removed by capacity
    pub evicted: u64,
    /// Handles released (evicted, reset, teardown, discarded)
    pub released: u64,
}

impl CacheStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.dispatched;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adopted(&self) {
        self.adopted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_released(&self, count: u64) {
        self.released.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            adopted: self.adopted.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.dispatched,
            &self.adopted,
            &self.discarded,
            &self.failed,
            &self.evicted,
            &self.released,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
