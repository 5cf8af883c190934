//! Source generation counter for cancelling stale renders
//!
//! **Why**: A render is dispatched for one source but may resolve after the user
//! switched file or audio stream. Every dispatch is stamped with the generation
//! current at that moment; a source change bumps the counter, so any result
//! carrying an older stamp is stale and must not enter the cache.
//!
//! **Used by**: WindowCache (bumps on source change), Workers (skips stale jobs
//! before they start), dispatcher (classifies completions)

use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared generation counter.
///
/// Cloning shares the same counter (cheap `Arc` clone).
#[derive(Debug, Clone, Default)]
pub struct Generation {
    current: Arc<AtomicU64>,
}

impl Generation {
    pub fn new() -> Self {
        Self {
            current: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Increment generation and return new value
    ///
    /// Call this when the active source changes to invalidate all dispatched renders.
    pub fn bump(&self) -> u64 {
        let next = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Generation bumped: {}", next);
        next
    }

    /// Get current generation
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Stamp a token with the current generation (taken at dispatch time).
    pub fn token(&self) -> GenerationToken {
        GenerationToken {
            stamp: self.current(),
            current: Arc::clone(&self.current),
        }
    }

    /// Get shared counter (for Workers)
    pub fn epoch_ref(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.current)
    }
}

/// Generation stamp taken at dispatch, checked at resolution.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    stamp: u64,
    current: Arc<AtomicU64>,
}

impl GenerationToken {
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// True once the source changed after this token was taken.
    pub fn is_stale(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.stamp
    }
}
