//! Events published by the WindowCache.

use std::time::Duration;

use super::tile_cache::{TileId, TileSnapshot};
use super::traits::SourceId;

// === Cache state ===

/// Live tiles after a mutation. Emitted once per state transition.
#[derive(Debug)]
pub struct TilesChangedEvent<H> {
    pub tiles: TileSnapshot<H>,
}

#[derive(Clone, Debug)]
pub struct TileAdoptedEvent {
    pub id: TileId,
    pub from: i64,
    /// Dispatch to completion
    pub elapsed: Duration,
}

/// Oldest tile dropped to make room (capacity eviction).
#[derive(Clone, Debug)]
pub struct TileEvictedEvent {
    pub id: TileId,
    pub from: i64,
}

/// Whole cache cleared because the source (or window geometry) changed.
#[derive(Clone, Debug)]
pub struct SourceResetEvent {
    pub source: Option<SourceId>,
    pub cleared: usize,
}

// === Render lifecycle ===

#[derive(Clone, Debug)]
pub struct RenderStartedEvent {
    pub source: SourceId,
    pub from: i64,
    pub duration: f64,
    pub generation: u64,
}

/// Stale render dropped without touching the cache.
#[derive(Clone, Debug)]
pub struct RenderDiscardedEvent {
    pub from: i64,
}

#[derive(Clone, Debug)]
pub struct RenderFailedEvent {
    pub from: i64,
    pub message: String,
}
