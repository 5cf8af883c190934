//! Release tracker - the only path through which cached handles are freed.
//!
//! After every cache mutation the tracker compares the previous snapshot with
//! the new one by tile identity and releases each tile that dropped out.
//! Because each tile id is adopted once and never re-enters the cache, a tile
//! can appear in at most one diff, so its handle is released exactly once.
//! Teardown feeds an empty snapshot as the last diff.

use std::collections::HashSet;
use std::sync::Arc;

use log::trace;

use super::tile_cache::{Tile, TileId, TileSnapshot, empty_snapshot};

#[derive(Debug)]
pub struct ReleaseTracker<H> {
    last: TileSnapshot<H>,
}

impl<H> Default for ReleaseTracker<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ReleaseTracker<H> {
    pub fn new() -> Self {
        Self {
            last: empty_snapshot(),
        }
    }

    /// Diff `current` against the previous snapshot and release every tile
    /// that is no longer live. Returns the released tiles.
    pub fn observe<F>(&mut self, current: &TileSnapshot<H>, mut release: F) -> Vec<Arc<Tile<H>>>
    where
        F: FnMut(&H),
    {
        let live: HashSet<TileId> = current.iter().map(|t| t.id).collect();
        let removed: Vec<Arc<Tile<H>>> = self
            .last
            .iter()
            .filter(|t| !live.contains(&t.id))
            .cloned()
            .collect();

        // Store first: a panicking release must not re-diff these tiles
        self.last = Arc::clone(current);

        for tile in &removed {
            trace!("Releasing tile {}s (id {})", tile.from, tile.id.0);
            release(&tile.handle);
        }
        removed
    }

    /// Snapshot the tracker last observed.
    pub fn last(&self) -> &TileSnapshot<H> {
        &self.last
    }
}
