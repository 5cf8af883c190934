//! Bounded tile cache keyed by window start.
//!
//! Live tiles are held as an immutable snapshot (`Arc<[Arc<Tile>]>`); every
//! mutation builds a new snapshot and swaps it in, so observers see exactly one
//! state transition per mutation and the release tracker can diff old vs new.
//!
//! Eviction is FIFO by creation time: when an insertion finds the cache full,
//! the single tile with the oldest `created_at` is dropped. The cache never
//! releases handles itself - dropped tiles are returned to the caller and the
//! release tracker picks them up from the snapshot diff.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use log::debug;

use super::traits::RenderedTile;

/// Unique identity of an adopted tile (never reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u64);

/// Cached render of one window.
#[derive(Debug)]
pub struct Tile<H> {
    pub id: TileId,
    /// Window start (seconds) - cache key, unique among live tiles
    pub from: i64,
    /// Rendered duration (seconds)
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    /// Eviction order only
    pub created_at: Instant,
    /// Backend resource, released once the tile leaves the cache
    pub handle: H,
}

impl<H> Tile<H> {
    pub fn new(id: TileId, from: i64, duration: f64, rendered: RenderedTile<H>, created_at: Instant) -> Self {
        Self {
            id,
            from,
            duration,
            width: rendered.width,
            height: rendered.height,
            created_at,
            handle: rendered.handle,
        }
    }

    /// End of the covered window (seconds)
    pub fn to(&self) -> f64 {
        self.from as f64 + self.duration
    }
}

/// Immutable view of the live tiles.
pub type TileSnapshot<H> = Arc<[Arc<Tile<H>>]>;

pub(crate) fn empty_snapshot<H>() -> TileSnapshot<H> {
    Arc::from(Vec::new())
}

/// Bounded cache of tiles with FIFO eviction.
#[derive(Debug)]
pub struct TileCache<H> {
    tiles: TileSnapshot<H>,
    capacity: NonZeroUsize,
    next_id: u64,
}

impl<H> TileCache<H> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        debug!("TileCache created: capacity={}", capacity);
        Self {
            tiles: empty_snapshot(),
            capacity,
            next_id: 0,
        }
    }

    /// Reserve the id for a tile about to be inserted.
    pub fn allocate_id(&mut self) -> TileId {
        let id = TileId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a tile, evicting the oldest one if the cache is full.
    ///
    /// Capacity is checked against the pre-insertion count and at most one
    /// tile is evicted. Returns the evicted tile (if any). A tile whose `from`
    /// is already cached is handed back untouched in `Err`.
    pub fn insert(&mut self, tile: Tile<H>) -> Result<Option<Arc<Tile<H>>>, Tile<H>> {
        if self.contains(tile.from) {
            return Err(tile);
        }

        // Stable sort: equal timestamps keep insertion order
        let mut ordered: Vec<Arc<Tile<H>>> = self.tiles.to_vec();
        ordered.sort_by_key(|t| t.created_at);

        let evicted = if ordered.len() >= self.capacity.get() {
            Some(ordered.remove(0))
        } else {
            None
        };

        if let Some(old) = &evicted {
            debug!("Evicted tile {}s (id {})", old.from, old.id.0);
        }
        debug!("Cached tile {}s +{:.3}s (id {})", tile.from, tile.duration, tile.id.0);

        ordered.push(Arc::new(tile));
        self.tiles = ordered.into();
        Ok(evicted)
    }

    /// Drop every tile. Returns how many were live.
    pub fn clear(&mut self) -> usize {
        let count = self.tiles.len();
        if count > 0 {
            self.tiles = empty_snapshot();
            debug!("Cleared tile cache: {} tiles", count);
        }
        count
    }

    /// Change capacity; shrinking evicts oldest tiles until within bounds.
    pub fn set_capacity(&mut self, capacity: NonZeroUsize) -> Vec<Arc<Tile<H>>> {
        self.capacity = capacity;
        if self.tiles.len() <= capacity.get() {
            return Vec::new();
        }

        let mut ordered: Vec<Arc<Tile<H>>> = self.tiles.to_vec();
        ordered.sort_by_key(|t| t.created_at);
        let excess = ordered.len() - capacity.get();
        let evicted: Vec<Arc<Tile<H>>> = ordered.drain(0..excess).collect();
        self.tiles = ordered.into();

        debug!("Capacity -> {}: evicted {} tiles", capacity, evicted.len());
        evicted
    }

    pub fn get(&self, from: i64) -> Option<&Arc<Tile<H>>> {
        self.tiles.iter().find(|t| t.from == from)
    }

    pub fn contains(&self, from: i64) -> bool {
        self.get(from).is_some()
    }

    /// Current snapshot (cheap clone).
    pub fn snapshot(&self) -> TileSnapshot<H> {
        Arc::clone(&self.tiles)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}
