//! Core engine - window selection, render dispatch, tile cache, events, workers
//!
//! These modules form the tile engine, independent of any render backend.

pub mod cache_events;
pub mod dispatcher;
pub mod event_bus;
pub mod generation;
pub mod release;
pub mod stats;
pub mod throttle;
pub mod tile_cache;
pub mod traits;
pub mod window;
pub mod window_cache;
pub mod workers;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use dispatcher::{Dispatch, InFlight, Skip};
pub use event_bus::EventBus;
pub use generation::{Generation, GenerationToken};
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use throttle::PositionThrottle;
pub use tile_cache::{Tile, TileId, TileSnapshot};
pub use traits::{RenderParams, RenderRequest, RenderedTile, SourceId, TileRenderer, WorkerPool};
pub use window::Window;
pub use window_cache::{WindowCache, WindowConfig};
pub use workers::Workers;
