//! WAVETILES - windowed waveform tile cache
//!
//! Re-exports all modules for use by the binary target.

// Core engine (window cache, dispatch, events, workers)
pub mod core;

// Backend + app modules
pub mod cli;
pub mod config;
pub mod error;
pub mod render;

// Re-export commonly used types from core
pub use self::core::cache_events::{
    RenderDiscardedEvent, RenderFailedEvent, RenderStartedEvent, SourceResetEvent, TileAdoptedEvent,
    TileEvictedEvent, TilesChangedEvent,
};
pub use self::core::event_bus::{downcast_event, BoxedEvent, EventBus};
pub use self::core::{Dispatch, PositionThrottle, SourceId, TileRenderer, WindowCache, WindowConfig};

pub use error::{ConfigError, RenderError};
pub use render::{BlobStore, BlobUrl, PngWaveformRenderer, Theme};
