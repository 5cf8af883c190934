//! Error types for rendering and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Render backend errors.
///
/// All of these are recovered locally by the engine: logged, in-flight slot
/// cleared, no tile produced.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Audio stream {stream} not found ({available} available)")]
    StreamNotFound { stream: usize, available: usize },
    #[error("Window {from}s (+{duration}s) is outside the source ({total:.3}s long)")]
    WindowOutOfRange { from: i64, duration: f64, total: f64 },
    #[error("Image encode failed: {0}")]
    Encode(String),
    #[error("Render backend failed: {0}")]
    Backend(String),
}

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Window size must be at least 1 second")]
    ZeroWindow,
    #[error("Cache capacity must be at least 1 tile")]
    ZeroCapacity,
    #[error("Tile size must be non-zero (got {width}x{height})")]
    ZeroTileSize { width: u32, height: u32 },
}
