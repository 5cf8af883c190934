//! Window selection - maps a playback position to a fixed-size render window.
//!
//! Windows are aligned to multiples of `window_size` seconds:
//! `from = floor(position / window_size) * window_size`.
//! The last window of a file is clamped to the total duration, so its
//! duration may be shorter than `window_size` (or zero past the end).

use std::num::NonZeroU32;

/// Start of the window containing `position`, in whole seconds.
///
/// Returns None for positions that cannot be mapped (NaN, infinite, negative).
pub fn window_start(position: f64, window_size: NonZeroU32) -> Option<i64> {
    if !position.is_finite() || position < 0.0 {
        return None;
    }
    let size = window_size.get() as f64;
    Some(((position / size).floor() * size) as i64)
}

/// Duration of the window starting at `from`, clamped to `total_duration`.
///
/// `min(from + window_size, total_duration) - from`, never negative.
pub fn window_duration(from: i64, window_size: NonZeroU32, total_duration: f64) -> f64 {
    let from = from as f64;
    let end = (from + window_size.get() as f64).min(total_duration);
    (end - from).max(0.0)
}

/// A time-aligned segment of the timeline that maps to one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    /// Window start (seconds), the cache key
    pub from: i64,
    /// Clamped duration (seconds)
    pub duration: f64,
}

impl Window {
    /// Window covering `position`, clamped to `total_duration`.
    pub fn at(position: f64, window_size: NonZeroU32, total_duration: f64) -> Option<Self> {
        let from = window_start(position, window_size)?;
        Some(Self {
            from,
            duration: window_duration(from, window_size, total_duration),
        })
    }

    /// Zero-length windows (cursor at or past the end) are never rendered.
    pub fn is_empty(&self) -> bool {
        self.duration <= 0.0
    }

    /// End of the window (seconds)
    pub fn to(&self) -> f64 {
        self.from as f64 + self.duration
    }
}
