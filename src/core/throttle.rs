//! Position throttle - coalesces cursor updates to at most one per interval.
//!
//! Playback and scrubbing produce positions far faster than tiles can be
//! rendered. The throttle lets the first update through immediately, holds
//! later ones as a single pending value, and releases the latest pending value
//! once the interval has elapsed:
//! 1. `push()` on every cursor move
//! 2. `tick()` from the update loop to flush the trailing value
//!
//! A loop that samples the cursor every iteration can call `update()` instead,
//! which does both.

use std::time::{Duration, Instant};

/// Leading + trailing edge throttle for playback positions.
///
/// # Usage
/// ```ignore
/// if let Some(pos) = throttle.push(cursor) {
///     cache.on_position_changed(pos);
/// }
/// // In update loop:
/// if let Some(pos) = throttle.tick() {
///     cache.on_position_changed(pos);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PositionThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<f64>,
    last_seen: Option<f64>,
}

impl Default for PositionThrottle {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl PositionThrottle {
    /// Create with interval in milliseconds
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            last_emit: None,
            pending: None,
            last_seen: None,
        }
    }

    pub fn set_interval(&mut self, interval_ms: u64) {
        self.interval = Duration::from_millis(interval_ms);
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval.as_millis() as u64
    }

    /// Offer a new position. Returns it at once if the interval has elapsed
    /// since the last emitted value, otherwise keeps it as pending.
    pub fn push(&mut self, position: f64) -> Option<f64> {
        self.push_at(position, Instant::now())
    }

    pub fn push_at(&mut self, position: f64, now: Instant) -> Option<f64> {
        if self.is_open(now) {
            self.pending = None;
            self.last_emit = Some(now);
            log::trace!("PositionThrottle: emit {:.3}", position);
            Some(position)
        } else {
            self.pending = Some(position);
            None
        }
    }

    /// Flush the pending position once the interval has elapsed.
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        if self.pending.is_none() || !self.is_open(now) {
            return None;
        }
        self.last_emit = Some(now);
        let position = self.pending.take();
        log::trace!("PositionThrottle: trailing emit {:?}", position);
        position
    }

    /// Feed the current cursor once per update loop iteration.
    ///
    /// A moved cursor goes through `push`; an unchanged one flushes the
    /// trailing value through `tick`, so a cursor that stops still gets its
    /// last position emitted.
    pub fn update(&mut self, position: f64) -> Option<f64> {
        self.update_at(position, Instant::now())
    }

    pub fn update_at(&mut self, position: f64, now: Instant) -> Option<f64> {
        if self.last_seen == Some(position) {
            return self.tick_at(now);
        }
        self.last_seen = Some(position);
        self.push_at(position, now)
    }

    /// Drop any pending value (e.g. on seek to a new source).
    pub fn cancel(&mut self) {
        if self.pending.is_some() {
            log::trace!("PositionThrottle: cancelled pending position");
        }
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<f64> {
        self.pending
    }

    fn is_open(&self, now: Instant) -> bool {
        match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }
}
