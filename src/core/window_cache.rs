//! WindowCache - renders waveform tiles around a moving playback position.
//!
//! **Flow**: position update -> window start -> cached? in flight? -> dispatch
//! render -> (later, via `pump`) adopt tile, evict oldest if full, or discard
//! the result if the source changed meanwhile.
//!
//! **Ownership**: the cache owns every adopted tile's handle. Handles are only
//! ever released by the release tracker, which diffs the previous and current
//! snapshot after each mutation. Teardown (`close` / `Drop`) diffs against an
//! empty set, so nothing outlives the cache.
//!
//! **Stale renders**: a source change bumps the generation. The running render
//! is not aborted - it keeps the in-flight slot until it resolves, and its
//! result is then dropped (handle released by the discarder). New renders for
//! the new source start once the slot is free.

use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use super::cache_events::{
    RenderDiscardedEvent, RenderFailedEvent, RenderStartedEvent, SourceResetEvent, TileAdoptedEvent,
    TileEvictedEvent, TilesChangedEvent,
};
use super::dispatcher::{Dispatch, Dispatcher, InFlight, Resolution, Skip};
use super::event_bus::EventBus;
use super::generation::Generation;
use super::release::ReleaseTracker;
use super::stats::CacheStats;
use super::tile_cache::{Tile, TileCache, TileSnapshot};
use super::traits::{RenderParams, RenderRequest, SourceId, TileRenderer, WorkerPool};
use super::window::Window;
use super::workers::Workers;
use crate::error::ConfigError;

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowConfig {
    /// Seconds per render window
    pub window_size: NonZeroU32,
    /// Maximum live tiles
    pub max_tiles: NonZeroUsize,
    pub params: RenderParams,
}

impl WindowConfig {
    pub fn new(window_secs: u32, max_tiles: usize, params: RenderParams) -> Result<Self, ConfigError> {
        Ok(Self {
            window_size: NonZeroU32::new(window_secs).ok_or(ConfigError::ZeroWindow)?,
            max_tiles: NonZeroUsize::new(max_tiles).ok_or(ConfigError::ZeroCapacity)?,
            params,
        })
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: NonZeroU32::new(60).unwrap_or(NonZeroU32::MIN),
            max_tiles: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
            params: RenderParams::default(),
        }
    }
}

pub struct WindowCache<R: TileRenderer> {
    dispatcher: Dispatcher<R>,
    cache: TileCache<R::Handle>,
    tracker: ReleaseTracker<R::Handle>,
    events: EventBus,
    stats: Arc<CacheStats>,
    source: Option<SourceId>,
    enabled: bool,
    total_duration: f64,
    window_size: NonZeroU32,
    params: RenderParams,
    last_position: Option<f64>,
    closed: bool,
}

impl<R: TileRenderer> WindowCache<R> {
    /// Create engine on an existing pool.
    ///
    /// `generation` must be the counter the pool checks epochs against.
    pub fn new(renderer: Arc<R>, pool: Arc<dyn WorkerPool>, generation: Generation, config: WindowConfig) -> Self {
        info!(
            "WindowCache init: window={}s, max_tiles={}, tile={}x{}",
            config.window_size, config.max_tiles, config.params.width, config.params.height
        );
        Self {
            dispatcher: Dispatcher::new(renderer, pool, generation),
            cache: TileCache::new(config.max_tiles),
            tracker: ReleaseTracker::new(),
            events: EventBus::immediate(),
            stats: Arc::new(CacheStats::new()),
            source: None,
            enabled: true,
            total_duration: f64::INFINITY,
            window_size: config.window_size,
            params: config.params,
            last_position: None,
            closed: false,
        }
    }

    /// Create engine with its own render thread pool.
    pub fn with_workers(renderer: Arc<R>, config: WindowConfig, threads: usize) -> std::io::Result<Self> {
        let generation = Generation::new();
        let workers = Workers::new(threads, generation.epoch_ref())?;
        Ok(Self::new(renderer, Arc::new(workers), generation, config))
    }

    /// Publish events on `bus` instead of the default callback-only bus.
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = bus;
        self
    }

    // ========== Inputs ==========

    /// Handle a (coalesced) playback position update.
    pub fn on_position_changed(&mut self, position: f64) -> Dispatch {
        self.pump();
        self.last_position = Some(position);
        self.try_dispatch(position)
    }

    /// Switch the active source. Any change clears the whole cache and marks
    /// the in-flight render (if any) stale. Same source again is a no-op.
    pub fn on_source_changed(&mut self, source: Option<SourceId>) {
        if self.source == source {
            return;
        }
        let generation = self.dispatcher.generation().bump();
        info!(
            "Source changed: {} (generation {})",
            source.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "none".into()),
            generation
        );
        self.source = source;
        self.reset();
        self.refresh();
    }

    /// Enable or disable rendering. Disabling leaves cache and in-flight render alone.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        debug!("Rendering {}", if enabled { "enabled" } else { "disabled" });
        self.enabled = enabled;
        self.refresh();
    }

    /// Clamp bound for the last window.
    pub fn set_total_duration(&mut self, total_duration: f64) {
        if self.total_duration == total_duration {
            return;
        }
        self.total_duration = total_duration;
        self.refresh();
    }

    /// New params apply to future renders; cached tiles are kept.
    pub fn set_params(&mut self, params: RenderParams) {
        if self.params == params {
            return;
        }
        self.params = params;
        self.refresh();
    }

    /// Window keys change meaning with the size, so this resets like a source change.
    pub fn set_window_size(&mut self, window_size: NonZeroU32) {
        if self.window_size == window_size {
            return;
        }
        self.dispatcher.generation().bump();
        info!("Window size: {}s -> {}s", self.window_size, window_size);
        self.window_size = window_size;
        self.reset();
        self.refresh();
    }

    /// Change capacity; shrinking evicts the oldest tiles.
    pub fn set_capacity(&mut self, max_tiles: NonZeroUsize) {
        let evicted = self.cache.set_capacity(max_tiles);
        if evicted.is_empty() {
            return;
        }
        for tile in &evicted {
            self.stats.record_evicted();
            self.events.emit(TileEvictedEvent {
                id: tile.id,
                from: tile.from,
            });
        }
        drop(evicted);
        self.commit();
    }

    /// Re-run the dispatch decision for the last known position.
    pub fn refresh(&mut self) -> Dispatch {
        match self.last_position {
            Some(position) => self.try_dispatch(position),
            None => Dispatch::Skipped(Skip::NoWindow),
        }
    }

    // ========== Completions ==========

    /// Apply finished renders without blocking. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(resolution) = self.dispatcher.try_complete() {
            self.apply(resolution);
            applied += 1;
        }
        applied
    }

    /// Block until the in-flight render (if any) resolves, up to `timeout`.
    ///
    /// Returns true when the slot is free.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        self.pump();
        if let Some(resolution) = self.dispatcher.wait_complete(timeout) {
            self.apply(resolution);
        }
        !self.dispatcher.is_busy()
    }

    /// Release every tile and stop accepting results. Also runs on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Anything still rendering belongs to a dead cache
        self.dispatcher.generation().bump();
        let cleared = self.cache.clear();
        self.commit();
        info!("WindowCache closed: released {} tiles", cleared);
    }

    // ========== Queries ==========

    /// Live tiles, oldest first.
    pub fn tiles(&self) -> TileSnapshot<R::Handle> {
        self.cache.snapshot()
    }

    pub fn get(&self, from: i64) -> Option<&Arc<Tile<R::Handle>>> {
        self.cache.get(from)
    }

    pub fn contains(&self, from: i64) -> bool {
        self.cache.contains(from)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    pub fn is_rendering(&self) -> bool {
        self.dispatcher.is_busy()
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.dispatcher.in_flight()
    }

    pub fn source(&self) -> Option<&SourceId> {
        self.source.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn window_size(&self) -> NonZeroU32 {
        self.window_size
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ========== Internals ==========

    fn try_dispatch(&mut self, position: f64) -> Dispatch {
        if self.closed {
            return Dispatch::Skipped(Skip::NoSource);
        }
        let window = Window::at(position, self.window_size, self.total_duration);
        let cache = &self.cache;
        let checked = self
            .dispatcher
            .check(self.source.as_ref(), self.enabled, window, |from| cache.contains(from));

        let (source, window) = match checked {
            Ok((source, window)) => (source.clone(), window),
            Err(skip) => {
                if skip == Skip::Cached {
                    self.stats.record_hit();
                }
                trace!("Position {:.3}: skip ({:?})", position, skip);
                return Dispatch::Skipped(skip);
            }
        };

        let request = RenderRequest {
            source: source.clone(),
            from: window.from,
            duration: window.duration,
            params: self.params,
        };
        if let Err(skip) = self.dispatcher.dispatch(request) {
            return Dispatch::Skipped(skip);
        }

        self.stats.record_dispatch();
        self.events.emit(RenderStartedEvent {
            source,
            from: window.from,
            duration: window.duration,
            generation: self.dispatcher.generation().current(),
        });
        Dispatch::Started(window)
    }

    fn apply(&mut self, resolution: Resolution<R>) {
        match resolution {
            Resolution::Adopt {
                from,
                duration,
                pending,
                elapsed,
            } => {
                let Some(rendered) = pending.adopt() else {
                    return;
                };
                let id = self.cache.allocate_id();
                let tile = Tile::new(id, from, duration, rendered, Instant::now());
                match self.cache.insert(tile) {
                    Ok(evicted) => {
                        self.stats.record_adopted();
                        debug!("Adopted tile {}s in {:.1}ms", from, elapsed.as_secs_f64() * 1000.0);
                        if let Some(old) = evicted {
                            self.stats.record_evicted();
                            self.events.emit(TileEvictedEvent {
                                id: old.id,
                                from: old.from,
                            });
                        }
                        self.events.emit(TileAdoptedEvent { id, from, elapsed });
                        self.commit();
                    }
                    Err(rejected) => {
                        // Never adopted, so the tracker will not see it
                        warn!("Tile {}s already cached, dropping duplicate render", from);
                        self.dispatcher.renderer().release(&rejected.handle);
                        self.stats.record_released(1);
                    }
                }
            }
            Resolution::Discarded { from, released } => {
                self.stats.record_discarded();
                if released {
                    self.stats.record_released(1);
                }
                self.events.emit(RenderDiscardedEvent { from });
            }
            Resolution::Failed { from, error } => {
                warn!("Failed to render waveform tile {}s: {}", from, error);
                self.stats.record_failed();
                self.events.emit(RenderFailedEvent {
                    from,
                    message: error.to_string(),
                });
            }
        }
    }

    /// Clear the cache (source or geometry changed) and publish the empty state.
    fn reset(&mut self) {
        let cleared = self.cache.clear();
        self.commit();
        self.events.emit(SourceResetEvent {
            source: self.source.clone(),
            cleared,
        });
    }

    /// Publish the current snapshot and release whatever dropped out of it.
    fn commit(&mut self) {
        let snapshot = self.cache.snapshot();
        let last = self.tracker.last();
        if Arc::ptr_eq(&snapshot, last) || (snapshot.is_empty() && last.is_empty()) {
            return;
        }
        let renderer = Arc::clone(self.dispatcher.renderer());
        let released = self.tracker.observe(&snapshot, |handle| renderer.release(handle));
        if !released.is_empty() {
            debug!("Released {} tiles", released.len());
            self.stats.record_released(released.len() as u64);
        }
        self.events.emit(TilesChangedEvent { tiles: snapshot });
    }
}

impl<R: TileRenderer> Drop for WindowCache<R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{FakeRenderer, InlinePool, ManualPool};
    use proptest::prelude::*;
    use std::sync::Mutex;

    type Engine = WindowCache<FakeRenderer>;

    fn config(window_secs: u32, max_tiles: usize) -> WindowConfig {
        WindowConfig::new(window_secs, max_tiles, RenderParams::default()).unwrap()
    }

    fn manual(window_secs: u32, max_tiles: usize) -> (Engine, Arc<FakeRenderer>, Arc<ManualPool>) {
        let generation = Generation::new();
        let renderer = Arc::new(FakeRenderer::new());
        let pool = Arc::new(ManualPool::new(generation.epoch_ref()));
        let engine = WindowCache::new(Arc::clone(&renderer), pool.clone(), generation, config(window_secs, max_tiles));
        (engine, renderer, pool)
    }

    fn inline(window_secs: u32, max_tiles: usize) -> (Engine, Arc<FakeRenderer>) {
        let generation = Generation::new();
        let renderer = Arc::new(FakeRenderer::new());
        let pool = Arc::new(InlinePool::new(generation.epoch_ref()));
        let engine = WindowCache::new(Arc::clone(&renderer), pool, generation, config(window_secs, max_tiles));
        (engine, renderer)
    }

    fn source(name: &str) -> Option<SourceId> {
        Some(SourceId::new(name, 0))
    }

    #[test]
    fn test_position_renders_aligned_window() {
        let (mut engine, renderer) = inline(10, 100);
        engine.on_source_changed(source("a.wav"));
        engine.set_total_duration(25.0);

        let dispatch = engine.on_position_changed(23.0);
        assert_eq!(
            dispatch,
            Dispatch::Started(Window {
                from: 20,
                duration: 5.0
            })
        );
        assert_eq!(engine.pump(), 1);

        let tile = engine.get(20).expect("tile cached");
        assert_eq!(tile.duration, 5.0);
        let requests = renderer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].from, 20);
        assert_eq!(requests[0].duration, 5.0);
    }

    #[test]
    fn test_cached_window_not_rendered_again() {
        let (mut engine, renderer) = inline(10, 100);
        engine.on_source_changed(source("a.wav"));

        assert!(engine.on_position_changed(3.0).is_started());
        engine.pump();
        assert_eq!(engine.on_position_changed(7.0), Dispatch::Skipped(Skip::Cached));
        assert_eq!(renderer.rendered(), 1);
        assert_eq!(engine.stats().snapshot().hits, 1);
    }

    #[test]
    fn test_no_source_no_render() {
        let (mut engine, renderer) = inline(10, 100);
        assert_eq!(engine.on_position_changed(5.0), Dispatch::Skipped(Skip::NoSource));
        assert_eq!(renderer.rendered(), 0);
    }

    #[test]
    fn test_single_render_in_flight() {
        let (mut engine, _, pool) = manual(10, 100);
        engine.on_source_changed(source("a.wav"));

        assert!(engine.on_position_changed(5.0).is_started());
        assert!(engine.is_rendering());
        // A different window while busy: skipped, not queued
        assert_eq!(engine.on_position_changed(15.0), Dispatch::Skipped(Skip::Busy));
        assert_eq!(engine.on_position_changed(25.0), Dispatch::Skipped(Skip::Busy));
        assert_eq!(pool.pending(), 1);

        pool.run_all();
        // Next update after the slot frees dispatches again
        assert!(engine.on_position_changed(15.0).is_started());
        assert!(engine.contains(0));
    }

    #[test]
    fn test_disabled_dispatches_nothing() {
        let (mut engine, renderer) = inline(10, 100);
        engine.on_source_changed(source("a.wav"));
        engine.set_enabled(false);

        assert_eq!(engine.on_position_changed(5.0), Dispatch::Skipped(Skip::Disabled));
        assert_eq!(renderer.rendered(), 0);
        assert!(!engine.is_rendering());

        // Re-enabling re-evaluates the last position
        engine.set_enabled(true);
        engine.pump();
        assert!(engine.contains(0));
    }

    #[test]
    fn test_disable_leaves_cache_and_in_flight_alone() {
        let (mut engine, _, pool) = manual(10, 100);
        engine.on_source_changed(source("a.wav"));
        engine.on_position_changed(5.0);
        pool.run_all();
        engine.pump();
        engine.on_position_changed(15.0);

        engine.set_enabled(false);
        assert!(engine.is_rendering());
        assert_eq!(engine.len(), 1);

        pool.run_all();
        engine.pump();
        assert!(engine.contains(10));
    }

    #[test]
    fn test_capacity_evicts_oldest_and_releases_it() {
        let (mut engine, renderer) = inline(1, 100);
        engine.on_source_changed(source("a.wav"));

        for pos in 0..100 {
            engine.on_position_changed(pos as f64);
            engine.pump();
        }
        assert_eq!(engine.len(), 100);
        let oldest = engine.tiles()[0].clone();
        assert_eq!(oldest.from, 0);

        engine.on_position_changed(100.0);
        engine.pump();

        assert_eq!(engine.len(), 100);
        assert!(!engine.contains(0));
        assert!(engine.contains(100));
        assert!(!renderer.is_live(&oldest.handle));
        assert_eq!(renderer.released(), 1);
        assert_eq!(renderer.live(), 100);
        assert_eq!(engine.stats().snapshot().evicted, 1);
    }

    #[test]
    fn test_source_change_mid_render_discards_result() {
        let (mut engine, renderer, pool) = manual(10, 100);
        engine.on_source_changed(source("a.wav"));
        engine.on_position_changed(5.0);

        // Job starts rendering, then the user picks another file
        pool.run_all_with(|| {});
        engine.on_source_changed(source("b.wav"));
        engine.pump();

        assert!(engine.is_empty());
        assert_eq!(renderer.rendered(), 1);
        assert_eq!(renderer.released(), 1);
        assert_eq!(renderer.live(), 0);
        assert_eq!(engine.stats().snapshot().discarded, 1);
    }

    #[test]
    fn test_stale_render_blocks_slot_until_resolved() {
        let (mut engine, renderer, pool) = manual(10, 100);
        engine.on_source_changed(source("a.wav"));
        engine.on_position_changed(5.0);

        engine.on_source_changed(source("b.wav"));
        assert!(engine.is_rendering());
        assert_eq!(engine.on_position_changed(5.0), Dispatch::Skipped(Skip::Busy));

        // Stale job never reaches the backend, but frees the slot
        pool.run_all();
        assert!(engine.on_position_changed(5.0).is_started());
        pool.run_all();
        engine.pump();

        assert_eq!(renderer.rendered(), 1);
        assert_eq!(renderer.requests()[0].source, SourceId::new("b.wav", 0));
        assert!(engine.contains(0));
    }

    #[test]
    fn test_source_change_releases_cached_tiles() {
        let (mut engine, renderer) = inline(10, 100);
        engine.on_source_changed(source("a.wav"));
        for pos in [5.0, 15.0, 25.0] {
            engine.on_position_changed(pos);
            engine.pump();
        }
        assert_eq!(renderer.live(), 3);

        // Stream switch on the same file is a source change too
        engine.on_source_changed(Some(SourceId::new("a.wav", 1)));
        // Last position is re-evaluated for the new source
        engine.pump();
        assert_eq!(engine.len(), 1);
        assert_eq!(renderer.released(), 3);
        assert_eq!(renderer.live(), 1);
        assert_eq!(renderer.bad_releases(), 0);
    }

    #[test]
    fn test_same_source_is_noop() {
        let (mut engine, renderer) = inline(10, 100);
        engine.on_source_changed(source("a.wav"));
        engine.on_position_changed(5.0);
        engine.pump();

        engine.on_source_changed(source("a.wav"));
        assert_eq!(engine.len(), 1);
        assert_eq!(renderer.released(), 0);
    }

    #[test]
    fn test_failure_clears_slot_and_retries() {
        let (mut engine, renderer) = inline(10, 100);
        engine.on_source_changed(source("a.wav"));
        renderer.fail_next();

        assert!(engine.on_position_changed(5.0).is_started());
        engine.pump();
        assert!(!engine.is_rendering());
        assert!(engine.is_empty());
        assert_eq!(engine.stats().snapshot().failed, 1);

        // Next eligible update retries naturally
        assert!(engine.on_position_changed(6.0).is_started());
        engine.pump();
        assert!(engine.contains(0));
    }

    #[test]
    fn test_teardown_releases_all_once() {
        let renderer;
        {
            let (mut engine, r) = inline(10, 100);
            renderer = r;
            engine.on_source_changed(source("a.wav"));
            for pos in [5.0, 15.0, 25.0, 35.0] {
                engine.on_position_changed(pos);
                engine.pump();
            }
            engine.close();
            assert!(engine.is_empty());
            // Drop after close must not release again
        }
        assert_eq!(renderer.released(), 4);
        assert_eq!(renderer.live(), 0);
        assert_eq!(renderer.bad_releases(), 0);
    }

    #[test]
    fn test_teardown_with_render_in_flight() {
        let (mut engine, renderer, pool) = manual(10, 100);
        engine.on_source_changed(source("a.wav"));
        engine.on_position_changed(5.0);
        pool.run_all();
        engine.pump();
        engine.on_position_changed(15.0);
        drop(engine);

        // The orphaned job still runs; its handle is released, not leaked
        pool.run_all();
        assert_eq!(renderer.live(), 0);
        assert_eq!(renderer.bad_releases(), 0);
    }

    #[test]
    fn test_tiles_changed_event_per_mutation() {
        let (mut engine, _) = inline(10, 2);
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        engine
            .events()
            .subscribe::<TilesChangedEvent<u64>, _>(move |e| s.lock().unwrap().push(e.tiles.len()));

        engine.on_source_changed(source("a.wav"));
        for pos in [5.0, 15.0, 25.0] {
            engine.on_position_changed(pos);
            engine.pump();
        }
        // Source reset on an already empty cache publishes nothing
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 2]);
    }

    #[test]
    fn test_window_size_change_resets() {
        let (mut engine, renderer) = inline(10, 100);
        engine.on_source_changed(source("a.wav"));
        engine.on_position_changed(15.0);
        engine.pump();
        assert!(engine.contains(10));

        engine.set_window_size(NonZeroU32::new(4).unwrap());
        engine.pump();
        assert!(!engine.contains(10));
        assert!(engine.contains(12));
        assert_eq!(renderer.released(), 1);
    }

    #[test]
    fn test_shrink_capacity_releases_evicted() {
        let (mut engine, renderer) = inline(10, 10);
        engine.on_source_changed(source("a.wav"));
        for i in 0..5 {
            engine.on_position_changed(i as f64 * 10.0);
            engine.pump();
        }
        engine.set_capacity(NonZeroUsize::new(2).unwrap());
        assert_eq!(engine.len(), 2);
        assert!(engine.contains(30) && engine.contains(40));
        assert_eq!(renderer.released(), 3);
        assert_eq!(engine.capacity(), 2);
    }

    #[test]
    fn test_params_passthrough_without_reset() {
        let (mut engine, renderer) = inline(10, 100);
        engine.on_source_changed(source("a.wav"));
        engine.on_position_changed(5.0);
        engine.pump();

        let params = RenderParams {
            color: [1, 2, 3, 255],
            width: 32,
            height: 8,
        };
        engine.set_params(params);
        engine.on_position_changed(15.0);
        engine.pump();

        assert_eq!(engine.len(), 2);
        assert_eq!(renderer.requests()[1].params, params);
        assert_eq!(engine.get(10).map(|t| t.width), Some(32));
    }

    #[test]
    fn test_zero_config_rejected() {
        assert_eq!(
            WindowConfig::new(0, 10, RenderParams::default()).unwrap_err(),
            ConfigError::ZeroWindow
        );
        assert_eq!(
            WindowConfig::new(10, 0, RenderParams::default()).unwrap_err(),
            ConfigError::ZeroCapacity
        );
    }

    #[test]
    fn test_with_workers_end_to_end() {
        let renderer = Arc::new(FakeRenderer::new());
        let mut engine = WindowCache::with_workers(Arc::clone(&renderer), config(10, 100), 1).unwrap();
        engine.on_source_changed(source("a.wav"));
        assert!(engine.on_position_changed(42.0).is_started());
        assert!(engine.wait_idle(Duration::from_secs(5)));
        assert!(engine.contains(40));
        drop(engine);
        assert_eq!(renderer.live(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Position(f64),
        Source(u8),
        Complete,
        Fail,
        Enable(bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0.0f64..200.0).prop_map(Op::Position),
            1 => (0u8..3).prop_map(Op::Source),
            4 => Just(Op::Complete),
            1 => Just(Op::Fail),
            1 => any::<bool>().prop_map(Op::Enable),
        ]
    }

    proptest! {
        #[test]
        fn prop_invariants_hold(ops in proptest::collection::vec(op(), 1..200), max_tiles in 1usize..6) {
            let (mut engine, renderer, pool) = manual(5, max_tiles);
            engine.on_source_changed(source("s0.wav"));

            for op in ops {
                match op {
                    Op::Position(p) => { engine.on_position_changed(p); }
                    Op::Source(n) => engine.on_source_changed(source(&format!("s{}.wav", n))),
                    Op::Complete => { pool.run_all(); engine.pump(); }
                    Op::Fail => { renderer.fail_next(); }
                    Op::Enable(on) => engine.set_enabled(on),
                }

                prop_assert!(engine.len() <= max_tiles);
                prop_assert!(pool.pending() <= 1);

                let tiles = engine.tiles();
                let mut froms: Vec<i64> = tiles.iter().map(|t| t.from).collect();
                froms.sort();
                froms.dedup();
                prop_assert_eq!(froms.len(), tiles.len());

                // Every live tile's handle is still unreleased
                for t in tiles.iter() {
                    prop_assert!(renderer.is_live(&t.handle));
                }
            }

            pool.run_all();
            drop(engine);
            pool.run_all();
            prop_assert_eq!(renderer.live(), 0);
            prop_assert_eq!(renderer.bad_releases(), 0);
            prop_assert_eq!(renderer.released(), renderer.rendered());
        }
    }
}
