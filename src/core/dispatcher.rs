//! Render dispatcher - single in-flight slot, dedup and stale-result handling.
//!
//! State machine for one render attempt:
//! `idle -> dispatched -> {adopted | discarded | failed} -> idle`
//!
//! There is no queue. While a render is in flight every other request is
//! skipped; the caller simply retries on its next position update. A source
//! change does not abort the running render - it only bumps the generation,
//! and the result is discarded when it arrives.
//!
//! Completions travel back over a channel and are applied by the owner
//! (`WindowCache::pump`), so all bookkeeping stays on one thread.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, trace};

use super::generation::{Generation, GenerationToken};
use super::traits::{EpochCheck, RenderRequest, RenderedTile, SourceId, TileRenderer, WorkerPool};
use super::window::Window;
use crate::error::RenderError;

/// Why a position update did not start a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// No source selected
    NoSource,
    /// Rendering switched off
    Disabled,
    /// Position could not be mapped to a window
    NoWindow,
    /// Window has zero length (cursor at or past the end)
    EmptyWindow,
    /// Tile for this window already cached
    Cached,
    /// Another render occupies the slot
    Busy,
}

/// Result of a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    Started(Window),
    Skipped(Skip),
}

impl Dispatch {
    pub fn is_started(&self) -> bool {
        matches!(self, Dispatch::Started(_))
    }
}

/// Occupant of the in-flight slot.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub from: i64,
    pub duration: f64,
    pub token: GenerationToken,
    pub started: Instant,
}

/// Rendered output not yet adopted by the cache.
///
/// Releases its handle on drop unless taken with `adopt`, so a result that is
/// discarded - stale, or orphaned because the owner is gone - cannot leak.
pub(crate) struct PendingTile<R: TileRenderer> {
    renderer: Arc<R>,
    rendered: Option<RenderedTile<R::Handle>>,
}

impl<R: TileRenderer> PendingTile<R> {
    fn new(renderer: Arc<R>, rendered: RenderedTile<R::Handle>) -> Self {
        Self {
            renderer,
            rendered: Some(rendered),
        }
    }

    /// Transfer ownership of the handle to the caller.
    pub(crate) fn adopt(mut self) -> Option<RenderedTile<R::Handle>> {
        self.rendered.take()
    }
}

impl<R: TileRenderer> Drop for PendingTile<R> {
    fn drop(&mut self) {
        if let Some(rendered) = self.rendered.take() {
            trace!("Releasing unadopted render {:?}", rendered.handle);
            self.renderer.release(&rendered.handle);
        }
    }
}

enum Outcome<R: TileRenderer> {
    Rendered(PendingTile<R>),
    Failed(RenderError),
    /// Generation moved on before the job started
    Skipped,
}

pub(crate) struct Completion<R: TileRenderer> {
    stamp: u64,
    outcome: Outcome<R>,
}

/// What the owner must do with a finished render.
pub(crate) enum Resolution<R: TileRenderer> {
    Adopt {
        from: i64,
        duration: f64,
        pending: PendingTile<R>,
        elapsed: Duration,
    },
    /// Stale result dropped; `released` is true if a handle was freed.
    Discarded { from: i64, released: bool },
    Failed { from: i64, error: RenderError },
}

pub struct Dispatcher<R: TileRenderer> {
    renderer: Arc<R>,
    pool: Arc<dyn WorkerPool>,
    generation: Generation,
    slot: Option<InFlight>,
    tx: Sender<Completion<R>>,
    rx: Receiver<Completion<R>>,
}

impl<R: TileRenderer> Dispatcher<R> {
    pub fn new(renderer: Arc<R>, pool: Arc<dyn WorkerPool>, generation: Generation) -> Self {
        let (tx, rx) = unbounded();
        Self {
            renderer,
            pool,
            generation,
            slot: None,
            tx,
            rx,
        }
    }

    /// Decide whether a render should run for `window`.
    ///
    /// Returns the source to render on success, otherwise the first reason to skip.
    pub fn check<'a>(
        &self,
        source: Option<&'a SourceId>,
        enabled: bool,
        window: Option<Window>,
        is_cached: impl Fn(i64) -> bool,
    ) -> Result<(&'a SourceId, Window), Skip> {
        let source = source.ok_or(Skip::NoSource)?;
        if !enabled {
            return Err(Skip::Disabled);
        }
        let window = window.ok_or(Skip::NoWindow)?;
        if window.is_empty() {
            return Err(Skip::EmptyWindow);
        }
        if is_cached(window.from) {
            return Err(Skip::Cached);
        }
        if self.slot.is_some() {
            return Err(Skip::Busy);
        }
        Ok((source, window))
    }

    /// Occupy the slot and submit `req` to the pool.
    ///
    /// Returns `Skip::Busy` if a render is already in flight.
    pub fn dispatch(&mut self, req: RenderRequest) -> Result<(), Skip> {
        if self.slot.is_some() {
            return Err(Skip::Busy);
        }

        let token = self.generation.token();
        self.slot = Some(InFlight {
            from: req.from,
            duration: req.duration,
            token: token.clone(),
            started: Instant::now(),
        });
        debug!(
            "Dispatching render {} [{}s +{:.3}s] gen {}",
            req.source,
            req.from,
            req.duration,
            token.stamp()
        );

        let renderer = Arc::clone(&self.renderer);
        let tx = self.tx.clone();
        let stamp = token.stamp();
        self.pool.execute_with_epoch(
            stamp,
            Box::new(move |check| {
                let outcome = match check {
                    EpochCheck::Stale => Outcome::Skipped,
                    EpochCheck::Current => {
                        match catch_unwind(AssertUnwindSafe(|| renderer.render(&req))) {
                            Ok(Ok(rendered)) => {
                                Outcome::Rendered(PendingTile::new(Arc::clone(&renderer), rendered))
                            }
                            Ok(Err(e)) => Outcome::Failed(e),
                            Err(panic) => Outcome::Failed(RenderError::Backend(panic_message(&*panic))),
                        }
                    }
                };
                // If the owner is gone the send fails and the completion is
                // dropped here, which releases any rendered handle.
                if tx.send(Completion { stamp, outcome }).is_err() {
                    trace!("Render finished after owner shut down");
                }
            }),
        );
        Ok(())
    }

    /// Take one finished render without blocking.
    pub(crate) fn try_complete(&mut self) -> Option<Resolution<R>> {
        let completion = self.rx.try_recv().ok()?;
        Some(self.resolve(completion))
    }

    /// Wait up to `timeout` for the in-flight render to finish.
    pub(crate) fn wait_complete(&mut self, timeout: Duration) -> Option<Resolution<R>> {
        if self.slot.is_none() {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => Some(self.resolve(completion)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn resolve(&mut self, completion: Completion<R>) -> Resolution<R> {
        let (from, duration, elapsed) = match self.slot.take() {
            Some(slot) => (slot.from, slot.duration, slot.started.elapsed()),
            None => (0, 0.0, Duration::ZERO),
        };
        let current = completion.stamp == self.generation.current();

        match completion.outcome {
            Outcome::Rendered(pending) if current => Resolution::Adopt {
                from,
                duration,
                pending,
                elapsed,
            },
            Outcome::Rendered(pending) => {
                debug!("Discarding stale render {}s (gen {})", from, completion.stamp);
                drop(pending);
                Resolution::Discarded { from, released: true }
            }
            Outcome::Skipped => {
                debug!("Stale render {}s skipped before start", from);
                Resolution::Discarded { from, released: false }
            }
            Outcome::Failed(error) => Resolution::Failed { from, error },
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_some()
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.slot.as_ref()
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    pub fn renderer(&self) -> &Arc<R> {
        &self.renderer
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "render panicked".to_string()
    }
}
