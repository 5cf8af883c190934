//! Deterministic pools and a bookkeeping renderer for engine tests.

use std::collections::HashSet;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::traits::{EpochCheck, EpochJob, RenderRequest, RenderedTile, TileRenderer, WorkerPool};
use crate::error::RenderError;

fn check(epoch: &AtomicU64, stamp: u64) -> EpochCheck {
    if epoch.load(Ordering::Acquire) == stamp {
        EpochCheck::Current
    } else {
        EpochCheck::Stale
    }
}

/// Runs every job immediately on the submitting thread.
pub struct InlinePool {
    epoch: Arc<AtomicU64>,
}

impl InlinePool {
    pub fn new(epoch: Arc<AtomicU64>) -> Self {
        Self { epoch }
    }
}

impl WorkerPool for InlinePool {
    fn execute_with_epoch(&self, epoch: u64, f: EpochJob) {
        f(check(&self.epoch, epoch));
    }
}

/// Holds jobs until the test runs them, to keep a render "in flight".
pub struct ManualPool {
    epoch: Arc<AtomicU64>,
    jobs: Mutex<Vec<(u64, EpochJob)>>,
}

impl ManualPool {
    pub fn new(epoch: Arc<AtomicU64>) -> Self {
        Self {
            epoch,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn run_all(&self) {
        self.run_all_with(|| {});
    }

    /// Run queued jobs; `started` fires after the epoch check, before the work.
    pub fn run_all_with(&self, mut started: impl FnMut()) {
        let jobs = mem::take(&mut *self.jobs.lock().unwrap());
        for (stamp, job) in jobs {
            let result = check(&self.epoch, stamp);
            started();
            job(result);
        }
    }
}

impl WorkerPool for ManualPool {
    fn execute_with_epoch(&self, epoch: u64, f: EpochJob) {
        self.jobs.lock().unwrap().push((epoch, f));
    }
}

/// Renderer that hands out numbered handles and records every release.
#[derive(Default)]
pub struct FakeRenderer {
    next: AtomicU64,
    live: Mutex<HashSet<u64>>,
    rendered: AtomicU64,
    released: AtomicU64,
    bad_releases: AtomicU64,
    fail_next: AtomicBool,
    panic_next: AtomicBool,
    requests: Mutex<Vec<RenderRequest>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Releases of unknown or already released handles
    pub fn bad_releases(&self) -> u64 {
        self.bad_releases.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    pub fn is_live(&self, handle: &u64) -> bool {
        self.live.lock().unwrap().contains(handle)
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TileRenderer for FakeRenderer {
    type Handle = u64;

    fn render(&self, req: &RenderRequest) -> Result<RenderedTile<u64>, RenderError> {
        self.requests.lock().unwrap().push(req.clone());
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("boom");
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(RenderError::Backend("fake failure".to_string()));
        }
        let handle = self.next.fetch_add(1, Ordering::SeqCst);
        self.live.lock().unwrap().insert(handle);
        self.rendered.fetch_add(1, Ordering::SeqCst);
        Ok(RenderedTile {
            handle,
            width: req.params.width,
            height: req.params.height,
        })
    }

    fn release(&self, handle: &u64) {
        if self.live.lock().unwrap().remove(handle) {
            self.released.fetch_add(1, Ordering::SeqCst);
        } else {
            self.bad_releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}
