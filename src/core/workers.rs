//! Background thread pool for tile renders.
//!
//! Workers pull jobs from one shared crossbeam injector queue.
//!
//! Epoch mechanism lets a queued render be skipped once its source went stale.
//! The engine never has more than one render in flight, so a single thread is
//! enough for it; more threads only help when the pool is shared.

use crossbeam::deque::Injector;
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::traits::{EpochCheck, EpochJob, WorkerPool};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool over a shared injector with an epoch counter.
///
/// # Example
/// ```ignore
/// let generation = Generation::new();
/// let workers = Workers::new(1, generation.epoch_ref())?;
/// workers.execute_with_epoch(generation.current(), move |check| render_tile(check));
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    current_epoch: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Create worker pool with `num_threads` threads (at least one) and shared epoch counter.
    pub fn new(num_threads: usize, epoch: Arc<AtomicU64>) -> std::io::Result<Self> {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(num_threads);

        for worker_id in 0..num_threads {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);

            let handle = thread::Builder::new()
                .name(format!("wavetiles-render-{}", worker_id))
                .spawn(move || {
                    trace!("Render worker {} started", worker_id);

                    loop {
                        let steal = injector.steal();
                        let is_retry = steal.is_retry();
                        if let Some(job) = steal.success() {
                            job();
                            continue;
                        }
                        if is_retry {
                            continue;
                        }

                        // Queue drained: stop if asked to
                        if shutdown.load(Ordering::Relaxed) && injector.is_empty() {
                            break;
                        }

                        thread::sleep(Duration::from_millis(1));
                    }

                    trace!("Render worker {} stopped", worker_id);
                })?;

            handles.push(handle);
        }

        trace!("Workers initialized: {} threads", num_threads);

        Ok(Self {
            injector,
            handles,
            current_epoch: epoch,
            shutdown,
        })
    }

    /// Get current epoch
    pub fn current_epoch(&self) -> u64 {
        self.current_epoch.load(Ordering::Acquire)
    }

    /// Execute closure with epoch check.
    ///
    /// The check runs at execution time, not enqueue time: if the epoch moved
    /// on while the job sat in the queue, `f` receives `EpochCheck::Stale`.
    pub fn execute_with_epoch<F>(&self, epoch: u64, f: F)
    where
        F: FnOnce(EpochCheck) + Send + 'static,
    {
        let current_epoch = Arc::clone(&self.current_epoch);
        let wrapped = move || {
            if current_epoch.load(Ordering::Acquire) == epoch {
                f(EpochCheck::Current);
            } else {
                f(EpochCheck::Stale);
            }
        };
        self.injector.push(Box::new(wrapped));
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::SeqCst);

        // Queued jobs still run (they report back or release what they rendered);
        // the timeout only bounds a render that is stuck in the backend.
        let deadline = Instant::now() + Duration::from_millis(2000);

        let handles = std::mem::take(&mut self.handles);
        for handle in handles {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }

        trace!("All {} workers stopped", num_threads);
    }
}

impl WorkerPool for Workers {
    fn execute_with_epoch(&self, epoch: u64, f: EpochJob) {
        Workers::execute_with_epoch(self, epoch, f)
    }
}
