//! Abstract traits for the engine's collaborators.
//!
//! The engine only talks to the render backend and the thread pool through
//! these seams, so tests can drive it with deterministic pools and fake
//! renderers. Implementations live in `core::workers` and `render`.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::RenderError;

/// Identity of the active source: file + audio stream.
///
/// Any change of either part invalidates the whole cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub path: PathBuf,
    pub stream_index: usize,
}

impl SourceId {
    pub fn new(path: impl Into<PathBuf>, stream_index: usize) -> Self {
        Self {
            path: path.into(),
            stream_index,
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.path.display(), self.stream_index)
    }
}

/// Passthrough parameters for the render backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderParams {
    /// RGBA waveform color
    pub color: [u8; 4],
    /// Tile width in pixels
    pub width: u32,
    /// Tile height in pixels
    pub height: u32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            color: [255, 255, 255, 255],
            width: 1024,
            height: 64,
        }
    }
}

/// One render job: source + window + params.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub source: SourceId,
    /// Window start (seconds)
    pub from: i64,
    /// Clamped window duration (seconds)
    pub duration: f64,
    pub params: RenderParams,
}

/// Backend output before adoption into the cache.
#[derive(Debug)]
pub struct RenderedTile<H> {
    /// Releasable resource (e.g. blob URL of the encoded image)
    pub handle: H,
    pub width: u32,
    pub height: u32,
}

/// Render backend: turns a request into a releasable image handle.
///
/// `render` runs on a worker thread. Every handle returned from `render`
/// is passed to `release` exactly once, either by the release tracker
/// (adopted tiles) or by whoever discards the result (stale renders).
pub trait TileRenderer: Send + Sync + 'static {
    type Handle: Debug + Send + Sync + 'static;

    fn render(&self, req: &RenderRequest) -> Result<RenderedTile<Self::Handle>, RenderError>;

    fn release(&self, handle: &Self::Handle);
}

/// Outcome of the epoch check a pool performs right before running a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochCheck {
    /// Epoch still matches, run the work
    Current,
    /// Epoch changed while queued, skip the work (but still report back)
    Stale,
}

/// Job executed by a pool; receives the epoch check result.
pub type EpochJob = Box<dyn FnOnce(EpochCheck) + Send + 'static>;

/// Abstract worker pool interface.
///
/// Unlike a fire-and-forget skip, stale jobs are still invoked with
/// `EpochCheck::Stale` so the submitter can free its in-flight slot.
pub trait WorkerPool: Send + Sync {
    fn execute_with_epoch(&self, epoch: u64, f: EpochJob);
}

/// Blanket impl: Arc<T> implements traits if T does
impl<T: WorkerPool + ?Sized> WorkerPool for Arc<T> {
    fn execute_with_epoch(&self, epoch: u64, f: EpochJob) {
        (**self).execute_with_epoch(epoch, f)
    }
}
