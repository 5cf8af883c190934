//! Reference render backend: WAV file -> PNG waveform tile.
//!
//! Decodes audio with `hound`, keeps recently decoded files in a small LRU,
//! draws min/max peak columns for the requested window and encodes the result
//! as PNG in memory. Encoded tiles are registered in a [`BlobStore`] and handed
//! to the engine as `blob:<uuid>` URLs; releasing a tile revokes its URL.

use std::collections::HashMap;
use std::io::Cursor;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{ImageFormat, Rgba, RgbaImage};
use log::{debug, trace, warn};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::traits::{RenderRequest, RenderedTile, TileRenderer};
use crate::error::RenderError;

/// Decoded files kept around between renders
const DECODE_CACHE_SIZE: usize = 4;

// ========== Theme ==========

/// UI theme; selects the default waveform color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub const DARK_WAVEFORM: [u8; 4] = [255, 255, 255, 150];
    pub const LIGHT_WAVEFORM: [u8; 4] = [0, 0, 0, 150];

    pub fn waveform_color(self) -> [u8; 4] {
        match self {
            Theme::Dark => Self::DARK_WAVEFORM,
            Theme::Light => Self::LIGHT_WAVEFORM,
        }
    }
}

// ========== Blob store ==========

/// Object-URL style handle to an encoded tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobUrl(String);

impl BlobUrl {
    fn generate() -> Self {
        Self(format!("blob:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// In-memory registry of encoded images addressed by blob URL.
///
/// Thread-safe: renders register blobs on worker threads while the owner
/// revokes them.
#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: Mutex<HashMap<BlobUrl, Arc<Vec<u8>>>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes under a fresh URL.
    pub fn create(&self, bytes: Vec<u8>) -> BlobUrl {
        let url = BlobUrl::generate();
        trace!("BlobStore: create {} ({} bytes)", url, bytes.len());
        self.lock().insert(url.clone(), Arc::new(bytes));
        url
    }

    pub fn get(&self, url: &BlobUrl) -> Option<Arc<Vec<u8>>> {
        self.lock().get(url).cloned()
    }

    /// Forget a URL. Returns false if it was not live.
    pub fn revoke(&self, url: &BlobUrl) -> bool {
        self.lock().remove(url).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<BlobUrl, Arc<Vec<u8>>>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ========== Decoding ==========

/// Whole file decoded to normalized f32, one Vec per channel.
#[derive(Debug)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

fn hound_error(path: &Path, err: hound::Error) -> RenderError {
    match err {
        hound::Error::IoError(source) => RenderError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => RenderError::Decode {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}

/// Decode a WAV file into per-channel f32 samples in [-1, 1].
pub fn decode_wav(path: &Path) -> Result<DecodedAudio, RenderError> {
    let mut reader = hound::WavReader::open(path).map_err(|e| hound_error(path, e))?;
    let spec = reader.spec();
    let channel_count = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| hound_error(path, e))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| hound_error(path, e))?
        }
    };

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }

    debug!(
        "Decoded {}: {} Hz, {} ch, {} frames",
        path.display(),
        spec.sample_rate,
        channel_count,
        channels[0].len()
    );

    Ok(DecodedAudio {
        sample_rate: spec.sample_rate,
        channels,
    })
}

// ========== Drawing ==========

/// Min/max per column over `samples`, `width` columns.
fn peak_columns(samples: &[f32], width: u32) -> Vec<(f32, f32)> {
    let width = width as usize;
    let len = samples.len();
    (0..width)
        .map(|x| {
            let start = len * x / width;
            let end = (len * (x + 1) / width).max(start + 1).min(len);
            samples
                .get(start..end)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.iter()
                        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
                })
                .unwrap_or((0.0, 0.0))
        })
        .collect()
}

/// Draw peak columns centered vertically on a transparent canvas.
fn draw_waveform(peaks: &[(f32, f32)], width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    let max_y = (height - 1) as f32;
    let to_y = |v: f32| ((1.0 - v.clamp(-1.0, 1.0)) * 0.5 * max_y).round() as u32;

    for (x, &(lo, hi)) in peaks.iter().enumerate() {
        let top = to_y(hi);
        let bottom = to_y(lo);
        for y in top..=bottom {
            img.put_pixel(x as u32, y, Rgba(color));
        }
    }
    img
}

fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes: Vec<u8> = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(bytes)
}

// ========== Renderer ==========

/// Renders waveform windows of WAV files into PNG blobs.
#[derive(Debug)]
pub struct PngWaveformRenderer {
    store: Arc<BlobStore>,
    decoded: Mutex<LruCache<PathBuf, Arc<DecodedAudio>>>,
}

impl PngWaveformRenderer {
    pub fn new(store: Arc<BlobStore>) -> Self {
        let capacity = NonZeroUsize::new(DECODE_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            decoded: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn store(&self) -> &Arc<BlobStore> {
        &self.store
    }

    /// Decoded file, from the LRU or freshly decoded.
    pub fn load(&self, path: &Path) -> Result<Arc<DecodedAudio>, RenderError> {
        if let Some(audio) = self.decoded.lock().unwrap_or_else(|e| e.into_inner()).get(path) {
            return Ok(Arc::clone(audio));
        }

        // Decode outside the lock
        let audio = Arc::new(decode_wav(path)?);
        self.decoded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(path.to_path_buf(), Arc::clone(&audio));
        Ok(audio)
    }
}

impl TileRenderer for PngWaveformRenderer {
    type Handle = BlobUrl;

    fn render(&self, req: &RenderRequest) -> Result<RenderedTile<BlobUrl>, RenderError> {
        let audio = self.load(&req.source.path)?;
        let stream = req.source.stream_index;
        let samples = audio.channels.get(stream).ok_or(RenderError::StreamNotFound {
            stream,
            available: audio.channels.len(),
        })?;

        let total = audio.duration();
        if req.from < 0 || req.from as f64 >= total || req.duration <= 0.0 {
            return Err(RenderError::WindowOutOfRange {
                from: req.from,
                duration: req.duration,
                total,
            });
        }

        let (width, height) = (req.params.width, req.params.height);
        if width == 0 || height == 0 {
            return Err(RenderError::Encode(format!("empty tile {}x{}", width, height)));
        }

        let rate = audio.sample_rate as f64;
        let start = (req.from as f64 * rate) as usize;
        let end = (((req.from as f64 + req.duration) * rate).ceil() as usize).min(samples.len());
        let peaks = peak_columns(&samples[start..end.max(start)], width);

        let img = draw_waveform(&peaks, width, height, req.params.color);
        let bytes = encode_png(&img)?;
        trace!(
            "Rendered {} {}s +{:.3}s: {}x{}, {} bytes",
            req.source,
            req.from,
            req.duration,
            width,
            height,
            bytes.len()
        );

        Ok(RenderedTile {
            handle: self.store.create(bytes),
            width,
            height,
        })
    }

    fn release(&self, handle: &BlobUrl) {
        if !self.store.revoke(handle) {
            warn!("Release of unknown blob {}", handle);
        }
    }
}
