use wavetiles::cli::Args;
use wavetiles::config::{self, PathConfig, Settings};
use wavetiles::core::cache_events::{
    RenderDiscardedEvent, RenderFailedEvent, RenderStartedEvent, SourceResetEvent, TileAdoptedEvent,
    TileEvictedEvent, TilesChangedEvent,
};
use wavetiles::core::event_bus::{downcast_event, EventBus};
use wavetiles::core::{Dispatch, PositionThrottle, SourceId, WindowCache};
use wavetiles::render::{BlobStore, BlobUrl, PngWaveformRenderer, Theme};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, trace, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for waiting on the last render before teardown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Drain queued cache events into the log.
fn log_events(bus: &EventBus) {
    for event in bus.poll() {
        if let Some(e) = downcast_event::<RenderStartedEvent>(&event) {
            debug!("Render started: {} {}s +{:.1}s (gen {})", e.source, e.from, e.duration, e.generation);
        } else if let Some(e) = downcast_event::<TileAdoptedEvent>(&event) {
            info!("Tile {}s ready in {:.1} ms", e.from, e.elapsed.as_secs_f64() * 1000.0);
        } else if let Some(e) = downcast_event::<TileEvictedEvent>(&event) {
            info!("Tile {}s evicted", e.from);
        } else if let Some(e) = downcast_event::<RenderDiscardedEvent>(&event) {
            debug!("Stale render {}s discarded", e.from);
        } else if let Some(e) = downcast_event::<RenderFailedEvent>(&event) {
            warn!("Render {}s failed: {}", e.from, e.message);
        } else if let Some(e) = downcast_event::<SourceResetEvent>(&event) {
            info!("Source reset ({:?}): {} tiles cleared", e.source.as_ref().map(|s| s.to_string()), e.cleared);
        } else if let Some(e) = downcast_event::<TilesChangedEvent<BlobUrl>>(&event) {
            trace!("Live tiles: {}", e.tiles.len());
        }
    }
}

fn dump_tiles(cache: &WindowCache<PngWaveformRenderer>, store: &BlobStore, out_dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    let mut written = 0;
    for tile in cache.tiles().iter() {
        let Some(bytes) = store.get(&tile.handle) else {
            warn!("Tile {}s has no blob ({})", tile.from, tile.handle);
            continue;
        };
        let path = out_dir.join(format!("tile_{}.png", tile.from));
        std::fs::write(&path, bytes.as_slice())
            .with_context(|| format!("Failed to write tile: {}", path.display()))?;
        written += 1;
    }
    Ok(written)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &path_config)?;

    info!("Wavetiles starting...");
    debug!("Command-line args: {:?}", args);

    // Settings file, then CLI overrides
    let settings_path = config::config_file(config::SETTINGS_FILE, &path_config);
    info!("Config path: {}", settings_path.display());
    let mut settings = Settings::load_or_default(&settings_path)?;
    if let Some(window_secs) = args.window_secs {
        settings.window_secs = window_secs;
    }
    if let Some(max_tiles) = args.max_tiles {
        settings.max_tiles = max_tiles;
    }
    if args.light {
        settings.theme = Theme::Light;
    }
    let window_config = settings.window_config().context("Invalid configuration")?;

    let store = Arc::new(BlobStore::new());
    let renderer = Arc::new(PngWaveformRenderer::new(Arc::clone(&store)));

    let audio = renderer
        .load(&args.file_path)
        .with_context(|| format!("Failed to open {}", args.file_path.display()))?;
    if args.stream >= audio.channels.len() {
        bail!(
            "Stream {} not found in {} ({} channels)",
            args.stream,
            args.file_path.display(),
            audio.channels.len()
        );
    }
    let total = audio.duration();
    info!(
        "Input: {} ({:.3}s, {} Hz, {} ch)",
        args.file_path.display(),
        total,
        audio.sample_rate,
        audio.channels.len()
    );

    let mut cache = WindowCache::with_workers(Arc::clone(&renderer), window_config, settings.worker_threads)
        .context("Failed to start render workers")?
        .with_events(EventBus::new());
    cache.set_total_duration(total);
    cache.on_source_changed(Some(SourceId::new(&args.file_path, args.stream)));

    // Simulated playback
    let mut throttle = PositionThrottle::new(settings.throttle_ms);
    let tick = Duration::from_millis(args.tick_ms.max(1));
    let end = args.end.unwrap_or(total).min(total);
    let mut position = args.start.max(0.0);

    loop {
        if let Some(pos) = throttle.update(position) {
            if let Dispatch::Skipped(reason) = cache.on_position_changed(pos) {
                trace!("Position {:.3}: {:?}", pos, reason);
            }
        }
        cache.pump();
        log_events(cache.events());

        if position >= end {
            break;
        }
        std::thread::sleep(tick);
        position = (position + args.speed * tick.as_secs_f64()).min(end);
    }

    // Last throttled position still counts
    if let Some(pos) = throttle.pending() {
        throttle.cancel();
        cache.on_position_changed(pos);
    }
    if !cache.wait_idle(DRAIN_TIMEOUT) {
        warn!("Render still running after {:?}", DRAIN_TIMEOUT);
    } else if cache.refresh().is_started() {
        cache.wait_idle(DRAIN_TIMEOUT);
    }
    log_events(cache.events());

    let stats = cache.stats().snapshot();
    println!(
        "tiles: {} live / {} max | dispatched {} adopted {} discarded {} failed {} evicted {} released {} | hit rate {:.1}%",
        cache.len(),
        cache.capacity(),
        stats.dispatched,
        stats.adopted,
        stats.discarded,
        stats.failed,
        stats.evicted,
        stats.released,
        stats.hit_rate() * 100.0
    );

    if let Some(out_dir) = &args.out_dir {
        let written = dump_tiles(&cache, &store, out_dir)?;
        println!("wrote {} tiles to {}", written, out_dir.display());
    }

    cache.close();
    log_events(cache.events());
    info!("Teardown complete, {} blobs live", store.live_count());
    Ok(())
}
