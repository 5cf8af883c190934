use clap::Parser;
use std::path::PathBuf;

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Audio:  hound (WAV)\n",
    "Tiles:  image (PNG)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Waveform tile cache playback simulator
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// WAV file to play through the tile cache
    #[arg(value_name = "FILE.wav")]
    pub file_path: PathBuf,

    /// Audio stream (channel) index
    #[arg(short = 's', long = "stream", value_name = "N", default_value_t = 0)]
    pub stream: usize,

    /// Seconds per render window (overrides settings)
    #[arg(short = 'w', long = "window", value_name = "SECS")]
    pub window_secs: Option<u32>,

    /// Maximum cached tiles (overrides settings)
    #[arg(short = 'm', long = "max-tiles", value_name = "N")]
    pub max_tiles: Option<usize>,

    /// Playback start position in seconds
    #[arg(long = "start", value_name = "SECS", default_value_t = 0.0)]
    pub start: f64,

    /// Playback end position in seconds (default: end of file)
    #[arg(long = "end", value_name = "SECS")]
    pub end: Option<f64>,

    /// Timeline seconds per wall-clock second (must be > 0)
    #[arg(long = "speed", value_name = "X", default_value_t = 1.0, value_parser = parse_speed)]
    pub speed: f64,

    /// Simulation tick in milliseconds
    #[arg(long = "tick-ms", value_name = "MS", default_value_t = 50)]
    pub tick_ms: u64,

    /// Write live tiles as tile_<from>.png into DIR before exit
    #[arg(short = 'o', long = "out-dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Use light theme waveform color
    #[arg(long = "light")]
    pub light: bool,

    /// Enable debug logging to file (default: wavetiles.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

/// Playback speed: finite and strictly positive, or playback never ends.
fn parse_speed(s: &str) -> Result<f64, String> {
    let speed: f64 = s.parse().map_err(|e| format!("invalid speed '{}': {}", s, e))?;
    if !speed.is_finite() || speed <= 0.0 {
        return Err(format!("speed must be a positive number, got {}", s));
    }
    Ok(speed)
}
