//! Settings and configuration paths.

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::core::traits::RenderParams;
use crate::core::window_cache::WindowConfig;
use crate::error::ConfigError;
use crate::render::Theme;

/// Application folder name under platform config/data dirs
const APP_DIR: &str = "wavetiles";

/// Env var overriding the config directory
pub const CONFIG_DIR_ENV: &str = "WAVETILES_CONFIG_DIR";

pub const SETTINGS_FILE: &str = "wavetiles.json";
pub const LOG_FILE: &str = "wavetiles.log";

// ========== Paths ==========

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Create PathConfig from CLI arguments and environment variables
    ///
    /// Priority: CLI args → ENV var (WAVETILES_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. WAVETILES_CONFIG_DIR environment variable
/// 3. Local folder IF any config files exist (wavetiles.json, wavetiles.log)
/// 4. Platform-specific config directory from dirs-next (default)
///
/// Platform paths:
/// - Linux: ~/.config/wavetiles/{name}
/// - macOS: ~/Library/Application Support/wavetiles/{name}
/// - Windows: %APPDATA%\wavetiles\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Get path to a data file (logs, tile dumps)
///
/// Same priority as [`config_file`], falling back to the platform data dir.
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_data_dir(config).join(name)
}

/// Ensure that configuration and data directories exist
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let data_dir = get_data_dir(config);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }

    if data_dir != config_dir && !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }

    Ok(())
}

fn has_local_config_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

/// Custom dir, else local folder with config files, else platform dir, else "."
fn resolve_dir(config: &PathConfig, platform: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current_dir) = std::env::current_dir() {
        if has_local_config_files(&current_dir) {
            return current_dir;
        }
    }

    if let Some(dir) = platform {
        return dir.join(APP_DIR);
    }

    PathBuf::from(".")
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir())
}

fn get_data_dir(config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir())
}

// ========== Settings ==========

/// Persistent settings (`wavetiles.json`). Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    // Cache
    pub max_tiles: usize,
    pub window_secs: u32,
    pub throttle_ms: u64,

    // Workers
    pub worker_threads: usize,

    // Tiles
    pub tile_width: u32,
    pub tile_height: u32,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_tiles: 100,
            window_secs: 60,
            throttle_ms: 1000,
            worker_threads: 1,
            tile_width: 1024,
            tile_height: 64,
            theme: Theme::Dark,
        }
    }
}

impl Settings {
    /// Load from JSON, or defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn render_params(&self) -> RenderParams {
        RenderParams {
            color: self.theme.waveform_color(),
            width: self.tile_width,
            height: self.tile_height,
        }
    }

    /// Validate into engine configuration.
    pub fn window_config(&self) -> Result<WindowConfig, ConfigError> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(ConfigError::ZeroTileSize {
                width: self.tile_width,
                height: self.tile_height,
            });
        }
        WindowConfig::new(self.window_secs, self.max_tiles, self.render_params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };

        assert_eq!(config_file("test.json", &config), PathBuf::from("/custom/test.json"));
        assert_eq!(data_file("wavetiles.log", &config), PathBuf::from("/custom/wavetiles.log"));
    }

    #[test]
    fn test_cli_dir_wins_over_env() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from-cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from-cli")));
    }

    #[test]
    fn test_ensure_dirs_creates_custom_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("cfg");
        let config = PathConfig {
            config_dir: Some(dir.clone()),
        };

        ensure_dirs(&config).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_settings_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SETTINGS_FILE);

        let settings = Settings {
            max_tiles: 7,
            window_secs: 30,
            theme: Theme::Light,
            ..Default::default()
        };
        settings.save(&path).unwrap();

        assert_eq!(Settings::load_or_default(&path).unwrap(), settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "window_secs": 10 }"#).unwrap();

        let settings = Settings::load_or_default(&path).unwrap();
        assert_eq!(settings.window_secs, 10);
        assert_eq!(settings.max_tiles, 100);
        assert_eq!(settings.throttle_ms, 1000);
        assert_eq!(settings.theme, Theme::Dark);
    }

    #[test]
    fn test_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load_or_default(&tmp.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_or_default(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings"));
    }

    #[test]
    fn test_window_config_validation() {
        let config = Settings::default().window_config().unwrap();
        assert_eq!(config.window_size.get(), 60);
        assert_eq!(config.max_tiles.get(), 100);
        assert_eq!(config.params.color, Theme::DARK_WAVEFORM);

        let zero_window = Settings {
            window_secs: 0,
            ..Default::default()
        };
        assert_eq!(zero_window.window_config(), Err(ConfigError::ZeroWindow));

        let zero_tiles = Settings {
            max_tiles: 0,
            ..Default::default()
        };
        assert_eq!(zero_tiles.window_config(), Err(ConfigError::ZeroCapacity));

        let zero_size = Settings {
            tile_height: 0,
            ..Default::default()
        };
        assert_eq!(
            zero_size.window_config(),
            Err(ConfigError::ZeroTileSize { width: 1024, height: 0 })
        );
    }
}
