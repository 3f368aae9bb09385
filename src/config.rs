//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::playback::gesture::DragThresholds;
use crate::store::StoreConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Story player configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Display time for stories without their own duration
    #[serde(default = "default_story_duration")]
    pub default_duration_secs: u32,

    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Horizontal drag distance that navigates
    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold_px: f64,

    /// Downward drag distance that closes the player
    #[serde(default = "default_dismiss_threshold")]
    pub dismiss_threshold_px: f64,

    /// Share of the card width covered by each tap zone
    #[serde(default = "default_tap_zone_fraction")]
    pub tap_zone_fraction: f64,
}

fn default_story_duration() -> u32 {
    5
}

fn default_tick_interval() -> u64 {
    100
}

fn default_swipe_threshold() -> f64 {
    50.0
}

fn default_dismiss_threshold() -> f64 {
    100.0
}

fn default_tap_zone_fraction() -> f64 {
    1.0 / 3.0
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: default_story_duration(),
            tick_interval_ms: default_tick_interval(),
            swipe_threshold_px: default_swipe_threshold(),
            dismiss_threshold_px: default_dismiss_threshold(),
            tap_zone_fraction: default_tap_zone_fraction(),
        }
    }
}

impl PlaybackConfig {
    pub fn default_duration(&self) -> Duration {
        Duration::from_secs(self.default_duration_secs.max(1) as u64)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn drag_thresholds(&self) -> DragThresholds {
        DragThresholds {
            swipe_px: self.swipe_threshold_px,
            dismiss_px: self.dismiss_threshold_px,
        }
    }
}

/// Story store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_story_lifetime")]
    pub story_lifetime_hours: i64,
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("storyreel").join("stories.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./storyreel_data/stories.db".to_string())
}

fn default_story_lifetime() -> i64 {
    24
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            story_lifetime_hours: default_story_lifetime(),
        }
    }
}

impl StoreSection {
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.database_path).story_lifetime_hours(self.story_lifetime_hours)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("storyreel").join("config.toml")),
            Some(PathBuf::from("./storyreel.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STORYREEL_DB_PATH") {
            self.store.database_path = path;
        }
        if let Ok(hours) = std::env::var("STORYREEL_STORY_LIFETIME_HOURS") {
            if let Ok(h) = hours.parse() {
                self.store.story_lifetime_hours = h;
            }
        }

        if let Ok(secs) = std::env::var("STORYREEL_DEFAULT_DURATION_SECS") {
            if let Ok(s) = secs.parse() {
                self.playback.default_duration_secs = s;
            }
        }

        if let Ok(level) = std::env::var("STORYREEL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("STORYREEL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Storyreel Configuration
#
# Environment variables override these settings:
# - STORYREEL_DB_PATH
# - STORYREEL_STORY_LIFETIME_HOURS
# - STORYREEL_DEFAULT_DURATION_SECS
# - STORYREEL_LOG_LEVEL
# - STORYREEL_LOG_FORMAT

[playback]
# Display time for stories without their own duration (seconds)
default_duration_secs = 5

# Progress timer period (ms)
tick_interval_ms = 100

# Horizontal drag distance that moves to the previous/next story (px)
swipe_threshold_px = 50.0

# Downward drag distance that closes the player (px)
dismiss_threshold_px = 100.0

# Share of the card width covered by each tap zone
tap_zone_fraction = 0.3333

[store]
# SQLite database file
database_path = "~/.local/share/storyreel/stories.db"

# How long a published story stays visible (hours)
story_lifetime_hours = 24

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.playback.default_duration(), Duration::from_secs(5));
        assert_eq!(config.playback.tick_interval(), Duration::from_millis(100));
        assert!(config.playback.dismiss_threshold_px > config.playback.swipe_threshold_px);
        assert_eq!(config.store.story_lifetime_hours, 24);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.playback.default_duration_secs, 5);
        assert_eq!(config.playback.tick_interval_ms, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse("[playback]\ndefault_duration_secs = 7\n").unwrap();
        assert_eq!(config.playback.default_duration_secs, 7);
        assert_eq!(config.playback.tick_interval_ms, 100);
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[playback\n").unwrap();

        match Config::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(matches!(
            Config::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
