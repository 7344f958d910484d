//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SceneMuxError, SceneMuxResult};

/// Environment variable that forces temp-file retention when set to a truthy value.
pub const KEEP_TEMP_ENV: &str = "SCENEMUX_KEEP_TEMP";

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scene names to render, in launch and merge order.
    /// Empty means the built-in catalog.
    pub scenes: Vec<String>,

    /// ffmpeg binary used for merging.
    pub ffmpeg_binary: String,

    /// Redirect each scene's output to `<media_dir>/logs/<Scene>.log`.
    pub scene_logs: bool,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "scenemux=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

/// Whether temporary working files survive the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    #[default]
    Delete,
    Keep,
}

impl Retention {
    /// Resolve retention from the `--keep-temp` flag and the environment override.
    pub fn resolve(keep_flag: bool) -> Self {
        let env_value = std::env::var(KEEP_TEMP_ENV).ok();
        Self::from_sources(keep_flag, env_value.as_deref())
    }

    /// Either source asking to keep wins; anything unrecognised means delete.
    pub fn from_sources(keep_flag: bool, env_value: Option<&str>) -> Self {
        if keep_flag || env_value.map(is_truthy).unwrap_or(false) {
            Self::Keep
        } else {
            Self::Delete
        }
    }

    pub fn keeps_files(self) -> bool {
        self == Self::Keep
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scenes: Vec::new(),
            ffmpeg_binary: "ffmpeg".to_string(),
            scene_logs: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if !config_path.exists() {
            return Self::default();
        }
        Self::try_load_from(config_path).unwrap_or_else(|e| {
            tracing::warn!(path = %config_path.display(), error = %e, "Ignoring config file");
            Self::default()
        })
    }

    /// Load config from `config_path`, reporting unreadable or invalid files.
    pub fn try_load_from(config_path: &Path) -> SceneMuxResult<Self> {
        let content = std::fs::read_to_string(config_path).map_err(|e| {
            SceneMuxError::config(format!("cannot read {}: {e}", config_path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            SceneMuxError::config(format!("invalid config {}: {e}", config_path.display()))
        })
    }

    /// Save config to the given location.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("scenemux").join("config.json")
}
