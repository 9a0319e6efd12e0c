use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("Invalid timezone offset: {0} minutes")]
    BadTimezone(i32),
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token. Overridable via `STREAMCAP_BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: String,
    /// The single chat id allowed to schedule recordings.
    #[serde(default)]
    pub allowed_chat_id: i64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            allowed_chat_id: 0,
        }
    }
}

/// Encoder and delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Path to the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    /// Directory recordings are written to.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Largest artifact uploaded in one piece.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Segment length used when splitting oversized artifacts.
    #[serde(default = "default_segment_seconds")]
    pub segment_seconds: u32,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("/usr/bin/ffmpeg")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_segment_seconds() -> u32 {
    300
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            work_dir: default_work_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            segment_seconds: default_segment_seconds(),
        }
    }
}

/// Channel directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// JSON file mapping lowercase channel names to stream URLs.
    #[serde(default = "default_directory_path")]
    pub path: PathBuf,
    /// Snapshot reload interval in seconds.
    #[serde(default = "default_reload_secs")]
    pub reload_secs: u64,
}

fn default_directory_path() -> PathBuf {
    PathBuf::from("channels.json")
}

fn default_reload_secs() -> u64 {
    60
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            path: default_directory_path(),
            reload_secs: default_reload_secs(),
        }
    }
}

/// Top-level streamcap configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamcapConfig {
    /// Telegram settings.
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Recorder settings.
    #[serde(default)]
    pub recorder: RecorderConfig,
    /// Channel directory settings.
    #[serde(default)]
    pub directory: DirectoryConfig,
    /// Fixed reference timezone as minutes east of UTC.
    /// Default is IST (+05:30).
    #[serde(default = "default_tz_offset_minutes")]
    pub timezone_offset_minutes: i32,
}

fn default_tz_offset_minutes() -> i32 {
    330
}

impl Default for StreamcapConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            recorder: RecorderConfig::default(),
            directory: DirectoryConfig::default(),
            timezone_offset_minutes: default_tz_offset_minutes(),
        }
    }
}

impl StreamcapConfig {
    /// The configured reference timezone as a chrono offset.
    pub fn timezone(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.timezone_offset_minutes * 60)
            .ok_or(ConfigError::BadTimezone(self.timezone_offset_minutes))
    }
}

/// Resolve the streamcap config directory (~/.streamcap/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".streamcap"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.streamcap/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<StreamcapConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
///
/// `STREAMCAP_BOT_TOKEN` in the environment overrides the file's token.
pub fn load_config_from(path: &Path) -> Result<StreamcapConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        json5::from_str(&content)?
    } else {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        StreamcapConfig::default()
    };

    if let Ok(token) = std::env::var("STREAMCAP_BOT_TOKEN") {
        if !token.is_empty() {
            config.telegram.bot_token = token;
        }
    }

    Ok(config)
}

/// Ensure the config directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Save configuration to the default path.
pub fn save_config(config: &StreamcapConfig) -> Result<(), ConfigError> {
    let dir = ensure_config_dir()?;
    let path = dir.join("config.json5");
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
