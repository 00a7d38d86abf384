//! Configuration management (`config.toml`)
//!
//! Capture settings are stored in TOML format in the platform-specific
//! config directory. Missing fields fall back to their defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::dumper::{DEFAULT_FRAME_PREFIX, DEFAULT_JPEG_QUALITY, DumpOptions, FrameFormat};
use crate::error::CaptureError;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Video capture settings
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Video capture configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Capture rate in frames per second (default: 25)
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Total recorded duration in seconds (default: 10)
    #[serde(default = "default_seconds")]
    pub seconds: u32,
    /// Directory for dumped frames. When unset, each session gets a
    /// timestamped directory under the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// File name prefix for dumped frames (default: "video_frame")
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Image format for dumped frames (default: png)
    #[serde(default)]
    pub format: FrameFormat,
    /// JPEG quality 1-100, used when `format = "jpeg"` (default: 90)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_fps() -> u32 {
    25
}
fn default_seconds() -> u32 {
    10
}
fn default_file_prefix() -> String {
    DEFAULT_FRAME_PREFIX.to_string()
}
fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            seconds: default_seconds(),
            output_dir: None,
            file_prefix: default_file_prefix(),
            format: FrameFormat::default(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl CaptureConfig {
    /// Reject settings that cannot describe a recording.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.fps == 0 {
            return Err(CaptureError::InvalidConfig("fps must be at least 1".into()));
        }
        if self.seconds == 0 {
            return Err(CaptureError::InvalidConfig(
                "seconds must be at least 1".into(),
            ));
        }
        if self.file_prefix.is_empty() || self.file_prefix.contains(['/', '\\']) {
            return Err(CaptureError::InvalidConfig(format!(
                "invalid file prefix '{}'",
                self.file_prefix
            )));
        }
        Ok(())
    }

    /// Directory a session started at `now` dumps into.
    ///
    /// Uses `output_dir` as-is when set, otherwise
    /// `<data dir>/captures/session_<timestamp>`. Falls back to the working
    /// directory if no data directory is available.
    pub fn session_dir(&self, now: DateTime<Local>) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        let base = data_dir()
            .map(|dir| dir.join("captures"))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join(format!("session_{}", now.format("%Y-%m-%d_%H-%M-%S")))
    }

    /// Dump options for a session started at `now`.
    pub fn dump_options(&self, now: DateTime<Local>) -> DumpOptions {
        DumpOptions {
            out_dir: self.session_dir(now),
            prefix: self.file_prefix.clone(),
            format: self.format,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\Framecap\config`
/// On macOS: `~/Library/Application Support/io.framecap.Framecap`
/// On Linux: `~/.config/framecap`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.framecap", "", "Framecap")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the platform-specific data directory where captures are stored.
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.framecap", "", "Framecap")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Path of `config.toml` in the configuration directory.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Loads the configuration from disk.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> Config {
    config_path()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| toml::from_str(&content).ok())
        .unwrap_or_default()
}

/// Loads the configuration from an explicit file.
///
/// Unlike [`load`], a missing or malformed file is an error.
pub fn load_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Saves the configuration to `config.toml` in the configuration directory.
///
/// Returns the path written.
pub fn save(config: &Config) -> Result<PathBuf> {
    let path = config_path().context("Failed to determine config directory")?;
    save_to(config, &path)?;
    Ok(path)
}

/// Saves the configuration to an explicit file, creating parent directories.
pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
