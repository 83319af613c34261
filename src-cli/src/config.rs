//! User settings for chunkrec.
//!
//! Defaults are read from the platform-standard config directory:
//! - Linux: `~/.config/chunkrec/config.json`
//! - macOS: `~/Library/Application Support/chunkrec/config.json`
//! - Windows: `%APPDATA%\chunkrec\config\config.json`
//!
//! Command-line flags always take precedence.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Output-related settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    /// Directory (or file) used when `--output` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    /// Name template used when `--template` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(default)]
    pub overwrite: bool,
}

/// Operator key settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySettings {
    /// Stop key; `null` disables it.
    #[serde(default = "default_stop_key")]
    pub stop: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume: Option<String>,
}

fn default_stop_key() -> Option<String> {
    Some("q".to_string())
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            stop: default_stop_key(),
            pause: None,
            resume: None,
        }
    }
}

/// ffmpeg settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FfmpegSettings {
    /// Explicit ffmpeg binary. Searched on PATH when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// User settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub keys: KeySettings,

    #[serde(default)]
    pub ffmpeg: FfmpegSettings,
}

/// Get the path to the settings file.
pub fn settings_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "chunkrec").map(|dirs| dirs.config_dir().join("config.json"))
}

/// Load settings from the platform config directory.
/// Returns defaults if the file doesn't exist or is invalid.
pub fn load_settings() -> Settings {
    match settings_path() {
        Some(path) => load_settings_from(&path),
        None => {
            warn!("Could not determine config directory, using default settings");
            Settings::default()
        }
    }
}

/// Load settings from `path`, falling back to defaults.
pub fn load_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        debug!("No settings file at {}, using defaults", path.display());
        return Settings::default();
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Failed to read settings file {}: {}. Using defaults.", path.display(), e);
            return Settings::default();
        }
    };

    match serde_json::from_str::<Settings>(&contents) {
        Ok(settings) => {
            info!("Loaded settings from {}", path.display());
            settings
        }
        Err(e) => {
            warn!("Failed to parse settings file {}: {}. Using defaults.", path.display(), e);
            Settings::default()
        }
    }
}
