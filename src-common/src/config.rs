//! Recording configuration.
//!
//! [`RecordingOptions`] is the raw, user-facing shape filled in by the CLI
//! layer. [`RecordingOptions::validate`] turns it into an immutable
//! [`RecordingConfiguration`], rejecting bad combinations before any capture
//! session is started.

use crate::keys::{KeyError, KeySet};
use crate::output;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name prefix used when none is given.
pub const DEFAULT_FILE_PREFIX: &str = "recording";

/// Error type for configuration validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{name} must be greater than zero, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("maximum size must be greater than zero")]
    ZeroMaxSize,

    #[error("a resume key requires a pause key")]
    ResumeWithoutPause,

    #[error("invalid key: {0}")]
    Key(#[from] KeyError),

    #[error("invalid name template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("name template {0:?} must contain {{chunk}} or {{uuid}} when splitting")]
    TemplateNotUnique(String),

    #[error("invalid file extension {0:?}")]
    InvalidExtension(String),

    /// Mode-specific options that cannot be combined
    #[error("{0}")]
    Conflict(String),
}

/// Raw recording options before validation.
#[derive(Debug, Clone, Default)]
pub struct RecordingOptions {
    /// Overall recording duration in seconds
    pub duration_secs: Option<f64>,
    /// Chunk rotation interval in seconds
    pub split_secs: Option<f64>,
    /// Stop once the current chunk reaches this many bytes
    pub max_size_bytes: Option<u64>,
    pub stop_key: Option<KeySet>,
    pub pause_key: Option<KeySet>,
    /// Defaults to the pause key (a single toggle key)
    pub resume_key: Option<KeySet>,
    /// File, directory, or `None` for the temp directory
    pub output: Option<PathBuf>,
    /// Calendar-format template with `{uuid}` and `{chunk}` placeholders
    pub name_template: Option<String>,
    /// Extension appended when the resolved name has none
    pub extension: String,
    /// Prefix for generated names
    pub file_prefix: Option<String>,
    pub overwrite: bool,
}

/// How pause and resume keys interact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseMode {
    /// No pause key configured
    Disabled,
    /// One key pauses and resumes
    Toggle,
    /// Pause keys only pause, resume keys only resume
    Separate,
}

/// Validated, immutable recording configuration.
#[derive(Debug, Clone)]
pub struct RecordingConfiguration {
    duration: Option<Duration>,
    split_interval: Option<Duration>,
    max_size_bytes: Option<u64>,
    stop_keys: KeySet,
    pause_keys: KeySet,
    resume_keys: KeySet,
    output: Option<PathBuf>,
    name_template: Option<String>,
    extension: String,
    file_prefix: String,
    overwrite: bool,
}

impl RecordingOptions {
    /// Check option combinations and build the configuration.
    pub fn validate(self) -> Result<RecordingConfiguration, ValidationError> {
        let duration = positive_seconds("duration", self.duration_secs)?;
        let split_interval = positive_seconds("split interval", self.split_secs)?;

        if self.max_size_bytes == Some(0) {
            return Err(ValidationError::ZeroMaxSize);
        }

        let pause_keys = self.pause_key.unwrap_or_default();
        let resume_keys = match self.resume_key {
            Some(_) if pause_keys.is_empty() => return Err(ValidationError::ResumeWithoutPause),
            Some(keys) => keys,
            None => pause_keys.clone(),
        };

        if let Some(template) = &self.name_template {
            output::check_template(template).map_err(|reason| {
                ValidationError::InvalidTemplate {
                    template: template.clone(),
                    reason,
                }
            })?;
            if split_interval.is_some()
                && !template.contains(output::CHUNK_PLACEHOLDER)
                && !template.contains(output::UUID_PLACEHOLDER)
            {
                return Err(ValidationError::TemplateNotUnique(template.clone()));
            }
        }

        let extension = self.extension.trim().trim_start_matches('.').to_string();
        if extension.is_empty()
            || extension
                .chars()
                .any(|c| c == '.' || std::path::is_separator(c) || c.is_whitespace())
        {
            return Err(ValidationError::InvalidExtension(self.extension));
        }

        let file_prefix = self
            .file_prefix
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_PREFIX.to_string());

        Ok(RecordingConfiguration {
            duration,
            split_interval,
            max_size_bytes: self.max_size_bytes,
            stop_keys: self.stop_key.unwrap_or_default(),
            pause_keys,
            resume_keys,
            output: self.output,
            name_template: self.name_template,
            extension,
            file_prefix,
            overwrite: self.overwrite,
        })
    }
}

fn positive_seconds(name: &'static str, secs: Option<f64>) -> Result<Option<Duration>, ValidationError> {
    match secs {
        None => Ok(None),
        Some(value) if value.is_finite() && value > 0.0 => Duration::try_from_secs_f64(value)
            .map(Some)
            .map_err(|_| ValidationError::NotPositive { name, value }),
        Some(value) => Err(ValidationError::NotPositive { name, value }),
    }
}

impl RecordingConfiguration {
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn split_interval(&self) -> Option<Duration> {
        self.split_interval
    }

    pub fn max_size_bytes(&self) -> Option<u64> {
        self.max_size_bytes
    }

    pub fn stop_keys(&self) -> &KeySet {
        &self.stop_keys
    }

    pub fn pause_keys(&self) -> &KeySet {
        &self.pause_keys
    }

    pub fn resume_keys(&self) -> &KeySet {
        &self.resume_keys
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn name_template(&self) -> Option<&str> {
        self.name_template.as_deref()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn is_splitting(&self) -> bool {
        self.split_interval.is_some()
    }

    pub fn pause_mode(&self) -> PauseMode {
        if self.pause_keys.is_empty() {
            PauseMode::Disabled
        } else if self.pause_keys == self.resume_keys {
            PauseMode::Toggle
        } else {
            PauseMode::Separate
        }
    }
}
