//! Output path resolution for recording chunks.
//!
//! The output spec given by the operator may be absent (write to the temp
//! directory), name a directory (generate a file name inside it), or name a
//! file. Generated names come from a template that is expanded through the
//! calendar formatter, then `{uuid}`, then `{chunk}`.

use crate::config::RecordingConfiguration;
use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Placeholder replaced by the decimal chunk number.
pub const CHUNK_PLACEHOLDER: &str = "{chunk}";

/// Placeholder replaced by a freshly generated UUID.
pub const UUID_PLACEHOLDER: &str = "{uuid}";

/// Maximum path length in characters.
pub const MAX_PATH_LENGTH: usize = 4096;

/// Error type for output path resolution.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Output file already exists: {} (use --overwrite to replace it)", .0.display())]
    Exists(PathBuf),

    #[error("Output must be a directory when splitting: {}", .0.display())]
    MustBeDirectory(PathBuf),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("Failed to prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Check that `template` only uses supported calendar specifiers.
pub fn check_template(template: &str) -> Result<(), String> {
    if StrftimeItems::new(template).any(|item| matches!(item, Item::Error)) {
        return Err("unsupported calendar format specifier".to_string());
    }
    Ok(())
}

/// Computes the destination of each chunk.
#[derive(Debug, Clone)]
pub struct OutputPathResolver {
    output: Option<String>,
    template: Option<String>,
    extension: String,
    prefix: String,
    require_directory: bool,
    overwrite: bool,
    temp_dir: PathBuf,
}

impl OutputPathResolver {
    /// Build a resolver from a validated configuration.
    ///
    /// A directory is required whenever the run is split into chunks.
    pub fn new(config: &RecordingConfiguration) -> Self {
        Self {
            output: config
                .output()
                .map(|p| p.to_string_lossy().into_owned()),
            template: config.name_template().map(str::to_string),
            extension: config.extension().to_string(),
            prefix: config.file_prefix().to_string(),
            require_directory: config.is_splitting(),
            overwrite: config.overwrite(),
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Use `dir` instead of the system temp directory when no output is given.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Resolve the path for one chunk.
    ///
    /// `chunk` is supplied when the run is split; it fills the `{chunk}`
    /// placeholder. If the resolved path exists it is removed when overwriting
    /// is allowed, otherwise [`OutputError::Exists`] is returned.
    pub fn resolve(&self, chunk: Option<u32>) -> Result<PathBuf, OutputError> {
        let target = match &self.output {
            None => {
                let dir = self.temp_dir.clone();
                self.generate_in(&dir, chunk)?
            }
            Some(spec) => self.resolve_spec(spec, chunk)?,
        };

        self.apply_overwrite_policy(&target)?;
        debug!(path = %target.display(), chunk = ?chunk, "Resolved output path");
        Ok(target)
    }

    fn resolve_spec(&self, spec: &str, chunk: Option<u32>) -> Result<PathBuf, OutputError> {
        if spec.contains('\0') {
            return Err(OutputError::InvalidPath("path contains null byte".to_string()));
        }
        if spec.len() > MAX_PATH_LENGTH {
            return Err(OutputError::InvalidPath(format!(
                "path too long: {} chars",
                spec.len()
            )));
        }
        if spec.trim().is_empty() {
            return Err(OutputError::InvalidPath("path is empty".to_string()));
        }

        let expanded = shellexpand::tilde(spec);
        let trailing_separator = expanded.ends_with(std::path::is_separator);
        let path = absolutize(PathBuf::from(expanded.as_ref()))?;

        if trailing_separator || path.is_dir() {
            create_dir(&path)?;
            return self.generate_in(&path, chunk);
        }

        if path.exists() {
            if self.require_directory {
                return Err(OutputError::MustBeDirectory(path));
            }
            return Ok(path);
        }

        if self.require_directory {
            create_dir(&path)?;
            return self.generate_in(&path, chunk);
        }

        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }
        Ok(with_required_extension(path, &self.extension))
    }

    fn generate_in(&self, dir: &Path, chunk: Option<u32>) -> Result<PathBuf, OutputError> {
        let name = self.expand_template(chunk);
        let path = with_required_extension(dir.join(name), &self.extension);
        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }
        Ok(path)
    }

    /// Expand the name template for `chunk`.
    fn expand_template(&self, chunk: Option<u32>) -> String {
        let template = match &self.template {
            Some(t) => t.clone(),
            None => default_template(&self.prefix, self.require_directory),
        };

        let mut name = format_calendar(&template);
        if name.contains(UUID_PLACEHOLDER) {
            name = name.replace(UUID_PLACEHOLDER, &Uuid::new_v4().to_string());
        }
        if let Some(index) = chunk {
            name = name.replace(CHUNK_PLACEHOLDER, &index.to_string());
        }

        if name.trim().is_empty() {
            name = format!("{}-{}", self.prefix, Uuid::new_v4());
        }
        name
    }

    fn apply_overwrite_policy(&self, target: &Path) -> Result<(), OutputError> {
        if !target.exists() {
            return Ok(());
        }
        if target.is_dir() {
            return Err(OutputError::InvalidPath(format!(
                "{} is a directory",
                target.display()
            )));
        }
        if !self.overwrite {
            return Err(OutputError::Exists(target.to_path_buf()));
        }

        std::fs::remove_file(target).map_err(|source| OutputError::Io {
            path: target.to_path_buf(),
            source,
        })?;
        info!(path = %target.display(), "Removed existing output file");
        Ok(())
    }
}

/// Default name: prefix plus local time, with the chunk number when splitting.
fn default_template(prefix: &str, chunked: bool) -> String {
    let mut template = format!("{}_%Y-%m-%d_%H%M%S", prefix.replace('%', "%%"));
    if chunked {
        template.push('_');
        template.push_str(CHUNK_PLACEHOLDER);
    }
    template
}

/// Run `template` through the calendar formatter using the local time.
///
/// A template the formatter cannot handle is used verbatim.
fn format_calendar(template: &str) -> String {
    let items: Vec<Item<'_>> = StrftimeItems::new(template).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return template.to_string();
    }

    let mut formatted = String::new();
    match write!(formatted, "{}", Local::now().format_with_items(items.iter())) {
        Ok(()) => formatted,
        Err(_) => template.to_string(),
    }
}

/// Append `.extension` when `path` has none. An existing extension is kept.
fn with_required_extension(path: PathBuf, extension: &str) -> PathBuf {
    if path.extension().is_some() {
        return path;
    }
    let mut raw = path.into_os_string();
    raw.push(".");
    raw.push(extension);
    PathBuf::from(raw)
}

fn absolutize(path: PathBuf) -> Result<PathBuf, OutputError> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().map_err(|source| OutputError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(cwd.join(path))
}

fn create_dir(dir: &Path) -> Result<(), OutputError> {
    std::fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })
}
