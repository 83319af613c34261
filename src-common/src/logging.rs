//! Platform-specific logging directory resolution.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Base name of the rolling log file.
///
/// The appender adds the date, e.g. `chunkrec.log.2026-03-01`.
pub const LOG_FILE_NAME: &str = "chunkrec.log";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "chunkrec")
}

/// Returns the platform-appropriate directory for log files.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_STATE_HOME/chunkrec/logs` or `~/.local/state/chunkrec/logs` |
/// | macOS | `~/Library/Logs/chunkrec` |
/// | Windows | `%LOCALAPPDATA%\chunkrec\chunkrec\logs` |
///
/// `None` when no home directory can be determined.
pub fn log_dir() -> Option<PathBuf> {
    let base = project_dirs()?;

    #[cfg(target_os = "linux")]
    {
        Some(
            base.state_dir()
                .unwrap_or_else(|| base.data_local_dir())
                .join("logs"),
        )
    }

    #[cfg(target_os = "macos")]
    {
        // data_local_dir is ~/Library/Application Support/chunkrec
        let library = base.data_local_dir().parent().and_then(|p| p.parent());
        Some(match library {
            Some(library) => library.join("Logs").join("chunkrec"),
            None => base.data_local_dir().join("logs"),
        })
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Some(base.data_local_dir().join("logs"))
    }
}

/// Ensures the log directory exists, creating it if necessary.
///
/// Returns the directory on success.
pub fn ensure_log_dir() -> std::io::Result<PathBuf> {
    let dir = log_dir().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory")
    })?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
