//! Exit codes for the CLI.
//!
//! These codes enable scripting integration by providing structured
//! feedback about operation results.

use chunkrec_common::{CaptureError, RecordError};

/// Exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Operation completed successfully
    Success = 0,
    /// General/unspecified error
    GeneralError = 1,
    /// Invalid command-line arguments or option combination
    InvalidArguments = 2,
    /// No usable capture device, or ffmpeg is missing
    Unavailable = 3,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<&RecordError> for ExitCode {
    fn from(err: &RecordError) -> Self {
        match err {
            RecordError::Validation(_) => ExitCode::InvalidArguments,
            RecordError::Capture(CaptureError::Unavailable(_) | CaptureError::StartFailed(_)) => {
                ExitCode::Unavailable
            }
            RecordError::Capture(_) | RecordError::Output(_) => ExitCode::GeneralError,
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCode::Success => write!(f, "success"),
            ExitCode::GeneralError => write!(f, "general error"),
            ExitCode::InvalidArguments => write!(f, "invalid arguments"),
            ExitCode::Unavailable => write!(f, "unavailable"),
        }
    }
}
