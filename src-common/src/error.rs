//! Error returned by a recording run.

use crate::config::ValidationError;
use crate::output::OutputError;
use crate::session::CaptureError;
use thiserror::Error;

/// Any failure that ends a recording run.
///
/// Validation failures happen before any capture starts. Output and capture
/// failures abort the run; chunks already finalized stay on disk.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}
