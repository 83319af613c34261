//! Capture session capability.
//!
//! Audio, screen and camera capture differ only in how samples and frames are
//! produced. Each mode implements [`CaptureSession`] and the chunk loop drives
//! it without knowing which mode it is.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Error type for capture session operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture already in progress")]
    AlreadyRecording,

    /// The capture backend or its target device is not available
    #[error("Capture unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the configuration or could not open its input
    #[error("Capture failed to start: {0}")]
    StartFailed(String),

    /// The backend stopped on its own while a chunk was recording
    #[error("Capture stopped unexpectedly: {0}")]
    Exited(String),

    #[error("Capture failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running capture that writes one output file at a time.
#[async_trait]
pub trait CaptureSession: Send {
    /// Begin writing to `path`. Fails if already recording.
    async fn start(&mut self, path: &Path) -> Result<(), CaptureError>;

    /// Flush and finalize the current file. No-op if not recording.
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Best-effort size of the file being written, `None` when unknown.
    fn current_output_size_bytes(&self) -> Option<u64>;

    /// Suspend capture while the operator has paused.
    async fn pause(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Continue capture after a pause.
    async fn resume(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Report a backend that died mid-chunk. Polled on every evaluator wake-up.
    fn check_health(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }
}
