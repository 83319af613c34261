//! Test doubles for the capture session and the key source.

use crate::keys::KeyPress;
use crate::session::{CaptureError, CaptureSession};
use crate::terminal::{KeyInput, KeyStream};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// In-memory capture session whose output grows at a fixed rate.
#[derive(Debug, Default)]
pub(crate) struct FakeSession {
    /// Reported growth of the current file; `None` disables the size check
    pub bytes_per_sec: Option<u64>,
    /// Fail the Nth start (1-based)
    pub fail_start_at: Option<usize>,
    /// Report the backend as dead this long into a chunk
    pub dies_after: Option<Duration>,
    pub fail_stop: bool,
    pub started: Vec<PathBuf>,
    pub stops: usize,
    pub pauses: usize,
    pub resumes: usize,
    /// Start of the chunk being recorded
    pub recording: Option<Instant>,
}

impl FakeSession {
    pub fn growing(bytes_per_sec: u64) -> Self {
        Self {
            bytes_per_sec: Some(bytes_per_sec),
            ..Default::default()
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }
}

#[async_trait]
impl CaptureSession for FakeSession {
    async fn start(&mut self, path: &Path) -> Result<(), CaptureError> {
        if self.recording.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        if self.fail_start_at == Some(self.started.len() + 1) {
            return Err(CaptureError::StartFailed("device rejected configuration".into()));
        }
        std::fs::write(path, b"")?;
        self.started.push(path.to_path_buf());
        self.recording = Some(Instant::now());
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if self.recording.take().is_none() {
            return Ok(());
        }
        self.stops += 1;
        if self.fail_stop {
            return Err(CaptureError::Failed("flush failed".into()));
        }
        Ok(())
    }

    fn current_output_size_bytes(&self) -> Option<u64> {
        let rate = self.bytes_per_sec?;
        let started = self.recording?;
        Some(rate * started.elapsed().as_millis() as u64 / 1000)
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        self.pauses += 1;
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        self.resumes += 1;
        Ok(())
    }

    fn check_health(&mut self) -> Result<(), CaptureError> {
        match (self.dies_after, self.recording) {
            (Some(after), Some(started)) if started.elapsed() >= after => {
                Err(CaptureError::Exited("capture backend exited".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Key source replaying one script per opened stream.
///
/// Each script lists key presses with their offset from the moment the stream
/// is opened. After the script the stream stays open and silent.
#[derive(Debug, Default)]
pub(crate) struct ScriptedKeys {
    scripts: VecDeque<Vec<(Duration, KeyPress)>>,
    pub opened: usize,
}

impl ScriptedKeys {
    pub fn new(scripts: Vec<Vec<(Duration, KeyPress)>>) -> Self {
        Self {
            scripts: scripts.into(),
            opened: 0,
        }
    }

    /// A single script of character presses.
    pub fn chars(presses: &[(u64, char)]) -> Self {
        let script = presses
            .iter()
            .map(|&(ms, c)| (Duration::from_millis(ms), KeyPress::Char(c)))
            .collect();
        Self::new(vec![script])
    }
}

impl KeyInput for ScriptedKeys {
    fn open(&mut self) -> KeyStream {
        self.opened += 1;
        let script = self.scripts.pop_front().unwrap_or_default();
        let opened_at = Instant::now();

        let presses = stream::unfold(script.into_iter(), move |mut presses| async move {
            let (offset, key) = presses.next()?;
            tokio::time::sleep_until(opened_at + offset).await;
            Some((key, presses))
        });
        KeyStream::from_stream(presses.chain(stream::pending()))
    }
}
