//! Chunk loop.
//!
//! `Idle -> Recording(1) -> [split] -> Recording(2) -> ... -> Stopped`
//!
//! Each chunk resolves its path, starts the capture session, waits in the
//! [`StopConditionEvaluator`] and stops the session before the next
//! transition. Any failure to start a chunk aborts the run; chunks already
//! finished stay on disk.

use crate::config::RecordingConfiguration;
use crate::error::RecordError;
use crate::evaluator::{StopConditionEvaluator, StopReason};
use crate::interrupt::Interrupt;
use crate::output::OutputPathResolver;
use crate::session::CaptureSession;
use crate::terminal::KeyInput;
use serde::Serialize;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The chunk currently being recorded.
#[derive(Debug, Clone)]
pub struct ChunkState {
    /// 1-based chunk number
    pub index: u32,
    pub path: PathBuf,
    pub started_at: Instant,
}

/// A finished chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkRecord {
    pub chunk: u32,
    pub path: PathBuf,
    pub reason: StopReason,
}

/// Progress notifications from a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    ChunkStarted { index: u32, path: PathBuf },
    Paused,
    Resumed,
    ChunkFinished(ChunkRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Recording(u32),
    Stopped,
}

/// Drives a capture session through one recording run.
pub struct RecordingLoopController<S, K> {
    config: RecordingConfiguration,
    resolver: OutputPathResolver,
    session: S,
    keys: K,
    interrupt: Interrupt,
    state: ControllerState,
}

impl<S, K> RecordingLoopController<S, K>
where
    S: CaptureSession,
    K: KeyInput,
{
    pub fn new(config: RecordingConfiguration, session: S, keys: K, interrupt: Interrupt) -> Self {
        let resolver = OutputPathResolver::new(&config);
        Self {
            config,
            resolver,
            session,
            keys,
            interrupt,
            state: ControllerState::Idle,
        }
    }

    /// Replace the path resolver built from the configuration.
    pub fn with_resolver(mut self, resolver: OutputPathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Record chunks until a stop condition other than a split fires.
    ///
    /// Returns the finished chunks in order. `observer` sees every event as
    /// it happens, including the final [`RecordingEvent::ChunkFinished`].
    pub async fn run<F>(&mut self, mut observer: F) -> Result<Vec<ChunkRecord>, RecordError>
    where
        F: FnMut(&RecordingEvent),
    {
        let result = self.run_chunks(&mut observer).await;
        self.state = ControllerState::Stopped;
        result
    }

    async fn run_chunks<F>(&mut self, observer: &mut F) -> Result<Vec<ChunkRecord>, RecordError>
    where
        F: FnMut(&RecordingEvent),
    {
        let run_started_at = Instant::now();
        let splitting = self.config.is_splitting();
        let mut evaluator = StopConditionEvaluator::new(
            &self.config,
            &mut self.keys,
            self.interrupt.clone(),
            run_started_at,
        );
        let mut records = Vec::new();
        let mut index: u32 = 1;

        loop {
            if evaluator.deadline().is_some_and(|d| Instant::now() >= d) {
                debug!("Duration elapsed before chunk {}", index);
                break;
            }
            if self.interrupt.is_triggered() {
                debug!("Interrupted before chunk {}", index);
                break;
            }

            let path = self.resolver.resolve(splitting.then_some(index))?;
            self.session.start(&path).await?;

            let chunk = ChunkState {
                index,
                path,
                started_at: Instant::now(),
            };
            self.state = ControllerState::Recording(index);
            info!(chunk = chunk.index, path = %chunk.path.display(), "Chunk started");
            observer(&RecordingEvent::ChunkStarted {
                index: chunk.index,
                path: chunk.path.clone(),
            });

            let evaluated = evaluator
                .evaluate(&mut self.session, chunk.started_at, observer)
                .await;
            let stopped = self.session.stop().await;

            let reason = match (evaluated, stopped) {
                (Ok(reason), Ok(())) => reason,
                (Ok(_), Err(e)) => return Err(e.into()),
                (Err(e), stopped) => {
                    if let Err(stop_err) = stopped {
                        warn!("Failed to stop capture after error: {}", stop_err);
                    }
                    return Err(e.into());
                }
            };

            info!(
                chunk = chunk.index,
                reason = %reason,
                elapsed = ?chunk.started_at.elapsed(),
                "Chunk finished"
            );
            let record = ChunkRecord {
                chunk: chunk.index,
                path: chunk.path,
                reason,
            };
            observer(&RecordingEvent::ChunkFinished(record.clone()));
            records.push(record);

            if reason != StopReason::Split {
                break;
            }
            index += 1;
        }

        Ok(records)
    }
}
