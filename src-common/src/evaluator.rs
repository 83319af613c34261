//! Stop-condition evaluation for one chunk.
//!
//! The evaluator races every configured trigger against each other: the
//! absolute duration deadline, the pause-aware split interval, the output
//! size limit, operator keys and the interrupt flag. It sleeps until the
//! earliest of those could fire (never longer than [`POLL_QUANTUM`]) and
//! returns exactly one [`StopReason`].

use crate::config::RecordingConfiguration;
use crate::controller::RecordingEvent;
use crate::interrupt::Interrupt;
use crate::keys::KeyPress;
use crate::session::{CaptureError, CaptureSession};
use crate::terminal::KeyInput;
use crate::timeline::RecordingTimeline;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Longest single wait, bounding key and interrupt latency.
pub const POLL_QUANTUM: Duration = Duration::from_millis(250);

/// Minimum spacing between output size checks.
pub const SIZE_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Why a chunk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The overall duration deadline passed
    Duration,
    /// The split interval elapsed; another chunk follows
    Split,
    /// The output reached the size limit
    MaxSize,
    /// The operator pressed a stop key
    Key,
    /// Interrupt signal or Ctrl+C
    ExternalSignal,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Duration => "duration",
            StopReason::Split => "split",
            StopReason::MaxSize => "max_size",
            StopReason::Key => "key",
            StopReason::ExternalSignal => "external_signal",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Waits for the first stop condition of each chunk.
///
/// Lives for a whole run so that the duration deadline, computed once from
/// the run start, carries across chunks.
pub struct StopConditionEvaluator<'a, K> {
    config: &'a RecordingConfiguration,
    keys: K,
    interrupt: Interrupt,
    deadline: Option<Instant>,
}

impl<'a, K: KeyInput> StopConditionEvaluator<'a, K> {
    pub fn new(
        config: &'a RecordingConfiguration,
        keys: K,
        interrupt: Interrupt,
        run_started_at: Instant,
    ) -> Self {
        Self {
            config,
            keys,
            interrupt,
            // A deadline past the clock's range never fires
            deadline: config
                .duration()
                .and_then(|d| run_started_at.checked_add(d)),
        }
    }

    /// Absolute end of the run, if a duration is configured.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Wait until one stop condition fires for the chunk started at
    /// `chunk_started_at`.
    ///
    /// The key stream, and with it raw terminal mode, is held only for this
    /// call. Pause and resume keys are applied to `session` and reported to
    /// `observer`. A failing session health check ends the wait with its
    /// error.
    pub async fn evaluate<S, F>(
        &mut self,
        session: &mut S,
        chunk_started_at: Instant,
        observer: &mut F,
    ) -> Result<StopReason, CaptureError>
    where
        S: CaptureSession + ?Sized,
        F: FnMut(&RecordingEvent),
    {
        let mut timeline = RecordingTimeline::new(chunk_started_at);
        let mut keys = self.keys.open();
        let split = self.config.split_interval();
        let max_size = self.config.max_size_bytes();
        let mut next_size_check = chunk_started_at + SIZE_CHECK_INTERVAL;

        loop {
            if self.interrupt.is_triggered() {
                return Ok(StopReason::ExternalSignal);
            }
            session.check_health()?;

            let now = Instant::now();
            timeline.tick(now);

            if self.deadline.is_some_and(|deadline| now >= deadline) {
                return Ok(StopReason::Duration);
            }
            if let Some(interval) = split {
                if !timeline.is_paused() && timeline.remaining(interval).is_zero() {
                    return Ok(StopReason::Split);
                }
            }
            if let Some(limit) = max_size {
                if now >= next_size_check {
                    next_size_check = now + SIZE_CHECK_INTERVAL;
                    if let Some(size) = session.current_output_size_bytes() {
                        if size >= limit {
                            debug!(size, limit, "Output size limit reached");
                            return Ok(StopReason::MaxSize);
                        }
                    }
                }
            }

            let mut wake = now + POLL_QUANTUM;
            if let Some(deadline) = self.deadline {
                wake = wake.min(deadline);
            }
            if let Some(interval) = split {
                if !timeline.is_paused() {
                    if let Some(split_at) = now.checked_add(timeline.remaining(interval)) {
                        wake = wake.min(split_at);
                    }
                }
            }
            if max_size.is_some() {
                wake = wake.min(next_size_check);
            }

            let keys_open = keys.is_open();
            let key = tokio::select! {
                biased;
                key = keys.next(), if keys_open => key,
                _ = sleep_until(wake) => None,
            };

            match key {
                Some(KeyPress::Interrupt) => return Ok(StopReason::ExternalSignal),
                Some(KeyPress::Char(c)) if self.config.stop_keys().contains(c) => {
                    return Ok(StopReason::Key);
                }
                Some(KeyPress::Char(c)) => {
                    self.apply_pause_key(c, &mut timeline, session, observer)
                        .await?;
                }
                None => {}
            }
        }
    }

    async fn apply_pause_key<S, F>(
        &self,
        c: char,
        timeline: &mut RecordingTimeline,
        session: &mut S,
        observer: &mut F,
    ) -> Result<(), CaptureError>
    where
        S: CaptureSession + ?Sized,
        F: FnMut(&RecordingEvent),
    {
        let now = Instant::now();
        if !timeline.is_paused() && self.config.pause_keys().contains(c) {
            session.pause().await?;
            timeline.pause(now);
            info!(mode = ?self.config.pause_mode(), "Recording paused");
            observer(&RecordingEvent::Paused);
        } else if timeline.is_paused() && self.config.resume_keys().contains(c) {
            session.resume().await?;
            timeline.resume(now);
            info!(elapsed = ?timeline.elapsed_active(), "Recording resumed");
            observer(&RecordingEvent::Resumed);
        } else {
            debug!(key = %c.escape_debug(), "Ignoring key");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordingOptions;
    use crate::keys::parse_key;
    use crate::terminal::{KeyStream, NoKeys};
    use crate::testing::{FakeSession, ScriptedKeys};
    use futures_util::stream;
    use tempfile::TempDir;

    fn options() -> RecordingOptions {
        RecordingOptions {
            extension: "mov".to_string(),
            ..Default::default()
        }
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    async fn run_chunk<K: KeyInput>(
        config: &RecordingConfiguration,
        keys: K,
        session: &mut FakeSession,
    ) -> (StopReason, Duration, Vec<RecordingEvent>) {
        let started = Instant::now();
        let mut events = Vec::new();
        let mut evaluator = StopConditionEvaluator::new(config, keys, Interrupt::new(), started);
        let reason = evaluator
            .evaluate(session, started, &mut |e: &RecordingEvent| events.push(e.clone()))
            .await
            .unwrap();
        (reason, started.elapsed(), events)
    }

    fn assert_near(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual <= expected + POLL_QUANTUM,
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_only() {
        let config = RecordingOptions {
            duration_secs: Some(2.0),
            ..options()
        }
        .validate()
        .unwrap();

        let mut session = FakeSession::default();
        let (reason, elapsed, _) = run_chunk(&config, NoKeys, &mut session).await;
        assert_eq!(reason, StopReason::Duration);
        assert_near(elapsed, secs(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_key_is_case_insensitive() {
        let config = RecordingOptions {
            duration_secs: Some(10.0),
            stop_key: Some(parse_key("s").unwrap()),
            ..options()
        }
        .validate()
        .unwrap();

        for c in ['s', 'S'] {
            let mut session = FakeSession::default();
            let keys = ScriptedKeys::chars(&[(300, 'x'), (700, c)]);
            let (reason, elapsed, _) = run_chunk(&config, keys, &mut session).await;
            assert_eq!(reason, StopReason::Key);
            assert_eq!(elapsed, Duration::from_millis(700));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_fires_before_duration() {
        let config = RecordingOptions {
            duration_secs: Some(10.0),
            split_secs: Some(1.0),
            ..options()
        }
        .validate()
        .unwrap();

        let mut session = FakeSession::default();
        let (reason, elapsed, _) = run_chunk(&config, NoKeys, &mut session).await;
        assert_eq!(reason, StopReason::Split);
        assert_near(elapsed, secs(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_pause_delays_split() {
        let config = RecordingOptions {
            split_secs: Some(2.0),
            pause_key: Some(parse_key("p").unwrap()),
            ..options()
        }
        .validate()
        .unwrap();

        let mut session = FakeSession::default();
        let keys = ScriptedKeys::chars(&[(500, 'p'), (1500, 'P')]);
        let (reason, elapsed, events) = run_chunk(&config, keys, &mut session).await;
        assert_eq!(reason, StopReason::Split);
        assert_near(elapsed, secs(3.0));
        assert_eq!(events, vec![RecordingEvent::Paused, RecordingEvent::Resumed]);
        assert_eq!((session.pauses, session.resumes), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_does_not_delay_duration() {
        let config = RecordingOptions {
            duration_secs: Some(2.0),
            pause_key: Some(parse_key("p").unwrap()),
            ..options()
        }
        .validate()
        .unwrap();

        let mut session = FakeSession::default();
        let keys = ScriptedKeys::chars(&[(500, 'p')]);
        let (reason, elapsed, events) = run_chunk(&config, keys, &mut session).await;
        assert_eq!(reason, StopReason::Duration);
        assert_near(elapsed, secs(2.0));
        assert_eq!(events, vec![RecordingEvent::Paused]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_pause_and_resume_keys() {
        let config = RecordingOptions {
            split_secs: Some(1.0),
            pause_key: Some(parse_key("p").unwrap()),
            resume_key: Some(parse_key("r").unwrap()),
            ..options()
        }
        .validate()
        .unwrap();

        // The second 'p' and the first 'r' arrive in the wrong state and are ignored
        let mut session = FakeSession::default();
        let keys = ScriptedKeys::chars(&[(200, 'r'), (400, 'p'), (600, 'p'), (1400, 'r')]);
        let (reason, elapsed, events) = run_chunk(&config, keys, &mut session).await;
        assert_eq!(reason, StopReason::Split);
        assert_near(elapsed, secs(2.0));
        assert_eq!(events, vec![RecordingEvent::Paused, RecordingEvent::Resumed]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_key_wins_over_pause_key() {
        let config = RecordingOptions {
            stop_key: Some(parse_key("x").unwrap()),
            pause_key: Some(parse_key("X").unwrap()),
            ..options()
        }
        .validate()
        .unwrap();

        let mut session = FakeSession::default();
        let keys = ScriptedKeys::chars(&[(100, 'x')]);
        let (reason, _, events) = run_chunk(&config, keys, &mut session).await;
        assert_eq!(reason, StopReason::Key);
        assert!(events.is_empty());
        assert_eq!(session.pauses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_size_is_checked_on_interval() {
        let dir = TempDir::new().unwrap();
        let config = RecordingOptions {
            max_size_bytes: Some(1024),
            stop_key: Some(parse_key("s").unwrap()),
            ..options()
        }
        .validate()
        .unwrap();

        let mut session = FakeSession::growing(1000);
        session.start(&dir.path().join("a.mov")).await.unwrap();
        let (reason, elapsed, _) = run_chunk(&config, NoKeys, &mut session).await;
        assert_eq!(reason, StopReason::MaxSize);
        assert_eq!(elapsed, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_key_before_size_limit() {
        let dir = TempDir::new().unwrap();
        let config = RecordingOptions {
            max_size_bytes: Some(1024),
            stop_key: Some(parse_key("s").unwrap()),
            ..options()
        }
        .validate()
        .unwrap();

        let mut session = FakeSession::growing(1000);
        session.start(&dir.path().join("a.mov")).await.unwrap();
        let keys = ScriptedKeys::chars(&[(800, 's')]);
        let (reason, _, _) = run_chunk(&config, keys, &mut session).await;
        assert_eq!(reason, StopReason::Key);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_size_never_stops() {
        let config = RecordingOptions {
            duration_secs: Some(3.0),
            max_size_bytes: Some(1),
            ..options()
        }
        .validate()
        .unwrap();

        let mut session = FakeSession::default();
        let (reason, _, _) = run_chunk(&config, NoKeys, &mut session).await;
        assert_eq!(reason, StopReason::Duration);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_flag_is_observed_within_quantum() {
        let config = options().validate().unwrap();
        let interrupt = Interrupt::new();
        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1100)).await;
            trigger.trigger();
        });

        let started = Instant::now();
        let mut session = FakeSession::default();
        let mut evaluator = StopConditionEvaluator::new(&config, NoKeys, interrupt, started);
        let reason = evaluator
            .evaluate(&mut session, started, &mut |_: &RecordingEvent| {})
            .await
            .unwrap();
        assert_eq!(reason, StopReason::ExternalSignal);
        assert_near(started.elapsed(), Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ctrl_c_key_is_external_signal() {
        let config = options().validate().unwrap();
        let mut session = FakeSession::default();
        let keys = ScriptedKeys::new(vec![vec![(Duration::from_millis(400), KeyPress::Interrupt)]]);
        let (reason, _, _) = run_chunk(&config, keys, &mut session).await;
        assert_eq!(reason, StopReason::ExternalSignal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_key_stream_does_not_busy_loop() {
        struct Ended;
        impl KeyInput for Ended {
            fn open(&mut self) -> KeyStream {
                KeyStream::from_stream(stream::empty())
            }
        }

        let config = RecordingOptions {
            duration_secs: Some(1.0),
            ..options()
        }
        .validate()
        .unwrap();
        let mut session = FakeSession::default();
        let (reason, elapsed, _) = run_chunk(&config, Ended, &mut session).await;
        assert_eq!(reason, StopReason::Duration);
        assert_near(elapsed, secs(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_failure_ends_wait() {
        let dir = TempDir::new().unwrap();
        let config = options().validate().unwrap();
        let mut session = FakeSession {
            dies_after: Some(Duration::from_secs(1)),
            ..Default::default()
        };
        session.start(&dir.path().join("a.mov")).await.unwrap();

        let started = Instant::now();
        let mut evaluator = StopConditionEvaluator::new(&config, NoKeys, Interrupt::new(), started);
        let result = evaluator
            .evaluate(&mut session, started, &mut |_: &RecordingEvent| {})
            .await;
        assert!(matches!(result, Err(CaptureError::Exited(_))));
        assert_near(started.elapsed(), secs(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_duration_never_fires() {
        let config = RecordingOptions {
            duration_secs: Some(1e19),
            stop_key: Some(parse_key("q").unwrap()),
            ..options()
        }
        .validate()
        .unwrap();

        let mut session = FakeSession::default();
        let keys = ScriptedKeys::chars(&[(600, 'q')]);
        let (reason, elapsed, _) = run_chunk(&config, keys, &mut session).await;
        assert_eq!(reason, StopReason::Key);
        assert_eq!(elapsed, Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_split_interval_never_fires() {
        let config = RecordingOptions {
            split_secs: Some(1e19),
            stop_key: Some(parse_key("q").unwrap()),
            ..options()
        }
        .validate()
        .unwrap();

        let mut session = FakeSession::default();
        let keys = ScriptedKeys::chars(&[(900, 'q')]);
        let (reason, elapsed, _) = run_chunk(&config, keys, &mut session).await;
        assert_eq!(reason, StopReason::Key);
        assert_eq!(elapsed, Duration::from_millis(900));
    }

    #[test]
    fn test_stop_reason_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&StopReason::MaxSize).unwrap(), "\"max_size\"");
        assert_eq!(StopReason::ExternalSignal.to_string(), "external_signal");
    }
}
