//! Pause-aware active recording time.
//!
//! Only active time is tracked here. The overall duration deadline is an
//! absolute wall-clock instant owned by the evaluator and keeps running while
//! paused; the split interval is measured against this timeline and does not.

use std::time::Duration;
use tokio::time::Instant;

/// Active time of one chunk, excluding paused intervals.
#[derive(Debug, Clone)]
pub struct RecordingTimeline {
    elapsed_active: Duration,
    is_paused: bool,
    last_tick_at: Instant,
}

impl RecordingTimeline {
    /// Start a running timeline at `started_at`.
    pub fn new(started_at: Instant) -> Self {
        Self {
            elapsed_active: Duration::ZERO,
            is_paused: false,
            last_tick_at: started_at,
        }
    }

    /// Advance to `now`, returning the active time gained since the previous tick.
    ///
    /// Returns zero while paused. An instant earlier than the previous tick
    /// gains nothing, so active time never decreases.
    pub fn tick(&mut self, now: Instant) -> Duration {
        let delta = now.saturating_duration_since(self.last_tick_at);
        if now > self.last_tick_at {
            self.last_tick_at = now;
        }
        if self.is_paused {
            return Duration::ZERO;
        }
        self.elapsed_active += delta;
        delta
    }

    /// Pause at `now`. Time up to `now` is still counted.
    ///
    /// Returns `false` if already paused.
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.is_paused {
            return false;
        }
        self.tick(now);
        self.is_paused = true;
        true
    }

    /// Resume at `now`. The paused interval is discarded.
    ///
    /// Returns `false` if not paused.
    pub fn resume(&mut self, now: Instant) -> bool {
        if !self.is_paused {
            return false;
        }
        self.tick(now);
        self.is_paused = false;
        true
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn elapsed_active(&self) -> Duration {
        self.elapsed_active
    }

    /// Active time left until `interval` has elapsed, clamped at zero.
    pub fn remaining(&self, interval: Duration) -> Duration {
        interval.saturating_sub(self.elapsed_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_tick_accumulates_active_time() {
        let t0 = Instant::now();
        let mut timeline = RecordingTimeline::new(t0);
        assert_eq!(timeline.tick(t0 + ms(300)), ms(300));
        assert_eq!(timeline.tick(t0 + ms(500)), ms(200));
        assert_eq!(timeline.elapsed_active(), ms(500));
    }

    #[test]
    fn test_tick_while_paused_reports_zero() {
        let t0 = Instant::now();
        let mut timeline = RecordingTimeline::new(t0);
        assert!(timeline.pause(t0 + ms(100)));
        assert_eq!(timeline.tick(t0 + ms(900)), Duration::ZERO);
        assert_eq!(timeline.elapsed_active(), ms(100));
    }

    #[test]
    fn test_split_does_not_draw_closer_while_paused() {
        let t0 = Instant::now();
        let split = Duration::from_secs(1);
        let mut timeline = RecordingTimeline::new(t0);
        timeline.tick(t0 + ms(400));
        assert_eq!(timeline.remaining(split), ms(600));

        timeline.pause(t0 + ms(400));
        timeline.tick(t0 + ms(5_000));
        assert_eq!(timeline.remaining(split), ms(600));

        timeline.resume(t0 + ms(5_000));
        timeline.tick(t0 + ms(5_600));
        assert_eq!(timeline.remaining(split), Duration::ZERO);
    }

    #[test]
    fn test_pause_and_resume_are_idempotent() {
        let t0 = Instant::now();
        let mut timeline = RecordingTimeline::new(t0);
        assert!(!timeline.resume(t0));
        assert!(timeline.pause(t0));
        assert!(!timeline.pause(t0 + ms(10)));
        assert!(timeline.is_paused());
        assert!(timeline.resume(t0 + ms(20)));
        assert!(!timeline.is_paused());
    }

    #[test]
    fn test_elapsed_never_decreases() {
        let t0 = Instant::now();
        let mut timeline = RecordingTimeline::new(t0 + ms(500));
        assert_eq!(timeline.tick(t0), Duration::ZERO);
        assert_eq!(timeline.elapsed_active(), Duration::ZERO);
        timeline.tick(t0 + ms(800));
        timeline.tick(t0 + ms(600));
        assert_eq!(timeline.elapsed_active(), ms(300));
    }

    #[test]
    fn test_remaining_clamps_at_zero() {
        let t0 = Instant::now();
        let mut timeline = RecordingTimeline::new(t0);
        timeline.tick(t0 + Duration::from_secs(3));
        assert_eq!(timeline.remaining(Duration::from_secs(1)), Duration::ZERO);
    }
}
