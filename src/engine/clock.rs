//! Time sources and the pause-aware game clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait representing a monotonic time source used by the game clock.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Time source that only moves when told to
///
/// Shared between a test and the engine through `Arc`.
pub struct ManualTimeSource {
    start: Instant,
    offset_ms: AtomicU64,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.offset_ms.load(Ordering::SeqCst)
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        self.start + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Session clock in milliseconds that stands still while paused
pub struct GameClock {
    time_source: Arc<dyn TimeSource>,
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl GameClock {
    pub fn new(time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            time_source,
            started_at: None,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Restart from 0
    pub fn start(&mut self) {
        self.started_at = Some(self.time_source.now());
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
    }

    pub fn pause(&mut self) {
        if self.started_at.is_some() && self.paused_at.is_none() {
            self.paused_at = Some(self.time_source.now());
        }
    }

    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += self.time_source.now().saturating_duration_since(paused_at);
        }
    }

    /// Stop and return to 0
    pub fn reset(&mut self) {
        self.started_at = None;
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.paused_at.is_none()
    }

    /// Milliseconds of unpaused time since `start`
    pub fn elapsed_ms(&self) -> u64 {
        let Some(started_at) = self.started_at else {
            return 0;
        };
        let now = self.paused_at.unwrap_or_else(|| self.time_source.now());
        now.saturating_duration_since(started_at)
            .saturating_sub(self.paused_total)
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_excludes_paused_time() {
        let time = Arc::new(ManualTimeSource::new());
        let mut clock = GameClock::new(time.clone());
        assert_eq!(clock.elapsed_ms(), 0);

        clock.start();
        time.advance_ms(1000);
        assert_eq!(clock.elapsed_ms(), 1000);

        clock.pause();
        time.advance_ms(5000);
        assert_eq!(clock.elapsed_ms(), 1000);
        assert!(!clock.is_running());

        clock.resume();
        time.advance_ms(250);
        assert_eq!(clock.elapsed_ms(), 1250);
    }

    #[test]
    fn test_restart_and_reset() {
        let time = Arc::new(ManualTimeSource::new());
        let mut clock = GameClock::new(time.clone());
        clock.start();
        time.advance_ms(700);
        clock.start();
        assert_eq!(clock.elapsed_ms(), 0);

        clock.reset();
        time.advance_ms(700);
        assert_eq!(clock.elapsed_ms(), 0);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_resume_without_pause_is_noop() {
        let time = Arc::new(ManualTimeSource::new());
        let mut clock = GameClock::new(time.clone());
        clock.start();
        clock.resume();
        time.advance_ms(40);
        assert_eq!(clock.elapsed_ms(), 40);
    }
}
