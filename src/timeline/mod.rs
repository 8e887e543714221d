//! C1: Timeline & Clock
//!
//! Two clocks live here. [`MonotonicClock`] is the real-time source the
//! acquisition and storage paths stamp samples with. [`PlaybackClock`] is
//! a virtual clock the playback coordinator (C8) drives at an arbitrary
//! rate, independent of wall time.

use crate::MonitorError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Mutex;
use std::time::Instant;

/// Anything that can answer "what monotonic microsecond is it".
pub trait Clock: Send + Sync {
    fn now_us(&self) -> i64;
}

/// Wall-clock-anchored monotonic microsecond clock captured at process
/// start. `now_us()` never goes backwards for the lifetime of the process.
pub struct MonotonicClock {
    start: Instant,
    anchor_utc: DateTime<Utc>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            anchor_utc: Utc::now(),
        }
    }

    /// Map a monotonic microsecond reading back to civil time.
    pub fn to_utc(&self, us: i64) -> DateTime<Utc> {
        self.anchor_utc + ChronoDuration::microseconds(us)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> i64 {
        self.start.elapsed().as_micros() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Paused,
    Playing,
    Seeking,
}

struct Inner {
    position_us: i64,
    rate: f64,
    running: bool,
    state: PlaybackState,
    last_real: Instant,
}

/// A virtual, rate-adjustable clock driven by the playback coordinator.
/// Starts `Paused`, matching §4.8.
pub struct PlaybackClock {
    inner: Mutex<Inner>,
}

impl PlaybackClock {
    pub fn new(start_us: i64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                position_us: start_us,
                rate: 1.0,
                running: false,
                state: PlaybackState::Paused,
                last_real: Instant::now(),
            }),
        }
    }

    pub fn current_us(&self) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        self.advance_locked(&mut inner);
        inner.position_us
    }

    fn advance_locked(&self, inner: &mut Inner) {
        if inner.running {
            let elapsed = inner.last_real.elapsed().as_micros() as f64;
            inner.position_us += (elapsed * inner.rate) as i64;
            inner.last_real = Instant::now();
        }
    }

    pub fn play(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_real = Instant::now();
        inner.running = true;
        inner.state = PlaybackState::Playing;
    }

    pub fn pause(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.advance_locked(&mut inner);
        inner.running = false;
        inner.state = PlaybackState::Paused;
    }

    pub fn seek_to(&self, us: i64) {
        let mut inner = self.inner.lock().unwrap();
        let was_running = inner.running;
        inner.state = PlaybackState::Seeking;
        inner.position_us = us;
        inner.last_real = Instant::now();
        inner.state = if was_running {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
    }

    pub fn set_rate(&self, rate: f64) -> Result<(), MonitorError> {
        if rate <= 0.0 {
            return Err(MonitorError::InvariantViolation(format!(
                "playback rate must be positive, got {rate}"
            )));
        }
        let mut inner = self.inner.lock().unwrap();
        self.advance_locked(&mut inner);
        inner.rate = rate;
        Ok(())
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().unwrap().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_us();
        sleep(Duration::from_millis(2));
        let b = clock.now_us();
        assert!(b > a);
    }

    #[test]
    fn playback_clock_starts_paused() {
        let clock = PlaybackClock::new(1_000);
        assert_eq!(clock.state(), PlaybackState::Paused);
        assert_eq!(clock.current_us(), 1_000);
    }

    #[test]
    fn playback_clock_advances_only_when_playing() {
        let clock = PlaybackClock::new(0);
        let before = clock.current_us();
        sleep(Duration::from_millis(5));
        assert_eq!(clock.current_us(), before);

        clock.play();
        sleep(Duration::from_millis(5));
        assert!(clock.current_us() > before);
    }

    #[test]
    fn rejects_non_positive_rate() {
        let clock = PlaybackClock::new(0);
        assert!(clock.set_rate(0.0).is_err());
        assert!(clock.set_rate(-1.0).is_err());
        assert!(clock.set_rate(2.0).is_ok());
    }

    #[test]
    fn seek_sets_position_immediately() {
        let clock = PlaybackClock::new(0);
        clock.seek_to(5_000);
        assert_eq!(clock.current_us(), 5_000);
    }
}
