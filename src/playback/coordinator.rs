//! Playback coordinator (§4.8, §5)
//!
//! Owns the virtual clock and the two stream emitters, and drives them
//! from a pair of background threads: one walking both emitters forward
//! against the clock, one purely watching for drift. Both observe a
//! shared stop flag between iterations so `stop()` returns well inside
//! the 2s cancellation budget.

use crate::MonitorError;
use crate::acquisition::eeg::EegSample;
use crate::collaborators::SYNC_BUDGET_US;
use crate::playback::eeg_emitter::EegEmitter;
use crate::playback::nirs_emitter::NirsEmitter;
use crate::protocol::NirsSample;
use crate::timeline::{PlaybackClock, PlaybackState};
use log::warn;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Emitter tick interval (§5 thread layout: "~6ms between ticks").
const EMIT_TICK: Duration = Duration::from_millis(6);
/// Drift-monitor tick interval (§5: "~20Hz").
const DRIFT_TICK: Duration = Duration::from_millis(50);

/// One observed drift-monitor breach (§4.8).
#[derive(Debug, Clone, Copy)]
pub struct SyncDrift {
    pub clock_us: i64,
    pub last_eeg_us: i64,
    pub drift_us: i64,
}

struct Shared {
    clock: PlaybackClock,
    eeg: Mutex<EegEmitter>,
    nirs: Mutex<NirsEmitter>,
    last_eeg_us: AtomicI64,
    drift_warning_count: AtomicU64,
    last_drift: Mutex<Option<SyncDrift>>,
}

pub struct PlaybackCoordinator {
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl PlaybackCoordinator {
    /// Spawns the emitter and drift-monitor threads immediately; both sit
    /// idle (checking the clock state each tick) until `play()` is called,
    /// matching the `Paused` initial state of the underlying clock.
    pub fn new(
        start_us: i64,
        eeg: EegEmitter,
        nirs: NirsEmitter,
        on_eeg: impl Fn(EegSample) + Send + Sync + 'static,
        on_nirs: impl Fn(NirsSample) + Send + Sync + 'static,
    ) -> Self {
        let shared = Arc::new(Shared {
            clock: PlaybackClock::new(start_us),
            eeg: Mutex::new(eeg),
            nirs: Mutex::new(nirs),
            last_eeg_us: AtomicI64::new(start_us),
            drift_warning_count: AtomicU64::new(0),
            last_drift: Mutex::new(None),
        });
        let stop = Arc::new(AtomicBool::new(false));

        let emit_shared = Arc::clone(&shared);
        let emit_stop = Arc::clone(&stop);
        let emit_handle = std::thread::Builder::new()
            .name("playback-emit".into())
            .spawn(move || emit_loop(emit_shared, emit_stop, on_eeg, on_nirs))
            .expect("failed to spawn playback emit thread");

        let drift_shared = Arc::clone(&shared);
        let drift_stop = Arc::clone(&stop);
        let drift_handle = std::thread::Builder::new()
            .name("playback-drift".into())
            .spawn(move || drift_loop(drift_shared, drift_stop))
            .expect("failed to spawn playback drift thread");

        Self { shared, stop, threads: vec![emit_handle, drift_handle] }
    }

    pub fn play(&self) {
        self.shared.eeg.lock().unwrap().prepare();
        self.shared.clock.play();
    }

    pub fn pause(&self) {
        self.shared.clock.pause();
    }

    pub fn seek_to(&self, us: i64) {
        self.shared.eeg.lock().unwrap().seek_to(us);
        self.shared.nirs.lock().unwrap().seek_to(us);
        self.shared.last_eeg_us.store(us, Ordering::Release);
        self.shared.clock.seek_to(us);
    }

    pub fn set_rate(&self, rate: f64) -> Result<(), MonitorError> {
        self.shared.clock.set_rate(rate)
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.clock.state()
    }

    pub fn drift_warning_count(&self) -> u64 {
        self.shared.drift_warning_count.load(Ordering::Acquire)
    }

    /// The most recent drift-budget breach observed by the drift monitor,
    /// if any (§4.8). Cleared only by a fresh breach, never by time
    /// passing without one -- this is a "most recent problem", not a
    /// live gauge.
    pub fn last_drift(&self) -> Option<SyncDrift> {
        *self.shared.last_drift.lock().unwrap()
    }

    /// Stops both background threads and joins them. Bounded by one tick
    /// of each loop (≤ 50ms), well inside the 2s cancellation budget
    /// (§4.8 Cancellation).
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.threads {
            let _ = handle.join();
        }
    }
}

fn emit_loop(
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    on_eeg: impl Fn(EegSample),
    on_nirs: impl Fn(NirsSample),
) {
    while !stop.load(Ordering::Acquire) {
        if shared.clock.state() == PlaybackState::Playing {
            let now_us = shared.clock.current_us();

            let eeg_samples = shared.eeg.lock().unwrap().tick(now_us);
            for sample in eeg_samples {
                shared.last_eeg_us.store(sample.ts_us, Ordering::Release);
                on_eeg(sample);
            }

            let nirs_samples = shared.nirs.lock().unwrap().tick(now_us);
            for sample in nirs_samples {
                on_nirs(sample);
            }
        }
        std::thread::sleep(EMIT_TICK);
    }
}

fn drift_loop(shared: Arc<Shared>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Acquire) {
        if shared.clock.state() == PlaybackState::Playing {
            let clock_us = shared.clock.current_us();
            let last_eeg_us = shared.last_eeg_us.load(Ordering::Acquire);
            let drift_us = clock_us - last_eeg_us;
            if drift_us.abs() > SYNC_BUDGET_US {
                let count = shared.drift_warning_count.fetch_add(1, Ordering::AcqRel) + 1;
                *shared.last_drift.lock().unwrap() =
                    Some(SyncDrift { clock_us, last_eeg_us, drift_us });
                warn!(
                    "SyncDrift: clock={clock_us}us last_eeg={last_eeg_us}us drift={drift_us}us warnings={count}"
                );
            }
        }
        std::thread::sleep(DRIFT_TICK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Quality;
    use crate::constants::eeg::EEG_CHANNEL_COUNT;
    use std::sync::mpsc;
    use std::time::Instant;

    fn sample(ts_us: i64) -> EegSample {
        EegSample { ts_us, channels: [1.0; EEG_CHANNEL_COUNT], quality: Quality::NORMAL }
    }

    #[test]
    fn starts_paused_and_emits_nothing_until_play() {
        let (tx, rx) = mpsc::channel();
        let eeg = EegEmitter::new(vec![sample(0), sample(1000)], false, vec![]);
        let nirs = NirsEmitter::new(vec![]);
        let coordinator = PlaybackCoordinator::new(
            0,
            eeg,
            nirs,
            move |s: EegSample| tx.send(s).unwrap(),
            |_| {},
        );
        assert_eq!(coordinator.state(), PlaybackState::Paused);
        std::thread::sleep(Duration::from_millis(20));
        assert!(rx.try_recv().is_err());
        coordinator.stop();
    }

    #[test]
    fn stop_returns_quickly() {
        let eeg = EegEmitter::new(vec![sample(0)], false, vec![]);
        let nirs = NirsEmitter::new(vec![]);
        let coordinator = PlaybackCoordinator::new(0, eeg, nirs, |_| {}, |_| {});
        coordinator.play();
        std::thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        coordinator.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn stalled_eeg_stream_trips_the_drift_monitor() {
        // No EEG samples ever arrive, so `last_eeg_us` stays pinned at the
        // start while the clock keeps advancing -- well past the 100ms
        // sync budget within this sleep.
        let eeg = EegEmitter::new(vec![], false, vec![]);
        let nirs = NirsEmitter::new(vec![]);
        let coordinator = PlaybackCoordinator::new(0, eeg, nirs, |_| {}, |_| {});
        coordinator.play();
        std::thread::sleep(Duration::from_millis(200));
        assert!(coordinator.drift_warning_count() > 0);
        assert!(coordinator.last_drift().is_some());
        coordinator.stop();
    }
}
