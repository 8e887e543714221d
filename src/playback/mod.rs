//! C8: Playback Coordinator
//!
//! Replays a recorded session under a shared virtual clock
//! ([`crate::timeline::PlaybackClock`]), independent of the acquisition
//! threads that were live when the data was captured. Emitters bulk-load
//! their stream once at `play()` time and fire samples forward as the
//! clock advances past them (§4.8).

pub mod coordinator;
pub mod eeg_emitter;
pub mod loader;
pub mod nirs_emitter;

pub use coordinator::{PlaybackCoordinator, SyncDrift};
pub use eeg_emitter::EegEmitter;
pub use loader::{load_eeg_session, load_nirs_session};
pub use nirs_emitter::NirsEmitter;
