//! Frozen constants for the EEG/NIRS signal path.
//!
//! Every number in this module is a fixed point of the wire format, the
//! DSP pipeline, or the aEEG/GS engine. None of it is meant to be tuned
//! at runtime.

pub mod eeg;
pub mod filters;
pub mod nirs;
pub mod quality;

pub use eeg::{EEG_CHANNEL_COUNT, EEG_FRAME_LEN, EEG_HEADER, EEG_LSB_UV, EEG_SAMPLE_RATE_HZ};
pub use filters::FilterKind;
pub use nirs::{NIRS_CHANNEL_COUNT, NIRS_SAMPLE_RATE_HZ};
pub use quality::Quality;
