//! Neonatal bedside cerebral-function monitor signal path
//!
//! This crate ingests a 160 Hz four-channel EEG byte stream and a 1 Hz
//! NIRS ASCII stream, drives a deterministic DSP pipeline (live filters,
//! zero-phase playback filtering, aEEG + grey-scale trending), persists a
//! rolling multi-hour record, and replays it under a shared virtual clock.
//! Rendering, UI chrome, and video capture are external collaborators;
//! this crate specifies only the data contracts they consume.

pub mod acquisition;
pub mod aeeg;
pub mod audit;
pub mod buffer;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod device;
pub mod dsp;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod timeline;
pub mod ui;

pub use constants::Quality;
pub use protocol::{EegFrame, EegFrameParser, NirsFrameParser, NirsSample};
pub use timeline::{Clock, MonotonicClock};

/// Result type alias for this crate
pub type Result<T> = anyhow::Result<T>;

/// Error taxonomy for the signal path (§7 Error Handling Design)
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("transport error: {0}")]
    TransportError(String),

    #[error("frame error: bad header or length")]
    FrameError,

    #[error("frame checksum mismatch")]
    ChecksumError,

    #[error("malformed field in NIRS frame")]
    ParseError,

    #[error("timeline invariant violated: {0}")]
    TimelineError(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("subsystem intentionally offline: {0}")]
    SubsystemOffline(String),

    #[error("serial port error: {0}")]
    SerialError(#[from] serialport::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("storage index error: {0}")]
    SqlError(#[from] rusqlite::Error),
}
