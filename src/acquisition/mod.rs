//! C9 (acquisition half): wires the frame parsers (C2), ring/double
//! buffer (C3), live DSP + aEEG/GS engine (C4/C5), and storage batcher
//! (C6) together on the acquisition/DSP threads (§5).
//!
//! This module owns no I/O of its own -- it is fed raw bytes by whatever
//! opened the serial ports ([`crate::device`]) and in turn feeds the
//! storage writer's command channel. Kept free of UI/rendering concerns
//! so it can be driven directly from tests without a terminal or a
//! renderer.

pub mod eeg;
pub mod nirs;

pub use eeg::{EegSample, LiveEegPipeline, LiveEegSnapshot};
pub use nirs::LiveNirsPipeline;
