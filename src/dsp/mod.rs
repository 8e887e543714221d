//! C4: DSP Core -- biquad cascades, live per-channel filtering, zero-phase
//! playback filtering.

pub mod biquad;
pub mod channel_filter;
pub mod filtfilt;

pub use biquad::{BiquadCoeffs, Cascade};
pub use channel_filter::{ChannelFilter, FilteredSample};
pub use filtfilt::{filtfilt, filtfilt_segmented, PlaybackSample};
