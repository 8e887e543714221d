//! Collaborator data contracts (§6)
//!
//! Rendering, UI chrome, and video capture are external collaborators;
//! this crate does not implement them. It only defines the snapshot types
//! and trait boundaries they consume, so the signal path can be built and
//! tested without a renderer or a video deck ever existing.

use serde::{Deserialize, Serialize};

/// What the renderer consumes at up to 60 Hz. Valid for one frame only --
/// it carries borrowed slices, never a back-pointer into internal state,
/// so a renderer cannot accidentally outlive the buffer it was drawn from.
pub struct RenderSnapshot<'a> {
    pub channels: &'a [&'a [f64]],
    pub quality: &'a [&'a [u8]],
    pub start_us: i64,
    pub interval_us: i64,
    pub viewport: Viewport,
    pub dpi: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width_px: u32,
    pub height_px: u32,
}

/// Commands the UI/CLI collaborator may invoke against the integration
/// shell; each one issues an audit record (§4.7, §6).
pub trait MonitorCommands {
    fn start_session(&self, patient_id: &str) -> crate::Result<i64>;
    fn stop_session(&self, session_id: i64) -> crate::Result<()>;
    fn seek_to(&self, us: i64) -> crate::Result<()>;
    fn set_rate(&self, rate: f64) -> crate::Result<()>;
    fn change_filter(&self, channel: usize, old: &str, new: &str) -> crate::Result<()>;
    fn change_gain(&self, channel: usize, old_gain: f64, new_gain: f64) -> crate::Result<()>;
}

/// Video capture collaborator contract: seek to a presentation timestamp
/// and be told when a frame is ready. Synchronisation budget is ±100 ms,
/// the same tolerance the playback drift monitor uses against EEG (§4.8).
pub trait VideoCollaborator {
    /// Seek to the nearest frame at or before `ts_us`. Returns `false` if
    /// the requested timestamp lies outside the recorded range.
    fn seek_to_ts(&mut self, ts_us: i64) -> bool;

    /// Register a callback invoked once per decoded frame with its
    /// presentation timestamp.
    fn on_frame_ready(&mut self, callback: Box<dyn FnMut(i64) + Send>);
}

/// Fixed synchronisation budget shared by the playback drift monitor and
/// video collaborator handshake (§4.8, §6).
pub const SYNC_BUDGET_US: i64 = 100_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_snapshot_borrows_do_not_outlive_their_source() {
        let data = vec![vec![1.0, 2.0, 3.0]];
        let quality = vec![vec![0u8, 0u8, 0u8]];
        let channel_refs: Vec<&[f64]> = data.iter().map(|v| v.as_slice()).collect();
        let quality_refs: Vec<&[u8]> = quality.iter().map(|v| v.as_slice()).collect();

        let snapshot = RenderSnapshot {
            channels: &channel_refs,
            quality: &quality_refs,
            start_us: 0,
            interval_us: 1000,
            viewport: Viewport { width_px: 800, height_px: 480 },
            dpi: 96.0,
        };
        assert_eq!(snapshot.channels[0].len(), 3);
    }
}
