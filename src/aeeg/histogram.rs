//! 230-bin grey-scale (GS) amplitude histogram (§4.5)
//!
//! Bin layout is frozen: 0-99 linear over [0,10) uV, 100-229 logarithmic
//! over [10,200] uV. Flush/reset semantics are driven entirely by the
//! device's own counter byte, never by a local timer.

use crate::Quality;

pub const GS_BIN_COUNT: usize = 230;
const GS_BIN_SATURATION: u8 = 249;

/// The device counter value meaning "emit and reset the current frame".
pub const GS_FLUSH_COUNTER: u8 = 229;
/// The device counter value meaning "ignore this sample entirely".
pub const GS_IGNORE_COUNTER: u8 = 255;

#[derive(Debug, Clone)]
pub struct GsFrame {
    pub bins: [u8; GS_BIN_COUNT],
    pub start_us: i64,
    pub end_us: i64,
    pub quality: Quality,
}

/// Map a rectified amplitude in microvolts to its histogram bin.
/// Returns `None` for negative amplitudes (malformed input).
pub fn bin_of(u_uv: f64) -> Option<usize> {
    if u_uv < 0.0 {
        None
    } else if u_uv < 10.0 {
        Some(((u_uv * 10.0).floor() as usize).min(99))
    } else if u_uv < 200.0 {
        let frac = (u_uv.log10() - 1.0) / (200f64.log10() - 1.0);
        let bin = 100 + (frac * 130.0).floor() as usize;
        Some(bin.min(229))
    } else {
        Some(229)
    }
}

pub struct GsHistogram {
    bins: [u8; GS_BIN_COUNT],
    start_us: Option<i64>,
    quality: Quality,
}

impl GsHistogram {
    pub fn new() -> Self {
        Self {
            bins: [0; GS_BIN_COUNT],
            start_us: None,
            quality: Quality::NORMAL,
        }
    }

    fn bump(&mut self, u_uv: f64) {
        if let Some(bin) = bin_of(u_uv)
            && self.bins[bin] < GS_BIN_SATURATION
        {
            self.bins[bin] += 1;
        }
    }

    /// Feed one aEEG `(min, max)` output pair plus the device's flush
    /// counter for the frame it arrived in. Returns a flushed frame only
    /// when `counter == 229`.
    pub fn accept_pair(
        &mut self,
        min_uv: f64,
        max_uv: f64,
        ts_us: i64,
        quality: Quality,
        counter: u8,
    ) -> Option<GsFrame> {
        if counter == GS_IGNORE_COUNTER {
            return None;
        }

        if self.start_us.is_none() {
            self.start_us = Some(ts_us);
        }

        if quality.contains(Quality::MISSING) {
            self.quality |= quality;
        } else {
            self.bump(min_uv);
            self.bump(max_uv);
            self.quality |= quality;
        }

        if counter == GS_FLUSH_COUNTER {
            let frame = GsFrame {
                bins: self.bins,
                start_us: self.start_us.unwrap_or(ts_us),
                end_us: ts_us,
                quality: self.quality,
            };
            self.bins = [0; GS_BIN_COUNT];
            self.start_us = None;
            self.quality = Quality::NORMAL;
            return Some(frame);
        }

        None
    }
}

impl Default for GsHistogram {
    fn default() -> Self {
        Self::new()
    }
}
