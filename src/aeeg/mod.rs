//! C5: aEEG & GS Engine
//!
//! Per channel: band-pass -> rectify -> 0.5s peak-hold -> 15s moving
//! average -> 1 Hz min/max emission, centre-timestamped on the output
//! window (§4.5).

pub mod histogram;

pub use histogram::{GsFrame, GsHistogram};

use crate::Quality;
use crate::constants::FilterKind;
use crate::dsp::biquad::{Cascade, sections_for};
use std::collections::VecDeque;

const PEAK_WINDOW_SAMPLES: usize = 80; // 0.5s @ 160Hz
const SMOOTHING_WINDOW_PEAKS: usize = 30; // 15s @ 2 peaks/s
const WARM_UP_SAMPLES: u64 = 15 * 160; // 15s @ 160Hz

/// One emitted aEEG output: amplitude envelope bounds over a 1s window,
/// centre-timestamped, plus whether it has cleared the 15s warm-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AeegOutput {
    pub min_uv: f64,
    pub max_uv: f64,
    pub center_ts_us: i64,
    pub valid: bool,
    pub quality: Quality,
}

pub struct AeegChannel {
    band_pass: Cascade,
    samples_processed: u64,
    peak_accum_max: f64,
    peak_count: usize,
    peak_quality: Quality,
    smoothed_window: VecDeque<f64>,
    emit_window: Vec<f64>,
    emit_quality: Quality,
    window_start_ts_us: Option<i64>,
}

impl AeegChannel {
    pub fn new() -> Self {
        let mut sections = sections_for(FilterKind::AeegHpf2).to_vec();
        sections.extend_from_slice(sections_for(FilterKind::AeegLpf15));
        Self {
            band_pass: Cascade::from_coeffs(&sections),
            samples_processed: 0,
            peak_accum_max: 0.0,
            peak_count: 0,
            peak_quality: Quality::NORMAL,
            smoothed_window: VecDeque::with_capacity(SMOOTHING_WINDOW_PEAKS),
            emit_window: Vec::with_capacity(2),
            emit_quality: Quality::NORMAL,
            window_start_ts_us: None,
        }
    }

    /// Feed one raw filtered sample (already scaled to microvolts).
    /// Returns `Some` on the 1 Hz boundary when a new output is ready.
    pub fn process_sample(&mut self, x_uv: f64, ts_us: i64, quality: Quality) -> Option<AeegOutput> {
        if self.window_start_ts_us.is_none() {
            self.window_start_ts_us = Some(ts_us);
        }

        let y = self.band_pass.process(x_uv);
        let rectified = y.abs();
        self.samples_processed += 1;
        self.peak_accum_max = self.peak_accum_max.max(rectified);
        self.peak_quality |= quality;
        self.peak_count += 1;

        if self.peak_count < PEAK_WINDOW_SAMPLES {
            return None;
        }

        // one 0.5s peak is ready
        if self.smoothed_window.len() == SMOOTHING_WINDOW_PEAKS {
            self.smoothed_window.pop_front();
        }
        self.smoothed_window.push_back(self.peak_accum_max);
        let smoothed: f64 =
            self.smoothed_window.iter().sum::<f64>() / self.smoothed_window.len() as f64;

        self.peak_accum_max = 0.0;
        self.peak_count = 0;

        self.emit_window.push(smoothed);
        self.emit_quality |= self.peak_quality;
        self.peak_quality = Quality::NORMAL;

        if self.emit_window.len() < 2 {
            return None;
        }

        let min_uv = self.emit_window.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_uv = self.emit_window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let start = self.window_start_ts_us.take().unwrap();
        let center_ts_us = start + 500_000;
        let valid = self.samples_processed >= WARM_UP_SAMPLES;
        let quality = self.emit_quality;

        self.emit_window.clear();
        self.emit_quality = Quality::NORMAL;

        Some(AeegOutput { min_uv, max_uv, center_ts_us, valid, quality })
    }
}

impl Default for AeegChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::eeg::EEG_SAMPLE_PERIOD_US;

    #[test]
    fn emits_once_per_second() {
        let mut chan = AeegChannel::new();
        let mut ts = 0i64;
        let mut emits = 0;
        // 160 samples/s * 20s
        for _ in 0..(160 * 20) {
            if chan
                .process_sample(1.0, ts, Quality::NORMAL)
                .is_some()
            {
                emits += 1;
            }
            ts += EEG_SAMPLE_PERIOD_US;
        }
        assert_eq!(emits, 20);
    }

    #[test]
    fn first_output_is_centered_on_first_second() {
        let mut chan = AeegChannel::new();
        let mut ts = 0i64;
        let mut first = None;
        for _ in 0..160 {
            if let Some(out) = chan.process_sample(1.0, ts, Quality::NORMAL) {
                first = Some(out);
                break;
            }
            ts += EEG_SAMPLE_PERIOD_US;
        }
        let out = first.unwrap();
        assert_eq!(out.center_ts_us, 500_000);
    }

    #[test]
    fn invalid_until_warm_up_clears() {
        let mut chan = AeegChannel::new();
        let mut ts = 0i64;
        let mut outputs = Vec::new();
        for _ in 0..(160 * 20) {
            if let Some(out) = chan.process_sample(1.0, ts, Quality::NORMAL) {
                outputs.push(out);
            }
            ts += EEG_SAMPLE_PERIOD_US;
        }
        assert!(!outputs[0].valid);
        assert!(outputs.last().unwrap().valid);
    }
}
