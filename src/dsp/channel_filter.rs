//! Live per-channel filter chain: Notch -> HPF -> LPF (§4.4)
//!
//! Each channel owns one `ChannelFilter`; chains are never shared across
//! channels or streams. Timestamps pass through untouched.

use crate::Quality;
use crate::constants::FilterKind;
use crate::dsp::biquad::Cascade;

pub struct ChannelFilter {
    notch: Cascade,
    hpf: Cascade,
    lpf: Cascade,
    warm_up_budget: u64,
    samples_since_reset: u64,
    last_ts_us: Option<i64>,
    gap_threshold_us: i64,
}

/// `(value_uv, quality, timestamp_us)`
pub type FilteredSample = (f64, Quality, i64);

impl ChannelFilter {
    pub fn new(
        notch: FilterKind,
        hpf: FilterKind,
        lpf: FilterKind,
        sample_rate_hz: f64,
        nominal_period_us: i64,
        gap_reset_periods: i64,
    ) -> Self {
        let slowest_cutoff = hpf.cutoff_hz().min(lpf.cutoff_hz()).min(notch.cutoff_hz());
        let warm_up_budget = (3.0 / slowest_cutoff * sample_rate_hz).ceil() as u64;

        Self {
            notch: Cascade::for_kind(notch),
            hpf: Cascade::for_kind(hpf),
            lpf: Cascade::for_kind(lpf),
            warm_up_budget,
            samples_since_reset: 0,
            last_ts_us: None,
            gap_threshold_us: nominal_period_us * gap_reset_periods,
        }
    }

    fn reset_state(&mut self) {
        self.notch.reset();
        self.hpf.reset();
        self.lpf.reset();
        self.samples_since_reset = 0;
    }

    /// Process one raw sample already converted to physical units.
    pub fn process_sample(&mut self, x_uv: f64, ts_us: i64) -> FilteredSample {
        let gapped = match self.last_ts_us {
            Some(last) => ts_us - last > self.gap_threshold_us,
            None => false,
        };
        if gapped {
            self.reset_state();
        }
        self.last_ts_us = Some(ts_us);

        let y = self.lpf.process(self.hpf.process(self.notch.process(x_uv)));
        self.samples_since_reset += 1;

        let mut quality = Quality::NORMAL;
        if self.samples_since_reset <= self.warm_up_budget {
            quality |= Quality::TRANSIENT;
        }
        if gapped {
            quality |= Quality::MISSING;
        }

        (y, quality, ts_us)
    }

    pub fn is_warm(&self) -> bool {
        self.samples_since_reset > self.warm_up_budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::eeg::{EEG_GAP_RESET_PERIODS, EEG_SAMPLE_PERIOD_US, EEG_SAMPLE_RATE_HZ};

    fn fresh() -> ChannelFilter {
        ChannelFilter::new(
            FilterKind::Notch50,
            FilterKind::Hpf05,
            FilterKind::Lpf70,
            EEG_SAMPLE_RATE_HZ,
            EEG_SAMPLE_PERIOD_US,
            EEG_GAP_RESET_PERIODS,
        )
    }

    #[test]
    fn flags_transient_during_warm_up_then_clears() {
        let mut filt = fresh();
        let mut ts = 0i64;
        let mut last_quality = Quality::NORMAL;
        for _ in 0..2000 {
            let (_, q, _) = filt.process_sample(1.0, ts);
            last_quality = q;
            ts += EEG_SAMPLE_PERIOD_US;
        }
        assert!(!last_quality.contains(Quality::TRANSIENT));
        assert!(filt.is_warm());
    }

    #[test]
    fn gap_resets_state_and_flags_missing() {
        let mut filt = fresh();
        filt.process_sample(1.0, 0);
        filt.process_sample(1.0, EEG_SAMPLE_PERIOD_US);

        let big_gap = EEG_SAMPLE_PERIOD_US * (EEG_GAP_RESET_PERIODS + 1);
        let (_, q, _) = filt.process_sample(1.0, big_gap);
        assert!(q.contains(Quality::MISSING));
        assert!(q.contains(Quality::TRANSIENT));
    }

    #[test]
    fn small_gap_does_not_reset() {
        let mut filt = fresh();
        filt.process_sample(1.0, 0);
        let small_gap = EEG_SAMPLE_PERIOD_US * (EEG_GAP_RESET_PERIODS - 1);
        let (_, q, _) = filt.process_sample(1.0, small_gap);
        assert!(!q.contains(Quality::MISSING));
    }
}
