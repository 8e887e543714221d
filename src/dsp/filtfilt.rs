//! Zero-phase (`filtfilt`) filtering for playback (§4.4)
//!
//! Forward pass with fresh state, reverse the buffer, forward pass again
//! with fresh state, reverse back. Zero group delay, at the cost of
//! needing the whole segment up front. Warm-up quality is never set on
//! this path; `Missing` samples are passed through unfiltered and segment
//! boundaries reset filter state so one gap can't bleed into the next
//! segment.

use crate::Quality;
use crate::constants::FilterKind;
use crate::dsp::biquad::Cascade;

fn run_cascade(cascades: &mut [Cascade], input: &[f64]) -> Vec<f64> {
    for c in cascades.iter_mut() {
        c.reset();
    }
    input
        .iter()
        .map(|&x| cascades.iter_mut().fold(x, |acc, c| c.process(acc)))
        .collect()
}

/// Zero-phase filter a single contiguous segment through the given cascade
/// of named cut-offs.
pub fn filtfilt(samples: &[f64], kinds: &[FilterKind]) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mut cascades: Vec<Cascade> = kinds.iter().map(|k| Cascade::for_kind(*k)).collect();

    let forward = run_cascade(&mut cascades, samples);
    let reversed: Vec<f64> = forward.iter().rev().copied().collect();
    let mut backward = run_cascade(&mut cascades, &reversed);
    backward.reverse();
    backward
}

/// One playback sample: value, quality, sample-centre timestamp.
pub type PlaybackSample = (f64, Quality, i64);

/// Apply `filtfilt` to every contiguous run of non-`Missing` samples in
/// `samples`, leaving `Missing` samples untouched. Returned quality never
/// carries `Transient`.
pub fn filtfilt_segmented(samples: &[PlaybackSample], kinds: &[FilterKind]) -> Vec<PlaybackSample> {
    let mut out = Vec::with_capacity(samples.len());
    let mut i = 0;
    while i < samples.len() {
        if samples[i].1.contains(Quality::MISSING) {
            out.push(samples[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < samples.len() && !samples[i].1.contains(Quality::MISSING) {
            i += 1;
        }
        let segment = &samples[start..i];
        let values: Vec<f64> = segment.iter().map(|s| s.0).collect();
        let filtered = filtfilt(&values, kinds);
        for (j, y) in filtered.into_iter().enumerate() {
            let mut q = segment[j].1;
            q = Quality(q.0 & !Quality::TRANSIENT.0);
            out.push((y, q, segment[j].2));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_phase_symmetry_on_clean_segment() {
        let samples: Vec<f64> = (0..500).map(|i| (i as f64 * 0.1).sin()).collect();
        let kinds = [FilterKind::Lpf35];

        let forward = filtfilt(&samples, &kinds);

        // filtering the reverse of the reverse must reproduce the same
        // output within floating point tolerance: reverse(reverse(x)) = x
        let twice_reversed: Vec<f64> = samples.iter().rev().rev().copied().collect();
        let forward_again = filtfilt(&twice_reversed, &kinds);

        for (a, b) in forward.iter().zip(forward_again.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn missing_samples_pass_through_untouched() {
        let samples = vec![
            (1.0, Quality::NORMAL, 0),
            (2.0, Quality::NORMAL, 1000),
            (f64::NAN, Quality::MISSING, 2000),
            (3.0, Quality::NORMAL, 3000),
        ];
        let out = filtfilt_segmented(&samples, &[FilterKind::Lpf35]);
        assert_eq!(out.len(), 4);
        assert!(out[2].1.contains(Quality::MISSING));
        assert!(out[2].0.is_nan());
    }

    #[test]
    fn output_never_carries_transient() {
        let samples: Vec<PlaybackSample> = (0..200)
            .map(|i| (1.0, Quality::TRANSIENT, i * 1000))
            .collect();
        let out = filtfilt_segmented(&samples, &[FilterKind::Hpf05]);
        assert!(out.iter().all(|s| !s.1.contains(Quality::TRANSIENT)));
    }
}
