//! EEG playback emitter (§4.8)
//!
//! Holds the whole session's EEG samples in memory once `play()` is
//! first called. When zero-phase filtering is enabled the samples are
//! run through `filtfilt` once into a private pre-filtered buffer;
//! thereafter every tick just walks a cursor forward against the shared
//! virtual clock.

use crate::Quality;
use crate::acquisition::eeg::EegSample;
use crate::constants::FilterKind;
use crate::constants::eeg::EEG_CHANNEL_COUNT;
use crate::dsp::filtfilt::{PlaybackSample, filtfilt_segmented};

/// A gap with no source sample longer than this synthesises one
/// `Missing`/NaN marker rather than leaving the consumer silent (§4.8).
const GAP_SYNTH_THRESHOLD_US: i64 = 25_000;

pub struct EegEmitter {
    raw: Vec<EegSample>,
    prefiltered: Option<Vec<EegSample>>,
    filter_kinds: Vec<FilterKind>,
    filtfilt_enabled: bool,
    emit_idx: usize,
    last_emitted_us: Option<i64>,
}

impl EegEmitter {
    pub fn new(raw: Vec<EegSample>, filtfilt_enabled: bool, filter_kinds: Vec<FilterKind>) -> Self {
        Self {
            raw,
            prefiltered: None,
            filter_kinds,
            filtfilt_enabled,
            emit_idx: 0,
            last_emitted_us: None,
        }
    }

    fn source(&self) -> &[EegSample] {
        self.prefiltered.as_deref().unwrap_or(&self.raw)
    }

    /// Runs the one-shot zero-phase pass if enabled and not already done.
    /// Called from `play()`; idempotent on replay of the same session.
    pub fn prepare(&mut self) {
        if self.filtfilt_enabled && self.prefiltered.is_none() {
            self.prefiltered = Some(apply_filtfilt(&self.raw, &self.filter_kinds));
        }
    }

    /// Resets the emission cursor to the first sample at or after `us`
    /// (§4.8 `seek_to`). The gap-synthesis clock restarts from scratch.
    pub fn seek_to(&mut self, us: i64) {
        let source = self.source();
        self.emit_idx = source.partition_point(|s| s.ts_us < us);
        self.last_emitted_us = None;
    }

    /// Returns every sample whose timestamp has newly fallen at or before
    /// `now_us`, synthesising a single `Missing` marker if the gap since
    /// the last emission exceeds the threshold and nothing new arrived.
    pub fn tick(&mut self, now_us: i64) -> Vec<EegSample> {
        let mut out = Vec::new();
        loop {
            let Some(sample) = self.source().get(self.emit_idx).copied() else { break };
            if sample.ts_us > now_us {
                break;
            }
            self.emit_idx += 1;
            if let Some(last) = self.last_emitted_us
                && sample.ts_us <= last
            {
                continue;
            }
            self.last_emitted_us = Some(sample.ts_us);
            out.push(sample);
        }

        if out.is_empty()
            && let Some(last) = self.last_emitted_us
            && now_us - last > GAP_SYNTH_THRESHOLD_US
        {
            let missing = EegSample {
                ts_us: now_us,
                channels: [f64::NAN; EEG_CHANNEL_COUNT],
                quality: Quality::MISSING,
            };
            self.last_emitted_us = Some(now_us);
            out.push(missing);
        }

        out
    }

    pub fn is_exhausted(&self) -> bool {
        self.emit_idx >= self.source().len()
    }
}

fn apply_filtfilt(raw: &[EegSample], kinds: &[FilterKind]) -> Vec<EegSample> {
    if raw.is_empty() {
        return Vec::new();
    }

    let mut per_channel: [Vec<PlaybackSample>; EEG_CHANNEL_COUNT] = Default::default();
    for s in raw {
        for ch in 0..EEG_CHANNEL_COUNT {
            per_channel[ch].push((s.channels[ch], s.quality, s.ts_us));
        }
    }

    let filtered: Vec<Vec<PlaybackSample>> = per_channel
        .iter()
        .map(|channel| filtfilt_segmented(channel, kinds))
        .collect();

    (0..raw.len())
        .map(|i| {
            let mut channels = [0.0; EEG_CHANNEL_COUNT];
            let mut quality = Quality::NORMAL;
            for ch in 0..EEG_CHANNEL_COUNT {
                channels[ch] = filtered[ch][i].0;
                quality |= filtered[ch][i].1;
            }
            EegSample { ts_us: filtered[0][i].2, channels, quality }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts_us: i64, v: f64) -> EegSample {
        EegSample { ts_us, channels: [v; EEG_CHANNEL_COUNT], quality: Quality::NORMAL }
    }

    #[test]
    fn emits_samples_up_to_the_clock_position() {
        let raw = vec![sample(0, 1.0), sample(1000, 2.0), sample(2000, 3.0)];
        let mut emitter = EegEmitter::new(raw, false, vec![]);
        let out = emitter.tick(1500);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].ts_us, 1000);
    }

    #[test]
    fn does_not_re_emit_already_emitted_samples() {
        let raw = vec![sample(0, 1.0), sample(1000, 2.0)];
        let mut emitter = EegEmitter::new(raw, false, vec![]);
        emitter.tick(1000);
        let out = emitter.tick(2000);
        assert!(out.is_empty());
    }

    #[test]
    fn synthesises_a_missing_marker_over_a_long_gap() {
        let raw = vec![sample(0, 1.0)];
        let mut emitter = EegEmitter::new(raw, false, vec![]);
        emitter.tick(0);
        let out = emitter.tick(GAP_SYNTH_THRESHOLD_US + 1);
        assert_eq!(out.len(), 1);
        assert!(out[0].quality.contains(Quality::MISSING));
        assert!(out[0].channels[0].is_nan());
    }

    #[test]
    fn seek_resets_the_cursor() {
        let raw = vec![sample(0, 1.0), sample(1000, 2.0), sample(2000, 3.0)];
        let mut emitter = EegEmitter::new(raw, false, vec![]);
        emitter.tick(500);
        emitter.seek_to(2000);
        let out = emitter.tick(2000);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ts_us, 2000);
    }

    #[test]
    fn prefilters_once_and_reuses_the_buffer() {
        let raw: Vec<EegSample> = (0..500).map(|i| sample(i * 6_250, (i as f64).sin())).collect();
        let mut emitter = EegEmitter::new(raw, true, vec![FilterKind::Lpf35]);
        emitter.prepare();
        assert!(emitter.prefiltered.is_some());
        let len_before = emitter.prefiltered.as_ref().unwrap().len();
        emitter.prepare();
        assert_eq!(emitter.prefiltered.as_ref().unwrap().len(), len_before);
    }
}
