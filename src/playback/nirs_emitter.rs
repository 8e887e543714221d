//! NIRS playback emitter (§4.8)
//!
//! Simpler than its EEG counterpart: the NIRS link carries no live DSP
//! chain, so playback just replays the recorded samples against the
//! virtual clock with no `filtfilt` pass.

use crate::protocol::NirsSample;

pub struct NirsEmitter {
    samples: Vec<NirsSample>,
    emit_idx: usize,
    last_emitted_us: Option<i64>,
}

impl NirsEmitter {
    pub fn new(samples: Vec<NirsSample>) -> Self {
        Self { samples, emit_idx: 0, last_emitted_us: None }
    }

    pub fn seek_to(&mut self, us: i64) {
        self.emit_idx = self.samples.partition_point(|s| s.ts_us < us);
        self.last_emitted_us = None;
    }

    pub fn tick(&mut self, now_us: i64) -> Vec<NirsSample> {
        let mut out = Vec::new();
        while let Some(sample) = self.samples.get(self.emit_idx) {
            if sample.ts_us > now_us {
                break;
            }
            let sample = sample.clone();
            self.emit_idx += 1;
            if let Some(last) = self.last_emitted_us
                && sample.ts_us <= last
            {
                continue;
            }
            self.last_emitted_us = Some(sample.ts_us);
            out.push(sample);
        }
        out
    }

    pub fn is_exhausted(&self) -> bool {
        self.emit_idx >= self.samples.len()
    }
}
