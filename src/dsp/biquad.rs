//! Second-order-section biquad cascades, Direct Form II Transposed (§4.4)
//!
//! Coefficients are frozen constant tables, not computed from a Butterworth
//! design routine at runtime -- the spec is explicit that recomputing them
//! would let numerical drift creep in across builds.

use crate::constants::FilterKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// One second-order section with its own Direct Form II Transposed state.
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    w1: f64,
    w2: f64,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self { coeffs, w1: 0.0, w2: 0.0 }
    }

    pub fn reset(&mut self) {
        self.w1 = 0.0;
        self.w2 = 0.0;
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.w1;
        self.w1 = c.b1 * x - c.a1 * y + self.w2;
        self.w2 = c.b2 * x - c.a2 * y;
        y
    }
}

/// A cascade of sections sharing no state with any other channel or
/// cascade; owned exclusively by the live DSP thread or a playback
/// emitter, never both at once.
#[derive(Debug, Clone)]
pub struct Cascade {
    sections: Vec<Biquad>,
}

impl Cascade {
    pub fn for_kind(kind: FilterKind) -> Self {
        Self {
            sections: sections_for(kind).iter().map(|c| Biquad::new(*c)).collect(),
        }
    }

    pub fn from_coeffs(coeffs: &[BiquadCoeffs]) -> Self {
        Self {
            sections: coeffs.iter().map(|c| Biquad::new(*c)).collect(),
        }
    }

    pub fn reset(&mut self) {
        for s in &mut self.sections {
            s.reset();
        }
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        self.sections.iter_mut().fold(x, |acc, s| s.process(acc))
    }

    pub fn pole_count(&self) -> usize {
        self.sections.len() * 2
    }
}

/// Frozen coefficient tables, one array of sections per cut-off choice.
/// Designed as standard RBJ-cookbook Butterworth-Q (1/sqrt(2)) sections at
/// fs = 160 Hz, precomputed offline.
pub fn sections_for(kind: FilterKind) -> &'static [BiquadCoeffs] {
    const NOTCH50: [BiquadCoeffs; 1] = [BiquadCoeffs {
        b0: 0.945409707583,
        b1: 0.723585263778,
        b2: 0.945409707583,
        a1: 0.723585263778,
        a2: 0.890819415166,
    }];
    const NOTCH60: [BiquadCoeffs; 1] = [BiquadCoeffs {
        b0: 0.957676287675,
        b1: 1.35435879439,
        b2: 0.957676287675,
        a1: 1.35435879439,
        a2: 0.91535257535,
    }];
    const HPF03: [BiquadCoeffs; 1] = [BiquadCoeffs {
        b0: 0.991704195577,
        b1: -1.98340839115,
        b2: 0.991704195577,
        a1: -1.9833395696,
        a2: 0.98347721271,
    }];
    const HPF05: [BiquadCoeffs; 1] = [BiquadCoeffs {
        b0: 0.986211924627,
        b1: -1.97242384925,
        b2: 0.986211924627,
        a1: -1.9722337292,
        a2: 0.972613969313,
    }];
    const HPF15: [BiquadCoeffs; 1] = [BiquadCoeffs {
        b0: 0.959203149638,
        b1: -1.91840629928,
        b2: 0.959203149638,
        a1: -1.91674122316,
        a2: 0.920071375396,
    }];
    const LPF15: [BiquadCoeffs; 1] = [BiquadCoeffs {
        b0: 0.0604985076309,
        b1: 0.120997015262,
        b2: 0.0604985076309,
        a1: -1.19391336772,
        a2: 0.435907398244,
    }];
    const LPF35: [BiquadCoeffs; 1] = [BiquadCoeffs {
        b0: 0.237643994385,
        b1: 0.47528798877,
        b2: 0.237643994385,
        a1: -0.230396252687,
        a2: 0.180972230228,
    }];
    const LPF50: [BiquadCoeffs; 1] = [BiquadCoeffs {
        b0: 0.418163345762,
        b1: 0.836326691524,
        b2: 0.418163345762,
        a1: 0.462938025291,
        a2: 0.209715357757,
    }];
    const LPF70: [BiquadCoeffs; 1] = [BiquadCoeffs {
        b0: 0.757076375334,
        b1: 1.51415275067,
        b2: 0.757076375334,
        a1: 1.45424358625,
        a2: 0.574061915084,
    }];
    const AEEG_HPF2: [BiquadCoeffs; 1] = [BiquadCoeffs {
        b0: 0.945976856003,
        b1: -1.89195371201,
        b2: 0.945976856003,
        a1: -1.88903307939,
        a2: 0.894874344617,
    }];
    // 4th order: the same 15 Hz section cascaded twice.
    const AEEG_LPF15: [BiquadCoeffs; 2] = [
        BiquadCoeffs {
            b0: 0.0604985076309,
            b1: 0.120997015262,
            b2: 0.0604985076309,
            a1: -1.19391336772,
            a2: 0.435907398244,
        },
        BiquadCoeffs {
            b0: 0.0604985076309,
            b1: 0.120997015262,
            b2: 0.0604985076309,
            a1: -1.19391336772,
            a2: 0.435907398244,
        },
    ];

    match kind {
        FilterKind::Notch50 => &NOTCH50,
        FilterKind::Notch60 => &NOTCH60,
        FilterKind::Hpf03 => &HPF03,
        FilterKind::Hpf05 => &HPF05,
        FilterKind::Hpf15 => &HPF15,
        FilterKind::Lpf15 => &LPF15,
        FilterKind::Lpf35 => &LPF35,
        FilterKind::Lpf50 => &LPF50,
        FilterKind::Lpf70 => &LPF70,
        FilterKind::AeegHpf2 => &AEEG_HPF2,
        FilterKind::AeegLpf15 => &AEEG_LPF15,
    }
}
