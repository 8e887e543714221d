//! Named filter cut-offs used by the live and playback DSP chains (§4.4)

use serde::{Deserialize, Serialize};

/// A single named cut-off choice. Each maps to a fixed coefficient table in
/// [`crate::dsp::biquad`] -- never to a runtime Butterworth design call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    Notch50,
    Notch60,
    Hpf03,
    Hpf05,
    Hpf15,
    Lpf15,
    Lpf35,
    Lpf50,
    Lpf70,
    AeegHpf2,
    AeegLpf15,
}

impl FilterKind {
    /// Nominal cut-off frequency in Hz, used only for warm-up budget math.
    pub fn cutoff_hz(self) -> f64 {
        match self {
            FilterKind::Notch50 => 50.0,
            FilterKind::Notch60 => 60.0,
            FilterKind::Hpf03 => 0.3,
            FilterKind::Hpf05 => 0.5,
            FilterKind::Hpf15 => 1.5,
            FilterKind::Lpf15 => 15.0,
            FilterKind::Lpf35 => 35.0,
            FilterKind::Lpf50 => 50.0,
            FilterKind::Lpf70 => 70.0,
            FilterKind::AeegHpf2 => 2.0,
            FilterKind::AeegLpf15 => 15.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::Notch50 => "NOTCH_50",
            FilterKind::Notch60 => "NOTCH_60",
            FilterKind::Hpf03 => "HPF_0_3",
            FilterKind::Hpf05 => "HPF_0_5",
            FilterKind::Hpf15 => "HPF_1_5",
            FilterKind::Lpf15 => "LPF_15",
            FilterKind::Lpf35 => "LPF_35",
            FilterKind::Lpf50 => "LPF_50",
            FilterKind::Lpf70 => "LPF_70",
            FilterKind::AeegHpf2 => "AEEG_HPF_2",
            FilterKind::AeegLpf15 => "AEEG_LPF_15",
        }
    }
}
