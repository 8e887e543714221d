//! EEG wire-format constants (§4.2, §6 of the signal-path specification)

/// Two-byte frame header: `0xAA 0x55`
pub const EEG_HEADER: [u8; 2] = [0xAA, 0x55];

/// Total frame length: 2 header + 36 payload + 2 checksum
pub const EEG_FRAME_LEN: usize = 40;

/// Number of 16-bit big-endian words in the payload
pub const EEG_PAYLOAD_WORDS: usize = 18;

/// Device-reported channels (CH4 is derived as CH1 - CH2)
pub const EEG_CHANNEL_COUNT: usize = 4;

/// Nominal sample rate of the EEG link
pub const EEG_SAMPLE_RATE_HZ: f64 = 160.0;

/// ADC scaling factor, microvolts per least-significant bit
pub const EEG_LSB_UV: f64 = 0.076;

/// Index (within the 18-word payload) of the GS flush counter
pub const EEG_GS_COUNTER_WORD: usize = 16;

/// Index of the configuration/status word
pub const EEG_CONFIG_WORD: usize = 9;

/// Inter-sample period in microseconds at the nominal rate
pub const EEG_SAMPLE_PERIOD_US: i64 = (1_000_000.0 / EEG_SAMPLE_RATE_HZ) as i64;

/// A gap exceeding this many nominal periods resets filter state (§4.4)
pub const EEG_GAP_RESET_PERIODS: i64 = 4;

/// Baud rate and framing for the EEG serial link (§4.2)
pub const EEG_BAUD_RATE: u32 = 115_200;
