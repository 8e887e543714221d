//! NIRS wire-format constants (§4.2, §6)

/// Channels in the NIRS sample shape; only the first four are populated by
/// the device, the remaining two stay `None`/`LeadOff` forever.
pub const NIRS_CHANNEL_COUNT: usize = 6;

/// Channels the device actually reports
pub const NIRS_DEVICE_CHANNEL_COUNT: usize = 4;

/// Nominal sample rate of the NIRS link
pub const NIRS_SAMPLE_RATE_HZ: f64 = 1.0;

/// Baud rate for the NIRS serial link, no flow control
pub const NIRS_BAUD_RATE: u32 = 57_600;

/// A gap this long without a new line triggers a FrameDrop / Missing marker
pub const NIRS_FRAME_GAP_US: i64 = 1_500_000;

/// Literal used by the device for an absent numeric field
pub const NIRS_MISSING_TOKEN: &str = "---";

/// Literal used by the device for a disabled limit/alarm field
pub const NIRS_OFF_TOKEN: &str = "OFF";

/// Trailer field name carrying the CRC
pub const NIRS_CKSUM_FIELD: &str = "CKSUM=";
