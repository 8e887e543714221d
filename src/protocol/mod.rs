//! Wire-format layer: EEG byte frames and NIRS ASCII lines

pub mod checksum;
pub mod eeg_frame;
pub mod nirs_frame;

pub use checksum::{crc16_ccitt, eeg_checksum};
pub use eeg_frame::{EegFrame, EegFrameParser};
pub use nirs_frame::{NirsCrcReject, NirsFrameParser, NirsSample};
