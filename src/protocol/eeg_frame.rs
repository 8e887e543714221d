//! Fixed 40-byte EEG frame parser (§4.2, §6)

use crate::MonitorError;
use crate::constants::eeg::{EEG_FRAME_LEN, EEG_GS_COUNTER_WORD, EEG_HEADER, EEG_LSB_UV};
use log::{debug, trace, warn};

/// A fully parsed and checksum-validated EEG frame.
///
/// `ts_us` is the host monotonic timestamp read at the moment the final
/// byte of the frame was accepted; it is not a sample-centre timestamp by
/// itself, that adjustment happens when the frame is split into samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EegFrame {
    pub words: [i16; 18],
    pub ts_us: i64,
}

impl EegFrame {
    /// Raw channel 1 in microvolts
    pub fn ch1_uv(&self) -> f64 {
        self.words[0] as f64 * EEG_LSB_UV
    }

    pub fn ch2_uv(&self) -> f64 {
        self.words[1] as f64 * EEG_LSB_UV
    }

    pub fn ch3_uv(&self) -> f64 {
        self.words[2] as f64 * EEG_LSB_UV
    }

    /// CH4 is not transmitted; it is derived downstream as CH1 - CH2.
    pub fn ch4_uv(&self) -> f64 {
        self.ch1_uv() - self.ch2_uv()
    }

    /// GS histogram flush counter (0..=228 accumulate, 229 flush, 255 ignore)
    pub fn gs_counter(&self) -> u8 {
        (self.words[EEG_GS_COUNTER_WORD] & 0xFF) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    /// Waiting for the first header byte (0xAA)
    Sync0,
    /// Saw 0xAA, waiting for 0x55
    Sync1,
    /// Collecting payload + checksum bytes after a valid header
    Collecting,
}

/// Byte-level state machine turning a raw serial stream into `EegFrame`s.
#[derive(Debug)]
pub struct EegFrameParser {
    state: ParserState,
    buffer: Vec<u8>,
    /// Raw bytes of the most recently checksum-rejected frame, held until a
    /// caller drains it for a `CRC_ERROR` audit event (§4.7, §7).
    last_crc_error: Option<Vec<u8>>,
}

impl EegFrameParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Sync0,
            buffer: Vec::with_capacity(EEG_FRAME_LEN),
            last_crc_error: None,
        }
    }

    pub fn reset(&mut self) {
        self.state = ParserState::Sync0;
        self.buffer.clear();
    }

    /// Takes the offending bytes of the most recent checksum rejection, if
    /// any, for the caller to fold into a `CRC_ERROR` audit event.
    pub fn take_last_crc_error(&mut self) -> Option<Vec<u8>> {
        self.last_crc_error.take()
    }

    /// Feed one byte. `ts_us` should be the caller's monotonic clock read
    /// at the moment this byte was received; it is only used if this byte
    /// completes a frame.
    pub fn process_byte(
        &mut self,
        byte: u8,
        ts_us: i64,
    ) -> Result<Option<EegFrame>, MonitorError> {
        match self.state {
            ParserState::Sync0 => {
                if byte == EEG_HEADER[0] {
                    self.buffer.clear();
                    self.buffer.push(byte);
                    self.state = ParserState::Sync1;
                }
                Ok(None)
            }
            ParserState::Sync1 => {
                if byte == EEG_HEADER[1] {
                    self.buffer.push(byte);
                    self.state = ParserState::Collecting;
                } else if byte == EEG_HEADER[0] {
                    self.buffer.clear();
                    self.buffer.push(byte);
                    // stay in Sync1, looking for the second header byte
                } else {
                    self.state = ParserState::Sync0;
                }
                Ok(None)
            }
            ParserState::Collecting => {
                self.buffer.push(byte);
                trace!("EEG collecting byte {}/{}", self.buffer.len(), EEG_FRAME_LEN);
                if self.buffer.len() == EEG_FRAME_LEN {
                    return self.finalize(ts_us);
                }
                Ok(None)
            }
        }
    }

    pub fn process_bytes(
        &mut self,
        bytes: &[u8],
        ts_us: i64,
    ) -> Result<Vec<EegFrame>, MonitorError> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if let Some(frame) = self.process_byte(byte, ts_us)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    fn finalize(&mut self, ts_us: i64) -> Result<Option<EegFrame>, MonitorError> {
        debug_assert_eq!(self.buffer.len(), EEG_FRAME_LEN);

        let checked_len = EEG_FRAME_LEN - 2;
        let expected = u16::from_be_bytes([
            self.buffer[EEG_FRAME_LEN - 2],
            self.buffer[EEG_FRAME_LEN - 1],
        ]);

        if !super::checksum::validate_eeg_checksum(&self.buffer[..checked_len], expected) {
            warn!("EEG frame checksum mismatch, resyncing");
            self.last_crc_error = Some(self.buffer.clone());
            self.state = ParserState::Sync0;
            self.buffer.clear();
            return Err(MonitorError::ChecksumError);
        }

        let mut words = [0i16; 18];
        for (i, word) in words.iter_mut().enumerate() {
            let offset = 2 + i * 2;
            *word = i16::from_be_bytes([self.buffer[offset], self.buffer[offset + 1]]);
        }

        debug!("EEG frame parsed ok, ts_us={}", ts_us);
        self.state = ParserState::Sync0;
        self.buffer.clear();
        Ok(Some(EegFrame { words, ts_us }))
    }
}

impl Default for EegFrameParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(words: &[i16; 18]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(EEG_FRAME_LEN);
        bytes.extend_from_slice(&EEG_HEADER);
        for w in words {
            bytes.extend_from_slice(&w.to_be_bytes());
        }
        let checksum = super::super::checksum::eeg_checksum(&bytes);
        bytes.extend_from_slice(&checksum.to_be_bytes());
        bytes
    }

    #[test]
    fn decodes_valid_frame() {
        let mut words = [0i16; 18];
        words[0] = 1000; // CH1 raw
        words[1] = -500; // CH2 raw
        words[2] = 100; // CH3 raw
        let bytes = build_frame(&words);

        let mut parser = EegFrameParser::new();
        let frames = parser.process_bytes(&bytes, 42).unwrap();
        assert_eq!(frames.len(), 1);
        let frame = frames[0];

        assert!((frame.ch1_uv() - 76.0).abs() < 1e-9);
        assert!((frame.ch2_uv() - (-38.0)).abs() < 1e-9);
        assert!((frame.ch3_uv() - 7.6).abs() < 1e-9);
        assert!((frame.ch4_uv() - 114.0).abs() < 1e-9);
        assert_eq!(frame.ts_us, 42);
    }

    #[test]
    fn rejects_bad_checksum_and_resyncs() {
        let words = [0i16; 18];
        let mut bytes = build_frame(&words);
        *bytes.last_mut().unwrap() ^= 0xFF;

        let mut parser = EegFrameParser::new();
        let result = parser.process_bytes(&bytes, 1);
        assert!(matches!(result, Err(MonitorError::ChecksumError)));
    }

    #[test]
    fn crc_error_leaves_the_offending_bytes_for_the_caller_to_drain() {
        let words = [0i16; 18];
        let mut bytes = build_frame(&words);
        *bytes.last_mut().unwrap() ^= 0xFF;

        let mut parser = EegFrameParser::new();
        let _ = parser.process_bytes(&bytes, 1);
        let rejected = parser.take_last_crc_error().expect("crc error bytes recorded");
        assert_eq!(rejected.len(), EEG_FRAME_LEN);
        assert!(parser.take_last_crc_error().is_none(), "drained once");
    }

    #[test]
    fn resyncs_on_embedded_header_bytes() {
        let words = [0i16; 18];
        let good = build_frame(&words);

        // Prepend a stray header byte before the real frame; parser must
        // still find and decode the real frame.
        let mut bytes = vec![0xAA];
        bytes.extend_from_slice(&good);

        let mut parser = EegFrameParser::new();
        let frames = parser.process_bytes(&bytes, 7).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn handles_back_to_back_frames() {
        let mut bytes = Vec::new();
        bytes.extend(build_frame(&[0i16; 18]));
        bytes.extend(build_frame(&[1i16; 18]));

        let mut parser = EegFrameParser::new();
        let frames = parser.process_bytes(&bytes, 99).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].words[0], 1);
    }
}
