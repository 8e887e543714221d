//! ASCII NIRS line parser (§4.2, §6)
//!
//! Each frame is one CRLF-terminated ASCII line. Fields are separated by
//! `|` (major sections) and `,` (value lists within a section); the
//! trailer is a literal `CKSUM=` followed by four hex digits covering a
//! CRC-16/CCITT (XMODEM) of everything up to and including the `CKSUM=`
//! token itself.

use crate::MonitorError;
use crate::constants::nirs::{
    NIRS_CHANNEL_COUNT, NIRS_CKSUM_FIELD, NIRS_DEVICE_CHANNEL_COUNT, NIRS_MISSING_TOKEN,
    NIRS_OFF_TOKEN,
};
use crate::constants::quality::Quality;
use log::{debug, warn};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NirsSample {
    pub ts_us: i64,
    /// rSO2-style percentage per channel; `None` where the device has no
    /// probe wired (channels 5 and 6 are always `None`).
    pub channels: [Option<f64>; NIRS_CHANNEL_COUNT],
    pub channel_quality: [Quality; NIRS_CHANNEL_COUNT],
    /// Alarm/status bits that apply to the whole frame (low battery, SQI).
    pub frame_quality: Quality,
}

impl NirsSample {
    fn new(ts_us: i64) -> Self {
        Self {
            ts_us,
            channels: [None; NIRS_CHANNEL_COUNT],
            channel_quality: [Quality::LEAD_OFF | Quality::OFFLINE; NIRS_CHANNEL_COUNT],
            frame_quality: Quality::NORMAL,
        }
    }
}

/// Incremental line-oriented NIRS parser.
#[derive(Debug, Default)]
pub struct NirsFrameParser {
    buffer: Vec<u8>,
}

impl NirsFrameParser {
    pub fn new() -> Self {
        Self { buffer: Vec::with_capacity(512) }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feed bytes; returns any complete, checksum-valid samples found plus
    /// the raw bytes of any line rejected for a checksum mismatch, so a
    /// caller can fold each rejection into a `CRC_ERROR` audit event (§4.7,
    /// §7, §8 Scenario 3). A line with a merely malformed field (not a
    /// checksum failure) is logged and dropped without being returned as
    /// an error, so a noisy line does not stop the stream.
    pub fn process_bytes(&mut self, bytes: &[u8], ts_us: i64) -> (Vec<NirsSample>, Vec<NirsCrcReject>) {
        self.buffer.extend_from_slice(bytes);
        let mut samples = Vec::new();
        let mut rejects = Vec::new();

        while let Some(pos) = find_crlf(&self.buffer) {
            let mut line: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            line.truncate(line.len() - 2); // drop the CRLF itself

            if line.is_empty() {
                continue;
            }

            match parse_line(&line, ts_us) {
                Ok(sample) => samples.push(sample),
                Err(MonitorError::ChecksumError) => {
                    warn!("NIRS frame checksum mismatch, dropping {} byte line", line.len());
                    rejects.push(NirsCrcReject { bytes: line });
                }
                Err(e) => {
                    warn!("NIRS frame parse error: {}", e);
                }
            }
        }

        (samples, rejects)
    }
}

/// One checksum-rejected NIRS line, surfaced with its raw bytes so a caller
/// can log a `CRC_ERROR` audit event with the offending frame (§4.7).
#[derive(Debug, Clone)]
pub struct NirsCrcReject {
    pub bytes: Vec<u8>,
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_line(line: &[u8], ts_us: i64) -> Result<NirsSample, MonitorError> {
    let text = std::str::from_utf8(line).map_err(|_| MonitorError::ParseError)?;

    let cksum_idx = text
        .find(NIRS_CKSUM_FIELD)
        .ok_or(MonitorError::ParseError)?;
    let crc_region = &text[..cksum_idx + NIRS_CKSUM_FIELD.len()];
    let hex_digits = &text[cksum_idx + NIRS_CKSUM_FIELD.len()..];
    if hex_digits.len() != 4 {
        return Err(MonitorError::ParseError);
    }
    let expected = u16::from_str_radix(hex_digits, 16).map_err(|_| MonitorError::ParseError)?;
    let computed = super::checksum::crc16_ccitt(crc_region.as_bytes());
    if computed != expected {
        return Err(MonitorError::ChecksumError);
    }

    let mut sample = NirsSample::new(ts_us);

    for chan in 0..NIRS_DEVICE_CHANNEL_COUNT {
        let key = format!("Ch{}=", chan + 1);
        if let Some(start) = text.find(&key) {
            let rest = &text[start + key.len()..];
            let token = rest.split_whitespace().next().unwrap_or("");
            let (value, quality) = parse_channel_token(token);
            sample.channels[chan] = value;
            sample.channel_quality[chan] = quality;
        } else {
            debug!("NIRS line missing {}", key);
        }
    }

    if text.contains("LOW_BATT") {
        sample.frame_quality |= Quality::OFFLINE;
    }
    if text.contains("SQI_ALARM") {
        sample.frame_quality |= Quality::TRANSIENT;
    }

    Ok(sample)
}

fn parse_channel_token(token: &str) -> (Option<f64>, Quality) {
    let token = token.trim_end_matches(',');
    if token == NIRS_MISSING_TOKEN {
        (None, Quality::LEAD_OFF)
    } else if token == NIRS_OFF_TOKEN {
        (None, Quality::OFFLINE)
    } else {
        match token.parse::<f64>() {
            Ok(v) => (Some(v), Quality::NORMAL),
            Err(_) => (None, Quality::LEAD_OFF),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_line(body: &str) -> Vec<u8> {
        let crc_region = format!("{body}{}", NIRS_CKSUM_FIELD);
        let crc = super::super::checksum::crc16_ccitt(crc_region.as_bytes());
        let mut line = format!("{crc_region}{:04X}", crc).into_bytes();
        line.extend_from_slice(b"\r\n");
        line
    }

    #[test]
    fn decodes_valid_frame() {
        let body = "Ch1=75 Ch2=82 Ch3=78 Ch4=80 |2026-02-06T14:23:15|";
        let line = build_line(body);

        let mut parser = NirsFrameParser::new();
        let (samples, rejects) = parser.process_bytes(&line, 123);
        assert_eq!(samples.len(), 1);
        assert!(rejects.is_empty());
        let s = &samples[0];
        assert_eq!(s.channels[0], Some(75.0));
        assert_eq!(s.channels[1], Some(82.0));
        assert_eq!(s.channels[2], Some(78.0));
        assert_eq!(s.channels[3], Some(80.0));
        assert_eq!(s.channels[4], None);
        assert_eq!(s.channels[5], None);
        assert!(s.channel_quality[4].contains(Quality::LEAD_OFF));
    }

    #[test]
    fn drops_frame_with_bad_checksum() {
        let body = "Ch1=75 Ch2=82 Ch3=78 Ch4=80 |";
        let mut line = build_line(body);
        let flip_at = line.len() - 3; // inside the hex digits, before CRLF
        line[flip_at] ^= 0x01;

        let mut parser = NirsFrameParser::new();
        let (samples, rejects) = parser.process_bytes(&line, 1);
        assert!(samples.is_empty());
        assert_eq!(rejects.len(), 1);
        assert_eq!(rejects[0].bytes.len(), line.len() - 2);
    }

    #[test]
    fn missing_channel_token_is_none() {
        let body = "Ch1=--- Ch2=82 Ch3=78 Ch4=OFF |";
        let line = build_line(body);

        let mut parser = NirsFrameParser::new();
        let (samples, _rejects) = parser.process_bytes(&line, 1);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].channels[0], None);
        assert!(samples[0].channel_quality[0].contains(Quality::LEAD_OFF));
        assert_eq!(samples[0].channels[3], None);
        assert!(samples[0].channel_quality[3].contains(Quality::OFFLINE));
    }

    #[test]
    fn tolerates_split_reads() {
        let body = "Ch1=75 Ch2=82 Ch3=78 Ch4=80 |";
        let line = build_line(body);
        let (first, second) = line.split_at(line.len() / 2);

        let mut parser = NirsFrameParser::new();
        let (mut samples, _) = parser.process_bytes(first, 1);
        assert!(samples.is_empty());
        (samples, _) = parser.process_bytes(second, 2);
        assert_eq!(samples.len(), 1);
    }
}
