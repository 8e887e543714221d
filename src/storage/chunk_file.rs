//! Content-addressed chunk payload file format (§6)
//!
//! Magic `NEOC` | u16 version | u8 data_type | u8 channel_count |
//! f32 sample_rate_hz | i64 start_us | i64 end_us | u32 sample_count |
//! u32 CRC-32 | 28 reserved bytes, followed by densely packed f64 samples
//! (channel-interleaved).

use crate::MonitorError;
use std::io::{Read, Write};

pub const CHUNK_MAGIC: [u8; 4] = *b"NEOC";
pub const CHUNK_HEADER_LEN: usize = 4 + 2 + 1 + 1 + 4 + 8 + 8 + 4 + 4 + 28;
const CHUNK_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Eeg = 0,
    Nirs = 1,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    pub data_type: DataType,
    pub channel_count: u8,
    pub sample_rate_hz: f32,
    pub start_us: i64,
    pub end_us: i64,
    pub sample_count: u32,
}

fn crc32_ieee(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

fn samples_as_bytes(samples: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 8);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// CRC-32 of the raw sample payload, as stored in the chunk index row.
pub fn payload_checksum(samples: &[f64]) -> u32 {
    crc32_ieee(&samples_as_bytes(samples))
}

/// Serialize a header + sample slice into one chunk file.
pub fn write_chunk<W: Write>(
    writer: &mut W,
    header: &ChunkHeader,
    samples: &[f64],
) -> Result<(), MonitorError> {
    let payload = samples_as_bytes(samples);
    let crc = crc32_ieee(&payload);

    let mut buf = Vec::with_capacity(CHUNK_HEADER_LEN + payload.len());
    buf.extend_from_slice(&CHUNK_MAGIC);
    buf.extend_from_slice(&CHUNK_VERSION.to_le_bytes());
    buf.push(header.data_type as u8);
    buf.push(header.channel_count);
    buf.extend_from_slice(&header.sample_rate_hz.to_le_bytes());
    buf.extend_from_slice(&header.start_us.to_le_bytes());
    buf.extend_from_slice(&header.end_us.to_le_bytes());
    buf.extend_from_slice(&header.sample_count.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&[0u8; 28]);
    buf.extend_from_slice(&payload);

    writer.write_all(&buf)?;
    Ok(())
}

pub struct ParsedChunk {
    pub header: ChunkHeader,
    pub samples: Vec<f64>,
}

/// Parse and checksum-verify a chunk file. A corrupt CRC surfaces as
/// `MonitorError::ChecksumError`, never silently discarded (§4.6).
pub fn read_chunk<R: Read>(reader: &mut R) -> Result<ParsedChunk, MonitorError> {
    let mut header_buf = [0u8; CHUNK_HEADER_LEN];
    reader.read_exact(&mut header_buf)?;

    if header_buf[0..4] != CHUNK_MAGIC {
        return Err(MonitorError::FrameError);
    }
    let data_type = match header_buf[6] {
        0 => DataType::Eeg,
        1 => DataType::Nirs,
        _ => return Err(MonitorError::FrameError),
    };
    let channel_count = header_buf[7];
    let sample_rate_hz = f32::from_le_bytes(header_buf[8..12].try_into().unwrap());
    let start_us = i64::from_le_bytes(header_buf[12..20].try_into().unwrap());
    let end_us = i64::from_le_bytes(header_buf[20..28].try_into().unwrap());
    let sample_count = u32::from_le_bytes(header_buf[28..32].try_into().unwrap());
    let expected_crc = u32::from_le_bytes(header_buf[32..36].try_into().unwrap());

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;

    if crc32_ieee(&payload) != expected_crc {
        return Err(MonitorError::ChecksumError);
    }

    let samples = payload
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
        .collect();

    Ok(ParsedChunk {
        header: ChunkHeader {
            data_type,
            channel_count,
            sample_rate_hz,
            start_us,
            end_us,
            sample_count,
        },
        samples,
    })
}
