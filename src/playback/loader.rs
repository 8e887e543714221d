//! Bulk chunk loading for playback (§4.6, §4.8)
//!
//! Playback reads are a one-shot bulk load at `play()` time, not a live
//! streaming path: every chunk belonging to the session and stream is
//! pulled into memory up front, de-interleaved, and timestamped. Chunk
//! files only record `(start_us, end_us, sample_count)`, not a per-sample
//! timestamp, so inter-sample spacing is reconstructed assuming uniform
//! sampling within the chunk -- the same assumption the acquisition side
//! made when it wrote the chunk in fixed-rate batches.

use crate::MonitorError;
use crate::acquisition::eeg::EegSample;
use crate::Quality;
use crate::protocol::NirsSample;
use crate::storage::chunk_file::{self, DataType};
use rusqlite::Connection;
use std::path::Path;

struct ChunkRow {
    blob_ref: String,
    channel_count: u8,
    start_us: i64,
    end_us: i64,
    sample_count: i64,
}

fn chunk_rows(
    conn: &Connection,
    session_id: i64,
    data_type: DataType,
) -> Result<Vec<ChunkRow>, MonitorError> {
    let type_str = match data_type {
        DataType::Eeg => "eeg",
        DataType::Nirs => "nirs",
    };
    let mut stmt = conn.prepare(
        "SELECT blob_ref, start_us, end_us, sample_count FROM chunks \
         WHERE session_id = ?1 AND data_type = ?2 ORDER BY start_us ASC",
    )?;
    let channel_count = if data_type == DataType::Eeg { 4 } else { 6 };
    let rows = stmt
        .query_map(rusqlite::params![session_id, type_str], |row| {
            Ok(ChunkRow {
                blob_ref: row.get(0)?,
                channel_count,
                start_us: row.get(1)?,
                end_us: row.get(2)?,
                sample_count: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn sample_timestamps(start_us: i64, end_us: i64, count: i64) -> Vec<i64> {
    if count <= 1 {
        return vec![start_us; count.max(0) as usize];
    }
    let span = end_us - start_us;
    (0..count)
        .map(|i| start_us + span * i / (count - 1))
        .collect()
}

/// Load every EEG sample recorded for `session_id`, sorted ascending.
pub fn load_eeg_session(
    conn: &Connection,
    storage_root: &Path,
    session_id: i64,
) -> Result<Vec<EegSample>, MonitorError> {
    let mut out = Vec::new();
    for row in chunk_rows(conn, session_id, DataType::Eeg)? {
        let bytes = std::fs::read(storage_root.join(&row.blob_ref))?;
        let parsed = chunk_file::read_chunk(&mut std::io::Cursor::new(bytes))?;
        let channel_count = row.channel_count as usize;
        let timestamps = sample_timestamps(row.start_us, row.end_us, row.sample_count);

        for (i, ts_us) in timestamps.into_iter().enumerate() {
            let base = i * channel_count;
            if base + channel_count > parsed.samples.len() {
                break;
            }
            let mut channels = [0.0; 4];
            channels.copy_from_slice(&parsed.samples[base..base + channel_count.min(4)]);
            out.push(EegSample { ts_us, channels, quality: Quality::NORMAL });
        }
    }
    out.sort_by_key(|s| s.ts_us);
    Ok(out)
}

/// Load every NIRS sample recorded for `session_id`, sorted ascending.
/// A `NaN` value at load time is not distinguishable from a genuine
/// reading of exactly `NaN`; since the device never emits `NaN`, any
/// `NaN` channel is treated as `None`/`LeadOff` on the way back in.
pub fn load_nirs_session(
    conn: &Connection,
    storage_root: &Path,
    session_id: i64,
) -> Result<Vec<NirsSample>, MonitorError> {
    let mut out = Vec::new();
    for row in chunk_rows(conn, session_id, DataType::Nirs)? {
        let bytes = std::fs::read(storage_root.join(&row.blob_ref))?;
        let parsed = chunk_file::read_chunk(&mut std::io::Cursor::new(bytes))?;
        let channel_count = row.channel_count as usize;
        let timestamps = sample_timestamps(row.start_us, row.end_us, row.sample_count);

        for (i, ts_us) in timestamps.into_iter().enumerate() {
            let base = i * channel_count;
            if base + channel_count > parsed.samples.len() {
                break;
            }
            let mut sample = NirsSample { ts_us, ..NirsSample::default() };
            for ch in 0..channel_count.min(sample.channels.len()) {
                let v = parsed.samples[base + ch];
                if v.is_nan() {
                    sample.channels[ch] = None;
                    sample.channel_quality[ch] = Quality::LEAD_OFF;
                } else {
                    sample.channels[ch] = Some(v);
                }
            }
            out.push(sample);
        }
    }
    out.sort_by_key(|s| s.ts_us);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageWriter;
    use crate::storage::writer::{ChunkRecord, WriterCommand};
    use crate::storage::chunk_file::ChunkHeader;
    use crossbeam_channel::unbounded;
    use tempfile::tempdir;

    fn write_one_chunk(storage_root: &Path, rel: &str, header: &ChunkHeader, samples: &[f64]) {
        let full = storage_root.join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        let mut buf = Vec::new();
        chunk_file::write_chunk(&mut buf, header, samples).unwrap();
        std::fs::write(full, buf).unwrap();
    }

    #[test]
    fn loads_eeg_chunk_with_reconstructed_timestamps() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("index.sqlite3");
        let writer = StorageWriter::spawn(db_path.clone(), dir.path().to_path_buf()).unwrap();
        let (reply_tx, reply_rx) = unbounded();
        writer
            .sender()
            .send(WriterCommand::StartSession {
                patient_id: "p1".into(),
                start_us: 0,
                reply: reply_tx,
            })
            .unwrap();
        let session_id = reply_rx.recv().unwrap().unwrap();

        let header = ChunkHeader {
            data_type: DataType::Eeg,
            channel_count: 4,
            sample_rate_hz: 160.0,
            start_us: 0,
            end_us: 4 * 6_250,
            sample_count: 5,
        };
        let samples: Vec<f64> = (0..20).map(|i| i as f64).collect();
        write_one_chunk(writer.storage_root(), "chunks/eeg/test.bin", &header, &samples);

        writer
            .sender()
            .send(WriterCommand::InsertChunk(ChunkRecord {
                session_id,
                data_type: DataType::Eeg,
                start_us: 0,
                end_us: 4 * 6_250,
                blob_ref: "chunks/eeg/test.bin".into(),
                size_bytes: 0,
                sample_count: 5,
                checksum: 0,
            }))
            .unwrap();
        writer.shutdown();

        let conn = crate::storage::schema::open_reader_connection(&db_path).unwrap();
        let loaded = load_eeg_session(&conn, dir.path(), session_id).unwrap();
        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded[0].ts_us, 0);
        assert_eq!(loaded[4].ts_us, 4 * 6_250);
        assert_eq!(loaded[1].channels, [4.0, 5.0, 6.0, 7.0]);
    }
}
