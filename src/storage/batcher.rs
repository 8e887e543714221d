//! Per-stream chunk batcher (§4.6, §5)
//!
//! Accumulates channel-interleaved samples until a fixed duration or size
//! cap is reached, then serializes the batch to a content-addressed file
//! under `STORAGE_ROOT/chunks/` and hands its metadata to the storage
//! writer thread. Never shares state with the writer's connection; the
//! batcher only ever touches the filesystem and a channel.
use crate::MonitorError;
use crate::storage::chunk_file::{self, ChunkHeader, DataType};
use crate::storage::writer::{ChunkRecord, WriterCommand};
use crossbeam_channel::Sender;
use log::warn;
use std::path::{Path, PathBuf};

/// Nominal chunk duration: 10 minutes, in microseconds.
pub const CHUNK_DURATION_US: i64 = 10 * 60 * 1_000_000;

/// Size cap that forces a flush even before the duration elapses.
pub const CHUNK_SIZE_CAP_BYTES: usize = 16 * 1024 * 1024;

pub struct ChunkBatcher {
    data_type: DataType,
    channel_count: u8,
    sample_rate_hz: f32,
    storage_root: PathBuf,
    writer_tx: Sender<WriterCommand>,
    samples: Vec<f64>,
    start_us: Option<i64>,
    end_us: i64,
    sample_count: u32,
    session_id: i64,
}

impl ChunkBatcher {
    pub fn new(
        data_type: DataType,
        channel_count: u8,
        sample_rate_hz: f32,
        storage_root: PathBuf,
        writer_tx: Sender<WriterCommand>,
        session_id: i64,
    ) -> Self {
        Self {
            data_type,
            channel_count,
            sample_rate_hz,
            storage_root,
            writer_tx,
            samples: Vec::new(),
            start_us: None,
            end_us: 0,
            sample_count: 0,
            session_id,
        }
    }

    /// Appends one sample's channel values (already interleaved in fixed
    /// channel order) stamped at `ts_us`. Flushes automatically once the
    /// duration or size cap is hit.
    pub fn push(&mut self, ts_us: i64, channels: &[f64]) -> Result<(), MonitorError> {
        debug_assert_eq!(channels.len(), self.channel_count as usize);

        if self.start_us.is_none() {
            self.start_us = Some(ts_us);
        }
        self.end_us = ts_us;
        self.sample_count += 1;
        self.samples.extend_from_slice(channels);

        let duration_elapsed = ts_us - self.start_us.unwrap_or(ts_us) >= CHUNK_DURATION_US;
        let size_exceeded = self.samples.len() * 8 >= CHUNK_SIZE_CAP_BYTES;

        if duration_elapsed || size_exceeded {
            self.flush()?;
        }
        Ok(())
    }

    /// Forces whatever is currently buffered out as one chunk, even if
    /// neither threshold has been reached (e.g. on session stop).
    pub fn flush(&mut self) -> Result<(), MonitorError> {
        if self.samples.is_empty() {
            return Ok(());
        }

        let start_us = self.start_us.unwrap_or(self.end_us);
        let header = ChunkHeader {
            data_type: self.data_type,
            channel_count: self.channel_count,
            sample_rate_hz: self.sample_rate_hz,
            start_us,
            end_us: self.end_us,
            sample_count: self.sample_count,
        };

        let mut buf = Vec::new();
        chunk_file::write_chunk(&mut buf, &header, &self.samples)?;
        let checksum = chunk_file::payload_checksum(&self.samples);

        let subdir = match self.data_type {
            DataType::Eeg => "eeg",
            DataType::Nirs => "nirs",
        };
        let rel_path = PathBuf::from("chunks")
            .join(subdir)
            .join(format!("{:08x}-{start_us}.bin", checksum));

        write_chunk_file(&self.storage_root, &rel_path, &buf)?;

        let record = ChunkRecord {
            session_id: self.session_id,
            data_type: self.data_type,
            start_us,
            end_us: self.end_us,
            blob_ref: rel_path.to_string_lossy().into_owned(),
            size_bytes: buf.len() as i64,
            sample_count: self.sample_count as i64,
            checksum,
        };

        if self.writer_tx.send(WriterCommand::InsertChunk(record)).is_err() {
            warn!("storage writer channel closed, chunk metadata dropped");
        }

        self.samples.clear();
        self.start_us = None;
        self.sample_count = 0;
        Ok(())
    }
}

fn write_chunk_file(storage_root: &Path, rel_path: &Path, buf: &[u8]) -> Result<(), MonitorError> {
    let full_path = storage_root.join(rel_path);
    if let Some(parent) = full_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&full_path, buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use tempfile::tempdir;

    #[test]
    fn flushes_on_explicit_call_and_writes_a_file() {
        let dir = tempdir().unwrap();
        let (tx, rx) = unbounded();
        let mut batcher = ChunkBatcher::new(
            DataType::Eeg,
            4,
            160.0,
            dir.path().to_path_buf(),
            tx,
            1,
        );

        for i in 0..10i64 {
            batcher.push(i * 6250, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        }
        batcher.flush().unwrap();

        let cmd = rx.try_recv().expect("expected a chunk command");
        match cmd {
            WriterCommand::InsertChunk(record) => {
                assert_eq!(record.sample_count, 10);
                let full_path = dir.path().join(&record.blob_ref);
                assert!(full_path.exists());
            }
            _ => panic!("expected InsertChunk"),
        }
    }

    #[test]
    fn auto_flushes_when_size_cap_exceeded() {
        let dir = tempdir().unwrap();
        let (tx, rx) = unbounded();
        let mut batcher = ChunkBatcher::new(
            DataType::Nirs,
            6,
            1.0,
            dir.path().to_path_buf(),
            tx,
            2,
        );

        // Force the size cap with a tiny batcher by pushing well beyond
        // CHUNK_SIZE_CAP_BYTES worth of f64 samples.
        let needed_samples = CHUNK_SIZE_CAP_BYTES / 8 / 6 + 1;
        for i in 0..needed_samples as i64 {
            batcher.push(i, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        }

        assert!(rx.try_recv().is_ok());
    }
}
