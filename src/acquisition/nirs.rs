//! Live NIRS pipeline: line parser -> ring -> storage batcher (§4.2, §4.6).
//!
//! The NIRS link is ASCII and self-framed at ~1 Hz, so unlike the EEG
//! side there is no live DSP chain here; the only runtime job besides
//! parsing is detecting an inter-frame gap long enough to count as a
//! dropped sample (§4.2 Serial line contract).

use crate::MonitorError;
use crate::Quality;
use crate::audit::{AuditEvent, AuditEventType, CrcErrorDetails};
use crate::buffer::TimeRing;
use crate::constants::nirs::{NIRS_CHANNEL_COUNT, NIRS_FRAME_GAP_US};
use crate::protocol::{NirsFrameParser, NirsSample};
use crate::storage::{ChunkBatcher, WriterCommand};
use crossbeam_channel::Sender;
use log::warn;

/// Ring capacity: a little over 10 minutes at the nominal 1 Hz rate, so a
/// full chunk's worth of history is queryable even just before a flush.
const RING_CAPACITY: usize = 700;

pub struct LiveNirsPipeline {
    parser: NirsFrameParser,
    ring: TimeRing<NirsSample>,
    batcher: ChunkBatcher,
    writer_tx: Sender<WriterCommand>,
    session_id: i64,
    last_sample_ts_us: Option<i64>,
}

impl LiveNirsPipeline {
    pub fn new(batcher: ChunkBatcher, writer_tx: Sender<WriterCommand>, session_id: i64) -> Self {
        Self {
            parser: NirsFrameParser::new(),
            ring: TimeRing::with_capacity(RING_CAPACITY),
            batcher,
            writer_tx,
            session_id,
            last_sample_ts_us: None,
        }
    }

    pub fn ring(&self) -> &TimeRing<NirsSample> {
        &self.ring
    }

    /// Feed raw serial bytes timestamped with the host monotonic clock
    /// read at the moment they arrived. Call this even when nothing new
    /// arrived (`bytes` empty) so gap detection still runs against wall
    /// clock time, not just against line arrivals.
    pub fn ingest(&mut self, bytes: &[u8], ts_us: i64) -> Result<(), MonitorError> {
        self.check_gap(ts_us);

        let (samples, rejects) = self.parser.process_bytes(bytes, ts_us);
        for reject in &rejects {
            self.emit_crc_error(ts_us, &reject.bytes);
        }
        for sample in samples {
            self.accept_sample(sample)?;
        }
        Ok(())
    }

    fn emit_crc_error(&self, ts_us: i64, offending: &[u8]) {
        let details = CrcErrorDetails::new("nirs", offending);
        let event = AuditEvent::new(ts_us, AuditEventType::CrcError)
            .with_session(self.session_id)
            .with_details(&details);
        if self.writer_tx.send(WriterCommand::InsertEvent(event)).is_err() {
            warn!("NIRS CRC_ERROR audit event dropped: writer channel closed");
        }
    }

    fn check_gap(&mut self, ts_us: i64) {
        if let Some(last) = self.last_sample_ts_us
            && ts_us - last > NIRS_FRAME_GAP_US
        {
            warn!("NIRS frame gap exceeded {NIRS_FRAME_GAP_US}us, marking sample missing");
            let missing = NirsSample {
                ts_us: last + NIRS_FRAME_GAP_US,
                channels: [None; NIRS_CHANNEL_COUNT],
                channel_quality: [Quality::MISSING; NIRS_CHANNEL_COUNT],
                frame_quality: Quality::MISSING,
            };
            self.last_sample_ts_us = Some(missing.ts_us);
            self.push_to_ring_and_batch(&missing);
        }
    }

    fn accept_sample(&mut self, sample: NirsSample) -> Result<(), MonitorError> {
        if let Some(last) = self.last_sample_ts_us
            && sample.ts_us <= last
        {
            return Err(MonitorError::TimelineError(format!(
                "NIRS timestamp went backward: {} <= {last}",
                sample.ts_us
            )));
        }
        self.last_sample_ts_us = Some(sample.ts_us);
        self.push_to_ring_and_batch(&sample);
        Ok(())
    }

    fn push_to_ring_and_batch(&mut self, sample: &NirsSample) {
        self.ring.push(sample.ts_us, sample.clone());

        // Missing-flagged channels carry NaN in the chunk file, never a
        // synthetic numeric value (§3 invariant 3).
        let mut channels = [f64::NAN; NIRS_CHANNEL_COUNT];
        for (i, v) in sample.channels.iter().enumerate() {
            if let Some(v) = v {
                channels[i] = *v;
            }
        }

        if let Err(e) = self.batcher.push(sample.ts_us, &channels) {
            warn!("NIRS chunk batcher push failed: {e}");
        }
    }

    /// Forces the in-flight chunk out (session stop, §4.6).
    pub fn flush_storage(&mut self) -> Result<(), MonitorError> {
        self.batcher.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::checksum::crc16_ccitt;
    use crate::storage::chunk_file::DataType;
    use crossbeam_channel::unbounded;
    use tempfile::tempdir;

    fn build_line(body: &str) -> Vec<u8> {
        let crc_region = format!("{body}CKSUM=");
        let crc = crc16_ccitt(crc_region.as_bytes());
        let mut line = format!("{crc_region}{:04X}", crc).into_bytes();
        line.extend_from_slice(b"\r\n");
        line
    }

    fn pipeline() -> (LiveNirsPipeline, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let (tx, _rx) = unbounded();
        let batcher = ChunkBatcher::new(
            DataType::Nirs,
            NIRS_CHANNEL_COUNT as u8,
            1.0,
            dir.path().to_path_buf(),
            tx.clone(),
            1,
        );
        (LiveNirsPipeline::new(batcher, tx, 1), dir)
    }

    #[test]
    fn ingesting_one_line_populates_the_ring() {
        let (mut pipe, _dir) = pipeline();
        let line = build_line("Ch1=75 Ch2=82 Ch3=78 Ch4=80 |");
        pipe.ingest(&line, 1_000_000).unwrap();
        assert_eq!(pipe.ring().len(), 1);
    }

    #[test]
    fn long_gap_synthesizes_a_missing_sample() {
        let (mut pipe, _dir) = pipeline();
        let line = build_line("Ch1=75 Ch2=82 Ch3=78 Ch4=80 |");
        pipe.ingest(&line, 0).unwrap();
        // second read arrives with no new line, but far enough in the
        // future to exceed the frame-gap threshold
        pipe.ingest(&[], NIRS_FRAME_GAP_US + 1).unwrap();
        assert_eq!(pipe.ring().len(), 2);
    }

    #[test]
    fn backward_timestamp_is_a_timeline_error() {
        let (mut pipe, _dir) = pipeline();
        let line = build_line("Ch1=75 Ch2=82 Ch3=78 Ch4=80 |");
        pipe.ingest(&line, 1_000_000).unwrap();
        let result = pipe.ingest(&line, 500_000);
        assert!(matches!(result, Err(MonitorError::TimelineError(_))));
    }

    #[test]
    fn bad_checksum_emits_a_crc_error_audit_event() {
        let dir = tempdir().unwrap();
        let (tx, rx) = unbounded();
        let batcher = ChunkBatcher::new(
            DataType::Nirs,
            NIRS_CHANNEL_COUNT as u8,
            1.0,
            dir.path().to_path_buf(),
            tx.clone(),
            1,
        );
        let mut pipe = LiveNirsPipeline::new(batcher, tx, 9);

        let mut line = build_line("Ch1=75 Ch2=82 Ch3=78 Ch4=80 |");
        let flip_at = line.len() - 3;
        line[flip_at] ^= 0x01;
        pipe.ingest(&line, 321).unwrap();

        assert_eq!(pipe.ring().len(), 0);
        let cmd = rx.try_recv().expect("an audit command was sent");
        match cmd {
            WriterCommand::InsertEvent(event) => {
                assert_eq!(event.event_type, AuditEventType::CrcError);
                assert_eq!(event.session_id, Some(9));
                let details = event.details_json.expect("details populated");
                assert!(details.contains("\"stream\":\"nirs\""));
            }
            _ => panic!("expected an InsertEvent command"),
        }
    }
}
