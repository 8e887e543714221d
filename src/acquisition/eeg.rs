//! Live EEG pipeline: parser -> ring/double-buffer -> live DSP -> aEEG/GS
//! -> storage batcher (§2 flow, §4.2-§4.6).

use crate::MonitorError;
use crate::Quality;
use crate::aeeg::{AeegChannel, GsFrame, GsHistogram};
use crate::audit::{AuditEvent, AuditEventType, CrcErrorDetails};
use crate::buffer::{DoubleBuffer, TimeRing};
use crate::constants::FilterKind;
use crate::constants::eeg::EEG_CHANNEL_COUNT;
use crate::dsp::ChannelFilter;
use crate::protocol::{EegFrame, EegFrameParser};
use crate::storage::writer::AeegTrendRecord;
use crate::storage::{ChunkBatcher, WriterCommand};
use crossbeam_channel::Sender;
use log::warn;

/// One raw (pre-filter) EEG sample, as it is stored to the ring and to
/// the chunk store. CH4 has already been derived as CH1 - CH2 (§3).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EegSample {
    pub ts_us: i64,
    pub channels: [f64; EEG_CHANNEL_COUNT],
    pub quality: Quality,
}

/// How many filtered samples the producer batches into one published
/// double-buffer snapshot. Chosen so a 60 Hz renderer never has to wait
/// more than ~200ms for a fresh batch at the nominal 160 Hz sample rate.
pub const LIVE_SNAPSHOT_LEN: usize = 32;

/// Small published batch of recently live-filtered samples (§4.3
/// double-buffer contract: `(len, timestamp_us, version)`, handed back by
/// [`DoubleBuffer::snapshot`]).
#[derive(Debug, Clone)]
pub struct LiveEegSnapshot {
    pub channels: [[f64; LIVE_SNAPSHOT_LEN]; EEG_CHANNEL_COUNT],
    pub quality: [[u8; LIVE_SNAPSHOT_LEN]; EEG_CHANNEL_COUNT],
    pub len: usize,
    pub ts_us: i64,
}

impl Default for LiveEegSnapshot {
    fn default() -> Self {
        Self {
            channels: [[0.0; LIVE_SNAPSHOT_LEN]; EEG_CHANNEL_COUNT],
            quality: [[0u8; LIVE_SNAPSHOT_LEN]; EEG_CHANNEL_COUNT],
            len: 0,
            ts_us: 0,
        }
    }
}

/// Bandwidth recorded alongside each aEEG trend row: the frozen 2-15 Hz
/// aEEG band-pass span (§4.5). Not configurable, unlike the live chain.
const AEEG_BANDWIDTH_HZ: f64 = 13.0;

/// Ring capacity: 10s headroom at the nominal 160 Hz rate (§4.3).
const RING_CAPACITY: usize = 160 * 10;

/// Default live filter chain applied before display. Collaborator
/// commands (`change_filter`, §6) may swap any of the three at runtime.
#[derive(Debug, Clone, Copy)]
pub struct LiveFilterChoice {
    pub notch: FilterKind,
    pub hpf: FilterKind,
    pub lpf: FilterKind,
}

impl Default for LiveFilterChoice {
    fn default() -> Self {
        Self { notch: FilterKind::Notch50, hpf: FilterKind::Hpf05, lpf: FilterKind::Lpf70 }
    }
}

pub struct LiveEegPipeline {
    parser: EegFrameParser,
    channel_filters: [ChannelFilter; EEG_CHANNEL_COUNT],
    aeeg_channels: [AeegChannel; EEG_CHANNEL_COUNT],
    gs_histograms: [GsHistogram; EEG_CHANNEL_COUNT],
    raw_ring: TimeRing<EegSample>,
    live_snapshot: DoubleBuffer<LiveEegSnapshot>,
    pending_batch: LiveEegSnapshot,
    pending_len: usize,
    batcher: ChunkBatcher,
    writer_tx: Sender<WriterCommand>,
    session_id: i64,
    last_ts_us: Option<i64>,
}

impl LiveEegPipeline {
    pub fn new(
        filters: LiveFilterChoice,
        batcher: ChunkBatcher,
        writer_tx: Sender<WriterCommand>,
        session_id: i64,
    ) -> Self {
        use crate::constants::eeg::{EEG_GAP_RESET_PERIODS, EEG_SAMPLE_PERIOD_US, EEG_SAMPLE_RATE_HZ};

        let make_filter = || {
            ChannelFilter::new(
                filters.notch,
                filters.hpf,
                filters.lpf,
                EEG_SAMPLE_RATE_HZ,
                EEG_SAMPLE_PERIOD_US,
                EEG_GAP_RESET_PERIODS,
            )
        };

        Self {
            parser: EegFrameParser::new(),
            channel_filters: std::array::from_fn(|_| make_filter()),
            aeeg_channels: std::array::from_fn(|_| AeegChannel::new()),
            gs_histograms: std::array::from_fn(|_| GsHistogram::new()),
            raw_ring: TimeRing::with_capacity(RING_CAPACITY),
            live_snapshot: DoubleBuffer::new(),
            pending_batch: LiveEegSnapshot::default(),
            pending_len: 0,
            batcher,
            writer_tx,
            session_id,
            last_ts_us: None,
        }
    }

    pub fn ring(&self) -> &TimeRing<EegSample> {
        &self.raw_ring
    }

    pub fn live_snapshot(&self) -> &DoubleBuffer<LiveEegSnapshot> {
        &self.live_snapshot
    }

    /// Feed raw serial bytes timestamped with the host monotonic clock
    /// read at the moment they arrived (§4.2). Returns any newly
    /// completed Grey-Scale frames (per channel), ready for a renderer.
    pub fn ingest(&mut self, bytes: &[u8], ts_us: i64) -> Result<Vec<GsFrame>, MonitorError> {
        let mut gs_frames = Vec::new();
        for byte in bytes {
            match self.parser.process_byte(*byte, ts_us) {
                Ok(Some(frame)) => {
                    gs_frames.extend(self.accept_frame(frame)?);
                }
                Ok(None) => {}
                Err(MonitorError::ChecksumError) => {
                    // Resync is automatic; still owes the audit log a
                    // CRC_ERROR row with the offending bytes (§4.7, §7,
                    // §8 Scenario 3).
                    if let Some(bad) = self.parser.take_last_crc_error() {
                        self.emit_crc_error(ts_us, &bad);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(gs_frames)
    }

    fn accept_frame(&mut self, frame: EegFrame) -> Result<Vec<GsFrame>, MonitorError> {
        if let Some(last) = self.last_ts_us
            && frame.ts_us <= last
        {
            return Err(MonitorError::TimelineError(format!(
                "EEG timestamp went backward: {} <= {last}",
                frame.ts_us
            )));
        }
        self.last_ts_us = Some(frame.ts_us);

        let raw = [frame.ch1_uv(), frame.ch2_uv(), frame.ch3_uv(), frame.ch4_uv()];
        let sample = EegSample { ts_us: frame.ts_us, channels: raw, quality: Quality::NORMAL };
        self.raw_ring.push(sample.ts_us, sample);

        if let Err(e) = self.batcher.push(sample.ts_us, &raw) {
            warn!("EEG chunk batcher push failed: {e}");
        }

        let counter = frame.gs_counter();
        let mut gs_frames = Vec::new();

        for ch in 0..EEG_CHANNEL_COUNT {
            let (filtered_uv, quality, ts_us) = self.channel_filters[ch].process_sample(raw[ch], frame.ts_us);
            self.publish_filtered(ch, filtered_uv, quality, ts_us);

            if let Some(out) = self.aeeg_channels[ch].process_sample(filtered_uv, ts_us, quality) {
                self.writer_tx
                    .send(WriterCommand::InsertAeegTrend(AeegTrendRecord {
                        session_id: self.session_id,
                        ts_us: out.center_ts_us,
                        channel: ch as i32,
                        min_uv: out.min_uv,
                        max_uv: out.max_uv,
                        bandwidth: AEEG_BANDWIDTH_HZ,
                    }))
                    .ok();

                if let Some(gs_frame) =
                    self.gs_histograms[ch].accept_pair(out.min_uv, out.max_uv, out.center_ts_us, out.quality, counter)
                {
                    gs_frames.push(gs_frame);
                }
            }
        }

        Ok(gs_frames)
    }

    fn emit_crc_error(&self, ts_us: i64, offending: &[u8]) {
        let details = CrcErrorDetails::new("eeg", offending);
        let event = AuditEvent::new(ts_us, AuditEventType::CrcError)
            .with_session(self.session_id)
            .with_details(&details);
        if self.writer_tx.send(WriterCommand::InsertEvent(event)).is_err() {
            warn!("EEG CRC_ERROR audit event dropped: writer channel closed");
        }
    }

    fn publish_filtered(&mut self, channel: usize, value: f64, quality: Quality, ts_us: i64) {
        self.pending_batch.channels[channel][self.pending_len] = value;
        self.pending_batch.quality[channel][self.pending_len] = quality.0;
        self.pending_batch.ts_us = ts_us;

        // Only the last channel of a sample advances the shared cursor,
        // so all four channels land in the same slot of the batch.
        if channel == EEG_CHANNEL_COUNT - 1 {
            self.pending_len += 1;
            if self.pending_len == LIVE_SNAPSHOT_LEN {
                let batch = self.pending_batch.clone();
                self.live_snapshot.publish_with(|slot| {
                    *slot = LiveEegSnapshot { len: LIVE_SNAPSHOT_LEN, ..batch };
                });
                self.pending_len = 0;
            }
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
    use crate::storage::chunk_file::DataType;
    use crossbeam_channel::unbounded;
    use tempfile::tempdir;

    fn build_eeg_frame_bytes(words: &[i16; 18]) -> Vec<u8> {
        use crate::constants::eeg::EEG_HEADER;
        use crate::protocol::checksum::eeg_checksum;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&EEG_HEADER);
        for w in words {
            bytes.extend_from_slice(&w.to_be_bytes());
        }
        let checksum = eeg_checksum(&bytes);
        bytes.extend_from_slice(&checksum.to_be_bytes());
        bytes
    }

    fn pipeline() -> (LiveEegPipeline, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let (tx, _rx) = unbounded();
        let batcher = ChunkBatcher::new(DataType::Eeg, 4, 160.0, dir.path().to_path_buf(), tx.clone(), 1);
        (LiveEegPipeline::new(LiveFilterChoice::default(), batcher, tx, 1), dir)
    }

    #[test]
    fn ingesting_one_frame_populates_the_ring() {
        let (mut pipe, _dir) = pipeline();
        let bytes = build_eeg_frame_bytes(&[0i16; 18]);
        pipe.ingest(&bytes, 1_000).unwrap();
        assert_eq!(pipe.ring().len(), 1);
    }

    #[test]
    fn backward_timestamp_is_a_timeline_error() {
        let (mut pipe, _dir) = pipeline();
        let bytes = build_eeg_frame_bytes(&[0i16; 18]);
        pipe.ingest(&bytes, 1_000).unwrap();
        let result = pipe.ingest(&bytes, 999);
        assert!(matches!(result, Err(MonitorError::TimelineError(_))));
    }

    #[test]
    fn bad_checksum_emits_a_crc_error_audit_event() {
        let dir = tempdir().unwrap();
        let (tx, rx) = unbounded();
        let batcher = ChunkBatcher::new(DataType::Eeg, 4, 160.0, dir.path().to_path_buf(), tx.clone(), 1);
        let mut pipe = LiveEegPipeline::new(LiveFilterChoice::default(), batcher, tx, 7);

        let mut bytes = build_eeg_frame_bytes(&[0i16; 18]);
        *bytes.last_mut().unwrap() ^= 0xFF;
        pipe.ingest(&bytes, 55).unwrap();

        let cmd = rx.try_recv().expect("an audit command was sent");
        match cmd {
            WriterCommand::InsertEvent(event) => {
                assert_eq!(event.event_type, AuditEventType::CrcError);
                assert_eq!(event.session_id, Some(7));
                let details = event.details_json.expect("details populated");
                assert!(details.contains("\"stream\":\"eeg\""));
            }
            _ => panic!("expected an InsertEvent command"),
        }
    }

    #[test]
    fn publishes_a_live_snapshot_after_enough_samples() {
        let (mut pipe, _dir) = pipeline();
        let bytes = build_eeg_frame_bytes(&[100i16; 18]);
        for i in 0..LIVE_SNAPSHOT_LEN as i64 {
            pipe.ingest(&bytes, 1_000 + i * 6_250).unwrap();
        }
        let (version, snap) = pipe.live_snapshot().snapshot();
        assert_eq!(version, 1);
        assert_eq!(snap.len, LIVE_SNAPSHOT_LEN);
    }
}
