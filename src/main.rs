//! Integration shell (C9): wires the acquisition, storage, and reaper
//! subsystems together into one running process. A live session only --
//! playback of a recorded session is a library entry point
//! ([`neoeeg_monitor::playback`]) meant for a collaborator UI, not this
//! binary (§4.9, §9 Design Notes).

use anyhow::Result;
use chrono::Utc;
use crossbeam_channel::{Sender, bounded};
use neoeeg_monitor::audit::{AuditEvent, AuditEventType, SerialErrorDetails};
use neoeeg_monitor::config::{MonitorConfig, NirsMode};
use neoeeg_monitor::constants::eeg::EEG_SAMPLE_RATE_HZ;
use neoeeg_monitor::constants::nirs::{
    NIRS_CHANNEL_COUNT, NIRS_CKSUM_FIELD, NIRS_SAMPLE_RATE_HZ,
};
use neoeeg_monitor::device::{EegPort, NirsByteSource, NirsPort, select_port};
use neoeeg_monitor::protocol::crc16_ccitt;
use neoeeg_monitor::session::SessionContext;
use neoeeg_monitor::storage::chunk_file::DataType;
use neoeeg_monitor::storage::{ChunkBatcher, Reaper, ReaperConfig, StorageWriter, WriterCommand};
use neoeeg_monitor::timeline::{Clock, MonotonicClock};
use neoeeg_monitor::{MonitorError, acquisition, ui};
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Synthetic NIRS source used when `NIRS_MODE=mock` (§6, §9 Open
/// Questions): emits protocol-correct ASCII lines at the nominal 1 Hz
/// cadence without a real serial link attached.
struct MockNirsSource {
    next_emit: Instant,
    channels: [f64; 4],
}

impl MockNirsSource {
    fn new() -> Self {
        Self {
            next_emit: Instant::now(),
            channels: [75.0, 80.0, 78.0, 82.0],
        }
    }
}

impl NirsByteSource for MockNirsSource {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, MonitorError> {
        if Instant::now() < self.next_emit {
            std::thread::sleep(Duration::from_millis(50));
            return Ok(0);
        }
        self.next_emit = Instant::now() + Duration::from_secs(1);

        for v in self.channels.iter_mut() {
            *v = (*v + (rand::random::<f64>() - 0.5) * 2.0).clamp(0.0, 100.0);
        }
        let body = format!(
            "Ch1={:.0} Ch2={:.0} Ch3={:.0} Ch4={:.0} |{}|",
            self.channels[0],
            self.channels[1],
            self.channels[2],
            self.channels[3],
            Utc::now().format("%Y-%m-%dT%H:%M:%S")
        );
        let crc_region = format!("{body}{NIRS_CKSUM_FIELD}");
        let crc = crc16_ccitt(crc_region.as_bytes());
        let mut line = format!("{crc_region}{crc:04X}").into_bytes();
        line.extend_from_slice(b"\r\n");

        let n = line.len().min(buf.len());
        buf[..n].copy_from_slice(&line[..n]);
        Ok(n)
    }
}

/// Blocks until the operator presses Enter, used as the stop trigger for
/// an interactive session.
fn wait_for_enter() {
    let stdin = std::io::stdin();
    let mut line = String::new();
    let _ = stdin.lock().read_line(&mut line);
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    ui::display_banner();

    let config = MonitorConfig::from_env()?;
    ui::info(&format!("storage root: {}", config.storage_root.display()));

    std::fs::create_dir_all(&config.storage_root)?;
    let db_path = config.storage_root.join("index.db");

    let writer = StorageWriter::spawn(db_path.clone(), config.storage_root.clone())?;
    let writer_tx = writer.sender();

    let reaper = Reaper::spawn(
        db_path,
        writer_tx.clone(),
        ReaperConfig {
            cap_bytes: config.storage_cap_bytes,
            ..ReaperConfig::default()
        },
    )?;

    let patient_id = ui::get_input("Patient identifier", "patient-001")?;

    let clock = MonotonicClock::new();
    let start_us = clock.now_us();

    let (reply_tx, reply_rx) = bounded(1);
    writer_tx.send(WriterCommand::StartSession {
        patient_id: patient_id.clone(),
        start_us,
        reply: reply_tx,
    })?;
    let session_id = reply_rx.recv().map_err(|_| {
        MonitorError::StorageError("storage writer dropped the session reply channel".into())
    })??;
    ui::success(&format!("session {session_id} started for patient {patient_id}"));

    let session_ctx = Arc::new(SessionContext::new());
    session_ctx.set_active(session_id);

    writer_tx.send(WriterCommand::InsertEvent(
        AuditEvent::new(start_us, AuditEventType::MonitoringStart).with_session(session_id),
    ))?;

    let eeg_port_name = match &config.eeg_port {
        Some(name) => name.clone(),
        None => select_port("EEG")?,
    };
    let eeg_port = EegPort::open(&eeg_port_name)?;
    ui::success(&format!("EEG link opened on {eeg_port_name}"));

    let nirs_source: Box<dyn NirsByteSource> = match config.nirs_mode {
        NirsMode::Real => {
            let nirs_port_name = match &config.nirs_port {
                Some(name) => name.clone(),
                None => select_port("NIRS")?,
            };
            let port = NirsPort::open(&nirs_port_name)?;
            ui::success(&format!("NIRS link opened on {nirs_port_name}"));
            Box::new(port)
        }
        NirsMode::Mock => {
            ui::info("NIRS_MODE=mock: synthesizing NIRS samples, no serial link opened");
            Box::new(MockNirsSource::new())
        }
    };

    let eeg_batcher = ChunkBatcher::new(
        DataType::Eeg,
        4,
        EEG_SAMPLE_RATE_HZ as f32,
        config.storage_root.clone(),
        writer_tx.clone(),
        session_id,
    );
    let nirs_batcher = ChunkBatcher::new(
        DataType::Nirs,
        NIRS_CHANNEL_COUNT as u8,
        NIRS_SAMPLE_RATE_HZ as f32,
        config.storage_root.clone(),
        writer_tx.clone(),
        session_id,
    );

    let eeg_pipeline = acquisition::LiveEegPipeline::new(
        acquisition::eeg::LiveFilterChoice::default(),
        eeg_batcher,
        writer_tx.clone(),
        session_id,
    );
    let nirs_pipeline =
        acquisition::LiveNirsPipeline::new(nirs_batcher, writer_tx.clone(), session_id);

    let stop = Arc::new(AtomicBool::new(false));

    let eeg_handle = {
        let stop = Arc::clone(&stop);
        let writer_tx = writer_tx.clone();
        std::thread::Builder::new()
            .name("eeg-acquisition".into())
            .spawn(move || run_eeg_acquisition(eeg_port, eeg_pipeline, writer_tx, session_id, stop))
            .expect("failed to spawn EEG acquisition thread")
    };

    let nirs_handle = {
        let stop = Arc::clone(&stop);
        let writer_tx = writer_tx.clone();
        std::thread::Builder::new()
            .name("nirs-acquisition".into())
            .spawn(move || run_nirs_acquisition(nirs_source, nirs_pipeline, writer_tx, session_id, stop))
            .expect("failed to spawn NIRS acquisition thread")
    };

    println!();
    ui::info("Recording. Press Enter to stop the session.");
    wait_for_enter();

    stop.store(true, Ordering::Release);
    let _ = eeg_handle.join();
    let _ = nirs_handle.join();

    let end_us = clock.now_us();
    writer_tx.send(WriterCommand::EndSession { session_id, end_us })?;
    writer_tx.send(WriterCommand::InsertEvent(
        AuditEvent::new(end_us, AuditEventType::MonitoringStop).with_session(session_id),
    ))?;
    session_ctx.clear();

    reaper.shutdown();
    writer.shutdown();

    ui::success(&format!("session {session_id} stopped"));
    Ok(())
}

/// Logs and audits a transport-level read failure (§7 TransportError):
/// `SERIAL_ERROR` is always recorded, even though recovery itself is just
/// "keep looping, the next read may succeed" at this layer.
fn emit_serial_error(writer_tx: &Sender<WriterCommand>, session_id: i64, stream: &'static str, ts_us: i64, err: &MonitorError) {
    let details = SerialErrorDetails { stream, message: err.to_string() };
    let event = AuditEvent::new(ts_us, AuditEventType::SerialError)
        .with_session(session_id)
        .with_details(&details);
    if writer_tx.send(WriterCommand::InsertEvent(event)).is_err() {
        log::warn!("{stream} SERIAL_ERROR audit event dropped: writer channel closed");
    }
}

fn run_eeg_acquisition(
    mut port: EegPort,
    mut pipeline: acquisition::LiveEegPipeline,
    writer_tx: Sender<WriterCommand>,
    session_id: i64,
    stop: Arc<AtomicBool>,
) {
    let clock = MonotonicClock::new();
    let mut buf = [0u8; 256];
    let mut gs_frame_count = 0u64;

    while !stop.load(Ordering::Acquire) {
        let ts_us = clock.now_us();
        match port.read_available(&mut buf) {
            Ok(0) => {}
            Ok(n) => match pipeline.ingest(&buf[..n], ts_us) {
                Ok(gs_frames) => gs_frame_count += gs_frames.len() as u64,
                Err(e) => log::error!("EEG pipeline error: {e}"),
            },
            Err(e) => {
                log::error!("EEG read error: {e}");
                emit_serial_error(&writer_tx, session_id, "eeg", ts_us, &e);
            }
        }
    }

    log::info!("EEG acquisition stopping, {gs_frame_count} grey-scale frames produced");
    if let Err(e) = pipeline.flush_storage() {
        log::error!("EEG final flush failed: {e}");
    }
}

fn run_nirs_acquisition(
    mut source: Box<dyn NirsByteSource>,
    mut pipeline: acquisition::LiveNirsPipeline,
    writer_tx: Sender<WriterCommand>,
    session_id: i64,
    stop: Arc<AtomicBool>,
) {
    let clock = MonotonicClock::new();
    let mut buf = [0u8; 512];

    while !stop.load(Ordering::Acquire) {
        let ts_us = clock.now_us();
        match source.read_available(&mut buf) {
            Ok(0) => {
                if let Err(e) = pipeline.ingest(&[], ts_us) {
                    log::error!("NIRS pipeline error: {e}");
                }
            }
            Ok(n) => {
                if let Err(e) = pipeline.ingest(&buf[..n], ts_us) {
                    log::error!("NIRS pipeline error: {e}");
                }
            }
            Err(e) => {
                log::error!("NIRS read error: {e}");
                emit_serial_error(&writer_tx, session_id, "nirs", ts_us, &e);
            }
        }
    }

    log::info!("NIRS acquisition stopping");
    if let Err(e) = pipeline.flush_storage() {
        log::error!("NIRS final flush failed: {e}");
    }
}
