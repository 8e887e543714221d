//! FIFO storage reaper (§4.6, §5)
//!
//! Runs on its own thread, periodically comparing total chunk size
//! against a budget. Deletion is routed through the storage writer's
//! `DeleteChunks` command so this thread never opens a mutating
//! connection of its own; it only ever reads. Eventually consistent with
//! new writes, and must never block the writer path.

use crate::MonitorError;
use crate::audit::{AuditEvent, AuditEventType, StorageCleanupDetails};
use crate::storage::writer::{ChunkToDelete, DeletionReason, WriterCommand, now_deletion_ts};
use crossbeam_channel::Sender;
use log::{info, warn};
use rusqlite::{Connection, params};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    /// Total-size budget across all chunks, in bytes. Default 300 GiB.
    pub cap_bytes: u64,
    /// Fraction of `cap_bytes` that triggers a reap. Default 0.8.
    pub high_water_mark: f64,
    /// How often the reaper wakes up to check.
    pub scan_interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            cap_bytes: crate::config::DEFAULT_STORAGE_CAP_BYTES,
            high_water_mark: 0.8,
            scan_interval: Duration::from_secs(60),
        }
    }
}

pub struct Reaper {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Spawns the background scan loop against a dedicated read-only
    /// connection. `writer_tx` is the same channel the storage writer
    /// listens on; deletions are never issued directly against the
    /// database from here (§4.6: one mutating connection per database).
    pub fn spawn(
        db_path: PathBuf,
        writer_tx: Sender<WriterCommand>,
        config: ReaperConfig,
    ) -> Result<Self, MonitorError> {
        let conn = schema_reader(&db_path)?;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("storage-reaper".into())
            .spawn(move || run_loop(conn, writer_tx, config, stop_for_thread))
            .expect("failed to spawn storage reaper thread");

        Ok(Self { stop, handle: Some(handle) })
    }

    /// Signals the loop to exit and joins it. Part of the crate-wide 2s
    /// cancellation budget (§4.8, §5): the reaper's own sleep is bounded
    /// by `scan_interval`, but it checks the stop flag every iteration,
    /// so callers using a short `scan_interval` in tests see fast exit.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn schema_reader(db_path: &std::path::Path) -> Result<Connection, MonitorError> {
    crate::storage::schema::open_reader_connection(db_path)
}

fn run_loop(
    conn: Connection,
    writer_tx: Sender<WriterCommand>,
    config: ReaperConfig,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Acquire) {
        if let Err(e) = reap_once(&conn, &writer_tx, &config) {
            warn!("reaper scan failed: {e}");
        }
        std::thread::sleep(config.scan_interval);
    }
}

/// Sum of `size_bytes` across every chunk currently indexed.
fn total_size(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COALESCE(SUM(size_bytes), 0) FROM chunks", [], |row| row.get(0))
}

/// Oldest chunks (by `start_us`) belonging to a non-`active` session,
/// enough to read past the high-water mark. The active-session guard
/// (§3 invariant 6) is enforced here by the `WHERE` clause, not merely by
/// the writer's delete path, so a racing session transition can't slip a
/// chunk through between the scan and the delete.
fn oldest_evictable_chunks(
    conn: &Connection,
    limit: i64,
) -> rusqlite::Result<Vec<(ChunkToDelete, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT ch.id, ch.blob_ref, ch.size_bytes
         FROM chunks ch JOIN sessions s ON s.id = ch.session_id
         WHERE s.status != 'active'
         ORDER BY ch.start_us ASC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            ChunkToDelete { id: row.get(0)?, blob_ref: row.get(1)? },
            row.get::<_, i64>(2)?,
        ))
    })?;
    rows.collect()
}

/// One reap pass: if the indexed total exceeds the high-water mark,
/// delete the oldest evictable chunks until back under the cap (or until
/// evictable chunks run out, whichever comes first).
pub fn reap_once(
    conn: &Connection,
    writer_tx: &Sender<WriterCommand>,
    config: &ReaperConfig,
) -> Result<i64, MonitorError> {
    let cap = config.cap_bytes as i64;
    let threshold = (cap as f64 * config.high_water_mark) as i64;

    let current = total_size(conn)?;
    if current <= threshold {
        return Ok(0);
    }

    info!("reaper: {current} bytes over {threshold} byte high-water mark, reaping");

    // Pull candidates in batches rather than the whole table at once;
    // 256 is comfortably more than one reap pass needs in practice.
    let candidates = oldest_evictable_chunks(conn, 256)?;
    if candidates.is_empty() {
        warn!("reaper: over budget but no evictable chunks (all sessions active)");
        return Ok(0);
    }

    let target_to_free = current - threshold;
    let mut accumulated = 0i64;
    let mut to_delete = Vec::new();
    for (candidate, size) in candidates {
        if accumulated >= target_to_free {
            break;
        }
        accumulated += size;
        to_delete.push(candidate);
    }

    if to_delete.is_empty() {
        return Ok(0);
    }
    let to_delete_count = to_delete.len();

    let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
    writer_tx
        .send(WriterCommand::DeleteChunks {
            candidates: to_delete,
            reason: DeletionReason::StorageLimit,
            reply: reply_tx,
        })
        .map_err(|_| MonitorError::StorageError("writer channel closed".into()))?;

    let freed = reply_rx
        .recv()
        .map_err(|_| MonitorError::StorageError("writer dropped reply channel".into()))??;

    info!("reaper: freed {freed} bytes");

    // STORAGE_CLEANUP has no single owning session (chunks from multiple
    // completed sessions may have been reaped in one pass, §4.6), so the
    // event carries no `session_id` of its own.
    let details = StorageCleanupDetails { freed_bytes: freed, chunks_deleted: to_delete_count };
    let event = AuditEvent::new(now_deletion_ts(), AuditEventType::StorageCleanup)
        .with_details(&details);
    if writer_tx.send(WriterCommand::InsertEvent(event)).is_err() {
        warn!("STORAGE_CLEANUP audit event dropped: writer channel closed");
    }

    Ok(freed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::chunk_file::DataType;
    use crate::storage::writer::{ChunkRecord, StorageWriter};
    use crossbeam_channel::unbounded;
    use tempfile::tempdir;

    fn insert_session(
        writer: &StorageWriter,
        patient_id: &str,
        start_us: i64,
    ) -> i64 {
        let (tx, rx) = unbounded();
        writer
            .sender()
            .send(WriterCommand::StartSession {
                patient_id: patient_id.into(),
                start_us,
                reply: tx,
            })
            .unwrap();
        rx.recv().unwrap().unwrap()
    }

    fn insert_chunk(writer: &StorageWriter, session_id: i64, start_us: i64, size_bytes: i64) {
        writer
            .sender()
            .send(WriterCommand::InsertChunk(ChunkRecord {
                session_id,
                data_type: DataType::Eeg,
                start_us,
                end_us: start_us + 1_000,
                blob_ref: format!("chunks/eeg/{start_us}.bin"),
                size_bytes,
                sample_count: 10,
                checksum: 0,
            }))
            .unwrap();
    }

    #[test]
    fn reaper_never_touches_an_active_session_and_logs_freed_bytes() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("index.db");
        let root = dir.path().join("chunks");
        std::fs::create_dir_all(root.join("eeg")).unwrap();

        let writer = StorageWriter::spawn(db_path.clone(), root.clone()).unwrap();

        let completed_a = insert_session(&writer, "patient-a", 0);
        let completed_b = insert_session(&writer, "patient-b", 0);
        let active = insert_session(&writer, "patient-c", 0);

        for i in 0..5 {
            insert_chunk(&writer, completed_a, i * 10_000, 1_000_000);
        }
        for i in 0..5 {
            insert_chunk(&writer, completed_b, i * 10_000, 1_000_000);
        }
        for i in 0..5 {
            insert_chunk(&writer, active, i * 10_000, 1_000_000);
        }

        writer
            .sender()
            .send(WriterCommand::EndSession { session_id: completed_a, end_us: 50_000 })
            .unwrap();
        writer
            .sender()
            .send(WriterCommand::EndSession { session_id: completed_b, end_us: 50_000 })
            .unwrap();

        // Flush the writer queue by sending a synchronous no-op through
        // a StartSession/reply round-trip before reading with our own
        // connection.
        let (tx, rx) = unbounded();
        writer
            .sender()
            .send(WriterCommand::StartSession {
                patient_id: "sync-barrier".into(),
                start_us: 0,
                reply: tx,
            })
            .unwrap();
        rx.recv().unwrap().unwrap();

        let reader = schema_reader(&db_path).unwrap();
        let before = total_size(&reader).unwrap();
        assert_eq!(before, 15_000_000);

        let config = ReaperConfig {
            cap_bytes: 10_000_000,
            high_water_mark: 0.8,
            scan_interval: Duration::from_secs(3600),
        };
        let freed = reap_once(&reader, &writer.sender(), &config).unwrap();
        assert!(freed > 0);

        let after = total_size(&reader).unwrap();
        assert!(after < before);

        let active_remaining: i64 = reader
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE session_id = ?1",
                params![active],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(active_remaining, 5);

        let logged_freed: i64 = reader
            .query_row("SELECT COALESCE(SUM(freed_bytes), 0) FROM deletion_log", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(logged_freed, freed);

        writer.shutdown();
    }
}
