//! Single storage writer thread (§4.6, §5)
//!
//! Exactly one thread owns the mutating SQLite connection. Every other
//! thread (chunk batchers, the reaper, audit callers) only ever sends a
//! [`WriterCommand`] down a channel; nothing outside this module ever
//! opens a second read-write connection to the index.

use crate::MonitorError;
use crate::audit::AuditEvent;
use crate::storage::chunk_file::DataType;
use crate::storage::schema;
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{error, warn};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

const MAX_RETRY_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub session_id: i64,
    pub data_type: DataType,
    pub start_us: i64,
    pub end_us: i64,
    pub blob_ref: String,
    pub size_bytes: i64,
    pub sample_count: i64,
    pub checksum: u32,
}

#[derive(Debug, Clone)]
pub struct AeegTrendRecord {
    pub session_id: i64,
    pub ts_us: i64,
    pub channel: i32,
    pub min_uv: f64,
    pub max_uv: f64,
    pub bandwidth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionReason {
    StorageLimit,
    Manual,
}

impl DeletionReason {
    fn as_str(self) -> &'static str {
        match self {
            DeletionReason::StorageLimit => "storage_limit",
            DeletionReason::Manual => "manual",
        }
    }
}

/// One candidate the reaper (or a manual cleanup call) wants removed.
#[derive(Debug, Clone)]
pub struct ChunkToDelete {
    pub id: i64,
    pub blob_ref: String,
}

pub enum WriterCommand {
    StartSession {
        patient_id: String,
        start_us: i64,
        reply: Sender<Result<i64, MonitorError>>,
    },
    EndSession {
        session_id: i64,
        end_us: i64,
    },
    InsertChunk(ChunkRecord),
    InsertAeegTrend(AeegTrendRecord),
    InsertEvent(AuditEvent),
    /// Deletes a batch of chunks subject to the active-session guard
    /// (§3 invariant 6, §4.6); replies with total bytes actually freed.
    DeleteChunks {
        candidates: Vec<ChunkToDelete>,
        reason: DeletionReason,
        reply: Sender<Result<i64, MonitorError>>,
    },
    Shutdown,
}

pub struct StorageWriter {
    sender: Sender<WriterCommand>,
    handle: Option<JoinHandle<()>>,
    storage_root: PathBuf,
}

impl StorageWriter {
    pub fn spawn(db_path: PathBuf, storage_root: PathBuf) -> Result<Self, MonitorError> {
        let conn = schema::open_writer_connection(&db_path)?;
        let (sender, receiver) = unbounded();
        let root_for_thread = storage_root.clone();
        let handle = std::thread::Builder::new()
            .name("storage-writer".into())
            .spawn(move || run_writer_loop(conn, receiver, root_for_thread))
            .expect("failed to spawn storage writer thread");

        Ok(Self {
            sender,
            handle: Some(handle),
            storage_root,
        })
    }

    pub fn sender(&self) -> Sender<WriterCommand> {
        self.sender.clone()
    }

    pub fn storage_root(&self) -> &std::path::Path {
        &self.storage_root
    }

    /// Blocks until the writer thread drains its queue and exits.
    /// Part of the 2s cancellation budget (§4.8, §5); callers that need a
    /// hard deadline should race this against a timeout of their own.
    pub fn shutdown(mut self) {
        let _ = self.sender.send(WriterCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_writer_loop(mut conn: Connection, receiver: Receiver<WriterCommand>, storage_root: PathBuf) {
    for cmd in receiver.iter() {
        match cmd {
            WriterCommand::Shutdown => break,
            other => apply(&mut conn, other, &storage_root),
        }
    }
}

/// Retries a fallible DB operation with bounded exponential back-off
/// (§4.6 failure policy). `op` must be idempotent or transactional --
/// every call site here wraps a single `execute`/transaction.
fn retry_with_backoff<T>(mut op: impl FnMut(&Connection) -> rusqlite::Result<T>, conn: &Connection) -> Result<T, MonitorError> {
    let mut backoff = INITIAL_BACKOFF;
    let mut last_err = None;
    for attempt in 0..MAX_RETRY_ATTEMPTS {
        match op(conn) {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("storage write attempt {} failed: {}", attempt + 1, e);
                last_err = Some(e);
                std::thread::sleep(backoff);
                backoff *= 2;
            }
        }
    }
    Err(MonitorError::StorageError(format!(
        "write failed after {MAX_RETRY_ATTEMPTS} attempts: {}",
        last_err.unwrap()
    )))
}

fn apply(conn: &mut Connection, cmd: WriterCommand, storage_root: &std::path::Path) {
    match cmd {
        WriterCommand::Shutdown => unreachable!("handled by caller"),
        WriterCommand::StartSession { patient_id, start_us, reply } => {
            let result = retry_with_backoff(
                |c| {
                    c.execute(
                        "INSERT INTO patients (patient_id, created_us) VALUES (?1, ?2)
                         ON CONFLICT(patient_id) DO NOTHING",
                        params![patient_id, start_us],
                    )?;
                    c.execute(
                        "INSERT INTO sessions (patient_id, start_us, end_us, status, metadata)
                         VALUES (?1, ?2, NULL, 'active', NULL)",
                        params![patient_id, start_us],
                    )?;
                    Ok(c.last_insert_rowid())
                },
                conn,
            );
            let _ = reply.send(result);
        }
        WriterCommand::EndSession { session_id, end_us } => {
            let result = retry_with_backoff(
                |c| {
                    c.execute(
                        "UPDATE sessions SET end_us = ?1, status = 'completed'
                         WHERE id = ?2 AND status = 'active'",
                        params![end_us, session_id],
                    )
                },
                conn,
            );
            if let Err(e) = result {
                error!("failed to end session {session_id}: {e}");
            }
        }
        WriterCommand::InsertChunk(chunk) => {
            let data_type = match chunk.data_type {
                DataType::Eeg => "eeg",
                DataType::Nirs => "nirs",
            };
            let result = retry_with_backoff(
                |c| {
                    let tx = c.unchecked_transaction()?;
                    tx.execute(
                        "INSERT INTO chunks
                            (session_id, data_type, start_us, end_us, blob_ref, size_bytes, sample_count, checksum)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            chunk.session_id,
                            data_type,
                            chunk.start_us,
                            chunk.end_us,
                            chunk.blob_ref,
                            chunk.size_bytes,
                            chunk.sample_count,
                            chunk.checksum,
                        ],
                    )?;
                    tx.execute(
                        "UPDATE sessions SET end_us = MAX(COALESCE(end_us, ?1), ?1) WHERE id = ?2",
                        params![chunk.end_us, chunk.session_id],
                    )?;
                    tx.commit()
                },
                conn,
            );
            if let Err(e) = result {
                error!("failed to insert chunk for session {}: {}", chunk.session_id, e);
            }
        }
        WriterCommand::InsertAeegTrend(trend) => {
            let result = retry_with_backoff(
                |c| {
                    c.execute(
                        "INSERT INTO aeeg_trends (session_id, ts_us, channel, min_uv, max_uv, bandwidth)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            trend.session_id,
                            trend.ts_us,
                            trend.channel,
                            trend.min_uv,
                            trend.max_uv,
                            trend.bandwidth,
                        ],
                    )
                },
                conn,
            );
            if let Err(e) = result {
                error!("failed to insert aeeg trend: {e}");
            }
        }
        WriterCommand::InsertEvent(event) => {
            let result = retry_with_backoff(
                |c| {
                    c.execute(
                        "INSERT INTO events (ts_us, event_type, session_id, old_value, new_value, details)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            event.ts_us,
                            event.event_type.as_str(),
                            event.session_id,
                            event.old_value,
                            event.new_value,
                            event.details_json,
                        ],
                    )
                },
                conn,
            );
            if let Err(e) = result {
                error!("failed to insert audit event: {e}");
            }
        }
        WriterCommand::DeleteChunks { candidates, reason, reply } => {
            let result = delete_chunks(conn, &candidates, reason, storage_root);
            let _ = reply.send(result);
        }
    }
}

/// Deletes each candidate chunk's DB row (guarded against active
/// sessions) inside one short transaction, logs a `deletion_log` row per
/// deleted chunk, then removes the backing files. Returns bytes freed.
fn delete_chunks(
    conn: &mut Connection,
    candidates: &[ChunkToDelete],
    reason: DeletionReason,
    storage_root: &std::path::Path,
) -> Result<i64, MonitorError> {
    let mut freed = 0i64;
    let mut removed_paths = Vec::new();

    let outcome = retry_with_backoff(
        |c| {
            freed = 0;
            removed_paths.clear();
            let tx = c.unchecked_transaction()?;
            for candidate in candidates {
                let row: Option<(i64, String, i64)> = tx
                    .query_row(
                        "SELECT s.id, s.patient_id, ch.size_bytes
                         FROM chunks ch JOIN sessions s ON s.id = ch.session_id
                         WHERE ch.id = ?1 AND s.status != 'active'",
                        params![candidate.id],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()?;

                let Some((session_id, patient_id, size_bytes)) = row else {
                    // Either already gone, or guarded by an active session.
                    continue;
                };

                tx.execute("DELETE FROM chunks WHERE id = ?1", params![candidate.id])?;
                tx.execute(
                    "INSERT INTO deletion_log (deleted_us, session_id, patient_id, reason, freed_bytes)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![now_deletion_ts(), session_id, patient_id, reason.as_str(), size_bytes],
                )?;
                freed += size_bytes;
                removed_paths.push(candidate.blob_ref.clone());
            }
            tx.commit()?;
            Ok(())
        },
        conn,
    );

    outcome?;

    for rel_path in &removed_paths {
        let full_path = storage_root.join(rel_path);
        if let Err(e) = std::fs::remove_file(&full_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("reaper: failed to remove chunk file {}: {}", full_path.display(), e);
            }
        }
    }

    Ok(freed)
}

/// Deletions are eventually consistent (§4.6); the timestamp only needs
/// to be monotonic-ish for audit ordering, not sample-accurate, so a
/// plain wall-clock read is fine here (this is not on the sample path).
/// Shared with the reaper so its `STORAGE_CLEANUP` audit row uses the same
/// clock discipline as `deletion_log` rows.
pub(crate) fn now_deletion_ts() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEventType;
    use crossbeam_channel::unbounded;
    use tempfile::tempdir;

    fn spawn_test_writer() -> (StorageWriter, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("index.db");
        let root = dir.path().join("chunks");
        std::fs::create_dir_all(&root).unwrap();
        let writer = StorageWriter::spawn(db_path, root).unwrap();
        (writer, dir)
    }

    #[test]
    fn starts_and_ends_a_session() {
        let (writer, _dir) = spawn_test_writer();
        let (tx, rx) = unbounded();
        writer
            .sender()
            .send(WriterCommand::StartSession {
                patient_id: "patient-1".into(),
                start_us: 0,
                reply: tx,
            })
            .unwrap();
        let session_id = rx.recv().unwrap().unwrap();
        assert!(session_id > 0);

        writer
            .sender()
            .send(WriterCommand::EndSession { session_id, end_us: 1_000 })
            .unwrap();
        writer.shutdown();
    }

    #[test]
    fn records_an_audit_event() {
        let (writer, _dir) = spawn_test_writer();
        writer
            .sender()
            .send(WriterCommand::InsertEvent(AuditEvent::new(
                10,
                AuditEventType::MonitoringStart,
            )))
            .unwrap();
        writer.shutdown();
    }
}
