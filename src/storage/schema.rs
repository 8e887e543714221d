//! SQL index schema for the storage engine (§4.6, §6)
//!
//! Chunk payloads themselves live as content-addressed files under
//! `STORAGE_ROOT/chunks/`; this index only ever stores metadata and the
//! `blob_ref` pointing at the file. See DESIGN.md for why.

use crate::MonitorError;
use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS patients (
    id          INTEGER PRIMARY KEY,
    patient_id  TEXT NOT NULL UNIQUE,
    created_us  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id          INTEGER PRIMARY KEY,
    patient_id  TEXT NOT NULL,
    start_us    INTEGER NOT NULL,
    end_us      INTEGER,
    status      TEXT NOT NULL CHECK (status IN ('active', 'completed', 'deleted')),
    metadata    TEXT
);

CREATE TABLE IF NOT EXISTS chunks (
    id            INTEGER PRIMARY KEY,
    session_id    INTEGER NOT NULL REFERENCES sessions(id),
    data_type     TEXT NOT NULL CHECK (data_type IN ('eeg', 'nirs')),
    start_us      INTEGER NOT NULL,
    end_us        INTEGER NOT NULL,
    blob_ref      TEXT NOT NULL,
    size_bytes    INTEGER NOT NULL,
    sample_count  INTEGER NOT NULL,
    checksum      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_session_range
    ON chunks (session_id, start_us, end_us);

CREATE TABLE IF NOT EXISTS aeeg_trends (
    id          INTEGER PRIMARY KEY,
    session_id  INTEGER NOT NULL REFERENCES sessions(id),
    ts_us       INTEGER NOT NULL,
    channel     INTEGER NOT NULL,
    min_uv      REAL NOT NULL,
    max_uv      REAL NOT NULL,
    bandwidth   REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_aeeg_session_ts
    ON aeeg_trends (session_id, ts_us);

CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY,
    ts_us       INTEGER NOT NULL,
    event_type  TEXT NOT NULL,
    session_id  INTEGER REFERENCES sessions(id),
    old_value   TEXT,
    new_value   TEXT,
    details     TEXT
);

CREATE TABLE IF NOT EXISTS deletion_log (
    id           INTEGER PRIMARY KEY,
    deleted_us   INTEGER NOT NULL,
    session_id   INTEGER NOT NULL,
    patient_id   TEXT NOT NULL,
    reason       TEXT NOT NULL CHECK (reason IN ('storage_limit', 'manual')),
    freed_bytes  INTEGER NOT NULL
);
"#;

/// Open the single mutating connection, in WAL mode, and apply the schema.
pub fn open_writer_connection(path: &std::path::Path) -> Result<Connection, MonitorError> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(conn)
}

/// Open a read-only connection. Many of these may exist concurrently with
/// the writer; WAL gives them snapshot isolation.
pub fn open_reader_connection(path: &std::path::Path) -> Result<Connection, MonitorError> {
    let conn = Connection::open_with_flags(
        path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}
