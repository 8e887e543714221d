//! C6: Storage Engine
//!
//! SQL index (sessions, chunks, aEEG trends, events, deletion log) plus
//! content-addressed chunk files, one mutating writer thread, and a FIFO
//! reaper enforcing a total-size budget (§4.6). See DESIGN.md for the
//! BLOB-in-DB vs. content-addressed-file decision.

pub mod batcher;
pub mod chunk_file;
pub mod reaper;
pub mod schema;
pub mod writer;

pub use batcher::ChunkBatcher;
pub use chunk_file::{ChunkHeader, DataType};
pub use reaper::{Reaper, ReaperConfig};
pub use writer::{AeegTrendRecord, ChunkRecord, DeletionReason, StorageWriter, WriterCommand};
