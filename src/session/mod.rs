//! Session identity threaded through the acquisition, storage, and
//! playback paths (§3 Data Model, §9 Design Notes).
//!
//! There is no global state. One [`SessionContext`] is built at start-up
//! and handed to every thread that needs to know "what session am I
//! writing into right now"; unit tests build their own independent
//! instance instead of reaching for a singleton.

use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
    Deleted,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Deleted => "deleted",
        }
    }
}

/// One continuous monitoring interval bound to one patient (§3).
#[derive(Debug, Clone)]
pub struct Session {
    pub id: i64,
    pub patient_id: String,
    pub start_us: i64,
    pub end_us: Option<i64>,
    pub status: SessionStatus,
    pub metadata: Option<String>,
}

const NO_SESSION: i64 = -1;

/// The "which session is currently active" cell shared by reference
/// across the acquisition, storage-writer, and playback threads. Only the
/// storage writer thread ever widens `end_us` (§4.6); this cell only ever
/// tracks the id so other threads can stamp their output with it.
pub struct SessionContext {
    current_id: AtomicI64,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            current_id: AtomicI64::new(NO_SESSION),
        }
    }

    pub fn set_active(&self, session_id: i64) {
        self.current_id.store(session_id, Ordering::Release);
    }

    pub fn clear(&self) {
        self.current_id.store(NO_SESSION, Ordering::Release);
    }

    /// The active session id, if any. Only one session may be active per
    /// stream at a time (§3 invariant).
    pub fn active(&self) -> Option<i64> {
        let id = self.current_id.load(Ordering::Acquire);
        if id == NO_SESSION { None } else { Some(id) }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_no_active_session() {
        let ctx = SessionContext::new();
        assert_eq!(ctx.active(), None);
    }

    #[test]
    fn set_and_clear_round_trip() {
        let ctx = SessionContext::new();
        ctx.set_active(7);
        assert_eq!(ctx.active(), Some(7));
        ctx.clear();
        assert_eq!(ctx.active(), None);
    }
}
