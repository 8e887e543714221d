//! C7: Audit Log -- append-only event journal (§4.7)
//!
//! No update or delete is ever issued against the `events` table; this
//! module only ever knows how to build a row and hand it to the storage
//! writer thread, which owns the sole mutating connection (§4.6).

use log::warn;
use serde::{Deserialize, Serialize};

/// Event kinds covered by §4.7. Stored as their `as_str()` name, not the
/// discriminant, so the column stays readable from outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    MonitoringStart,
    MonitoringStop,
    DeviceLost,
    DeviceRestored,
    FilterChange,
    GainChange,
    CrcError,
    SerialError,
    Screenshot,
    Print,
    UsbExport,
    StorageCleanup,
    ChannelMapChange,
}

impl AuditEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEventType::MonitoringStart => "MONITORING_START",
            AuditEventType::MonitoringStop => "MONITORING_STOP",
            AuditEventType::DeviceLost => "DEVICE_LOST",
            AuditEventType::DeviceRestored => "DEVICE_RESTORED",
            AuditEventType::FilterChange => "FILTER_CHANGE",
            AuditEventType::GainChange => "GAIN_CHANGE",
            AuditEventType::CrcError => "CRC_ERROR",
            AuditEventType::SerialError => "SERIAL_ERROR",
            AuditEventType::Screenshot => "SCREENSHOT",
            AuditEventType::Print => "PRINT",
            AuditEventType::UsbExport => "USB_EXPORT",
            AuditEventType::StorageCleanup => "STORAGE_CLEANUP",
            AuditEventType::ChannelMapChange => "CHANNEL_MAP_CHANGE",
        }
    }
}

/// One row as it will be inserted into `events`. Built by any thread,
/// sent down the storage writer's command channel, never written to the
/// database directly by the caller (§4.6: one writer per connection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts_us: i64,
    pub event_type: AuditEventType,
    pub session_id: Option<i64>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub details_json: Option<String>,
}

impl AuditEvent {
    pub fn new(ts_us: i64, event_type: AuditEventType) -> Self {
        Self {
            ts_us,
            event_type,
            session_id: None,
            old_value: None,
            new_value: None,
            details_json: None,
        }
    }

    pub fn with_session(mut self, session_id: i64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_change(mut self, old_value: impl Into<String>, new_value: impl Into<String>) -> Self {
        self.old_value = Some(old_value.into());
        self.new_value = Some(new_value.into());
        self
    }

    /// Serializes a structured payload into `details_json` via `serde_json`,
    /// matching the teacher's own record-then-serialize discipline (§4.7).
    /// A serialization failure is logged and leaves `details_json` unset
    /// rather than poisoning the event with a half-written string.
    pub fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        match serde_json::to_string(details) {
            Ok(json) => self.details_json = Some(json),
            Err(e) => warn!("failed to serialize audit event details: {e}"),
        }
        self
    }
}

/// Hex-encodes `bytes` for an audit details payload; no external crate
/// needed for a handful of offending frame bytes.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Structured payload for a `CRC_ERROR` row: which link the frame came in
/// on and the offending bytes (§4.7, §8 Scenario 3).
#[derive(Debug, Clone, Serialize)]
pub struct CrcErrorDetails {
    pub stream: &'static str,
    pub bytes_hex: String,
    pub len: usize,
}

impl CrcErrorDetails {
    pub fn new(stream: &'static str, bytes: &[u8]) -> Self {
        Self { stream, bytes_hex: hex_string(bytes), len: bytes.len() }
    }
}

/// Structured payload for a `SERIAL_ERROR` row (§4.7, §7 TransportError).
#[derive(Debug, Clone, Serialize)]
pub struct SerialErrorDetails {
    pub stream: &'static str,
    pub message: String,
}

/// Structured payload for a `STORAGE_CLEANUP` row: what the reaper freed in
/// one pass (§4.6, §4.7).
#[derive(Debug, Clone, Serialize)]
pub struct StorageCleanupDetails {
    pub freed_bytes: i64,
    pub chunks_deleted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names_match_spec_literals() {
        assert_eq!(AuditEventType::CrcError.as_str(), "CRC_ERROR");
        assert_eq!(AuditEventType::UsbExport.as_str(), "USB_EXPORT");
    }

    #[test]
    fn builder_fills_optional_fields() {
        let event = AuditEvent::new(1_000, AuditEventType::FilterChange)
            .with_session(3)
            .with_change("LPF_35", "LPF_15");
        assert_eq!(event.session_id, Some(3));
        assert_eq!(event.old_value.as_deref(), Some("LPF_35"));
        assert_eq!(event.new_value.as_deref(), Some("LPF_15"));
    }

    #[test]
    fn with_details_serializes_a_structured_payload() {
        let details = CrcErrorDetails::new("eeg", &[0xAA, 0x55]);
        let event = AuditEvent::new(5, AuditEventType::CrcError).with_details(&details);
        let json = event.details_json.expect("details_json populated");
        assert!(json.contains("\"bytes_hex\":\"aa55\""));
        assert!(json.contains("\"stream\":\"eeg\""));
    }

    #[test]
    fn hex_string_lowercases_each_byte() {
        assert_eq!(hex_string(&[0x0A, 0xFF]), "0aff");
    }
}
