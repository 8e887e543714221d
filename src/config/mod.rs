//! Environment-driven process configuration (§6, §10)
//!
//! This is the one piece of "configuration" carried over despite the
//! Non-goal on configuration *persistence*: reading ambient process
//! configuration at start-up is not persistence. Unknown values fail
//! fast, never silently default.

use crate::MonitorError;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NirsMode {
    Mock,
    Real,
}

/// Fully resolved process configuration, built once at start-up from the
/// environment keys of §6.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub nirs_mode: NirsMode,
    pub nirs_port: Option<String>,
    pub eeg_port: Option<String>,
    pub storage_root: PathBuf,
    pub storage_cap_bytes: u64,
}

/// Default total-size budget for the storage reaper (§4.6): 300 GiB.
pub const DEFAULT_STORAGE_CAP_BYTES: u64 = 300 * 1024 * 1024 * 1024;

impl MonitorConfig {
    /// Parse `NIRS_MODE`, `NIRS_PORT`, `EEG_PORT`, `STORAGE_ROOT`, and
    /// `STORAGE_CAP_BYTES` out of the process environment. An unrecognised
    /// `NIRS_MODE` or an unparsable `STORAGE_CAP_BYTES` is a hard error,
    /// never a silent fallback.
    pub fn from_env() -> Result<Self, MonitorError> {
        Self::from_reader(|key| std::env::var(key).ok())
    }

    /// Same logic as [`from_env`], parameterised by a lookup function so
    /// tests don't need to mutate real process environment variables.
    pub fn from_reader(get: impl Fn(&str) -> Option<String>) -> Result<Self, MonitorError> {
        let nirs_mode = match get("NIRS_MODE").as_deref() {
            None => NirsMode::Mock,
            Some("mock") => NirsMode::Mock,
            Some("real") => NirsMode::Real,
            Some(other) => {
                return Err(MonitorError::InvariantViolation(format!(
                    "unknown NIRS_MODE {other:?}, expected \"mock\" or \"real\""
                )));
            }
        };

        let nirs_port = get("NIRS_PORT");
        let eeg_port = get("EEG_PORT");

        if nirs_mode == NirsMode::Real && nirs_port.is_none() {
            return Err(MonitorError::InvariantViolation(
                "NIRS_MODE=real requires NIRS_PORT to be set".to_string(),
            ));
        }

        let storage_root = get("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./neoeeg-storage"));

        let storage_cap_bytes = match get("STORAGE_CAP_BYTES") {
            None => DEFAULT_STORAGE_CAP_BYTES,
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                MonitorError::InvariantViolation(format!(
                    "STORAGE_CAP_BYTES {raw:?} is not a valid byte count"
                ))
            })?,
        };

        Ok(Self {
            nirs_mode,
            nirs_port,
            eeg_port,
            storage_root,
            storage_cap_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_mock_with_no_env() {
        let cfg = MonitorConfig::from_reader(env(&[])).unwrap();
        assert_eq!(cfg.nirs_mode, NirsMode::Mock);
        assert_eq!(cfg.storage_cap_bytes, DEFAULT_STORAGE_CAP_BYTES);
    }

    #[test]
    fn rejects_unknown_nirs_mode() {
        let result = MonitorConfig::from_reader(env(&[("NIRS_MODE", "simulated")]));
        assert!(result.is_err());
    }

    #[test]
    fn real_mode_requires_port() {
        let result = MonitorConfig::from_reader(env(&[("NIRS_MODE", "real")]));
        assert!(result.is_err());

        let ok = MonitorConfig::from_reader(env(&[
            ("NIRS_MODE", "real"),
            ("NIRS_PORT", "/dev/ttyUSB1"),
        ]));
        assert!(ok.is_ok());
    }

    #[test]
    fn rejects_unparsable_storage_cap() {
        let result = MonitorConfig::from_reader(env(&[("STORAGE_CAP_BYTES", "lots")]));
        assert!(result.is_err());
    }

    #[test]
    fn parses_explicit_storage_cap() {
        let cfg = MonitorConfig::from_reader(env(&[("STORAGE_CAP_BYTES", "1024")])).unwrap();
        assert_eq!(cfg.storage_cap_bytes, 1024);
    }
}
