//! Thin serial transport wrappers for the two physiological links.
//!
//! These only open the port at the right framing and hand raw bytes to
//! the caller; frame parsing (§4.2) lives entirely in
//! [`crate::protocol`]. Keeping the transport dumb means the acquisition
//! thread is the only place that decides how to react to a read error or
//! an inter-frame gap (§4.2 Serial line contract, §7 TransportError).

use crate::MonitorError;
use crate::constants::eeg::EEG_BAUD_RATE;
use crate::constants::nirs::NIRS_BAUD_RATE;
use log::info;
use serialport::SerialPort;
use std::io::Read;
use std::time::Duration;

/// Read timeout used for both links. Short enough that the acquisition
/// loop can check its stop flag between reads (§5 cancellation).
const READ_TIMEOUT: Duration = Duration::from_millis(200);

fn open_8n1(port_name: &str, baud: u32) -> Result<Box<dyn SerialPort>, MonitorError> {
    serialport::new(port_name, baud)
        .timeout(READ_TIMEOUT)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .open()
        .map_err(MonitorError::from)
}

/// EEG byte link: 115200 8N1 (§4.2).
pub struct EegPort {
    port: Box<dyn SerialPort>,
}

impl EegPort {
    pub fn open(port_name: &str) -> Result<Self, MonitorError> {
        info!("opening EEG serial port {port_name} at {EEG_BAUD_RATE} 8N1");
        Ok(Self { port: open_8n1(port_name, EEG_BAUD_RATE)? })
    }

    /// Reads whatever is currently available, up to `buf`'s length.
    /// Returns `Ok(0)` on a read timeout (normal, not a gap by itself);
    /// any other I/O error is surfaced as a [`MonitorError::TransportError`]
    /// for the caller to log and restart the link (§7).
    pub fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, MonitorError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(MonitorError::TransportError(format!("EEG port read failed: {e}"))),
        }
    }
}

/// NIRS ASCII link: 57600 8N1, no flow control, fixed 1 Hz cadence (§4.2).
pub struct NirsPort {
    port: Box<dyn SerialPort>,
}

impl NirsPort {
    pub fn open(port_name: &str) -> Result<Self, MonitorError> {
        info!("opening NIRS serial port {port_name} at {NIRS_BAUD_RATE} 8N1");
        Ok(Self { port: open_8n1(port_name, NIRS_BAUD_RATE)? })
    }

    pub fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, MonitorError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(MonitorError::TransportError(format!("NIRS port read failed: {e}"))),
        }
    }
}

/// A mock NIRS source used when `NIRS_MODE=mock` (§6, §9 Open Questions):
/// replays/generates protocol-correct ASCII frames without a real serial
/// link. Anything implementing this can feed [`crate::protocol::NirsFrameParser`].
pub trait NirsByteSource: Send {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, MonitorError>;
}

impl NirsByteSource for NirsPort {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, MonitorError> {
        NirsPort::read_available(self, buf)
    }
}
