//! Serial transport for the EEG and NIRS links (§4.2 Serial line contract)

pub mod port_selector;
pub mod serial_device;

pub use port_selector::select_port;
pub use serial_device::{EegPort, NirsByteSource, NirsPort};
