//! C3: Ring & Double Buffer

pub mod double_buffer;
pub mod ring;

pub use double_buffer::DoubleBuffer;
pub use ring::{RingRange, TimeRing};
