//! Sample quality flags (§3 Data Model)
//!
//! A small bitset rather than a single enum: the spec requires several of
//! these to be simultaneously true (e.g. a filter in warm-up right after a
//! gap is both `Transient` and `Missing`), and every transform in the
//! pipeline must OR its input flags into its output.

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality(pub u8);

impl Quality {
    pub const NORMAL: Quality = Quality(0);
    pub const MISSING: Quality = Quality(1 << 0);
    pub const TRANSIENT: Quality = Quality(1 << 1);
    pub const SATURATED: Quality = Quality(1 << 2);
    pub const LEAD_OFF: Quality = Quality(1 << 3);
    pub const OFFLINE: Quality = Quality(1 << 4);

    pub fn contains(self, flag: Quality) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn is_normal(self) -> bool {
        self.0 == 0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::NORMAL
    }
}

impl BitOr for Quality {
    type Output = Quality;
    fn bitor(self, rhs: Quality) -> Quality {
        Quality(self.0 | rhs.0)
    }
}

impl BitOrAssign for Quality {
    fn bitor_assign(&mut self, rhs: Quality) {
        self.0 |= rhs.0;
    }
}
