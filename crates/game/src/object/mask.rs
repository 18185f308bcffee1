use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Capabilities of a live object. A set bit means the buffers behind it
    /// are initialized; an empty mask marks a free slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ObjectMask: u32 {
        const MOVE = 1 << 0;
        const GRAV = 1 << 1;
        const SOLID = 1 << 2;
        const MODEL = 1 << 3;
        const RIG = 1 << 4;
        const DATA = 1 << 5;
    }
}

impl ObjectMask {
    pub const NONE: Self = Self::empty();

    /// Bits that can only be set together with [`ObjectMask::MODEL`].
    pub const NEEDS_MODEL: Self = Self::SOLID.union(Self::RIG);

    pub fn is_consistent(self) -> bool {
        !self.intersects(Self::NEEDS_MODEL) || self.contains(Self::MODEL)
    }
}
