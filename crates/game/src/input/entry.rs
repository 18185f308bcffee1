use bitflags::bitflags;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::object::ObjectId;

bitflags! {
    /// Channels carried by an input entry. Movement and direction change
    /// independently, so an entry may carry either or both.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct InputMask: u8 {
        const MOVEMENT = 1 << 0;
        const DIRECTION = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEntry {
    pub object_id: ObjectId,
    pub mask: InputMask,
    pub timestamp: u32,
    pub movement: Vec2,
    pub direction: Vec3,
}

impl InputEntry {
    pub fn new(object_id: ObjectId, timestamp: u32) -> Self {
        Self {
            object_id,
            mask: InputMask::empty(),
            timestamp,
            movement: Vec2::ZERO,
            direction: Vec3::ZERO,
        }
    }

    pub fn with_movement(mut self, movement: Vec2) -> Self {
        self.mask |= InputMask::MOVEMENT;
        self.movement = movement;
        self
    }

    pub fn with_direction(mut self, direction: Vec3) -> Self {
        self.mask |= InputMask::DIRECTION;
        self.direction = direction;
        self
    }

    /// Folds the channels present in `mask` into this entry. Channels absent
    /// from `mask` keep their previous value.
    pub fn merge(&mut self, mask: InputMask, movement: Option<Vec2>, direction: Option<Vec3>) {
        self.mask |= mask;
        if mask.contains(InputMask::MOVEMENT) {
            if let Some(movement) = movement {
                self.movement = movement;
            }
        }
        if mask.contains(InputMask::DIRECTION) {
            if let Some(direction) = direction {
                self.direction = direction;
            }
        }
    }

    pub fn has(&self, channel: InputMask) -> bool {
        self.mask.contains(channel)
    }
}
