use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Horizontal extent of the playable area on the x/z plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::square(32.0)
    }
}

impl WorldBounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn square(half_extent: f32) -> Self {
        Self::new(Vec2::splat(-half_extent), Vec2::splat(half_extent))
    }

    pub fn contains(&self, position: Vec3) -> bool {
        (self.min.x..=self.max.x).contains(&position.x)
            && (self.min.y..=self.max.y).contains(&position.z)
    }

    /// Pulls `position` back inside on x and z, zeroing the velocity
    /// component of every clamped axis. Returns whether anything changed.
    pub fn clamp(&self, position: &mut Vec3, velocity: &mut Vec3) -> bool {
        let mut clamped = false;

        if position.x < self.min.x || position.x > self.max.x {
            position.x = position.x.clamp(self.min.x, self.max.x);
            velocity.x = 0.0;
            clamped = true;
        }
        if position.z < self.min.y || position.z > self.max.y {
            position.z = position.z.clamp(self.min.y, self.max.y);
            velocity.z = 0.0;
            clamped = true;
        }

        clamped
    }
}
