use serde::{Deserialize, Serialize};

use crate::collision::VERY_CLOSE_DISTANCE;
use crate::object::OBJECT_SLOTS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Length of one simulation tick in milliseconds.
    pub tick_ms: u32,
    pub friction: f32,
    pub movement_speed: f32,
    /// Multiplier on input and gravity acceleration.
    pub acceleration_scale: f32,
    pub gravity: f32,
    pub object_slots: usize,
    pub pipe_capacity: usize,
    pub log_capacity: usize,
    /// Ticks of per-object state kept for rewinds.
    pub history_capacity: usize,
    pub collision_epsilon: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: 20,
            friction: 4.0,
            movement_speed: 6.0,
            acceleration_scale: 4.0,
            gravity: 9.81,
            object_slots: OBJECT_SLOTS,
            pipe_capacity: 1024,
            log_capacity: 128,
            history_capacity: 128,
            collision_epsilon: VERY_CLOSE_DISTANCE,
        }
    }
}

impl SimConfig {
    pub fn dt(&self) -> f32 {
        self.tick_ms.max(1) as f32 / 1000.0
    }

    /// How far back in milliseconds a rewind can reach exactly.
    pub fn history_span_ms(&self) -> u32 {
        (self.history_capacity as u32).saturating_mul(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SimConfig::default();
        assert!((config.dt() - 0.02).abs() < f32::EPSILON);
        assert_eq!(config.object_slots, 256);
        assert_eq!(config.history_span_ms(), 2560);
    }
}
