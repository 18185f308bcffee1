use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::input::InputLog;
use crate::model::ModelId;

use super::history::StateHistory;
use super::mask::ObjectMask;

pub type ObjectId = u32;

pub const MAX_PAYLOAD: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RigState {
    /// Degrees above the horizon the facing direction points at.
    pub aim_pitch: f32,
    pub animation_time: f32,
}

impl RigState {
    pub fn aim(&mut self, direction: Vec3) {
        let horizontal = Vec2::new(direction.x, direction.z).length();
        if horizontal > f32::EPSILON || direction.y.abs() > f32::EPSILON {
            self.aim_pitch = direction.y.atan2(horizontal).to_degrees();
        }
    }
}

/// Everything the integrator reads and writes for one object. Restoring one
/// of these from history is enough to replay the object from that tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub movement: Vec2,
    pub direction: Vec3,
    pub previous_position: Vec3,
    pub previous_direction: Vec3,
    pub rig: RigState,
}

impl ObjectState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            movement: Vec2::ZERO,
            direction: Vec3::Z,
            previous_position: position,
            previous_direction: Vec3::Z,
            rig: RigState::default(),
        }
    }
}

/// Authoritative correction for one object at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub timestamp: u32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub movement: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSpawn {
    pub id: ObjectId,
    pub mask: ObjectMask,
    pub position: Vec3,
    pub model: Option<ModelId>,
    pub data: Vec<u8>,
}

impl ObjectSpawn {
    pub fn new(id: ObjectId, mask: ObjectMask, position: Vec3) -> Self {
        Self {
            id,
            mask,
            position,
            model: None,
            data: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub(crate) id: ObjectId,
    pub(crate) mask: ObjectMask,
    pub(crate) state: ObjectState,
    pub(crate) model: Option<ModelId>,
    pub(crate) data: Vec<u8>,
    pub(crate) cursor: u32,
    pub(crate) spawn_tick: u32,
    pub(crate) log: InputLog,
    pub(crate) history: StateHistory,
    pub(crate) marker: Option<Marker>,
}

impl Object {
    pub(crate) fn new(
        spawn: &ObjectSpawn,
        tick: u32,
        log: InputLog,
        history: StateHistory,
    ) -> Self {
        let mut data = Vec::new();
        if spawn.mask.contains(ObjectMask::DATA) {
            let len = spawn.data.len().min(MAX_PAYLOAD);
            data.extend_from_slice(&spawn.data[..len]);
        }

        Self {
            id: spawn.id,
            mask: spawn.mask,
            state: ObjectState::at(spawn.position),
            model: spawn.model.filter(|_| spawn.mask.contains(ObjectMask::MODEL)),
            data,
            cursor: tick,
            spawn_tick: tick,
            log,
            history,
            marker: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn mask(&self) -> ObjectMask {
        self.mask
    }

    pub fn has(&self, capabilities: ObjectMask) -> bool {
        self.mask.contains(capabilities)
    }

    pub fn state(&self) -> &ObjectState {
        &self.state
    }

    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    pub fn direction(&self) -> Vec3 {
        self.state.direction
    }

    /// Timestamp of the next tick this object will simulate.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn spawn_tick(&self) -> u32 {
        self.spawn_tick
    }

    pub fn input_log(&self) -> &InputLog {
        &self.log
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }
}
