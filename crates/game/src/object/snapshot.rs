use bitflags::bitflags;
use glam::{Vec2, Vec3};
use rkyv::util::AlignedVec;
use rkyv::{rancor, Archive, Deserialize, Serialize};

use crate::model::ModelId;

use super::mask::ObjectMask;
use super::state::{ObjectId, ObjectSpawn};
use super::table::ObjectTable;

bitflags! {
    /// Fields a replication request asks for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Attributes: u16 {
        const ID = 1 << 0;
        const MASK = 1 << 1;
        const POSITION = 1 << 2;
        const VELOCITY = 1 << 3;
        const MOVEMENT = 1 << 4;
        const DIRECTION = 1 << 5;
        const DATA = 1 << 6;
        const MODEL = 1 << 7;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ObjectRecord {
    pub id: Option<ObjectId>,
    pub mask: Option<u32>,
    pub position: Option<[f32; 3]>,
    pub velocity: Option<[f32; 3]>,
    pub movement: Option<[f32; 2]>,
    pub direction: Option<[f32; 3]>,
    pub data: Option<Vec<u8>>,
    pub model: Option<ModelId>,
}

impl ObjectRecord {
    /// Spawn description for a replicated object. Needs at least the id, the
    /// mask and the position.
    pub fn to_spawn(&self) -> Option<ObjectSpawn> {
        let id = self.id?;
        let mask = ObjectMask::from_bits(self.mask?)?;
        let position = Vec3::from(self.position?);

        let mut spawn = ObjectSpawn::new(id, mask, position);
        if let Some(data) = &self.data {
            spawn.data = data.clone();
        }
        spawn.model = self.model;
        Some(spawn)
    }

    pub fn velocity(&self) -> Option<Vec3> {
        self.velocity.map(Vec3::from)
    }

    pub fn movement(&self) -> Option<Vec2> {
        self.movement.map(Vec2::from)
    }

    pub fn direction(&self) -> Option<Vec3> {
        self.direction.map(Vec3::from)
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ObjectSnapshot {
    pub timestamp: u32,
    pub records: Vec<ObjectRecord>,
}

impl ObjectTable {
    pub fn collect(
        &self,
        attributes: Attributes,
        ids: &[ObjectId],
        timestamp: u32,
    ) -> ObjectSnapshot {
        ObjectSnapshot::collect(self, attributes, ids, timestamp)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl ObjectSnapshot {
    /// Collects the requested attributes for every live object in `ids`.
    /// Unknown ids are skipped.
    pub fn collect(
        table: &ObjectTable,
        attributes: Attributes,
        ids: &[ObjectId],
        timestamp: u32,
    ) -> Self {
        let records = ids
            .iter()
            .filter_map(|&id| table.by_id(id))
            .map(|object| {
                let state = object.state();
                let mut record = ObjectRecord::default();
                if attributes.contains(Attributes::ID) {
                    record.id = Some(object.id());
                }
                if attributes.contains(Attributes::MASK) {
                    record.mask = Some(object.mask().bits());
                }
                if attributes.contains(Attributes::POSITION) {
                    record.position = Some(state.position.to_array());
                }
                if attributes.contains(Attributes::VELOCITY) {
                    record.velocity = Some(state.velocity.to_array());
                }
                if attributes.contains(Attributes::MOVEMENT) {
                    record.movement = Some(state.movement.to_array());
                }
                if attributes.contains(Attributes::DIRECTION) {
                    record.direction = Some(state.direction.to_array());
                }
                if attributes.contains(Attributes::DATA) && object.has(ObjectMask::DATA) {
                    record.data = Some(object.data.clone());
                }
                if attributes.contains(Attributes::MODEL) {
                    record.model = object.model;
                }
                record
            })
            .collect();

        Self { timestamp, records }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SnapshotError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(SnapshotError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, SnapshotError> {
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(SnapshotError::Deserialize)
    }
}
