use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use glam::{Vec2, Vec3};

use crate::model::ModelId;

use super::mask::ObjectMask;
use super::state::{Object, ObjectId, RigState, MAX_PAYLOAD};

pub const OBJECT_SLOTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("object table is full ({capacity} slots)")]
    Full { capacity: usize },
    #[error("slot {0} is out of range")]
    OutOfRange(usize),
    #[error("slot {0} is free")]
    Vacant(usize),
    #[error("handle for slot {0} refers to a freed object")]
    Stale(usize),
    #[error("object in slot {slot} lacks {required:?}")]
    MissingCapability { slot: usize, required: ObjectMask },
    #[error("mask {0:?} sets SOLID or RIG without MODEL")]
    InconsistentMask(ObjectMask),
    #[error("object id {0} is already live")]
    DuplicateId(ObjectId),
    #[error("no live object with id {0}")]
    UnknownId(ObjectId),
}

/// Slot index plus the generation it was issued under. A handle outlives
/// the object it named; using it afterwards yields [`TableError::Stale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    slot: u16,
    generation: u32,
}

impl ObjectHandle {
    pub fn slot(self) -> usize {
        self.slot as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: Option<Object>,
}

/// Fixed-capacity object store. Free slots are handed out lowest index
/// first; ids map to slots through an ordered index so iteration always runs
/// in ascending id order regardless of slot placement.
#[derive(Debug)]
pub struct ObjectTable {
    slots: Vec<Slot>,
    free: BinaryHeap<Reverse<usize>>,
    by_id: BTreeMap<ObjectId, usize>,
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new(OBJECT_SLOTS)
    }
}

impl ObjectTable {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(u16::MAX as usize + 1);
        Self {
            slots: (0..capacity)
                .map(|_| Slot {
                    generation: 0,
                    object: None,
                })
                .collect(),
            free: (0..capacity).map(Reverse).collect(),
            by_id: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Places a fully initialized object into the first free slot.
    pub fn allocate(&mut self, object: Object) -> Result<ObjectHandle, TableError> {
        if !object.mask.is_consistent() {
            return Err(TableError::InconsistentMask(object.mask));
        }
        if self.by_id.contains_key(&object.id) {
            return Err(TableError::DuplicateId(object.id));
        }
        let Reverse(slot) = self.free.pop().ok_or(TableError::Full {
            capacity: self.capacity(),
        })?;

        self.by_id.insert(object.id, slot);
        let entry = &mut self.slots[slot];
        entry.object = Some(object);

        Ok(ObjectHandle {
            slot: slot as u16,
            generation: entry.generation,
        })
    }

    /// Releases a slot. The slot becomes reusable immediately; handles issued
    /// for it go stale.
    pub fn free(&mut self, slot: usize) -> Result<Object, TableError> {
        let entry = self.slots.get_mut(slot).ok_or(TableError::OutOfRange(slot))?;
        let object = entry.object.take().ok_or(TableError::Vacant(slot))?;
        entry.generation = entry.generation.wrapping_add(1);

        self.by_id.remove(&object.id);
        self.free.push(Reverse(slot));
        Ok(object)
    }

    pub fn remove(&mut self, id: ObjectId) -> Result<Object, TableError> {
        let slot = self.slot_of(id).ok_or(TableError::UnknownId(id))?;
        self.free(slot)
    }

    pub fn slot_of(&self, id: ObjectId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub fn handle_of(&self, id: ObjectId) -> Option<ObjectHandle> {
        let slot = self.slot_of(id)?;
        Some(ObjectHandle {
            slot: slot as u16,
            generation: self.slots[slot].generation,
        })
    }

    pub fn get(&self, handle: ObjectHandle) -> Result<&Object, TableError> {
        let slot = handle.slot();
        let entry = self.slots.get(slot).ok_or(TableError::OutOfRange(slot))?;
        if entry.generation != handle.generation {
            return Err(TableError::Stale(slot));
        }
        entry.object.as_ref().ok_or(TableError::Vacant(slot))
    }

    fn get_mut(&mut self, handle: ObjectHandle) -> Result<&mut Object, TableError> {
        let slot = handle.slot();
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(TableError::OutOfRange(slot))?;
        if entry.generation != handle.generation {
            return Err(TableError::Stale(slot));
        }
        entry.object.as_mut().ok_or(TableError::Vacant(slot))
    }

    pub fn get_slot(&self, slot: usize) -> Result<&Object, TableError> {
        let entry = self.slots.get(slot).ok_or(TableError::OutOfRange(slot))?;
        entry.object.as_ref().ok_or(TableError::Vacant(slot))
    }

    fn require(&self, handle: ObjectHandle, required: ObjectMask) -> Result<&Object, TableError> {
        let object = self.get(handle)?;
        if !object.mask.contains(required) {
            return Err(TableError::MissingCapability {
                slot: handle.slot(),
                required,
            });
        }
        Ok(object)
    }

    fn require_mut(
        &mut self,
        handle: ObjectHandle,
        required: ObjectMask,
    ) -> Result<&mut Object, TableError> {
        let object = self.get_mut(handle)?;
        if !object.mask.contains(required) {
            return Err(TableError::MissingCapability {
                slot: handle.slot(),
                required,
            });
        }
        Ok(object)
    }

    pub fn by_id(&self, id: ObjectId) -> Option<&Object> {
        let slot = self.slot_of(id)?;
        self.slots[slot].object.as_ref()
    }

    pub(crate) fn by_id_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        let slot = self.slot_of(id)?;
        self.slots[slot].object.as_mut()
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.by_id.keys().copied()
    }

    /// Live objects in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Object> + '_ {
        self.by_id
            .values()
            .filter_map(|&slot| self.slots[slot].object.as_ref())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Object> + '_ {
        self.slots.iter_mut().filter_map(|s| s.object.as_mut())
    }

    pub fn position(&self, handle: ObjectHandle) -> Result<Vec3, TableError> {
        Ok(self.get(handle)?.state.position)
    }

    pub fn set_position(&mut self, handle: ObjectHandle, position: Vec3) -> Result<(), TableError> {
        self.get_mut(handle)?.state.position = position;
        Ok(())
    }

    pub fn direction(&self, handle: ObjectHandle) -> Result<Vec3, TableError> {
        Ok(self.get(handle)?.state.direction)
    }

    pub fn set_direction(
        &mut self,
        handle: ObjectHandle,
        direction: Vec3,
    ) -> Result<(), TableError> {
        self.get_mut(handle)?.state.direction = direction;
        Ok(())
    }

    pub fn velocity(&self, handle: ObjectHandle) -> Result<Vec3, TableError> {
        Ok(self.require(handle, ObjectMask::MOVE)?.state.velocity)
    }

    pub fn set_velocity(&mut self, handle: ObjectHandle, velocity: Vec3) -> Result<(), TableError> {
        self.require_mut(handle, ObjectMask::MOVE)?.state.velocity = velocity;
        Ok(())
    }

    pub fn movement(&self, handle: ObjectHandle) -> Result<Vec2, TableError> {
        Ok(self.require(handle, ObjectMask::MOVE)?.state.movement)
    }

    pub fn set_movement(&mut self, handle: ObjectHandle, movement: Vec2) -> Result<(), TableError> {
        self.require_mut(handle, ObjectMask::MOVE)?.state.movement = movement;
        Ok(())
    }

    pub fn model(&self, handle: ObjectHandle) -> Result<ModelId, TableError> {
        let object = self.require(handle, ObjectMask::MODEL)?;
        object.model.ok_or(TableError::MissingCapability {
            slot: handle.slot(),
            required: ObjectMask::MODEL,
        })
    }

    pub fn rig(&self, handle: ObjectHandle) -> Result<&RigState, TableError> {
        Ok(&self.require(handle, ObjectMask::RIG)?.state.rig)
    }

    pub fn data(&self, handle: ObjectHandle) -> Result<&[u8], TableError> {
        Ok(&self.require(handle, ObjectMask::DATA)?.data)
    }

    /// Replaces the payload, truncating it to [`MAX_PAYLOAD`] bytes.
    pub fn set_data(&mut self, handle: ObjectHandle, data: &[u8]) -> Result<(), TableError> {
        let object = self.require_mut(handle, ObjectMask::DATA)?;
        object.data.clear();
        object
            .data
            .extend_from_slice(&data[..data.len().min(MAX_PAYLOAD)]);
        Ok(())
    }

    /// Changes the capability mask. Newly granted bits get freshly
    /// initialized buffers; revoked bits leave theirs in place but unreachable.
    /// Granting MODEL requires a model to attach.
    pub fn set_mask(
        &mut self,
        handle: ObjectHandle,
        mask: ObjectMask,
        model: Option<ModelId>,
    ) -> Result<(), TableError> {
        if !mask.is_consistent() {
            return Err(TableError::InconsistentMask(mask));
        }
        if mask.is_empty() {
            self.get(handle)?;
            return self.free(handle.slot()).map(|_| ());
        }

        let slot = handle.slot();
        let object = self.get_mut(handle)?;
        let granted = mask.difference(object.mask);

        if granted.contains(ObjectMask::MODEL) {
            object.model = Some(model.ok_or(TableError::MissingCapability {
                slot,
                required: ObjectMask::MODEL,
            })?);
        }
        if granted.contains(ObjectMask::MOVE) {
            object.state.velocity = Vec3::ZERO;
            object.state.movement = Vec2::ZERO;
        }
        if granted.contains(ObjectMask::RIG) {
            object.state.rig = RigState::default();
            object.state.rig.aim(object.state.direction);
        }
        if granted.contains(ObjectMask::DATA) {
            object.data.clear();
        }

        object.mask = mask;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputLog;
    use crate::object::{ObjectSpawn, StateHistory};

    fn object(id: ObjectId, mask: ObjectMask) -> Object {
        let spawn = ObjectSpawn::new(id, mask, Vec3::new(id as f32, 0.0, 0.0));
        Object::new(&spawn, 0, InputLog::new(4), StateHistory::new(4, 20))
    }

    #[test]
    fn capacity_is_enforced() {
        let mut table = ObjectTable::default();
        for id in 0..OBJECT_SLOTS as u32 {
            table.allocate(object(id, ObjectMask::MOVE)).unwrap();
        }

        assert!(table.is_full());
        assert_eq!(
            table.allocate(object(9_999, ObjectMask::MOVE)),
            Err(TableError::Full {
                capacity: OBJECT_SLOTS
            })
        );
    }

    #[test]
    fn freed_slot_is_reused_and_old_id_forgotten() {
        let mut table = ObjectTable::new(4);
        let a = table.allocate(object(10, ObjectMask::MOVE)).unwrap();
        let b = table.allocate(object(20, ObjectMask::MOVE)).unwrap();
        assert_eq!((a.slot(), b.slot()), (0, 1));

        table.free(a.slot()).unwrap();
        assert!(table.by_id(10).is_none());
        assert_eq!(table.get(a).err(), Some(TableError::Stale(0)));

        let c = table.allocate(object(30, ObjectMask::MOVE)).unwrap();
        assert_eq!(c.slot(), 0);
        assert_eq!(table.by_id(30).map(Object::id), Some(30));
        assert!(table.by_id(10).is_none());
        assert_eq!(table.get(a).err(), Some(TableError::Stale(0)));
    }

    #[test]
    fn accessors_check_range_and_capability() {
        let mut table = ObjectTable::new(4);
        let plain = table.allocate(object(1, ObjectMask::GRAV)).unwrap();

        assert_eq!(
            table.velocity(plain),
            Err(TableError::MissingCapability {
                slot: 0,
                required: ObjectMask::MOVE
            })
        );
        assert!(matches!(
            table.data(plain),
            Err(TableError::MissingCapability { .. })
        ));
        assert_eq!(table.get_slot(3).map(Object::id), Err(TableError::Vacant(3)));
        assert_eq!(table.get_slot(99).map(Object::id), Err(TableError::OutOfRange(99)));
        assert_eq!(table.free(99).map(|o| o.id), Err(TableError::OutOfRange(99)));
        assert_eq!(table.free(3).map(|o| o.id), Err(TableError::Vacant(3)));

        assert!(table.set_position(plain, Vec3::ONE).is_ok());
        assert_eq!(table.position(plain), Ok(Vec3::ONE));
    }

    #[test]
    fn iteration_follows_ids_not_slots() {
        let mut table = ObjectTable::new(8);
        for id in [50, 7, 31] {
            table.allocate(object(id, ObjectMask::MOVE)).unwrap();
        }

        let ids: Vec<ObjectId> = table.iter().map(Object::id).collect();
        assert_eq!(ids, vec![7, 31, 50]);
    }

    #[test]
    fn duplicate_and_inconsistent_objects_are_rejected() {
        let mut table = ObjectTable::new(4);
        table.allocate(object(1, ObjectMask::MOVE)).unwrap();

        assert_eq!(
            table.allocate(object(1, ObjectMask::MOVE)),
            Err(TableError::DuplicateId(1))
        );
        assert_eq!(
            table.allocate(object(2, ObjectMask::SOLID)),
            Err(TableError::InconsistentMask(ObjectMask::SOLID))
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn granting_capabilities_initializes_buffers() {
        let mut table = ObjectTable::new(4);
        let handle = table.allocate(object(1, ObjectMask::GRAV)).unwrap();

        table
            .set_mask(handle, ObjectMask::GRAV | ObjectMask::DATA, None)
            .unwrap();
        table.set_data(handle, &[1, 2, 3]).unwrap();
        assert_eq!(table.data(handle), Ok(&[1u8, 2, 3][..]));

        assert!(matches!(
            table.set_mask(handle, ObjectMask::MODEL, None),
            Err(TableError::MissingCapability { .. })
        ));
        table.set_mask(handle, ObjectMask::MODEL, Some(4)).unwrap();
        assert_eq!(table.model(handle), Ok(4));
        assert!(table.data(handle).is_err());

        table.set_mask(handle, ObjectMask::NONE, None).unwrap();
        assert!(table.by_id(1).is_none());
    }
}
