use std::collections::BTreeMap;

use glam::Vec3;

use crate::object::{ObjectId, ObjectMask, ObjectTable, RigState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTransform {
    pub id: ObjectId,
    pub position: Vec3,
    pub direction: Vec3,
    pub rig: Option<RigState>,
}

/// Render-side copy of object transforms, blended between the previous and
/// the current committed tick. Never writes back into the table.
#[derive(Debug, Default)]
pub struct RenderInterpolator {
    transforms: BTreeMap<ObjectId, RenderTransform>,
}

impl RenderInterpolator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, table: &ObjectTable, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);

        self.transforms.clear();
        for object in table.iter() {
            let state = object.state();
            let position = state.previous_position.lerp(state.position, alpha);
            let direction = state.previous_direction.lerp(state.direction, alpha);
            let rig = object.has(ObjectMask::RIG).then_some(state.rig);

            self.transforms.insert(
                object.id(),
                RenderTransform {
                    id: object.id(),
                    position,
                    direction,
                    rig,
                },
            );
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&RenderTransform> {
        self.transforms.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderTransform> + '_ {
        self.transforms.values()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}
