use glam::Vec3;

use crate::collision::{CollisionMesh, Ellipsoid, MeshError};

pub type ModelId = u16;

/// Collision-relevant part of a loaded model.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionModel {
    pub ellipsoid: Ellipsoid,
    pub mesh: Option<CollisionMesh>,
    pub rigged: bool,
}

impl CollisionModel {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            mesh: None,
            rigged: false,
        }
    }

    /// Builds a model from raw loader output: a triangle mesh plus the
    /// ellipsoid offset and radii.
    pub fn from_parts(
        vertices: Vec<Vec3>,
        indices: Vec<[u32; 3]>,
        normals: Vec<Vec3>,
        offset: Vec3,
        radii: Vec3,
    ) -> Result<Self, MeshError> {
        let ellipsoid = Ellipsoid::new(offset, radii)?;
        let mesh = if indices.is_empty() {
            None
        } else {
            Some(CollisionMesh::new(vertices, indices, normals)?)
        };
        Ok(Self {
            ellipsoid,
            mesh,
            rigged: false,
        })
    }

    pub fn with_mesh(mut self, mesh: CollisionMesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn rigged(mut self) -> Self {
        self.rigged = true;
        self
    }
}

#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: Vec<CollisionModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: CollisionModel) -> ModelId {
        let id = self.models.len() as ModelId;
        self.models.push(model);
        id
    }

    pub fn get(&self, id: ModelId) -> Option<&CollisionModel> {
        self.models.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_sequential_ids() {
        let mut registry = ModelRegistry::new();
        let a = registry.register(CollisionModel::new(Ellipsoid::sphere(0.5).unwrap()));
        let b = registry.register(CollisionModel::new(Ellipsoid::sphere(1.0).unwrap()).rigged());

        assert_eq!((a, b), (0, 1));
        assert!(registry.get(b).unwrap().rigged);
        assert!(registry.get(7).is_none());
    }

    #[test]
    fn from_parts_validates_mesh() {
        let model = CollisionModel::from_parts(
            vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            vec![[0, 1, 2]],
            Vec::new(),
            Vec3::Y,
            Vec3::ONE,
        )
        .unwrap();
        assert_eq!(model.mesh.as_ref().map(|m| m.triangle_count()), Some(1));
        assert_eq!(model.ellipsoid.offset(), Vec3::Y);

        let bad = CollisionModel::from_parts(
            vec![Vec3::ZERO],
            vec![[0, 1, 2]],
            Vec::new(),
            Vec3::ZERO,
            Vec3::ONE,
        );
        assert!(matches!(bad, Err(MeshError::IndexOutOfRange { .. })));

        let flat = CollisionModel::from_parts(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 1.0),
        );
        assert_eq!(flat, Err(MeshError::DegenerateRadius { axis: 1 }));
    }
}
