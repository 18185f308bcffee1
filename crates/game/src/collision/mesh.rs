use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("ellipsoid radius on axis {axis} is not a positive finite number")]
    DegenerateRadius { axis: usize },
    #[error("triangle {triangle} references vertex {index}, mesh has {vertex_count}")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("mesh has {normals} normals for {triangles} triangles")]
    NormalCount { normals: usize, triangles: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |aabb, p| Self {
            min: aabb.min.min(p),
            max: aabb.max.max(p),
        })
    }

    pub fn expanded(self, margin: Vec3) -> Self {
        Self {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    pub fn translated(self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    pub fn translated(self, offset: Vec3) -> Self {
        Self::new(self.a + offset, self.b + offset, self.c + offset)
    }

    /// Component-wise scale, used to move triangles into ellipsoid space.
    pub fn scaled(self, scale: Vec3) -> Self {
        Self::new(self.a * scale, self.b * scale, self.c * scale)
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points([self.a, self.b, self.c])
    }
}

/// Collision volume of a moving object, in model space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    offset: Vec3,
    radii: Vec3,
}

impl Ellipsoid {
    pub fn new(offset: Vec3, radii: Vec3) -> Result<Self, MeshError> {
        for axis in 0..3 {
            let r = radii[axis];
            if !(r.is_finite() && r > 0.0) {
                return Err(MeshError::DegenerateRadius { axis });
            }
        }
        Ok(Self { offset, radii })
    }

    pub fn sphere(radius: f32) -> Result<Self, MeshError> {
        Self::new(Vec3::ZERO, Vec3::splat(radius))
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn radii(&self) -> Vec3 {
        self.radii
    }

    /// World-space bounds of the ellipsoid swept from `position` by `delta`.
    pub fn swept_bounds(&self, position: Vec3, delta: Vec3) -> Aabb {
        let center = position + self.offset;
        Aabb::from_points([center, center + delta]).expanded(self.radii)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionMesh {
    vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
    normals: Vec<Vec3>,
    bounds: Aabb,
}

impl CollisionMesh {
    /// Validates loader output. `normals` is either empty or holds one
    /// normal per triangle.
    pub fn new(
        vertices: Vec<Vec3>,
        indices: Vec<[u32; 3]>,
        normals: Vec<Vec3>,
    ) -> Result<Self, MeshError> {
        for (triangle, face) in indices.iter().enumerate() {
            if let Some(&index) = face.iter().find(|&&i| i as usize >= vertices.len()) {
                return Err(MeshError::IndexOutOfRange {
                    triangle,
                    index,
                    vertex_count: vertices.len(),
                });
            }
        }
        if !normals.is_empty() && normals.len() != indices.len() {
            return Err(MeshError::NormalCount {
                normals: normals.len(),
                triangles: indices.len(),
            });
        }

        let bounds = Aabb::from_points(vertices.iter().copied());
        Ok(Self {
            vertices,
            indices,
            normals,
            bounds,
        })
    }

    pub fn from_triangles(triangles: &[Triangle]) -> Self {
        let vertices: Vec<Vec3> = triangles.iter().flat_map(|t| [t.a, t.b, t.c]).collect();
        let indices = (0..triangles.len() as u32)
            .map(|i| [i * 3, i * 3 + 1, i * 3 + 2])
            .collect();
        let bounds = Aabb::from_points(vertices.iter().copied());
        Self {
            vertices,
            indices,
            normals: Vec::new(),
            bounds,
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.indices.iter().map(|&[a, b, c]| {
            Triangle::new(
                self.vertices[a as usize],
                self.vertices[b as usize],
                self.vertices[c as usize],
            )
        })
    }
}
