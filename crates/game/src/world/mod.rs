mod bounds;
mod terrain;

pub use bounds::WorldBounds;
pub use terrain::{HeightMap, TerrainError};

use glam::Vec3;

use crate::collision::{Aabb, CollisionMesh, Triangle};

/// Static level geometry: bounds, optional terrain and loose triangles.
#[derive(Debug, Clone)]
pub struct World {
    bounds: WorldBounds,
    terrain: Option<HeightMap>,
    statics: Vec<(Triangle, Aabb)>,
}

impl Default for World {
    fn default() -> Self {
        let bounds = WorldBounds::default();
        let size = bounds.max - bounds.min;
        let terrain = HeightMap::flat(
            bounds.min,
            1.0,
            size.x as usize + 1,
            size.y as usize + 1,
        )
        .ok();

        Self {
            bounds,
            terrain,
            statics: Vec::new(),
        }
    }
}

impl World {
    pub fn new(bounds: WorldBounds) -> Self {
        Self {
            bounds,
            terrain: None,
            statics: Vec::new(),
        }
    }

    pub fn with_terrain(mut self, terrain: HeightMap) -> Self {
        self.terrain = Some(terrain);
        self
    }

    pub fn add_triangles(&mut self, triangles: impl IntoIterator<Item = Triangle>) {
        self.statics
            .extend(triangles.into_iter().map(|tri| (tri, tri.bounds())));
    }

    /// Places a mesh as static geometry at `position`.
    pub fn add_mesh(&mut self, mesh: &CollisionMesh, position: Vec3) {
        self.add_triangles(mesh.triangles().map(|tri| tri.translated(position)));
    }

    /// Adds an axis-aligned box as twelve triangles.
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3) {
        let corner = |x: f32, y: f32, z: f32| center + half_extents * Vec3::new(x, y, z);
        let [a, b, c, d] = [
            corner(-1.0, -1.0, -1.0),
            corner(1.0, -1.0, -1.0),
            corner(1.0, -1.0, 1.0),
            corner(-1.0, -1.0, 1.0),
        ];
        let [e, f, g, h] = [
            corner(-1.0, 1.0, -1.0),
            corner(1.0, 1.0, -1.0),
            corner(1.0, 1.0, 1.0),
            corner(-1.0, 1.0, 1.0),
        ];

        let quads = [
            [a, b, c, d],
            [e, h, g, f],
            [a, e, f, b],
            [b, f, g, c],
            [c, g, h, d],
            [d, h, e, a],
        ];
        self.add_triangles(
            quads
                .into_iter()
                .flat_map(|[p, q, r, s]| [Triangle::new(p, q, r), Triangle::new(p, r, s)]),
        );
    }

    pub fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    pub fn terrain(&self) -> Option<&HeightMap> {
        self.terrain.as_ref()
    }

    pub fn static_triangle_count(&self) -> usize {
        self.statics.len()
    }

    /// Terrain height under `(x, z)`; zero where there is no terrain.
    pub fn height(&self, x: f32, z: f32) -> f32 {
        self.terrain
            .as_ref()
            .and_then(|terrain| terrain.height(x, z))
            .unwrap_or(0.0)
    }

    /// Appends every static triangle whose bounds overlap `region`.
    pub fn gather(&self, region: &Aabb, out: &mut Vec<Triangle>) {
        if let Some(terrain) = &self.terrain {
            out.extend(terrain.triangles_in(region));
        }
        out.extend(
            self.statics
                .iter()
                .filter(|(_, bounds)| bounds.overlaps(region))
                .map(|(tri, _)| *tri),
        );
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;

    #[test]
    fn default_world_is_flat_and_bounded() {
        let world = World::default();
        assert_eq!(world.bounds().max, Vec2::splat(32.0));
        assert_eq!(world.height(3.5, -12.25), 0.0);
        assert_eq!(world.height(100.0, 0.0), 0.0);

        let region = Aabb {
            min: Vec3::new(-0.5, -0.5, -0.5),
            max: Vec3::new(0.5, 0.5, 0.5),
        };
        let mut found = Vec::new();
        world.gather(&region, &mut found);
        assert!(!found.is_empty());
    }

    #[test]
    fn gather_filters_by_bounds() {
        let mut world = World::new(WorldBounds::square(10.0));
        world.add_box(Vec3::new(5.0, 1.0, 0.0), Vec3::ONE);
        assert_eq!(world.static_triangle_count(), 12);

        let near = Aabb {
            min: Vec3::new(3.5, 0.0, -0.5),
            max: Vec3::new(4.5, 2.0, 0.5),
        };
        let far = Aabb {
            min: Vec3::new(-5.0, 0.0, -5.0),
            max: Vec3::new(-4.0, 1.0, -4.0),
        };

        let mut found = Vec::new();
        world.gather(&near, &mut found);
        assert!(!found.is_empty());

        found.clear();
        world.gather(&far, &mut found);
        assert!(found.is_empty());
    }

    #[test]
    fn mesh_is_placed_at_position() {
        let panel = CollisionMesh::from_triangles(&[Triangle::new(
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        )]);
        let mut world = World::new(WorldBounds::square(10.0));
        world.add_mesh(&panel, Vec3::new(4.0, 0.0, 4.0));
        assert_eq!(world.static_triangle_count(), 1);

        let mut found = Vec::new();
        world.gather(&Aabb::from_points([Vec3::splat(3.9), Vec3::splat(4.1)]), &mut found);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].a, Vec3::new(4.0, 0.0, 4.0));

        found.clear();
        world.gather(&Aabb::from_points([Vec3::ZERO, Vec3::ONE]), &mut found);
        assert!(found.is_empty());
    }
}
