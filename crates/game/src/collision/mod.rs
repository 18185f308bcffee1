mod mesh;
mod resolver;
mod sweep;

pub use mesh::{Aabb, CollisionMesh, Ellipsoid, MeshError, Triangle};
pub use resolver::{CollisionResolver, Resolution, MAX_SLIDE_ITERATIONS, VERY_CLOSE_DISTANCE};
pub use sweep::{Plane, Sweep, SweepHit};
