use glam::Vec3;

use super::mesh::{Ellipsoid, Triangle};
use super::sweep::{Plane, Sweep};

pub const MAX_SLIDE_ITERATIONS: usize = 5;
pub const VERY_CLOSE_DISTANCE: f32 = 0.005;

/// Outcome of moving an ellipsoid through a set of triangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub position: Vec3,
    pub collided: bool,
    /// World-space normal of the last sliding plane, zero if nothing was hit.
    pub normal: Vec3,
    pub iterations: usize,
}

impl Resolution {
    fn unobstructed(position: Vec3) -> Self {
        Self {
            position,
            collided: false,
            normal: Vec3::ZERO,
            iterations: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollisionResolver {
    pub epsilon: f32,
    pub max_iterations: usize,
}

impl Default for CollisionResolver {
    fn default() -> Self {
        Self {
            epsilon: VERY_CLOSE_DISTANCE,
            max_iterations: MAX_SLIDE_ITERATIONS,
        }
    }
}

impl CollisionResolver {
    pub fn new(epsilon: f32) -> Self {
        Self {
            epsilon,
            ..Self::default()
        }
    }

    /// Collide-and-slide: moves `position` by `delta`, sliding along
    /// whatever the ellipsoid touches. Triangles are world-space.
    pub fn resolve(
        &self,
        position: Vec3,
        delta: Vec3,
        shape: &Ellipsoid,
        triangles: &[Triangle],
    ) -> Resolution {
        if delta.length_squared() == 0.0 {
            return Resolution::unobstructed(position);
        }
        if triangles.is_empty() {
            return Resolution::unobstructed(position + delta);
        }

        let radii = shape.radii();
        let to_ellipsoid = radii.recip();
        let local: Vec<Triangle> = triangles
            .iter()
            .map(|tri| tri.scaled(to_ellipsoid))
            .collect();

        let mut base = (position + shape.offset()) * to_ellipsoid;
        let mut velocity = delta * to_ellipsoid;
        let mut collided = false;
        let mut slide_normal = Vec3::ZERO;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            if velocity.length() < self.epsilon {
                break;
            }
            iterations += 1;

            let mut sweep = Sweep::new(base, velocity);
            for tri in &local {
                sweep.test_triangle(tri.a, tri.b, tri.c);
            }

            let Some(hit) = sweep.hit() else {
                base += velocity;
                break;
            };
            collided = true;

            let destination = base + velocity;
            let direction = velocity.normalize();
            let mut contact = hit.point;

            if hit.distance >= self.epsilon {
                let travel = velocity.length().min(hit.distance - self.epsilon);
                base += direction * travel;
                contact -= direction * self.epsilon;
            }

            let normal = hit.normal;
            if normal == Vec3::ZERO {
                break;
            }
            slide_normal = normal;

            let plane = Plane::from_normal(contact, normal);
            let slide_destination = destination - normal * plane.signed_distance(destination);
            velocity = slide_destination - contact;
        }

        let normal = (slide_normal * to_ellipsoid).normalize_or_zero();
        Resolution {
            position: base * radii - shape.offset(),
            collided,
            normal,
            iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall_at_x(x: f32) -> Vec<Triangle> {
        vec![
            Triangle::new(
                Vec3::new(x, -10.0, -10.0),
                Vec3::new(x, -10.0, 10.0),
                Vec3::new(x, 10.0, 10.0),
            ),
            Triangle::new(
                Vec3::new(x, -10.0, -10.0),
                Vec3::new(x, 10.0, 10.0),
                Vec3::new(x, 10.0, -10.0),
            ),
        ]
    }

    #[test]
    fn zero_delta_is_a_no_op() {
        let resolver = CollisionResolver::default();
        let shape = Ellipsoid::sphere(1.0).unwrap();
        let result = resolver.resolve(Vec3::ONE, Vec3::ZERO, &shape, &wall_at_x(3.0));
        assert_eq!(result.position, Vec3::ONE);
        assert!(!result.collided);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn free_movement_passes_through() {
        let resolver = CollisionResolver::default();
        let shape = Ellipsoid::sphere(1.0).unwrap();
        let delta = Vec3::new(1.0, 0.0, 0.5);
        let result = resolver.resolve(Vec3::ZERO, delta, &shape, &wall_at_x(10.0));
        assert!((result.position - delta).length() < 1e-6);
        assert!(!result.collided);
        assert_eq!(result.normal, Vec3::ZERO);
    }

    #[test]
    fn perpendicular_wall_stops_short() {
        let resolver = CollisionResolver::default();
        let shape = Ellipsoid::sphere(1.0).unwrap();
        let result = resolver.resolve(
            Vec3::ZERO,
            Vec3::new(5.0, 0.0, 0.0),
            &shape,
            &wall_at_x(3.0),
        );

        assert!(result.collided);
        let gap = 3.0 - (result.position.x + 1.0);
        assert!(gap >= VERY_CLOSE_DISTANCE * 0.5);
        assert!(gap < 0.05);
        assert!((result.normal - Vec3::NEG_X).length() < 1e-3);
    }

    #[test]
    fn oblique_hit_slides_along_wall() {
        let resolver = CollisionResolver::default();
        let shape = Ellipsoid::sphere(1.0).unwrap();
        let result = resolver.resolve(
            Vec3::ZERO,
            Vec3::new(4.0, 0.0, 3.0),
            &shape,
            &wall_at_x(3.0),
        );

        assert!(result.collided);
        assert!(result.position.x < 2.0);
        // The tangential part of the motion survives the contact.
        assert!(result.position.z > 2.5);
    }

    #[test]
    fn parallel_motion_is_undeflected() {
        let resolver = CollisionResolver::default();
        let shape = Ellipsoid::sphere(1.0).unwrap();
        let start = Vec3::new(1.5, 0.0, 0.0);
        let delta = Vec3::new(0.0, 0.0, 4.0);
        let result = resolver.resolve(start, delta, &shape, &wall_at_x(3.0));
        assert!((result.position - (start + delta)).length() < 1e-5);
        assert!(!result.collided);
    }

    #[test]
    fn ellipsoid_radii_scale_contact() {
        let resolver = CollisionResolver::default();
        let shape = Ellipsoid::new(Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let result = resolver.resolve(
            Vec3::ZERO,
            Vec3::new(5.0, 0.0, 0.0),
            &shape,
            &wall_at_x(4.0),
        );
        assert!(result.collided);
        assert!(result.position.x < 2.0);
        assert!(result.position.x > 1.9);
    }

    #[test]
    fn narrow_wedge_uses_every_iteration() {
        let resolver = CollisionResolver::default();
        let shape = Ellipsoid::sphere(1.0).unwrap();

        // Two vertical walls meeting at the origin with a 40 degree opening
        // toward -x. Each slide along one wall runs into the other.
        let half_angle = 20f32.to_radians();
        let mut triangles = Vec::new();
        for side in [1.0, -1.0] {
            let far = Vec3::new(-20.0 * half_angle.cos(), 0.0, side * 20.0 * half_angle.sin());
            let low = Vec3::new(0.0, -10.0, 0.0);
            let high = Vec3::new(0.0, 10.0, 0.0);
            triangles.push(Triangle::new(low, high, far + high));
            triangles.push(Triangle::new(low, far + high, far + low));
        }

        let result = resolver.resolve(
            Vec3::new(-8.0, 0.0, 0.3),
            Vec3::new(8.0, 0.0, 0.0),
            &shape,
            &triangles,
        );
        assert_eq!(result.iterations, MAX_SLIDE_ITERATIONS);
        assert!(result.collided);
        assert!(result.position.is_finite());
        // Wedged where both walls touch the sphere, 1 / sin(20°) from the apex.
        assert!(result.position.x < -2.9 && result.position.x > -3.0);
        assert!(result.position.z.abs() < 0.05);
    }
}
