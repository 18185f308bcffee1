//! Unit sphere swept against triangles, everything in ellipsoid space.

use glam::Vec3;

const PARALLEL_EPSILON: f32 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub constant: f32,
}

impl Plane {
    pub fn from_normal(origin: Vec3, normal: Vec3) -> Self {
        Self {
            normal,
            constant: -normal.dot(origin),
        }
    }

    /// `None` for degenerate (zero-area) triangles.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        let normal = (b - a).cross(c - a).try_normalize()?;
        Some(Self::from_normal(a, normal))
    }

    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            constant: -self.constant,
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.constant
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Distance travelled along the sweep before touching.
    pub distance: f32,
    /// Point on the triangle that is touched first.
    pub point: Vec3,
    /// Unit normal at the contact, pointing from the triangle to the sphere.
    pub normal: Vec3,
}

/// One sweep of the unit sphere from `base` along `velocity`, keeping the
/// nearest contact over all tested triangles.
#[derive(Debug, Clone, Copy)]
pub struct Sweep {
    base: Vec3,
    velocity: Vec3,
    hit: Option<SweepHit>,
}

impl Sweep {
    pub fn new(base: Vec3, velocity: Vec3) -> Self {
        Self {
            base,
            velocity,
            hit: None,
        }
    }

    pub fn hit(&self) -> Option<SweepHit> {
        self.hit
    }

    pub fn test_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) {
        let Some(mut plane) = Plane::from_points(a, b, c) else {
            return;
        };
        // Winding from the loader is not trusted: face the plane toward the
        // sphere so meshes collide from either side.
        if plane.signed_distance(self.base) < 0.0 {
            plane = plane.flipped();
        }
        if plane.normal.dot(self.velocity) > 0.0 {
            return;
        }

        let distance = plane.signed_distance(self.base);
        let normal_dot_velocity = plane.normal.dot(self.velocity);

        let (t0, embedded) = if normal_dot_velocity.abs() < PARALLEL_EPSILON {
            if distance.abs() >= 1.0 {
                return;
            }
            (0.0, true)
        } else {
            let mut t0 = (-1.0 - distance) / normal_dot_velocity;
            let mut t1 = (1.0 - distance) / normal_dot_velocity;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            if t0 > 1.0 || t1 < 0.0 {
                return;
            }
            (t0.clamp(0.0, 1.0), false)
        };

        let mut contact: Option<(f32, Vec3)> = None;

        if !embedded {
            let plane_point = self.base - plane.normal + self.velocity * t0;
            if point_in_triangle(plane_point, a, b, c) {
                contact = Some((t0, plane_point));
            }
        }

        if contact.is_none() {
            let mut t = 1.0;
            let speed_sq = self.velocity.length_squared();

            for vertex in [a, b, c] {
                let qa = speed_sq;
                let qb = 2.0 * self.velocity.dot(self.base - vertex);
                let qc = (vertex - self.base).length_squared() - 1.0;
                if let Some(root) = lowest_root(qa, qb, qc, t) {
                    t = root;
                    contact = Some((root, vertex));
                }
            }

            for (start, end) in [(a, b), (b, c), (c, a)] {
                let edge = end - start;
                let base_to_vertex = start - self.base;
                let edge_sq = edge.length_squared();
                let edge_dot_velocity = edge.dot(self.velocity);
                let edge_dot_btv = edge.dot(base_to_vertex);

                let qa = edge_sq * -speed_sq + edge_dot_velocity * edge_dot_velocity;
                let qb = edge_sq * (2.0 * self.velocity.dot(base_to_vertex))
                    - 2.0 * edge_dot_velocity * edge_dot_btv;
                let qc = edge_sq * (1.0 - base_to_vertex.length_squared())
                    + edge_dot_btv * edge_dot_btv;

                if let Some(root) = lowest_root(qa, qb, qc, t) {
                    let f = (edge_dot_velocity * root - edge_dot_btv) / edge_sq;
                    if (0.0..=1.0).contains(&f) {
                        t = root;
                        contact = Some((root, start + edge * f));
                    }
                }
            }
        }

        if let Some((t, point)) = contact {
            let distance = t * self.velocity.length();
            if self.hit.is_none_or(|hit| distance < hit.distance) {
                let center = self.base + self.velocity * t;
                let normal = (center - point).try_normalize().unwrap_or(plane.normal);
                self.hit = Some(SweepHit {
                    distance,
                    point,
                    normal,
                });
            }
        }
    }
}

/// Smallest root of `a·x² + b·x + c` in `(0, max)`.
fn lowest_root(a: f32, b: f32, c: f32, max: f32) -> Option<f32> {
    if a.abs() < PARALLEL_EPSILON {
        return None;
    }
    let determinant = b * b - 4.0 * a * c;
    if determinant < 0.0 {
        return None;
    }

    let sqrt_d = determinant.sqrt();
    let mut r1 = (-b - sqrt_d) / (2.0 * a);
    let mut r2 = (-b + sqrt_d) / (2.0 * a);
    if r1 > r2 {
        std::mem::swap(&mut r1, &mut r2);
    }

    [r1, r2].into_iter().find(|&r| r > 0.0 && r < max)
}

fn point_in_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.dot(v0);
    let dot01 = v0.dot(v1);
    let dot02 = v0.dot(v2);
    let dot11 = v1.dot(v1);
    let dot12 = v1.dot(v2);

    let denominator = dot00 * dot11 - dot01 * dot01;
    if denominator.abs() < f32::EPSILON {
        return false;
    }
    let inv = 1.0 / denominator;
    let u = (dot11 * dot02 - dot01 * dot12) * inv;
    let v = (dot00 * dot12 - dot01 * dot02) * inv;

    u >= 0.0 && v >= 0.0 && u + v <= 1.0
}
