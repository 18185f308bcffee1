use glam::Vec3;

use crate::collision::{Aabb, CollisionResolver, Ellipsoid, Triangle};
use crate::object::{ObjectMask, ObjectState};
use crate::world::World;

use super::config::SimConfig;

/// Source of collision geometry around a moving object.
pub trait Obstacles {
    fn gather(&self, region: &Aabb, out: &mut Vec<Triangle>);
}

impl Obstacles for World {
    fn gather(&self, region: &Aabb, out: &mut Vec<Triangle>) {
        World::gather(self, region, out);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickOutcome {
    pub horizontal_hit: bool,
    pub vertical_hit: bool,
    pub clamped: bool,
}

/// Fixed-tick point-mass integration with a horizontal and a vertical
/// collision pass.
#[derive(Debug, Clone)]
pub struct Integrator {
    dt: f32,
    damping: f32,
    acceleration: f32,
    gravity: f32,
    resolver: CollisionResolver,
}

impl Integrator {
    pub fn new(config: &SimConfig) -> Self {
        let dt = config.dt();
        Self {
            dt,
            damping: 1.0 - config.friction * dt,
            acceleration: config.movement_speed * config.acceleration_scale * dt,
            gravity: config.gravity * config.acceleration_scale * dt,
            resolver: CollisionResolver::new(config.collision_epsilon),
        }
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Advances one object by one tick. `shape` is the object's collision
    /// volume; without one a SOLID object moves unobstructed.
    pub fn advance(
        &self,
        mask: ObjectMask,
        state: &mut ObjectState,
        shape: Option<&Ellipsoid>,
        obstacles: &impl Obstacles,
        world: &World,
        scratch: &mut Vec<Triangle>,
    ) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let solid = shape.filter(|_| mask.contains(ObjectMask::SOLID));
        let gravity = mask.contains(ObjectMask::GRAV);

        state.velocity *= self.damping;
        state.velocity += Vec3::new(state.movement.x, 0.0, state.movement.y) * self.acceleration;
        if gravity {
            state.velocity.y -= self.gravity;
        }

        let mut horizontal = state.velocity * self.dt;
        horizontal.y = 0.0;

        match solid {
            Some(shape) => {
                let (position, hit) =
                    self.sweep(state.position, horizontal, shape, obstacles, scratch);
                state.position = position;
                if let Some(normal) = hit {
                    outcome.horizontal_hit = true;
                    clip_horizontal(&mut state.velocity, normal);
                }
            }
            None => state.position += horizontal,
        }

        if gravity {
            let vertical = Vec3::new(0.0, state.velocity.y * self.dt, 0.0);
            match solid {
                Some(shape) => {
                    let (position, hit) =
                        self.sweep(state.position, vertical, shape, obstacles, scratch);
                    state.position = position;
                    if hit.is_some() {
                        outcome.vertical_hit = true;
                        state.velocity.y = 0.0;
                    }
                }
                None => {
                    state.position += vertical;
                    let ground = world.height(state.position.x, state.position.z);
                    if state.position.y < ground {
                        state.position.y = ground;
                        state.velocity.y = 0.0;
                        outcome.vertical_hit = true;
                    }
                }
            }
        }

        outcome.clamped = world
            .bounds()
            .clamp(&mut state.position, &mut state.velocity);

        if mask.contains(ObjectMask::RIG) {
            state.rig.aim(state.direction);
            if horizontal.length_squared() > f32::EPSILON {
                state.rig.animation_time += self.dt;
            }
        }

        outcome
    }

    fn sweep(
        &self,
        position: Vec3,
        delta: Vec3,
        shape: &Ellipsoid,
        obstacles: &impl Obstacles,
        scratch: &mut Vec<Triangle>,
    ) -> (Vec3, Option<Vec3>) {
        if delta == Vec3::ZERO {
            return (position, None);
        }

        scratch.clear();
        let region = shape.swept_bounds(position, delta);
        obstacles.gather(&region, scratch);

        let resolution = self.resolver.resolve(position, delta, shape, scratch);
        let hit = resolution.collided.then_some(resolution.normal);
        (resolution.position, hit)
    }
}

/// Removes the horizontal velocity component pointing into `normal`.
fn clip_horizontal(velocity: &mut Vec3, normal: Vec3) {
    let normal = Vec3::new(normal.x, 0.0, normal.z).normalize_or_zero();
    let into = velocity.dot(normal);
    if into < 0.0 {
        *velocity -= normal * into;
    }
}
