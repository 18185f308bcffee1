use anyhow::{Context, Result};
use glam::{Vec2, Vec3};

use glide::{
    Attributes, CollisionMesh, CollisionModel, Ellipsoid, InputEntry, InputMask, ModelId,
    ModelRegistry, ObjectId, ObjectMask, ObjectSpawn, RenderInterpolator, Simulation, Triangle,
    World,
};

use crate::config::ReplayConfig;
use crate::link::{Link, LinkStats, SeededNoise};

#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub final_ms: u32,
    pub ticks_run: u64,
    pub rewinds: u64,
    pub link: LinkStats,
    pub inputs_dropped: u64,
    /// Objects whose state differs from the in-order run in any bit.
    pub mismatched: usize,
    pub max_divergence: f32,
    pub snapshot_bytes: usize,
}

/// Three copies of the same world: `client` owns and predicts the input,
/// `server` receives it late over the link, `reference` gets it in order.
pub struct Scenario {
    config: ReplayConfig,
    client: Simulation,
    server: Simulation,
    reference: Simulation,
    link: Link,
    script: SeededNoise,
    ids: Vec<ObjectId>,
}

fn build_world() -> Result<(World, ModelRegistry, ModelId)> {
    let mut world = World::default();
    world.add_box(Vec3::new(6.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 4.0));
    world.add_box(Vec3::new(-8.0, 0.5, 6.0), Vec3::new(3.0, 0.5, 1.0));
    world.add_box(Vec3::new(0.0, 2.0, -12.0), Vec3::new(10.0, 2.0, 0.5));

    let shape = Ellipsoid::new(Vec3::new(0.0, 0.9, 0.0), Vec3::new(0.4, 0.9, 0.4))
        .context("body ellipsoid")?;
    let hull = CollisionMesh::from_triangles(&[
        Triangle::new(
            Vec3::new(-0.4, 0.0, 0.0),
            Vec3::new(0.4, 0.0, 0.0),
            Vec3::new(0.0, 1.8, 0.0),
        ),
        Triangle::new(
            Vec3::new(0.0, 0.0, -0.4),
            Vec3::new(0.0, 0.0, 0.4),
            Vec3::new(0.0, 1.8, 0.0),
        ),
    ]);

    let mut models = ModelRegistry::new();
    let body = models.register(CollisionModel::new(shape).with_mesh(hull).rigged());
    Ok((world, models, body))
}

impl Scenario {
    pub fn new(config: ReplayConfig) -> Result<Self> {
        let (world, models, body) = build_world()?;

        let mut client = Simulation::new(config.sim.clone(), world.clone(), models.clone());
        let mut server = Simulation::new(config.sim.clone(), world.clone(), models.clone());
        let mut reference = Simulation::new(config.sim.clone(), world, models);

        let mask = ObjectMask::MOVE
            | ObjectMask::GRAV
            | ObjectMask::SOLID
            | ObjectMask::MODEL
            | ObjectMask::RIG;
        let mut ids = Vec::with_capacity(config.objects);
        for index in 0..config.objects {
            let id = index as ObjectId + 1;
            let angle = index as f32 / config.objects.max(1) as f32 * std::f32::consts::TAU;
            let position = Vec3::new(angle.cos() * 14.0, 1.0, angle.sin() * 14.0);
            let spawn = ObjectSpawn::new(id, mask, position).with_model(body);

            for sim in [&mut client, &mut server, &mut reference] {
                sim.spawn(spawn.clone(), 0)
                    .with_context(|| format!("spawning object {id}"))?;
            }
            ids.push(id);
        }

        Ok(Self {
            link: Link::new(config.link, config.seed),
            script: SeededNoise::new(config.seed.wrapping_mul(31).wrapping_add(17)),
            config,
            client,
            server,
            reference,
            ids,
        })
    }

    fn next_input(&mut self, id: ObjectId, timestamp: u32) -> InputEntry {
        let heading = self.script.unit() * std::f32::consts::TAU;
        let throttle = if self.script.unit() < 0.2 { 0.0 } else { 1.0 };
        let pitch = (self.script.unit() - 0.5) * 0.6;

        InputEntry::new(id, timestamp)
            .with_movement(Vec2::new(heading.cos(), heading.sin()) * throttle)
            .with_direction(Vec3::new(heading.cos(), pitch, heading.sin()))
    }

    pub fn run(mut self) -> Result<Outcome> {
        let tick_ms = self.config.sim.tick_ms.max(1);
        let end_ms = self.config.duration_ms;
        let input_interval = self.config.input_interval_ms.max(tick_ms);
        let send_interval = self.config.send_interval_ms.max(1);
        let final_ms = end_ms + send_interval + self.config.link.worst_delay_ms() + 2 * tick_ms;

        let frame_ms = tick_ms / 2 + 1;
        let mut outcome = Outcome::default();
        let mut interpolator = RenderInterpolator::new();
        let mut next_input = 0;
        let mut next_send = send_interval;
        let mut now = 0;

        while now <= final_ms {
            while next_input <= now && next_input < end_ms {
                for id in self.ids.clone() {
                    let entry = self.next_input(id, next_input);
                    self.client.record_local_input(
                        id,
                        next_input,
                        InputMask::MOVEMENT | InputMask::DIRECTION,
                        Some(entry.movement),
                        Some(entry.direction),
                    )?;
                    self.reference.push_input(&entry)?;
                }
                next_input += input_interval;
            }

            if now >= next_send {
                if let Some(batch) = self.client.outbound_batch()? {
                    self.link.send(now, batch);
                }
                next_send += send_interval;
            }

            for bytes in self.link.deliver(now) {
                self.server.receive(&bytes)?;
            }

            self.client.step(now);
            self.reference.step(now);
            let report = self.server.step(now);
            outcome.ticks_run += u64::from(report.ticks_run);
            if let Some(from) = report.rewound_from {
                outcome.rewinds += 1;
                log::debug!("server replayed from {from} at {now}");
            }

            interpolator.update(self.server.table(), self.server.interpolation_alpha(now));
            now += frame_ms;
        }

        if let Some(batch) = self.client.outbound_batch()? {
            self.link.send(now, batch);
        }
        for bytes in self.link.deliver(u32::MAX) {
            self.server.receive(&bytes)?;
        }

        self.client.step(final_ms);
        self.reference.step(final_ms);
        self.server.step(final_ms);

        for transform in interpolator.iter().take(3) {
            log::debug!(
                "object {} rendered at {:.3?} pitch {:?}",
                transform.id,
                transform.position,
                transform.rig.map(|rig| rig.aim_pitch)
            );
        }

        for &id in &self.ids {
            let served = self
                .server
                .table()
                .by_id(id)
                .with_context(|| format!("object {id} missing on server"))?
                .state();
            let expected = self
                .reference
                .table()
                .by_id(id)
                .with_context(|| format!("object {id} missing in reference"))?
                .state();

            let bits = |v: Vec3| v.to_array().map(f32::to_bits);
            if bits(served.position) != bits(expected.position)
                || bits(served.velocity) != bits(expected.velocity)
            {
                outcome.mismatched += 1;
            }
            outcome.max_divergence = outcome
                .max_divergence
                .max(served.position.distance(expected.position));
        }

        let snapshot = self.server.collect(Attributes::all(), &self.ids);
        outcome.snapshot_bytes = snapshot.serialize()?.len();
        outcome.final_ms = self.server.time();
        outcome.inputs_dropped = self.server.dropped_inputs();
        outcome.link = self.link.stats();
        Ok(outcome)
    }
}
