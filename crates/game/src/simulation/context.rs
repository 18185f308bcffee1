use glam::{Vec2, Vec3};
use log::{debug, warn};

use crate::collision::{Aabb, Triangle};
use crate::error::{Error, Result};
use crate::input::{self, CodecError, InputEntry, InputLog, InputMask, InputPipe, LogError};
use crate::model::ModelRegistry;
use crate::object::{
    Attributes, Marker, Object, ObjectHandle, ObjectId, ObjectMask, ObjectRecord,
    ObjectSnapshot, ObjectSpawn, ObjectTable, StateHistory, TableError,
};
use crate::world::World;

use super::config::SimConfig;
use super::integrator::{Integrator, Obstacles};
use super::tick::TickClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Simulated up to the committed time with nothing to replay.
    Idle,
    /// Has ticks to run or replay on the next step.
    Advancing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Object ticks executed, counting replays.
    pub ticks_run: u32,
    pub rewound_from: Option<u32>,
    pub time: u32,
}

/// Static world plus every other solid object, as seen by one mover during
/// one tick.
struct Surroundings<'a> {
    world: &'a World,
    table: &'a ObjectTable,
    models: &'a ModelRegistry,
    mover: ObjectId,
    tick: u32,
}

impl Obstacles for Surroundings<'_> {
    fn gather(&self, region: &Aabb, out: &mut Vec<Triangle>) {
        self.world.gather(region, out);

        for other in self.table.iter() {
            if other.id() == self.mover
                || !other.has(ObjectMask::SOLID)
                || other.spawn_tick() > self.tick
            {
                continue;
            }
            let Some(mesh) = other
                .model
                .and_then(|id| self.models.get(id))
                .and_then(|model| model.mesh.as_ref())
            else {
                continue;
            };

            let offset = other.position();
            if !mesh.bounds().translated(offset).overlaps(region) {
                continue;
            }
            out.extend(
                mesh.triangles()
                    .map(|tri| tri.translated(offset))
                    .filter(|tri| tri.bounds().overlaps(region)),
            );
        }
    }
}

/// Owns the whole simulation: object table, input pipes, static world and
/// the model registry. Time only moves forward through [`Simulation::step`].
pub struct Simulation {
    config: SimConfig,
    clock: TickClock,
    integrator: Integrator,
    world: World,
    models: ModelRegistry,
    table: ObjectTable,
    inbound: InputPipe,
    outbound: InputPipe,
    time: u32,
    pending_rewind: Option<u32>,
    dropped_inputs: u64,
    scratch: Vec<Triangle>,
}

impl Simulation {
    pub fn new(config: SimConfig, world: World, models: ModelRegistry) -> Self {
        Self {
            clock: TickClock::new(config.tick_ms),
            integrator: Integrator::new(&config),
            table: ObjectTable::new(config.object_slots),
            inbound: InputPipe::new(config.pipe_capacity),
            outbound: InputPipe::new(config.pipe_capacity),
            config,
            world,
            models,
            time: 0,
            pending_rewind: None,
            dropped_inputs: 0,
            scratch: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn table(&self) -> &ObjectTable {
        &self.table
    }

    /// Tick every object has been simulated up to.
    pub fn time(&self) -> u32 {
        self.time
    }

    /// Inbound entries lost to a full pipe since creation.
    pub fn dropped_inputs(&self) -> u64 {
        self.dropped_inputs
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    pub fn spawn(
        &mut self,
        mut spawn: ObjectSpawn,
        timestamp: u32,
    ) -> Result<ObjectHandle, TableError> {
        let tick = self.clock.align(timestamp);

        if spawn.mask.contains(ObjectMask::GRAV) {
            let ground = self.world.height(spawn.position.x, spawn.position.z);
            spawn.position.y = spawn.position.y.max(ground);
        }

        let object = Object::new(
            &spawn,
            tick,
            InputLog::new(self.config.log_capacity),
            StateHistory::new(self.config.history_capacity, self.clock.tick_ms()),
        );
        let handle = self.table.allocate(object)?;

        if tick < self.time {
            debug!("object {} spawned at {tick}, behind time {}", spawn.id, self.time);
            self.request_rewind(tick);
        }
        Ok(handle)
    }

    pub fn despawn(&mut self, id: ObjectId) -> Result<Object, TableError> {
        self.table.remove(id)
    }

    /// Spawns an object from a replicated record, restoring whatever motion
    /// state the record carries.
    pub fn submit(&mut self, record: &ObjectRecord, timestamp: u32) -> Result<ObjectHandle> {
        let spawn = record.to_spawn().ok_or(Error::IncompleteRecord)?;
        let id = spawn.id;
        let handle = self.spawn(spawn, timestamp)?;

        if let Some(object) = self.table.by_id_mut(id) {
            if let Some(velocity) = record.velocity() {
                object.state.velocity = velocity;
            }
            if let Some(movement) = record.movement() {
                object.state.movement = movement;
            }
            if let Some(direction) = record.direction() {
                object.state.direction = direction;
                object.state.previous_direction = direction;
            }
        }
        Ok(handle)
    }

    pub fn push_input(&mut self, entry: &InputEntry) -> Result<(), input::PipeError> {
        self.inbound.push_entry(entry)
    }

    /// Unpacks a wire batch into the inbound pipe. Entries that no longer fit
    /// are dropped and counted. Returns how many new entries were queued.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<usize, CodecError> {
        let before = self.inbound.len();
        let rejected = self.inbound.unpack(bytes)?;

        for entry in &rejected {
            warn!(
                "dropping input for object {} at {}: pipe full",
                entry.object_id, entry.timestamp
            );
        }
        self.dropped_inputs += rejected.len() as u64;
        Ok(self.inbound.len() - before)
    }

    /// Predicts local input right away and queues it for sending.
    pub fn record_local_input(
        &mut self,
        id: ObjectId,
        timestamp: u32,
        mask: InputMask,
        movement: Option<Vec2>,
        direction: Option<Vec3>,
    ) -> Result<()> {
        let tick = self.clock.align(timestamp);
        let object = self.table.by_id_mut(id).ok_or(TableError::UnknownId(id))?;
        if !self.outbound.accepts(id, tick) {
            return Err(input::PipeError::Full {
                capacity: self.outbound.capacity(),
            }
            .into());
        }
        object.log.push(tick, mask, movement, direction)?;
        self.outbound.push(id, tick, mask, movement, direction)?;
        Ok(())
    }

    /// Packs queued outbound input, oldest first. Input separated by a gap
    /// wider than the wire delta goes out on a later call. `None` when there
    /// is nothing.
    pub fn outbound_batch(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        self.outbound.pack()
    }

    /// Schedules an authoritative correction. The object is re-simulated from
    /// the marker's tick on the next step.
    pub fn apply_marker(&mut self, id: ObjectId, mut marker: Marker) -> Result<(), TableError> {
        marker.timestamp = self.clock.align(marker.timestamp);
        let object = self.table.by_id_mut(id).ok_or(TableError::UnknownId(id))?;
        let cursor = object.cursor;
        object.marker = Some(marker);

        if marker.timestamp < cursor {
            self.request_rewind(marker.timestamp);
        }
        Ok(())
    }

    pub fn phase(&self, id: ObjectId) -> Option<Phase> {
        let object = self.table.by_id(id)?;
        let replay = object
            .log
            .earliest_change()
            .is_some_and(|ts| ts < object.cursor)
            || self.pending_rewind.is_some_and(|ts| ts < object.cursor);

        Some(if replay || object.cursor < self.time {
            Phase::Advancing
        } else {
            Phase::Idle
        })
    }

    pub fn interpolation_alpha(&self, now: u32) -> f32 {
        self.clock.alpha(now, self.time)
    }

    pub fn collect(&self, attributes: Attributes, ids: &[ObjectId]) -> ObjectSnapshot {
        self.table.collect(attributes, ids, self.time)
    }

    /// Drains pending input, rewinds if anything landed in the past and runs
    /// every object up to the tick containing `now`.
    pub fn step(&mut self, now: u32) -> StepReport {
        self.drain_inbound();

        let mut rewind = self.pending_rewind.take();
        for object in self.table.iter_mut() {
            if let Some(ts) = object.log.take_earliest_change() {
                if ts < object.cursor {
                    rewind = Some(rewind.map_or(ts, |r| r.min(ts)));
                }
            }
        }
        if let Some(point) = rewind {
            self.rewind_to(point);
        }

        let target = self.clock.align(now).max(self.time);
        let ticks_run = self.advance_to(target);
        self.time = target;

        StepReport {
            ticks_run,
            rewound_from: rewind,
            time: self.time,
        }
    }

    fn request_rewind(&mut self, tick: u32) {
        self.pending_rewind = Some(self.pending_rewind.map_or(tick, |r| r.min(tick)));
    }

    fn drain_inbound(&mut self) {
        let mut pulled = Vec::with_capacity(self.inbound.len());
        while let Some(entry) = self.inbound.pull() {
            pulled.push(entry);
        }

        // Oldest first so a full log evicts in order.
        for entry in pulled.iter().rev() {
            let tick = self.clock.align(entry.timestamp);
            let Some(object) = self.table.by_id_mut(entry.object_id) else {
                warn!("input for unknown object {} at {tick}", entry.object_id);
                continue;
            };

            let result = object.log.push(
                tick,
                entry.mask,
                Some(entry.movement),
                Some(entry.direction),
            );
            if let Err(LogError::Stale { timestamp, oldest }) = result {
                warn!(
                    "input for object {} at {timestamp} predates its log (oldest {oldest})",
                    entry.object_id
                );
            }
        }
    }

    fn rewind_to(&mut self, point: u32) {
        let point = self.clock.align(point);
        debug!("rewinding to {point} from {}", self.time);

        for object in self.table.iter_mut() {
            if object.cursor <= point {
                continue;
            }
            match object.history.restore_point(point) {
                Some((tick, state)) => {
                    if tick > point && tick != object.spawn_tick {
                        warn!(
                            "object {} rewound to {tick}, history does not reach {point}",
                            object.id
                        );
                    }
                    object.state = *state;
                    object.cursor = tick;

                    // A correction the history no longer reaches lands on the
                    // first tick that can still be replayed.
                    if let Some(marker) = object
                        .marker
                        .as_mut()
                        .filter(|m| m.timestamp >= point && m.timestamp < tick)
                    {
                        warn!(
                            "object {} marker at {} moved to {tick}",
                            object.id, marker.timestamp
                        );
                        marker.timestamp = tick;
                    }
                }
                None => warn!("object {} has no history to rewind to {point}", object.id),
            }
        }
    }

    fn advance_to(&mut self, target: u32) -> u32 {
        let mut ticks_run = 0;

        while let Some(run_ts) = self
            .table
            .iter()
            .map(|object| object.cursor)
            .filter(|&cursor| cursor < target)
            .min()
        {
            let ids: Vec<ObjectId> = self
                .table
                .iter()
                .filter(|object| object.cursor == run_ts)
                .map(|object| object.id)
                .collect();

            for id in ids {
                self.run_object_tick(id, run_ts);
                ticks_run += 1;
            }
        }

        ticks_run
    }

    fn run_object_tick(&mut self, id: ObjectId, run_ts: u32) {
        let tick_end = self.clock.next(run_ts);

        let Some(object) = self.table.by_id_mut(id) else {
            return;
        };
        object.history.push(run_ts, object.state);

        if let Some(marker) = object.marker.filter(|m| m.timestamp == run_ts) {
            object.state.position = marker.position;
            object.state.velocity = marker.velocity;
            object.state.movement = marker.movement;
        }

        let mut state = object.state;
        state.previous_position = state.position;
        state.previous_direction = state.direction;

        let can_move = object.has(ObjectMask::MOVE);
        for record in object
            .log
            .iterate_from(run_ts)
            .take_while(|record| record.timestamp < tick_end)
        {
            if can_move && record.mask.contains(InputMask::MOVEMENT) {
                state.movement = record.movement;
            }
            if record.mask.contains(InputMask::DIRECTION) {
                state.direction = record.direction;
            }
        }

        let mask = object.mask;
        let shape = object
            .model
            .and_then(|model| self.models.get(model))
            .map(|model| model.ellipsoid);

        if mask.contains(ObjectMask::MOVE) {
            let surroundings = Surroundings {
                world: &self.world,
                table: &self.table,
                models: &self.models,
                mover: id,
                tick: run_ts,
            };
            self.integrator.advance(
                mask,
                &mut state,
                shape.as_ref(),
                &surroundings,
                &self.world,
                &mut self.scratch,
            );
        } else if mask.contains(ObjectMask::RIG) {
            state.rig.aim(state.direction);
        }

        if let Some(object) = self.table.by_id_mut(id) {
            object.state = state;
            object.cursor = tick_end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionMesh, Ellipsoid};
    use crate::model::CollisionModel;
    use crate::world::WorldBounds;

    fn simulation() -> Simulation {
        Simulation::new(SimConfig::default(), World::default(), ModelRegistry::new())
    }

    fn walker(id: ObjectId) -> ObjectSpawn {
        ObjectSpawn::new(id, ObjectMask::MOVE, Vec3::ZERO)
    }

    fn forward(id: ObjectId, timestamp: u32) -> InputEntry {
        InputEntry::new(id, timestamp).with_movement(Vec2::new(1.0, 0.0))
    }

    #[test]
    fn step_runs_whole_ticks() {
        let mut sim = simulation();
        sim.spawn(walker(1), 1000).unwrap();

        let report = sim.step(1059);
        assert_eq!(report.ticks_run, 2);
        assert_eq!(report.time, 1040);
        assert_eq!(sim.table().by_id(1).unwrap().cursor(), 1040);
        assert_eq!(sim.phase(1), Some(Phase::Idle));
    }

    #[test]
    fn input_moves_object() {
        let mut sim = simulation();
        sim.spawn(walker(1), 0).unwrap();
        sim.push_input(&forward(1, 0)).unwrap();

        sim.step(200);
        let object = sim.table().by_id(1).unwrap();
        assert!(object.position().x > 0.0);
        assert_eq!(object.state().movement, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn late_input_rewinds() {
        let mut sim = simulation();
        sim.spawn(walker(1), 0).unwrap();
        sim.step(200);
        assert_eq!(sim.table().by_id(1).unwrap().position(), Vec3::ZERO);

        sim.push_input(&forward(1, 100)).unwrap();
        assert_eq!(sim.step(200).rewound_from, Some(100));
        assert!(sim.table().by_id(1).unwrap().position().x > 0.0);
    }

    #[test]
    fn unknown_object_input_is_ignored() {
        let mut sim = simulation();
        sim.spawn(walker(1), 0).unwrap();
        sim.push_input(&forward(9, 20)).unwrap();

        let report = sim.step(100);
        assert_eq!(report.rewound_from, None);
        assert_eq!(sim.inbound_len(), 0);
    }

    #[test]
    fn marker_overrides_state() {
        let mut sim = simulation();
        sim.spawn(walker(1), 0).unwrap();
        sim.step(200);

        let marker = Marker {
            timestamp: 100,
            position: Vec3::new(5.0, 0.0, 5.0),
            velocity: Vec3::ZERO,
            movement: Vec2::ZERO,
        };
        sim.apply_marker(1, marker).unwrap();
        assert_eq!(sim.phase(1), Some(Phase::Advancing));

        let report = sim.step(200);
        assert_eq!(report.rewound_from, Some(100));
        assert_eq!(sim.table().by_id(1).unwrap().position(), Vec3::new(5.0, 0.0, 5.0));
        assert_eq!(sim.apply_marker(4, marker), Err(TableError::UnknownId(4)));
    }

    #[test]
    fn marker_older_than_history_lands_on_oldest_tick() {
        let config = SimConfig {
            history_capacity: 4,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config, World::default(), ModelRegistry::new());
        sim.spawn(walker(1), 0).unwrap();
        sim.step(1000);

        let marker = Marker {
            timestamp: 100,
            position: Vec3::new(5.0, 0.0, 5.0),
            velocity: Vec3::ZERO,
            movement: Vec2::ZERO,
        };
        sim.apply_marker(1, marker).unwrap();

        let report = sim.step(1000);
        assert_eq!(report.rewound_from, Some(100));
        assert_eq!(report.ticks_run, 4);
        assert_eq!(sim.table().by_id(1).unwrap().position(), marker.position);
    }

    #[test]
    fn full_outbound_pipe_leaves_log_untouched() {
        let config = SimConfig {
            pipe_capacity: 1,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config, World::default(), ModelRegistry::new());
        sim.spawn(walker(1), 0).unwrap();

        sim.record_local_input(1, 0, InputMask::MOVEMENT, Some(Vec2::X), None)
            .unwrap();
        assert!(matches!(
            sim.record_local_input(1, 20, InputMask::MOVEMENT, Some(Vec2::Y), None),
            Err(Error::Pipe(input::PipeError::Full { capacity: 1 }))
        ));
        assert_eq!(sim.table().by_id(1).unwrap().input_log().len(), 1);

        // Same tick merges into the queued entry.
        sim.record_local_input(1, 5, InputMask::MOVEMENT, Some(Vec2::Y), None)
            .unwrap();
        assert_eq!(sim.table().by_id(1).unwrap().input_log().len(), 1);
    }

    #[test]
    fn wide_gap_in_outbound_input_is_sent_in_two_batches() {
        let mut sim = simulation();
        sim.spawn(walker(1), 0).unwrap();
        sim.record_local_input(1, 0, InputMask::MOVEMENT, Some(Vec2::X), None)
            .unwrap();
        sim.record_local_input(1, 70_000, InputMask::MOVEMENT, Some(Vec2::Y), None)
            .unwrap();

        let first = sim.outbound_batch().unwrap().unwrap();
        let second = sim.outbound_batch().unwrap().unwrap();
        assert_eq!(input::unpack(&first).unwrap().0[0].timestamp, 0);
        assert_eq!(input::unpack(&second).unwrap().0[0].timestamp, 70_000);
        assert!(sim.outbound_batch().unwrap().is_none());
    }

    #[test]
    fn local_input_is_predicted_and_queued() {
        let mut sim = simulation();
        sim.spawn(walker(1), 0).unwrap();

        sim.record_local_input(1, 45, InputMask::MOVEMENT, Some(Vec2::X), None)
            .unwrap();
        assert_eq!(sim.table().by_id(1).unwrap().input_log().len(), 1);

        let batch = sim.outbound_batch().unwrap().unwrap();
        let (entries, _) = input::unpack(&batch).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp, 40);
        assert!(sim.outbound_batch().unwrap().is_none());

        assert!(matches!(
            sim.record_local_input(2, 0, InputMask::MOVEMENT, Some(Vec2::X), None),
            Err(Error::Table(TableError::UnknownId(2)))
        ));
    }

    #[test]
    fn receive_counts_dropped_entries() {
        let config = SimConfig {
            pipe_capacity: 2,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config, World::default(), ModelRegistry::new());
        sim.spawn(walker(1), 0).unwrap();

        let entries: Vec<InputEntry> = (0..4).map(|i| forward(1, i * 20)).collect();
        let bytes = input::pack(&entries).unwrap();

        assert_eq!(sim.receive(&bytes), Ok(2));
        assert_eq!(sim.dropped_inputs(), 2);
        assert_eq!(
            sim.receive(&[0, 0]),
            Err(CodecError::Truncated {
                needed: 4,
                available: 2
            })
        );
    }

    #[test]
    fn submit_restores_replicated_state() {
        let mut sim = simulation();
        let record = ObjectRecord {
            id: Some(3),
            mask: Some((ObjectMask::MOVE | ObjectMask::GRAV).bits()),
            position: Some([1.0, -4.0, 1.0]),
            velocity: Some([0.5, 0.0, 0.0]),
            ..Default::default()
        };

        sim.submit(&record, 0).unwrap();
        let object = sim.table().by_id(3).unwrap();
        assert_eq!(object.position(), Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(object.state().velocity, Vec3::new(0.5, 0.0, 0.0));

        assert!(matches!(
            sim.submit(&ObjectRecord::default(), 0),
            Err(Error::IncompleteRecord)
        ));
    }

    #[test]
    fn solid_objects_block_each_other() {
        let mut models = ModelRegistry::new();
        let shape = Ellipsoid::new(Vec3::new(0.0, 0.5, 0.0), Vec3::splat(0.5)).unwrap();
        let panel = CollisionMesh::from_triangles(&[Triangle::new(
            Vec3::new(-0.5, -1.0, -2.0),
            Vec3::new(-0.5, -1.0, 2.0),
            Vec3::new(-0.5, 3.0, 0.0),
        )]);
        let body = models.register(CollisionModel::new(shape));
        let wall = models.register(CollisionModel::new(shape).with_mesh(panel));

        let world = World::new(WorldBounds::square(32.0));
        let mut sim = Simulation::new(SimConfig::default(), world, models);
        let solid = ObjectMask::MOVE | ObjectMask::SOLID | ObjectMask::MODEL;
        sim.spawn(ObjectSpawn::new(1, solid, Vec3::ZERO).with_model(body), 0)
            .unwrap();
        sim.spawn(
            ObjectSpawn::new(2, ObjectMask::SOLID | ObjectMask::MODEL, Vec3::new(3.0, 0.0, 0.0))
                .with_model(wall),
            0,
        )
        .unwrap();

        sim.push_input(&forward(1, 0)).unwrap();
        sim.step(2000);

        let x = sim.table().by_id(1).unwrap().position().x;
        assert!(x < 2.0);
        assert!(x > 1.8);
    }
}
