use glam::{Vec2, Vec3};

use glide::{
    CollisionModel, Ellipsoid, InputEntry, ModelRegistry, ObjectMask, ObjectSpawn, SimConfig,
    Simulation, World,
};

const OBJECTS: u32 = 4;

fn build() -> Simulation {
    let mut world = World::default();
    world.add_box(Vec3::new(4.0, 1.0, 0.0), Vec3::new(0.5, 1.0, 3.0));

    let mut models = ModelRegistry::new();
    let shape = Ellipsoid::new(Vec3::new(0.0, 0.5, 0.0), Vec3::splat(0.5)).unwrap();
    let body = models.register(CollisionModel::new(shape));

    let mut sim = Simulation::new(SimConfig::default(), world, models);
    let mask = ObjectMask::MOVE | ObjectMask::GRAV | ObjectMask::SOLID | ObjectMask::MODEL;
    for id in 1..=OBJECTS {
        let position = Vec3::new(-6.0 + id as f32 * 2.0, 0.5, -3.0);
        sim.spawn(ObjectSpawn::new(id, mask, position).with_model(body), 0)
            .unwrap();
    }
    sim
}

fn script() -> Vec<InputEntry> {
    let mut entries = Vec::new();
    for step in 0..20u32 {
        for id in 1..=OBJECTS {
            let angle = (step * 7 + id * 3) as f32 * 0.4;
            entries.push(
                InputEntry::new(id, step * 100)
                    .with_movement(Vec2::new(angle.cos(), angle.sin()))
                    .with_direction(Vec3::new(angle.sin(), 0.0, angle.cos())),
            );
        }
    }
    entries
}

fn bits(sim: &Simulation) -> Vec<[u32; 6]> {
    sim.table()
        .iter()
        .map(|object| {
            let p = object.state().position;
            let v = object.state().velocity;
            [p.x, p.y, p.z, v.x, v.y, v.z].map(f32::to_bits)
        })
        .collect()
}

fn run_in_order(entries: &[InputEntry]) -> Simulation {
    let mut sim = build();
    let mut now = 0;
    for entry in entries {
        while now < entry.timestamp {
            now += 20;
            sim.step(now);
        }
        sim.push_input(entry).unwrap();
    }
    sim.step(2_400);
    sim
}

#[test]
fn test_identical_input_is_bit_identical() {
    let entries = script();
    let a = run_in_order(&entries);
    let b = run_in_order(&entries);

    assert_eq!(bits(&a), bits(&b));
    assert_eq!(a.time(), 2_400);
}

#[test]
fn test_late_input_matches_in_order_arrival() {
    let entries = script();
    let reference = run_in_order(&entries);

    // Deliver every second of input in one late, reversed burst.
    let mut late = build();
    for chunk in entries.chunks(OBJECTS as usize * 10) {
        let arrival = chunk.last().map_or(0, |e| e.timestamp) + 250;
        late.step(arrival);
        for entry in chunk.iter().rev() {
            late.push_input(entry).unwrap();
        }
        let report = late.step(arrival);
        assert!(report.rewound_from.is_some());
    }
    late.step(2_400);

    assert_eq!(bits(&late), bits(&reference));
}

#[test]
fn test_rewind_rederives_from_earliest_change() {
    let mut sim = build();
    sim.step(1_000);

    sim.push_input(&InputEntry::new(2, 600).with_movement(Vec2::X))
        .unwrap();
    sim.push_input(&InputEntry::new(3, 400).with_movement(Vec2::Y))
        .unwrap();
    let report = sim.step(1_000);

    assert_eq!(report.rewound_from, Some(400));
    // Every object replays 30 ticks.
    assert_eq!(report.ticks_run, 30 * OBJECTS);
}
