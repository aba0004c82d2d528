//! # Simulation Loop Integration Tests
//!
//! Determinism under irregular frame deltas, interpolation endpoints, and
//! the loop feeding the transform bridge.

use neocity_core::config::TimestepConfig;
use neocity_core::ecs::ComponentMask;
use neocity_core::memory::FramePools;
use neocity_core::sync::BridgeWriter;
use neocity_core::time::FixedClock;
use neocity_core::{
    CharacterStats, ComponentKind, CoreConfig, EntityId, Phase, Scheduler,
    SimulationLoop, Stat, SystemContext, SystemDescriptor, Transform, TransformBridge, World,
};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn moving_mask() -> ComponentMask {
    ComponentMask::of(&[
        ComponentKind::Transform,
        ComponentKind::RigidBody,
        ComponentKind::CharacterStats,
    ])
}

/// Velocity derived from the entity index.
#[allow(clippy::cast_precision_loss)]
fn velocity_of(id: EntityId) -> [f32; 3] {
    [id.index() as f32 * 0.1, 0.0, 1.0]
}

/// Integrates velocity into position and drains stamina, once per step.
fn build_loop(step_hz: u32) -> (SimulationLoop, Vec<EntityId>) {
    let config = CoreConfig {
        timestep: TimestepConfig {
            step_hz,
            max_frame_delta: 0.25,
        },
        ..CoreConfig::default()
    };
    let mut sim = SimulationLoop::new(
        World::new(256),
        Scheduler::new(),
        FixedClock::from_config(&config.timestep),
        FramePools::from_config(&config.pools),
    );

    let ids: Vec<_> = (0..100)
        .map(|_| sim.world_mut().spawn(moving_mask()))
        .collect();

    sim.scheduler_mut()
        .add_system(
            SystemDescriptor::new("integrate", Phase::Fixed)
                .reads(ComponentKind::RigidBody)
                .writes(ComponentKind::Transform)
                .query(ComponentMask::of(&[
                    ComponentKind::Transform,
                    ComponentKind::RigidBody,
                ])),
            |ctx: SystemContext<'_>| {
                for id in ctx.query.entities() {
                    let velocity = velocity_of(id);
                    if let Some(t) = ctx.components.get_mut::<Transform>(id.index()) {
                        for axis in 0..3 {
                            t.position[axis] += velocity[axis] * ctx.dt;
                        }
                    }
                }
            },
        )
        .unwrap();
    sim.scheduler_mut()
        .add_system(
            SystemDescriptor::new("fatigue", Phase::Fixed)
                .writes(ComponentKind::CharacterStats)
                .query(ComponentKind::CharacterStats)
                .priority(1),
            |ctx: SystemContext<'_>| {
                for id in ctx.query.entities() {
                    if let Some(stats) = ctx.components.get_mut::<CharacterStats>(id.index()) {
                        stats.adjust(Stat::Stamina, -ctx.dt);
                    }
                }
            },
        )
        .unwrap();

    (sim, ids)
}

fn snapshot(sim: &SimulationLoop, ids: &[EntityId]) -> Vec<([f32; 3], f32)> {
    ids.iter()
        .map(|&id| {
            (
                sim.world().position(id).unwrap(),
                sim.world().get::<CharacterStats>(id).unwrap().get(Stat::Stamina),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn identical_deltas_give_identical_runs(
        deltas in prop::collection::vec(0.0_f32..0.1, 1..120)
    ) {
        let (mut first, ids) = build_loop(60);
        let (mut second, _) = build_loop(60);

        for &dt in &deltas {
            first.tick(dt);
            second.tick(dt);
        }

        prop_assert_eq!(first.metrics(), second.metrics());
        prop_assert_eq!(snapshot(&first, &ids), snapshot(&second, &ids));
    }
}

#[test]
fn test_irregular_deltas_match_step_count() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    // 8 Hz: every delta below is a multiple of 1/64, so sums stay exact
    let (mut sim, _) = build_loop(8);
    let mut total = 0.0_f64;

    for _ in 0..500 {
        let dt = f32::from(rng.gen_range(0_u8..16)) / 64.0;
        total += f64::from(dt);
        sim.tick(dt);
        assert!(sim.metrics().steps_this_frame <= 2);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let expected = (total * 8.0).floor() as u64;
    assert_eq!(sim.metrics().total_fixed_steps, expected);
    assert_eq!(sim.metrics().total_frames, 500);
}

#[test]
fn test_interpolation_endpoints() {
    let (mut sim, ids) = build_loop(4);
    let id = ids[10];

    // Exactly one step: alpha 0, render pose equals the previous state
    sim.tick(0.25);
    assert_eq!(sim.metrics().alpha, 0.0);
    let previous = sim.world().previous_transform(id).unwrap().position;
    assert_eq!(sim.interpolated_transform(id).unwrap().position, previous);

    // Leftover of 0.125 at 4 Hz: alpha 0.5, halfway between states
    sim.tick(0.125);
    assert!((sim.metrics().alpha - 0.5).abs() < f32::EPSILON);
    let current = sim.world().position(id).unwrap();
    let previous = sim.world().previous_transform(id).unwrap().position;
    let pose = sim.interpolated_transform(id).unwrap().position;
    for axis in 0..3 {
        let halfway = previous[axis] + (current[axis] - previous[axis]) * 0.5;
        assert!((pose[axis] - halfway).abs() < 1e-5);
    }
}

#[test]
fn test_despawned_entity_has_no_render_pose() {
    let (mut sim, ids) = build_loop(60);
    sim.tick(0.02);
    assert!(sim.interpolated_transform(ids[0]).is_some());
    sim.world_mut().despawn(ids[0]);
    assert!(sim.interpolated_transform(ids[0]).is_none());
}

#[test]
fn test_loop_publishes_through_bridge() {
    let (mut sim, ids) = build_loop(4);
    let bridge = TransformBridge::new(sim.world().capacity());
    let (mut writer, reader): (BridgeWriter, _) = bridge.split().unwrap();

    sim.tick(0.25);
    let published = writer.publish_from_world(sim.world());
    writer.swap_page();

    assert_eq!(published, 100);
    assert_eq!(reader.entity_count(), 100);
    for &id in &ids {
        assert_eq!(
            reader.read(id.index()).unwrap().position,
            sim.world().position(id).unwrap()
        );
    }

    // A second world consumes the published page
    let mut mirror = World::new(256);
    for _ in 0..100 {
        mirror.spawn(ComponentKind::Transform.into());
    }
    assert_eq!(reader.apply_to_world(&mut mirror), 100);
    assert_eq!(mirror.position(ids[42]), sim.world().position(ids[42]));
}
