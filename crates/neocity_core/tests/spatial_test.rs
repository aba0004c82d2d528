//! # Spatial Integration Tests
//!
//! Hash grid queries against brute force, and streaming stability for an
//! observer oscillating across tier boundaries.

use neocity_core::config::StreamingConfig;
use neocity_core::{ChunkKey, ChunkTier, EntityId, SpatialHashGrid, StreamEvent, StreamingGrid};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

proptest! {
    #[test]
    fn query_radius_covers_every_entity_in_circle(
        points in prop::collection::vec((-500.0_f32..500.0, -500.0_f32..500.0), 1..150),
        center in (-500.0_f32..500.0, -500.0_f32..500.0),
        radius in 0.0_f32..120.0,
        cell_size in 4.0_f32..64.0,
    ) {
        let mut grid = SpatialHashGrid::new(cell_size);
        for (i, (x, z)) in points.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            grid.insert(EntityId::from_raw(i as u32), *x, *z);
        }

        let mut found = Vec::new();
        grid.query_radius(center.0, center.1, radius, &mut found);

        for (i, (x, z)) in points.iter().enumerate() {
            let inside = (x - center.0).hypot(z - center.1) <= radius;
            #[allow(clippy::cast_possible_truncation)]
            let id = EntityId::from_raw(i as u32);
            if inside {
                prop_assert!(found.contains(&id), "missed {:?} at ({}, {})", id, x, z);
            }
        }

        // Conservative, never more than one hit per entity
        let mut unique = found.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), found.len());
        prop_assert_eq!(grid.entity_count(), points.len());
    }
}

#[test]
fn test_random_walkers_stay_findable() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut grid = SpatialHashGrid::new(8.0);
    let mut positions: Vec<(f32, f32)> = (0..200)
        .map(|_| (rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0)))
        .collect();

    for (i, (x, z)) in positions.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        grid.insert(EntityId::from_raw(i as u32), *x, *z);
    }

    for _ in 0..50 {
        for (i, position) in positions.iter_mut().enumerate() {
            let next = (
                position.0 + rng.gen_range(-3.0..3.0),
                position.1 + rng.gen_range(-3.0..3.0),
            );
            #[allow(clippy::cast_possible_truncation)]
            grid.update(EntityId::from_raw(i as u32), position.0, position.1, next.0, next.1);
            *position = next;
        }
    }

    assert_eq!(grid.entity_count(), positions.len());
    let mut found = Vec::new();
    for (i, (x, z)) in positions.iter().enumerate() {
        found.clear();
        grid.query_radius(*x, *z, 0.0, &mut found);
        #[allow(clippy::cast_possible_truncation)]
        let id = EntityId::from_raw(i as u32);
        assert!(found.contains(&id));
    }
}

fn city_config() -> StreamingConfig {
    StreamingConfig {
        chunk_size: 16.0,
        high_distance: 64.0,
        medium_distance: 128.0,
        low_distance: 256.0,
        band: 8.0,
    }
}

#[test]
fn test_oscillating_observer_does_not_thrash() {
    let mut grid = StreamingGrid::new(city_config());
    let key = ChunkKey::new(0, 0);
    // Chunk (0, 0) is centered at (8, 8); put the observer on the
    // High/Medium boundary and wiggle inside the dead zone.
    let base_x = 8.0 + 64.0;
    grid.update(base_x - 2.0, 8.0, &mut ());
    let tier = grid.tier(key);
    assert_eq!(tier, ChunkTier::High);

    let mut events = Vec::new();
    for step in 0..100 {
        let offset = if step % 2 == 0 { 6.0 } else { -6.0 };
        grid.update(base_x + offset, 8.0, &mut events);
        assert_eq!(grid.tier(key), tier);
    }
    assert!(!events.iter().any(|event| matches!(
        event,
        StreamEvent::PriorityChange { key: k, .. } if *k == key
    )));
}

#[test]
fn test_wide_oscillation_changes_once_per_crossing() {
    let mut grid = StreamingGrid::new(city_config());
    let key = ChunkKey::new(0, 0);
    // Swing 12 units either side of the High/Medium boundary, band is 8
    let base_x = 8.0 + 64.0;
    grid.update(base_x - 2.0, 8.0, &mut ());
    assert_eq!(grid.tier(key), ChunkTier::High);

    for step in 0..100 {
        let mut events = Vec::new();
        let (offset, expected) = if step % 2 == 0 {
            (12.0, (ChunkTier::High, ChunkTier::Medium))
        } else {
            (-12.0, (ChunkTier::Medium, ChunkTier::High))
        };
        grid.update(base_x + offset, 8.0, &mut events);

        let changes: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::PriorityChange { key: k, from, to } if *k == key => {
                    Some((*from, *to))
                }
                _ => None,
            })
            .collect();
        assert_eq!(changes, vec![expected]);
        assert_eq!(grid.tier(key), expected.1);
    }
}

#[test]
fn test_walk_away_and_back() {
    let mut grid = StreamingGrid::new(city_config());
    let key = ChunkKey::new(0, 0);
    let mut events = Vec::new();

    let mut x = 8.0;
    grid.update(x, 8.0, &mut events);
    assert_eq!(grid.tier(key), ChunkTier::High);

    while x < 1000.0 {
        x += 4.0;
        grid.update(x, 8.0, &mut events);
    }
    assert_eq!(grid.tier(key), ChunkTier::Unloaded);

    let transitions: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::PriorityChange { key: k, from, to } if *k == key => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (ChunkTier::High, ChunkTier::Medium),
            (ChunkTier::Medium, ChunkTier::Low),
        ]
    );
    assert!(events.contains(&StreamEvent::Unload { key }));

    events.clear();
    while x > 8.0 {
        x -= 4.0;
        grid.update(x, 8.0, &mut events);
    }
    assert_eq!(grid.tier(key), ChunkTier::High);
    assert!(events
        .iter()
        .any(|event| *event == StreamEvent::Load { key, tier: ChunkTier::Low }));
}
