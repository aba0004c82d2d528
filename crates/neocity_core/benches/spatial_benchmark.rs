//! # Spatial Benchmark
//!
//! Hash grid churn and queries, plus streaming updates for a moving
//! observer.
//!
//! Run with: `cargo bench --package neocity_core --bench spatial_benchmark`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use neocity_core::config::StreamingConfig;
use neocity_core::{EntityId, SpatialHashGrid, StreamingGrid};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const ENTITIES: u32 = 20_000;

fn scattered(rng: &mut ChaCha8Rng) -> Vec<(f32, f32)> {
    (0..ENTITIES)
        .map(|_| (rng.gen_range(-2_000.0..2_000.0), rng.gen_range(-2_000.0..2_000.0)))
        .collect()
}

fn bench_grid_update(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut positions = scattered(&mut rng);
    let mut grid = SpatialHashGrid::new(16.0);
    for (i, (x, z)) in positions.iter().enumerate() {
        grid.insert(EntityId::from_raw(i as u32), *x, *z);
    }

    c.bench_function("grid_update_20k", |b| {
        b.iter(|| {
            for (i, position) in positions.iter_mut().enumerate() {
                let next = (position.0 + 0.5, position.1 - 0.5);
                grid.update(EntityId::from_raw(i as u32), position.0, position.1, next.0, next.1);
                *position = next;
            }
        });
    });
}

fn bench_grid_query(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let positions = scattered(&mut rng);
    let mut grid = SpatialHashGrid::new(16.0);
    for (i, (x, z)) in positions.iter().enumerate() {
        grid.insert(EntityId::from_raw(i as u32), *x, *z);
    }

    let mut group = c.benchmark_group("grid_query_radius");
    let mut out = Vec::with_capacity(4_096);
    for radius in [16.0_f32, 64.0, 256.0] {
        group.bench_with_input(
            BenchmarkId::from_parameter(radius),
            &radius,
            |b, &radius| {
                b.iter(|| {
                    out.clear();
                    grid.query_radius(black_box(10.0), black_box(-10.0), radius, &mut out);
                    out.len()
                });
            },
        );
    }
    group.finish();
}

fn bench_streaming(c: &mut Criterion) {
    let mut grid = StreamingGrid::new(StreamingConfig::default());
    let mut x = 0.0_f32;

    c.bench_function("streaming_walk_update", |b| {
        b.iter(|| {
            x += 2.0;
            grid.update(x, 0.0, &mut ());
            grid.loaded_count()
        });
    });
}

criterion_group!(benches, bench_grid_update, bench_grid_query, bench_streaming);
criterion_main!(benches);
