//! Benchmarks for the swept-capsule obstruction test.
//!
//! Run with: cargo bench -p pilot-profiler

#![allow(missing_docs, clippy::unwrap_used, clippy::cast_possible_wrap)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::{Point3, Vector3};

use pilot_occupancy::OccupancyRegistry;
use pilot_profiler::{CollisionProfiler, ProfiledBody};
use pilot_types::{BodyDescriptor, BodyId, CellCoord, RigidBodyState};

/// A solid block of `n^3` cells centred on the origin.
fn block(n: i32) -> impl Iterator<Item = CellCoord> {
    let half = n / 2;
    CellCoord::span(
        CellCoord::new(-half, -half, -half),
        CellCoord::new(n - half - 1, n - half - 1, n - half - 1),
    )
}

fn setup(own_side: i32, other_side: i32, offset: f64) -> (ProfiledBody, ProfiledBody) {
    let registry = OccupancyRegistry::new();
    registry
        .register(BodyDescriptor::grid(BodyId(1), 0.5), block(own_side))
        .unwrap();
    registry
        .register(BodyDescriptor::grid(BodyId(2), 2.5), block(other_side))
        .unwrap();
    let own = ProfiledBody::from_registry(
        &registry,
        BodyId(1),
        RigidBodyState::new(Point3::origin(), 1000.0),
    )
    .unwrap();
    let other = ProfiledBody::from_registry(
        &registry,
        BodyId(2),
        RigidBodyState::new(Point3::new(offset, 0.0, 60.0), 50_000.0),
    )
    .unwrap();
    (own, other)
}

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");
    for side in [4, 8, 16] {
        let (own, _) = setup(side, 4, 0.0);
        group.throughput(Throughput::Elements(own.snapshot().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(side), &own, |b, own| {
            let mut profiler = CollisionProfiler::default();
            b.iter(|| {
                black_box(profiler.prepare(
                    black_box(own),
                    Point3::new(0.0, 0.0, 100.0),
                    Point3::origin(),
                ));
            });
        });
    }
    group.finish();
}

fn bench_test_obstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("test_obstruction");
    // Blocked exits on the first hit; clear has to visit every candidate cell.
    for (label, offset) in [("blocked", 0.0), ("clear", 40.0)] {
        for side in [4, 8, 16] {
            let (own, other) = setup(8, side, offset);
            let mut profiler = CollisionProfiler::default();
            profiler.prepare(&own, Point3::new(0.0, 0.0, 100.0), Point3::origin());
            group.throughput(Throughput::Elements(other.snapshot().len() as u64));
            group.bench_with_input(
                BenchmarkId::new(label, side),
                &other,
                |b, other| b.iter(|| black_box(profiler.test_obstruction(black_box(other), None))),
            );
        }
    }
    group.finish();
}

fn bench_test_rotate(c: &mut Criterion) {
    let (own, other) = setup(8, 8, 0.0);
    let other = ProfiledBody::new(
        RigidBodyState::new(Point3::new(0.0, 0.0, 8.0), 50_000.0),
        other.snapshot().clone(),
    );
    let profiler = CollisionProfiler::default();
    let turn = Vector3::new(0.0, 0.5, 0.0);
    c.bench_function("test_rotate", |b| {
        b.iter(|| black_box(profiler.test_rotate(black_box(&own), &turn, black_box(&other))));
    });
}

criterion_group!(
    benches,
    bench_prepare,
    bench_test_obstruction,
    bench_test_rotate
);
criterion_main!(benches);
