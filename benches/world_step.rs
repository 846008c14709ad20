//! Benchmarks for rustphy2d
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rustphy2d::collision::DynamicTree;
use rustphy2d::prelude::*;

const DT: f32 = 1.0 / 60.0;

fn pyramid(rows: usize) -> World {
    let mut world = World::default();
    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(ground, &FixtureDef::new(EdgeShape::two_sided(Vec2::new(-40.0, 0.0), Vec2::new(40.0, 0.0))))
        .unwrap();

    let half = 0.5;
    let mut start = Vec2::new(-7.0, 0.75);
    for row in 0..rows {
        let mut position = start;
        for _ in row..rows {
            let body = world.create_body(&BodyDef::dynamic().with_position(position)).unwrap();
            world
                .create_fixture(body, &FixtureDef::new(PolygonShape::new_box(half, half)).with_density(5.0))
                .unwrap();
            position.x += 1.125;
        }
        start += Vec2::new(0.5625, 1.0);
    }
    world
}

// ============================================================================
// World step benchmarks
// ============================================================================

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");

    group.bench_function("pyramid_20_rows_60_steps", |b| {
        b.iter(|| {
            let mut world = pyramid(20);
            for _ in 0..60 {
                world.step(black_box(DT), 8, 3);
            }
            world.contact_count()
        });
    });

    group.bench_function("falling_circles_100", |b| {
        b.iter(|| {
            let mut world = pyramid(0);
            for i in 0..100 {
                let position = Vec2::new((i % 10) as f32 - 5.0, 2.0 + (i / 10) as f32 * 1.2);
                let body = world.create_body(&BodyDef::dynamic().with_position(position)).unwrap();
                world
                    .create_fixture(body, &FixtureDef::new(CircleShape::new(0.5)).with_density(1.0))
                    .unwrap();
            }
            for _ in 0..60 {
                world.step(black_box(DT), 8, 3);
            }
            world.contact_count()
        });
    });

    group.finish();
}

// ============================================================================
// Broad-phase benchmarks
// ============================================================================

fn bench_tree_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("dynamic_tree");

    let mut tree = DynamicTree::new();
    for i in 0..1000u32 {
        let min = Vec2::new((i % 40) as f32 * 2.0, (i / 40) as f32 * 2.0);
        tree.create_proxy(Aabb::new(min, min + Vec2::ONE), i);
    }

    group.bench_function("query_1000_proxies", |bench| {
        let aabb = Aabb::new(Vec2::new(10.0, 10.0), Vec2::new(20.0, 20.0));
        bench.iter(|| {
            let mut hits = 0;
            tree.query(black_box(aabb), |_| {
                hits += 1;
                true
            });
            hits
        });
    });

    group.finish();
}

criterion_group!(benches, bench_world_step, bench_tree_query);
criterion_main!(benches);
