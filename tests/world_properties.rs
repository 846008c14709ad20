//! Invariants that should hold for any scene: broad-phase tree structure,
//! sleep bookkeeping, time of impact bounds, callbacks and locking.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use rustphy2d::collision::narrow_phase::{distance, DistanceInput, DistanceProxy, SimplexCache};
use rustphy2d::collision::{time_of_impact, DynamicTree, ToiInput, ToiState};
use rustphy2d::geometry::Aabb;
use rustphy2d::math::Sweep;
use rustphy2d::prelude::*;
use rustphy2d::settings::LINEAR_SLOP;

const DT: f32 = 1.0 / 60.0;

/// Deterministic pseudo random numbers in [0, 1)
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.0 >> 8) as f32 / (1u32 << 24) as f32
    }

    fn aabb(&mut self) -> Aabb {
        let min = Vec2::new(self.next() * 100.0 - 50.0, self.next() * 100.0 - 50.0);
        let size = Vec2::new(self.next() * 3.0 + 0.1, self.next() * 3.0 + 0.1);
        Aabb::new(min, min + size)
    }
}

fn ground_world() -> World {
    let mut world = World::default();
    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(20.0, 0.5)))
        .unwrap();
    world
}

fn drop_ball(world: &mut World, x: f32, y: f32) -> BodyHandle {
    let ball = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(x, y)))
        .unwrap();
    world
        .create_fixture(ball, &FixtureDef::new(CircleShape::new(0.5)).with_density(1.0))
        .unwrap();
    ball
}

#[test]
fn tree_stays_valid_under_random_operations() {
    let mut rng = Lcg(12345);
    let mut tree = DynamicTree::new();
    let mut proxies: Vec<_> = (0..200u32).map(|i| tree.create_proxy(rng.aabb(), i)).collect();
    assert!(tree.validate());

    for round in 0..5 {
        for &proxy in &proxies {
            let aabb = rng.aabb();
            let displacement = Vec2::new(rng.next() - 0.5, rng.next() - 0.5);
            tree.move_proxy(proxy, aabb, displacement);
        }
        assert!(tree.validate(), "invalid after move round {round}");

        let removed: Vec<_> = proxies.drain(..20).collect();
        for proxy in removed {
            tree.destroy_proxy(proxy);
        }
        assert!(tree.validate(), "invalid after destroy round {round}");
    }

    assert_eq!(tree.proxy_count(), proxies.len());
    tree.rebuild_bottom_up();
    assert!(tree.validate());
}

#[test]
fn sleeping_bodies_have_zero_velocity() {
    let mut world = ground_world();
    let balls: Vec<_> = (0..5)
        .map(|i| drop_ball(&mut world, i as f32 * 2.0 - 4.0, 2.0 + i as f32))
        .collect();

    for _ in 0..600 {
        world.step(DT, 8, 3);
    }

    for ball in balls {
        let body = world.body(ball).unwrap();
        assert!(!body.is_awake());
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.angular_velocity(), 0.0);
    }
}

#[test]
fn time_of_impact_lands_on_target_separation() {
    let radius = 0.5;
    let proxy = DistanceProxy::new(&[Vec2::ZERO], radius);

    for &(start, end) in &[(-3.0f32, 3.0f32), (-10.0, 0.5), (-2.0, -0.7)] {
        let sweep_a = Sweep { c0: Vec2::new(start, 0.2), c: Vec2::new(end, 0.0), a0: 0.0, a: 0.5, ..Sweep::default() };
        let sweep_b = Sweep { c0: Vec2::new(2.0, 0.0), c: Vec2::new(2.0, 0.0), ..Sweep::default() };

        let output = time_of_impact(&ToiInput {
            proxy_a: proxy.clone(),
            proxy_b: proxy.clone(),
            sweep_a,
            sweep_b,
            t_max: 1.0,
        });

        assert!((0.0..=1.0).contains(&output.t));
        if output.state != ToiState::Touching {
            continue;
        }

        let result = distance(
            &DistanceInput {
                proxy_a: proxy.clone(),
                proxy_b: proxy.clone(),
                transform_a: sweep_a.transform(output.t),
                transform_b: sweep_b.transform(output.t),
                use_radii: false,
            },
            &mut SimplexCache::default(),
        );

        let target = (2.0 * radius - 3.0 * LINEAR_SLOP).max(LINEAR_SLOP);
        let tolerance = 0.25 * LINEAR_SLOP;
        assert!(
            (result.distance - target).abs() <= tolerance + 1e-4,
            "separation {} not within tolerance of {}",
            result.distance,
            target
        );
    }
}

#[test]
fn cloned_shapes_have_identical_bounds_and_mass() {
    let xf = Transform::from_angle(Vec2::new(1.0, -2.0), 0.7);
    let shapes: Vec<Shape> = vec![
        CircleShape::new(0.3).with_position(Vec2::new(0.1, 0.2)).into(),
        PolygonShape::new_oriented_box(1.0, 0.5, Vec2::new(0.2, 0.0), 0.3).into(),
        EdgeShape::two_sided(Vec2::ZERO, Vec2::new(2.0, 1.0)).into(),
    ];

    for shape in shapes {
        let copy = shape.clone();
        for child in 0..shape.child_count() {
            assert_eq!(copy.compute_aabb(xf, child), shape.compute_aabb(xf, child));
        }
        assert_eq!(copy.compute_mass(2.0), shape.compute_mass(2.0));
    }
}

#[derive(Default)]
struct Counts {
    begin: Cell<u32>,
    end: Cell<u32>,
    pre_solve: Cell<u32>,
    post_solve: Cell<u32>,
}

struct CountingListener(Rc<Counts>);

impl ContactListener for CountingListener {
    fn begin_contact(&mut self, _contact: &Contact) {
        self.0.begin.set(self.0.begin.get() + 1);
    }

    fn end_contact(&mut self, _contact: &Contact) {
        self.0.end.set(self.0.end.get() + 1);
    }

    fn pre_solve(&mut self, _contact: &mut Contact, _old_manifold: &Manifold) {
        self.0.pre_solve.set(self.0.pre_solve.get() + 1);
    }

    fn post_solve(&mut self, _contact: &Contact, impulse: &ContactImpulse) {
        assert!(impulse.count > 0);
        self.0.post_solve.set(self.0.post_solve.get() + 1);
    }
}

#[test]
fn contact_listener_sees_contact_lifecycle() {
    let counts = Rc::new(Counts::default());
    let mut world = ground_world();
    world.set_contact_listener(CountingListener(counts.clone()));
    let ball = drop_ball(&mut world, 0.0, 2.0);

    for _ in 0..120 {
        world.step(DT, 8, 3);
    }
    assert!(counts.begin.get() >= 1);
    assert_eq!(counts.begin.get(), counts.end.get() + 1);
    assert!(counts.pre_solve.get() > 0);
    assert!(counts.post_solve.get() > 0);

    world.destroy_body(ball).unwrap();
    assert_eq!(counts.begin.get(), counts.end.get());
}

struct RejectAll;

impl ContactFilter for RejectAll {
    fn should_collide(&mut self, _fixture_a: &Fixture, _fixture_b: &Fixture) -> bool {
        false
    }
}

#[test]
fn contact_filter_can_reject_every_pair() {
    let mut world = ground_world();
    world.set_contact_filter(RejectAll);
    let ball = drop_ball(&mut world, 0.0, 2.0);

    for _ in 0..120 {
        world.step(DT, 8, 3);
    }

    assert_eq!(world.contact_count(), 0);
    assert!(world.body(ball).unwrap().position().y < 0.0);
}

#[test]
fn sensors_report_overlap_without_response() {
    let counts = Rc::new(Counts::default());
    let mut world = World::default();
    world.set_contact_listener(CountingListener(counts.clone()));

    let zone = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(zone, &FixtureDef::new(PolygonShape::new_box(5.0, 0.5)).with_sensor(true))
        .unwrap();
    let ball = drop_ball(&mut world, 0.0, 2.0);

    for _ in 0..120 {
        world.step(DT, 8, 3);
    }

    assert_eq!(counts.begin.get(), 1);
    assert_eq!(counts.end.get(), 1);
    assert_eq!(counts.post_solve.get(), 0);
    assert!(world.body(ball).unwrap().position().y < -1.0);
}

struct PanicOnBegin;

impl ContactListener for PanicOnBegin {
    fn begin_contact(&mut self, _contact: &Contact) {
        panic!("listener failure");
    }
}

#[test]
fn panicking_listener_leaves_world_locked() {
    let mut world = ground_world();
    world.set_contact_listener(PanicOnBegin);
    drop_ball(&mut world, 0.0, 0.9);

    let result = catch_unwind(AssertUnwindSafe(|| world.step(DT, 8, 3)));
    assert!(result.is_err());

    assert!(world.is_locked());
    assert_eq!(world.create_body(&BodyDef::default()), Err(Error::Locked));
}

#[test]
fn shift_origin_preserves_relative_motion() {
    let mut world = ground_world();
    let ball = drop_ball(&mut world, 0.0, 3.0);
    let mut shifted = ground_world();
    let shifted_ball = drop_ball(&mut shifted, 0.0, 3.0);
    shifted.shift_origin(Vec2::new(10.0, 0.0)).unwrap();

    for _ in 0..90 {
        world.step(DT, 8, 3);
        shifted.step(DT, 8, 3);
    }

    let p = world.body(ball).unwrap().position();
    let q = shifted.body(shifted_ball).unwrap().position();
    assert_abs_diff_eq!(p.x - 10.0, q.x, epsilon = 1e-3);
    assert_abs_diff_eq!(p.y, q.y, epsilon = 1e-3);
}
