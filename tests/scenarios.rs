//! End-to-end scenarios exercising collision, the solver, joints and
//! continuous collision through the public API.

use std::f32::consts::FRAC_PI_4;

use approx::assert_abs_diff_eq;
use rustphy2d::collision::narrow_phase::collide_circles;
use rustphy2d::collision::{DynamicTree, WorldManifold};
use rustphy2d::geometry::Aabb;
use rustphy2d::prelude::*;
use rustphy2d::settings::{ANGULAR_SLOP, LINEAR_SLEEP_TOLERANCE, LINEAR_SLOP};

const DT: f32 = 1.0 / 60.0;

#[test]
fn overlapping_circles_produce_one_point() {
    let circle = CircleShape::new(1.0);
    let xf_a = Transform::IDENTITY;
    let xf_b = Transform::from_angle(Vec2::new(1.5, 0.0), 0.0);

    let manifold = collide_circles(&circle, xf_a, &circle, xf_b);
    assert_eq!(manifold.point_count, 1);

    let world_manifold = WorldManifold::new(&manifold, xf_a, circle.radius, xf_b, circle.radius);
    assert_abs_diff_eq!(world_manifold.separations[0], -0.5, epsilon = 1e-5);
    assert_abs_diff_eq!(world_manifold.normal.x, 1.0, epsilon = 1e-5);
}

#[test]
fn box_settles_on_ground_and_sleeps() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(10.0, 0.5)))
        .unwrap();

    let body = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 5.0)))
        .unwrap();
    world
        .create_fixture(body, &FixtureDef::new(PolygonShape::new_box(0.5, 0.5)).with_density(1.0))
        .unwrap();

    for _ in 0..120 {
        world.step(DT, 8, 3);
    }
    let b = world.body(body).unwrap();
    assert!(b.linear_velocity().length() < LINEAR_SLEEP_TOLERANCE);
    assert_abs_diff_eq!(b.position().y, 1.0, epsilon = 0.02);

    let mut slept = false;
    for _ in 0..600 {
        world.step(DT, 8, 3);
        if !world.body(body).unwrap().is_awake() {
            slept = true;
            break;
        }
    }
    assert!(slept, "box never fell asleep");
}

#[test]
fn bullet_does_not_tunnel_through_thin_wall() {
    let mut world = World::new(Vec2::ZERO);
    let wall = world
        .create_body(&BodyDef::default().with_position(Vec2::new(0.5, 0.0)))
        .unwrap();
    world
        .create_fixture(wall, &FixtureDef::new(PolygonShape::new_box(0.025, 2.0)))
        .unwrap();

    let bullet = world
        .create_body(
            &BodyDef::dynamic()
                .with_linear_velocity(Vec2::new(50.0, 0.0))
                .with_bullet(true),
        )
        .unwrap();
    world
        .create_fixture(bullet, &FixtureDef::new(CircleShape::new(0.1)).with_density(1.0))
        .unwrap();

    world.step(DT, 8, 3);

    let x = world.body(bullet).unwrap().position().x;
    assert!(x < 0.5, "bullet tunneled to x = {x}");
}

/// Fires a ball at 50 m/s along `y` toward a thin static wall at `wall_x`
fn fire_at_wall(world: &mut World, y: f32, wall_x: f32) -> BodyHandle {
    let wall = world
        .create_body(&BodyDef::default().with_position(Vec2::new(wall_x, y)))
        .unwrap();
    world
        .create_fixture(wall, &FixtureDef::new(PolygonShape::new_box(0.025, 2.0)))
        .unwrap();

    let ball = world
        .create_body(
            &BodyDef::dynamic()
                .with_position(Vec2::new(0.0, y))
                .with_linear_velocity(Vec2::new(50.0, 0.0)),
        )
        .unwrap();
    world
        .create_fixture(ball, &FixtureDef::new(CircleShape::new(0.1)).with_density(1.0))
        .unwrap();
    ball
}

#[test]
fn sub_stepping_resolves_one_impact_per_step() {
    let mut world = World::new(Vec2::ZERO);
    world.set_sub_stepping(true);
    let early = fire_at_wall(&mut world, 0.0, 0.3);
    let late = fire_at_wall(&mut world, 10.0, 0.6);

    // Only the earliest impact is handled, the other ball is left past its wall.
    world.step(DT, 8, 3);
    assert!(!world.is_step_complete());
    assert!(world.body(early).unwrap().position().x < 0.3);
    assert!(world.body(late).unwrap().position().x > 0.6);

    // The next step finishes the pending impact before anything else moves.
    world.step(DT, 8, 3);
    assert!(world.body(early).unwrap().position().x < 0.3);
    assert!(world.body(late).unwrap().position().x < 0.6);

    world.step(DT, 8, 3);
    assert!(world.is_step_complete());
}

#[test]
fn continuous_step_resolves_every_impact() {
    let mut world = World::new(Vec2::ZERO);
    let early = fire_at_wall(&mut world, 0.0, 0.3);
    let late = fire_at_wall(&mut world, 10.0, 0.6);

    world.step(DT, 8, 3);
    assert!(world.is_step_complete());
    assert!(world.body(early).unwrap().position().x < 0.3);
    assert!(world.body(late).unwrap().position().x < 0.6);
}

#[test]
fn misaligned_revolute_joint_keeps_anchors_together() {
    let mut world = World::new(Vec2::ZERO);
    let ground = world.create_body(&BodyDef::default()).unwrap();
    let arm = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(1.0, 0.0)))
        .unwrap();
    world
        .create_fixture(arm, &FixtureDef::new(PolygonShape::new_box(1.0, 0.1)).with_density(1.0))
        .unwrap();

    let mut def = RevoluteJointDef::initialize(
        ground,
        world.body(ground).unwrap(),
        arm,
        world.body(arm).unwrap(),
        Vec2::ZERO,
    );
    // The limit pins the joint angle at zero, so the arm must swing 45 degrees.
    def.reference_angle = FRAC_PI_4;
    def.enable_limit = true;
    def.lower_angle = 0.0;
    def.upper_angle = 0.0;
    let joint = world.create_joint(def).unwrap();

    for _ in 0..180 {
        world.step(DT, 8, 3);

        let joint = world.joint(joint).unwrap();
        let a = world.body(ground).unwrap();
        let b = world.body(arm).unwrap();
        let error = (joint.anchor_b(b) - joint.anchor_a(a)).length();
        assert!(error < 0.1, "anchors separated by {error}");
    }

    let joint = world.joint(joint).unwrap();
    let a = world.body(ground).unwrap();
    let b = world.body(arm).unwrap();
    assert!((joint.anchor_b(b) - joint.anchor_a(a)).length() < LINEAR_SLOP);

    let angle = joint.as_revolute().unwrap().joint_angle(a, b);
    assert!(angle.abs() < ANGULAR_SLOP, "joint angle {angle}");
    assert_abs_diff_eq!(b.angle(), FRAC_PI_4, epsilon = ANGULAR_SLOP);
}

#[test]
fn small_proxy_moves_stay_inside_fat_aabb() {
    let mut tree = DynamicTree::new();
    let proxy = tree.create_proxy(Aabb::new(Vec2::ZERO, Vec2::ONE), 7u32);

    let nudged = Aabb::new(Vec2::new(0.05, 0.0), Vec2::new(1.05, 1.0));
    assert!(!tree.move_proxy(proxy, nudged, Vec2::new(0.05, 0.0)));

    let moved = Aabb::new(Vec2::new(1.05, 0.0), Vec2::new(2.05, 1.0));
    assert!(tree.move_proxy(proxy, moved, Vec2::new(1.0, 0.0)));
    assert!(tree.fat_aabb(proxy).contains(moved));
    assert_eq!(tree.user_data(proxy), Some(7));
    assert!(tree.validate());
}
