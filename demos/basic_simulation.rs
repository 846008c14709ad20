//! Basic physics simulation example
//!
//! This example demonstrates a box and a ball falling onto the ground,
//! bouncing and eventually falling asleep.
//!
//! Set `RUST_LOG=rustphy2d=debug` to see body creation and sleep events.

use rustphy2d::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("rustphy2d - Basic Simulation Example");
    println!("====================================\n");

    // Create physics world with default settings
    let mut world = World::new(Vec2::new(0.0, -10.0));

    // Create a static ground
    let ground = world.create_body(&BodyDef::default())?;
    world.create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(10.0, 0.5)))?;
    println!("Created ground at y=0 (top surface at y=0.5)");

    // Create a dynamic box
    let crate_box = world.create_body(&BodyDef::dynamic().with_position(Vec2::new(-1.0, 5.0)).with_angle(0.3))?;
    world.create_fixture(
        crate_box,
        &FixtureDef::new(PolygonShape::new_box(0.5, 0.5))
            .with_density(1.0)
            .with_friction(0.6),
    )?;
    println!("Created box at (-1.0, 5.0)");

    // Create a bouncy ball
    let ball = world.create_body(&BodyDef::dynamic().with_position(Vec2::new(1.0, 5.0)))?;
    world.create_fixture(
        ball,
        &FixtureDef::new(CircleShape::new(0.5))
            .with_density(1.0)
            .with_restitution(0.5),
    )?;
    println!("Created ball at (1.0, 5.0) (radius=0.5)\n");

    // Simulation parameters
    let dt = 1.0 / 60.0;
    let total_time = 5.0;
    let steps = (total_time / dt) as usize;

    println!("Simulating {} seconds ({} steps at {}Hz)...\n", total_time, steps, 1.0 / dt);

    for i in 0..steps {
        world.step(dt, 8, 3);

        // Print state every 30 frames (0.5 seconds)
        if i % 30 == 0 {
            for (name, handle) in [("box", crate_box), ("ball", ball)] {
                let Some(body) = world.body(handle) else {
                    continue;
                };
                let pos = body.position();
                let vel = body.linear_velocity();
                println!(
                    "t={:.2}s {:>4}: position=({:.3}, {:.3}), angle={:.3}, velocity=({:.3}, {:.3}), awake={}",
                    i as f32 * dt,
                    name,
                    pos.x,
                    pos.y,
                    body.angle(),
                    vel.x,
                    vel.y,
                    body.is_awake()
                );
            }
        }
    }

    let profile = world.profile();
    println!(
        "\nLast step: {:?} total, {:?} collide, {:?} solve, {} contacts",
        profile.step,
        profile.collide,
        profile.solve,
        world.contact_count()
    );
    println!("Expected resting heights: box ~1.0, ball ~1.0 (ground top at 0.5)");

    Ok(())
}
