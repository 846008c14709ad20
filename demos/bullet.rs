//! Continuous collision example
//!
//! Fires a small fast projectile at a thin wall, once with continuous physics
//! and once without, and reports which side of the wall it ends up on.

use rustphy2d::prelude::*;
use tracing_subscriber::EnvFilter;

const SPEED: f32 = 50.0;

fn fire(continuous: bool) -> Result<(f32, usize)> {
    let mut world = World::with_config(WorldConfig {
        gravity: Vec2::ZERO,
        continuous_physics: continuous,
        ..WorldConfig::default()
    });

    // A 5 cm thick wall at x = 1
    let wall = world.create_body(&BodyDef::default().with_position(Vec2::new(1.0, 0.0)))?;
    world.create_fixture(wall, &FixtureDef::new(PolygonShape::new_box(0.025, 2.0)))?;

    let bullet = world.create_body(
        &BodyDef::dynamic()
            .with_position(Vec2::new(0.0, 0.0))
            .with_linear_velocity(Vec2::new(SPEED, 0.0))
            .with_bullet(true),
    )?;
    world.create_fixture(bullet, &FixtureDef::new(CircleShape::new(0.1)).with_density(1.0))?;

    let mut touching_steps = 0;
    for _ in 0..10 {
        world.step(1.0 / 60.0, 8, 3);
        touching_steps += world.contacts().filter(|(_, c)| c.is_touching()).count();
    }

    let x = world.body(bullet).map_or(f32::NAN, |b| b.position().x);
    Ok((x, touching_steps))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("rustphy2d - Bullet Example");
    println!("==========================\n");
    println!("A 0.1 m ball at {} m/s travels {:.2} m per 60 Hz step.\n", SPEED, SPEED / 60.0);

    for continuous in [true, false] {
        let (x, touching) = fire(continuous)?;
        let side = if x < 1.0 { "in front of" } else { "behind" };
        println!(
            "continuous_physics={:<5}: final x={:.3}, {} the wall, touching contact-steps={}",
            continuous, x, side, touching
        );
    }

    Ok(())
}
