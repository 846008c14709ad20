use crate::math::Vec2;
use crate::settings::{MAX_ROTATION, MAX_ROTATION_SQUARED, MAX_TRANSLATION, MAX_TRANSLATION_SQUARED};

use super::{Body, BodyType, Velocity};
use super::time_step::Position;

/// Integrates the body's velocity over `h` using gravity and the accumulated
/// forces, then applies damping. Only dynamic bodies are affected.
pub fn integrate_velocity(body: &Body, gravity: Vec2, h: f32) -> Velocity {
    let mut v = body.linear_velocity;
    let mut w = body.angular_velocity;

    if body.body_type == BodyType::Dynamic {
        v += (gravity * (body.gravity_scale * body.mass) + body.force) * (h * body.inv_mass);
        w += h * body.inv_i * body.torque;

        // Pade approximation of exp(-c * h), stable for any damping
        v *= 1.0 / (1.0 + h * body.linear_damping);
        w *= 1.0 / (1.0 + h * body.angular_damping);
    }

    Velocity { v, w }
}

/// Advances a position by `h` with the given velocity. Velocities that would
/// move more than the per-step translation or rotation limit are scaled down.
pub fn integrate_position(position: &mut Position, velocity: &mut Velocity, h: f32) {
    let translation = velocity.v * h;
    if translation.length_squared() > MAX_TRANSLATION_SQUARED {
        velocity.v *= MAX_TRANSLATION / translation.length();
    }

    let rotation = h * velocity.w;
    if rotation * rotation > MAX_ROTATION_SQUARED {
        velocity.w *= MAX_ROTATION / rotation.abs();
    }

    position.c += velocity.v * h;
    position.a += h * velocity.w;
}
