use crate::math::{Transform, Vec2};

use super::{Aabb, MassData, RayCastInput, RayCastOutput};

/// A solid circle defined by a local center and a radius
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CircleShape {
    /// Local position of the center
    pub position: Vec2,
    pub radius: f32,
}

impl CircleShape {
    /// Creates a circle centered on the body origin
    #[inline]
    pub fn new(radius: f32) -> Self {
        Self {
            position: Vec2::ZERO,
            radius,
        }
    }

    /// Sets the local center
    #[inline]
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn test_point(&self, xf: Transform, p: Vec2) -> bool {
        let center = xf * self.position;
        let d = p - center;
        d.dot(d) <= self.radius * self.radius
    }

    /// Collision detection in Real-Time Collision Detection, p. 179.
    pub fn ray_cast(&self, input: &RayCastInput, xf: Transform) -> Option<RayCastOutput> {
        let position = xf * self.position;
        let s = input.p1 - position;
        let b = s.dot(s) - self.radius * self.radius;

        // Solve quadratic equation.
        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.dot(r);
        let sigma = c * c - rr * b;

        // Check for negative discriminant and short segment.
        if sigma < 0.0 || rr < f32::EPSILON {
            return None;
        }

        // Find the point of intersection of the line with the circle.
        let mut a = -(c + sigma.sqrt());

        // Is the intersection point on the segment?
        if 0.0 <= a && a <= input.max_fraction * rr {
            a /= rr;
            return Some(RayCastOutput {
                fraction: a,
                normal: (s + r * a).normalize(),
            });
        }

        None
    }

    pub fn compute_aabb(&self, xf: Transform) -> Aabb {
        let p = xf * self.position;
        Aabb::from_center_half_extents(p, Vec2::splat(self.radius))
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        let rr = self.radius * self.radius;
        let mass = density * std::f32::consts::PI * rr;
        MassData {
            mass,
            center: self.position,
            // inertia about the local origin
            inertia: mass * (0.5 * rr + self.position.dot(self.position)),
        }
    }
}
