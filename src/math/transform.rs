use std::ops::Mul;

use super::rot::Rot;
use super::vec2::Vec2;

/// A rigid transformation combining translation and rotation.
///
/// Represents the position and orientation of a rigid frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    /// Position (translation)
    pub p: Vec2,
    /// Rotation
    pub q: Rot,
}

impl Transform {
    /// Identity transform (no translation or rotation)
    pub const IDENTITY: Self = Self {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    /// Creates a transform from a position and a rotation
    #[inline]
    pub const fn new(p: Vec2, q: Rot) -> Self {
        Self { p, q }
    }

    /// Creates a transform from a position and an angle in radians
    #[inline]
    pub fn from_angle(p: Vec2, angle: f32) -> Self {
        Self::new(p, Rot::new(angle))
    }

    /// Transforms a point from local space to world space
    #[inline]
    pub fn transform_point(self, point: Vec2) -> Vec2 {
        self.q.rotate(point) + self.p
    }

    /// Inverse transforms a point from world space to local space
    #[inline]
    pub fn inverse_transform_point(self, point: Vec2) -> Vec2 {
        self.q.inv_rotate(point - self.p)
    }

    /// Computes `inverse(self) * other`, the frame of `other` seen from `self`
    #[inline]
    pub fn inv_mul(self, other: Self) -> Self {
        Self {
            p: self.q.inv_rotate(other.p - self.p),
            q: self.q.inv_mul(other.q),
        }
    }
}

impl Mul for Transform {
    type Output = Self;

    /// Composes two transforms: `self * other`
    #[inline]
    fn mul(self, other: Self) -> Self {
        Self {
            p: self.q.rotate(other.p) + self.p,
            q: self.q * other.q,
        }
    }
}

impl Mul<Vec2> for Transform {
    type Output = Vec2;

    #[inline]
    fn mul(self, point: Vec2) -> Vec2 {
        self.transform_point(point)
    }
}

/// Describes the motion of a body over one time step for continuous collision.
///
/// Positions are those of the center of mass, not the body origin. The fraction
/// `alpha0` is the portion of the step already consumed by earlier impacts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sweep {
    /// Local center of mass position
    pub local_center: Vec2,
    /// Center world position at `alpha0`
    pub c0: Vec2,
    /// Center world position at the end of the step
    pub c: Vec2,
    /// World angle at `alpha0`
    pub a0: f32,
    /// World angle at the end of the step
    pub a: f32,
    /// Fraction of the current time step in [0, 1]
    pub alpha0: f32,
}

impl Sweep {
    /// Interpolated transform at `beta` in [0, 1], where 0 is `alpha0` and 1 is the step end
    pub fn transform(&self, beta: f32) -> Transform {
        let p = self.c0 * (1.0 - beta) + self.c * beta;
        let angle = (1.0 - beta) * self.a0 + beta * self.a;
        let q = Rot::new(angle);
        Transform::new(p - q.rotate(self.local_center), q)
    }

    /// Advances the start of the sweep forward to `alpha`
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += (self.c - self.c0) * beta;
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Shifts both angles so that `a0` lies in [0, 2pi)
    pub fn normalize(&mut self) {
        let two_pi = std::f32::consts::TAU;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_point_round_trip() {
        let xf = Transform::from_angle(Vec2::new(1.0, 2.0), 0.4);
        let p = Vec2::new(-3.0, 0.5);
        let back = xf.inverse_transform_point(xf * p);
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
    }

    #[test]
    fn test_compose_with_inverse() {
        let a = Transform::from_angle(Vec2::new(1.0, 0.0), FRAC_PI_2);
        let b = Transform::from_angle(Vec2::new(0.0, 3.0), 0.25);
        let rel = a.inv_mul(b);
        let again = a * rel;
        assert_relative_eq!(again.p.x, b.p.x, epsilon = 1e-5);
        assert_relative_eq!(again.p.y, b.p.y, epsilon = 1e-5);
        assert_relative_eq!(again.q.angle(), b.q.angle(), epsilon = 1e-5);
    }

    #[test]
    fn test_sweep_interpolation() {
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::ZERO,
            c: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a: 1.0,
            alpha0: 0.0,
        };
        let xf = sweep.transform(0.5);
        assert_relative_eq!(xf.p.x, 5.0);
        assert_relative_eq!(xf.q.angle(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_sweep_advance() {
        let mut sweep = Sweep {
            c: Vec2::new(10.0, 0.0),
            a: 2.0,
            ..Default::default()
        };
        sweep.advance(0.25);
        assert_relative_eq!(sweep.c0.x, 2.5);
        assert_relative_eq!(sweep.a0, 0.5);

        // Second advance is relative to the remaining fraction
        sweep.advance(0.5);
        assert_relative_eq!(sweep.c0.x, 5.0, epsilon = 1e-5);
        assert_relative_eq!(sweep.alpha0, 0.5);
    }

    #[test]
    fn test_sweep_normalize() {
        let mut sweep = Sweep {
            a0: 7.0,
            a: 7.5,
            ..Default::default()
        };
        sweep.normalize();
        assert!(sweep.a0 >= 0.0 && sweep.a0 < std::f32::consts::TAU);
        assert_relative_eq!(sweep.a - sweep.a0, 0.5, epsilon = 1e-5);
    }
}
