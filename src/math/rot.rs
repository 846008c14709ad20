use std::ops::Mul;

use super::Vec2;

/// A 2D rotation stored as sine and cosine of the angle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Rot {
    /// Sine of the angle
    pub s: f32,
    /// Cosine of the angle
    pub c: f32,
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot {
    /// Zero rotation
    pub const IDENTITY: Self = Self { s: 0.0, c: 1.0 };

    /// Creates a rotation from an angle in radians
    #[inline]
    pub fn new(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    /// Returns the angle in radians, in [-pi, pi]
    #[inline]
    pub fn angle(self) -> f32 {
        self.s.atan2(self.c)
    }

    /// The rotated x-axis
    #[inline]
    pub fn x_axis(self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// The rotated y-axis
    #[inline]
    pub fn y_axis(self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotates a vector
    #[inline]
    pub fn rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse rotates a vector
    #[inline]
    pub fn inv_rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Computes `inverse(self) * other`
    #[inline]
    pub fn inv_mul(self, other: Self) -> Self {
        // [ qc qs] * [rc -rs] = [qc*rc+qs*rs -qc*rs+qs*rc]
        // [-qs qc]   [rs  rc]   [-qs*rc+qc*rs qs*rs+qc*rc]
        Self {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}

// Operator overloads

impl Mul for Rot {
    type Output = Self;

    /// Composes two rotations: `self * other`
    #[inline]
    fn mul(self, other: Self) -> Self {
        Self {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }
}

impl Mul<Vec2> for Rot {
    type Output = Vec2;

    #[inline]
    fn mul(self, v: Vec2) -> Vec2 {
        self.rotate(v)
    }
}
