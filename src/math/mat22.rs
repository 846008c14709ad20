use std::ops::{Add, Mul};

use super::Vec2;

/// A 2x2 matrix stored in column-major order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mat22 {
    /// First column
    pub ex: Vec2,
    /// Second column
    pub ey: Vec2,
}

impl Mat22 {
    /// Zero matrix
    pub const ZERO: Self = Self::from_cols(Vec2::ZERO, Vec2::ZERO);

    /// Identity matrix
    pub const IDENTITY: Self = Self::from_cols(Vec2::X, Vec2::Y);

    /// Creates a matrix from column vectors
    #[inline]
    pub const fn from_cols(ex: Vec2, ey: Vec2) -> Self {
        Self { ex, ey }
    }

    /// Creates a matrix from scalars in row order
    #[inline]
    pub const fn new(a11: f32, a12: f32, a21: f32, a22: f32) -> Self {
        Self::from_cols(Vec2::new(a11, a21), Vec2::new(a12, a22))
    }

    /// Determinant of the matrix
    #[inline]
    pub fn determinant(self) -> f32 {
        self.ex.x * self.ey.y - self.ey.x * self.ex.y
    }

    /// Returns the inverse, or the zero matrix when singular
    pub fn inverse(self) -> Self {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Self::new(det * d, -det * b, -det * c, det * a)
    }

    /// Solves `A * x = b` without computing the inverse.
    /// Returns zero when the matrix is singular.
    pub fn solve(self, b: Vec2) -> Vec2 {
        let mut det = self.determinant();
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(
            det * (self.ey.y * b.x - self.ey.x * b.y),
            det * (self.ex.x * b.y - self.ex.y * b.x),
        )
    }

    /// Multiplies a vector by the transpose of this matrix
    #[inline]
    pub fn transpose_mul(self, v: Vec2) -> Vec2 {
        Vec2::new(v.dot(self.ex), v.dot(self.ey))
    }
}

// Operator overloads

impl Mul<Vec2> for Mat22 {
    type Output = Vec2;

    #[inline]
    fn mul(self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }
}

impl Add for Mat22 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::from_cols(self.ex + other.ex, self.ey + other.ey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_matches_inverse() {
        let m = Mat22::new(4.0, 1.0, 2.0, 3.0);
        let b = Vec2::new(1.0, 2.0);
        let x = m.solve(b);
        let y = m.inverse() * b;
        assert_relative_eq!(x.x, y.x, epsilon = 1e-6);
        assert_relative_eq!(x.y, y.y, epsilon = 1e-6);

        let check = m * x;
        assert_relative_eq!(check.x, b.x, epsilon = 1e-6);
        assert_relative_eq!(check.y, b.y, epsilon = 1e-6);
    }

    #[test]
    fn test_singular_is_zero() {
        let m = Mat22::new(1.0, 2.0, 2.0, 4.0);
        assert_eq!(m.solve(Vec2::ONE), Vec2::ZERO);
        assert_eq!(m.inverse(), Mat22::ZERO);
    }
}
