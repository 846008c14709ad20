use std::ops::Mul;

use super::{Vec2, Vec3};

/// A 3x3 matrix stored in column-major order.
///
/// Used for the effective mass of the weld and prismatic joints.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mat33 {
    pub ex: Vec3,
    pub ey: Vec3,
    pub ez: Vec3,
}

impl Mat33 {
    /// Zero matrix
    pub const ZERO: Self = Self::from_cols(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);

    /// Creates a matrix from column vectors
    #[inline]
    pub const fn from_cols(ex: Vec3, ey: Vec3, ez: Vec3) -> Self {
        Self { ex, ey, ez }
    }

    /// Solves `A * x = b`. Returns zero when the matrix is singular.
    pub fn solve33(&self, b: Vec3) -> Vec3 {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec3::new(
            det * b.dot(self.ey.cross(self.ez)),
            det * self.ex.dot(b.cross(self.ez)),
            det * self.ex.dot(self.ey.cross(b)),
        )
    }

    /// Solves the upper 2x2 block `A * x = b`. Returns zero when singular.
    pub fn solve22(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }

    /// Inverse of the upper 2x2 block, zero elsewhere
    pub fn inverse22(&self) -> Self {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Self::from_cols(
            Vec3::new(det * d, -det * c, 0.0),
            Vec3::new(-det * b, det * a, 0.0),
            Vec3::ZERO,
        )
    }

    /// Symmetric inverse. Returns zero when singular.
    pub fn sym_inverse33(&self) -> Self {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }

        let (a11, a12, a13) = (self.ex.x, self.ey.x, self.ez.x);
        let (a22, a23) = (self.ey.y, self.ez.y);
        let a33 = self.ez.z;

        let m12 = det * (a13 * a23 - a12 * a33);
        let m13 = det * (a12 * a23 - a13 * a22);
        let m23 = det * (a13 * a12 - a11 * a23);

        Self::from_cols(
            Vec3::new(det * (a22 * a33 - a23 * a23), m12, m13),
            Vec3::new(m12, det * (a11 * a33 - a13 * a13), m23),
            Vec3::new(m13, m23, det * (a11 * a22 - a12 * a12)),
        )
    }

    /// Multiplies a 2D vector by the upper 2x2 block
    #[inline]
    pub fn mul22(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }
}

impl Mul<Vec3> for Mat33 {
    type Output = Vec3;

    #[inline]
    fn mul(self, v: Vec3) -> Vec3 {
        self.ex * v.x + self.ey * v.y + self.ez * v.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Mat33 {
        Mat33::from_cols(
            Vec3::new(4.0, 1.0, 0.5),
            Vec3::new(1.0, 3.0, 0.2),
            Vec3::new(0.5, 0.2, 2.0),
        )
    }

    #[test]
    fn test_solve33() {
        let m = sample();
        let b = Vec3::new(1.0, -2.0, 3.0);
        let x = m.solve33(b);
        let check = m * x;
        assert_relative_eq!(check.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(check.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(check.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn test_sym_inverse_matches_solve() {
        let m = sample();
        let b = Vec3::new(0.3, 0.7, -1.1);
        let x1 = m.sym_inverse33() * b;
        let x2 = m.solve33(b);
        assert_relative_eq!(x1.x, x2.x, epsilon = 1e-5);
        assert_relative_eq!(x1.y, x2.y, epsilon = 1e-5);
        assert_relative_eq!(x1.z, x2.z, epsilon = 1e-5);
    }

    #[test]
    fn test_solve22_uses_upper_block() {
        let m = sample();
        let b = Vec2::new(1.0, 1.0);
        let x = m.solve22(b);
        let check = m.mul22(x);
        assert_relative_eq!(check.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(check.y, 1.0, epsilon = 1e-5);

        let inv = m.inverse22();
        let y = inv.mul22(b);
        assert_relative_eq!(x.x, y.x, epsilon = 1e-5);
        assert_relative_eq!(x.y, y.y, epsilon = 1e-5);
        assert_eq!(inv.ez, Vec3::ZERO);
    }
}
