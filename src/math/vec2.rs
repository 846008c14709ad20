use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

/// A 2D vector with f32 components.
///
/// Used throughout the engine for positions, velocities, forces and normals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    /// Zero vector (0, 0)
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Unit vector along X axis (1, 0)
    pub const X: Self = Self::new(1.0, 0.0);

    /// Unit vector along Y axis (0, 1)
    pub const Y: Self = Self::new(0.0, 1.0);

    /// One vector (1, 1)
    pub const ONE: Self = Self::new(1.0, 1.0);

    /// Creates a new Vec2 from components
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Creates a Vec2 with both components set to the same value
    #[inline]
    pub const fn splat(v: f32) -> Self {
        Self::new(v, v)
    }

    /// Converts the Vec2 to an array
    #[inline]
    pub const fn to_array(self) -> [f32; 2] {
        [self.x, self.y]
    }

    /// Dot product of two vectors
    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product, the z component of the 3D cross product
    #[inline]
    pub fn cross(self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Cross product of this vector with a scalar: `v x s`
    #[inline]
    pub fn cross_scalar(self, s: f32) -> Self {
        Self::new(s * self.y, -s * self.x)
    }

    /// Cross product of a scalar with a vector: `s x v`
    #[inline]
    pub fn scalar_cross(s: f32, v: Self) -> Self {
        Self::new(-s * v.y, s * v.x)
    }

    /// Counter-clockwise perpendicular, equal to `1 x v`
    #[inline]
    pub fn skew(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Squared length of the vector (avoids sqrt)
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length (magnitude) of the vector
    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Returns a unit vector, or the vector unchanged when its length is below `f32::EPSILON`
    #[inline]
    pub fn normalize(self) -> Self {
        self.normalize_with_length().0
    }

    /// Returns a normalized vector and its original length.
    /// Vectors shorter than `f32::EPSILON` come back unchanged with length 0.
    #[inline]
    pub fn normalize_with_length(self) -> (Self, f32) {
        let len = self.length();
        if len < f32::EPSILON {
            return (self, 0.0);
        }
        (self * (1.0 / len), len)
    }

    /// Attempts to normalize, returning None if the vector is too small
    #[inline]
    pub fn try_normalize(self) -> Option<Self> {
        let len = self.length();
        if len < f32::EPSILON {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    /// Returns true if both components are finite
    #[inline]
    pub fn is_valid(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Linear interpolation between two vectors
    #[inline]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    /// Component-wise minimum
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise maximum
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// Clamps each component to the range [min, max]
    #[inline]
    pub fn clamp(self, min: Self, max: Self) -> Self {
        self.max(min).min(max)
    }

    /// Component-wise absolute value
    #[inline]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }

    /// Returns the distance between two points
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Returns the squared distance between two points
    #[inline]
    pub fn distance_squared(self, other: Self) -> f32 {
        (other - self).length_squared()
    }
}

// Operator overloads

impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;

    #[inline]
    fn mul(self, vec: Vec2) -> Vec2 {
        Vec2::new(self * vec.x, self * vec.y)
    }
}

impl MulAssign<f32> for Vec2 {
    #[inline]
    fn mul_assign(&mut self, scalar: f32) {
        self.x *= scalar;
        self.y *= scalar;
    }
}

impl Div<f32> for Vec2 {
    type Output = Self;

    #[inline]
    fn div(self, scalar: f32) -> Self {
        let inv = 1.0 / scalar;
        Self::new(self.x * inv, self.y * inv)
    }
}

impl DivAssign<f32> for Vec2 {
    #[inline]
    fn div_assign(&mut self, scalar: f32) {
        let inv = 1.0 / scalar;
        self.x *= inv;
        self.y *= inv;
    }
}

impl Neg for Vec2 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl Index<usize> for Vec2 {
    type Output = f32;

    #[inline]
    fn index(&self, index: usize) -> &f32 {
        match index {
            0 => &self.x,
            1 => &self.y,
            _ => panic!("Vec2 index out of bounds: {}", index),
        }
    }
}

impl IndexMut<usize> for Vec2 {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut f32 {
        match index {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => panic!("Vec2 index out of bounds: {}", index),
        }
    }
}

impl From<[f32; 2]> for Vec2 {
    #[inline]
    fn from(arr: [f32; 2]) -> Self {
        Self::new(arr[0], arr[1])
    }
}

impl From<(f32, f32)> for Vec2 {
    #[inline]
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

impl From<Vec2> for (f32, f32) {
    #[inline]
    fn from(v: Vec2) -> Self {
        (v.x, v.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cross_variants() {
        let a = Vec2::new(1.0, 0.0);
        let b = Vec2::new(0.0, 1.0);
        assert_eq!(a.cross(b), 1.0);
        assert_eq!(b.cross(a), -1.0);

        // s x v rotates counter-clockwise, v x s clockwise
        assert_eq!(Vec2::scalar_cross(1.0, a), b);
        assert_eq!(b.cross_scalar(1.0), a);
        assert_eq!(a.skew(), b);
    }

    #[test]
    fn test_normalize() {
        let (n, len) = Vec2::new(3.0, 4.0).normalize_with_length();
        assert_relative_eq!(len, 5.0);
        assert_relative_eq!(n.x, 0.6);
        assert_relative_eq!(n.y, 0.8);

        // Tiny vectors are left untouched
        let (z, len) = Vec2::ZERO.normalize_with_length();
        assert_eq!(z, Vec2::ZERO);
        assert_eq!(len, 0.0);
        assert!(Vec2::ZERO.try_normalize().is_none());
    }

    #[test]
    fn test_operators() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(4.0, 5.0);

        assert_eq!(a + b, Vec2::new(5.0, 7.0));
        assert_eq!(b - a, Vec2::new(3.0, 3.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
        assert_eq!(2.0 * a, Vec2::new(2.0, 4.0));
        assert_eq!(a / 2.0, Vec2::new(0.5, 1.0));
        assert_eq!(-a, Vec2::new(-1.0, -2.0));
        assert_eq!(a[0], 1.0);
        assert_eq!(a[1], 2.0);
    }

    #[test]
    fn test_validity() {
        assert!(Vec2::new(1.0, -3.0).is_valid());
        assert!(!Vec2::new(f32::NAN, 0.0).is_valid());
        assert!(!Vec2::new(0.0, f32::INFINITY).is_valid());
    }
}
