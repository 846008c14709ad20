use crate::geometry::{RayCastInput, RayCastOutput};
use crate::math::Vec2;

/// An axis-aligned bounding box defined by its lower and upper corners.
///
/// Used by the broad-phase tree and for spatial queries.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    /// Lower corner (smallest x, y values)
    pub min: Vec2,
    /// Upper corner (largest x, y values)
    pub max: Vec2,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// An empty AABB that contains no points
    pub const EMPTY: Self = Self {
        min: Vec2::new(f32::INFINITY, f32::INFINITY),
        max: Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    /// Creates an AABB from minimum and maximum points
    #[inline]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Creates an AABB from center and half-extents
    #[inline]
    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Returns the center of the AABB
    #[inline]
    pub fn center(self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Returns the half-extents (half the size in each dimension)
    #[inline]
    pub fn extents(self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    /// Returns the perimeter, the cost metric of the dynamic tree
    #[inline]
    pub fn perimeter(self) -> f32 {
        let wx = self.max.x - self.min.x;
        let wy = self.max.y - self.min.y;
        2.0 * (wx + wy)
    }

    /// Returns true if the bounds are sorted and finite
    #[inline]
    pub fn is_valid(self) -> bool {
        let d = self.max - self.min;
        d.x >= 0.0 && d.y >= 0.0 && self.min.is_valid() && self.max.is_valid()
    }

    /// Returns true if this AABB contains the given point
    #[inline]
    pub fn contains_point(self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Returns true if this AABB fully contains another AABB
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// Returns true if the two boxes overlap. Touching boxes count as overlapping.
    #[inline]
    pub fn overlaps(self, other: Self) -> bool {
        let d1 = other.min - self.max;
        let d2 = self.min - other.max;
        !(d1.x > 0.0 || d1.y > 0.0 || d2.x > 0.0 || d2.y > 0.0)
    }

    /// Returns a new AABB that is the union of this and another AABB
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns a new AABB expanded by a margin in all directions
    #[inline]
    pub fn expand(self, margin: f32) -> Self {
        let m = Vec2::splat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Returns the AABB translated by `offset`
    #[inline]
    pub fn translate(self, offset: Vec2) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Casts a ray against the box using the slab method.
    /// Returns None when the ray starts inside the box or misses it.
    pub fn ray_cast(self, input: &RayCastInput) -> Option<RayCastOutput> {
        let mut tmin = -f32::MAX;
        let mut tmax = f32::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;
        let abs_d = d.abs();

        let mut normal = Vec2::ZERO;

        for i in 0..2 {
            if abs_d[i] < f32::EPSILON {
                // Parallel
                if p[i] < self.min[i] || self.max[i] < p[i] {
                    return None;
                }
            } else {
                let inv_d = 1.0 / d[i];
                let mut t1 = (self.min[i] - p[i]) * inv_d;
                let mut t2 = (self.max[i] - p[i]) * inv_d;

                // Sign of the normal vector
                let mut s = -1.0;

                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                    s = 1.0;
                }

                // Push the min up
                if t1 > tmin {
                    normal = Vec2::ZERO;
                    normal[i] = s;
                    tmin = t1;
                }

                // Pull the max down
                tmax = tmax.min(t2);

                if tmin > tmax {
                    return None;
                }
            }
        }

        // Does the ray start inside the box?
        // Does the ray intersect beyond the max fraction?
        if tmin < 0.0 || input.max_fraction < tmin {
            return None;
        }

        Some(RayCastOutput {
            normal,
            fraction: tmin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> Aabb {
        Aabb::new(Vec2::ZERO, Vec2::ONE)
    }

    #[test]
    fn test_overlap_and_containment() {
        let a = unit_box();
        let b = Aabb::new(Vec2::new(0.5, 0.5), Vec2::new(2.0, 2.0));
        let c = Aabb::new(Vec2::new(3.0, 0.0), Vec2::new(4.0, 1.0));
        let touching = Aabb::new(Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0));

        assert!(a.overlaps(b));
        assert!(!a.overlaps(c));
        assert!(a.overlaps(touching));

        assert!(a.expand(0.1).contains(a));
        assert!(!a.contains(b));
        assert!(a.union(b).contains(b));
    }

    #[test]
    fn test_perimeter() {
        let a = Aabb::new(Vec2::ZERO, Vec2::new(2.0, 3.0));
        assert_relative_eq!(a.perimeter(), 10.0);
        assert_relative_eq!(a.center().x, 1.0);
        assert_relative_eq!(a.extents().y, 1.5);
    }

    #[test]
    fn test_ray_cast_hit() {
        let input = RayCastInput::new(Vec2::new(-1.0, 0.5), Vec2::new(2.0, 0.5));
        let hit = unit_box().ray_cast(&input).unwrap();
        assert_relative_eq!(hit.fraction, 1.0 / 3.0, epsilon = 1e-6);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_ray_cast_miss_and_inside() {
        let miss = RayCastInput::new(Vec2::new(-1.0, 2.0), Vec2::new(2.0, 2.0));
        assert!(unit_box().ray_cast(&miss).is_none());

        let inside = RayCastInput::new(Vec2::new(0.5, 0.5), Vec2::new(2.0, 0.5));
        assert!(unit_box().ray_cast(&inside).is_none());

        let mut short = RayCastInput::new(Vec2::new(-1.0, 0.5), Vec2::new(2.0, 0.5));
        short.max_fraction = 0.2;
        assert!(unit_box().ray_cast(&short).is_none());
    }

    #[test]
    fn test_validity() {
        assert!(unit_box().is_valid());
        assert!(!Aabb::EMPTY.is_valid());
    }
}
