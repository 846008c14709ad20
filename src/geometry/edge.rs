use crate::math::{Transform, Vec2};
use crate::settings::POLYGON_RADIUS;

use super::{Aabb, MassData, RayCastInput, RayCastOutput};

/// A line segment.
///
/// A one-sided edge carries ghost vertices `vertex0` and `vertex3` from its
/// neighbors so that chains collide smoothly across their joints. One-sided
/// edges only collide on their right side, looking from `vertex1` to `vertex2`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeShape {
    pub vertex0: Vec2,
    pub vertex1: Vec2,
    pub vertex2: Vec2,
    pub vertex3: Vec2,
    pub one_sided: bool,
    pub radius: f32,
}

impl EdgeShape {
    /// A segment that collides on both sides
    pub fn two_sided(v1: Vec2, v2: Vec2) -> Self {
        Self {
            vertex0: Vec2::ZERO,
            vertex1: v1,
            vertex2: v2,
            vertex3: Vec2::ZERO,
            one_sided: false,
            radius: POLYGON_RADIUS,
        }
    }

    /// A segment `v1 -> v2` with ghost neighbors `v0` and `v3`
    pub fn one_sided(v0: Vec2, v1: Vec2, v2: Vec2, v3: Vec2) -> Self {
        Self {
            vertex0: v0,
            vertex1: v1,
            vertex2: v2,
            vertex3: v3,
            one_sided: true,
            radius: POLYGON_RADIUS,
        }
    }

    // p = p1 + t * d
    // v = v1 + s * e
    // p1 + t * d = v1 + s * e
    // s * e - t * d = p1 - v1
    pub fn ray_cast(&self, input: &RayCastInput, xf: Transform) -> Option<RayCastOutput> {
        // Put the ray into the edge's frame of reference.
        let p1 = xf.q.inv_rotate(input.p1 - xf.p);
        let p2 = xf.q.inv_rotate(input.p2 - xf.p);
        let d = p2 - p1;

        let v1 = self.vertex1;
        let v2 = self.vertex2;
        let e = v2 - v1;

        // Normal points to the right, looking from v1 at v2
        let normal = Vec2::new(e.y, -e.x).normalize();

        // q = p1 + t * d
        // dot(normal, q - v1) = 0
        // dot(normal, p1 - v1) + t * dot(normal, d) = 0
        let numerator = normal.dot(v1 - p1);
        if self.one_sided && numerator > 0.0 {
            return None;
        }

        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + d * t;

        // q = v1 + s * r
        // s = dot(q - v1, r) / dot(r, r)
        let r = v2 - v1;
        let rr = r.dot(r);
        if rr == 0.0 {
            return None;
        }

        let s = (q - v1).dot(r) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let world_normal = xf.q.rotate(normal);
        Some(RayCastOutput {
            fraction: t,
            normal: if numerator > 0.0 {
                -world_normal
            } else {
                world_normal
            },
        })
    }

    pub fn compute_aabb(&self, xf: Transform) -> Aabb {
        let v1 = xf * self.vertex1;
        let v2 = xf * self.vertex2;
        Aabb::new(v1.min(v2), v1.max(v2)).expand(self.radius)
    }

    /// Edges have no area and therefore no mass
    pub fn compute_mass(&self, _density: f32) -> MassData {
        MassData {
            mass: 0.0,
            center: (self.vertex1 + self.vertex2) * 0.5,
            inertia: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_two_sided_ray_cast() {
        let edge = EdgeShape::two_sided(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));

        let down = RayCastInput::new(Vec2::new(0.0, 2.0), Vec2::new(0.0, -2.0));
        let hit = edge.ray_cast(&down, Transform::IDENTITY).unwrap();
        assert_relative_eq!(hit.fraction, 0.5);
        assert_relative_eq!(hit.normal.y, 1.0);

        let up = RayCastInput::new(Vec2::new(0.0, -2.0), Vec2::new(0.0, 2.0));
        let hit = edge.ray_cast(&up, Transform::IDENTITY).unwrap();
        assert_relative_eq!(hit.normal.y, -1.0);
    }

    #[test]
    fn test_one_sided_ray_cast() {
        // Right side of (1,0) -> (-1,0) faces up
        let edge = EdgeShape::one_sided(
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(-2.0, 0.0),
        );
        let down = RayCastInput::new(Vec2::new(0.0, 2.0), Vec2::new(0.0, -2.0));
        assert!(edge.ray_cast(&down, Transform::IDENTITY).is_some());

        let up = RayCastInput::new(Vec2::new(0.0, -2.0), Vec2::new(0.0, 2.0));
        assert!(edge.ray_cast(&up, Transform::IDENTITY).is_none());
    }

    #[test]
    fn test_aabb_includes_radius() {
        let edge = EdgeShape::two_sided(Vec2::ZERO, Vec2::new(2.0, 0.0));
        let aabb = edge.compute_aabb(Transform::IDENTITY);
        assert_relative_eq!(aabb.min.y, -POLYGON_RADIUS);
        assert_relative_eq!(aabb.max.x, 2.0 + POLYGON_RADIUS);
        assert_eq!(edge.compute_mass(1.0).mass, 0.0);
    }
}
