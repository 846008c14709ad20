use crate::error::{Error, Result};
use crate::math::{Rot, Transform, Vec2};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};

use super::{Aabb, MassData, RayCastInput, RayCastOutput};

/// A solid convex polygon with counter-clockwise winding.
///
/// Holds at most [`MAX_POLYGON_VERTICES`] vertices. Polygons carry a skin of
/// [`POLYGON_RADIUS`] around their hull which keeps the solver away from exact
/// touching configurations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PolygonShape {
    pub(crate) vertices: [Vec2; MAX_POLYGON_VERTICES],
    pub(crate) normals: [Vec2; MAX_POLYGON_VERTICES],
    pub(crate) count: usize,
    pub centroid: Vec2,
    pub radius: f32,
}

impl PolygonShape {
    /// An axis-aligned box centered on the body origin
    pub fn new_box(hx: f32, hy: f32) -> Self {
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[..4].copy_from_slice(&[
            Vec2::new(-hx, -hy),
            Vec2::new(hx, -hy),
            Vec2::new(hx, hy),
            Vec2::new(-hx, hy),
        ]);
        normals[..4].copy_from_slice(&[
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        ]);
        Self {
            vertices,
            normals,
            count: 4,
            centroid: Vec2::ZERO,
            radius: POLYGON_RADIUS,
        }
    }

    /// A box with local center `center` rotated by `angle`
    pub fn new_oriented_box(hx: f32, hy: f32, center: Vec2, angle: f32) -> Self {
        let mut poly = Self::new_box(hx, hy);
        let xf = Transform::new(center, Rot::new(angle));
        for i in 0..poly.count {
            poly.vertices[i] = xf * poly.vertices[i];
            poly.normals[i] = xf.q.rotate(poly.normals[i]);
        }
        poly.centroid = center;
        poly
    }

    /// Builds the convex hull of `points`.
    ///
    /// Degenerate input (fewer than three distinct points after welding, or a
    /// collinear set) falls back to a 2x2 box (half-extent 1) so the caller
    /// always gets a usable shape.
    pub fn from_points(points: &[Vec2]) -> Self {
        match Self::try_from_points(points) {
            Ok(poly) => poly,
            Err(err) => {
                tracing::warn!(%err, "falling back to a 2x2 box (half-extent 1)");
                Self::new_box(1.0, 1.0)
            }
        }
    }

    /// Builds the convex hull of `points` with gift wrapping.
    /// Points closer than half the linear slop are welded together.
    pub fn try_from_points(points: &[Vec2]) -> Result<Self> {
        if points.len() < 3 {
            return Err(Error::DegeneratePolygon("fewer than 3 points"));
        }

        let n = points.len().min(MAX_POLYGON_VERTICES);

        // Perform welding and copy vertices into local buffer.
        let weld_tolerance = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut ps = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut temp_count = 0;
        for &v in &points[..n] {
            let unique = ps[..temp_count]
                .iter()
                .all(|&p| v.distance_squared(p) >= weld_tolerance);
            if unique {
                ps[temp_count] = v;
                temp_count += 1;
            }
        }

        let n = temp_count;
        if n < 3 {
            return Err(Error::DegeneratePolygon("fewer than 3 distinct points"));
        }

        // Find the right most point on the hull
        let mut i0 = 0;
        let mut x0 = ps[0].x;
        for (i, p) in ps.iter().enumerate().take(n).skip(1) {
            if p.x > x0 || (p.x == x0 && p.y < ps[i0].y) {
                i0 = i;
                x0 = p.x;
            }
        }

        let mut hull = [0usize; MAX_POLYGON_VERTICES];
        let mut m = 0;
        let mut ih = i0;

        loop {
            if m == MAX_POLYGON_VERTICES {
                return Err(Error::DegeneratePolygon("hull did not close"));
            }
            hull[m] = ih;

            let mut ie = 0;
            for j in 1..n {
                if ie == ih {
                    ie = j;
                    continue;
                }

                let r = ps[ie] - ps[hull[m]];
                let v = ps[j] - ps[hull[m]];
                let c = r.cross(v);
                if c < 0.0 {
                    ie = j;
                }

                // Collinearity check
                if c == 0.0 && v.length_squared() > r.length_squared() {
                    ie = j;
                }
            }

            m += 1;
            ih = ie;

            if ie == i0 {
                break;
            }
        }

        if m < 3 {
            return Err(Error::DegeneratePolygon("points are collinear"));
        }

        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        for i in 0..m {
            vertices[i] = ps[hull[i]];
        }

        // Compute normals. Ensure the edges have non-zero length.
        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        for i in 0..m {
            let i2 = if i + 1 < m { i + 1 } else { 0 };
            let edge = vertices[i2] - vertices[i];
            if edge.length_squared() <= f32::EPSILON * f32::EPSILON {
                return Err(Error::DegeneratePolygon("zero length edge"));
            }
            normals[i] = edge.cross_scalar(1.0).normalize();
        }

        let centroid = compute_centroid(&vertices[..m])?;

        Ok(Self {
            vertices,
            normals,
            count: m,
            centroid,
            radius: POLYGON_RADIUS,
        })
    }

    /// Hull vertices in counter-clockwise order
    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    /// Outward edge normals, `normals()[i]` belongs to the edge starting at vertex `i`
    #[inline]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Checks convexity: every vertex lies on the inner side of every edge
    pub fn validate(&self) -> bool {
        let count = self.count;
        for i1 in 0..count {
            let i2 = if i1 < count - 1 { i1 + 1 } else { 0 };
            let p = self.vertices[i1];
            let e = self.vertices[i2] - p;

            for j in 0..count {
                if j == i1 || j == i2 {
                    continue;
                }
                let v = self.vertices[j] - p;
                if e.cross(v) < 0.0 {
                    return false;
                }
            }
        }
        true
    }

    pub fn test_point(&self, xf: Transform, p: Vec2) -> bool {
        let local = xf.q.inv_rotate(p - xf.p);
        self.vertices()
            .iter()
            .zip(self.normals())
            .all(|(&v, &n)| n.dot(local - v) <= 0.0)
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: Transform) -> Option<RayCastOutput> {
        // Put the ray into the polygon's frame of reference.
        let p1 = xf.q.inv_rotate(input.p1 - xf.p);
        let p2 = xf.q.inv_rotate(input.p2 - xf.p);
        let d = p2 - p1;

        let mut lower = 0.0;
        let mut upper = input.max_fraction;
        let mut index = None;

        for i in 0..self.count {
            // p = p1 + a * d
            // dot(normal, p - v) = 0
            // dot(normal, p1 - v) + a * dot(normal, d) = 0
            let numerator = self.normals[i].dot(self.vertices[i] - p1);
            let denominator = self.normals[i].dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // The segment enters this half-space.
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // The segment exits this half-space.
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            fraction: lower,
            normal: xf.q.rotate(self.normals[i]),
        })
    }

    pub fn compute_aabb(&self, xf: Transform) -> Aabb {
        let first = xf * self.vertices[0];
        let (lower, upper) = self.vertices()[1..]
            .iter()
            .map(|&v| xf * v)
            .fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Aabb::new(lower, upper).expand(self.radius)
    }

    /// Mass, centroid and inertia about the body origin.
    ///
    /// The integrals are summed over the fan of triangles formed with the
    /// first vertex, which keeps round-off low for polygons far from the origin.
    pub fn compute_mass(&self, density: f32) -> MassData {
        let mut center = Vec2::ZERO;
        let mut area = 0.0;
        let mut inertia = 0.0;

        let s = self.vertices[0];
        let inv3 = 1.0 / 3.0;

        for i in 0..self.count {
            // Triangle vertices.
            let e1 = self.vertices[i] - s;
            let e2 = if i + 1 < self.count {
                self.vertices[i + 1] - s
            } else {
                self.vertices[0] - s
            };

            let d = e1.cross(e2);

            let triangle_area = 0.5 * d;
            area += triangle_area;

            // Area weighted centroid
            center += (e1 + e2) * (triangle_area * inv3);

            let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;

            inertia += (0.25 * inv3 * d) * (intx2 + inty2);
        }

        let mass = density * area;

        if area <= f32::EPSILON {
            return MassData {
                mass: 0.0,
                center: s,
                inertia: 0.0,
            };
        }

        center *= 1.0 / area;
        let world_center = center + s;

        // Inertia relative to the reference point, shifted to the center of
        // mass and then to the body origin.
        let mut i = density * inertia;
        i += mass * (world_center.dot(world_center) - center.dot(center));

        MassData {
            mass,
            center: world_center,
            inertia: i,
        }
    }
}

fn compute_centroid(vs: &[Vec2]) -> Result<Vec2> {
    let mut c = Vec2::ZERO;
    let mut area = 0.0;

    // Use the first vertex as reference to reduce round-off errors.
    let s = vs[0];
    let inv3 = 1.0 / 3.0;

    for i in 0..vs.len() {
        let p1 = vs[0] - s;
        let p2 = vs[i] - s;
        let p3 = if i + 1 < vs.len() { vs[i + 1] - s } else { vs[0] - s };

        let d = (p2 - p1).cross(p3 - p1);
        let triangle_area = 0.5 * d;
        area += triangle_area;

        c += (p1 + p2 + p3) * (triangle_area * inv3);
    }

    if area <= f32::EPSILON {
        return Err(Error::DegeneratePolygon("zero area"));
    }
    Ok(c * (1.0 / area) + s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_mass() {
        let poly = PolygonShape::new_box(1.0, 0.5);
        let md = poly.compute_mass(2.0);
        assert_relative_eq!(md.mass, 4.0);
        assert_relative_eq!(md.center.x, 0.0, epsilon = 1e-6);
        // I = m * (w^2 + h^2) / 12
        assert_relative_eq!(md.inertia, 4.0 * (4.0 + 1.0) / 12.0, epsilon = 1e-5);
    }

    #[test]
    fn test_hull_drops_interior_points() {
        let points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.5, 0.3),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let poly = PolygonShape::try_from_points(&points).unwrap();
        assert_eq!(poly.count(), 4);
        assert!(poly.validate());
        assert_relative_eq!(poly.centroid.x, 0.5, epsilon = 1e-6);
        assert_relative_eq!(poly.centroid.y, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_hull_is_counter_clockwise() {
        let points = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];
        let poly = PolygonShape::try_from_points(&points).unwrap();
        let v = poly.vertices();
        assert!((v[1] - v[0]).cross(v[2] - v[0]) > 0.0);
        for (i, n) in poly.normals().iter().enumerate() {
            let centroid_side = n.dot(poly.centroid - v[i]);
            assert!(centroid_side < 0.0);
        }
    }

    #[test]
    fn test_degenerate_falls_back_to_box() {
        let collinear = [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)];
        assert!(PolygonShape::try_from_points(&collinear).is_err());

        let welded = [Vec2::ZERO, Vec2::new(0.0001, 0.0), Vec2::new(0.0, 0.0001)];
        assert!(matches!(
            PolygonShape::try_from_points(&welded),
            Err(Error::DegeneratePolygon(_))
        ));

        let poly = PolygonShape::from_points(&collinear);
        assert_eq!(poly, PolygonShape::new_box(1.0, 1.0));
        assert!(poly.vertices().iter().all(|v| v.x.abs() == 1.0 && v.y.abs() == 1.0));
    }

    #[test]
    fn test_ray_cast_and_point() {
        let poly = PolygonShape::new_box(1.0, 1.0);
        let xf = Transform::from_angle(Vec2::new(5.0, 0.0), 0.0);

        let input = RayCastInput::new(Vec2::ZERO, Vec2::new(10.0, 0.0));
        let hit = poly.ray_cast(&input, xf).unwrap();
        assert_relative_eq!(hit.fraction, 0.4, epsilon = 1e-6);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-6);

        assert!(poly.test_point(xf, Vec2::new(5.5, 0.5)));
        assert!(!poly.test_point(xf, Vec2::new(3.5, 0.5)));
    }

    #[test]
    fn test_oriented_box() {
        let poly = PolygonShape::new_oriented_box(1.0, 0.5, Vec2::new(2.0, 0.0), std::f32::consts::FRAC_PI_2);
        let aabb = poly.compute_aabb(Transform::IDENTITY);
        assert_relative_eq!(aabb.min.x, 1.5 - POLYGON_RADIUS, epsilon = 1e-5);
        assert_relative_eq!(aabb.max.y, 1.0 + POLYGON_RADIUS, epsilon = 1e-5);
        assert!(poly.validate());
    }
}
