use super::distance::{DistanceProxy, Simplex, SimplexVertex};
use crate::math::{Transform, Vec2};
use crate::settings::{LINEAR_SLOP, MAX_DISTANCE_ITERATIONS, POLYGON_RADIUS};

/// Input for [`shape_cast`]. Proxy B is swept along `translation_b`.
#[derive(Debug, Clone)]
pub struct ShapeCastInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub translation_b: Vec2,
}

/// Result of a successful [`shape_cast`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShapeCastOutput {
    /// Contact point on the surface of A
    pub point: Vec2,
    pub normal: Vec2,
    /// Fraction of the translation at impact
    pub lambda: f32,
    pub iterations: usize,
}

/// Linear shape cast using GJK-raycast (Gino van den Bergen, "Smooth Mesh
/// Contacts with GJK").
///
/// Returns `None` when the shapes already overlap at the start or never meet
/// along the translation.
pub fn shape_cast(input: &ShapeCastInput) -> Option<ShapeCastOutput> {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let radius_a = proxy_a.radius.max(POLYGON_RADIUS);
    let radius_b = proxy_b.radius.max(POLYGON_RADIUS);
    let radius = radius_a + radius_b;

    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let r = input.translation_b;
    let mut n = Vec2::ZERO;
    let mut lambda = 0.0;

    let mut simplex = Simplex::default();

    // Get support point in -r direction
    let index_a = proxy_a.support(xf_a.q.inv_rotate(-r));
    let w_a = xf_a * proxy_a.vertex(index_a);
    let index_b = proxy_b.support(xf_b.q.inv_rotate(r));
    let w_b = xf_b * proxy_b.vertex(index_b);
    let mut v = w_a - w_b;

    // Sigma is the target distance between polygons
    let sigma = POLYGON_RADIUS.max(radius - POLYGON_RADIUS);
    let tolerance = 0.5 * LINEAR_SLOP;

    let mut iter = 0;
    while iter < MAX_DISTANCE_ITERATIONS && v.length() - sigma > tolerance {
        // Support in direction -v (A - B)
        let index_a = proxy_a.support(xf_a.q.inv_rotate(-v));
        let w_a = xf_a * proxy_a.vertex(index_a);
        let index_b = proxy_b.support(xf_b.q.inv_rotate(v));
        let w_b = xf_b * proxy_b.vertex(index_b);
        let p = w_a - w_b;

        // -v is a normal at p
        v = v.normalize();

        // Intersect ray with plane
        let vp = v.dot(p);
        let vr = v.dot(r);
        if vp - sigma > lambda * vr {
            if vr <= 0.0 {
                return None;
            }

            lambda = (vp - sigma) / vr;
            if lambda > 1.0 {
                return None;
            }

            n = -v;
            simplex.count = 0;
        }

        // Reverse simplex since it works with B - A. Shift by lambda * r to get
        // the closest point to the current clip point; p stays unshifted so the
        // plane equation is formed in unshifted space.
        let w_a_shifted = w_b + lambda * r;
        simplex.v[simplex.count] = SimplexVertex {
            w_a: w_a_shifted,
            w_b: w_a,
            w: w_a - w_a_shifted,
            a: 1.0,
            index_a: index_b,
            index_b: index_a,
        };
        simplex.count += 1;

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // If we have 3 points, then the origin is in the corresponding triangle.
        if simplex.count == 3 {
            // Overlap
            return None;
        }

        // Get search direction.
        v = simplex.closest_point();

        iter += 1;
    }

    // Never advanced: the shapes start within the target distance.
    if iter == 0 || lambda == 0.0 {
        return None;
    }

    // Prepare output.
    let (_, point_a) = simplex.witness_points();

    if v.length_squared() > 0.0 {
        n = (-v).normalize();
    }

    Some(ShapeCastOutput {
        point: point_a + radius_a * n,
        normal: n,
        lambda,
        iterations: iter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(h: f32) -> DistanceProxy {
        DistanceProxy::new(
            &[Vec2::new(-h, -h), Vec2::new(h, -h), Vec2::new(h, h), Vec2::new(-h, h)],
            POLYGON_RADIUS,
        )
    }

    #[test]
    fn test_cast_hits_box() {
        let input = ShapeCastInput {
            proxy_a: square(1.0),
            proxy_b: square(0.5),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_angle(Vec2::new(-5.0, 0.0), 0.0),
            translation_b: Vec2::new(10.0, 0.0),
        };

        let out = shape_cast(&input).expect("should hit");
        // Gap of 3.5, closed to within the skin
        assert!(out.lambda > 0.3 && out.lambda < 0.36, "lambda {}", out.lambda);
        assert_relative_eq!(out.normal.x, -1.0, epsilon = 1e-4);
        assert!(out.iterations > 0);
    }

    #[test]
    fn test_cast_misses() {
        let input = ShapeCastInput {
            proxy_a: square(1.0),
            proxy_b: square(0.5),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_angle(Vec2::new(-5.0, 3.0), 0.0),
            translation_b: Vec2::new(10.0, 0.0),
        };
        assert!(shape_cast(&input).is_none());
    }

    #[test]
    fn test_initial_overlap_is_a_miss() {
        let input = ShapeCastInput {
            proxy_a: square(1.0),
            proxy_b: square(0.5),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::IDENTITY,
            translation_b: Vec2::new(1.0, 0.0),
        };
        assert!(shape_cast(&input).is_none());
    }
}
