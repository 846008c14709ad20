//! GJK closest points between convex proxies.
//!
//! Uses Voronoi regions and barycentric coordinates (Christer Ericson) on a
//! simplex of at most three support points.

use smallvec::SmallVec;

use crate::geometry::Shape;
use crate::math::{Transform, Vec2};
use crate::settings::{MAX_DISTANCE_ITERATIONS, MAX_POLYGON_VERTICES};

/// A convex vertex cloud with a skin radius, as seen by GJK
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceProxy {
    pub vertices: SmallVec<[Vec2; MAX_POLYGON_VERTICES]>,
    pub radius: f32,
}

impl DistanceProxy {
    /// Builds a proxy from raw vertices
    pub fn new(vertices: &[Vec2], radius: f32) -> Self {
        Self {
            vertices: SmallVec::from_slice(vertices),
            radius,
        }
    }

    /// Builds a proxy for one child of a shape. Chains yield their child segment.
    pub fn from_shape(shape: &Shape, child_index: usize) -> Self {
        match shape {
            Shape::Circle(circle) => Self::new(&[circle.position], circle.radius),
            Shape::Polygon(polygon) => Self::new(polygon.vertices(), polygon.radius),
            Shape::Edge(edge) => Self::new(&[edge.vertex1, edge.vertex2], edge.radius),
            Shape::Chain(chain) => {
                let vs = chain.vertices();
                let v1 = vs[child_index];
                let v2 = if child_index + 1 < vs.len() { vs[child_index + 1] } else { vs[0] };
                Self::new(&[v1, v2], chain.radius)
            }
        }
    }

    /// Index of the vertex furthest along `d`
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            let value = v.dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }

    /// The vertex furthest along `d`
    #[inline]
    pub fn support_vertex(&self, d: Vec2) -> Vec2 {
        self.vertices[self.support(d)]
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Warm-start data for repeated GJK calls on the same pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimplexCache {
    /// Length or area of the cached simplex
    pub metric: f32,
    pub count: usize,
    /// Vertices on shape A
    pub index_a: [u8; 3],
    /// Vertices on shape B
    pub index_b: [u8; 3],
}

/// Input for [`distance`]
#[derive(Debug, Clone)]
pub struct DistanceInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Shrink the result by the proxy radii
    pub use_radii: bool,
}

/// Output for [`distance`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistanceOutput {
    /// Closest point on shape A
    pub point_a: Vec2,
    /// Closest point on shape B
    pub point_b: Vec2,
    pub distance: f32,
    /// Number of GJK iterations used
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SimplexVertex {
    /// Support point in proxy A
    pub w_a: Vec2,
    /// Support point in proxy B
    pub w_b: Vec2,
    /// w_b - w_a
    pub w: Vec2,
    /// Barycentric coordinate for closest point
    pub a: f32,
    pub index_a: usize,
    pub index_b: usize,
}

impl SimplexVertex {
    fn new(proxy_a: &DistanceProxy, xf_a: Transform, index_a: usize, proxy_b: &DistanceProxy, xf_b: Transform, index_b: usize) -> Self {
        let w_a = xf_a * proxy_a.vertex(index_a);
        let w_b = xf_b * proxy_b.vertex(index_b);
        Self {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 0.0,
            index_a,
            index_b,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Simplex {
    pub v: [SimplexVertex; 3],
    pub count: usize,
}

impl Simplex {
    pub fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: Transform,
        proxy_b: &DistanceProxy,
        xf_b: Transform,
    ) -> Self {
        let mut simplex = Self::default();

        // Copy data from cache.
        simplex.count = cache.count.min(3);
        for i in 0..simplex.count {
            simplex.v[i] = SimplexVertex::new(
                proxy_a,
                xf_a,
                usize::from(cache.index_a[i]),
                proxy_b,
                xf_b,
                usize::from(cache.index_b[i]),
            );
        }

        // If the new metric is substantially different than the cached one, flush the simplex.
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::EPSILON {
                simplex.count = 0;
            }
        }

        // If the cache is empty or invalid ...
        if simplex.count == 0 {
            simplex.v[0] = SimplexVertex::new(proxy_a, xf_a, 0, proxy_b, xf_b, 0);
            simplex.v[0].a = 1.0;
            simplex.count = 1;
        }

        simplex
    }

    pub fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for (i, v) in self.v[..self.count].iter().enumerate() {
            cache.index_a[i] = v.index_a as u8;
            cache.index_b[i] = v.index_b as u8;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = e12.cross(-self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    Vec2::scalar_cross(1.0, e12)
                } else {
                    // Origin is right of e12.
                    e12.cross_scalar(1.0)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    pub fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].a * self.v[0].w + self.v[1].a * self.v[1].w,
            _ => Vec2::ZERO,
        }
    }

    pub fn witness_points(&self) -> (Vec2, Vec2) {
        let [v1, v2, v3] = &self.v;
        match self.count {
            1 => (v1.w_a, v1.w_b),
            2 => (v1.a * v1.w_a + v2.a * v2.w_a, v1.a * v1.w_b + v2.a * v2.w_b),
            3 => {
                let p = v1.a * v1.w_a + v2.a * v2.w_a + v3.a * v3.w_a;
                (p, p)
            }
            _ => (Vec2::ZERO, Vec2::ZERO),
        }
    }

    fn metric(&self) -> f32 {
        let [v1, v2, v3] = &self.v;
        match self.count {
            2 => v1.w.distance(v2.w),
            3 => (v2.w - v1.w).cross(v3.w - v1.w),
            _ => 0.0,
        }
    }

    // Solve a line segment using barycentric coordinates.
    //
    // p = a1 * w1 + a2 * w2
    // a1 + a2 = 1
    //
    // The vector from the origin to the closest point on the line is
    // perpendicular to the line.
    // e12 = w2 - w1
    // dot(p, e) = 0
    // a1 * dot(w1, e) + a2 * dot(w2, e) = 0
    pub fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            // a2 <= 0, so we clamp it to 0
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            // a1 <= 0, so we clamp it to 0
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // Must be in e12 region.
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    // Possible regions:
    // - points[2]
    // - edge points[0]-points[2]
    // - edge points[1]-points[2]
    // - inside the triangle
    pub fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        // Edge12
        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        // Edge13
        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        // Edge23
        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        // Triangle123
        let n123 = e12.cross(e13);

        let d123_1 = n123 * w2.cross(w3);
        let d123_2 = n123 * w3.cross(w1);
        let d123_3 = n123 * w1.cross(w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv_d12;
            self.v[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv_d13;
            self.v[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv_d23;
            self.v[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Must be in triangle123
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv_d123;
        self.v[1].a = d123_2 * inv_d123;
        self.v[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

/// Computes the closest points between two convex proxies.
///
/// The cache warm-starts the simplex and is updated on return. On the first
/// call for a pair set `cache.count` to zero.
pub fn distance(input: &DistanceInput, cache: &mut SimplexCache) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    // Initialize the simplex.
    let mut simplex = Simplex::read_cache(cache, proxy_a, xf_a, proxy_b, xf_b);

    // Last simplex vertices, to detect duplicates and prevent cycling.
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    // Main iteration loop.
    let mut iter = 0;
    while iter < MAX_DISTANCE_ITERATIONS {
        // Copy simplex so we can identify duplicates.
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // If we have 3 points, then the origin is in the corresponding triangle.
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();

        // The origin is probably contained by a line segment or triangle,
        // so the shapes are overlapped.
        if d.length_squared() < f32::EPSILON * f32::EPSILON {
            break;
        }

        // Compute a tentative new simplex vertex using support points.
        let index_a = proxy_a.support(xf_a.q.inv_rotate(-d));
        let index_b = proxy_b.support(xf_b.q.inv_rotate(d));
        let vertex = SimplexVertex::new(proxy_a, xf_a, index_a, proxy_b, xf_b, index_b);

        // Iteration count is equated to the number of support point calls.
        iter += 1;

        // Check for duplicate support points. This is the main termination criteria.
        let duplicate = (0..save_count).any(|i| index_a == save_a[i] && index_b == save_b[i]);
        if duplicate {
            break;
        }

        // New vertex is ok and needed.
        simplex.v[simplex.count] = vertex;
        simplex.count += 1;
    }

    // Prepare output.
    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = point_a.distance(point_b);

    // Cache the simplex.
    simplex.write_cache(cache);

    // Apply radii if requested
    if input.use_radii {
        if dist < f32::EPSILON {
            // Shapes are too close to safely compute normal
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        } else {
            // Keep closest points on perimeter even if overlapped so the points move smoothly.
            let r_a = proxy_a.radius;
            let r_b = proxy_b.radius;
            let normal = (point_b - point_a).normalize();
            dist = (dist - r_a - r_b).max(0.0);
            point_a += r_a * normal;
            point_b -= r_b * normal;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

/// Tests whether two shape children overlap, including their skin radii
pub fn test_overlap(
    shape_a: &Shape,
    child_a: usize,
    shape_b: &Shape,
    child_b: usize,
    xf_a: Transform,
    xf_b: Transform,
) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::from_shape(shape_a, child_a),
        proxy_b: DistanceProxy::from_shape(shape_b, child_b),
        transform_a: xf_a,
        transform_b: xf_b,
        use_radii: true,
    };

    let mut cache = SimplexCache::default();
    let output = distance(&input, &mut cache);

    output.distance < 10.0 * f32::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn input(shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform, use_radii: bool) -> DistanceInput {
        DistanceInput {
            proxy_a: DistanceProxy::from_shape(shape_a, 0),
            proxy_b: DistanceProxy::from_shape(shape_b, 0),
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii,
        }
    }

    #[test]
    fn test_box_to_box_distance() {
        let a = Shape::cuboid(1.0, 1.0);
        let b = Shape::cuboid(0.5, 0.5);
        let xf_b = Transform::from_angle(Vec2::new(4.0, 0.3), 0.0);

        let mut cache = SimplexCache::default();
        let out = distance(&input(&a, Transform::IDENTITY, &b, xf_b, false), &mut cache);
        assert_relative_eq!(out.distance, 2.5, epsilon = 1e-5);
        assert_relative_eq!(out.point_a.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(out.point_b.x, 3.5, epsilon = 1e-5);
        assert!(cache.count > 0);

        // Radii shrink the gap
        let mut cache = SimplexCache::default();
        let out = distance(&input(&a, Transform::IDENTITY, &b, xf_b, true), &mut cache);
        assert_relative_eq!(out.distance, 2.5 - 2.0 * a.radius(), epsilon = 1e-5);
    }

    #[test]
    fn test_warm_started_cache() {
        let a = Shape::circle(0.5);
        let b = Shape::cuboid(0.5, 0.5);
        let xf_b = Transform::from_angle(Vec2::new(3.0, 0.0), 0.4);

        let mut cache = SimplexCache::default();
        let first = distance(&input(&a, Transform::IDENTITY, &b, xf_b, true), &mut cache);
        let second = distance(&input(&a, Transform::IDENTITY, &b, xf_b, true), &mut cache);
        assert_relative_eq!(first.distance, second.distance, epsilon = 1e-6);
        assert!(second.iterations <= first.iterations);
    }

    #[test]
    fn test_overlap_query() {
        let a = Shape::circle(1.0);
        let b = Shape::circle(1.0);
        let near = Transform::from_angle(Vec2::new(1.5, 0.0), 0.0);
        let far = Transform::from_angle(Vec2::new(2.5, 0.0), 0.0);
        assert!(test_overlap(&a, 0, &b, 0, Transform::IDENTITY, near));
        assert!(!test_overlap(&a, 0, &b, 0, Transform::IDENTITY, far));
    }

    #[test]
    fn test_support() {
        let proxy = DistanceProxy::new(&[Vec2::new(-1.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(0.0, 1.0)], 0.0);
        assert_eq!(proxy.support(Vec2::X), 1);
        assert_eq!(proxy.support(Vec2::Y), 2);
        assert_eq!(proxy.support_vertex(-Vec2::X), Vec2::new(-1.0, 0.0));
    }
}
