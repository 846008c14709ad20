use super::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::math::{Sweep, Vec2};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, MAX_TOI_ITERATIONS, MAX_TOI_ROOT_ITERATIONS};

/// Input for [`time_of_impact`]
#[derive(Debug, Clone)]
pub struct ToiInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Sweep interval is [0, t_max]
    pub t_max: f32,
}

/// Outcome of a time of impact query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToiState {
    #[default]
    Unknown,
    /// The root finder gave up before converging
    Failed,
    /// The shapes already overlap at the start
    Overlapped,
    /// Impact found at `t`
    Touching,
    /// The shapes stay apart over the whole interval
    Separated,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f32,
    /// Outer separating-axis iterations
    pub iterations: usize,
    /// Total root finder iterations
    pub root_iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeparationType {
    Points,
    FaceA,
    FaceB,
}

/// Separation along a fixed local axis as a function of sweep time
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationType,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f32,
    ) -> Self {
        let xf_a = sweep_a.transform(t1);
        let xf_b = sweep_b.transform(t1);

        let index_a0 = usize::from(cache.index_a[0]);
        let index_b0 = usize::from(cache.index_b[0]);

        if cache.count == 1 {
            let point_a = xf_a * proxy_a.vertex(index_a0);
            let point_b = xf_b * proxy_b.vertex(index_b0);
            return Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationType::Points,
                local_point: Vec2::ZERO,
                axis: (point_b - point_a).normalize(),
            };
        }

        if cache.index_a[0] == cache.index_a[1] {
            // Two points on B and one on A.
            let local_point_b1 = proxy_b.vertex(index_b0);
            let local_point_b2 = proxy_b.vertex(usize::from(cache.index_b[1]));

            let mut axis = (local_point_b2 - local_point_b1).cross_scalar(1.0).normalize();
            let normal = xf_b.q * axis;

            let local_point = 0.5 * (local_point_b1 + local_point_b2);
            let point_b = xf_b * local_point;
            let point_a = xf_a * proxy_a.vertex(index_a0);

            if (point_a - point_b).dot(normal) < 0.0 {
                axis = -axis;
            }

            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationType::FaceB,
                local_point,
                axis,
            }
        } else {
            // Two points on A and one or two points on B.
            let local_point_a1 = proxy_a.vertex(index_a0);
            let local_point_a2 = proxy_a.vertex(usize::from(cache.index_a[1]));

            let mut axis = (local_point_a2 - local_point_a1).cross_scalar(1.0).normalize();
            let normal = xf_a.q * axis;

            let local_point = 0.5 * (local_point_a1 + local_point_a2);
            let point_a = xf_a * local_point;
            let point_b = xf_b * proxy_b.vertex(index_b0);

            if (point_b - point_a).dot(normal) < 0.0 {
                axis = -axis;
            }

            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationType::FaceA,
                local_point,
                axis,
            }
        }
    }

    /// Finds the deepest points at time `t`, returning their indices and separation
    fn find_min_separation(&self, t: f32) -> (usize, usize, f32) {
        let xf_a = self.sweep_a.transform(t);
        let xf_b = self.sweep_b.transform(t);

        match self.kind {
            SeparationType::Points => {
                let axis_a = xf_a.q.inv_rotate(self.axis);
                let axis_b = xf_b.q.inv_rotate(-self.axis);

                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);

                let point_a = xf_a * self.proxy_a.vertex(index_a);
                let point_b = xf_b * self.proxy_b.vertex(index_b);

                (index_a, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationType::FaceA => {
                let normal = xf_a.q * self.axis;
                let point_a = xf_a * self.local_point;

                let axis_b = xf_b.q.inv_rotate(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = xf_b * self.proxy_b.vertex(index_b);

                (0, index_b, (point_b - point_a).dot(normal))
            }
            SeparationType::FaceB => {
                let normal = xf_b.q * self.axis;
                let point_b = xf_b * self.local_point;

                let axis_a = xf_a.q.inv_rotate(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = xf_a * self.proxy_a.vertex(index_a);

                (index_a, 0, (point_a - point_b).dot(normal))
            }
        }
    }

    /// Separation of the given witness points at time `t`
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let xf_a = self.sweep_a.transform(t);
        let xf_b = self.sweep_b.transform(t);

        match self.kind {
            SeparationType::Points => {
                let point_a = xf_a * self.proxy_a.vertex(index_a);
                let point_b = xf_b * self.proxy_b.vertex(index_b);
                (point_b - point_a).dot(self.axis)
            }
            SeparationType::FaceA => {
                let normal = xf_a.q * self.axis;
                let point_a = xf_a * self.local_point;
                let point_b = xf_b * self.proxy_b.vertex(index_b);
                (point_b - point_a).dot(normal)
            }
            SeparationType::FaceB => {
                let normal = xf_b.q * self.axis;
                let point_b = xf_b * self.local_point;
                let point_a = xf_a * self.proxy_a.vertex(index_a);
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Computes the upper bound on time before two shapes penetrate, using
/// conservative advancement on local separating axes.
///
/// Time is a fraction in [0, t_max]. The target separation is the sum of the
/// skin radii less three linear slops, so the shapes end up slightly
/// overlapping and the regular solver can take over.
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let mut output = ToiOutput {
        state: ToiState::Unknown,
        t: input.t_max,
        iterations: 0,
        root_iterations: 0,
    };

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    // Large rotations can make the root finder fail, so normalize the sweep angles.
    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;

    let mut cache = SimplexCache::default();
    let mut distance_input = DistanceInput {
        proxy_a: input.proxy_a.clone(),
        proxy_b: input.proxy_b.clone(),
        transform_a: Default::default(),
        transform_b: Default::default(),
        use_radii: false,
    };

    // The outer loop progressively attempts to compute new separating axes.
    // It terminates when an axis is repeated (no progress is made).
    loop {
        distance_input.transform_a = sweep_a.transform(t1);
        distance_input.transform_b = sweep_b.transform(t1);

        // Get the distance between shapes. The result also yields a separating axis.
        let distance_output = distance(&distance_input, &mut cache);

        // If the shapes are overlapped, we give up on continuous collision.
        if distance_output.distance <= 0.0 {
            output.state = ToiState::Overlapped;
            output.t = 0.0;
            break;
        }

        if distance_output.distance < target + tolerance {
            output.state = ToiState::Touching;
            output.t = t1;
            break;
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Compute the TOI on the separating axis by successively resolving
        // the deepest point. Bounded by the number of vertices.
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back_iter = 0;
        loop {
            // Find the deepest point at t2. Store the witness point indices.
            let (index_a, index_b, mut s2) = fcn.find_min_separation(t2);

            // Is the final configuration separated?
            if s2 > target + tolerance {
                output.state = ToiState::Separated;
                output.t = t_max;
                done = true;
                break;
            }

            // Has the separation reached tolerance?
            if s2 > target - tolerance {
                // Advance the sweeps
                t1 = t2;
                break;
            }

            // Compute the initial separation of the witness points.
            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // Initial overlap, possible when the root finder ran out of iterations.
            if s1 < target - tolerance {
                output.state = ToiState::Failed;
                output.t = t1;
                done = true;
                break;
            }

            // Check for touching
            if s1 <= target + tolerance {
                // t1 holds the TOI (could be 0)
                output.state = ToiState::Touching;
                output.t = t1;
                done = true;
                break;
            }

            // Compute 1D root of: f(x) - target = 0
            let mut root_iter_count = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                // Alternate the secant rule with bisection to guarantee progress.
                let t = if root_iter_count & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };

                root_iter_count += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    // t2 holds a tentative value for t1
                    t2 = t;
                    break;
                }

                // Ensure we continue to bracket the root.
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iter_count == MAX_TOI_ROOT_ITERATIONS {
                    break;
                }
            }

            output.root_iterations += root_iter_count;

            push_back_iter += 1;
            if push_back_iter == MAX_POLYGON_VERTICES {
                break;
            }
        }

        output.iterations += 1;

        if done {
            break;
        }

        if output.iterations == MAX_TOI_ITERATIONS {
            // Root finder got stuck. Semi-victory.
            output.state = ToiState::Failed;
            output.t = t1;
            break;
        }
    }

    output
}
