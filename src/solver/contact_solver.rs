use crate::callbacks::ContactImpulse;
use crate::collision::narrow_phase::{Manifold, ManifoldType, WorldManifold};
use crate::dynamics::{Position, SolverBody, TimeStep, Velocity};
use crate::math::{Mat22, Rot, Transform, Vec2};
use crate::settings::{BAUMGARTE, LINEAR_SLOP, MAX_CONDITION_NUMBER, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, TOI_BAUMGARTE};

/// Everything the solver needs from one touching contact
#[derive(Debug, Clone, Copy)]
pub struct ContactConstraintDef {
    pub manifold: Manifold,
    pub friction: f32,
    pub restitution: f32,
    pub restitution_threshold: f32,
    pub tangent_speed: f32,
    pub radius_a: f32,
    pub radius_b: f32,
    pub body_a: SolverBody,
    pub body_b: SolverBody,
    /// Index of the contact in the island, echoed back when storing impulses
    pub contact_index: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityConstraintPoint {
    pub r_a: Vec2,
    pub r_b: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub normal_mass: f32,
    pub tangent_mass: f32,
    pub velocity_bias: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct ContactVelocityConstraint {
    pub points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    pub normal: Vec2,
    /// Inverse of `k`, used by the two-point block solver
    pub normal_mass: Mat22,
    pub k: Mat22,
    pub index_a: usize,
    pub index_b: usize,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
    pub friction: f32,
    pub restitution: f32,
    pub threshold: f32,
    pub tangent_speed: f32,
    pub point_count: usize,
    pub contact_index: usize,
}

impl ContactVelocityConstraint {
    /// Accumulated impulses in the form reported to listeners
    pub fn impulse(&self) -> ContactImpulse {
        let mut impulse = ContactImpulse { count: self.point_count, ..Default::default() };
        for (j, point) in self.points.iter().take(self.point_count).enumerate() {
            impulse.normal_impulses[j] = point.normal_impulse;
            impulse.tangent_impulses[j] = point.tangent_impulse;
        }
        impulse
    }

    fn apply(&self, j: usize, p: Vec2, va: &mut Velocity, vb: &mut Velocity) {
        let point = &self.points[j];
        va.v -= p * self.inv_mass_a;
        va.w -= self.inv_i_a * point.r_a.cross(p);
        vb.v += p * self.inv_mass_b;
        vb.w += self.inv_i_b * point.r_b.cross(p);
    }

    fn relative_velocity(&self, j: usize, va: &Velocity, vb: &Velocity) -> Vec2 {
        let point = &self.points[j];
        vb.v + Vec2::scalar_cross(vb.w, point.r_b) - va.v - Vec2::scalar_cross(va.w, point.r_a)
    }
}

#[derive(Debug, Clone, Copy)]
struct ContactPositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    local_normal: Vec2,
    local_point: Vec2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_i_a: f32,
    inv_i_b: f32,
    manifold_type: ManifoldType,
    radius_a: f32,
    radius_b: f32,
    point_count: usize,
}

/// Contact geometry re-evaluated at the current solver positions
struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: f32,
}

impl PositionSolverManifold {
    fn new(pc: &ContactPositionConstraint, xf_a: Transform, xf_b: Transform, index: usize) -> Self {
        match pc.manifold_type {
            ManifoldType::Circles => {
                let point_a = xf_a * pc.local_point;
                let point_b = xf_b * pc.local_points[0];
                let normal = (point_b - point_a).normalize();
                Self {
                    normal,
                    point: (point_a + point_b) * 0.5,
                    separation: (point_b - point_a).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q * pc.local_normal;
                let plane_point = xf_a * pc.local_point;
                let clip_point = xf_b * pc.local_points[index];
                Self {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q * pc.local_normal;
                let plane_point = xf_b * pc.local_point;
                let clip_point = xf_a * pc.local_points[index];
                // Points from A to B
                Self {
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
        }
    }
}

fn center_transform(position: Position, local_center: Vec2) -> Transform {
    let q = Rot::new(position.a);
    Transform::new(position.c - q * local_center, q)
}

/// Sequential impulse solver for the contacts of one island.
///
/// Constraint storage is reused between islands and steps.
#[derive(Debug, Default)]
pub struct ContactSolver {
    manifolds: Vec<Manifold>,
    velocity_constraints: Vec<ContactVelocityConstraint>,
    position_constraints: Vec<ContactPositionConstraint>,
}

impl ContactSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets up the position independent part of the constraints. Warm
    /// starting impulses are scaled by the step ratio.
    pub fn reset(&mut self, step: TimeStep, defs: impl IntoIterator<Item = ContactConstraintDef>) {
        self.manifolds.clear();
        self.velocity_constraints.clear();
        self.position_constraints.clear();

        for def in defs {
            let manifold = def.manifold;
            let point_count = manifold.point_count;
            debug_assert!(point_count > 0);

            let mut vc = ContactVelocityConstraint {
                points: [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS],
                normal: Vec2::ZERO,
                normal_mass: Mat22::ZERO,
                k: Mat22::ZERO,
                index_a: def.body_a.index,
                index_b: def.body_b.index,
                inv_mass_a: def.body_a.inv_mass,
                inv_mass_b: def.body_b.inv_mass,
                inv_i_a: def.body_a.inv_i,
                inv_i_b: def.body_b.inv_i,
                friction: def.friction,
                restitution: def.restitution,
                threshold: def.restitution_threshold,
                tangent_speed: def.tangent_speed,
                point_count,
                contact_index: def.contact_index,
            };

            let mut pc = ContactPositionConstraint {
                local_points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                index_a: def.body_a.index,
                index_b: def.body_b.index,
                inv_mass_a: def.body_a.inv_mass,
                inv_mass_b: def.body_b.inv_mass,
                local_center_a: def.body_a.local_center,
                local_center_b: def.body_b.local_center,
                inv_i_a: def.body_a.inv_i,
                inv_i_b: def.body_b.inv_i,
                manifold_type: manifold.manifold_type,
                radius_a: def.radius_a,
                radius_b: def.radius_b,
                point_count,
            };

            for (j, mp) in manifold.points().iter().enumerate() {
                let vcp = &mut vc.points[j];
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * mp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                }
                pc.local_points[j] = mp.local_point;
            }

            self.manifolds.push(manifold);
            self.velocity_constraints.push(vc);
            self.position_constraints.push(pc);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.velocity_constraints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.velocity_constraints.is_empty()
    }

    #[inline]
    pub fn velocity_constraints(&self) -> &[ContactVelocityConstraint] {
        &self.velocity_constraints
    }

    /// Computes world anchors, effective masses and restitution bias at the
    /// current positions
    pub fn initialize_velocity_constraints(&mut self, positions: &[Position], velocities: &[Velocity]) {
        for ((vc, pc), manifold) in self
            .velocity_constraints
            .iter_mut()
            .zip(&self.position_constraints)
            .zip(&self.manifolds)
        {
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

            let pos_a = positions[vc.index_a];
            let pos_b = positions[vc.index_b];
            let vel_a = velocities[vc.index_a];
            let vel_b = velocities[vc.index_b];

            let xf_a = center_transform(pos_a, pc.local_center_a);
            let xf_b = center_transform(pos_b, pc.local_center_b);

            let world_manifold = WorldManifold::new(manifold, xf_a, pc.radius_a, xf_b, pc.radius_b);
            vc.normal = world_manifold.normal;
            let tangent = vc.normal.cross_scalar(1.0);

            for j in 0..vc.point_count {
                let vcp = &mut vc.points[j];
                vcp.r_a = world_manifold.points[j] - pos_a.c;
                vcp.r_b = world_manifold.points[j] - pos_b.c;

                let rn_a = vcp.r_a.cross(vc.normal);
                let rn_b = vcp.r_b.cross(vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = vcp.r_a.cross(tangent);
                let rt_b = vcp.r_b.cross(tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Velocity bias for restitution
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    vel_b.v + Vec2::scalar_cross(vel_b.w, vcp.r_b) - vel_a.v - Vec2::scalar_cross(vel_a.w, vcp.r_a),
                );
                if v_rel < -vc.threshold {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            // Prepare the block solver for two points
            if vc.point_count == 2 {
                let [p1, p2] = &vc.points;
                let rn1_a = p1.r_a.cross(vc.normal);
                let rn1_b = p1.r_b.cross(vc.normal);
                let rn2_a = p2.r_a.cross(vc.normal);
                let rn2_b = p2.r_b.cross(vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    vc.k = Mat22::new(k11, k12, k12, k22);
                    vc.normal_mass = vc.k.inverse();
                } else {
                    // Redundant constraints, keep one
                    vc.point_count = 1;
                }
            }
        }
    }

    /// Applies the impulses carried over from the previous step
    pub fn warm_start(&self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let mut va = velocities[vc.index_a];
            let mut vb = velocities[vc.index_b];
            let tangent = vc.normal.cross_scalar(1.0);

            for j in 0..vc.point_count {
                let point = &vc.points[j];
                let p = vc.normal * point.normal_impulse + tangent * point.tangent_impulse;
                vc.apply(j, p, &mut va, &mut vb);
            }

            velocities[vc.index_a] = va;
            velocities[vc.index_b] = vb;
        }
    }

    /// One velocity iteration: friction first, then non-penetration
    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let mut va = velocities[vc.index_a];
            let mut vb = velocities[vc.index_b];

            let normal = vc.normal;
            let tangent = normal.cross_scalar(1.0);

            debug_assert!(vc.point_count == 1 || vc.point_count == 2);

            for j in 0..vc.point_count {
                let dv = vc.relative_velocity(j, &va, &vb);
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let point = &mut vc.points[j];
                let lambda = point.tangent_mass * -vt;

                let max_friction = vc.friction * point.normal_impulse;
                let new_impulse = (point.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - point.tangent_impulse;
                point.tangent_impulse = new_impulse;

                vc.apply(j, tangent * lambda, &mut va, &mut vb);
            }

            if vc.point_count == 1 {
                let dv = vc.relative_velocity(0, &va, &vb);
                let vn = dv.dot(normal);
                let point = &mut vc.points[0];
                let lambda = -point.normal_mass * (vn - point.velocity_bias);

                let new_impulse = (point.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - point.normal_impulse;
                point.normal_impulse = new_impulse;

                vc.apply(0, normal * lambda, &mut va, &mut vb);
            } else {
                solve_block(vc, &mut va, &mut vb);
            }

            velocities[vc.index_a] = va;
            velocities[vc.index_b] = vb;
        }
    }

    /// Copies the accumulated impulses into a manifold for warm starting.
    /// `index` is the position of the constraint, not the contact index.
    pub fn store_impulses(&self, index: usize, manifold: &mut Manifold) {
        let vc = &self.velocity_constraints[index];
        for (mp, point) in manifold.points.iter_mut().zip(&vc.points).take(vc.point_count) {
            mp.normal_impulse = point.normal_impulse;
            mp.tangent_impulse = point.tangent_impulse;
        }
    }

    /// One position iteration. Returns true when the worst separation is
    /// within tolerance.
    pub fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        let min_separation = self.solve_positions(positions, BAUMGARTE, |pc| {
            (pc.inv_mass_a, pc.inv_i_a, pc.inv_mass_b, pc.inv_i_b)
        });

        // Separation is never pushed above -LINEAR_SLOP
        min_separation >= -3.0 * LINEAR_SLOP
    }

    /// Position iteration for a time of impact sub-step. Only the two bodies
    /// at `toi_index_a` and `toi_index_b` move.
    pub fn solve_toi_position_constraints(
        &self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let is_toi = |index: usize| index == toi_index_a || index == toi_index_b;
        let min_separation = self.solve_positions(positions, TOI_BAUMGARTE, |pc| {
            let (m_a, i_a) = if is_toi(pc.index_a) { (pc.inv_mass_a, pc.inv_i_a) } else { (0.0, 0.0) };
            let (m_b, i_b) = if is_toi(pc.index_b) { (pc.inv_mass_b, pc.inv_i_b) } else { (0.0, 0.0) };
            (m_a, i_a, m_b, i_b)
        });

        min_separation >= -1.5 * LINEAR_SLOP
    }

    fn solve_positions(
        &self,
        positions: &mut [Position],
        baumgarte: f32,
        masses: impl Fn(&ContactPositionConstraint) -> (f32, f32, f32, f32),
    ) -> f32 {
        let mut min_separation = 0.0f32;

        for pc in &self.position_constraints {
            let (m_a, i_a, m_b, i_b) = masses(pc);

            let mut pos_a = positions[pc.index_a];
            let mut pos_b = positions[pc.index_b];

            for j in 0..pc.point_count {
                let xf_a = center_transform(pos_a, pc.local_center_a);
                let xf_b = center_transform(pos_b, pc.local_center_b);

                let psm = PositionSolverManifold::new(pc, xf_a, xf_b, j);
                let r_a = psm.point - pos_a.c;
                let r_b = psm.point - pos_b.c;

                min_separation = min_separation.min(psm.separation);

                // Prevent large corrections and allow slop
                let c = (baumgarte * (psm.separation + LINEAR_SLOP)).clamp(-MAX_LINEAR_CORRECTION, 0.0);

                let rn_a = r_a.cross(psm.normal);
                let rn_b = r_b.cross(psm.normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                let impulse = if k > 0.0 { -c / k } else { 0.0 };
                let p = psm.normal * impulse;

                pos_a.c -= p * m_a;
                pos_a.a -= i_a * r_a.cross(p);
                pos_b.c += p * m_b;
                pos_b.a += i_b * r_b.cross(p);
            }

            positions[pc.index_a] = pos_a;
            positions[pc.index_b] = pos_b;
        }

        min_separation
    }
}

/// Two-point normal solve as a mixed linear complementarity problem.
///
/// With `a` the accumulated impulse and `x` the new total, `vn = K x + b'`
/// where `b' = vn0 - bias - K a`. The cases `vn = 0`, `vn1 = 0 & x2 = 0`,
/// `x1 = 0 & vn2 = 0` and `x = 0` are tried in order and the first feasible
/// one wins. When none is feasible the impulses are left unchanged.
fn solve_block(vc: &mut ContactVelocityConstraint, va: &mut Velocity, vb: &mut Velocity) {
    let normal = vc.normal;
    let a = Vec2::new(vc.points[0].normal_impulse, vc.points[1].normal_impulse);
    debug_assert!(a.x >= 0.0 && a.y >= 0.0);

    let vn1 = vc.relative_velocity(0, va, vb).dot(normal);
    let vn2 = vc.relative_velocity(1, va, vb).dot(normal);

    let b = Vec2::new(vn1 - vc.points[0].velocity_bias, vn2 - vc.points[1].velocity_bias) - vc.k * a;

    let candidates = [
        // vn = 0
        {
            let x = -(vc.normal_mass * b);
            (x, x.x >= 0.0 && x.y >= 0.0)
        },
        // vn1 = 0, x2 = 0
        {
            let x = Vec2::new(-vc.points[0].normal_mass * b.x, 0.0);
            let vn2 = vc.k.ex.y * x.x + b.y;
            (x, x.x >= 0.0 && vn2 >= 0.0)
        },
        // x1 = 0, vn2 = 0
        {
            let x = Vec2::new(0.0, -vc.points[1].normal_mass * b.y);
            let vn1 = vc.k.ey.x * x.y + b.x;
            (x, x.y >= 0.0 && vn1 >= 0.0)
        },
        // x = 0
        (Vec2::ZERO, b.x >= 0.0 && b.y >= 0.0),
    ];

    let Some(&(x, _)) = candidates.iter().find(|(_, feasible)| *feasible) else {
        return;
    };

    let d = x - a;
    vc.apply(0, normal * d.x, va, vb);
    vc.apply(1, normal * d.y, va, vb);
    vc.points[0].normal_impulse = x.x;
    vc.points[1].normal_impulse = x.y;
}
