use crate::dynamics::{Body, BodyHandle, SolverBody, SolverData};
use crate::math::{Rot, Vec2};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};

use super::JointHandle;

/// Couples two revolute or prismatic joints so that
/// `coordinate1 + ratio * coordinate2` stays constant.
///
/// Each coupled joint must have a dynamic body B; its body A is usually
/// the ground. The gear copies the geometry it needs when created, but the
/// coupled joints are still expected to outlive it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct GearJointDef {
    pub collide_connected: bool,
    /// Revolute or prismatic joint whose body B becomes the gear's body A
    pub joint1: JointHandle,
    /// Revolute or prismatic joint whose body B becomes the gear's body B
    pub joint2: JointHandle,
    pub ratio: f32,
}

impl Default for GearJointDef {
    fn default() -> Self {
        Self {
            collide_connected: false,
            joint1: JointHandle::default(),
            joint2: JointHandle::default(),
            ratio: 1.0,
        }
    }
}

impl GearJointDef {
    pub fn new(joint1: JointHandle, joint2: JointHandle, ratio: f32) -> Self {
        Self { joint1, joint2, ratio, ..Default::default() }
    }

    pub fn with_collide_connected(mut self, flag: bool) -> Self {
        self.collide_connected = flag;
        self
    }
}

/// Geometry of one coupled joint, copied when the gear is created
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum GearSide {
    Revolute {
        local_anchor_ground: Vec2,
        local_anchor_body: Vec2,
        reference_angle: f32,
    },
    Prismatic {
        local_anchor_ground: Vec2,
        local_anchor_body: Vec2,
        reference_angle: f32,
        local_axis: Vec2,
    },
}

impl GearSide {
    fn anchors(&self) -> (Vec2, Vec2) {
        match *self {
            Self::Revolute { local_anchor_ground, local_anchor_body, .. }
            | Self::Prismatic { local_anchor_ground, local_anchor_body, .. } => {
                (local_anchor_ground, local_anchor_body)
            }
        }
    }

    /// Joint coordinate from the body and ground transforms
    fn coordinate(&self, body: &Body, ground: &Body) -> f32 {
        match *self {
            Self::Revolute { reference_angle, .. } => body.sweep.a - ground.sweep.a - reference_angle,
            Self::Prismatic { local_anchor_ground, local_anchor_body, local_axis, .. } => {
                let (xf_body, xf_ground) = (body.xf, ground.xf);
                let p = xf_ground.q.inv_rotate(xf_body.q * local_anchor_body + (xf_body.p - xf_ground.p));
                (p - local_anchor_ground).dot(local_axis)
            }
        }
    }
}

/// Jacobian of one side of the gear
#[derive(Debug, Clone, Copy, Default)]
struct SideJacobian {
    linear: Vec2,
    angular_body: f32,
    angular_ground: f32,
    mass: f32,
    coordinate: f32,
}

#[derive(Debug, Clone)]
pub struct GearJoint {
    side1: GearSide,
    side2: GearSide,
    pub(crate) body_c: BodyHandle,
    pub(crate) body_d: BodyHandle,
    ratio: f32,
    constant: f32,
    tolerance: f32,

    impulse: f32,

    solver_a: SolverBody,
    solver_b: SolverBody,
    solver_c: SolverBody,
    solver_d: SolverBody,
    jv_ac: Vec2,
    jv_bd: Vec2,
    jw_a: f32,
    jw_b: f32,
    jw_c: f32,
    jw_d: f32,
    mass: f32,
}

impl GearJoint {
    /// `a` and `c` are body B and body A of the first joint, `b` and `d`
    /// those of the second.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        def: &GearJointDef,
        side1: GearSide,
        side2: GearSide,
        a: &Body,
        c: (BodyHandle, &Body),
        b: &Body,
        d: (BodyHandle, &Body),
    ) -> Self {
        let coordinate_a = side1.coordinate(a, c.1);
        let coordinate_b = side2.coordinate(b, d.1);

        let tolerance = match side1 {
            GearSide::Revolute { .. } => ANGULAR_SLOP,
            GearSide::Prismatic { .. } => LINEAR_SLOP,
        };

        Self {
            side1,
            side2,
            body_c: c.0,
            body_d: d.0,
            ratio: def.ratio,
            constant: coordinate_a + def.ratio * coordinate_b,
            tolerance,
            impulse: 0.0,
            solver_a: SolverBody::default(),
            solver_b: SolverBody::default(),
            solver_c: SolverBody::default(),
            solver_d: SolverBody::default(),
            jv_ac: Vec2::ZERO,
            jv_bd: Vec2::ZERO,
            jw_a: 0.0,
            jw_b: 0.0,
            jw_c: 0.0,
            jw_d: 0.0,
            mass: 0.0,
        }
    }

    #[inline]
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        debug_assert!(ratio.is_finite());
        self.ratio = ratio;
    }

    /// Ground body of the first coupled joint
    #[inline]
    pub fn body_c(&self) -> BodyHandle {
        self.body_c
    }

    /// Ground body of the second coupled joint
    #[inline]
    pub fn body_d(&self) -> BodyHandle {
        self.body_d
    }

    pub(crate) fn anchor_a(&self, a: &Body) -> Vec2 {
        a.world_point(self.side1.anchors().1)
    }

    pub(crate) fn anchor_b(&self, b: &Body) -> Vec2 {
        b.world_point(self.side2.anchors().1)
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.jv_ac * (self.impulse * inv_dt)
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse * self.jw_a
    }

    /// Jacobian of one side given the body and ground solver states.
    /// `scale` is 1 for the first side and the ratio for the second.
    fn jacobian(side: &GearSide, scale: f32, body: &SolverBody, ground: &SolverBody, data: &SolverData) -> SideJacobian {
        let pb = data.positions[body.index];
        let pg = data.positions[ground.index];

        match *side {
            GearSide::Revolute { reference_angle, .. } => SideJacobian {
                linear: Vec2::ZERO,
                angular_body: scale,
                angular_ground: scale,
                mass: scale * scale * (body.inv_i + ground.inv_i),
                coordinate: pb.a - pg.a - reference_angle,
            },
            GearSide::Prismatic { local_anchor_ground, local_anchor_body, local_axis, .. } => {
                let q_b = Rot::new(pb.a);
                let q_g = Rot::new(pg.a);

                let u = q_g * local_axis;
                let r_g = q_g * (local_anchor_ground - ground.local_center);
                let r_b = q_b * (local_anchor_body - body.local_center);

                let angular_ground = scale * r_g.cross(u);
                let angular_body = scale * r_b.cross(u);
                let mass = scale * scale * (ground.inv_mass + body.inv_mass)
                    + ground.inv_i * angular_ground * angular_ground
                    + body.inv_i * angular_body * angular_body;

                let p_g = local_anchor_ground - ground.local_center;
                let p_b = q_g.inv_rotate(r_b + (pb.c - pg.c));

                SideJacobian {
                    linear: u * scale,
                    angular_body,
                    angular_ground,
                    mass,
                    coordinate: (p_b - p_g).dot(local_axis),
                }
            }
        }
    }

    fn apply_velocity(&self, data: &mut SolverData, impulse: f32) {
        let (a, b, c, d) = (self.solver_a, self.solver_b, self.solver_c, self.solver_d);

        let va = &mut data.velocities[a.index];
        va.v += self.jv_ac * (a.inv_mass * impulse);
        va.w += a.inv_i * impulse * self.jw_a;

        let vb = &mut data.velocities[b.index];
        vb.v += self.jv_bd * (b.inv_mass * impulse);
        vb.w += b.inv_i * impulse * self.jw_b;

        let vc = &mut data.velocities[c.index];
        vc.v -= self.jv_ac * (c.inv_mass * impulse);
        vc.w -= c.inv_i * impulse * self.jw_c;

        let vd = &mut data.velocities[d.index];
        vd.v -= self.jv_bd * (d.inv_mass * impulse);
        vd.w -= d.inv_i * impulse * self.jw_d;
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        bodies: [SolverBody; 4],
        data: &mut SolverData,
    ) {
        let [a, b, c, d] = bodies;
        self.solver_a = a;
        self.solver_b = b;
        self.solver_c = c;
        self.solver_d = d;

        let j1 = Self::jacobian(&self.side1, 1.0, &a, &c, data);
        let j2 = Self::jacobian(&self.side2, self.ratio, &b, &d, data);

        self.jv_ac = j1.linear;
        self.jw_a = j1.angular_body;
        self.jw_c = j1.angular_ground;
        self.jv_bd = j2.linear;
        self.jw_b = j2.angular_body;
        self.jw_d = j2.angular_ground;

        let mass = j1.mass + j2.mass;
        self.mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };

        if data.step.warm_starting {
            self.apply_velocity(data, self.impulse);
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let va = data.velocities[self.solver_a.index];
        let vb = data.velocities[self.solver_b.index];
        let vc = data.velocities[self.solver_c.index];
        let vd = data.velocities[self.solver_d.index];

        let c_dot = self.jv_ac.dot(va.v - vc.v)
            + self.jv_bd.dot(vb.v - vd.v)
            + (self.jw_a * va.w - self.jw_c * vc.w)
            + (self.jw_b * vb.w - self.jw_d * vd.w);

        let impulse = -self.mass * c_dot;
        self.impulse += impulse;

        self.apply_velocity(data, impulse);
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (a, b, c, d) = (self.solver_a, self.solver_b, self.solver_c, self.solver_d);

        let j1 = Self::jacobian(&self.side1, 1.0, &a, &c, data);
        let j2 = Self::jacobian(&self.side2, self.ratio, &b, &d, data);

        let error = (j1.coordinate + self.ratio * j2.coordinate) - self.constant;
        let mass = j1.mass + j2.mass;
        let impulse = if mass > 0.0 { -error / mass } else { 0.0 };

        let pa = &mut data.positions[a.index];
        pa.c += j1.linear * (a.inv_mass * impulse);
        pa.a += a.inv_i * impulse * j1.angular_body;

        let pb = &mut data.positions[b.index];
        pb.c += j2.linear * (b.inv_mass * impulse);
        pb.a += b.inv_i * impulse * j2.angular_body;

        let pc = &mut data.positions[c.index];
        pc.c -= j1.linear * (c.inv_mass * impulse);
        pc.a -= c.inv_i * impulse * j1.angular_ground;

        let pd = &mut data.positions[d.index];
        pd.c -= j2.linear * (d.inv_mass * impulse);
        pd.a -= d.inv_i * impulse * j2.angular_ground;

        error.abs() < self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{BodyDef, Position, TimeStep, Velocity};
    use crate::geometry::MassData;
    use approx::assert_relative_eq;

    fn revolute_side() -> GearSide {
        GearSide::Revolute { local_anchor_ground: Vec2::ZERO, local_anchor_body: Vec2::ZERO, reference_angle: 0.0 }
    }

    fn gear(ratio: f32) -> GearJoint {
        let mut wheel = Body::new(&BodyDef::dynamic());
        wheel.set_mass_data(&MassData { mass: 1.0, center: Vec2::ZERO, inertia: 1.0 });
        let ground = Body::new(&BodyDef::default());

        GearJoint::new(
            &GearJointDef { ratio, ..Default::default() },
            revolute_side(),
            revolute_side(),
            &wheel,
            (BodyHandle::default(), &ground),
            &wheel,
            (BodyHandle::default(), &ground),
        )
    }

    fn solver_bodies() -> [SolverBody; 4] {
        [
            SolverBody { index: 0, inv_mass: 1.0, inv_i: 1.0, ..Default::default() },
            SolverBody { index: 1, inv_mass: 1.0, inv_i: 1.0, ..Default::default() },
            SolverBody { index: 2, ..Default::default() },
            SolverBody { index: 2, ..Default::default() },
        ]
    }

    #[test]
    fn test_ratio_couples_rotation() {
        let mut joint = gear(2.0);

        let mut positions = vec![Position::default(); 3];
        let mut velocities = vec![Velocity { v: Vec2::ZERO, w: 3.0 }, Velocity::default(), Velocity::default()];
        let step = TimeStep { dt: 1.0 / 60.0, inv_dt: 60.0, dt_ratio: 1.0, warm_starting: true, ..Default::default() };
        let mut data = SolverData { step, positions: &mut positions, velocities: &mut velocities };

        joint.init_velocity_constraints(solver_bodies(), &mut data);
        joint.solve_velocity_constraints(&mut data);

        // w_a + 2 w_b = 0
        let (w_a, w_b) = (data.velocities[0].w, data.velocities[1].w);
        assert_relative_eq!(w_a + 2.0 * w_b, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_position_restores_coordinate_sum() {
        let mut joint = gear(1.0);

        let mut positions = vec![Position { c: Vec2::ZERO, a: 0.3 }, Position::default(), Position::default()];
        let mut velocities = vec![Velocity::default(); 3];
        let step = TimeStep { dt: 1.0 / 60.0, inv_dt: 60.0, dt_ratio: 1.0, ..Default::default() };
        let mut data = SolverData { step, positions: &mut positions, velocities: &mut velocities };

        joint.init_velocity_constraints(solver_bodies(), &mut data);
        assert!(!joint.solve_position_constraints(&mut data));
        assert!(joint.solve_position_constraints(&mut data));
        assert_relative_eq!(data.positions[0].a + data.positions[1].a, 0.0, epsilon = 1e-5);
    }
}
