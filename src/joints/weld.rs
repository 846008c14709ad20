use crate::dynamics::{Body, BodyHandle, SolverBody, SolverData};
use crate::math::{Mat33, Rot, Vec2, Vec3};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};

use super::apply_impulse;

/// Glues two bodies together. With a positive stiffness the angular part
/// becomes a soft spring.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WeldJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f32,
    /// Rotational stiffness in N*m; zero makes the weld rigid
    pub stiffness: f32,
    /// Rotational damping in N*m*s
    pub damping: f32,
}

impl WeldJointDef {
    pub fn initialize(body_a: BodyHandle, a: &Body, body_b: BodyHandle, b: &Body, anchor: Vec2) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
            reference_angle: b.angle() - a.angle(),
            ..Default::default()
        }
    }

    pub fn with_spring(mut self, stiffness: f32, damping: f32) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }

    pub fn with_collide_connected(mut self, flag: bool) -> Self {
        self.collide_connected = flag;
        self
    }
}

#[derive(Debug, Clone)]
pub struct WeldJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    reference_angle: f32,
    stiffness: f32,
    damping: f32,

    impulse: Vec3,

    solver_a: SolverBody,
    solver_b: SolverBody,
    r_a: Vec2,
    r_b: Vec2,
    mass: Mat33,
    gamma: f32,
    bias: f32,
}

/// Effective mass of the point and angle constraints for anchors `r_a` and `r_b`
fn effective_mass(a: &SolverBody, b: &SolverBody, r_a: Vec2, r_b: Vec2) -> Mat33 {
    let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

    let k11 = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
    let k12 = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
    let k13 = -r_a.y * i_a - r_b.y * i_b;
    let k22 = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
    let k23 = r_a.x * i_a + r_b.x * i_b;
    let k33 = i_a + i_b;

    Mat33::from_cols(Vec3::new(k11, k12, k13), Vec3::new(k12, k22, k23), Vec3::new(k13, k23, k33))
}

impl WeldJoint {
    pub(crate) fn new(def: &WeldJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: Vec3::ZERO,
            solver_a: SolverBody::default(),
            solver_b: SolverBody::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat33::ZERO,
            gamma: 0.0,
            bias: 0.0,
        }
    }

    #[inline]
    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    #[inline]
    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    #[inline]
    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    #[inline]
    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = stiffness;
    }

    #[inline]
    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping;
    }

    pub(crate) fn anchor_a(&self, a: &Body) -> Vec2 {
        a.world_point(self.local_anchor_a)
    }

    pub(crate) fn anchor_b(&self, b: &Body) -> Vec2 {
        b.world_point(self.local_anchor_b)
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.impulse.xy() * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.z
    }

    pub(crate) fn init_velocity_constraints(&mut self, a: SolverBody, b: SolverBody, data: &mut SolverData) {
        self.solver_a = a;
        self.solver_b = b;

        let a_a = data.positions[a.index].a;
        let a_b = data.positions[b.index].a;

        self.r_a = Rot::new(a_a) * (self.local_anchor_a - a.local_center);
        self.r_b = Rot::new(a_b) * (self.local_anchor_b - b.local_center);

        let k = effective_mass(&a, &b, self.r_a, self.r_b);

        if self.stiffness > 0.0 {
            self.mass = k.inverse22();

            let c = a_b - a_a - self.reference_angle;
            let h = data.step.dt;

            self.gamma = h * (self.damping + h * self.stiffness);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * self.stiffness * self.gamma;

            let inv_m = a.inv_i + b.inv_i + self.gamma;
            self.mass.ez.z = if inv_m != 0.0 { 1.0 / inv_m } else { 0.0 };
        } else if k.ez.z == 0.0 {
            self.mass = k.inverse22();
            self.gamma = 0.0;
            self.bias = 0.0;
        } else {
            self.mass = k.sym_inverse33();
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            self.impulse = self.impulse * data.step.dt_ratio;
            apply_impulse(data, &a, self.r_a, &b, self.r_b, self.impulse.xy(), self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (a, b) = (self.solver_a, self.solver_b);

        let point_speed = |data: &SolverData, r_a: Vec2, r_b: Vec2| {
            let va = data.velocities[a.index];
            let vb = data.velocities[b.index];
            vb.v + Vec2::scalar_cross(vb.w, r_b) - va.v - Vec2::scalar_cross(va.w, r_a)
        };

        if self.stiffness > 0.0 {
            let c_dot2 = data.velocities[b.index].w - data.velocities[a.index].w;
            let impulse2 = -self.mass.ez.z * (c_dot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;
            apply_impulse(data, &a, self.r_a, &b, self.r_b, Vec2::ZERO, impulse2);

            let c_dot1 = point_speed(data, self.r_a, self.r_b);
            let impulse1 = -self.mass.mul22(c_dot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;
            apply_impulse(data, &a, self.r_a, &b, self.r_b, impulse1, 0.0);
        } else {
            let c_dot1 = point_speed(data, self.r_a, self.r_b);
            let c_dot2 = data.velocities[b.index].w - data.velocities[a.index].w;

            let impulse = -(self.mass * Vec3::new(c_dot1.x, c_dot1.y, c_dot2));
            self.impulse += impulse;
            apply_impulse(data, &a, self.r_a, &b, self.r_b, impulse.xy(), impulse.z);
        }
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (sa, sb) = (self.solver_a, self.solver_b);
        let mut pa = data.positions[sa.index];
        let mut pb = data.positions[sb.index];

        let r_a = Rot::new(pa.a) * (self.local_anchor_a - sa.local_center);
        let r_b = Rot::new(pb.a) * (self.local_anchor_b - sb.local_center);

        let k = effective_mass(&sa, &sb, r_a, r_b);
        let c1 = pb.c + r_b - pa.c - r_a;
        let position_error = c1.length();

        let (impulse, angular_error) = if self.stiffness > 0.0 {
            let p = -k.solve22(c1);
            (Vec3::new(p.x, p.y, 0.0), 0.0)
        } else {
            let c2 = pb.a - pa.a - self.reference_angle;
            let impulse = if k.ez.z > 0.0 {
                -k.solve33(Vec3::new(c1.x, c1.y, c2))
            } else {
                let p = -k.solve22(c1);
                Vec3::new(p.x, p.y, 0.0)
            };
            (impulse, c2.abs())
        };

        let p = impulse.xy();
        pa.c -= p * sa.inv_mass;
        pa.a -= sa.inv_i * (r_a.cross(p) + impulse.z);
        pb.c += p * sb.inv_mass;
        pb.a += sb.inv_i * (r_b.cross(p) + impulse.z);

        data.positions[sa.index] = pa;
        data.positions[sb.index] = pb;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{Position, TimeStep, Velocity};
    use approx::assert_relative_eq;

    fn step() -> TimeStep {
        TimeStep { dt: 1.0 / 60.0, inv_dt: 60.0, dt_ratio: 1.0, warm_starting: true, ..Default::default() }
    }

    fn pair() -> (SolverBody, SolverBody) {
        (
            SolverBody { index: 0, ..Default::default() },
            SolverBody { index: 1, inv_mass: 1.0, inv_i: 1.0, ..Default::default() },
        )
    }

    #[test]
    fn test_rigid_weld_stops_relative_motion() {
        let def = WeldJointDef { local_anchor_b: Vec2::new(-1.0, 0.0), ..Default::default() };
        let mut joint = WeldJoint::new(&def);

        let mut positions = vec![Position::default(), Position { c: Vec2::new(1.0, 0.0), a: 0.0 }];
        let mut velocities = vec![Velocity::default(), Velocity { v: Vec2::new(0.5, -1.0), w: 2.0 }];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        let vb = data.velocities[1];
        assert_relative_eq!(vb.v.length(), 0.0, epsilon = 1e-4);
        assert_relative_eq!(vb.w, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_soft_weld_lets_angle_lag() {
        let def = WeldJointDef::default().with_spring(10.0, 0.1);
        let mut joint = WeldJoint::new(&def);

        let mut positions = vec![Position::default(); 2];
        let mut velocities = vec![Velocity::default(), Velocity { v: Vec2::ZERO, w: 5.0 }];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        let w = data.velocities[1].w;
        assert!(w > 0.0 && w < 5.0);
    }

    #[test]
    fn test_position_error_converges() {
        let mut joint = WeldJoint::new(&WeldJointDef::default());

        let mut positions = vec![Position::default(), Position { c: Vec2::new(0.1, -0.05), a: 0.1 }];
        let mut velocities = vec![Velocity::default(); 2];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        let solved = (0..10).any(|_| joint.solve_position_constraints(&mut data));

        assert!(solved);
        assert_relative_eq!(data.positions[1].a, 0.0, epsilon = ANGULAR_SLOP);
    }
}
