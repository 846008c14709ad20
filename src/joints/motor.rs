use crate::dynamics::{Body, BodyHandle, SolverBody, SolverData};
use crate::math::{Mat22, Rot, Vec2};

use super::apply_impulse;

/// Drives body B toward a position and angle relative to body A, using
/// bounded force and torque. Handy for animated platforms.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    /// Target position of body B in body A coordinates
    pub linear_offset: Vec2,
    /// Target angle of body B minus the angle of body A, in radians
    pub angular_offset: f32,
    pub max_force: f32,
    pub max_torque: f32,
    /// Position correction factor in [0, 1]
    pub correction_factor: f32,
}

impl Default for MotorJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyHandle::default(),
            body_b: BodyHandle::default(),
            collide_connected: false,
            linear_offset: Vec2::ZERO,
            angular_offset: 0.0,
            max_force: 1.0,
            max_torque: 1.0,
            correction_factor: 0.3,
        }
    }
}

impl MotorJointDef {
    /// Uses the current relative pose of the bodies as the target
    pub fn initialize(body_a: BodyHandle, a: &Body, body_b: BodyHandle, b: &Body) -> Self {
        Self {
            body_a,
            body_b,
            linear_offset: a.local_point(b.position()),
            angular_offset: b.angle() - a.angle(),
            ..Default::default()
        }
    }

    pub fn with_max_force(mut self, force: f32) -> Self {
        self.max_force = force;
        self
    }

    pub fn with_max_torque(mut self, torque: f32) -> Self {
        self.max_torque = torque;
        self
    }

    pub fn with_correction_factor(mut self, factor: f32) -> Self {
        self.correction_factor = factor;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MotorJoint {
    linear_offset: Vec2,
    angular_offset: f32,
    max_force: f32,
    max_torque: f32,
    correction_factor: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    solver_a: SolverBody,
    solver_b: SolverBody,
    r_a: Vec2,
    r_b: Vec2,
    linear_error: Vec2,
    angular_error: f32,
    linear_mass: Mat22,
    angular_mass: f32,
}

impl MotorJoint {
    pub(crate) fn new(def: &MotorJointDef) -> Self {
        Self {
            linear_offset: def.linear_offset,
            angular_offset: def.angular_offset,
            max_force: def.max_force,
            max_torque: def.max_torque,
            correction_factor: def.correction_factor,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            solver_a: SolverBody::default(),
            solver_b: SolverBody::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_error: Vec2::ZERO,
            angular_error: 0.0,
            linear_mass: Mat22::ZERO,
            angular_mass: 0.0,
        }
    }

    #[inline]
    pub fn linear_offset(&self) -> Vec2 {
        self.linear_offset
    }

    pub fn set_linear_offset(&mut self, offset: Vec2) {
        self.linear_offset = offset;
    }

    #[inline]
    pub fn angular_offset(&self) -> f32 {
        self.angular_offset
    }

    pub fn set_angular_offset(&mut self, offset: f32) {
        self.angular_offset = offset;
    }

    #[inline]
    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn set_max_force(&mut self, force: f32) {
        debug_assert!(force.is_finite() && force >= 0.0);
        self.max_force = force;
    }

    #[inline]
    pub fn max_torque(&self) -> f32 {
        self.max_torque
    }

    pub fn set_max_torque(&mut self, torque: f32) {
        debug_assert!(torque.is_finite() && torque >= 0.0);
        self.max_torque = torque;
    }

    #[inline]
    pub fn correction_factor(&self) -> f32 {
        self.correction_factor
    }

    pub fn set_correction_factor(&mut self, factor: f32) {
        debug_assert!((0.0..=1.0).contains(&factor));
        self.correction_factor = factor;
    }

    pub(crate) fn anchor_a(&self, a: &Body) -> Vec2 {
        a.position()
    }

    pub(crate) fn anchor_b(&self, b: &Body) -> Vec2 {
        b.position()
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.linear_impulse * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.angular_impulse
    }

    pub(crate) fn init_velocity_constraints(&mut self, a: SolverBody, b: SolverBody, data: &mut SolverData) {
        self.solver_a = a;
        self.solver_b = b;

        let pa = data.positions[a.index];
        let pb = data.positions[b.index];

        self.r_a = Rot::new(pa.a) * (self.linear_offset - a.local_center);
        self.r_b = Rot::new(pb.a) * -b.local_center;

        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);
        let (r_a, r_b) = (self.r_a, self.r_b);

        let k11 = m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y;
        let k12 = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
        let k22 = m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x;
        self.linear_mass = Mat22::new(k11, k12, k12, k22).inverse();

        self.angular_mass = i_a + i_b;
        if self.angular_mass > 0.0 {
            self.angular_mass = 1.0 / self.angular_mass;
        }

        self.linear_error = pb.c + r_b - pa.c - r_a;
        self.angular_error = pb.a - pa.a - self.angular_offset;

        if data.step.warm_starting {
            self.linear_impulse *= data.step.dt_ratio;
            self.angular_impulse *= data.step.dt_ratio;
            apply_impulse(data, &a, r_a, &b, r_b, self.linear_impulse, self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (a, b) = (self.solver_a, self.solver_b);
        let h = data.step.dt;
        let inv_h = data.step.inv_dt;

        {
            let c_dot = data.velocities[b.index].w - data.velocities[a.index].w
                + inv_h * self.correction_factor * self.angular_error;
            let impulse = -self.angular_mass * c_dot;

            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (self.angular_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.angular_impulse - old_impulse;

            apply_impulse(data, &a, self.r_a, &b, self.r_b, Vec2::ZERO, impulse);
        }

        {
            let va = data.velocities[a.index];
            let vb = data.velocities[b.index];
            let c_dot = vb.v + Vec2::scalar_cross(vb.w, self.r_b)
                - va.v
                - Vec2::scalar_cross(va.w, self.r_a)
                + self.linear_error * (inv_h * self.correction_factor);

            let impulse = -(self.linear_mass * c_dot);
            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = h * self.max_force;
            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse = self.linear_impulse.normalize() * max_impulse;
            }

            let impulse = self.linear_impulse - old_impulse;
            apply_impulse(data, &a, self.r_a, &b, self.r_b, impulse, 0.0);
        }
    }

    pub(crate) fn solve_position_constraints(&mut self, _data: &mut SolverData) -> bool {
        true
    }
}
