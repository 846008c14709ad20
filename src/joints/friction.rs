use crate::dynamics::{Body, BodyHandle, SolverBody, SolverData};
use crate::math::{Mat22, Rot, Vec2};

use super::apply_impulse;

/// Top-down friction: resists relative translation and rotation up to a
/// maximum force and torque.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FrictionJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Maximum friction force in N
    pub max_force: f32,
    /// Maximum friction torque in N*m
    pub max_torque: f32,
}

impl FrictionJointDef {
    pub fn initialize(body_a: BodyHandle, a: &Body, body_b: BodyHandle, b: &Body, anchor: Vec2) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
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
}

#[derive(Debug, Clone)]
pub struct FrictionJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    max_force: f32,
    max_torque: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    solver_a: SolverBody,
    solver_b: SolverBody,
    r_a: Vec2,
    r_b: Vec2,
    linear_mass: Mat22,
    angular_mass: f32,
}

impl FrictionJoint {
    pub(crate) fn new(def: &FrictionJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            max_force: def.max_force,
            max_torque: def.max_torque,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            solver_a: SolverBody::default(),
            solver_b: SolverBody::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_mass: Mat22::ZERO,
            angular_mass: 0.0,
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

    pub(crate) fn anchor_a(&self, a: &Body) -> Vec2 {
        a.world_point(self.local_anchor_a)
    }

    pub(crate) fn anchor_b(&self, b: &Body) -> Vec2 {
        b.world_point(self.local_anchor_b)
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

        let q_a = Rot::new(data.positions[a.index].a);
        let q_b = Rot::new(data.positions[b.index].a);

        self.r_a = q_a * (self.local_anchor_a - a.local_center);
        self.r_b = q_b * (self.local_anchor_b - b.local_center);

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

        // Angular friction
        {
            let c_dot = data.velocities[b.index].w - data.velocities[a.index].w;
            let impulse = -self.angular_mass * c_dot;

            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (self.angular_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.angular_impulse - old_impulse;

            apply_impulse(data, &a, self.r_a, &b, self.r_b, Vec2::ZERO, impulse);
        }

        // Linear friction
        {
            let va = data.velocities[a.index];
            let vb = data.velocities[b.index];
            let c_dot = vb.v + Vec2::scalar_cross(vb.w, self.r_b) - va.v - Vec2::scalar_cross(va.w, self.r_a);

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{Position, TimeStep, Velocity};
    use approx::assert_relative_eq;

    #[test]
    fn test_friction_is_bounded() {
        let def = FrictionJointDef { max_force: 6.0, max_torque: 1.0, ..Default::default() };
        let mut joint = FrictionJoint::new(&def);

        let mut positions = vec![Position::default(); 2];
        let mut velocities = vec![Velocity::default(), Velocity { v: Vec2::new(10.0, 0.0), w: 5.0 }];
        let step = TimeStep { dt: 0.1, inv_dt: 10.0, dt_ratio: 1.0, warm_starting: false, ..Default::default() };
        let mut data = SolverData { step, positions: &mut positions, velocities: &mut velocities };

        let a = SolverBody { index: 0, ..Default::default() };
        let b = SolverBody { index: 1, inv_mass: 1.0, inv_i: 1.0, ..Default::default() };
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        // At most max_force * dt of linear impulse and max_torque * dt of angular impulse
        assert_relative_eq!(data.velocities[1].v.x, 10.0 - 0.6, epsilon = 1e-5);
        assert_relative_eq!(data.velocities[1].w, 5.0 - 0.1, epsilon = 1e-5);
        assert_relative_eq!(joint.reaction_force(10.0).x, -6.0, epsilon = 1e-4);
        assert_relative_eq!(joint.reaction_torque(10.0), -1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_small_motion_is_stopped() {
        let def = FrictionJointDef { max_force: 100.0, max_torque: 100.0, ..Default::default() };
        let mut joint = FrictionJoint::new(&def);

        let mut positions = vec![Position::default(); 2];
        let mut velocities = vec![Velocity::default(), Velocity { v: Vec2::new(0.5, -0.5), w: 0.2 }];
        let step = TimeStep { dt: 0.1, inv_dt: 10.0, dt_ratio: 1.0, ..Default::default() };
        let mut data = SolverData { step, positions: &mut positions, velocities: &mut velocities };

        let a = SolverBody { index: 0, ..Default::default() };
        let b = SolverBody { index: 1, inv_mass: 1.0, inv_i: 1.0, ..Default::default() };
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        assert_relative_eq!(data.velocities[1].v.length(), 0.0, epsilon = 1e-5);
        assert_relative_eq!(data.velocities[1].w, 0.0, epsilon = 1e-5);
    }
}
