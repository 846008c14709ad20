use crate::dynamics::{Body, BodyHandle, SolverBody, SolverData};
use crate::math::{Mat22, Rot, Vec2};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION};

use super::apply_impulse;

/// Pins two bodies together at a shared anchor, leaving the relative
/// rotation free. An angle limit and a motor are optional.
///
/// The joint angle is positive when body B rotates counter-clockwise
/// relative to body A.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RevoluteJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Body B angle minus body A angle in the reference state, in radians
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_angle: f32,
    pub upper_angle: f32,
    pub enable_motor: bool,
    /// Desired motor speed in rad/s
    pub motor_speed: f32,
    /// Maximum motor torque in N*m
    pub max_motor_torque: f32,
}

impl RevoluteJointDef {
    /// Connects two bodies at a world anchor, using the current angles as
    /// the reference
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

    pub fn with_collide_connected(mut self, flag: bool) -> Self {
        self.collide_connected = flag;
        self
    }

    pub fn with_limit(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_angle = lower;
        self.upper_angle = upper;
        self
    }

    pub fn with_motor(mut self, speed: f32, max_torque: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RevoluteJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    reference_angle: f32,
    enable_limit: bool,
    lower_angle: f32,
    upper_angle: f32,
    enable_motor: bool,
    motor_speed: f32,
    max_motor_torque: f32,

    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    solver_a: SolverBody,
    solver_b: SolverBody,
    r_a: Vec2,
    r_b: Vec2,
    k: Mat22,
    angle: f32,
    axial_mass: f32,
}

impl RevoluteJoint {
    pub(crate) fn new(def: &RevoluteJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_angle: def.lower_angle,
            upper_angle: def.upper_angle,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_torque: def.max_motor_torque,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            solver_a: SolverBody::default(),
            solver_b: SolverBody::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k: Mat22::ZERO,
            angle: 0.0,
            axial_mass: 0.0,
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

    /// Current joint angle in radians
    pub fn joint_angle(&self, a: &Body, b: &Body) -> f32 {
        b.sweep.a - a.sweep.a - self.reference_angle
    }

    /// Current joint angular speed in rad/s
    pub fn joint_speed(&self, a: &Body, b: &Body) -> f32 {
        b.angular_velocity - a.angular_velocity
    }

    #[inline]
    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn enable_limit(&mut self, flag: bool) {
        if flag != self.enable_limit {
            self.enable_limit = flag;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    #[inline]
    pub fn lower_limit(&self) -> f32 {
        self.lower_angle
    }

    #[inline]
    pub fn upper_limit(&self) -> f32 {
        self.upper_angle
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        debug_assert!(lower <= upper);
        if lower != self.lower_angle || upper != self.upper_angle {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
            self.lower_angle = lower;
            self.upper_angle = upper;
        }
    }

    #[inline]
    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
    }

    #[inline]
    pub fn motor_speed(&self) -> f32 {
        self.motor_speed
    }

    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    #[inline]
    pub fn max_motor_torque(&self) -> f32 {
        self.max_motor_torque
    }

    pub fn set_max_motor_torque(&mut self, torque: f32) {
        self.max_motor_torque = torque;
    }

    /// Motor torque applied over the last step, in N*m
    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub(crate) fn anchor_a(&self, a: &Body) -> Vec2 {
        a.world_point(self.local_anchor_a)
    }

    pub(crate) fn anchor_b(&self, b: &Body) -> Vec2 {
        b.world_point(self.local_anchor_b)
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.impulse * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * (self.motor_impulse + self.lower_impulse - self.upper_impulse)
    }

    pub(crate) fn init_velocity_constraints(&mut self, a: SolverBody, b: SolverBody, data: &mut SolverData) {
        self.solver_a = a;
        self.solver_b = b;

        let a_a = data.positions[a.index].a;
        let a_b = data.positions[b.index].a;

        self.r_a = Rot::new(a_a) * (self.local_anchor_a - a.local_center);
        self.r_b = Rot::new(a_b) * (self.local_anchor_b - b.local_center);

        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);
        let (r_a, r_b) = (self.r_a, self.r_b);

        let k11 = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        let k12 = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        let k22 = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
        self.k = Mat22::new(k11, k12, k12, k22);

        self.axial_mass = i_a + i_b;
        let fixed_rotation = self.axial_mass <= 0.0;
        if !fixed_rotation {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        self.angle = a_b - a_a - self.reference_angle;
        if !self.enable_limit || fixed_rotation {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            apply_impulse(data, &a, r_a, &b, r_b, self.impulse, axial_impulse);
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (a, b) = (self.solver_a, self.solver_b);
        let fixed_rotation = a.inv_i + b.inv_i == 0.0;
        let relative_w = |data: &SolverData| data.velocities[b.index].w - data.velocities[a.index].w;

        if self.enable_motor && !fixed_rotation {
            let c_dot = relative_w(data) - self.motor_speed;
            let impulse = -self.axial_mass * c_dot;
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            apply_impulse(data, &a, self.r_a, &b, self.r_b, Vec2::ZERO, impulse);
        }

        if self.enable_limit && !fixed_rotation {
            // Lower limit
            {
                let c = self.angle - self.lower_angle;
                let c_dot = relative_w(data);
                let impulse = -self.axial_mass * (c_dot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = self.lower_impulse - old_impulse;

                apply_impulse(data, &a, self.r_a, &b, self.r_b, Vec2::ZERO, impulse);
            }

            // Upper limit, with signs flipped so the impulse stays positive
            {
                let c = self.upper_angle - self.angle;
                let c_dot = -relative_w(data);
                let impulse = -self.axial_mass * (c_dot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = self.upper_impulse - old_impulse;

                apply_impulse(data, &a, self.r_a, &b, self.r_b, Vec2::ZERO, -impulse);
            }
        }

        // Point to point
        {
            let va = data.velocities[a.index];
            let vb = data.velocities[b.index];
            let c_dot = vb.v + Vec2::scalar_cross(vb.w, self.r_b) - va.v - Vec2::scalar_cross(va.w, self.r_a);
            let impulse = self.k.solve(-c_dot);

            self.impulse += impulse;
            apply_impulse(data, &a, self.r_a, &b, self.r_b, impulse, 0.0);
        }
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (sa, sb) = (self.solver_a, self.solver_b);
        let mut pa = data.positions[sa.index];
        let mut pb = data.positions[sb.index];

        let mut angular_error = 0.0;
        let fixed_rotation = sa.inv_i + sb.inv_i == 0.0;

        if self.enable_limit && !fixed_rotation {
            let angle = pb.a - pa.a - self.reference_angle;

            let c = if (self.upper_angle - self.lower_angle).abs() < 2.0 * ANGULAR_SLOP {
                (angle - self.lower_angle).clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION)
            } else if angle <= self.lower_angle {
                (angle - self.lower_angle + ANGULAR_SLOP).clamp(-MAX_ANGULAR_CORRECTION, 0.0)
            } else if angle >= self.upper_angle {
                (angle - self.upper_angle - ANGULAR_SLOP).clamp(0.0, MAX_ANGULAR_CORRECTION)
            } else {
                0.0
            };

            let limit_impulse = -self.axial_mass * c;
            pa.a -= sa.inv_i * limit_impulse;
            pb.a += sb.inv_i * limit_impulse;
            angular_error = c.abs();
        }

        // Point to point
        let position_error = {
            let r_a = Rot::new(pa.a) * (self.local_anchor_a - sa.local_center);
            let r_b = Rot::new(pb.a) * (self.local_anchor_b - sb.local_center);

            let c = pb.c + r_b - pa.c - r_a;

            let (m_a, m_b, i_a, i_b) = (sa.inv_mass, sb.inv_mass, sa.inv_i, sb.inv_i);
            let k11 = m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y;
            let k12 = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
            let k22 = m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x;
            let impulse = -Mat22::new(k11, k12, k12, k22).solve(c);

            pa.c -= impulse * m_a;
            pa.a -= i_a * r_a.cross(impulse);
            pb.c += impulse * m_b;
            pb.a += i_b * r_b.cross(impulse);

            c.length()
        };

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
    use std::f32::consts::FRAC_PI_4;

    fn step() -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
        }
    }

    fn pair() -> (SolverBody, SolverBody) {
        (
            SolverBody { index: 0, ..Default::default() },
            SolverBody { index: 1, inv_mass: 1.0, inv_i: 2.0, ..Default::default() },
        )
    }

    #[test]
    fn test_anchor_velocity_is_matched() {
        // B hangs one meter below a static pivot at the origin
        let def = RevoluteJointDef { local_anchor_b: Vec2::new(0.0, 1.0), ..Default::default() };
        let mut joint = RevoluteJoint::new(&def);

        let mut positions = vec![Position::default(), Position { c: Vec2::new(0.0, -1.0), a: 0.0 }];
        let mut velocities = vec![Velocity::default(), Velocity { v: Vec2::new(0.0, -2.0), w: 0.0 }];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        let vb = data.velocities[1];
        let anchor_velocity = vb.v + Vec2::scalar_cross(vb.w, Vec2::new(0.0, 1.0));
        assert_relative_eq!(anchor_velocity.length(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_motor_drives_relative_speed() {
        let def = RevoluteJointDef::default().with_motor(3.0, 1000.0);
        let mut joint = RevoluteJoint::new(&def);

        let mut positions = vec![Position::default(); 2];
        let mut velocities = vec![Velocity::default(); 2];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        assert_relative_eq!(data.velocities[1].w, 3.0, epsilon = 1e-5);
        assert!(joint.motor_torque(60.0) > 0.0);
    }

    #[test]
    fn test_limit_corrects_position() {
        let def = RevoluteJointDef::default().with_limit(-FRAC_PI_4, FRAC_PI_4);
        let mut joint = RevoluteJoint::new(&def);

        let mut positions = vec![Position::default(), Position { c: Vec2::ZERO, a: 1.2 }];
        let mut velocities = vec![Velocity::default(); 2];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        let mut solved = false;
        for _ in 0..20 {
            if joint.solve_position_constraints(&mut data) {
                solved = true;
                break;
            }
        }

        assert!(solved);
        assert!(data.positions[1].a <= FRAC_PI_4 + ANGULAR_SLOP);
    }

    #[test]
    fn test_set_limits_resets_impulses() {
        let mut joint = RevoluteJoint::new(&RevoluteJointDef::default().with_limit(-1.0, 1.0));
        joint.lower_impulse = 2.0;
        joint.set_limits(-0.5, 0.5);
        assert_eq!(joint.lower_impulse, 0.0);
        assert_eq!(joint.lower_limit(), -0.5);
    }
}
