use crate::dynamics::{Body, BodyHandle, SolverBody, SolverData};
use crate::math::{Rot, Vec2};
use crate::settings::LINEAR_SLOP;

use super::apply_jacobian;

/// A wheel on a suspension: body B slides on a line fixed in body A,
/// held by a spring along that line, and rotates freely with an optional
/// motor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WheelJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Suspension axis in body A coordinates
    pub local_axis_a: Vec2,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    pub max_motor_torque: f32,
    pub motor_speed: f32,
    /// Suspension stiffness in N/m
    pub stiffness: f32,
    /// Suspension damping in N*s/m
    pub damping: f32,
}

impl Default for WheelJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyHandle::default(),
            body_b: BodyHandle::default(),
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            local_axis_a: Vec2::X,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_torque: 0.0,
            motor_speed: 0.0,
            stiffness: 0.0,
            damping: 0.0,
        }
    }
}

impl WheelJointDef {
    pub fn initialize(
        body_a: BodyHandle,
        a: &Body,
        body_b: BodyHandle,
        b: &Body,
        anchor: Vec2,
        axis: Vec2,
    ) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
            local_axis_a: a.local_vector(axis),
            ..Default::default()
        }
    }

    pub fn with_spring(mut self, stiffness: f32, damping: f32) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }

    pub fn with_limit(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_translation = lower;
        self.upper_translation = upper;
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
pub struct WheelJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,
    enable_limit: bool,
    lower_translation: f32,
    upper_translation: f32,
    enable_motor: bool,
    max_motor_torque: f32,
    motor_speed: f32,
    stiffness: f32,
    damping: f32,

    impulse: f32,
    motor_impulse: f32,
    spring_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    solver_a: SolverBody,
    solver_b: SolverBody,
    ax: Vec2,
    ay: Vec2,
    s_ax: f32,
    s_bx: f32,
    s_ay: f32,
    s_by: f32,
    mass: f32,
    motor_mass: f32,
    axial_mass: f32,
    spring_mass: f32,
    translation: f32,
    bias: f32,
    gamma: f32,
}

impl WheelJoint {
    pub(crate) fn new(def: &WheelJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a: def.local_axis_a,
            local_y_axis_a: Vec2::scalar_cross(1.0, def.local_axis_a),
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            enable_motor: def.enable_motor,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: 0.0,
            motor_impulse: 0.0,
            spring_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            solver_a: SolverBody::default(),
            solver_b: SolverBody::default(),
            ax: Vec2::ZERO,
            ay: Vec2::ZERO,
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            motor_mass: 0.0,
            axial_mass: 0.0,
            spring_mass: 0.0,
            translation: 0.0,
            bias: 0.0,
            gamma: 0.0,
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
    pub fn local_axis_a(&self) -> Vec2 {
        self.local_x_axis_a
    }

    pub fn joint_translation(&self, a: &Body, b: &Body) -> f32 {
        let d = b.world_point(self.local_anchor_b) - a.world_point(self.local_anchor_a);
        d.dot(a.world_vector(self.local_x_axis_a))
    }

    pub fn joint_linear_speed(&self, a: &Body, b: &Body) -> f32 {
        let r_a = a.xf.q * (self.local_anchor_a - a.sweep.local_center);
        let r_b = b.xf.q * (self.local_anchor_b - b.sweep.local_center);
        let d = (b.sweep.c + r_b) - (a.sweep.c + r_a);
        let axis = a.xf.q * self.local_x_axis_a;

        let (v_a, w_a) = (a.linear_velocity, a.angular_velocity);
        let (v_b, w_b) = (b.linear_velocity, b.angular_velocity);

        d.dot(Vec2::scalar_cross(w_a, axis))
            + axis.dot(v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a))
    }

    pub fn joint_angle(&self, a: &Body, b: &Body) -> f32 {
        b.sweep.a - a.sweep.a
    }

    pub fn joint_angular_speed(&self, a: &Body, b: &Body) -> f32 {
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
        self.lower_translation
    }

    #[inline]
    pub fn upper_limit(&self) -> f32 {
        self.upper_translation
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        debug_assert!(lower <= upper);
        if lower != self.lower_translation || upper != self.upper_translation {
            self.lower_translation = lower;
            self.upper_translation = upper;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
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

    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
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

    pub(crate) fn world_axes(&self, a: &Body) -> (Vec2, Vec2) {
        (a.xf.q * self.local_x_axis_a, a.xf.q * self.local_y_axis_a)
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        let axial = self.spring_impulse + self.lower_impulse - self.upper_impulse;
        (self.ay * self.impulse + self.ax * axial) * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub(crate) fn init_velocity_constraints(&mut self, a: SolverBody, b: SolverBody, data: &mut SolverData) {
        self.solver_a = a;
        self.solver_b = b;

        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

        let pa = data.positions[a.index];
        let pb = data.positions[b.index];
        let q_a = Rot::new(pa.a);
        let q_b = Rot::new(pb.a);

        let r_a = q_a * (self.local_anchor_a - a.local_center);
        let r_b = q_b * (self.local_anchor_b - b.local_center);
        let d = pb.c + r_b - pa.c - r_a;

        // Point to line
        self.ay = q_a * self.local_y_axis_a;
        self.s_ay = (d + r_a).cross(self.ay);
        self.s_by = r_b.cross(self.ay);

        self.mass = m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;
        if self.mass > 0.0 {
            self.mass = 1.0 / self.mass;
        }

        // Spring
        self.ax = q_a * self.local_x_axis_a;
        self.s_ax = (d + r_a).cross(self.ax);
        self.s_bx = r_b.cross(self.ax);

        let inv_mass = m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;
        self.axial_mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;

        if self.stiffness > 0.0 && inv_mass > 0.0 {
            let c = d.dot(self.ax);
            let h = data.step.dt;

            self.gamma = h * (self.damping + h * self.stiffness);
            if self.gamma > 0.0 {
                self.gamma = 1.0 / self.gamma;
            }
            self.bias = c * h * self.stiffness * self.gamma;

            self.spring_mass = inv_mass + self.gamma;
            if self.spring_mass > 0.0 {
                self.spring_mass = 1.0 / self.spring_mass;
            }
        } else {
            self.spring_impulse = 0.0;
        }

        if self.enable_limit {
            self.translation = self.ax.dot(d);
        } else {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        if self.enable_motor {
            self.motor_mass = i_a + i_b;
            if self.motor_mass > 0.0 {
                self.motor_mass = 1.0 / self.motor_mass;
            }
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.spring_impulse *= ratio;
            self.motor_impulse *= ratio;

            let axial = self.spring_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.ay * self.impulse + self.ax * axial;
            let l_a = self.impulse * self.s_ay + axial * self.s_ax + self.motor_impulse;
            let l_b = self.impulse * self.s_by + axial * self.s_bx + self.motor_impulse;
            apply_jacobian(data, &a, &b, p, l_a, l_b);
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn axial_speed(&self, data: &SolverData) -> f32 {
        let va = data.velocities[self.solver_a.index];
        let vb = data.velocities[self.solver_b.index];
        self.ax.dot(vb.v - va.v) + self.s_bx * vb.w - self.s_ax * va.w
    }

    fn apply_axial(&self, data: &mut SolverData, impulse: f32) {
        let (a, b) = (self.solver_a, self.solver_b);
        apply_jacobian(data, &a, &b, self.ax * impulse, impulse * self.s_ax, impulse * self.s_bx);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (a, b) = (self.solver_a, self.solver_b);

        // Spring
        {
            let c_dot = self.axial_speed(data);
            let impulse = -self.spring_mass * (c_dot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;
            self.apply_axial(data, impulse);
        }

        // Rotational motor
        {
            let c_dot = data.velocities[b.index].w - data.velocities[a.index].w - self.motor_speed;
            let impulse = -self.motor_mass * c_dot;

            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            apply_jacobian(data, &a, &b, Vec2::ZERO, impulse, impulse);
        }

        if self.enable_limit {
            // Lower limit
            {
                let c = self.translation - self.lower_translation;
                let c_dot = self.axial_speed(data);
                let impulse = -self.axial_mass * (c_dot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = self.lower_impulse - old_impulse;

                self.apply_axial(data, impulse);
            }

            // Upper limit, signs flipped so the impulse stays positive
            {
                let c = self.upper_translation - self.translation;
                let c_dot = -self.axial_speed(data);
                let impulse = -self.axial_mass * (c_dot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = self.upper_impulse - old_impulse;

                self.apply_axial(data, -impulse);
            }
        }

        // Point to line
        {
            let va = data.velocities[a.index];
            let vb = data.velocities[b.index];
            let c_dot = self.ay.dot(vb.v - va.v) + self.s_by * vb.w - self.s_ay * va.w;
            let impulse = -self.mass * c_dot;
            self.impulse += impulse;

            apply_jacobian(data, &a, &b, self.ay * impulse, impulse * self.s_ay, impulse * self.s_by);
        }
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (sa, sb) = (self.solver_a, self.solver_b);
        let mut pa = data.positions[sa.index];
        let mut pb = data.positions[sb.index];

        let mut linear_error = 0.0_f32;

        if self.enable_limit {
            let q_a = Rot::new(pa.a);
            let q_b = Rot::new(pb.a);

            let r_a = q_a * (self.local_anchor_a - sa.local_center);
            let r_b = q_b * (self.local_anchor_b - sb.local_center);
            let d = pb.c - pa.c + r_b - r_a;

            let ax = q_a * self.local_x_axis_a;
            let s_ax = (d + r_a).cross(ax);
            let s_bx = r_b.cross(ax);

            let translation = ax.dot(d);
            let c = if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                translation
            } else if translation <= self.lower_translation {
                (translation - self.lower_translation).min(0.0)
            } else if translation >= self.upper_translation {
                (translation - self.upper_translation).max(0.0)
            } else {
                0.0
            };

            if c != 0.0 {
                let inv_mass = sa.inv_mass + sb.inv_mass + sa.inv_i * s_ax * s_ax + sb.inv_i * s_bx * s_bx;
                let impulse = if inv_mass != 0.0 { -c / inv_mass } else { 0.0 };

                let p = ax * impulse;
                pa.c -= p * sa.inv_mass;
                pa.a -= sa.inv_i * impulse * s_ax;
                pb.c += p * sb.inv_mass;
                pb.a += sb.inv_i * impulse * s_bx;

                linear_error = c.abs();
            }
        }

        // Perpendicular
        {
            let q_a = Rot::new(pa.a);
            let q_b = Rot::new(pb.a);

            let r_a = q_a * (self.local_anchor_a - sa.local_center);
            let r_b = q_b * (self.local_anchor_b - sb.local_center);
            let d = pb.c - pa.c + r_b - r_a;

            let ay = q_a * self.local_y_axis_a;
            let s_ay = (d + r_a).cross(ay);
            let s_by = r_b.cross(ay);

            let c = d.dot(ay);
            let inv_mass = sa.inv_mass + sb.inv_mass + sa.inv_i * s_ay * s_ay + sb.inv_i * s_by * s_by;
            let impulse = if inv_mass != 0.0 { -c / inv_mass } else { 0.0 };

            let p = ay * impulse;
            pa.c -= p * sa.inv_mass;
            pa.a -= sa.inv_i * impulse * s_ay;
            pb.c += p * sb.inv_mass;
            pb.a += sb.inv_i * impulse * s_by;

            linear_error = linear_error.max(c.abs());
        }

        data.positions[sa.index] = pa;
        data.positions[sb.index] = pb;

        linear_error <= LINEAR_SLOP
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
    fn test_wheel_spins_freely_and_stays_on_line() {
        // Vertical suspension axis: sideways motion is removed, spin is kept
        let def = WheelJointDef { local_axis_a: Vec2::Y, ..Default::default() };
        let mut joint = WheelJoint::new(&def);

        let mut positions = vec![Position::default(); 2];
        let mut velocities = vec![Velocity::default(), Velocity { v: Vec2::new(2.0, 1.0), w: 4.0 }];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        let vb = data.velocities[1];
        assert_relative_eq!(vb.v.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(vb.v.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(vb.w, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_spring_resists_compression() {
        let def = WheelJointDef { local_axis_a: Vec2::Y, ..Default::default() }.with_spring(100.0, 1.0);
        let mut joint = WheelJoint::new(&def);

        let mut positions = vec![Position::default(), Position { c: Vec2::new(0.0, -0.2), a: 0.0 }];
        let mut velocities = vec![Velocity::default(); 2];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        assert!(data.velocities[1].v.y > 0.0);
    }

    #[test]
    fn test_motor_torque_is_bounded() {
        let def = WheelJointDef::default().with_motor(-20.0, 3.0);
        let mut joint = WheelJoint::new(&def);

        let mut positions = vec![Position::default(); 2];
        let mut velocities = vec![Velocity::default(); 2];
        let step = TimeStep { dt: 0.1, inv_dt: 10.0, dt_ratio: 1.0, ..Default::default() };
        let mut data = SolverData { step, positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        assert_relative_eq!(data.velocities[1].w, -0.3, epsilon = 1e-5);
        assert_relative_eq!(joint.motor_torque(10.0), -3.0, epsilon = 1e-4);
    }
}
