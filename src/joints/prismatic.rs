use crate::dynamics::{Body, BodyHandle, SolverBody, SolverData};
use crate::math::{Mat22, Mat33, Rot, Vec2, Vec3};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};

use super::apply_jacobian;

/// Lets body B slide along an axis fixed in body A, with no relative
/// rotation. A translation limit and a linear motor are optional.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PrismaticJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Translation axis in body A coordinates
    pub local_axis_a: Vec2,
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    /// Maximum motor force in N
    pub max_motor_force: f32,
    /// Desired motor speed in m/s
    pub motor_speed: f32,
}

impl Default for PrismaticJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyHandle::default(),
            body_b: BodyHandle::default(),
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            local_axis_a: Vec2::X,
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
        }
    }
}

impl PrismaticJointDef {
    /// Connects two bodies at a world anchor, sliding along a world axis
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
        self.lower_translation = lower;
        self.upper_translation = upper;
        self
    }

    pub fn with_motor(mut self, speed: f32, max_force: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_force = max_force;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PrismaticJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,
    reference_angle: f32,
    enable_limit: bool,
    lower_translation: f32,
    upper_translation: f32,
    enable_motor: bool,
    max_motor_force: f32,
    motor_speed: f32,

    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    solver_a: SolverBody,
    solver_b: SolverBody,
    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    k: Mat22,
    translation: f32,
    axial_mass: f32,
}

impl PrismaticJoint {
    pub(crate) fn new(def: &PrismaticJointDef) -> Self {
        debug_assert!(def.lower_translation <= def.upper_translation);
        let local_x_axis_a = def.local_axis_a.normalize();

        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: Vec2::scalar_cross(1.0, local_x_axis_a),
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            enable_motor: def.enable_motor,
            max_motor_force: def.max_motor_force,
            motor_speed: def.motor_speed,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            solver_a: SolverBody::default(),
            solver_b: SolverBody::default(),
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: Mat22::ZERO,
            translation: 0.0,
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
    pub fn local_axis_a(&self) -> Vec2 {
        self.local_x_axis_a
    }

    #[inline]
    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// Distance of anchor B from anchor A along the axis
    pub fn joint_translation(&self, a: &Body, b: &Body) -> f32 {
        let d = b.world_point(self.local_anchor_b) - a.world_point(self.local_anchor_a);
        d.dot(a.world_vector(self.local_x_axis_a))
    }

    /// Rate of change of the joint translation
    pub fn joint_speed(&self, a: &Body, b: &Body) -> f32 {
        let r_a = a.xf.q * (self.local_anchor_a - a.sweep.local_center);
        let r_b = b.xf.q * (self.local_anchor_b - b.sweep.local_center);
        let d = (b.sweep.c + r_b) - (a.sweep.c + r_a);
        let axis = a.xf.q * self.local_x_axis_a;

        let (v_a, w_a) = (a.linear_velocity, a.angular_velocity);
        let (v_b, w_b) = (b.linear_velocity, b.angular_velocity);

        d.dot(Vec2::scalar_cross(w_a, axis))
            + axis.dot(v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a))
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
    pub fn max_motor_force(&self) -> f32 {
        self.max_motor_force
    }

    pub fn set_max_motor_force(&mut self, force: f32) {
        self.max_motor_force = force;
    }

    /// Motor force applied over the last step, in N
    pub fn motor_force(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub(crate) fn anchor_a(&self, a: &Body) -> Vec2 {
        a.world_point(self.local_anchor_a)
    }

    pub(crate) fn anchor_b(&self, b: &Body) -> Vec2 {
        b.world_point(self.local_anchor_b)
    }

    /// World axis and perpendicular used by debug drawing
    pub(crate) fn world_axes(&self, a: &Body) -> (Vec2, Vec2) {
        (a.xf.q * self.local_x_axis_a, a.xf.q * self.local_y_axis_a)
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        let axial = self.motor_impulse + self.lower_impulse - self.upper_impulse;
        (self.perp * self.impulse.x + self.axis * axial) * inv_dt
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.y
    }

    pub(crate) fn init_velocity_constraints(&mut self, a: SolverBody, b: SolverBody, data: &mut SolverData) {
        self.solver_a = a;
        self.solver_b = b;

        let pa = data.positions[a.index];
        let pb = data.positions[b.index];
        let q_a = Rot::new(pa.a);
        let q_b = Rot::new(pb.a);

        let r_a = q_a * (self.local_anchor_a - a.local_center);
        let r_b = q_b * (self.local_anchor_b - b.local_center);
        let d = (pb.c - pa.c) + r_b - r_a;

        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

        // Motor Jacobian and effective mass
        self.axis = q_a * self.local_x_axis_a;
        self.a1 = (d + r_a).cross(self.axis);
        self.a2 = r_b.cross(self.axis);

        self.axial_mass = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        if self.axial_mass > 0.0 {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        // Perpendicular and angular constraint
        self.perp = q_a * self.local_y_axis_a;
        self.s1 = (d + r_a).cross(self.perp);
        self.s2 = r_b.cross(self.perp);

        let k11 = m_a + m_b + i_a * self.s1 * self.s1 + i_b * self.s2 * self.s2;
        let k12 = i_a * self.s1 + i_b * self.s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            // Fixed rotation
            k22 = 1.0;
        }
        self.k = Mat22::new(k11, k12, k12, k22);

        if self.enable_limit {
            self.translation = self.axis.dot(d);
        } else {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.perp * self.impulse.x + self.axis * axial;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial * self.a2;
            apply_jacobian(data, &a, &b, p, l_a, l_b);
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn axial_speed(&self, data: &SolverData) -> f32 {
        let va = data.velocities[self.solver_a.index];
        let vb = data.velocities[self.solver_b.index];
        self.axis.dot(vb.v - va.v) + self.a2 * vb.w - self.a1 * va.w
    }

    fn apply_axial(&self, data: &mut SolverData, impulse: f32) {
        let (a, b) = (self.solver_a, self.solver_b);
        apply_jacobian(data, &a, &b, self.axis * impulse, impulse * self.a1, impulse * self.a2);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (a, b) = (self.solver_a, self.solver_b);

        if self.enable_motor {
            let c_dot = self.axial_speed(data);
            let impulse = self.axial_mass * (self.motor_speed - c_dot);
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_force;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            self.apply_axial(data, impulse);
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

        // Perpendicular and angular constraint as a 2x2 block
        {
            let va = data.velocities[a.index];
            let vb = data.velocities[b.index];
            let c_dot = Vec2::new(self.perp.dot(vb.v - va.v) + self.s2 * vb.w - self.s1 * va.w, vb.w - va.w);

            let df = self.k.solve(-c_dot);
            self.impulse += df;

            let p = self.perp * df.x;
            let l_a = df.x * self.s1 + df.y;
            let l_b = df.x * self.s2 + df.y;
            apply_jacobian(data, &a, &b, p, l_a, l_b);
        }
    }

    /// The limit is re-evaluated from positions here since the velocity
    /// solve may push past it while reporting it inactive.
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (sa, sb) = (self.solver_a, self.solver_b);
        let mut pa = data.positions[sa.index];
        let mut pb = data.positions[sb.index];

        let q_a = Rot::new(pa.a);
        let q_b = Rot::new(pb.a);
        let (m_a, m_b, i_a, i_b) = (sa.inv_mass, sb.inv_mass, sa.inv_i, sb.inv_i);

        let r_a = q_a * (self.local_anchor_a - sa.local_center);
        let r_b = q_b * (self.local_anchor_b - sb.local_center);
        let d = pb.c + r_b - pa.c - r_a;

        let axis = q_a * self.local_x_axis_a;
        let a1 = (d + r_a).cross(axis);
        let a2 = r_b.cross(axis);
        let perp = q_a * self.local_y_axis_a;

        let s1 = (d + r_a).cross(perp);
        let s2 = r_b.cross(perp);

        let c1 = Vec2::new(perp.dot(d), pb.a - pa.a - self.reference_angle);

        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.enable_limit {
            let translation = axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                c2 = translation;
                linear_error = linear_error.max(translation.abs());
                active = true;
            } else if translation <= self.lower_translation {
                c2 = (translation - self.lower_translation).min(0.0);
                linear_error = linear_error.max(self.lower_translation - translation);
                active = true;
            } else if translation >= self.upper_translation {
                c2 = (translation - self.upper_translation).max(0.0);
                linear_error = linear_error.max(translation - self.upper_translation);
                active = true;
            }
        }

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            k22 = 1.0;
        }

        let impulse = if active {
            let k13 = i_a * s1 * a1 + i_b * s2 * a2;
            let k23 = i_a * a1 + i_b * a2;
            let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;

            let k = Mat33::from_cols(
                Vec3::new(k11, k12, k13),
                Vec3::new(k12, k22, k23),
                Vec3::new(k13, k23, k33),
            );
            k.solve33(-Vec3::new(c1.x, c1.y, c2))
        } else {
            let impulse = Mat22::new(k11, k12, k12, k22).solve(-c1);
            Vec3::new(impulse.x, impulse.y, 0.0)
        };

        let p = perp * impulse.x + axis * impulse.z;
        let l_a = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l_b = impulse.x * s2 + impulse.y + impulse.z * a2;

        pa.c -= p * m_a;
        pa.a -= i_a * l_a;
        pb.c += p * m_b;
        pb.a += i_b * l_b;

        data.positions[sa.index] = pa;
        data.positions[sb.index] = pb;

        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{Position, TimeStep, Velocity};
    use approx::assert_relative_eq;

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
            SolverBody { index: 1, inv_mass: 1.0, inv_i: 1.0, ..Default::default() },
        )
    }

    #[test]
    fn test_motion_is_restricted_to_axis() {
        let mut joint = PrismaticJoint::new(&PrismaticJointDef::default());

        let mut positions = vec![Position::default(); 2];
        let mut velocities = vec![Velocity::default(), Velocity { v: Vec2::new(3.0, 4.0), w: 1.0 }];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        let vb = data.velocities[1];
        assert_relative_eq!(vb.v.x, 3.0, epsilon = 1e-5);
        assert_relative_eq!(vb.v.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(vb.w, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_motor_force_is_bounded() {
        let def = PrismaticJointDef::default().with_motor(10.0, 60.0);
        let mut joint = PrismaticJoint::new(&def);

        let mut positions = vec![Position::default(); 2];
        let mut velocities = vec![Velocity::default(); 2];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        // 60 N for 1/60 s on a unit mass
        assert_relative_eq!(data.velocities[1].v.x, 1.0, epsilon = 1e-4);
        assert_relative_eq!(joint.motor_force(60.0), 60.0, epsilon = 1e-3);
    }

    #[test]
    fn test_upper_limit_pushes_back() {
        let def = PrismaticJointDef::default().with_limit(-1.0, 1.0);
        let mut joint = PrismaticJoint::new(&def);

        let mut positions = vec![Position::default(), Position { c: Vec2::new(1.5, 0.0), a: 0.0 }];
        let mut velocities = vec![Velocity::default(); 2];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let (a, b) = pair();
        joint.init_velocity_constraints(a, b, &mut data);
        let mut solved = false;
        for _ in 0..10 {
            if joint.solve_position_constraints(&mut data) {
                solved = true;
                break;
            }
        }

        assert!(solved);
        assert!(data.positions[1].c.x <= 1.0 + LINEAR_SLOP);
    }

    #[test]
    fn test_axis_is_normalized() {
        let def = PrismaticJointDef { local_axis_a: Vec2::new(0.0, 5.0), ..Default::default() };
        let joint = PrismaticJoint::new(&def);
        assert_relative_eq!(joint.local_axis_a().y, 1.0);
        assert_relative_eq!(joint.local_y_axis_a.x, -1.0);
    }
}
