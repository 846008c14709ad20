use crate::dynamics::{Body, BodyHandle, SolverBody, SolverData};
use crate::math::{Rot, Vec2};
use crate::settings::LINEAR_SLOP;

/// Ropes below this length lose their direction and stop pulling
const MIN_PULLEY_LENGTH: f32 = 10.0 * LINEAR_SLOP;

/// Connects two bodies to two fixed ground points so that
/// `length_a + ratio * length_b` stays constant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PulleyJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    /// World point the rope of body A hangs from
    pub ground_anchor_a: Vec2,
    /// World point the rope of body B hangs from
    pub ground_anchor_b: Vec2,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length_a: f32,
    pub length_b: f32,
    /// Block-and-tackle ratio
    pub ratio: f32,
}

impl Default for PulleyJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyHandle::default(),
            body_b: BodyHandle::default(),
            collide_connected: true,
            ground_anchor_a: Vec2::new(-1.0, 1.0),
            ground_anchor_b: Vec2::new(1.0, 1.0),
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            length_a: 0.0,
            length_b: 0.0,
            ratio: 1.0,
        }
    }
}

impl PulleyJointDef {
    /// Builds a pulley from world ground anchors and world body anchors.
    /// The rope lengths are taken from the current configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        body_a: BodyHandle,
        a: &Body,
        body_b: BodyHandle,
        b: &Body,
        ground_a: Vec2,
        ground_b: Vec2,
        anchor_a: Vec2,
        anchor_b: Vec2,
        ratio: f32,
    ) -> Self {
        debug_assert!(ratio > f32::EPSILON);
        Self {
            body_a,
            body_b,
            ground_anchor_a: ground_a,
            ground_anchor_b: ground_b,
            local_anchor_a: a.local_point(anchor_a),
            local_anchor_b: b.local_point(anchor_b),
            length_a: (anchor_a - ground_a).length(),
            length_b: (anchor_b - ground_b).length(),
            ratio,
            ..Default::default()
        }
    }

    pub fn with_collide_connected(mut self, flag: bool) -> Self {
        self.collide_connected = flag;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PulleyJoint {
    ground_anchor_a: Vec2,
    ground_anchor_b: Vec2,
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    length_a: f32,
    length_b: f32,
    ratio: f32,
    constant: f32,

    impulse: f32,

    solver_a: SolverBody,
    solver_b: SolverBody,
    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
}

/// Unit rope direction, or zero when the rope is too short to have one
fn rope_axis(u: Vec2) -> (Vec2, f32) {
    let length = u.length();
    if length > MIN_PULLEY_LENGTH {
        (u * (1.0 / length), length)
    } else {
        (Vec2::ZERO, length)
    }
}

impl PulleyJoint {
    pub(crate) fn new(def: &PulleyJointDef) -> Self {
        debug_assert!(def.ratio != 0.0);
        Self {
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length_a: def.length_a,
            length_b: def.length_b,
            ratio: def.ratio,
            constant: def.length_a + def.ratio * def.length_b,
            impulse: 0.0,
            solver_a: SolverBody::default(),
            solver_b: SolverBody::default(),
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
        }
    }

    #[inline]
    pub fn ground_anchor_a(&self) -> Vec2 {
        self.ground_anchor_a
    }

    #[inline]
    pub fn ground_anchor_b(&self) -> Vec2 {
        self.ground_anchor_b
    }

    /// Rope length of side A at creation
    #[inline]
    pub fn length_a(&self) -> f32 {
        self.length_a
    }

    #[inline]
    pub fn length_b(&self) -> f32 {
        self.length_b
    }

    #[inline]
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn current_length_a(&self, a: &Body) -> f32 {
        (a.world_point(self.local_anchor_a) - self.ground_anchor_a).length()
    }

    pub fn current_length_b(&self, b: &Body) -> f32 {
        (b.world_point(self.local_anchor_b) - self.ground_anchor_b).length()
    }

    pub(crate) fn anchor_a(&self, a: &Body) -> Vec2 {
        a.world_point(self.local_anchor_a)
    }

    pub(crate) fn anchor_b(&self, b: &Body) -> Vec2 {
        b.world_point(self.local_anchor_b)
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.u_b * (self.impulse * inv_dt)
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        self.ground_anchor_a -= new_origin;
        self.ground_anchor_b -= new_origin;
    }

    fn effective_mass(&self, a: &SolverBody, b: &SolverBody, r_a: Vec2, u_a: Vec2, r_b: Vec2, u_b: Vec2) -> f32 {
        let ru_a = r_a.cross(u_a);
        let ru_b = r_b.cross(u_b);

        let m_a = a.inv_mass + a.inv_i * ru_a * ru_a;
        let m_b = b.inv_mass + b.inv_i * ru_b * ru_b;

        let mass = m_a + self.ratio * self.ratio * m_b;
        if mass > 0.0 {
            1.0 / mass
        } else {
            mass
        }
    }

    fn apply(&self, data: &mut SolverData, impulse: f32) {
        let (a, b) = (self.solver_a, self.solver_b);
        let p_a = self.u_a * -impulse;
        let p_b = self.u_b * (-self.ratio * impulse);

        let va = &mut data.velocities[a.index];
        va.v += p_a * a.inv_mass;
        va.w += a.inv_i * self.r_a.cross(p_a);

        let vb = &mut data.velocities[b.index];
        vb.v += p_b * b.inv_mass;
        vb.w += b.inv_i * self.r_b.cross(p_b);
    }

    pub(crate) fn init_velocity_constraints(&mut self, a: SolverBody, b: SolverBody, data: &mut SolverData) {
        self.solver_a = a;
        self.solver_b = b;

        let pa = data.positions[a.index];
        let pb = data.positions[b.index];

        self.r_a = Rot::new(pa.a) * (self.local_anchor_a - a.local_center);
        self.r_b = Rot::new(pb.a) * (self.local_anchor_b - b.local_center);

        (self.u_a, _) = rope_axis(pa.c + self.r_a - self.ground_anchor_a);
        (self.u_b, _) = rope_axis(pb.c + self.r_b - self.ground_anchor_b);

        self.mass = self.effective_mass(&a, &b, self.r_a, self.u_a, self.r_b, self.u_b);

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            self.apply(data, self.impulse);
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let va = data.velocities[self.solver_a.index];
        let vb = data.velocities[self.solver_b.index];

        let vp_a = va.v + Vec2::scalar_cross(va.w, self.r_a);
        let vp_b = vb.v + Vec2::scalar_cross(vb.w, self.r_b);

        let c_dot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * c_dot;
        self.impulse += impulse;

        self.apply(data, impulse);
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (sa, sb) = (self.solver_a, self.solver_b);
        let mut pa = data.positions[sa.index];
        let mut pb = data.positions[sb.index];

        let r_a = Rot::new(pa.a) * (self.local_anchor_a - sa.local_center);
        let r_b = Rot::new(pb.a) * (self.local_anchor_b - sb.local_center);

        let (u_a, length_a) = rope_axis(pa.c + r_a - self.ground_anchor_a);
        let (u_b, length_b) = rope_axis(pb.c + r_b - self.ground_anchor_b);

        let mass = self.effective_mass(&sa, &sb, r_a, u_a, r_b, u_b);

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();

        let impulse = -mass * c;
        let p_a = u_a * -impulse;
        let p_b = u_b * (-self.ratio * impulse);

        pa.c += p_a * sa.inv_mass;
        pa.a += sa.inv_i * r_a.cross(p_a);
        pb.c += p_b * sb.inv_mass;
        pb.a += sb.inv_i * r_b.cross(p_b);

        data.positions[sa.index] = pa;
        data.positions[sb.index] = pb;

        linear_error < LINEAR_SLOP
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

    /// Two unit masses hanging 2 m under ground anchors at (-1, 2) and (1, 2)
    fn hanging() -> (PulleyJoint, Vec<Position>) {
        let def = PulleyJointDef {
            ground_anchor_a: Vec2::new(-1.0, 2.0),
            ground_anchor_b: Vec2::new(1.0, 2.0),
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            length_a: 2.0,
            length_b: 2.0,
            ratio: 1.0,
            ..Default::default()
        };
        let positions = vec![Position { c: Vec2::new(-1.0, 0.0), a: 0.0 }, Position { c: Vec2::new(1.0, 0.0), a: 0.0 }];
        (PulleyJoint::new(&def), positions)
    }

    #[test]
    fn test_rope_transfers_motion() {
        let (mut joint, mut positions) = hanging();
        let mut velocities = vec![Velocity { v: Vec2::new(0.0, -2.0), w: 0.0 }, Velocity::default()];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let a = SolverBody { index: 0, inv_mass: 1.0, ..Default::default() };
        let b = SolverBody { index: 1, inv_mass: 1.0, ..Default::default() };
        joint.init_velocity_constraints(a, b, &mut data);
        joint.solve_velocity_constraints(&mut data);

        // A going down drags B up at the same speed
        assert_relative_eq!(data.velocities[0].v.y, -1.0, epsilon = 1e-5);
        assert_relative_eq!(data.velocities[1].v.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_position_restores_total_length() {
        let (mut joint, mut positions) = hanging();
        positions[0].c.y = -0.5;
        let mut velocities = vec![Velocity::default(); 2];
        let mut data = SolverData { step: step(), positions: &mut positions, velocities: &mut velocities };

        let a = SolverBody { index: 0, inv_mass: 1.0, ..Default::default() };
        let b = SolverBody { index: 1, inv_mass: 1.0, ..Default::default() };
        joint.init_velocity_constraints(a, b, &mut data);
        for _ in 0..5 {
            joint.solve_position_constraints(&mut data);
        }

        let length_a = (data.positions[0].c - joint.ground_anchor_a()).length();
        let length_b = (data.positions[1].c - joint.ground_anchor_b()).length();
        assert_relative_eq!(length_a + length_b, 4.0, epsilon = LINEAR_SLOP);
    }

    #[test]
    fn test_shift_origin_moves_ground_anchors() {
        let (mut joint, _) = hanging();
        joint.shift_origin(Vec2::new(1.0, 1.0));
        assert_eq!(joint.ground_anchor_a(), Vec2::new(-2.0, 1.0));
        assert_eq!(joint.ground_anchor_b(), Vec2::new(0.0, 1.0));
    }
}
