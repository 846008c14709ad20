use crate::dynamics::{Body, BodyHandle, SolverBody, SolverData};
use crate::math::{Mat22, Rot, Vec2};

/// Drags a point of body B toward a world target with a soft spring.
///
/// Body A is unused by the solver, but the joint still needs one; the
/// ground body is the usual choice.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MouseJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    /// Initial world target; also the grabbed point on body B
    pub target: Vec2,
    /// Maximum constraint force, usually some multiple of the body weight
    pub max_force: f32,
    /// Linear stiffness in N/m
    pub stiffness: f32,
    /// Linear damping in N*s/m
    pub damping: f32,
}

impl MouseJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, target: Vec2) -> Self {
        Self { body_a, body_b, target, ..Default::default() }
    }

    pub fn with_max_force(mut self, force: f32) -> Self {
        self.max_force = force;
        self
    }

    pub fn with_spring(mut self, stiffness: f32, damping: f32) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MouseJoint {
    target: Vec2,
    local_anchor_b: Vec2,
    max_force: f32,
    stiffness: f32,
    damping: f32,

    impulse: Vec2,

    solver_b: SolverBody,
    r_b: Vec2,
    mass: Mat22,
    c: Vec2,
    beta: f32,
    gamma: f32,
}

impl MouseJoint {
    pub(crate) fn new(def: &MouseJointDef, b: &Body) -> Self {
        Self {
            target: def.target,
            local_anchor_b: b.xf.inverse_transform_point(def.target),
            max_force: def.max_force,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: Vec2::ZERO,
            solver_b: SolverBody::default(),
            r_b: Vec2::ZERO,
            mass: Mat22::ZERO,
            c: Vec2::ZERO,
            beta: 0.0,
            gamma: 0.0,
        }
    }

    #[inline]
    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Moves the target. Use [`World::joint_mut`](crate::World::joint_mut)
    /// with `wake` set so a sleeping body follows.
    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    #[inline]
    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force;
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

    pub(crate) fn anchor_a(&self) -> Vec2 {
        self.target
    }

    pub(crate) fn anchor_b(&self, b: &Body) -> Vec2 {
        b.world_point(self.local_anchor_b)
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.impulse * inv_dt
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        self.target -= new_origin;
    }

    pub(crate) fn init_velocity_constraints(&mut self, b: SolverBody, data: &mut SolverData) {
        self.solver_b = b;

        let pb = data.positions[b.index];
        let h = data.step.dt;

        // gamma has units of inverse mass, beta of inverse time
        self.gamma = h * (self.damping + h * self.stiffness);
        if self.gamma != 0.0 {
            self.gamma = 1.0 / self.gamma;
        }
        self.beta = h * self.stiffness * self.gamma;

        self.r_b = Rot::new(pb.a) * (self.local_anchor_b - b.local_center);
        let r_b = self.r_b;

        let k11 = b.inv_mass + b.inv_i * r_b.y * r_b.y + self.gamma;
        let k12 = -b.inv_i * r_b.x * r_b.y;
        let k22 = b.inv_mass + b.inv_i * r_b.x * r_b.x + self.gamma;
        self.mass = Mat22::new(k11, k12, k12, k22).inverse();

        self.c = (pb.c + r_b - self.target) * self.beta;

        let vb = &mut data.velocities[b.index];
        // Slight angular damping keeps a dragged body from spinning up
        vb.w *= 0.98;

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            vb.v += self.impulse * b.inv_mass;
            vb.w += b.inv_i * r_b.cross(self.impulse);
        } else {
            self.impulse = Vec2::ZERO;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let b = self.solver_b;
        let vb = &mut data.velocities[b.index];

        let c_dot = vb.v + Vec2::scalar_cross(vb.w, self.r_b);
        let impulse = self.mass * -(c_dot + self.c + self.impulse * self.gamma);

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = data.step.dt * self.max_force;
        if self.impulse.length_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.length();
        }
        let impulse = self.impulse - old_impulse;

        vb.v += impulse * b.inv_mass;
        vb.w += b.inv_i * self.r_b.cross(impulse);
    }
}
