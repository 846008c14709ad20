use crate::dynamics::{Body, BodyHandle, SolverBody, SolverData};
use crate::math::{Rot, Vec2};
use crate::settings::LINEAR_SLOP;

/// Keeps two anchor points at a distance, optionally as a spring with a
/// min/max length range.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DistanceJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    /// Anchor relative to body A's origin
    pub local_anchor_a: Vec2,
    /// Anchor relative to body B's origin
    pub local_anchor_b: Vec2,
    /// Rest length, clamped to a stable minimum
    pub length: f32,
    pub min_length: f32,
    pub max_length: f32,
    /// Linear stiffness in N/m
    pub stiffness: f32,
    /// Linear damping in N*s/m
    pub damping: f32,
}

impl Default for DistanceJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyHandle::default(),
            body_b: BodyHandle::default(),
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            length: 1.0,
            min_length: 0.0,
            max_length: f32::MAX,
            stiffness: 0.0,
            damping: 0.0,
        }
    }
}

impl DistanceJointDef {
    /// Connects two bodies at world anchors. The rest, min and max lengths
    /// all become the current anchor distance.
    pub fn initialize(
        body_a: BodyHandle,
        a: &Body,
        body_b: BodyHandle,
        b: &Body,
        anchor_a: Vec2,
        anchor_b: Vec2,
    ) -> Self {
        let length = (anchor_b - anchor_a).length().max(LINEAR_SLOP);
        Self {
            body_a,
            body_b,
            local_anchor_a: a.local_point(anchor_a),
            local_anchor_b: b.local_point(anchor_b),
            length,
            min_length: length,
            max_length: length,
            ..Default::default()
        }
    }

    pub fn with_collide_connected(mut self, flag: bool) -> Self {
        self.collide_connected = flag;
        self
    }

    pub fn with_length_range(mut self, min_length: f32, max_length: f32) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    pub fn with_spring(mut self, stiffness: f32, damping: f32) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }
}

#[derive(Debug, Clone)]
pub struct DistanceJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    length: f32,
    min_length: f32,
    max_length: f32,
    stiffness: f32,
    damping: f32,

    impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    // Solver temporaries
    solver_a: SolverBody,
    solver_b: SolverBody,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    current_length: f32,
    gamma: f32,
    bias: f32,
    soft_mass: f32,
    mass: f32,
}

impl DistanceJoint {
    pub(crate) fn new(def: &DistanceJointDef) -> Self {
        let min_length = def.min_length.max(LINEAR_SLOP);
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length: def.length.max(LINEAR_SLOP),
            min_length,
            max_length: def.max_length.max(min_length),
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            solver_a: SolverBody::default(),
            solver_b: SolverBody::default(),
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            current_length: 0.0,
            gamma: 0.0,
            bias: 0.0,
            soft_mass: 0.0,
            mass: 0.0,
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
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Sets the rest length and returns the clamped value
    pub fn set_length(&mut self, length: f32) -> f32 {
        self.impulse = 0.0;
        self.length = length.max(LINEAR_SLOP);
        self.length
    }

    #[inline]
    pub fn min_length(&self) -> f32 {
        self.min_length
    }

    pub fn set_min_length(&mut self, min_length: f32) -> f32 {
        self.lower_impulse = 0.0;
        self.min_length = min_length.clamp(LINEAR_SLOP, self.max_length);
        self.min_length
    }

    #[inline]
    pub fn max_length(&self) -> f32 {
        self.max_length
    }

    pub fn set_max_length(&mut self, max_length: f32) -> f32 {
        self.upper_impulse = 0.0;
        self.max_length = max_length.max(self.min_length);
        self.max_length
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

    /// Current anchor distance given both bodies
    pub fn current_length(&self, a: &Body, b: &Body) -> f32 {
        (b.world_point(self.local_anchor_b) - a.world_point(self.local_anchor_a)).length()
    }

    pub(crate) fn anchor_a(&self, a: &Body) -> Vec2 {
        a.world_point(self.local_anchor_a)
    }

    pub(crate) fn anchor_b(&self, b: &Body) -> Vec2 {
        b.world_point(self.local_anchor_b)
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.u * (inv_dt * (self.impulse + self.lower_impulse - self.upper_impulse))
    }

    fn apply(&self, p: Vec2, data: &mut SolverData) {
        let (sa, sb) = (&self.solver_a, &self.solver_b);
        let va = &mut data.velocities[sa.index];
        va.v -= p * sa.inv_mass;
        va.w -= sa.inv_i * self.r_a.cross(p);
        let vb = &mut data.velocities[sb.index];
        vb.v += p * sb.inv_mass;
        vb.w += sb.inv_i * self.r_b.cross(p);
    }

    /// Relative velocity of the anchors along the axis
    fn axial_speed(&self, data: &SolverData) -> f32 {
        let va = data.velocities[self.solver_a.index];
        let vb = data.velocities[self.solver_b.index];
        let vp_a = va.v + Vec2::scalar_cross(va.w, self.r_a);
        let vp_b = vb.v + Vec2::scalar_cross(vb.w, self.r_b);
        self.u.dot(vp_b - vp_a)
    }

    pub(crate) fn init_velocity_constraints(&mut self, a: SolverBody, b: SolverBody, data: &mut SolverData) {
        self.solver_a = a;
        self.solver_b = b;

        let pa = data.positions[a.index];
        let pb = data.positions[b.index];

        self.r_a = Rot::new(pa.a) * (self.local_anchor_a - a.local_center);
        self.r_b = Rot::new(pb.a) * (self.local_anchor_b - b.local_center);
        self.u = pb.c + self.r_b - pa.c - self.r_a;

        // Handle singularity
        self.current_length = self.u.length();
        if self.current_length > LINEAR_SLOP {
            self.u *= 1.0 / self.current_length;
        } else {
            self.u = Vec2::ZERO;
            self.mass = 0.0;
            self.impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        let cr_au = self.r_a.cross(self.u);
        let cr_bu = self.r_b.cross(self.u);
        let mut inv_mass = a.inv_mass + a.inv_i * cr_au * cr_au + b.inv_mass + b.inv_i * cr_bu * cr_bu;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.stiffness > 0.0 && self.min_length < self.max_length {
            // Soft constraint
            let c = self.current_length - self.length;
            let h = data.step.dt;
            let (d, k) = (self.damping, self.stiffness);

            // The extra h converts the force to an impulse
            self.gamma = h * (d + h * k);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * k * self.gamma;

            inv_mass += self.gamma;
            self.soft_mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
            self.soft_mass = self.mass;
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            self.lower_impulse *= data.step.dt_ratio;
            self.upper_impulse *= data.step.dt_ratio;

            let p = self.u * (self.impulse + self.lower_impulse - self.upper_impulse);
            self.apply(p, data);
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        if self.min_length < self.max_length {
            if self.stiffness > 0.0 {
                let c_dot = self.axial_speed(data);
                let impulse = -self.soft_mass * (c_dot + self.bias + self.gamma * self.impulse);
                self.impulse += impulse;
                self.apply(self.u * impulse, data);
            }

            // Lower
            {
                let c = self.current_length - self.min_length;
                let bias = c.max(0.0) * data.step.inv_dt;
                let c_dot = self.axial_speed(data);

                let impulse = -self.mass * (c_dot + bias);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = self.lower_impulse - old_impulse;
                self.apply(self.u * impulse, data);
            }

            // Upper
            {
                let c = self.max_length - self.current_length;
                let bias = c.max(0.0) * data.step.inv_dt;
                let c_dot = -self.axial_speed(data);

                let impulse = -self.mass * (c_dot + bias);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = self.upper_impulse - old_impulse;
                self.apply(self.u * -impulse, data);
            }
        } else {
            // Equal limits
            let c_dot = self.axial_speed(data);
            let impulse = -self.mass * c_dot;
            self.impulse += impulse;
            self.apply(self.u * impulse, data);
        }
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (sa, sb) = (self.solver_a, self.solver_b);
        let mut pa = data.positions[sa.index];
        let mut pb = data.positions[sb.index];

        let r_a = Rot::new(pa.a) * (self.local_anchor_a - sa.local_center);
        let r_b = Rot::new(pb.a) * (self.local_anchor_b - sb.local_center);
        let (u, length) = (pb.c + r_b - pa.c - r_a).normalize_with_length();

        let c = if self.min_length == self.max_length || length < self.min_length {
            length - self.min_length
        } else if self.max_length < length {
            length - self.max_length
        } else {
            return true;
        };

        let p = u * (-self.mass * c);
        pa.c -= p * sa.inv_mass;
        pa.a -= sa.inv_i * r_a.cross(p);
        pb.c += p * sb.inv_mass;
        pb.a += sb.inv_i * r_b.cross(p);

        data.positions[sa.index] = pa;
        data.positions[sb.index] = pb;

        c.abs() < LINEAR_SLOP
    }
}
