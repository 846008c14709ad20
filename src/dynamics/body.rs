use bitflags::bitflags;
use slotmap::{new_key_type, SlotMap};

use crate::geometry::MassData;
use crate::joints::{Joint, JointHandle};
use crate::math::{Rot, Sweep, Transform, Vec2};

use super::{ContactHandle, Fixture, FixtureHandle};

new_key_type! {
    /// Stable handle to a body owned by a [`World`](crate::World)
    pub struct BodyHandle;
}

/// The type of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyType {
    /// Zero mass, zero velocity, may be moved manually
    #[default]
    Static,
    /// Zero mass, velocity set by the user, moved by the solver
    Kinematic,
    /// Positive mass, velocity determined by forces, moved by the solver
    Dynamic,
}

bitflags! {
    /// Body state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BodyFlags: u16 {
        const ISLAND         = 1 << 0;
        const AWAKE          = 1 << 1;
        const AUTO_SLEEP     = 1 << 2;
        const BULLET         = 1 << 3;
        const FIXED_ROTATION = 1 << 4;
        const ENABLED        = 1 << 5;
        const TOI            = 1 << 6;
    }
}

/// Everything needed to construct a body.
///
/// Definitions can be reused to create many bodies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyDef {
    pub body_type: BodyType,
    /// World position of the body origin
    pub position: Vec2,
    /// World angle in radians
    pub angle: f32,
    /// Linear velocity of the body origin in world coordinates
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Set to false for bodies that should never fall asleep
    pub allow_sleep: bool,
    pub awake: bool,
    /// Prevents the body from rotating
    pub fixed_rotation: bool,
    /// Fast moving body that must not tunnel through other dynamic bodies.
    /// All bodies are prevented from tunneling through kinematic and static bodies.
    pub bullet: bool,
    pub enabled: bool,
    pub gravity_scale: f32,
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
            gravity_scale: 1.0,
            user_data: 0,
        }
    }
}

impl BodyDef {
    /// Definition of a dynamic body
    pub fn dynamic() -> Self {
        Self::default().with_type(BodyType::Dynamic)
    }

    /// Definition of a kinematic body
    pub fn kinematic() -> Self {
        Self::default().with_type(BodyType::Kinematic)
    }

    pub fn with_type(mut self, body_type: BodyType) -> Self {
        self.body_type = body_type;
        self
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: f32) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn with_linear_damping(mut self, damping: f32) -> Self {
        self.linear_damping = damping;
        self
    }

    pub fn with_angular_damping(mut self, damping: f32) -> Self {
        self.angular_damping = damping;
        self
    }

    pub fn with_allow_sleep(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    pub fn with_awake(mut self, awake: bool) -> Self {
        self.awake = awake;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed_rotation: bool) -> Self {
        self.fixed_rotation = fixed_rotation;
        self
    }

    pub fn with_bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.position.is_valid()
            && self.linear_velocity.is_valid()
            && self.angle.is_finite()
            && self.angular_velocity.is_finite()
            && self.linear_damping.is_finite()
            && self.linear_damping >= 0.0
            && self.angular_damping.is_finite()
            && self.angular_damping >= 0.0
    }
}

/// Connects a body to a joint and the other body of that joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointEdge {
    pub other: BodyHandle,
    pub joint: JointHandle,
}

/// Connects a body to a contact and the other body of that contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEdge {
    pub other: BodyHandle,
    pub contact: ContactHandle,
}

/// A rigid body.
///
/// Bodies are created and owned by the world. Methods here only touch the
/// body itself; operations that also update fixtures, contacts or the
/// broad-phase live on [`World`](crate::World).
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) body_type: BodyType,
    pub(crate) flags: BodyFlags,
    pub(crate) island_index: usize,

    /// Transform of the body origin
    pub(crate) xf: Transform,
    /// Swept motion of the center of mass for continuous collision
    pub(crate) sweep: Sweep,

    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f32,

    pub(crate) force: Vec2,
    pub(crate) torque: f32,

    pub(crate) fixtures: Vec<FixtureHandle>,
    pub(crate) joint_edges: Vec<JointEdge>,
    pub(crate) contact_edges: Vec<ContactEdge>,

    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    /// Rotational inertia about the center of mass
    pub(crate) inertia: f32,
    pub(crate) inv_i: f32,

    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) gravity_scale: f32,

    pub(crate) sleep_time: f32,

    pub(crate) user_data: u64,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let mut flags = BodyFlags::empty();
        flags.set(BodyFlags::BULLET, def.bullet);
        flags.set(BodyFlags::FIXED_ROTATION, def.fixed_rotation);
        flags.set(BodyFlags::AUTO_SLEEP, def.allow_sleep);
        flags.set(BodyFlags::AWAKE, def.awake && def.body_type != BodyType::Static);
        flags.set(BodyFlags::ENABLED, def.enabled);

        let xf = Transform::from_angle(def.position, def.angle);

        Self {
            body_type: def.body_type,
            flags,
            island_index: 0,
            xf,
            sweep: Sweep {
                local_center: Vec2::ZERO,
                c0: xf.p,
                c: xf.p,
                a0: def.angle,
                a: def.angle,
                alpha0: 0.0,
            },
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            force: Vec2::ZERO,
            torque: 0.0,
            fixtures: Vec::new(),
            joint_edges: Vec::new(),
            contact_edges: Vec::new(),
            mass: 0.0,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_i: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            user_data: def.user_data,
        }
    }

    #[inline]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Transform of the body origin
    #[inline]
    pub fn transform(&self) -> Transform {
        self.xf
    }

    /// World position of the body origin
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    /// World angle in radians
    #[inline]
    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    /// World position of the center of mass
    #[inline]
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    /// Center of mass in body coordinates
    #[inline]
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    #[inline]
    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    /// Linear velocity of the center of mass
    #[inline]
    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    /// Sets the linear velocity of the center of mass. Ignored on static bodies.
    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if v.dot(v) > 0.0 {
            self.set_awake(true);
        }
        self.linear_velocity = v;
    }

    #[inline]
    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    /// Sets the angular velocity in radians per second. Ignored on static bodies.
    pub fn set_angular_velocity(&mut self, w: f32) {
        if self.body_type == BodyType::Static {
            return;
        }
        if w * w > 0.0 {
            self.set_awake(true);
        }
        self.angular_velocity = w;
    }

    /// Force accumulated since the forces were last cleared
    #[inline]
    pub fn force(&self) -> Vec2 {
        self.force
    }

    #[inline]
    pub fn torque(&self) -> f32 {
        self.torque
    }

    /// Applies a force at a world point. A force off the center of mass also
    /// generates torque. Sleeping bodies ignore the force unless `wake` is set.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.force += force;
        self.torque += (point - self.sweep.c).cross(force);
    }

    /// Applies a force at the center of mass
    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.force += force;
    }

    /// Applies a torque about the z-axis
    pub fn apply_torque(&mut self, torque: f32, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.torque += torque;
    }

    /// Applies an impulse at a world point, changing the velocity immediately
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.linear_velocity += self.inv_mass * impulse;
        self.angular_velocity += self.inv_i * (point - self.sweep.c).cross(impulse);
    }

    /// Applies an impulse at the center of mass
    pub fn apply_linear_impulse_to_center(&mut self, impulse: Vec2, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.linear_velocity += self.inv_mass * impulse;
    }

    /// Applies an angular impulse in kg*m*m/s
    pub fn apply_angular_impulse(&mut self, impulse: f32, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.angular_velocity += self.inv_i * impulse;
    }

    /// Only awake dynamic bodies accumulate loads
    fn prepare_for_load(&mut self, wake: bool) -> bool {
        if self.body_type != BodyType::Dynamic {
            return false;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        self.is_awake()
    }

    /// Total mass in kilograms
    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Rotational inertia about the body origin
    #[inline]
    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.dot(self.sweep.local_center)
    }

    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: self.mass,
            center: self.sweep.local_center,
            inertia: self.inertia(),
        }
    }

    /// Overrides the mass properties computed from the fixtures.
    /// Non-positive masses fall back to one kilogram.
    pub(crate) fn set_mass_data(&mut self, data: &MassData) {
        if self.body_type != BodyType::Dynamic {
            return;
        }

        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_i = 0.0;

        self.mass = if data.mass > 0.0 { data.mass } else { 1.0 };
        self.inv_mass = 1.0 / self.mass;

        if data.inertia > 0.0 && !self.is_fixed_rotation() {
            self.inertia = data.inertia - self.mass * data.center.dot(data.center);
            debug_assert!(self.inertia > 0.0);
            self.inv_i = 1.0 / self.inertia;
        }

        self.move_center(data.center);
    }

    /// Recomputes the mass properties from the fixture densities
    pub(crate) fn reset_mass_data(&mut self, fixtures: &SlotMap<FixtureHandle, Fixture>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_i = 0.0;
        self.sweep.local_center = Vec2::ZERO;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut local_center = Vec2::ZERO;
        for fixture in self.fixtures.iter().filter_map(|&f| fixtures.get(f)) {
            if fixture.density == 0.0 {
                continue;
            }
            let data = fixture.mass_data();
            self.mass += data.mass;
            local_center += data.mass * data.center;
            self.inertia += data.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        }

        if self.inertia > 0.0 && !self.is_fixed_rotation() {
            // Center the inertia about the center of mass
            self.inertia -= self.mass * local_center.dot(local_center);
            debug_assert!(self.inertia > 0.0);
            self.inv_i = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_i = 0.0;
        }

        self.move_center(local_center);
    }

    /// Moves the center of mass and keeps the velocity of the origin
    fn move_center(&mut self, local_center: Vec2) {
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.xf * local_center;
        self.sweep.c0 = self.sweep.c;

        self.linear_velocity += Vec2::scalar_cross(self.angular_velocity, self.sweep.c - old_center);
    }

    /// World coordinates of a point given in body coordinates
    #[inline]
    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf * local_point
    }

    /// World coordinates of a vector given in body coordinates
    #[inline]
    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.q * local_vector
    }

    #[inline]
    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.inverse_transform_point(world_point)
    }

    #[inline]
    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.xf.q.inv_rotate(world_vector)
    }

    /// World velocity of a world point attached to this body
    pub fn linear_velocity_from_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity + Vec2::scalar_cross(self.angular_velocity, world_point - self.sweep.c)
    }

    /// World velocity of a local point attached to this body
    pub fn linear_velocity_from_local_point(&self, local_point: Vec2) -> Vec2 {
        self.linear_velocity_from_world_point(self.world_point(local_point))
    }

    #[inline]
    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping;
    }

    #[inline]
    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn set_angular_damping(&mut self, damping: f32) {
        self.angular_damping = damping;
    }

    #[inline]
    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
    }

    #[inline]
    pub fn is_bullet(&self) -> bool {
        self.flags.contains(BodyFlags::BULLET)
    }

    /// Treats this body like a bullet for continuous collision detection
    pub fn set_bullet(&mut self, flag: bool) {
        self.flags.set(BodyFlags::BULLET, flag);
    }

    #[inline]
    pub fn is_sleeping_allowed(&self) -> bool {
        self.flags.contains(BodyFlags::AUTO_SLEEP)
    }

    pub fn set_sleeping_allowed(&mut self, flag: bool) {
        self.flags.set(BodyFlags::AUTO_SLEEP, flag);
        if !flag {
            self.set_awake(true);
        }
    }

    #[inline]
    pub fn is_awake(&self) -> bool {
        self.flags.contains(BodyFlags::AWAKE)
    }

    /// Wakes the body or puts it to sleep. A sleeping body has zero velocity
    /// and no accumulated force. Static bodies never wake.
    pub fn set_awake(&mut self, flag: bool) {
        if self.body_type == BodyType::Static {
            return;
        }

        if flag {
            self.flags.insert(BodyFlags::AWAKE);
            self.sleep_time = 0.0;
        } else {
            self.flags.remove(BodyFlags::AWAKE);
            self.sleep_time = 0.0;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(BodyFlags::ENABLED)
    }

    #[inline]
    pub fn is_fixed_rotation(&self) -> bool {
        self.flags.contains(BodyFlags::FIXED_ROTATION)
    }

    #[inline]
    pub fn fixtures(&self) -> &[FixtureHandle] {
        &self.fixtures
    }

    #[inline]
    pub fn joint_edges(&self) -> &[JointEdge] {
        &self.joint_edges
    }

    #[inline]
    pub fn contact_edges(&self) -> &[ContactEdge] {
        &self.contact_edges
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    pub fn set_user_data(&mut self, user_data: u64) {
        self.user_data = user_data;
    }

    /// Whether contacts may be created against `other`. At least one body
    /// must be dynamic and no joint between them may forbid collision.
    pub(crate) fn should_collide(
        &self,
        other_handle: BodyHandle,
        other: &Body,
        joints: &SlotMap<JointHandle, Joint>,
    ) -> bool {
        if self.body_type != BodyType::Dynamic && other.body_type != BodyType::Dynamic {
            return false;
        }

        !self.joint_edges.iter().any(|edge| {
            edge.other == other_handle && joints.get(edge.joint).is_some_and(|j| !j.collide_connected())
        })
    }

    /// Transform at the start of the current sweep
    pub(crate) fn sweep_start_transform(&self) -> Transform {
        let q = Rot::new(self.sweep.a0);
        Transform::new(self.sweep.c0 - q * self.sweep.local_center, q)
    }

    pub(crate) fn synchronize_transform(&mut self) {
        self.xf.q = Rot::new(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q * self.sweep.local_center;
    }

    /// Advances the sweep to `alpha` and snaps the body there
    pub(crate) fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    pub(crate) fn set_transform(&mut self, position: Vec2, angle: f32) {
        self.xf = Transform::from_angle(position, angle);
        self.sweep.c = self.xf * self.sweep.local_center;
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        self.xf.p -= new_origin;
        self.sweep.c0 -= new_origin;
        self.sweep.c -= new_origin;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_def_builder() {
        let def = BodyDef::dynamic()
            .with_position(Vec2::new(1.0, 2.0))
            .with_angle(0.5)
            .with_bullet(true);
        let body = Body::new(&def);

        assert_eq!(body.body_type(), BodyType::Dynamic);
        assert!(body.is_bullet());
        assert!(body.is_awake());
        assert_relative_eq!(body.position().x, 1.0);
        assert_relative_eq!(body.angle(), 0.5);
    }

    #[test]
    fn test_static_bodies_start_asleep() {
        let body = Body::new(&BodyDef::default());
        assert!(!body.is_awake());
    }

    #[test]
    fn test_sleeping_clears_motion() {
        let mut body = Body::new(&BodyDef::dynamic().with_linear_velocity(Vec2::new(1.0, 0.0)));
        body.set_mass_data(&MassData { mass: 1.0, center: Vec2::ZERO, inertia: 1.0 });
        body.apply_force_to_center(Vec2::new(0.0, 5.0), false);
        assert_relative_eq!(body.force().y, 5.0);

        body.set_awake(false);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.force(), Vec2::ZERO);

        // Ignored while asleep unless asked to wake
        body.apply_linear_impulse_to_center(Vec2::new(1.0, 0.0), false);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        body.apply_linear_impulse_to_center(Vec2::new(1.0, 0.0), true);
        assert_relative_eq!(body.linear_velocity().x, 1.0);
    }

    #[test]
    fn test_force_off_center_adds_torque() {
        let mut body = Body::new(&BodyDef::dynamic());
        body.set_mass_data(&MassData { mass: 2.0, center: Vec2::ZERO, inertia: 1.0 });
        body.apply_force(Vec2::new(0.0, 1.0), Vec2::new(2.0, 0.0), true);
        assert_relative_eq!(body.torque(), 2.0);
    }

    #[test]
    fn test_mass_data_offset_center() {
        let mut body = Body::new(&BodyDef::dynamic().with_position(Vec2::new(1.0, 0.0)));
        let data = MassData { mass: 2.0, center: Vec2::new(0.5, 0.0), inertia: 1.5 };
        body.set_mass_data(&data);

        assert_relative_eq!(body.mass(), 2.0);
        assert_relative_eq!(body.inertia(), 1.5, epsilon = 1e-6);
        assert_relative_eq!(body.world_center().x, 1.5);
        assert_relative_eq!(body.inv_i, 1.0 / (1.5 - 0.5));
    }

    #[test]
    fn test_point_conversions() {
        let body = Body::new(&BodyDef::dynamic().with_position(Vec2::new(1.0, 1.0)).with_angle(std::f32::consts::FRAC_PI_2));
        let world = body.world_point(Vec2::new(1.0, 0.0));
        assert_relative_eq!(world.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(world.y, 2.0, epsilon = 1e-6);

        let local = body.local_point(world);
        assert_relative_eq!(local.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(local.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_advance_snaps_to_sweep() {
        let mut body = Body::new(&BodyDef::dynamic());
        body.sweep.c = Vec2::new(2.0, 0.0);
        body.advance(0.5);
        assert_relative_eq!(body.position().x, 1.0);
        assert_relative_eq!(body.sweep.alpha0, 0.5);
    }
}
