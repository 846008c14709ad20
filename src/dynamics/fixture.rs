use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::collision::broad_phase::{BroadPhase, ProxyId};
use crate::geometry::{Aabb, MassData, RayCastInput, RayCastOutput, Shape, ShapeType};
use crate::math::{Transform, Vec2};
use crate::settings::DEFAULT_RESTITUTION_THRESHOLD;

use super::BodyHandle;

new_key_type! {
    /// Stable handle to a fixture owned by a [`World`](crate::World)
    pub struct FixtureHandle;
}

/// Collision filtering data.
///
/// Two fixtures sharing a non-zero group index always collide (positive) or
/// never collide (negative). Otherwise each category must be accepted by the
/// other fixture's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Filter {
    /// Collision category bits, usually a single bit
    pub category_bits: u16,
    /// Categories this fixture accepts collisions with
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    /// The default pairwise filtering rule
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }

        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

/// Everything needed to attach a shape to a body
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDef {
    /// The shape is cloned into the fixture
    pub shape: Shape,
    /// Friction coefficient, usually in [0, 1]
    pub friction: f32,
    /// Restitution (elasticity), usually in [0, 1]
    pub restitution: f32,
    /// Relative speed above which restitution applies, in m/s
    pub restitution_threshold: f32,
    /// Density in kg/m^2
    pub density: f32,
    /// Sensors collect contact information but never generate a response
    pub is_sensor: bool,
    pub filter: Filter,
    pub user_data: u64,
}

impl Default for FixtureDef {
    /// A unit circle with zero density
    fn default() -> Self {
        Self::new(Shape::circle(1.0))
    }
}

impl FixtureDef {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            friction: 0.2,
            restitution: 0.0,
            restitution_threshold: DEFAULT_RESTITUTION_THRESHOLD,
            density: 0.0,
            is_sensor: false,
            filter: Filter::default(),
            user_data: 0,
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_restitution_threshold(mut self, threshold: f32) -> Self {
        self.restitution_threshold = threshold;
        self
    }

    pub fn with_sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }
}

/// User data stored in the broad-phase for each fixture child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixtureProxyKey {
    pub fixture: FixtureHandle,
    pub child_index: usize,
}

/// Broad-phase registration of one shape child
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureProxy {
    /// Tight AABB covering the child over the last step
    pub aabb: Aabb,
    pub child_index: usize,
    pub proxy_id: ProxyId,
}

/// A shape bound to a body, with material and filtering data.
///
/// Fixtures are owned by the world and belong to exactly one body.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub(crate) body: BodyHandle,
    pub(crate) shape: Shape,
    pub(crate) density: f32,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) restitution_threshold: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    pub(crate) proxies: SmallVec<[FixtureProxy; 1]>,
    pub(crate) user_data: u64,
}

impl Fixture {
    pub(crate) fn new(body: BodyHandle, def: &FixtureDef) -> Self {
        Self {
            body,
            shape: def.shape.clone(),
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            restitution_threshold: def.restitution_threshold,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: SmallVec::new(),
            user_data: def.user_data,
        }
    }

    /// The body this fixture is attached to
    #[inline]
    pub fn body(&self) -> BodyHandle {
        self.body
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        self.shape.shape_type()
    }

    #[inline]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    #[inline]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    #[inline]
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Sets the density. Call [`World::reset_mass_data`](crate::World::reset_mass_data)
    /// to update the body mass.
    pub fn set_density(&mut self, density: f32) {
        debug_assert!(density.is_finite() && density >= 0.0);
        self.density = density;
    }

    #[inline]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Sets the friction. Existing contacts keep their mixed value.
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    #[inline]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Sets the restitution. Existing contacts keep their mixed value.
    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    #[inline]
    pub fn restitution_threshold(&self) -> f32 {
        self.restitution_threshold
    }

    pub fn set_restitution_threshold(&mut self, threshold: f32) {
        self.restitution_threshold = threshold;
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    pub fn set_user_data(&mut self, user_data: u64) {
        self.user_data = user_data;
    }

    #[inline]
    pub fn proxies(&self) -> &[FixtureProxy] {
        &self.proxies
    }

    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.density)
    }

    /// Tests a world point for containment, given the body transform
    pub fn test_point(&self, xf: Transform, p: Vec2) -> bool {
        self.shape.test_point(xf, p)
    }

    /// Casts a ray against one child, given the body transform
    pub fn ray_cast(&self, input: &RayCastInput, xf: Transform, child_index: usize) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf, child_index)
    }

    /// The tight AABB of a child over the last step, while it has a proxy
    pub fn aabb(&self, child_index: usize) -> Option<Aabb> {
        self.proxies.iter().find(|p| p.child_index == child_index).map(|p| p.aabb)
    }

    pub(crate) fn create_proxies(
        &mut self,
        handle: FixtureHandle,
        broad_phase: &mut BroadPhase<FixtureProxyKey>,
        xf: Transform,
    ) {
        debug_assert!(self.proxies.is_empty());

        for child_index in 0..self.shape.child_count() {
            let aabb = self.shape.compute_aabb(xf, child_index);
            let proxy_id = broad_phase.create_proxy(aabb, FixtureProxyKey { fixture: handle, child_index });
            self.proxies.push(FixtureProxy { aabb, child_index, proxy_id });
        }
    }

    pub(crate) fn destroy_proxies(&mut self, broad_phase: &mut BroadPhase<FixtureProxyKey>) {
        for proxy in self.proxies.drain(..) {
            broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    /// Moves the proxies to cover the motion from `xf1` to `xf2`
    pub(crate) fn synchronize(&mut self, broad_phase: &mut BroadPhase<FixtureProxyKey>, xf1: Transform, xf2: Transform) {
        for proxy in &mut self.proxies {
            let aabb1 = self.shape.compute_aabb(xf1, proxy.child_index);
            let aabb2 = self.shape.compute_aabb(xf2, proxy.child_index);

            proxy.aabb = aabb1.union(aabb2);

            let displacement = aabb2.center() - aabb1.center();
            broad_phase.move_proxy(proxy.proxy_id, proxy.aabb, displacement);
        }
    }

    pub(crate) fn touch_proxies(&self, broad_phase: &mut BroadPhase<FixtureProxyKey>) {
        for proxy in &self.proxies {
            broad_phase.touch_proxy(proxy.proxy_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_filter_groups() {
        let a = Filter { group_index: -1, ..Filter::default() };
        assert!(!a.should_collide(&a));

        let b = Filter { group_index: 2, mask_bits: 0, ..Filter::default() };
        // Positive groups override the masks
        assert!(b.should_collide(&b));
    }

    #[test]
    fn test_filter_masks() {
        let player = Filter { category_bits: 0x0002, mask_bits: 0xFFFF & !0x0002, group_index: 0 };
        let wall = Filter::default();
        assert!(player.should_collide(&wall));
        assert!(!player.should_collide(&player));
    }

    #[test]
    fn test_proxies_follow_synchronize() {
        let mut bodies: SlotMap<BodyHandle, ()> = SlotMap::with_key();
        let mut handles: SlotMap<FixtureHandle, ()> = SlotMap::with_key();
        let body = bodies.insert(());
        let handle = handles.insert(());

        let mut broad_phase = BroadPhase::new();
        let mut fixture = Fixture::new(body, &FixtureDef::new(Shape::circle(0.5)));
        fixture.create_proxies(handle, &mut broad_phase, Transform::IDENTITY);
        assert_eq!(fixture.proxies().len(), 1);
        assert_eq!(broad_phase.proxy_count(), 1);

        let xf2 = Transform::from_angle(Vec2::new(3.0, 0.0), 0.0);
        fixture.synchronize(&mut broad_phase, Transform::IDENTITY, xf2);
        let aabb = fixture.aabb(0).unwrap_or_default();
        assert!(aabb.min.x <= -0.5 && aabb.max.x >= 3.5);
        assert!(broad_phase.fat_aabb(fixture.proxies()[0].proxy_id).contains(aabb));

        fixture.destroy_proxies(&mut broad_phase);
        assert_eq!(broad_phase.proxy_count(), 0);
        assert!(fixture.proxies().is_empty());
    }
}
