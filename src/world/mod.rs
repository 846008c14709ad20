//! The simulation world: owns every body, fixture, joint and contact, and
//! drives the time step.

mod debug_draw;
mod query;
mod step;

use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::callbacks::{ContactFilter, ContactListener, DestructionListener};
use crate::collision::broad_phase::BroadPhase;
use crate::collision::narrow_phase::WorldManifold;
use crate::dynamics::{
    mix_friction, mix_restitution, mix_restitution_threshold, Body, BodyDef, BodyFlags, BodyHandle, BodyType, Contact,
    ContactHandle, ContactManager, Fixture, FixtureDef, FixtureHandle, FixtureProxyKey, Filter, Island, JointEdge,
    Profile,
};
use crate::error::{Error, Result};
use crate::geometry::{Aabb, ChainShape, MassData};
use crate::joints::{Joint, JointDef, JointHandle};
use crate::math::Vec2;

pub use query::RayCastHit;

/// Configuration for the physics world
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldConfig {
    /// Gravity acceleration in m/s²
    pub gravity: Vec2,
    /// Lets resting islands fall asleep
    pub allow_sleeping: bool,
    /// Seeds the solvers with last step's impulses
    pub warm_starting: bool,
    /// Runs time of impact resolution after the discrete solve
    pub continuous_physics: bool,
    /// Resolves a single time of impact event per step
    pub sub_stepping: bool,
    /// Clears forces and torques at the end of every step
    pub auto_clear_forces: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -10.0),
            allow_sleeping: true,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            auto_clear_forces: true,
        }
    }
}

/// The world manages all physics entities, dynamic simulation and
/// asynchronous queries.
///
/// Bodies, fixtures and joints are created through the world and addressed
/// by handles. Structural changes are rejected with [`Error::Locked`] while a
/// step is in progress, which can only be observed from a callback that
/// panicked out of [`World::step`].
pub struct World {
    config: WorldConfig,
    pub(crate) bodies: SlotMap<BodyHandle, Body>,
    pub(crate) fixtures: SlotMap<FixtureHandle, Fixture>,
    pub(crate) joints: SlotMap<JointHandle, Joint>,
    pub(crate) contact_manager: ContactManager,
    destruction_listener: Option<Box<dyn DestructionListener>>,

    island: Island,
    seeds: Vec<BodyHandle>,
    stack: Vec<BodyHandle>,

    new_contacts: bool,
    locked: bool,
    step_complete: bool,
    /// Inverse of the previous non-zero time step, for warm starting
    inv_dt0: f32,
    profile: Profile,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("body_count", &self.bodies.len())
            .field("fixture_count", &self.fixtures.len())
            .field("joint_count", &self.joints.len())
            .field("contact_manager", &self.contact_manager)
            .field("locked", &self.locked)
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::with_config(WorldConfig::default())
    }
}

impl World {
    /// Creates a world with the given gravity and default settings
    pub fn new(gravity: Vec2) -> Self {
        Self::with_config(WorldConfig { gravity, ..WorldConfig::default() })
    }

    /// Creates a world with the given configuration
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            bodies: SlotMap::with_key(),
            fixtures: SlotMap::with_key(),
            joints: SlotMap::with_key(),
            contact_manager: ContactManager::new(),
            destruction_listener: None,
            island: Island::new(),
            seeds: Vec::new(),
            stack: Vec::new(),
            new_contacts: false,
            locked: false,
            step_complete: true,
            inv_dt0: 0.0,
            profile: Profile::default(),
        }
    }

    fn check_unlocked(&self, operation: &'static str) -> Result<()> {
        if self.locked {
            warn!(operation, "world is locked, mutation rejected");
            return Err(Error::Locked);
        }
        Ok(())
    }

    // Configuration

    #[inline]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[inline]
    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    #[inline]
    pub fn allow_sleeping(&self) -> bool {
        self.config.allow_sleeping
    }

    /// Enables or disables sleep. Disabling it wakes every body.
    pub fn set_allow_sleeping(&mut self, flag: bool) {
        if flag == self.config.allow_sleeping {
            return;
        }

        self.config.allow_sleeping = flag;
        if !flag {
            for body in self.bodies.values_mut() {
                body.set_awake(true);
            }
        }
    }

    #[inline]
    pub fn warm_starting(&self) -> bool {
        self.config.warm_starting
    }

    pub fn set_warm_starting(&mut self, flag: bool) {
        self.config.warm_starting = flag;
    }

    #[inline]
    pub fn continuous_physics(&self) -> bool {
        self.config.continuous_physics
    }

    pub fn set_continuous_physics(&mut self, flag: bool) {
        self.config.continuous_physics = flag;
    }

    #[inline]
    pub fn sub_stepping(&self) -> bool {
        self.config.sub_stepping
    }

    pub fn set_sub_stepping(&mut self, flag: bool) {
        self.config.sub_stepping = flag;
    }

    #[inline]
    pub fn auto_clear_forces(&self) -> bool {
        self.config.auto_clear_forces
    }

    pub fn set_auto_clear_forces(&mut self, flag: bool) {
        self.config.auto_clear_forces = flag;
    }

    /// Whether a time step is in progress
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// False while sub-stepping has time of impact events left over from
    /// the last step. The next step resolves them before moving on.
    #[inline]
    pub fn is_step_complete(&self) -> bool {
        self.step_complete
    }

    /// Timings of the last step
    #[inline]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    // Callbacks

    pub fn set_contact_listener(&mut self, listener: impl ContactListener + 'static) {
        self.contact_manager.contact_listener = Some(Box::new(listener));
    }

    pub fn set_contact_filter(&mut self, filter: impl ContactFilter + 'static) {
        self.contact_manager.contact_filter = Some(Box::new(filter));
    }

    /// Registers a listener told about joints and fixtures that are
    /// implicitly destroyed along with their body
    pub fn set_destruction_listener(&mut self, listener: impl DestructionListener + 'static) {
        self.destruction_listener = Some(Box::new(listener));
    }

    /// Removes every registered callback
    pub fn clear_listeners(&mut self) {
        self.contact_manager.contact_listener = None;
        self.contact_manager.contact_filter = None;
        self.destruction_listener = None;
    }

    // Bodies

    /// Creates a rigid body. Shapes are attached afterwards with
    /// [`World::create_fixture`].
    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyHandle> {
        self.check_unlocked("create_body")?;
        if !def.is_valid() {
            warn!(?def, "rejected invalid body definition");
            return Err(Error::InvalidParameter("body definition"));
        }

        let handle = self.bodies.insert(Body::new(def));
        debug!(?handle, body_type = ?def.body_type, "created body");
        Ok(handle)
    }

    /// Destroys a body along with its joints, contacts and fixtures. The
    /// destruction listener hears about each joint and fixture first.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> Result<()> {
        self.check_unlocked("destroy_body")?;
        let body = self.bodies.get_mut(handle).ok_or(Error::InvalidBody(handle))?;

        let joint_edges = std::mem::take(&mut body.joint_edges);
        let contact_edges = std::mem::take(&mut body.contact_edges);
        let fixtures = std::mem::take(&mut body.fixtures);

        for edge in joint_edges {
            if let Some(listener) = self.destruction_listener.as_mut() {
                listener.say_goodbye_joint(edge.joint);
            }
            self.remove_joint(edge.joint);
        }

        for edge in contact_edges {
            self.contact_manager.destroy(edge.contact, &mut self.bodies, &self.fixtures);
        }

        for fixture_handle in fixtures {
            if let Some(listener) = self.destruction_listener.as_mut() {
                listener.say_goodbye_fixture(fixture_handle);
            }
            if let Some(mut fixture) = self.fixtures.remove(fixture_handle) {
                fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
            }
        }

        self.bodies.remove(handle);
        debug!(?handle, "destroyed body");
        Ok(())
    }

    #[inline]
    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    /// Mutable access for velocities, forces and per-body settings. Changes
    /// that touch the broad-phase go through the world instead.
    #[inline]
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> + '_ {
        self.bodies.iter()
    }

    /// Teleports a body, keeping its velocity. Contacts are updated on the
    /// next step.
    pub fn set_transform(&mut self, handle: BodyHandle, position: Vec2, angle: f32) -> Result<()> {
        self.check_unlocked("set_transform")?;
        let body = self.bodies.get_mut(handle).ok_or(Error::InvalidBody(handle))?;

        body.set_transform(position, angle);
        let xf = body.xf;
        for &fixture_handle in &body.fixtures {
            if let Some(fixture) = self.fixtures.get_mut(fixture_handle) {
                fixture.synchronize(&mut self.contact_manager.broad_phase, xf, xf);
            }
        }

        self.new_contacts = true;
        Ok(())
    }

    /// Changes the body type. The body's contacts are destroyed and
    /// recreated on the next step as the new type allows.
    pub fn set_body_type(&mut self, handle: BodyHandle, body_type: BodyType) -> Result<()> {
        self.check_unlocked("set_body_type")?;
        let body = self.bodies.get_mut(handle).ok_or(Error::InvalidBody(handle))?;
        if body.body_type == body_type {
            return Ok(());
        }

        body.body_type = body_type;
        body.reset_mass_data(&self.fixtures);

        if body_type == BodyType::Static {
            body.linear_velocity = Vec2::ZERO;
            body.angular_velocity = 0.0;
            body.sweep.a0 = body.sweep.a;
            body.sweep.c0 = body.sweep.c;
            body.flags.remove(BodyFlags::AWAKE);
            step::synchronize_fixtures(body, &mut self.fixtures, &mut self.contact_manager.broad_phase);
        }

        body.set_awake(true);
        body.force = Vec2::ZERO;
        body.torque = 0.0;

        let contact_edges = std::mem::take(&mut body.contact_edges);
        let fixtures = body.fixtures.clone();
        for edge in contact_edges {
            self.contact_manager.destroy(edge.contact, &mut self.bodies, &self.fixtures);
        }

        // Touch the proxies so that new contacts will be created
        for fixture_handle in fixtures {
            if let Some(fixture) = self.fixtures.get(fixture_handle) {
                fixture.touch_proxies(&mut self.contact_manager.broad_phase);
            }
        }

        Ok(())
    }

    /// Adds or removes a body from the simulation. A disabled body keeps its
    /// fixtures and joints but has no proxies and no contacts.
    pub fn set_body_enabled(&mut self, handle: BodyHandle, flag: bool) -> Result<()> {
        self.check_unlocked("set_body_enabled")?;
        let body = self.bodies.get_mut(handle).ok_or(Error::InvalidBody(handle))?;
        if body.is_enabled() == flag {
            return Ok(());
        }

        let broad_phase = &mut self.contact_manager.broad_phase;
        if flag {
            body.flags.insert(BodyFlags::ENABLED);
            let xf = body.xf;
            for &fixture_handle in &body.fixtures {
                if let Some(fixture) = self.fixtures.get_mut(fixture_handle) {
                    fixture.create_proxies(fixture_handle, broad_phase, xf);
                }
            }
            self.new_contacts = true;
        } else {
            body.flags.remove(BodyFlags::ENABLED);
            for &fixture_handle in &body.fixtures {
                if let Some(fixture) = self.fixtures.get_mut(fixture_handle) {
                    fixture.destroy_proxies(broad_phase);
                }
            }

            let contact_edges = std::mem::take(&mut body.contact_edges);
            for edge in contact_edges {
                self.contact_manager.destroy(edge.contact, &mut self.bodies, &self.fixtures);
            }
        }

        Ok(())
    }

    /// Locks or unlocks rotation. The angular velocity is reset.
    pub fn set_fixed_rotation(&mut self, handle: BodyHandle, flag: bool) -> Result<()> {
        self.check_unlocked("set_fixed_rotation")?;
        let body = self.bodies.get_mut(handle).ok_or(Error::InvalidBody(handle))?;
        if body.is_fixed_rotation() == flag {
            return Ok(());
        }

        body.flags.set(BodyFlags::FIXED_ROTATION, flag);
        body.angular_velocity = 0.0;
        body.reset_mass_data(&self.fixtures);
        Ok(())
    }

    /// Overrides the mass properties of a dynamic body
    pub fn set_mass_data(&mut self, handle: BodyHandle, data: &MassData) -> Result<()> {
        self.check_unlocked("set_mass_data")?;
        let body = self.bodies.get_mut(handle).ok_or(Error::InvalidBody(handle))?;
        body.set_mass_data(data);
        Ok(())
    }

    /// Recomputes the mass properties from the fixture densities
    pub fn reset_mass_data(&mut self, handle: BodyHandle) -> Result<()> {
        self.check_unlocked("reset_mass_data")?;
        let body = self.bodies.get_mut(handle).ok_or(Error::InvalidBody(handle))?;
        body.reset_mass_data(&self.fixtures);
        Ok(())
    }

    // Fixtures

    /// Attaches a shape to a body. Contacts for the new fixture appear at the
    /// start of the next step.
    pub fn create_fixture(&mut self, body_handle: BodyHandle, def: &FixtureDef) -> Result<FixtureHandle> {
        self.check_unlocked("create_fixture")?;
        let body = self.bodies.get_mut(body_handle).ok_or(Error::InvalidBody(body_handle))?;

        let handle = self.fixtures.insert(Fixture::new(body_handle, def));
        if body.is_enabled() {
            if let Some(fixture) = self.fixtures.get_mut(handle) {
                fixture.create_proxies(handle, &mut self.contact_manager.broad_phase, body.xf);
            }
        }

        body.fixtures.push(handle);
        if def.density > 0.0 {
            body.reset_mass_data(&self.fixtures);
        }

        self.new_contacts = true;
        debug!(?handle, body = ?body_handle, shape = ?def.shape.shape_type(), "created fixture");
        Ok(handle)
    }

    /// Attaches every segment of a chain as its own one-sided edge fixture.
    /// Each edge keeps its neighbors as ghost vertices, so shapes sliding
    /// over the seams do not catch on interior corners.
    pub fn create_chain_links(
        &mut self,
        body_handle: BodyHandle,
        chain: &ChainShape,
        def: &FixtureDef,
    ) -> Result<Vec<FixtureHandle>> {
        self.check_unlocked("create_chain_links")?;
        if !self.bodies.contains_key(body_handle) {
            return Err(Error::InvalidBody(body_handle));
        }

        let mut link = def.clone();
        (0..chain.child_count())
            .map(|index| {
                link.shape = chain.child_edge(index).into();
                self.create_fixture(body_handle, &link)
            })
            .collect()
    }

    /// Detaches and destroys a fixture, destroying its contacts and updating
    /// the body mass
    pub fn destroy_fixture(&mut self, handle: FixtureHandle) -> Result<()> {
        self.check_unlocked("destroy_fixture")?;
        let body_handle = self.fixtures.get(handle).ok_or(Error::InvalidFixture(handle))?.body;

        let doomed: Vec<ContactHandle> = self
            .bodies
            .get(body_handle)
            .map(|body| {
                body.contact_edges
                    .iter()
                    .filter(|edge| {
                        self.contact_manager
                            .contacts
                            .get(edge.contact)
                            .is_some_and(|c| c.fixture_a == handle || c.fixture_b == handle)
                    })
                    .map(|edge| edge.contact)
                    .collect()
            })
            .unwrap_or_default();

        for contact in doomed {
            self.contact_manager.destroy(contact, &mut self.bodies, &self.fixtures);
        }

        if let Some(mut fixture) = self.fixtures.remove(handle) {
            fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
        }

        if let Some(body) = self.bodies.get_mut(body_handle) {
            body.fixtures.retain(|&f| f != handle);
            body.reset_mass_data(&self.fixtures);
        }

        debug!(?handle, body = ?body_handle, "destroyed fixture");
        Ok(())
    }

    #[inline]
    pub fn fixture(&self, handle: FixtureHandle) -> Option<&Fixture> {
        self.fixtures.get(handle)
    }

    /// Mutable access for material properties. Density changes take effect
    /// after [`World::reset_mass_data`].
    #[inline]
    pub fn fixture_mut(&mut self, handle: FixtureHandle) -> Option<&mut Fixture> {
        self.fixtures.get_mut(handle)
    }

    pub fn fixtures(&self) -> impl Iterator<Item = (FixtureHandle, &Fixture)> + '_ {
        self.fixtures.iter()
    }

    /// Replaces the collision filter. Existing contacts are re-filtered on
    /// the next step.
    pub fn set_filter_data(&mut self, handle: FixtureHandle, filter: Filter) -> Result<()> {
        let fixture = self.fixtures.get_mut(handle).ok_or(Error::InvalidFixture(handle))?;
        fixture.filter = filter;
        self.refilter(handle);
        Ok(())
    }

    /// Flags the fixture's contacts for filtering and touches its proxies so
    /// pairs the old filter rejected get another chance
    pub fn refilter(&mut self, handle: FixtureHandle) {
        let Some(fixture) = self.fixtures.get(handle) else {
            return;
        };

        if let Some(body) = self.bodies.get(fixture.body) {
            for edge in &body.contact_edges {
                if let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact) {
                    if contact.fixture_a == handle || contact.fixture_b == handle {
                        contact.flag_for_filtering();
                    }
                }
            }
        }

        fixture.touch_proxies(&mut self.contact_manager.broad_phase);
    }

    /// Turns a fixture into a sensor or back. Wakes the body.
    pub fn set_sensor(&mut self, handle: FixtureHandle, flag: bool) -> Result<()> {
        let fixture = self.fixtures.get_mut(handle).ok_or(Error::InvalidFixture(handle))?;
        if fixture.is_sensor != flag {
            fixture.is_sensor = flag;
            if let Some(body) = self.bodies.get_mut(fixture.body) {
                body.set_awake(true);
            }
        }
        Ok(())
    }

    /// The enlarged AABB the broad-phase stores for one child of a fixture
    pub fn fixture_fat_aabb(&self, handle: FixtureHandle, child_index: usize) -> Option<Aabb> {
        let fixture = self.fixtures.get(handle)?;
        let proxy = fixture.proxies.iter().find(|p| p.child_index == child_index)?;
        Some(self.contact_manager.broad_phase.fat_aabb(proxy.proxy_id))
    }

    // Joints

    /// Creates a joint. Unless the joint allows it, contacts between the two
    /// bodies are dropped on the next step. The bodies are not woken.
    pub fn create_joint(&mut self, def: impl Into<JointDef>) -> Result<JointHandle> {
        self.check_unlocked("create_joint")?;
        let def = def.into();

        let joint = Joint::new(&def, &self.bodies, &self.joints).map_err(|err| {
            warn!(%err, joint_type = ?def.joint_type(), "rejected joint definition");
            err
        })?;

        let body_a = joint.body_a;
        let body_b = joint.body_b;
        let collide_connected = joint.collide_connected;
        let handle = self.joints.insert(joint);

        if let Some(a) = self.bodies.get_mut(body_a) {
            a.joint_edges.push(JointEdge { other: body_b, joint: handle });
        }
        if let Some(b) = self.bodies.get_mut(body_b) {
            b.joint_edges.push(JointEdge { other: body_a, joint: handle });
        }

        if !collide_connected {
            self.flag_contacts_between(body_a, body_b);
        }

        debug!(?handle, joint_type = ?def.joint_type(), "created joint");
        Ok(handle)
    }

    /// Destroys a joint and wakes both bodies. Gear joints coupling this
    /// joint must be destroyed first.
    pub fn destroy_joint(&mut self, handle: JointHandle) -> Result<()> {
        self.check_unlocked("destroy_joint")?;
        if !self.joints.contains_key(handle) {
            return Err(Error::InvalidJoint(handle));
        }

        self.remove_joint(handle);
        debug!(?handle, "destroyed joint");
        Ok(())
    }

    fn remove_joint(&mut self, handle: JointHandle) {
        let Some(joint) = self.joints.remove(handle) else {
            return;
        };

        for body_handle in [joint.body_a, joint.body_b] {
            if let Some(body) = self.bodies.get_mut(body_handle) {
                body.set_awake(true);
                body.joint_edges.retain(|edge| edge.joint != handle);
            }
        }

        if !joint.collide_connected {
            self.flag_contacts_between(joint.body_a, joint.body_b);
        }
    }

    /// Flags the contacts between two bodies for filtering
    fn flag_contacts_between(&mut self, body_a: BodyHandle, body_b: BodyHandle) {
        let Some(b) = self.bodies.get(body_b) else {
            return;
        };

        for edge in b.contact_edges.iter().filter(|edge| edge.other == body_a) {
            if let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact) {
                contact.flag_for_filtering();
            }
        }
    }

    #[inline]
    pub fn joint(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle)
    }

    /// Mutable access to a joint. Pass `wake` to wake both bodies, which
    /// changes to targets, motors and limits usually need.
    pub fn joint_mut(&mut self, handle: JointHandle, wake: bool) -> Option<&mut Joint> {
        let joint = self.joints.get_mut(handle)?;
        if wake {
            for body_handle in [joint.body_a, joint.body_b] {
                if let Some(body) = self.bodies.get_mut(body_handle) {
                    body.set_awake(true);
                }
            }
        }
        Some(joint)
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointHandle, &Joint)> + '_ {
        self.joints.iter()
    }

    // Contacts

    /// Every contact, touching or not
    pub fn contacts(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> + '_ {
        self.contact_manager.contacts.iter()
    }

    #[inline]
    pub fn contact(&self, handle: ContactHandle) -> Option<&Contact> {
        self.contact_manager.contacts.get(handle)
    }

    /// Mutable access for overrides. Overrides last until the contact is
    /// destroyed, except `set_enabled` which only holds for the current step.
    #[inline]
    pub fn contact_mut(&mut self, handle: ContactHandle) -> Option<&mut Contact> {
        self.contact_manager.contacts.get_mut(handle)
    }

    /// The contact manifold in world coordinates
    pub fn world_manifold(&self, handle: ContactHandle) -> Option<WorldManifold> {
        let contact = self.contact_manager.contacts.get(handle)?;
        let fixture_a = self.fixtures.get(contact.fixture_a)?;
        let fixture_b = self.fixtures.get(contact.fixture_b)?;
        let body_a = self.bodies.get(contact.body_a)?;
        let body_b = self.bodies.get(contact.body_b)?;

        Some(WorldManifold::new(
            &contact.manifold,
            body_a.xf,
            fixture_a.shape.radius(),
            body_b.xf,
            fixture_b.shape.radius(),
        ))
    }

    /// Restores the mixed friction of the two fixtures
    pub fn reset_contact_friction(&mut self, handle: ContactHandle) -> Result<()> {
        let (a, b) = self.contact_fixtures(handle)?;
        let friction = mix_friction(a.friction, b.friction);
        if let Some(contact) = self.contact_manager.contacts.get_mut(handle) {
            contact.friction = friction;
        }
        Ok(())
    }

    /// Restores the mixed restitution and restitution threshold of the two
    /// fixtures
    pub fn reset_contact_restitution(&mut self, handle: ContactHandle) -> Result<()> {
        let (a, b) = self.contact_fixtures(handle)?;
        let restitution = mix_restitution(a.restitution, b.restitution);
        let threshold = mix_restitution_threshold(a.restitution_threshold, b.restitution_threshold);
        if let Some(contact) = self.contact_manager.contacts.get_mut(handle) {
            contact.restitution = restitution;
            contact.restitution_threshold = threshold;
        }
        Ok(())
    }

    fn contact_fixtures(&self, handle: ContactHandle) -> Result<(&Fixture, &Fixture)> {
        let contact = self
            .contact_manager
            .contacts
            .get(handle)
            .ok_or(Error::InvalidParameter("contact does not exist"))?;
        let a = self.fixtures.get(contact.fixture_a).ok_or(Error::InvalidFixture(contact.fixture_a))?;
        let b = self.fixtures.get(contact.fixture_b).ok_or(Error::InvalidFixture(contact.fixture_b))?;
        Ok((a, b))
    }

    // Statistics

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    pub fn contact_count(&self) -> usize {
        self.contact_manager.contact_count()
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.contact_manager.broad_phase.proxy_count()
    }

    pub fn tree_height(&self) -> i32 {
        self.contact_manager.broad_phase.tree_height()
    }

    pub fn tree_balance(&self) -> i32 {
        self.contact_manager.broad_phase.tree_balance()
    }

    /// Ratio of the summed node perimeters to the root perimeter
    pub fn tree_quality(&self) -> f32 {
        self.contact_manager.broad_phase.tree_quality()
    }

    #[inline]
    pub fn broad_phase(&self) -> &BroadPhase<FixtureProxyKey> {
        &self.contact_manager.broad_phase
    }

    // Misc

    /// Zeroes the accumulated forces and torques of every body. Called after
    /// each step unless `auto_clear_forces` is off.
    pub fn clear_forces(&mut self) {
        for body in self.bodies.values_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    /// Moves the world origin to `new_origin`. Every stored world position is
    /// rebased, which keeps precision in large worlds.
    pub fn shift_origin(&mut self, new_origin: Vec2) -> Result<()> {
        self.check_unlocked("shift_origin")?;

        for body in self.bodies.values_mut() {
            body.shift_origin(new_origin);
        }

        for fixture in self.fixtures.values_mut() {
            for proxy in &mut fixture.proxies {
                proxy.aabb = proxy.aabb.translate(-new_origin);
            }
        }

        for joint in self.joints.values_mut() {
            joint.shift_origin(new_origin);
        }

        self.contact_manager.broad_phase.shift_origin(new_origin);
        debug!(x = new_origin.x, y = new_origin.y, "shifted world origin");
        Ok(())
    }

    /// Forces the world into the locked state a panicking callback leaves
    /// behind
    #[cfg(test)]
    pub(crate) fn set_locked(&mut self, flag: bool) {
        self.locked = flag;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::DestructionListener;
    use crate::geometry::{PolygonShape, Shape};
    use crate::joints::{DistanceJointDef, RevoluteJointDef};
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn world_with_ground() -> (World, BodyHandle) {
        let mut world = World::default();
        let ground = world.create_body(&BodyDef::default()).unwrap();
        world
            .create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(10.0, 0.5)))
            .unwrap();
        (world, ground)
    }

    fn dynamic_box(world: &mut World, position: Vec2) -> (BodyHandle, FixtureHandle) {
        let body = world.create_body(&BodyDef::dynamic().with_position(position)).unwrap();
        let fixture = world
            .create_fixture(body, &FixtureDef::new(Shape::cuboid(0.5, 0.5)).with_density(1.0))
            .unwrap();
        (body, fixture)
    }

    #[derive(Default)]
    struct Goodbyes {
        joints: Vec<JointHandle>,
        fixtures: Vec<FixtureHandle>,
    }

    struct Recorder(Rc<RefCell<Goodbyes>>);

    impl DestructionListener for Recorder {
        fn say_goodbye_joint(&mut self, joint: JointHandle) {
            self.0.borrow_mut().joints.push(joint);
        }

        fn say_goodbye_fixture(&mut self, fixture: FixtureHandle) {
            self.0.borrow_mut().fixtures.push(fixture);
        }
    }

    #[test]
    fn test_world_creation() {
        let world = World::new(Vec2::new(0.0, -9.8));
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.gravity(), Vec2::new(0.0, -9.8));
        assert!(world.allow_sleeping());
        assert!(world.continuous_physics());
        assert!(!world.is_locked());
    }

    #[test]
    fn test_create_body_and_fixture() {
        let (mut world, _) = world_with_ground();
        let (body, fixture) = dynamic_box(&mut world, Vec2::new(0.0, 4.0));

        assert_eq!(world.body_count(), 2);
        assert_eq!(world.fixture_count(), 2);
        assert_eq!(world.proxy_count(), 2);
        assert_eq!(world.fixture(fixture).unwrap().body(), body);
        assert_relative_eq!(world.body(body).unwrap().mass(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_body_def_rejected() {
        let mut world = World::default();
        let def = BodyDef::dynamic().with_angular_damping(-1.0);
        assert_eq!(world.create_body(&def), Err(Error::InvalidParameter("body definition")));
    }

    #[test]
    fn test_locked_world_rejects_mutation() {
        let (mut world, ground) = world_with_ground();
        world.set_locked(true);

        assert_eq!(world.create_body(&BodyDef::default()), Err(Error::Locked));
        assert_eq!(world.destroy_body(ground), Err(Error::Locked));
        assert_eq!(
            world.create_fixture(ground, &FixtureDef::default()),
            Err(Error::Locked)
        );
        assert_eq!(world.body_count(), 1);

        world.set_locked(false);
        assert!(world.destroy_body(ground).is_ok());
    }

    #[test]
    fn test_stale_handles() {
        let (mut world, ground) = world_with_ground();
        world.destroy_body(ground).unwrap();

        assert!(world.body(ground).is_none());
        assert_eq!(world.destroy_body(ground), Err(Error::InvalidBody(ground)));
        assert_eq!(world.proxy_count(), 0);
    }

    #[test]
    fn test_destroy_body_cascades() {
        let (mut world, ground) = world_with_ground();
        let (body, fixture) = dynamic_box(&mut world, Vec2::new(0.0, 1.0));
        let def = RevoluteJointDef::initialize(
            ground,
            world.body(ground).unwrap(),
            body,
            world.body(body).unwrap(),
            Vec2::new(0.0, 1.0),
        );
        let joint = world.create_joint(def).unwrap();

        let log = Rc::new(RefCell::new(Goodbyes::default()));
        world.set_destruction_listener(Recorder(log.clone()));

        world.step(1.0 / 60.0, 8, 3);
        world.destroy_body(body).unwrap();

        assert_eq!(log.borrow().joints, vec![joint]);
        assert_eq!(log.borrow().fixtures, vec![fixture]);
        assert_eq!(world.joint_count(), 0);
        assert_eq!(world.contact_count(), 0);
        assert!(world.body(ground).unwrap().joint_edges().is_empty());
        assert!(world.body(ground).unwrap().contact_edges().is_empty());
    }

    #[test]
    fn test_destroy_fixture_resets_mass() {
        let mut world = World::default();
        let (body, fixture) = dynamic_box(&mut world, Vec2::ZERO);
        world
            .create_fixture(body, &FixtureDef::new(Shape::circle(0.5)).with_density(0.0))
            .unwrap();

        world.destroy_fixture(fixture).unwrap();

        let body = world.body(body).unwrap();
        assert_eq!(body.fixtures().len(), 1);
        // Only a massless circle is left.
        assert_eq!(body.mass(), 0.0);
        assert_eq!(world.proxy_count(), 1);
    }

    #[test]
    fn test_joint_edges_and_destroy_wakes() {
        let mut world = World::default();
        let (a, _) = dynamic_box(&mut world, Vec2::ZERO);
        let (b, _) = dynamic_box(&mut world, Vec2::new(2.0, 0.0));

        let def = DistanceJointDef::initialize(
            a,
            world.body(a).unwrap(),
            b,
            world.body(b).unwrap(),
            Vec2::ZERO,
            Vec2::new(2.0, 0.0),
        );
        let joint = world.create_joint(def).unwrap();
        assert_eq!(world.body(a).unwrap().joint_edges()[0].other, b);
        assert_eq!(world.body(b).unwrap().joint_edges()[0].joint, joint);

        world.body_mut(a).unwrap().set_awake(false);
        world.destroy_joint(joint).unwrap();

        assert!(world.body(a).unwrap().is_awake());
        assert!(world.body(a).unwrap().joint_edges().is_empty());
        assert_eq!(world.destroy_joint(joint), Err(Error::InvalidJoint(joint)));
    }

    #[test]
    fn test_joint_on_same_body_rejected() {
        let mut world = World::default();
        let (a, _) = dynamic_box(&mut world, Vec2::ZERO);
        let def = DistanceJointDef { body_a: a, body_b: a, ..DistanceJointDef::default() };
        let result = world.create_joint(def);
        assert_eq!(result, Err(Error::SameBody));
        assert_eq!(world.joint_count(), 0);
    }

    #[test]
    fn test_set_allow_sleeping_wakes_bodies() {
        let mut world = World::default();
        let (body, _) = dynamic_box(&mut world, Vec2::ZERO);
        world.body_mut(body).unwrap().set_awake(false);

        world.set_allow_sleeping(false);
        assert!(world.body(body).unwrap().is_awake());
    }

    #[test]
    fn test_set_transform_moves_proxy() {
        let mut world = World::default();
        let (body, fixture) = dynamic_box(&mut world, Vec2::ZERO);

        world.set_transform(body, Vec2::new(5.0, 0.0), 0.0).unwrap();

        let aabb = world.fixture_fat_aabb(fixture, 0).unwrap();
        assert!(aabb.contains_point(Vec2::new(5.0, 0.0)));
        assert_relative_eq!(world.body(body).unwrap().position().x, 5.0);
    }

    #[test]
    fn test_set_body_type_to_static_stops_body() {
        let mut world = World::default();
        let (body, _) = dynamic_box(&mut world, Vec2::ZERO);
        world.body_mut(body).unwrap().set_linear_velocity(Vec2::new(1.0, 0.0));

        world.set_body_type(body, BodyType::Static).unwrap();

        let body = world.body(body).unwrap();
        assert_eq!(body.body_type(), BodyType::Static);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.mass(), 0.0);
        assert!(!body.is_awake());
    }

    #[test]
    fn test_disable_body_removes_proxies() {
        let (mut world, _) = world_with_ground();
        let (body, _) = dynamic_box(&mut world, Vec2::new(0.0, 0.9));
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 1);

        world.set_body_enabled(body, false).unwrap();
        assert_eq!(world.proxy_count(), 1);
        assert_eq!(world.contact_count(), 0);

        world.set_body_enabled(body, true).unwrap();
        assert_eq!(world.proxy_count(), 2);
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 1);
    }

    #[test]
    fn test_fixed_rotation_clears_inertia() {
        let mut world = World::default();
        let (body, _) = dynamic_box(&mut world, Vec2::ZERO);
        world.body_mut(body).unwrap().set_angular_velocity(3.0);

        world.set_fixed_rotation(body, true).unwrap();

        let body = world.body(body).unwrap();
        assert!(body.is_fixed_rotation());
        assert_eq!(body.angular_velocity(), 0.0);
        assert_eq!(body.inertia(), 0.0);
    }

    #[test]
    fn test_filter_change_drops_contact() {
        let (mut world, _) = world_with_ground();
        let (_, fixture) = dynamic_box(&mut world, Vec2::new(0.0, 0.9));
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 1);

        let filter = Filter { group_index: 0, mask_bits: 0, ..Filter::default() };
        world.set_filter_data(fixture, filter).unwrap();
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 0);
    }

    #[test]
    fn test_contact_overrides_reset() {
        let (mut world, _) = world_with_ground();
        dynamic_box(&mut world, Vec2::new(0.0, 0.9));
        world.step(1.0 / 60.0, 8, 3);

        let (handle, contact) = world.contacts().next().unwrap();
        let mixed = contact.friction();
        world.contact_mut(handle).unwrap().set_friction(0.0);
        world.reset_contact_friction(handle).unwrap();
        assert_relative_eq!(world.contact(handle).unwrap().friction(), mixed);

        let manifold = world.world_manifold(handle).unwrap();
        assert_relative_eq!(manifold.normal.y.abs(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_shift_origin_rebases_bodies() {
        let mut world = World::default();
        let (body, fixture) = dynamic_box(&mut world, Vec2::new(100.0, 50.0));

        world.shift_origin(Vec2::new(100.0, 0.0)).unwrap();

        let body = world.body(body).unwrap();
        assert_relative_eq!(body.position().x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(body.world_center().y, 50.0, epsilon = 1e-5);
        let aabb = world.fixture_fat_aabb(fixture, 0).unwrap();
        assert!(aabb.contains_point(Vec2::new(0.0, 50.0)));
    }

    #[test]
    fn test_clear_forces() {
        let mut world = World::default();
        world.set_auto_clear_forces(false);
        let (body, _) = dynamic_box(&mut world, Vec2::ZERO);
        world.body_mut(body).unwrap().apply_force_to_center(Vec2::new(5.0, 0.0), true);

        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.body(body).unwrap().force(), Vec2::new(5.0, 0.0));

        world.clear_forces();
        assert_eq!(world.body(body).unwrap().force(), Vec2::ZERO);
    }

    #[test]
    fn test_locked_world_rejects_mass_changes() {
        let (mut world, _) = world_with_ground();
        let (body, _) = dynamic_box(&mut world, Vec2::new(0.0, 2.0));
        world.set_locked(true);

        assert_eq!(world.set_fixed_rotation(body, true), Err(Error::Locked));
        assert_eq!(world.reset_mass_data(body), Err(Error::Locked));
        assert_eq!(world.set_mass_data(body, &MassData::default()), Err(Error::Locked));
        assert!(!world.body(body).unwrap().is_fixed_rotation());

        world.set_locked(false);
        assert!(world.set_fixed_rotation(body, true).is_ok());
    }

    #[test]
    fn test_chain_links_become_one_sided_edges() {
        let mut world = World::default();
        let ground = world.create_body(&BodyDef::default()).unwrap();
        let chain = ChainShape::new_loop(&[
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ])
        .unwrap();

        let links = world
            .create_chain_links(ground, &chain, &FixtureDef::new(Shape::cuboid(0.1, 0.1)))
            .unwrap();

        assert_eq!(links.len(), chain.child_count());
        assert_eq!(world.body(ground).unwrap().fixtures().len(), 4);
        for (index, &link) in links.iter().enumerate() {
            match world.fixture(link).unwrap().shape() {
                Shape::Edge(edge) => assert_eq!(*edge, chain.child_edge(index)),
                other => panic!("expected an edge, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_box_slides_over_chain_link_seams() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let ground = world.create_body(&BodyDef::default()).unwrap();
        // Runs from +x to -x so the solid side faces up
        let vertices: Vec<Vec2> = (0..=20).map(|i| Vec2::new(10.0 - i as f32, 0.0)).collect();
        let chain = ChainShape::new_chain(&vertices, Vec2::new(11.0, 0.0), Vec2::new(-11.0, 0.0)).unwrap();
        let links = world
            .create_chain_links(ground, &chain, &FixtureDef::new(chain.child_edge(0)).with_friction(0.0))
            .unwrap();
        assert_eq!(links.len(), 20);

        let slider = world
            .create_body(
                &BodyDef::dynamic()
                    .with_position(Vec2::new(-8.0, 0.52))
                    .with_linear_velocity(Vec2::new(5.0, 0.0)),
            )
            .unwrap();
        world
            .create_fixture(
                slider,
                &FixtureDef::new(Shape::cuboid(0.5, 0.5)).with_density(1.0).with_friction(0.0),
            )
            .unwrap();

        let mut touched = false;
        for _ in 0..120 {
            world.step(1.0 / 60.0, 8, 3);
            let normals: Vec<Vec2> = world
                .contacts()
                .filter(|(_, contact)| contact.is_touching())
                .filter_map(|(handle, _)| world.world_manifold(handle))
                .map(|manifold| manifold.normal)
                .collect();
            for normal in normals {
                touched = true;
                assert!(normal.x.abs() < 1e-3, "ghost normal {normal:?}");
            }
        }

        assert!(touched);
        let body = world.body(slider).unwrap();
        assert!(body.position().x > 1.5);
        assert!((body.position().y - 0.5).abs() < 0.05);
        assert_relative_eq!(body.linear_velocity().x, 5.0, epsilon = 0.05);
    }
}
