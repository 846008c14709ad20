use slotmap::SlotMap;

use crate::callbacks::{ContactFilter, ContactListener};
use crate::collision::broad_phase::BroadPhase;
use crate::joints::{Joint, JointHandle};

use super::{Body, BodyHandle, BodyType, Contact, ContactEdge, ContactFlags, ContactHandle, Fixture, FixtureHandle, FixtureProxyKey};

/// Owns the broad-phase and every contact, and keeps manifolds current.
#[derive(Default)]
pub struct ContactManager {
    pub(crate) broad_phase: BroadPhase<FixtureProxyKey>,
    pub(crate) contacts: SlotMap<ContactHandle, Contact>,
    pub(crate) contact_filter: Option<Box<dyn ContactFilter>>,
    pub(crate) contact_listener: Option<Box<dyn ContactListener>>,
    scratch: Vec<ContactHandle>,
}

impl std::fmt::Debug for ContactManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactManager")
            .field("proxy_count", &self.broad_phase.proxy_count())
            .field("contact_count", &self.contacts.len())
            .field("has_filter", &self.contact_filter.is_some())
            .field("has_listener", &self.contact_listener.is_some())
            .finish()
    }
}

/// Applies the user filter, or the default filter bits when none is set
fn filter_allows(filter: &mut Option<Box<dyn ContactFilter>>, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
    match filter {
        Some(filter) => filter.should_collide(fixture_a, fixture_b),
        None => fixture_a.filter.should_collide(&fixture_b.filter),
    }
}

/// Creates a contact for a new broad-phase pair unless one already exists or
/// filtering rejects it.
fn add_pair(
    contacts: &mut SlotMap<ContactHandle, Contact>,
    filter: &mut Option<Box<dyn ContactFilter>>,
    bodies: &mut SlotMap<BodyHandle, Body>,
    fixtures: &SlotMap<FixtureHandle, Fixture>,
    joints: &SlotMap<JointHandle, Joint>,
    proxy_a: FixtureProxyKey,
    proxy_b: FixtureProxyKey,
) {
    let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(proxy_a.fixture), fixtures.get(proxy_b.fixture)) else {
        return;
    };

    let body_a = fixture_a.body;
    let body_b = fixture_b.body;

    // Are the fixtures on the same body?
    if body_a == body_b {
        return;
    }

    let (Some(a), Some(b)) = (bodies.get(body_a), bodies.get(body_b)) else {
        return;
    };

    // Does a contact already exist?
    let exists = b.contact_edges.iter().filter(|edge| edge.other == body_a).any(|edge| {
        contacts.get(edge.contact).is_some_and(|c| {
            let forward = c.fixture_a == proxy_a.fixture
                && c.fixture_b == proxy_b.fixture
                && c.child_a == proxy_a.child_index
                && c.child_b == proxy_b.child_index;
            let reverse = c.fixture_a == proxy_b.fixture
                && c.fixture_b == proxy_a.fixture
                && c.child_a == proxy_b.child_index
                && c.child_b == proxy_a.child_index;
            forward || reverse
        })
    });
    if exists {
        return;
    }

    // Does a joint override collision? Is at least one body dynamic?
    if !b.should_collide(body_a, a, joints) {
        return;
    }

    if !filter_allows(filter, fixture_a, fixture_b) {
        return;
    }

    let Some(contact) = Contact::new(
        proxy_a.fixture,
        fixture_a,
        proxy_a.child_index,
        proxy_b.fixture,
        fixture_b,
        proxy_b.child_index,
    ) else {
        return;
    };

    // Contact creation may swap fixtures.
    let (body_a, body_b) = (contact.body_a, contact.body_b);
    let handle = contacts.insert(contact);

    if let Some(a) = bodies.get_mut(body_a) {
        a.contact_edges.push(ContactEdge { other: body_b, contact: handle });
    }
    if let Some(b) = bodies.get_mut(body_b) {
        b.contact_edges.push(ContactEdge { other: body_a, contact: handle });
    }
}

impl ContactManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    #[inline]
    pub fn broad_phase(&self) -> &BroadPhase<FixtureProxyKey> {
        &self.broad_phase
    }

    /// Creates contacts for the pairs found since the last call
    pub(crate) fn find_new_contacts(
        &mut self,
        bodies: &mut SlotMap<BodyHandle, Body>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
        joints: &SlotMap<JointHandle, Joint>,
    ) {
        let Self { broad_phase, contacts, contact_filter, .. } = self;
        broad_phase.update_pairs(|a, b| add_pair(contacts, contact_filter, bodies, fixtures, joints, a, b));
    }

    /// Destroys a contact, firing `end_contact` first if it was touching
    pub(crate) fn destroy(
        &mut self,
        handle: ContactHandle,
        bodies: &mut SlotMap<BodyHandle, Body>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
    ) {
        let Some(contact) = self.contacts.remove(handle) else {
            return;
        };

        if contact.is_touching() {
            if let Some(listener) = self.contact_listener.as_mut() {
                listener.end_contact(&contact);
            }
        }

        let sensor = [contact.fixture_a, contact.fixture_b]
            .iter()
            .any(|&f| fixtures.get(f).is_some_and(|f| f.is_sensor));
        let wake = contact.manifold.point_count > 0 && !sensor;

        for body_handle in [contact.body_a, contact.body_b] {
            if let Some(body) = bodies.get_mut(body_handle) {
                body.contact_edges.retain(|edge| edge.contact != handle);
                if wake {
                    body.set_awake(true);
                }
            }
        }
    }

    /// Narrow phase for every contact: re-filters flagged contacts, drops
    /// contacts whose proxies stopped overlapping and updates the rest.
    pub(crate) fn collide(
        &mut self,
        bodies: &mut SlotMap<BodyHandle, Body>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
        joints: &SlotMap<JointHandle, Joint>,
    ) {
        let mut handles = std::mem::take(&mut self.scratch);
        handles.clear();
        handles.extend(self.contacts.keys());

        for &handle in &handles {
            let Some(contact) = self.contacts.get(handle) else {
                continue;
            };
            let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(contact.fixture_a), fixtures.get(contact.fixture_b))
            else {
                continue;
            };
            let (Some(body_a), Some(body_b)) = (bodies.get(contact.body_a), bodies.get(contact.body_b)) else {
                continue;
            };

            // Is this contact flagged for filtering?
            if contact.flags.contains(ContactFlags::FILTER) {
                let allowed = body_b.should_collide(contact.body_a, body_a, joints)
                    && filter_allows(&mut self.contact_filter, fixture_a, fixture_b);
                if !allowed {
                    self.destroy(handle, bodies, fixtures);
                    continue;
                }
                if let Some(contact) = self.contacts.get_mut(handle) {
                    contact.flags.remove(ContactFlags::FILTER);
                }
            }

            let active_a = body_a.is_awake() && body_a.body_type != BodyType::Static;
            let active_b = body_b.is_awake() && body_b.body_type != BodyType::Static;

            // At least one body must be awake and it must be dynamic or kinematic.
            if !active_a && !active_b {
                continue;
            }

            let Some(contact) = self.contacts.get(handle) else {
                continue;
            };
            let overlap = match (fixture_a.proxies.get(contact.child_a), fixture_b.proxies.get(contact.child_b)) {
                (Some(pa), Some(pb)) => self.broad_phase.test_overlap(pa.proxy_id, pb.proxy_id),
                _ => false,
            };

            // Destroy contacts that cease to overlap in the broad-phase.
            if !overlap {
                self.destroy(handle, bodies, fixtures);
                continue;
            }

            if let Some(contact) = self.contacts.get_mut(handle) {
                contact.update(fixture_a, fixture_b, bodies, &mut self.contact_listener);
            }
        }

        self.scratch = handles;
    }
}
