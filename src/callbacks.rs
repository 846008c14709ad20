//! User hooks into the simulation.
//!
//! Listeners are called during [`World::step`](crate::World::step) while the
//! world is locked, so they receive the contact itself rather than the world.

use crate::collision::narrow_phase::Manifold;
use crate::dynamics::{Contact, Fixture, FixtureHandle};
use crate::joints::JointHandle;
use crate::settings::MAX_MANIFOLD_POINTS;

/// Impulses applied by the solver at each manifold point. Useful for
/// measuring impact strength or breaking objects.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactImpulse {
    pub normal_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Decides whether two fixtures may form a contact.
///
/// Called when a new broad-phase pair is found and when a contact is flagged
/// for re-filtering.
pub trait ContactFilter {
    /// Returns true when contact calculations should be performed. The default
    /// applies the fixtures' [`Filter`](crate::dynamics::Filter) bits.
    fn should_collide(&mut self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        fixture_a.filter().should_collide(fixture_b.filter())
    }
}

/// Receives contact events.
///
/// `begin_contact` and `end_contact` fire on touching transitions, including
/// sensors. `pre_solve` runs after the manifold update and before the solver,
/// and may disable the contact for the current step. `post_solve` reports the
/// impulses of every touching, enabled, non-sensor contact after solving.
#[allow(unused_variables)]
pub trait ContactListener {
    fn begin_contact(&mut self, contact: &Contact) {}

    /// Also called when a touching contact is destroyed, so it may fire
    /// outside the time step.
    fn end_contact(&mut self, contact: &Contact) {}

    fn pre_solve(&mut self, contact: &mut Contact, old_manifold: &Manifold) {}

    fn post_solve(&mut self, contact: &Contact, impulse: &ContactImpulse) {}
}

/// Notified when joints and fixtures are destroyed implicitly because their
/// body or a connected body was destroyed.
#[allow(unused_variables)]
pub trait DestructionListener {
    fn say_goodbye_joint(&mut self, joint: JointHandle) {}

    fn say_goodbye_fixture(&mut self, fixture: FixtureHandle) {}
}
