//! Bodies, fixtures, contacts and the island solver.

mod body;
mod contact;
mod contact_manager;
mod fixture;
mod integrator;
mod island;
mod time_step;

pub use body::{Body, BodyDef, BodyFlags, BodyHandle, BodyType, ContactEdge, JointEdge};
pub use contact::{mix_friction, mix_restitution, mix_restitution_threshold, Contact, ContactFlags, ContactHandle};
pub use contact_manager::ContactManager;
pub use fixture::{Filter, Fixture, FixtureDef, FixtureHandle, FixtureProxy, FixtureProxyKey};
pub use integrator::{integrate_position, integrate_velocity};
pub use island::Island;
pub use time_step::{Position, Profile, SolverBody, SolverData, TimeStep, Velocity};

pub(crate) use island::IslandWorld;
