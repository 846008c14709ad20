use thiserror::Error;

use crate::dynamics::{BodyHandle, FixtureHandle};
use crate::joints::JointHandle;

/// Errors surfaced by world mutation and shape construction.
///
/// The time step itself never fails; these only report rejected requests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("the world is locked while a time step is in progress")]
    Locked,

    #[error("body {0:?} does not exist")]
    InvalidBody(BodyHandle),

    #[error("fixture {0:?} does not exist")]
    InvalidFixture(FixtureHandle),

    #[error("joint {0:?} does not exist")]
    InvalidJoint(JointHandle),

    #[error("a joint must connect two distinct bodies")]
    SameBody,

    #[error("gear joints can only couple revolute or prismatic joints")]
    InvalidGearJoint,

    #[error("polygon is degenerate: {0}")]
    DegeneratePolygon(&'static str),

    #[error("chain needs at least {min} vertices, got {count}")]
    ChainTooShort { min: usize, count: usize },

    #[error("chain vertices {0} and {1} are too close together")]
    ChainVerticesTooClose(usize, usize),

    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

/// Result type alias for fallible engine operations
pub type Result<T> = std::result::Result<T, Error>;
