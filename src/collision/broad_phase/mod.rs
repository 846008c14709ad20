//! Broad-phase collision detection

#[allow(clippy::module_inception)]
mod broad_phase;
mod dynamic_tree;

pub use broad_phase::BroadPhase;
pub use dynamic_tree::{DynamicTree, ProxyId, NULL_NODE};
