//! Constraint solvers shared by the island.

mod contact_solver;

pub use contact_solver::{ContactConstraintDef, ContactSolver, ContactVelocityConstraint, VelocityConstraintPoint};
