use std::time::Duration;

use crate::math::Vec2;

use super::Body;

/// Time step parameters shared by the solvers during one step or sub-step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeStep {
    /// Time step in seconds
    pub dt: f32,
    /// Inverse time step, zero when `dt` is zero
    pub inv_dt: f32,
    /// `dt * inv_dt0`, used to rescale warm-starting impulses when the step size varies
    pub dt_ratio: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
}

/// Position of a body's center of mass in the solver arrays
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub c: Vec2,
    pub a: f32,
}

/// Velocity of a body in the solver arrays
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub v: Vec2,
    pub w: f32,
}

/// Mass properties of one island body, copied out for a constraint
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverBody {
    /// Index into the island position and velocity arrays
    pub index: usize,
    pub local_center: Vec2,
    pub inv_mass: f32,
    pub inv_i: f32,
}

impl SolverBody {
    pub fn new(body: &Body) -> Self {
        Self {
            index: body.island_index,
            local_center: body.sweep.local_center,
            inv_mass: body.inv_mass,
            inv_i: body.inv_i,
        }
    }
}

/// Borrowed island state handed to joints and the contact solver
#[derive(Debug)]
pub struct SolverData<'a> {
    pub step: TimeStep,
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

/// Wall-clock timings of the last step, by phase
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Profile {
    pub step: Duration,
    pub collide: Duration,
    pub solve: Duration,
    pub solve_init: Duration,
    pub solve_velocity: Duration,
    pub solve_position: Duration,
    pub broadphase: Duration,
    pub solve_toi: Duration,
}
