//! Global tuning constants.
//!
//! These values are tuned for meters-kilograms-seconds units and moving objects
//! between 0.1 and 10 meters in size. Changing them materially affects stacking
//! stability.

use std::f32::consts::PI;

/// Maximum number of contact points between two convex shapes
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices on a convex polygon
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Fattening margin added to every broad-phase AABB
pub const AABB_EXTENSION: f32 = 0.1;

/// Scales the displacement used to predict fat AABB growth
pub const AABB_MULTIPLIER: f32 = 4.0;

/// Collision and constraint tolerance
pub const LINEAR_SLOP: f32 = 0.005;

/// Angular collision and constraint tolerance
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * PI;

/// Skin radius of polygons and edges
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// Maximum number of sub-steps per contact in continuous physics
pub const MAX_SUB_STEPS: u32 = 8;

/// Maximum number of contacts handled by one TOI island
pub const MAX_TOI_CONTACTS: usize = 32;

/// Maximum linear position correction per position iteration
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Maximum angular position correction per position iteration
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * PI;

/// Maximum linear translation of a body per step
pub const MAX_TRANSLATION: f32 = 2.0;
pub const MAX_TRANSLATION_SQUARED: f32 = MAX_TRANSLATION * MAX_TRANSLATION;

/// Maximum rotation of a body per step
pub const MAX_ROTATION: f32 = 0.5 * PI;
pub const MAX_ROTATION_SQUARED: f32 = MAX_ROTATION * MAX_ROTATION;

/// Fraction of the overlap resolved per position iteration
pub const BAUMGARTE: f32 = 0.2;
pub const TOI_BAUMGARTE: f32 = 0.75;

/// Seconds a body must be still before it can sleep
pub const TIME_TO_SLEEP: f32 = 0.5;

/// Linear speed below which a body may sleep
pub const LINEAR_SLEEP_TOLERANCE: f32 = 0.01;

/// Angular speed below which a body may sleep
pub const ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * PI;

/// GJK iteration cap
pub const MAX_DISTANCE_ITERATIONS: usize = 20;

/// Outer iteration cap of the time of impact solver
pub const MAX_TOI_ITERATIONS: usize = 20;

/// Root finder iteration cap of the time of impact solver
pub const MAX_TOI_ROOT_ITERATIONS: usize = 50;

/// Ill-conditioning threshold of the 2-point block solver
pub const MAX_CONDITION_NUMBER: f32 = 1000.0;

/// Restitution is suppressed below this relative normal speed
pub const DEFAULT_RESTITUTION_THRESHOLD: f32 = 1.0;
