pub mod broad_phase;
pub mod narrow_phase;

pub use broad_phase::{BroadPhase, DynamicTree, ProxyId};
pub use narrow_phase::{
    distance, shape_cast, test_overlap, time_of_impact, DistanceInput, DistanceOutput, DistanceProxy, Manifold,
    ManifoldPoint, ManifoldType, PointState, SimplexCache, ShapeCastInput, ShapeCastOutput, ToiInput, ToiOutput,
    ToiState, WorldManifold,
};
