//! Narrow-phase collision: contact manifolds, closest points, shape casts and
//! time of impact.

mod collide_circle;
mod collide_edge;
mod collide_polygon;
mod distance;
mod manifold;
mod shape_cast;
mod time_of_impact;

pub use collide_circle::{collide_circles, collide_polygon_and_circle};
pub use collide_edge::{collide_edge_and_circle, collide_edge_and_polygon};
pub use collide_polygon::collide_polygons;
pub use distance::{distance, test_overlap, DistanceInput, DistanceOutput, DistanceProxy, SimplexCache};
pub use manifold::{
    clip_segment_to_line, get_point_states, ClipVertex, ContactFeatureType, ContactId, Manifold, ManifoldPoint,
    ManifoldType, PointState, WorldManifold,
};
pub use shape_cast::{shape_cast, ShapeCastInput, ShapeCastOutput};
pub use time_of_impact::{time_of_impact, ToiInput, ToiOutput, ToiState};
