mod aabb;
mod chain;
mod circle;
mod edge;
mod polygon;
mod ray;
mod shape;

pub use aabb::Aabb;
pub use chain::ChainShape;
pub use circle::CircleShape;
pub use edge::EdgeShape;
pub use polygon::PolygonShape;
pub use ray::{RayCastInput, RayCastOutput};
pub use shape::{MassData, Shape, ShapeType};
