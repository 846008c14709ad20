use crate::math::{Transform, Vec2};

use super::{
    Aabb, ChainShape, CircleShape, EdgeShape, PolygonShape, RayCastInput, RayCastOutput,
};

/// The type of collision shape.
///
/// Contacts order their fixtures by type so that each shape pair maps to one
/// collision routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeType {
    Circle = 0,
    Edge = 1,
    Polygon = 2,
    Chain = 3,
}

/// A collision shape attached to a body through a fixture.
///
/// Geometry is immutable once attached; every query is a pure function of the
/// shape and the transform passed in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Shape {
    Circle(CircleShape),
    Edge(EdgeShape),
    Polygon(PolygonShape),
    Chain(ChainShape),
}

/// Mass properties of a shape
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassData {
    /// Total mass, usually in kilograms
    pub mass: f32,
    /// Center of mass relative to the shape origin
    pub center: Vec2,
    /// Rotational inertia about the shape origin
    pub inertia: f32,
}

impl Shape {
    /// Creates a circle centered on the body origin
    #[inline]
    pub fn circle(radius: f32) -> Self {
        Self::Circle(CircleShape::new(radius))
    }

    /// Creates an axis-aligned box from half-extents
    #[inline]
    pub fn cuboid(hx: f32, hy: f32) -> Self {
        Self::Polygon(PolygonShape::new_box(hx, hy))
    }

    /// Creates a two-sided segment
    #[inline]
    pub fn segment(v1: Vec2, v2: Vec2) -> Self {
        Self::Edge(EdgeShape::two_sided(v1, v2))
    }

    /// Returns the shape type
    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    /// Skin radius. Circles use their actual radius.
    #[inline]
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(s) => s.radius,
            Shape::Edge(s) => s.radius,
            Shape::Polygon(s) => s.radius,
            Shape::Chain(s) => s.radius,
        }
    }

    /// Number of children; one broad-phase proxy is created per child
    #[inline]
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(chain) => chain.child_count(),
            _ => 1,
        }
    }

    /// Tests a world point for containment. Edges and chains contain nothing.
    pub fn test_point(&self, xf: Transform, p: Vec2) -> bool {
        match self {
            Shape::Circle(s) => s.test_point(xf, p),
            Shape::Polygon(s) => s.test_point(xf, p),
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    /// Casts a ray against one child of the shape
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(s) => s.ray_cast(input, xf),
            Shape::Edge(s) => s.ray_cast(input, xf),
            Shape::Polygon(s) => s.ray_cast(input, xf),
            Shape::Chain(s) => s.ray_cast(input, xf, child_index),
        }
    }

    /// Computes the world AABB of one child
    pub fn compute_aabb(&self, xf: Transform, child_index: usize) -> Aabb {
        match self {
            Shape::Circle(s) => s.compute_aabb(xf),
            Shape::Edge(s) => s.compute_aabb(xf),
            Shape::Polygon(s) => s.compute_aabb(xf),
            Shape::Chain(s) => s.compute_aabb(xf, child_index),
        }
    }

    /// Computes mass properties from a density in mass per unit area
    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(s) => s.compute_mass(density),
            Shape::Edge(s) => s.compute_mass(density),
            Shape::Polygon(s) => s.compute_mass(density),
            Shape::Chain(s) => s.compute_mass(density),
        }
    }
}

impl From<CircleShape> for Shape {
    fn from(shape: CircleShape) -> Self {
        Shape::Circle(shape)
    }
}

impl From<EdgeShape> for Shape {
    fn from(shape: EdgeShape) -> Self {
        Shape::Edge(shape)
    }
}

impl From<PolygonShape> for Shape {
    fn from(shape: PolygonShape) -> Self {
        Shape::Polygon(shape)
    }
}

impl From<ChainShape> for Shape {
    fn from(shape: ChainShape) -> Self {
        Shape::Chain(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_counts() {
        assert_eq!(Shape::circle(1.0).child_count(), 1);
        assert_eq!(Shape::cuboid(1.0, 1.0).child_count(), 1);
        let chain = ChainShape::new_chain(
            &[Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0)],
            Vec2::new(-1.0, 0.0),
            Vec2::new(3.0, 1.0),
        )
        .unwrap();
        assert_eq!(Shape::from(chain).child_count(), 2);
    }

    #[test]
    fn test_clone_reproduces_queries() {
        let shapes = [
            Shape::circle(0.75),
            Shape::cuboid(0.5, 2.0),
            Shape::segment(Vec2::ZERO, Vec2::new(1.0, 1.0)),
        ];
        let xf = Transform::from_angle(Vec2::new(3.0, -1.0), 1.3);
        for shape in &shapes {
            let copy = shape.clone();
            assert_eq!(copy.compute_aabb(xf, 0), shape.compute_aabb(xf, 0));
            assert_eq!(copy.compute_mass(2.5), shape.compute_mass(2.5));
        }
    }

    #[test]
    fn test_type_order() {
        assert!(ShapeType::Circle < ShapeType::Edge);
        assert!(ShapeType::Polygon < ShapeType::Chain);
        assert_eq!(Shape::segment(Vec2::ZERO, Vec2::X).shape_type(), ShapeType::Edge);
        assert!(!Shape::segment(Vec2::ZERO, Vec2::X).test_point(Transform::IDENTITY, Vec2::ZERO));
    }
}
