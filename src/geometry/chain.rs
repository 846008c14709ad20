use crate::error::{Error, Result};
use crate::math::{Transform, Vec2};
use crate::settings::{LINEAR_SLOP, POLYGON_RADIUS};

use super::{Aabb, EdgeShape, MassData, RayCastInput, RayCastOutput};

/// A free-form sequence of line segments.
///
/// Each segment is a child with its own broad-phase proxy. Segments are
/// one-sided and know their neighbors, so bodies slide across the joints
/// without catching on internal vertices. Chains have no mass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainShape {
    vertices: Vec<Vec2>,
    prev_vertex: Vec2,
    next_vertex: Vec2,
    pub radius: f32,
}

impl ChainShape {
    /// A closed loop. The first vertex is repeated at the end automatically.
    pub fn new_loop(vertices: &[Vec2]) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(Error::ChainTooShort {
                min: 3,
                count: vertices.len(),
            });
        }
        check_spacing(vertices)?;

        let mut vs = Vec::with_capacity(vertices.len() + 1);
        vs.extend_from_slice(vertices);
        vs.push(vertices[0]);

        let prev_vertex = vs[vs.len() - 2];
        let next_vertex = vs[1];
        Ok(Self {
            vertices: vs,
            prev_vertex,
            next_vertex,
            radius: POLYGON_RADIUS,
        })
    }

    /// An open chain with ghost vertices before the first and after the last vertex
    pub fn new_chain(vertices: &[Vec2], prev_vertex: Vec2, next_vertex: Vec2) -> Result<Self> {
        if vertices.len() < 2 {
            return Err(Error::ChainTooShort {
                min: 2,
                count: vertices.len(),
            });
        }
        check_spacing(vertices)?;

        Ok(Self {
            vertices: vertices.to_vec(),
            prev_vertex,
            next_vertex,
            radius: POLYGON_RADIUS,
        })
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    #[inline]
    pub fn prev_vertex(&self) -> Vec2 {
        self.prev_vertex
    }

    #[inline]
    pub fn next_vertex(&self) -> Vec2 {
        self.next_vertex
    }

    /// One child per segment
    #[inline]
    pub fn child_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// The one-sided edge for segment `index`, with ghost vertices from its neighbors
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        debug_assert!(index < self.child_count());
        let count = self.vertices.len();

        let v0 = if index > 0 {
            self.vertices[index - 1]
        } else {
            self.prev_vertex
        };
        let v3 = if index + 2 < count {
            self.vertices[index + 2]
        } else {
            self.next_vertex
        };

        let mut edge = EdgeShape::one_sided(v0, self.vertices[index], self.vertices[index + 1], v3);
        edge.radius = self.radius;
        edge
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: Transform, child_index: usize) -> Option<RayCastOutput> {
        let (v1, v2) = self.segment(child_index);
        EdgeShape::two_sided(v1, v2).ray_cast(input, xf)
    }

    pub fn compute_aabb(&self, xf: Transform, child_index: usize) -> Aabb {
        let (v1, v2) = self.segment(child_index);
        let v1 = xf * v1;
        let v2 = xf * v2;
        Aabb::new(v1.min(v2), v1.max(v2)).expand(self.radius)
    }

    pub fn compute_mass(&self, _density: f32) -> MassData {
        MassData::default()
    }

    fn segment(&self, child_index: usize) -> (Vec2, Vec2) {
        let i1 = child_index;
        let i2 = if child_index + 1 == self.vertices.len() {
            0
        } else {
            child_index + 1
        };
        (self.vertices[i1], self.vertices[i2])
    }
}

fn check_spacing(vertices: &[Vec2]) -> Result<()> {
    for i in 1..vertices.len() {
        if vertices[i - 1].distance_squared(vertices[i]) <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(Error::ChainVerticesTooClose(i - 1, i));
        }
    }
    Ok(())
}
