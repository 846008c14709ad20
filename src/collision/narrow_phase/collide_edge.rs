use super::manifold::{clip_segment_to_line, ClipVertex, ContactFeatureType, ContactId, Manifold, ManifoldType};
use crate::geometry::{CircleShape, EdgeShape, PolygonShape};
use crate::math::{Transform, Vec2};
use crate::settings::{MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES};

/// Computes the manifold between an edge and a circle, honoring the ghost
/// vertices of one-sided edges.
pub fn collide_edge_and_circle(edge_a: &EdgeShape, xf_a: Transform, circle_b: &CircleShape, xf_b: Transform) -> Manifold {
    let mut manifold = Manifold::default();

    // Compute circle in frame of edge
    let q = xf_a.inverse_transform_point(xf_b * circle_b.position);

    let a = edge_a.vertex1;
    let b = edge_a.vertex2;
    let e = b - a;

    // Normal points to the right for a CCW winding
    let mut n = Vec2::new(e.y, -e.x);
    let offset = n.dot(q - a);

    if edge_a.one_sided && offset < 0.0 {
        return manifold;
    }

    // Barycentric coordinates
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = edge_a.radius + circle_b.radius;

    let mut vertex_contact = |p: Vec2, index_a: u8| {
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = p;
        manifold.points[0].id = ContactId {
            index_a,
            ..ContactId::ZERO
        };
        manifold.points[0].local_point = circle_b.position;
    };

    // Region A
    if v <= 0.0 {
        if q.distance_squared(a) > radius * radius {
            return manifold;
        }

        // Is there an edge connected to A?
        if edge_a.one_sided {
            let e1 = a - edge_a.vertex0;
            let u1 = e1.dot(a - q);

            // Is the circle in Region AB of the previous edge?
            if u1 > 0.0 {
                return manifold;
            }
        }

        vertex_contact(a, 0);
        return manifold;
    }

    // Region B
    if u <= 0.0 {
        if q.distance_squared(b) > radius * radius {
            return manifold;
        }

        // Is there an edge connected to B?
        if edge_a.one_sided {
            let e2 = edge_a.vertex3 - b;
            let v2 = e2.dot(q - b);

            // Is the circle in Region AB of the next edge?
            if v2 > 0.0 {
                return manifold;
            }
        }

        vertex_contact(b, 1);
        return manifold;
    }

    // Region AB
    let den = e.dot(e);
    if den <= 0.0 {
        return manifold;
    }
    let p = (1.0 / den) * (u * a + v * b);
    if q.distance_squared(p) > radius * radius {
        return manifold;
    }

    if offset < 0.0 {
        n = -n;
    }

    manifold.point_count = 1;
    manifold.manifold_type = ManifoldType::FaceA;
    manifold.local_normal = n.normalize();
    manifold.local_point = a;
    manifold.points[0].id = ContactId {
        type_a: ContactFeatureType::Face,
        ..ContactId::ZERO
    };
    manifold.points[0].local_point = circle_b.position;

    manifold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisType {
    Unknown,
    EdgeA,
    EdgeB,
}

/// Best separating axis found so far
#[derive(Debug, Clone, Copy)]
struct SeparationAxis {
    normal: Vec2,
    axis_type: AxisType,
    index: usize,
    separation: f32,
}

/// Polygon B expressed in the frame of the edge
struct TempPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

impl TempPolygon {
    fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }
}

fn compute_edge_separation(polygon_b: &TempPolygon, v1: Vec2, normal1: Vec2) -> SeparationAxis {
    let mut axis = SeparationAxis {
        normal: Vec2::ZERO,
        axis_type: AxisType::EdgeA,
        index: 0,
        separation: f32::MIN,
    };

    // Find axis with least overlap (min-max problem)
    for (j, n) in [normal1, -normal1].into_iter().enumerate() {
        // Find deepest polygon vertex along axis j
        let sj = polygon_b
            .vertices()
            .iter()
            .map(|&v| n.dot(v - v1))
            .fold(f32::MAX, f32::min);

        if sj > axis.separation {
            axis.index = j;
            axis.separation = sj;
            axis.normal = n;
        }
    }

    axis
}

fn compute_polygon_separation(polygon_b: &TempPolygon, v1: Vec2, v2: Vec2) -> SeparationAxis {
    let mut axis = SeparationAxis {
        normal: Vec2::ZERO,
        axis_type: AxisType::Unknown,
        index: 0,
        separation: f32::MIN,
    };

    for (i, (&nb, &vb)) in polygon_b.normals().iter().zip(polygon_b.vertices()).enumerate() {
        let n = -nb;

        let s1 = n.dot(vb - v1);
        let s2 = n.dot(vb - v2);
        let s = s1.min(s2);

        if s > axis.separation {
            axis.axis_type = AxisType::EdgeB;
            axis.index = i;
            axis.separation = s;
            axis.normal = n;
        }
    }

    axis
}

/// Hysteresis that favors the edge axis, for jitter reduction
const RELATIVE_TOLERANCE: f32 = 0.98;
const ABSOLUTE_TOLERANCE: f32 = 0.001;

/// Normals within this angle of a neighbor's face are admitted on convex joints
const SIN_TOLERANCE: f32 = 0.1;

/// Computes the manifold between an edge and a polygon.
///
/// One-sided edges check the polygon's candidate normal against the Gauss map
/// of their neighbors so that a polygon sliding along a chain does not catch
/// on the internal vertices.
pub fn collide_edge_and_polygon(
    edge_a: &EdgeShape,
    xf_a: Transform,
    polygon_b: &PolygonShape,
    xf_b: Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let xf = xf_a.inv_mul(xf_b);

    let centroid_b = xf * polygon_b.centroid;

    let v1 = edge_a.vertex1;
    let v2 = edge_a.vertex2;

    let edge1 = (v2 - v1).normalize();

    // Normal points to the right for a CCW winding
    let normal1 = Vec2::new(edge1.y, -edge1.x);
    let offset1 = normal1.dot(centroid_b - v1);

    let one_sided = edge_a.one_sided;
    if one_sided && offset1 < 0.0 {
        return manifold;
    }

    // Get polygon_b in frame A
    let mut temp = TempPolygon {
        vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        count: polygon_b.count(),
    };
    for (i, (&v, &n)) in polygon_b.vertices().iter().zip(polygon_b.normals()).enumerate() {
        temp.vertices[i] = xf * v;
        temp.normals[i] = xf.q * n;
    }

    let radius = polygon_b.radius + edge_a.radius;

    let edge_axis = compute_edge_separation(&temp, v1, normal1);
    if edge_axis.separation > radius {
        return manifold;
    }

    let polygon_axis = compute_polygon_separation(&temp, v1, v2);
    if polygon_axis.separation > radius {
        return manifold;
    }

    let mut primary_axis = if polygon_axis.separation - radius
        > RELATIVE_TOLERANCE * (edge_axis.separation - radius) + ABSOLUTE_TOLERANCE
    {
        polygon_axis
    } else {
        edge_axis
    };

    if one_sided {
        // Smooth collision against the neighboring edges
        let edge0 = (v1 - edge_a.vertex0).normalize();
        let normal0 = Vec2::new(edge0.y, -edge0.x);
        let convex1 = edge0.cross(edge1) >= 0.0;

        let edge2 = (edge_a.vertex3 - v2).normalize();
        let normal2 = Vec2::new(edge2.y, -edge2.x);
        let convex2 = edge1.cross(edge2) >= 0.0;

        let side1 = primary_axis.normal.dot(edge1) <= 0.0;

        // Check Gauss Map
        if side1 {
            if convex1 {
                if primary_axis.normal.cross(normal0) > SIN_TOLERANCE {
                    // Skip region
                    return manifold;
                }
                // Admit region
            } else {
                // Snap region
                primary_axis = edge_axis;
            }
        } else if convex2 {
            if normal2.cross(primary_axis.normal) > SIN_TOLERANCE {
                // Skip region
                return manifold;
            }
            // Admit region
        } else {
            // Snap region
            primary_axis = edge_axis;
        }
    }

    let clip_points: [ClipVertex; 2];
    let (ref_i1, ref_i2, ref_v1, ref_v2, ref_normal, side_normal1, side_normal2);

    if primary_axis.axis_type == AxisType::EdgeA {
        manifold.manifold_type = ManifoldType::FaceA;

        // Search for the polygon normal that is most anti-parallel to the edge normal.
        let mut best_index = 0;
        let mut best_value = primary_axis.normal.dot(temp.normals[0]);
        for (i, &n) in temp.normals().iter().enumerate().skip(1) {
            let value = primary_axis.normal.dot(n);
            if value < best_value {
                best_value = value;
                best_index = i;
            }
        }

        let i1 = best_index;
        let i2 = if i1 + 1 < temp.count { i1 + 1 } else { 0 };

        let face_vertex = |index_b: usize| ClipVertex {
            v: temp.vertices[index_b],
            id: ContactId {
                index_a: 0,
                index_b: index_b as u8,
                type_a: ContactFeatureType::Face,
                type_b: ContactFeatureType::Vertex,
            },
        };
        clip_points = [face_vertex(i1), face_vertex(i2)];

        ref_i1 = 0;
        ref_i2 = 1;
        ref_v1 = v1;
        ref_v2 = v2;
        ref_normal = primary_axis.normal;
        side_normal1 = -edge1;
        side_normal2 = edge1;
    } else {
        manifold.manifold_type = ManifoldType::FaceB;

        let edge_vertex = |v: Vec2, index_a: u8| ClipVertex {
            v,
            id: ContactId {
                index_a,
                index_b: primary_axis.index as u8,
                type_a: ContactFeatureType::Vertex,
                type_b: ContactFeatureType::Face,
            },
        };
        clip_points = [edge_vertex(v2, 1), edge_vertex(v1, 0)];

        ref_i1 = primary_axis.index;
        ref_i2 = if ref_i1 + 1 < temp.count { ref_i1 + 1 } else { 0 };
        ref_v1 = temp.vertices[ref_i1];
        ref_v2 = temp.vertices[ref_i2];
        ref_normal = temp.normals[ref_i1];

        // CCW winding
        side_normal1 = Vec2::new(ref_normal.y, -ref_normal.x);
        side_normal2 = -side_normal1;
    }

    let side_offset1 = side_normal1.dot(ref_v1);
    let side_offset2 = side_normal2.dot(ref_v2);

    // Clip incident edge against reference face side planes
    let (clip_points1, np) = clip_segment_to_line(&clip_points, side_normal1, side_offset1, ref_i1);
    if np < MAX_MANIFOLD_POINTS {
        return manifold;
    }

    let (clip_points2, np) = clip_segment_to_line(&clip_points1, side_normal2, side_offset2, ref_i2);
    if np < MAX_MANIFOLD_POINTS {
        return manifold;
    }

    // Now clip_points2 contains the clipped points.
    if primary_axis.axis_type == AxisType::EdgeA {
        manifold.local_normal = ref_normal;
        manifold.local_point = ref_v1;
    } else {
        manifold.local_normal = polygon_b.normals()[ref_i1];
        manifold.local_point = polygon_b.vertices()[ref_i1];
    }

    let mut point_count = 0;
    for cv in &clip_points2 {
        let separation = ref_normal.dot(cv.v - ref_v1);

        if separation <= radius {
            let cp = &mut manifold.points[point_count];

            if primary_axis.axis_type == AxisType::EdgeA {
                cp.local_point = xf.inverse_transform_point(cv.v);
                cp.id = cv.id;
            } else {
                cp.local_point = cv.v;
                cp.id = cv.id.swapped();
            }

            point_count += 1;
        }
    }

    manifold.point_count = point_count;
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::narrow_phase::WorldManifold;
    use crate::geometry::ChainShape;
    use approx::assert_relative_eq;

    #[test]
    fn test_circle_on_edge_face() {
        let edge = EdgeShape::two_sided(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0));
        let ball = CircleShape::new(0.5);

        let above = Transform::from_angle(Vec2::new(0.5, 0.45), 0.0);
        let m = collide_edge_and_circle(&edge, Transform::IDENTITY, &ball, above);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.manifold_type, ManifoldType::FaceA);
        assert_relative_eq!(m.local_normal.y, 1.0);

        // Two-sided edges also collide from below
        let below = Transform::from_angle(Vec2::new(0.5, -0.45), 0.0);
        let m = collide_edge_and_circle(&edge, Transform::IDENTITY, &ball, below);
        assert_eq!(m.point_count, 1);
        assert_relative_eq!(m.local_normal.y, -1.0);
    }

    #[test]
    fn test_one_sided_edge_ignores_back() {
        // Right side of v1 -> v2 is +y when running from +x to -x
        let edge = EdgeShape::one_sided(
            Vec2::new(3.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::new(-3.0, 0.0),
        );
        let ball = CircleShape::new(0.5);

        let above = Transform::from_angle(Vec2::new(0.0, 0.45), 0.0);
        assert_eq!(collide_edge_and_circle(&edge, Transform::IDENTITY, &ball, above).point_count, 1);

        let below = Transform::from_angle(Vec2::new(0.0, -0.45), 0.0);
        assert_eq!(collide_edge_and_circle(&edge, Transform::IDENTITY, &ball, below).point_count, 0);
    }

    #[test]
    fn test_circle_at_chain_joint_reports_once() {
        let chain = ChainShape::new_chain(
            &[Vec2::new(2.0, 0.0), Vec2::new(0.0, 0.0), Vec2::new(-2.0, 0.0)],
            Vec2::new(4.0, 0.0),
            Vec2::new(-4.0, 0.0),
        )
        .unwrap();
        let ball = CircleShape::new(0.5);
        // Exactly above the shared vertex
        let xf_b = Transform::from_angle(Vec2::new(0.0, 0.45), 0.0);

        let total: usize = (0..chain.child_count())
            .map(|i| collide_edge_and_circle(&chain.child_edge(i), Transform::IDENTITY, &ball, xf_b).point_count)
            .sum();
        assert!(total >= 1);
    }

    #[test]
    fn test_box_on_edge() {
        let edge = EdgeShape::two_sided(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0));
        let block = PolygonShape::new_box(0.5, 0.5);
        let xf_b = Transform::from_angle(Vec2::new(0.0, 0.48), 0.0);

        let m = collide_edge_and_polygon(&edge, Transform::IDENTITY, &block, xf_b);
        assert_eq!(m.point_count, 2);

        let wm = WorldManifold::new(&m, Transform::IDENTITY, edge.radius, xf_b, block.radius);
        assert_relative_eq!(wm.normal.y, 1.0, epsilon = 1e-6);
        for s in wm.separations {
            assert!(s < 0.0);
        }
    }

    #[test]
    fn test_box_sliding_over_flat_chain_joint() {
        // A flat chain running right to left has its solid side down, so the
        // collision normal is up. The box straddles the internal vertex.
        let chain = ChainShape::new_chain(
            &[Vec2::new(4.0, 0.0), Vec2::new(0.0, 0.0), Vec2::new(-4.0, 0.0)],
            Vec2::new(8.0, 0.0),
            Vec2::new(-8.0, 0.0),
        )
        .unwrap();
        let block = PolygonShape::new_box(0.5, 0.5);
        let xf_b = Transform::from_angle(Vec2::new(0.2, 0.49), 0.0);

        for i in 0..chain.child_count() {
            let m = collide_edge_and_polygon(&chain.child_edge(i), Transform::IDENTITY, &block, xf_b);
            if m.point_count > 0 {
                let wm = WorldManifold::new(&m, Transform::IDENTITY, chain.radius, xf_b, block.radius);
                // Never a sideways normal from the internal vertex
                assert!(wm.normal.y > 0.99, "edge {i} normal {:?}", wm.normal);
            }
        }
    }
}
