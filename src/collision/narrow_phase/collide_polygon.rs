use super::manifold::{clip_segment_to_line, ClipVertex, ContactFeatureType, ContactId, Manifold, ManifoldType};
use crate::geometry::PolygonShape;
use crate::math::Transform;
use crate::settings::LINEAR_SLOP;

/// Reference faces within this tolerance of each other prefer polygon A,
/// which keeps the reference face stable between steps.
const REFERENCE_FACE_TOLERANCE: f32 = 0.1 * LINEAR_SLOP;

/// Finds the max separation between `poly1` and `poly2` using the edge normals of `poly1`
fn find_max_separation(poly1: &PolygonShape, xf1: Transform, poly2: &PolygonShape, xf2: Transform) -> (usize, f32) {
    let xf = xf2.inv_mul(xf1);
    let v2s = poly2.vertices();

    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for (i, (&n1, &v1)) in poly1.normals().iter().zip(poly1.vertices()).enumerate() {
        // Get poly1 normal in frame2.
        let n = xf.q * n1;
        let v1 = xf * v1;

        // Find deepest point for normal i.
        let si = v2s.iter().map(|&v2| n.dot(v2 - v1)).fold(f32::MAX, f32::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }

    (best_index, max_separation)
}

fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: Transform,
) -> [ClipVertex; 2] {
    // Get the normal of the reference edge in poly2's frame.
    let normal1 = xf2.q.inv_rotate(xf1.q * poly1.normals()[edge1]);

    // Find the incident edge on poly2.
    let normals2 = poly2.normals();
    let mut index = 0;
    let mut min_dot = f32::MAX;
    for (i, &n2) in normals2.iter().enumerate() {
        let dot = normal1.dot(n2);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    // Build the clip vertices for the incident edge.
    let i1 = index;
    let i2 = if i1 + 1 < normals2.len() { i1 + 1 } else { 0 };

    let vertex = |i: usize| ClipVertex {
        v: xf2 * poly2.vertices()[i],
        id: ContactId {
            index_a: edge1 as u8,
            index_b: i as u8,
            type_a: ContactFeatureType::Face,
            type_b: ContactFeatureType::Vertex,
        },
    };

    [vertex(i1), vertex(i2)]
}

/// Computes the manifold between two polygons.
///
/// Finds the axis of least penetration on either polygon, picks the
/// reference face, then clips the incident edge against the reference
/// face's side planes. The normal points from A to B.
pub fn collide_polygons(poly_a: &PolygonShape, xf_a: Transform, poly_b: &PolygonShape, xf_b: Transform) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    let (poly1, xf1, poly2, xf2, edge1, flip) = if separation_b > separation_a + REFERENCE_FACE_TOLERANCE {
        manifold.manifold_type = ManifoldType::FaceB;
        (poly_b, xf_b, poly_a, xf_a, edge_b, true)
    } else {
        manifold.manifold_type = ManifoldType::FaceA;
        (poly_a, xf_a, poly_b, xf_b, edge_a, false)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let vertices1 = poly1.vertices();
    let iv1 = edge1;
    let iv2 = if edge1 + 1 < vertices1.len() { edge1 + 1 } else { 0 };

    let mut v11 = vertices1[iv1];
    let mut v12 = vertices1[iv2];

    let local_tangent = (v12 - v11).normalize();

    let local_normal = local_tangent.cross_scalar(1.0);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q * local_tangent;
    let normal = tangent.cross_scalar(1.0);

    v11 = xf1 * v11;
    v12 = xf1 * v12;

    // Face offset.
    let front_offset = normal.dot(v11);

    // Side offsets, extended by polytope skin thickness.
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    // Clip incident edge against extruded edge1 side edges.
    let (clip_points1, np) = clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1);
    if np < 2 {
        return manifold;
    }

    let (clip_points2, np) = clip_segment_to_line(&clip_points1, tangent, side_offset2, iv2);
    if np < 2 {
        return manifold;
    }

    // Now clip_points2 contains the clipped points.
    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for cv in &clip_points2 {
        let separation = normal.dot(cv.v) - front_offset;

        if separation <= total_radius {
            let cp = &mut manifold.points[point_count];
            cp.local_point = xf2.inverse_transform_point(cv.v);
            cp.id = if flip { cv.id.swapped() } else { cv.id };
            point_count += 1;
        }
    }

    manifold.point_count = point_count;
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::collision::narrow_phase::WorldManifold;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_resting_on_box() {
        let ground = PolygonShape::new_box(5.0, 0.5);
        let block = PolygonShape::new_box(0.5, 0.5);
        // Overlap by 0.05
        let xf_b = Transform::from_angle(Vec2::new(0.0, 0.95), 0.0);

        let m = collide_polygons(&ground, Transform::IDENTITY, &block, xf_b);
        assert_eq!(m.point_count, 2);
        assert_eq!(m.manifold_type, ManifoldType::FaceA);
        assert_relative_eq!(m.local_normal.y, 1.0);

        let wm = WorldManifold::new(&m, Transform::IDENTITY, ground.radius, xf_b, block.radius);
        assert_relative_eq!(wm.normal.y, 1.0);
        for s in wm.separations {
            assert_relative_eq!(s, -0.05 - 2.0 * ground.radius, epsilon = 1e-5);
        }
        assert_ne!(m.points[0].id.key(), m.points[1].id.key());
    }

    #[test]
    fn test_separated_boxes() {
        let a = PolygonShape::new_box(0.5, 0.5);
        let xf_b = Transform::from_angle(Vec2::new(1.2, 0.0), 0.0);
        assert_eq!(collide_polygons(&a, Transform::IDENTITY, &a, xf_b).point_count, 0);
    }

    #[test]
    fn test_flipped_reference_face() {
        // A tilted box corner dips into B's top face, so B owns the reference face
        let small = PolygonShape::new_box(0.5, 0.5);
        let big = PolygonShape::new_box(5.0, 0.5);
        let xf_a = Transform::from_angle(Vec2::ZERO, 0.1);
        let xf_b = Transform::from_angle(Vec2::new(0.0, -1.0), 0.0);

        let m = collide_polygons(&small, xf_a, &big, xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.manifold_type, ManifoldType::FaceB);

        // Normal still points from A to B
        let wm = WorldManifold::new(&m, xf_a, small.radius, xf_b, big.radius);
        assert_relative_eq!(wm.normal.y, -1.0);
        assert!(wm.separations[0] < 0.0);
    }

    #[test]
    fn test_rotated_box_corner() {
        let ground = PolygonShape::new_box(5.0, 0.5);
        let block = PolygonShape::new_box(0.5, 0.5);
        let half_diag = 0.5 * std::f32::consts::SQRT_2;
        let xf_b = Transform::from_angle(Vec2::new(0.0, 0.5 + half_diag - 0.02), std::f32::consts::FRAC_PI_4);

        let m = collide_polygons(&ground, Transform::IDENTITY, &block, xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.manifold_type, ManifoldType::FaceA);
    }
}
