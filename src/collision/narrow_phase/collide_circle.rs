use super::manifold::{ContactId, Manifold, ManifoldType};
use crate::geometry::{CircleShape, PolygonShape};
use crate::math::{Transform, Vec2};

/// Computes the manifold between two circles
pub fn collide_circles(circle_a: &CircleShape, xf_a: Transform, circle_b: &CircleShape, xf_b: Transform) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a * circle_a.position;
    let p_b = xf_b * circle_b.position;

    let dist_sqr = p_a.distance_squared(p_b);
    let radius = circle_a.radius + circle_b.radius;
    if dist_sqr > radius * radius {
        return manifold;
    }

    manifold.manifold_type = ManifoldType::Circles;
    manifold.local_point = circle_a.position;
    manifold.local_normal = Vec2::ZERO;
    manifold.point_count = 1;

    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactId::ZERO;

    manifold
}

/// Computes the manifold between a polygon and a circle.
///
/// The circle center is classified against the face of least penetration,
/// then against the Voronoi regions of that face's two vertices.
pub fn collide_polygon_and_circle(
    polygon_a: &PolygonShape,
    xf_a: Transform,
    circle_b: &CircleShape,
    xf_b: Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Compute circle position in the frame of the polygon.
    let c = xf_b * circle_b.position;
    let c_local = xf_a.inverse_transform_point(c);

    // Find the min separating edge.
    let mut normal_index = 0;
    let mut separation = f32::MIN;
    let radius = polygon_a.radius + circle_b.radius;
    let vertices = polygon_a.vertices();
    let normals = polygon_a.normals();

    for (i, (&v, &n)) in vertices.iter().zip(normals).enumerate() {
        let s = n.dot(c_local - v);

        if s > radius {
            // Early out.
            return manifold;
        }

        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    // Vertices that subtend the incident face.
    let vert_index1 = normal_index;
    let vert_index2 = if vert_index1 + 1 < vertices.len() { vert_index1 + 1 } else { 0 };
    let v1 = vertices[vert_index1];
    let v2 = vertices[vert_index2];

    let mut set_face = |normal: Vec2, point: Vec2| {
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = normal;
        manifold.local_point = point;
        manifold.points[0].local_point = circle_b.position;
        manifold.points[0].id = ContactId::ZERO;
    };

    // If the center is inside the polygon ...
    if separation < f32::EPSILON {
        set_face(normals[normal_index], 0.5 * (v1 + v2));
        return manifold;
    }

    // Compute barycentric coordinates
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if c_local.distance_squared(v1) > radius * radius {
            return manifold;
        }
        set_face((c_local - v1).normalize(), v1);
    } else if u2 <= 0.0 {
        if c_local.distance_squared(v2) > radius * radius {
            return manifold;
        }
        set_face((c_local - v2).normalize(), v2);
    } else {
        let face_center = 0.5 * (v1 + v2);
        let s = (c_local - face_center).dot(normals[vert_index1]);
        if s > radius {
            return manifold;
        }
        set_face(normals[vert_index1], face_center);
    }

    manifold
}
