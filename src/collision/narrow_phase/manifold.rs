use crate::math::{Transform, Vec2};
use crate::settings::MAX_MANIFOLD_POINTS;

/// Whether a contact feature is a vertex or a face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ContactFeatureType {
    #[default]
    Vertex = 0,
    Face = 1,
}

/// The features that intersect to form a contact point.
///
/// Used to match points between steps for warm starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactId {
    /// Feature index on shape A
    pub index_a: u8,
    /// Feature index on shape B
    pub index_b: u8,
    pub type_a: ContactFeatureType,
    pub type_b: ContactFeatureType,
}

impl ContactId {
    pub const ZERO: Self = Self {
        index_a: 0,
        index_b: 0,
        type_a: ContactFeatureType::Vertex,
        type_b: ContactFeatureType::Vertex,
    };

    /// Packs the four features into a single comparable key
    #[inline]
    pub fn key(self) -> u32 {
        u32::from(self.index_a)
            | u32::from(self.index_b) << 8
            | (self.type_a as u32) << 16
            | (self.type_b as u32) << 24
    }

    /// Swaps the A and B features, used when the shapes were collided in flipped order
    #[inline]
    pub fn swapped(self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// A manifold point is a contact point belonging to a contact manifold.
///
/// The local point depends on the manifold type:
/// - circles: the local center of circle B
/// - face A: the local center of circle B or the clip point of polygon B
/// - face B: the clip point of polygon A
///
/// The impulses are carried between steps for warm starting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManifoldPoint {
    pub local_point: Vec2,
    /// The non-penetration impulse
    pub normal_impulse: f32,
    /// The friction impulse
    pub tangent_impulse: f32,
    pub id: ContactId,
}

/// How the manifold's local normal and point are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Contact points for two touching convex shapes, stored in local coordinates
/// so they survive small body motion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    /// Not used for [`ManifoldType::Circles`]
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub manifold_type: ManifoldType,
    pub point_count: usize,
}

impl Manifold {
    /// The live points of the manifold
    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }
}

/// A manifold evaluated in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldManifold {
    /// World vector pointing from A to B
    pub normal: Vec2,
    /// World contact points, midway between the two surfaces
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative when overlapping
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    /// Evaluates `manifold` with the given transforms and skin radii
    pub fn new(manifold: &Manifold, xf_a: Transform, radius_a: f32, xf_b: Transform, radius_b: f32) -> Self {
        let mut wm = Self::default();
        if manifold.point_count == 0 {
            return wm;
        }

        match manifold.manifold_type {
            ManifoldType::Circles => {
                let mut normal = Vec2::X;
                let point_a = xf_a * manifold.local_point;
                let point_b = xf_b * manifold.points[0].local_point;
                if point_a.distance_squared(point_b) > f32::EPSILON * f32::EPSILON {
                    normal = (point_b - point_a).normalize();
                }

                let c_a = point_a + radius_a * normal;
                let c_b = point_b - radius_b * normal;
                wm.normal = normal;
                wm.points[0] = 0.5 * (c_a + c_b);
                wm.separations[0] = (c_b - c_a).dot(normal);
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q * manifold.local_normal;
                let plane_point = xf_a * manifold.local_point;

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_b * mp.local_point;
                    let c_a = clip_point + (radius_a - (clip_point - plane_point).dot(normal)) * normal;
                    let c_b = clip_point - radius_b * normal;
                    wm.points[i] = 0.5 * (c_a + c_b);
                    wm.separations[i] = (c_b - c_a).dot(normal);
                }
                wm.normal = normal;
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q * manifold.local_normal;
                let plane_point = xf_b * manifold.local_point;

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_a * mp.local_point;
                    let c_b = clip_point + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    wm.points[i] = 0.5 * (c_a + c_b);
                    wm.separations[i] = (c_a - c_b).dot(normal);
                }

                // Ensure normal points from A to B.
                wm.normal = -normal;
            }
        }

        wm
    }
}

/// The state of a contact point between two manifolds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointState {
    /// Point does not exist
    #[default]
    Null,
    /// Point was added in the update
    Add,
    /// Point persisted across the update
    Persist,
    /// Point was removed in the update
    Remove,
}

/// Compares the point ids of two manifolds.
///
/// Returns the states of the old manifold's points (persist or remove) and
/// of the new manifold's points (add or persist).
pub fn get_point_states(
    manifold1: &Manifold,
    manifold2: &Manifold,
) -> ([PointState; MAX_MANIFOLD_POINTS], [PointState; MAX_MANIFOLD_POINTS]) {
    let mut state1 = [PointState::Null; MAX_MANIFOLD_POINTS];
    let mut state2 = [PointState::Null; MAX_MANIFOLD_POINTS];

    // Detect persists and removes.
    for (i, mp) in manifold1.points().iter().enumerate() {
        let key = mp.id.key();
        state1[i] = if manifold2.points().iter().any(|p| p.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Remove
        };
    }

    // Detect persists and adds.
    for (i, mp) in manifold2.points().iter().enumerate() {
        let key = mp.id.key();
        state2[i] = if manifold1.points().iter().any(|p| p.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Add
        };
    }

    (state1, state2)
}

/// A vertex of an incident edge being clipped, tagged with its features
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactId,
}

/// Sutherland-Hodgman clipping of a segment against the half-plane
/// `dot(normal, v) - offset <= 0`.
///
/// Returns the clipped segment and how many of its points are valid (0..=2).
pub fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: usize,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut count = 0;

    // Calculate the distance of end points to the line
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // If the points are behind the plane
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // If the points are on different sides of the plane
    if distance0 * distance1 < 0.0 {
        // Find intersection point of edge and plane
        let interp = distance0 / (distance0 - distance1);
        v_out[count].v = v_in[0].v + interp * (v_in[1].v - v_in[0].v);

        // VertexA is hitting edgeB.
        v_out[count].id = ContactId {
            index_a: vertex_index_a as u8,
            index_b: v_in[0].id.index_b,
            type_a: ContactFeatureType::Vertex,
            type_b: ContactFeatureType::Face,
        };
        count += 1;
    }

    (v_out, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn point_with_key(index_a: u8) -> ManifoldPoint {
        ManifoldPoint {
            id: ContactId {
                index_a,
                ..ContactId::ZERO
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_contact_id_key() {
        let id = ContactId {
            index_a: 1,
            index_b: 2,
            type_a: ContactFeatureType::Face,
            type_b: ContactFeatureType::Vertex,
        };
        assert_eq!(id.key(), 0x0001_0201);
        assert_eq!(id.swapped().swapped(), id);
        assert_ne!(id.swapped().key(), id.key());
    }

    #[test]
    fn test_point_states() {
        let mut m1 = Manifold::default();
        m1.points[0] = point_with_key(0);
        m1.points[1] = point_with_key(1);
        m1.point_count = 2;

        let mut m2 = Manifold::default();
        m2.points[0] = point_with_key(1);
        m2.points[1] = point_with_key(2);
        m2.point_count = 2;

        let (s1, s2) = get_point_states(&m1, &m2);
        assert_eq!(s1, [PointState::Remove, PointState::Persist]);
        assert_eq!(s2, [PointState::Persist, PointState::Add]);
    }

    #[test]
    fn test_clip_segment() {
        let seg = [
            ClipVertex {
                v: Vec2::new(-1.0, 0.0),
                id: ContactId::ZERO,
            },
            ClipVertex {
                v: Vec2::new(1.0, 0.0),
                id: ContactId::ZERO,
            },
        ];

        // Keep x <= 0.5
        let (out, count) = clip_segment_to_line(&seg, Vec2::X, 0.5, 3);
        assert_eq!(count, 2);
        assert_eq!(out[0].v, Vec2::new(-1.0, 0.0));
        assert_relative_eq!(out[1].v.x, 0.5);
        assert_eq!(out[1].id.index_a, 3);
        assert_eq!(out[1].id.type_b, ContactFeatureType::Face);

        // Entirely clipped away
        let (_, count) = clip_segment_to_line(&seg, Vec2::X, -2.0, 0);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_world_manifold_circles() {
        let mut m = Manifold::default();
        m.manifold_type = ManifoldType::Circles;
        m.local_point = Vec2::ZERO;
        m.points[0].local_point = Vec2::ZERO;
        m.point_count = 1;

        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::from_angle(Vec2::new(1.5, 0.0), 0.0);
        let wm = WorldManifold::new(&m, xf_a, 1.0, xf_b, 1.0);

        assert_relative_eq!(wm.normal.x, 1.0);
        assert_relative_eq!(wm.separations[0], -0.5);
        assert_relative_eq!(wm.points[0].x, 0.75);
    }
}
