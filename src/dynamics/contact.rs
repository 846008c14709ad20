use bitflags::bitflags;
use slotmap::{new_key_type, SlotMap};

use crate::callbacks::ContactListener;
use crate::collision::narrow_phase::{
    collide_circles, collide_edge_and_circle, collide_edge_and_polygon, collide_polygon_and_circle, collide_polygons,
    test_overlap, Manifold,
};
use crate::geometry::{Shape, ShapeType};
use crate::math::Transform;

use super::{Body, BodyHandle, Fixture, FixtureHandle};

new_key_type! {
    /// Stable handle to a contact owned by the contact manager
    pub struct ContactHandle;
}

bitflags! {
    /// Contact state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContactFlags: u8 {
        /// Used when crawling the contact graph to build islands
        const ISLAND    = 1 << 0;
        /// Set when the shapes are touching
        const TOUCHING  = 1 << 1;
        /// Cleared by the user to disable the response for one step
        const ENABLED   = 1 << 2;
        /// The filter must be re-applied before the next update
        const FILTER    = 1 << 3;
        /// The cached time of impact is valid
        const TOI       = 1 << 4;
    }
}

/// Friction mixing law: the geometric mean, so a zero-friction surface
/// slides on anything
#[inline]
pub fn mix_friction(friction_a: f32, friction_b: f32) -> f32 {
    (friction_a * friction_b).sqrt()
}

/// Restitution mixing law: anything bounces on a bouncy surface
#[inline]
pub fn mix_restitution(restitution_a: f32, restitution_b: f32) -> f32 {
    restitution_a.max(restitution_b)
}

/// Restitution threshold mixing law
#[inline]
pub fn mix_restitution_threshold(threshold_a: f32, threshold_b: f32) -> f32 {
    threshold_a.min(threshold_b)
}

/// Which pair orientation the narrow phase expects, or `None` when the two
/// shape types never collide (edges and chains are static geometry).
fn pair_orientation(type_a: ShapeType, type_b: ShapeType) -> Option<bool> {
    use ShapeType::*;

    match (type_a, type_b) {
        (Circle, Circle)
        | (Polygon, Circle)
        | (Polygon, Polygon)
        | (Edge, Circle)
        | (Edge, Polygon)
        | (Chain, Circle)
        | (Chain, Polygon) => Some(false),
        (Circle, Polygon) | (Circle, Edge) | (Polygon, Edge) | (Circle, Chain) | (Polygon, Chain) => Some(true),
        _ => None,
    }
}

/// A potential contact between two fixture children whose fat AABBs overlap.
///
/// The contact exists as long as the AABBs overlap, whether or not the shapes
/// touch. Its manifold carries the accumulated impulses used for warm starting.
#[derive(Debug, Clone)]
pub struct Contact {
    pub(crate) flags: ContactFlags,

    pub(crate) fixture_a: FixtureHandle,
    pub(crate) fixture_b: FixtureHandle,
    pub(crate) child_a: usize,
    pub(crate) child_b: usize,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,

    pub(crate) manifold: Manifold,

    pub(crate) toi_count: u32,
    pub(crate) toi: f32,

    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) restitution_threshold: f32,
    pub(crate) tangent_speed: f32,
}

impl Contact {
    /// Creates the contact for a pair of fixture children, swapping them into
    /// the order the narrow phase expects.
    pub(crate) fn new(
        handle_a: FixtureHandle,
        fixture_a: &Fixture,
        child_a: usize,
        handle_b: FixtureHandle,
        fixture_b: &Fixture,
        child_b: usize,
    ) -> Option<Self> {
        let swap = pair_orientation(fixture_a.shape_type(), fixture_b.shape_type())?;
        let ((handle_a, fixture_a, child_a), (handle_b, fixture_b, child_b)) = if swap {
            ((handle_b, fixture_b, child_b), (handle_a, fixture_a, child_a))
        } else {
            ((handle_a, fixture_a, child_a), (handle_b, fixture_b, child_b))
        };

        Some(Self {
            flags: ContactFlags::ENABLED,
            fixture_a: handle_a,
            fixture_b: handle_b,
            child_a,
            child_b,
            body_a: fixture_a.body,
            body_b: fixture_b.body,
            manifold: Manifold::default(),
            toi_count: 0,
            toi: 1.0,
            friction: mix_friction(fixture_a.friction, fixture_b.friction),
            restitution: mix_restitution(fixture_a.restitution, fixture_b.restitution),
            restitution_threshold: mix_restitution_threshold(
                fixture_a.restitution_threshold,
                fixture_b.restitution_threshold,
            ),
            tangent_speed: 0.0,
        })
    }

    /// The current manifold. Empty when the shapes are not touching.
    #[inline]
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    /// Mutable manifold access for pre-solve listeners
    #[inline]
    pub fn manifold_mut(&mut self) -> &mut Manifold {
        &mut self.manifold
    }

    #[inline]
    pub fn is_touching(&self) -> bool {
        self.flags.contains(ContactFlags::TOUCHING)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(ContactFlags::ENABLED)
    }

    /// Disables the contact for the current step. Call from a pre-solve
    /// listener; the flag is restored on the next update.
    pub fn set_enabled(&mut self, flag: bool) {
        self.flags.set(ContactFlags::ENABLED, flag);
    }

    #[inline]
    pub fn fixture_a(&self) -> FixtureHandle {
        self.fixture_a
    }

    #[inline]
    pub fn fixture_b(&self) -> FixtureHandle {
        self.fixture_b
    }

    /// Child index of fixture A, relevant for chain shapes
    #[inline]
    pub fn child_a(&self) -> usize {
        self.child_a
    }

    #[inline]
    pub fn child_b(&self) -> usize {
        self.child_b
    }

    #[inline]
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    #[inline]
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    #[inline]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Overrides the mixed friction. Persists until the contact is destroyed
    /// or the friction is reset.
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    #[inline]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    #[inline]
    pub fn restitution_threshold(&self) -> f32 {
        self.restitution_threshold
    }

    pub fn set_restitution_threshold(&mut self, threshold: f32) {
        self.restitution_threshold = threshold;
    }

    /// Desired tangent speed for conveyor belt behavior, in m/s
    #[inline]
    pub fn tangent_speed(&self) -> f32 {
        self.tangent_speed
    }

    pub fn set_tangent_speed(&mut self, speed: f32) {
        self.tangent_speed = speed;
    }

    pub(crate) fn flag_for_filtering(&mut self) {
        self.flags.insert(ContactFlags::FILTER);
    }

    /// Computes the manifold for the ordered shape pair
    pub(crate) fn evaluate(&self, shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform) -> Manifold {
        match (shape_a, shape_b) {
            (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
            (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
            (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
            (Shape::Edge(a), Shape::Circle(b)) => collide_edge_and_circle(a, xf_a, b, xf_b),
            (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_and_polygon(a, xf_a, b, xf_b),
            (Shape::Chain(a), Shape::Circle(b)) => collide_edge_and_circle(&a.child_edge(self.child_a), xf_a, b, xf_b),
            (Shape::Chain(a), Shape::Polygon(b)) => {
                collide_edge_and_polygon(&a.child_edge(self.child_a), xf_a, b, xf_b)
            }
            _ => Manifold::default(),
        }
    }

    /// Updates the manifold and the touching state, carrying accumulated
    /// impulses over to matching points and firing listener callbacks.
    pub(crate) fn update(
        &mut self,
        fixture_a: &Fixture,
        fixture_b: &Fixture,
        bodies: &mut SlotMap<BodyHandle, Body>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        let old_manifold = self.manifold;

        // Re-enable this contact.
        self.flags.insert(ContactFlags::ENABLED);

        let was_touching = self.is_touching();
        let sensor = fixture_a.is_sensor || fixture_b.is_sensor;

        let (Some(xf_a), Some(xf_b)) = (
            bodies.get(self.body_a).map(|b| b.xf),
            bodies.get(self.body_b).map(|b| b.xf),
        ) else {
            return;
        };

        let touching = if sensor {
            // Sensors don't generate manifolds.
            self.manifold.point_count = 0;
            test_overlap(&fixture_a.shape, self.child_a, &fixture_b.shape, self.child_b, xf_a, xf_b)
        } else {
            self.manifold = self.evaluate(&fixture_a.shape, xf_a, &fixture_b.shape, xf_b);

            for mp2 in self.manifold.points_mut() {
                mp2.normal_impulse = 0.0;
                mp2.tangent_impulse = 0.0;

                if let Some(mp1) = old_manifold.points().iter().find(|mp1| mp1.id.key() == mp2.id.key()) {
                    mp2.normal_impulse = mp1.normal_impulse;
                    mp2.tangent_impulse = mp1.tangent_impulse;
                }
            }

            let touching = self.manifold.point_count > 0;
            if touching != was_touching {
                for handle in [self.body_a, self.body_b] {
                    if let Some(body) = bodies.get_mut(handle) {
                        body.set_awake(true);
                    }
                }
            }
            touching
        };

        self.flags.set(ContactFlags::TOUCHING, touching);

        if let Some(listener) = listener.as_mut() {
            if !was_touching && touching {
                listener.begin_contact(self);
            }

            if was_touching && !touching {
                listener.end_contact(self);
            }

            if !sensor && touching {
                listener.pre_solve(self, &old_manifold);
            }
        }
    }
}
