use crate::dynamics::{Fixture, FixtureHandle};
use crate::geometry::{Aabb, RayCastInput};
use crate::math::Vec2;

use super::World;

/// Result of a ray cast query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastHit {
    /// Fixture that was hit
    pub fixture: FixtureHandle,
    /// World space hit point
    pub point: Vec2,
    /// Surface normal at hit point
    pub normal: Vec2,
    /// Fraction of the way from `p1` to `p2`
    pub fraction: f32,
}

impl World {
    /// Calls `callback` for every fixture whose fat AABB overlaps `aabb`.
    /// Returning `false` stops the query. The fixture shape itself may not
    /// overlap `aabb`.
    pub fn query_aabb(&self, aabb: Aabb, mut callback: impl FnMut(FixtureHandle, &Fixture) -> bool) {
        let broad_phase = &self.contact_manager.broad_phase;
        broad_phase.query(aabb, |proxy_id| {
            let Some(key) = broad_phase.user_data(proxy_id) else {
                return true;
            };
            match self.fixtures.get(key.fixture) {
                Some(fixture) => callback(key.fixture, fixture),
                None => true,
            }
        });
    }

    /// Casts a ray from `p1` to `p2` and reports every fixture it crosses,
    /// in no particular order.
    ///
    /// The callback return value controls the cast:
    /// - `-1` ignores the hit and continues
    /// - `0` terminates the cast
    /// - the hit fraction clips the ray to the hit, finding the closest
    /// - `1` continues without clipping
    pub fn ray_cast(&self, p1: Vec2, p2: Vec2, mut callback: impl FnMut(RayCastHit) -> f32) {
        let broad_phase = &self.contact_manager.broad_phase;
        let input = RayCastInput::new(p1, p2);

        broad_phase.ray_cast(&input, |sub_input, proxy_id| {
            let Some(key) = broad_phase.user_data(proxy_id) else {
                return sub_input.max_fraction;
            };
            let Some(fixture) = self.fixtures.get(key.fixture) else {
                return sub_input.max_fraction;
            };
            let Some(body) = self.bodies.get(fixture.body) else {
                return sub_input.max_fraction;
            };

            match fixture.ray_cast(sub_input, body.xf, key.child_index) {
                Some(output) => {
                    let fraction = output.fraction;
                    let point = (1.0 - fraction) * sub_input.p1 + fraction * sub_input.p2;
                    callback(RayCastHit {
                        fixture: key.fixture,
                        point,
                        normal: output.normal,
                        fraction,
                    })
                }
                None => sub_input.max_fraction,
            }
        });
    }

    /// The closest fixture hit by the ray from `p1` to `p2`
    pub fn ray_cast_closest(&self, p1: Vec2, p2: Vec2) -> Option<RayCastHit> {
        let mut closest: Option<RayCastHit> = None;
        self.ray_cast(p1, p2, |hit| {
            closest = Some(hit);
            hit.fraction
        });
        closest
    }

    /// Fixtures whose shape contains `point`
    pub fn query_point(&self, point: Vec2) -> Vec<FixtureHandle> {
        let aabb = Aabb::new(point, point);
        let mut hits = Vec::new();
        self.query_aabb(aabb, |handle, fixture| {
            let contains = self
                .bodies
                .get(fixture.body)
                .is_some_and(|body| fixture.test_point(body.xf, point));
            if contains {
                hits.push(handle);
            }
            true
        });
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{BodyDef, FixtureDef};
    use crate::geometry::Shape;
    use approx::assert_relative_eq;

    fn scene() -> (World, FixtureHandle, FixtureHandle) {
        let mut world = World::default();
        let near = world.create_body(&BodyDef::default().with_position(Vec2::new(2.0, 0.0))).unwrap();
        let near = world.create_fixture(near, &FixtureDef::new(Shape::cuboid(0.5, 0.5))).unwrap();
        let far = world.create_body(&BodyDef::default().with_position(Vec2::new(6.0, 0.0))).unwrap();
        let far = world.create_fixture(far, &FixtureDef::new(Shape::circle(1.0))).unwrap();
        (world, near, far)
    }

    #[test]
    fn test_query_aabb_finds_overlapping_fixtures() {
        let (world, near, far) = scene();

        let mut found = Vec::new();
        world.query_aabb(Aabb::new(Vec2::new(1.0, -1.0), Vec2::new(3.0, 1.0)), |handle, _| {
            found.push(handle);
            true
        });
        assert_eq!(found, vec![near]);

        let mut count = 0;
        world.query_aabb(Aabb::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0)), |_, _| {
            count += 1;
            false
        });
        assert_eq!(count, 1);

        found.clear();
        world.query_aabb(Aabb::new(Vec2::new(5.5, -0.1), Vec2::new(6.5, 0.1)), |handle, _| {
            found.push(handle);
            true
        });
        assert_eq!(found, vec![far]);
    }

    #[test]
    fn test_ray_cast_closest() {
        let (world, near, _) = scene();

        let hit = world.ray_cast_closest(Vec2::ZERO, Vec2::new(10.0, 0.0)).unwrap();
        assert_eq!(hit.fixture, near);
        assert_relative_eq!(hit.point.x, 1.5, epsilon = 1e-4);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-4);
        assert_relative_eq!(hit.fraction, 0.15, epsilon = 1e-4);
    }

    #[test]
    fn test_ray_cast_reports_all_hits() {
        let (world, near, far) = scene();

        let mut hits = Vec::new();
        world.ray_cast(Vec2::ZERO, Vec2::new(10.0, 0.0), |hit| {
            hits.push(hit.fixture);
            1.0
        });
        hits.sort();
        let mut expected = vec![near, far];
        expected.sort();
        assert_eq!(hits, expected);
    }

    #[test]
    fn test_ray_cast_miss() {
        let (world, _, _) = scene();
        assert!(world.ray_cast_closest(Vec2::new(0.0, 5.0), Vec2::new(10.0, 5.0)).is_none());
    }

    #[test]
    fn test_query_point() {
        let (world, near, _) = scene();
        assert_eq!(world.query_point(Vec2::new(2.2, 0.1)), vec![near]);
        assert!(world.query_point(Vec2::new(4.0, 0.0)).is_empty());
    }
}
