use smallvec::SmallVec;

use crate::draw::{Color, DebugDraw, DrawFlags};
use crate::dynamics::{Body, BodyType, Fixture};
use crate::geometry::Shape;
use crate::joints::{Joint, JointKind};
use crate::math::{Transform, Vec2};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES};

use super::World;

const JOINT_COLOR: Color = Color::rgb(0.5, 0.8, 0.8);
const LIGHT_GRAY: Color = Color::rgb(0.7, 0.7, 0.7);
const LOWER_COLOR: Color = Color::rgb(0.3, 0.9, 0.3);
const UPPER_COLOR: Color = Color::rgb(0.9, 0.3, 0.3);
const ANCHOR_A_COLOR: Color = Color::rgb(0.3, 0.3, 0.9);
const DARK_GRAY: Color = Color::rgb(0.4, 0.4, 0.4);

fn shape_color(body: &Body) -> Color {
    if body.body_type == BodyType::Dynamic && body.mass == 0.0 {
        // Bad body
        Color::rgb(1.0, 0.0, 0.0)
    } else if !body.is_enabled() {
        Color::rgb(0.5, 0.5, 0.3)
    } else if body.body_type == BodyType::Static {
        Color::rgb(0.5, 0.9, 0.5)
    } else if body.body_type == BodyType::Kinematic {
        Color::rgb(0.5, 0.5, 0.9)
    } else if !body.is_awake() {
        Color::rgb(0.6, 0.6, 0.6)
    } else {
        Color::rgb(0.9, 0.7, 0.7)
    }
}

fn draw_shape(draw: &mut dyn DebugDraw, fixture: &Fixture, xf: Transform, color: Color) {
    match &fixture.shape {
        Shape::Circle(circle) => {
            let center = xf * circle.position;
            let axis = xf.q * Vec2::X;
            draw.draw_solid_circle(center, circle.radius, axis, color);
        }
        Shape::Edge(edge) => {
            let v1 = xf * edge.vertex1;
            let v2 = xf * edge.vertex2;
            draw.draw_segment(v1, v2, color);

            if !edge.one_sided {
                draw.draw_point(v1, 4.0, color);
                draw.draw_point(v2, 4.0, color);
            }
        }
        Shape::Chain(chain) => {
            let vertices = chain.vertices();
            for pair in vertices.windows(2) {
                draw.draw_segment(xf * pair[0], xf * pair[1], color);
            }
        }
        Shape::Polygon(polygon) => {
            let vertices: SmallVec<[Vec2; MAX_POLYGON_VERTICES]> =
                polygon.vertices().iter().map(|&v| xf * v).collect();
            draw.draw_solid_polygon(&vertices, color);
        }
    }
}

/// Draws the limit or axis guide shared by prismatic and wheel joints
fn draw_axis_joint(draw: &mut dyn DebugDraw, p_a: Vec2, p_b: Vec2, axis: Vec2, limit: Option<(f32, f32)>) {
    draw.draw_segment(p_a, p_b, DARK_GRAY);

    match limit {
        Some((lower, upper)) => {
            let lower = p_a + lower * axis;
            let upper = p_a + upper * axis;
            let perp = axis.skew();
            draw.draw_segment(lower, upper, LIGHT_GRAY);
            draw.draw_segment(lower - 0.5 * perp, lower + 0.5 * perp, LOWER_COLOR);
            draw.draw_segment(upper - 0.5 * perp, upper + 0.5 * perp, UPPER_COLOR);
        }
        None => draw.draw_segment(p_a - axis, p_a + axis, LIGHT_GRAY),
    }

    draw.draw_point(p_a, 5.0, LIGHT_GRAY);
    draw.draw_point(p_b, 5.0, ANCHOR_A_COLOR);
}

fn draw_joint(draw: &mut dyn DebugDraw, joint: &Joint, a: &Body, b: &Body) {
    let xf_a = a.xf;
    let xf_b = b.xf;
    let p_a = joint.anchor_a(a);
    let p_b = joint.anchor_b(b);

    match &joint.kind {
        JointKind::Distance(distance) => {
            let axis = (p_b - p_a).try_normalize().unwrap_or(Vec2::ZERO);
            draw.draw_segment(p_a, p_b, DARK_GRAY);
            draw.draw_point(p_a + distance.length() * axis, 8.0, LIGHT_GRAY);

            if distance.min_length() != distance.max_length() {
                if distance.min_length() > LINEAR_SLOP {
                    draw.draw_point(p_a + distance.min_length() * axis, 4.0, LOWER_COLOR);
                }
                if distance.max_length() < f32::MAX {
                    draw.draw_point(p_a + distance.max_length() * axis, 4.0, UPPER_COLOR);
                }
            }
        }
        JointKind::Revolute(revolute) => {
            const L: f32 = 0.5;

            draw.draw_point(p_a, 5.0, ANCHOR_A_COLOR);
            draw.draw_point(p_b, 5.0, DARK_GRAY);

            let angle = b.angle() - a.angle() - revolute.reference_angle();
            let r = L * Vec2::new(angle.cos(), angle.sin());
            draw.draw_segment(p_b, p_b + r, LIGHT_GRAY);
            draw.draw_circle(p_b, L, LIGHT_GRAY);

            if revolute.is_limit_enabled() {
                let lower = revolute.lower_limit();
                let upper = revolute.upper_limit();
                let r_lo = L * Vec2::new(lower.cos(), lower.sin());
                let r_hi = L * Vec2::new(upper.cos(), upper.sin());
                draw.draw_segment(p_b, p_b + r_lo, LOWER_COLOR);
                draw.draw_segment(p_b, p_b + r_hi, UPPER_COLOR);
            }

            draw.draw_segment(xf_a.p, p_a, JOINT_COLOR);
            draw.draw_segment(p_a, p_b, JOINT_COLOR);
            draw.draw_segment(xf_b.p, p_b, JOINT_COLOR);
        }
        JointKind::Prismatic(prismatic) => {
            let axis = xf_a.q * prismatic.local_axis_a();
            let limit = prismatic
                .is_limit_enabled()
                .then(|| (prismatic.lower_limit(), prismatic.upper_limit()));
            draw_axis_joint(draw, p_a, p_b, axis, limit);
        }
        JointKind::Wheel(wheel) => {
            let axis = xf_a.q * wheel.local_axis_a();
            let limit = wheel.is_limit_enabled().then(|| (wheel.lower_limit(), wheel.upper_limit()));
            draw_axis_joint(draw, p_a, p_b, axis, limit);
        }
        JointKind::Pulley(pulley) => {
            let s_a = pulley.ground_anchor_a();
            let s_b = pulley.ground_anchor_b();
            draw.draw_segment(s_a, p_a, JOINT_COLOR);
            draw.draw_segment(s_b, p_b, JOINT_COLOR);
            draw.draw_segment(s_a, s_b, JOINT_COLOR);
        }
        JointKind::Mouse(_) => {
            let green = Color::rgb(0.0, 1.0, 0.0);
            draw.draw_point(p_a, 4.0, green);
            draw.draw_point(p_b, 4.0, green);
            draw.draw_segment(p_a, p_b, Color::rgb(0.8, 0.8, 0.8));
        }
        _ => {
            draw.draw_segment(xf_a.p, p_a, JOINT_COLOR);
            draw.draw_segment(p_a, p_b, JOINT_COLOR);
            draw.draw_segment(xf_b.p, p_b, JOINT_COLOR);
        }
    }
}

impl World {
    /// Sends the parts of the world selected by `flags` to `draw`
    pub fn debug_draw(&self, draw: &mut dyn DebugDraw, flags: DrawFlags) {
        if flags.contains(DrawFlags::SHAPES) {
            for body in self.bodies.values() {
                let color = shape_color(body);
                for fixture in body.fixtures.iter().filter_map(|&f| self.fixtures.get(f)) {
                    draw_shape(draw, fixture, body.xf, color);
                }
            }
        }

        if flags.contains(DrawFlags::JOINTS) {
            for joint in self.joints.values() {
                if let (Some(a), Some(b)) = (self.bodies.get(joint.body_a), self.bodies.get(joint.body_b)) {
                    draw_joint(draw, joint, a, b);
                }
            }
        }

        if flags.contains(DrawFlags::PAIRS) {
            let color = Color::rgb(0.3, 0.9, 0.9);
            for contact in self.contact_manager.contacts.values() {
                let aabb_a = self.fixtures.get(contact.fixture_a).and_then(|f| f.aabb(contact.child_a));
                let aabb_b = self.fixtures.get(contact.fixture_b).and_then(|f| f.aabb(contact.child_b));
                if let (Some(aabb_a), Some(aabb_b)) = (aabb_a, aabb_b) {
                    draw.draw_segment(aabb_a.center(), aabb_b.center(), color);
                }
            }
        }

        if flags.contains(DrawFlags::AABBS) {
            let color = Color::rgb(0.9, 0.3, 0.9);
            let broad_phase = &self.contact_manager.broad_phase;

            for body in self.bodies.values().filter(|b| b.is_enabled()) {
                for fixture in body.fixtures.iter().filter_map(|&f| self.fixtures.get(f)) {
                    for proxy in &fixture.proxies {
                        let aabb = broad_phase.fat_aabb(proxy.proxy_id);
                        let vertices = [
                            aabb.min,
                            Vec2::new(aabb.max.x, aabb.min.y),
                            aabb.max,
                            Vec2::new(aabb.min.x, aabb.max.y),
                        ];
                        draw.draw_polygon(&vertices, color);
                    }
                }
            }
        }

        if flags.contains(DrawFlags::CENTER_OF_MASS) {
            for body in self.bodies.values() {
                let mut xf = body.xf;
                xf.p = body.world_center();
                draw.draw_transform(xf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{BodyDef, FixtureDef};
    use crate::geometry::{EdgeShape, PolygonShape};
    use crate::joints::RevoluteJointDef;

    #[derive(Default)]
    struct Recorder {
        polygons: Vec<(usize, Color)>,
        solid_polygons: Vec<(usize, Color)>,
        circles: usize,
        solid_circles: Vec<Color>,
        segments: Vec<Color>,
        transforms: Vec<Transform>,
        points: Vec<(Vec2, f32)>,
    }

    impl DebugDraw for Recorder {
        fn draw_polygon(&mut self, vertices: &[Vec2], color: Color) {
            self.polygons.push((vertices.len(), color));
        }

        fn draw_solid_polygon(&mut self, vertices: &[Vec2], color: Color) {
            self.solid_polygons.push((vertices.len(), color));
        }

        fn draw_circle(&mut self, _center: Vec2, _radius: f32, _color: Color) {
            self.circles += 1;
        }

        fn draw_solid_circle(&mut self, _center: Vec2, _radius: f32, _axis: Vec2, color: Color) {
            self.solid_circles.push(color);
        }

        fn draw_segment(&mut self, _p1: Vec2, _p2: Vec2, color: Color) {
            self.segments.push(color);
        }

        fn draw_transform(&mut self, xf: Transform) {
            self.transforms.push(xf);
        }

        fn draw_point(&mut self, p: Vec2, size: f32, _color: Color) {
            self.points.push((p, size));
        }
    }

    fn scene() -> World {
        let mut world = World::default();
        let ground = world.create_body(&BodyDef::default()).unwrap();
        world
            .create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(5.0, 0.5)))
            .unwrap();
        let ball = world.create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 3.0))).unwrap();
        world
            .create_fixture(ball, &FixtureDef::new(Shape::circle(0.5)).with_density(1.0))
            .unwrap();
        world
    }

    #[test]
    fn test_shapes_colored_by_body_state() {
        let world = scene();
        let mut recorder = Recorder::default();

        world.debug_draw(&mut recorder, DrawFlags::SHAPES);

        assert_eq!(recorder.solid_polygons, vec![(4, Color::rgb(0.5, 0.9, 0.5))]);
        assert_eq!(recorder.solid_circles, vec![Color::rgb(0.9, 0.7, 0.7)]);
        assert!(recorder.segments.is_empty());
    }

    #[test]
    fn test_two_sided_edge_draws_end_points() {
        let mut world = World::default();
        let ground = world.create_body(&BodyDef::default()).unwrap();
        world
            .create_fixture(ground, &FixtureDef::new(EdgeShape::two_sided(Vec2::ZERO, Vec2::X)))
            .unwrap();
        let mut recorder = Recorder::default();

        world.debug_draw(&mut recorder, DrawFlags::SHAPES);

        assert_eq!(recorder.segments.len(), 1);
        assert_eq!(recorder.points.len(), 2);
    }

    #[test]
    fn test_aabbs_and_centers() {
        let world = scene();
        let mut recorder = Recorder::default();

        world.debug_draw(&mut recorder, DrawFlags::AABBS | DrawFlags::CENTER_OF_MASS);

        assert_eq!(recorder.polygons.len(), 2);
        assert!(recorder.polygons.iter().all(|&(n, _)| n == 4));
        assert_eq!(recorder.transforms.len(), 2);
        assert!(recorder.transforms.iter().any(|xf| xf.p == Vec2::new(0.0, 3.0)));
    }

    #[test]
    fn test_revolute_joint_drawing() {
        let mut world = scene();
        let (ground, _) = world.bodies().find(|(_, b)| b.body_type() == BodyType::Static).unwrap();
        let (ball, _) = world.bodies().find(|(_, b)| b.body_type() == BodyType::Dynamic).unwrap();
        let def = RevoluteJointDef::initialize(
            ground,
            world.body(ground).unwrap(),
            ball,
            world.body(ball).unwrap(),
            Vec2::new(0.0, 3.0),
        );
        world.create_joint(def).unwrap();
        let mut recorder = Recorder::default();

        world.debug_draw(&mut recorder, DrawFlags::JOINTS);

        assert_eq!(recorder.points.len(), 2);
        assert_eq!(recorder.circles, 1);
        assert_eq!(recorder.segments.len(), 4);
        assert_eq!(recorder.segments.iter().filter(|&&c| c == JOINT_COLOR).count(), 3);
    }

    #[test]
    fn test_nothing_drawn_without_flags() {
        let world = scene();
        let mut recorder = Recorder::default();

        world.debug_draw(&mut recorder, DrawFlags::empty());

        assert!(recorder.solid_polygons.is_empty());
        assert!(recorder.transforms.is_empty());
    }
}
