use std::time::Instant;

use slotmap::SlotMap;
use tracing::debug;

use crate::callbacks::ContactListener;
use crate::joints::{Joint, JointHandle};
use crate::math::Vec2;
use crate::settings::{ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, TIME_TO_SLEEP};
use crate::solver::{ContactConstraintDef, ContactSolver};

use super::integrator::{integrate_position, integrate_velocity};
use super::{
    Body, BodyHandle, BodyType, Contact, ContactHandle, Fixture, FixtureHandle, Position, Profile, SolverBody,
    SolverData, TimeStep, Velocity,
};

/// Mutable view of the world state an island works on
pub(crate) struct IslandWorld<'a> {
    pub bodies: &'a mut SlotMap<BodyHandle, Body>,
    pub fixtures: &'a SlotMap<FixtureHandle, Fixture>,
    pub contacts: &'a mut SlotMap<ContactHandle, Contact>,
    pub joints: &'a mut SlotMap<JointHandle, Joint>,
    pub listener: &'a mut Option<Box<dyn ContactListener>>,
}

/// A connected group of awake bodies with the contacts and joints between
/// them, solved together.
///
/// Scratch storage is kept between islands so a step allocates only while
/// the scene grows.
#[derive(Debug, Default)]
pub struct Island {
    pub(crate) bodies: Vec<BodyHandle>,
    pub(crate) contacts: Vec<ContactHandle>,
    pub(crate) joints: Vec<JointHandle>,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
    contact_solver: ContactSolver,
}

impl Island {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Adds a body and records its slot in the solver arrays
    pub(crate) fn add_body(&mut self, handle: BodyHandle, body: &mut Body) {
        body.island_index = self.bodies.len();
        self.bodies.push(handle);
    }

    pub(crate) fn add_contact(&mut self, handle: ContactHandle) {
        self.contacts.push(handle);
    }

    pub(crate) fn add_joint(&mut self, handle: JointHandle) {
        self.joints.push(handle);
    }

    fn constraint_defs<'w>(
        contacts: &'w [ContactHandle],
        world: &'w IslandWorld<'_>,
    ) -> impl Iterator<Item = ContactConstraintDef> + 'w {
        contacts.iter().enumerate().filter_map(move |(contact_index, &handle)| {
            let contact = world.contacts.get(handle)?;
            let fixture_a = world.fixtures.get(contact.fixture_a)?;
            let fixture_b = world.fixtures.get(contact.fixture_b)?;
            let body_a = world.bodies.get(contact.body_a)?;
            let body_b = world.bodies.get(contact.body_b)?;

            Some(ContactConstraintDef {
                manifold: contact.manifold,
                friction: contact.friction,
                restitution: contact.restitution,
                restitution_threshold: contact.restitution_threshold,
                tangent_speed: contact.tangent_speed,
                radius_a: fixture_a.shape.radius(),
                radius_b: fixture_b.shape.radius(),
                body_a: SolverBody::new(body_a),
                body_b: SolverBody::new(body_b),
                contact_index,
            })
        })
    }

    /// Solves one full step for the island: velocity integration, constraint
    /// iterations, position integration and sleep management.
    pub(crate) fn solve(
        &mut self,
        profile: &mut Profile,
        step: &TimeStep,
        gravity: Vec2,
        allow_sleep: bool,
        world: &mut IslandWorld<'_>,
    ) {
        let h = step.dt;

        self.positions.clear();
        self.velocities.clear();

        // Integrate velocities and apply damping. Initialize the body state.
        for &handle in &self.bodies {
            let Some(body) = world.bodies.get_mut(handle) else {
                self.positions.push(Position::default());
                self.velocities.push(Velocity::default());
                continue;
            };

            // Store positions for continuous collision.
            body.sweep.c0 = body.sweep.c;
            body.sweep.a0 = body.sweep.a;

            self.positions.push(Position { c: body.sweep.c, a: body.sweep.a });
            self.velocities.push(integrate_velocity(body, gravity, h));
        }

        let timer = Instant::now();

        self.contact_solver.reset(*step, Self::constraint_defs(&self.contacts, world));
        self.contact_solver.initialize_velocity_constraints(&self.positions, &self.velocities);
        if step.warm_starting {
            self.contact_solver.warm_start(&mut self.velocities);
        }

        let mut data = SolverData { step: *step, positions: &mut self.positions, velocities: &mut self.velocities };

        for &handle in &self.joints {
            if let Some(joint) = world.joints.get_mut(handle) {
                joint.init_velocity_constraints(world.bodies, &mut data);
            }
        }

        profile.solve_init += timer.elapsed();

        // Solve velocity constraints.
        let timer = Instant::now();
        for _ in 0..step.velocity_iterations {
            for &handle in &self.joints {
                if let Some(joint) = world.joints.get_mut(handle) {
                    joint.solve_velocity_constraints(&mut data);
                }
            }
            self.contact_solver.solve_velocity_constraints(data.velocities);
        }

        // Store impulses for warm starting.
        for (i, vc) in self.contact_solver.velocity_constraints().iter().enumerate() {
            if let Some(contact) = world.contacts.get_mut(self.contacts[vc.contact_index]) {
                self.contact_solver.store_impulses(i, &mut contact.manifold);
            }
        }
        profile.solve_velocity += timer.elapsed();

        for (position, velocity) in data.positions.iter_mut().zip(data.velocities.iter_mut()) {
            integrate_position(position, velocity, h);
        }

        // Solve position constraints.
        let timer = Instant::now();
        let mut position_solved = false;
        for _ in 0..step.position_iterations {
            let contacts_okay = self.contact_solver.solve_position_constraints(data.positions);

            let mut joints_okay = true;
            for &handle in &self.joints {
                if let Some(joint) = world.joints.get_mut(handle) {
                    joints_okay &= joint.solve_position_constraints(&mut data);
                }
            }

            if contacts_okay && joints_okay {
                // Exit early if the position errors are small.
                position_solved = true;
                break;
            }
        }

        // Copy state buffers back to the bodies.
        for (i, &handle) in self.bodies.iter().enumerate() {
            if let Some(body) = world.bodies.get_mut(handle) {
                body.sweep.c = self.positions[i].c;
                body.sweep.a = self.positions[i].a;
                body.linear_velocity = self.velocities[i].v;
                body.angular_velocity = self.velocities[i].w;
                body.synchronize_transform();
            }
        }
        profile.solve_position += timer.elapsed();

        self.report(world);

        if allow_sleep {
            self.update_sleep(h, position_solved, world.bodies);
        }
    }

    fn update_sleep(&self, h: f32, position_solved: bool, bodies: &mut SlotMap<BodyHandle, Body>) {
        let linear_tolerance_squared = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
        let angular_tolerance_squared = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

        let mut min_sleep_time = f32::MAX;
        for &handle in &self.bodies {
            let Some(body) = bodies.get_mut(handle) else {
                continue;
            };
            if body.body_type == BodyType::Static {
                continue;
            }

            if !body.is_sleeping_allowed()
                || body.angular_velocity * body.angular_velocity > angular_tolerance_squared
                || body.linear_velocity.length_squared() > linear_tolerance_squared
            {
                body.sleep_time = 0.0;
                min_sleep_time = 0.0;
            } else {
                body.sleep_time += h;
                min_sleep_time = min_sleep_time.min(body.sleep_time);
            }
        }

        if min_sleep_time >= TIME_TO_SLEEP && position_solved {
            debug!(bodies = self.bodies.len(), "island going to sleep");
            for &handle in &self.bodies {
                if let Some(body) = bodies.get_mut(handle) {
                    body.set_awake(false);
                }
            }
        }
    }

    /// Resolves the overlap of the two bodies at `toi_index_a` and
    /// `toi_index_b` after a time of impact advance, then integrates the
    /// island over the remaining sub-step. Only those two bodies are moved
    /// by the position correction; the other bodies act as if static.
    pub(crate) fn solve_toi(
        &mut self,
        sub_step: &TimeStep,
        toi_index_a: usize,
        toi_index_b: usize,
        world: &mut IslandWorld<'_>,
    ) {
        debug_assert!(toi_index_a < self.bodies.len());
        debug_assert!(toi_index_b < self.bodies.len());

        self.positions.clear();
        self.velocities.clear();

        // Initialize the body state.
        for &handle in &self.bodies {
            let (position, velocity) = match world.bodies.get(handle) {
                Some(body) => (
                    Position { c: body.sweep.c, a: body.sweep.a },
                    Velocity { v: body.linear_velocity, w: body.angular_velocity },
                ),
                None => (Position::default(), Velocity::default()),
            };
            self.positions.push(position);
            self.velocities.push(velocity);
        }

        self.contact_solver.reset(*sub_step, Self::constraint_defs(&self.contacts, world));

        // Solve position constraints.
        for _ in 0..sub_step.position_iterations {
            if self.contact_solver.solve_toi_position_constraints(&mut self.positions, toi_index_a, toi_index_b) {
                break;
            }
        }

        // Leap of faith to new safe state.
        for index in [toi_index_a, toi_index_b] {
            if let Some(body) = world.bodies.get_mut(self.bodies[index]) {
                body.sweep.c0 = self.positions[index].c;
                body.sweep.a0 = self.positions[index].a;
            }
        }

        // No warm starting is needed for TOI events because warm
        // starting impulses were applied in the discrete solver.
        self.contact_solver.initialize_velocity_constraints(&self.positions, &self.velocities);

        // Solve velocity constraints.
        for _ in 0..sub_step.velocity_iterations {
            self.contact_solver.solve_velocity_constraints(&mut self.velocities);
        }

        // Don't store the TOI contact forces for warm starting
        // because they can be quite large.

        let h = sub_step.dt;

        // Integrate positions and sync the bodies.
        for (i, &handle) in self.bodies.iter().enumerate() {
            let (position, velocity) = (&mut self.positions[i], &mut self.velocities[i]);
            integrate_position(position, velocity, h);

            if let Some(body) = world.bodies.get_mut(handle) {
                body.sweep.c = position.c;
                body.sweep.a = position.a;
                body.linear_velocity = velocity.v;
                body.angular_velocity = velocity.w;
                body.synchronize_transform();
            }
        }

        self.report(world);
    }

    fn report(&self, world: &mut IslandWorld<'_>) {
        let Some(listener) = world.listener.as_mut() else {
            return;
        };

        for vc in self.contact_solver.velocity_constraints() {
            if let Some(contact) = world.contacts.get(self.contacts[vc.contact_index]) {
                listener.post_solve(contact, &vc.impulse());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::BodyDef;
    use crate::geometry::MassData;
    use crate::joints::{JointDef, RevoluteJointDef};
    use approx::assert_relative_eq;

    struct Scene {
        bodies: SlotMap<BodyHandle, Body>,
        fixtures: SlotMap<FixtureHandle, Fixture>,
        contacts: SlotMap<ContactHandle, Contact>,
        joints: SlotMap<JointHandle, Joint>,
        listener: Option<Box<dyn ContactListener>>,
    }

    impl Scene {
        fn new() -> Self {
            Self {
                bodies: SlotMap::with_key(),
                fixtures: SlotMap::with_key(),
                contacts: SlotMap::with_key(),
                joints: SlotMap::with_key(),
                listener: None,
            }
        }

        fn dynamic(&mut self, position: Vec2) -> BodyHandle {
            let mut body = Body::new(&BodyDef::dynamic().with_position(position));
            body.set_mass_data(&MassData { mass: 1.0, center: Vec2::ZERO, inertia: 0.1 });
            self.bodies.insert(body)
        }

        fn world(&mut self) -> IslandWorld<'_> {
            IslandWorld {
                bodies: &mut self.bodies,
                fixtures: &self.fixtures,
                contacts: &mut self.contacts,
                joints: &mut self.joints,
                listener: &mut self.listener,
            }
        }
    }

    fn step() -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
        }
    }

    #[test]
    fn test_free_fall_single_step() {
        let mut scene = Scene::new();
        let body = scene.dynamic(Vec2::new(0.0, 10.0));

        let mut island = Island::new();
        island.add_body(body, &mut scene.bodies[body]);

        let mut profile = Profile::default();
        island.solve(&mut profile, &step(), Vec2::new(0.0, -10.0), true, &mut scene.world());

        let body = &scene.bodies[body];
        assert_relative_eq!(body.linear_velocity().y, -10.0 / 60.0, epsilon = 1e-5);
        assert_relative_eq!(body.position().y, 10.0 - 10.0 / 3600.0, epsilon = 1e-5);
        assert_relative_eq!(body.sweep().c0.y, 10.0);
    }

    #[test]
    fn test_resting_island_falls_asleep() {
        let mut scene = Scene::new();
        let body = scene.dynamic(Vec2::ZERO);

        let mut island = Island::new();
        let mut profile = Profile::default();
        let steps = (TIME_TO_SLEEP * 60.0) as usize + 2;

        for _ in 0..steps {
            island.clear();
            island.add_body(body, &mut scene.bodies[body]);
            island.solve(&mut profile, &step(), Vec2::ZERO, true, &mut scene.world());
        }

        assert!(!scene.bodies[body].is_awake());
    }

    #[test]
    fn test_sleep_disabled_keeps_island_awake() {
        let mut scene = Scene::new();
        let body = scene.dynamic(Vec2::ZERO);

        let mut island = Island::new();
        let mut profile = Profile::default();
        for _ in 0..120 {
            island.clear();
            island.add_body(body, &mut scene.bodies[body]);
            island.solve(&mut profile, &step(), Vec2::ZERO, false, &mut scene.world());
        }

        assert!(scene.bodies[body].is_awake());
    }

    #[test]
    fn test_joint_holds_pendulum_pivot() {
        let mut scene = Scene::new();
        let ground = scene.bodies.insert(Body::new(&BodyDef::default()));
        let bob = scene.dynamic(Vec2::new(1.0, 0.0));

        let def = RevoluteJointDef::initialize(ground, &scene.bodies[ground], bob, &scene.bodies[bob], Vec2::ZERO);
        let joint = Joint::new(&JointDef::from(def), &scene.bodies, &scene.joints).unwrap();
        let joint = scene.joints.insert(joint);

        let mut island = Island::new();
        let mut profile = Profile::default();
        for _ in 0..60 {
            island.clear();
            island.add_body(ground, &mut scene.bodies[ground]);
            island.add_body(bob, &mut scene.bodies[bob]);
            island.add_joint(joint);
            island.solve(&mut profile, &step(), Vec2::new(0.0, -10.0), false, &mut scene.world());
        }

        // The bob swings on a unit radius around the pivot
        let radius = scene.bodies[bob].position().length();
        assert_relative_eq!(radius, 1.0, epsilon = 0.02);
        assert!(scene.bodies[bob].position().y < -0.1);
    }
}
