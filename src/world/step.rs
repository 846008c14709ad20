use std::time::{Duration, Instant};

use slotmap::SlotMap;
use tracing::trace;

use crate::collision::broad_phase::BroadPhase;
use crate::collision::narrow_phase::{time_of_impact, DistanceProxy, ToiInput, ToiState};
use crate::dynamics::{
    Body, BodyFlags, BodyType, ContactFlags, Fixture, FixtureHandle, FixtureProxyKey, IslandWorld, TimeStep,
};
use crate::settings::{MAX_SUB_STEPS, MAX_TOI_CONTACTS};

use super::World;

/// Moves a body's proxies to cover its motion over the last step. Sleeping
/// bodies did not move, so only the current transform is used.
pub(super) fn synchronize_fixtures(
    body: &Body,
    fixtures: &mut SlotMap<FixtureHandle, Fixture>,
    broad_phase: &mut BroadPhase<FixtureProxyKey>,
) {
    let xf1 = if body.is_awake() { body.sweep_start_transform() } else { body.xf };
    for &handle in &body.fixtures {
        if let Some(fixture) = fixtures.get_mut(handle) {
            fixture.synchronize(broad_phase, xf1, body.xf);
        }
    }
}

impl World {
    /// Advances the simulation by `dt` seconds: collision detection,
    /// integration and constraint solution.
    ///
    /// `velocity_iterations` and `position_iterations` bound the solver
    /// passes; 8 and 3 are typical.
    pub fn step(&mut self, dt: f32, velocity_iterations: usize, position_iterations: usize) {
        let step_timer = Instant::now();

        // New fixtures have proxies but no contacts yet.
        if self.new_contacts {
            self.contact_manager.find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
            self.new_contacts = false;
        }

        self.locked = true;

        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        let step = TimeStep {
            dt,
            inv_dt,
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: self.config.warm_starting,
        };

        // Update contacts. This is where some contacts are destroyed.
        let timer = Instant::now();
        self.contact_manager.collide(&mut self.bodies, &self.fixtures, &self.joints);
        self.profile.collide = timer.elapsed();

        // Integrate velocities, solve velocity constraints, and integrate positions.
        if self.step_complete && step.dt > 0.0 {
            let timer = Instant::now();
            self.solve(&step);
            self.profile.solve = timer.elapsed();
        }

        // Handle TOI events.
        let mut toi_events = 0;
        if self.config.continuous_physics && step.dt > 0.0 {
            let timer = Instant::now();
            toi_events = self.solve_toi(&step);
            self.profile.solve_toi = timer.elapsed();
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        if self.config.auto_clear_forces {
            self.clear_forces();
        }

        self.locked = false;
        self.profile.step = step_timer.elapsed();

        trace!(
            dt,
            contacts = self.contact_manager.contact_count(),
            toi_events,
            "world step"
        );
    }

    /// Builds islands of awake bodies connected by touching contacts and
    /// joints, and solves each one.
    fn solve(&mut self, step: &TimeStep) {
        self.profile.solve_init = Duration::ZERO;
        self.profile.solve_velocity = Duration::ZERO;
        self.profile.solve_position = Duration::ZERO;

        let gravity = self.config.gravity;
        let allow_sleep = self.config.allow_sleeping;

        let World { bodies, fixtures, joints, contact_manager, island, seeds, stack, profile, .. } = self;

        // Clear all the island flags.
        for body in bodies.values_mut() {
            body.flags.remove(BodyFlags::ISLAND);
        }
        for contact in contact_manager.contacts.values_mut() {
            contact.flags.remove(ContactFlags::ISLAND);
        }
        for joint in joints.values_mut() {
            joint.island_flag = false;
        }

        seeds.clear();
        seeds.extend(bodies.keys());

        for &seed in seeds.iter() {
            let Some(body) = bodies.get_mut(seed) else {
                continue;
            };

            if body.flags.contains(BodyFlags::ISLAND)
                || !body.is_awake()
                || !body.is_enabled()
                || body.body_type == BodyType::Static
            {
                continue;
            }

            // Depth first search over the constraint graph.
            island.clear();
            stack.clear();
            stack.push(seed);
            body.flags.insert(BodyFlags::ISLAND);

            while let Some(handle) = stack.pop() {
                let Some(body) = bodies.get_mut(handle) else {
                    continue;
                };
                island.add_body(handle, body);

                // Don't propagate islands across static bodies.
                if body.body_type == BodyType::Static {
                    continue;
                }

                // Make sure the body is awake (without resetting sleep timer).
                body.flags.insert(BodyFlags::AWAKE);

                let contact_count = body.contact_edges.len();
                let joint_count = body.joint_edges.len();

                for i in 0..contact_count {
                    let Some(edge) = bodies.get(handle).and_then(|b| b.contact_edges.get(i)).copied() else {
                        break;
                    };
                    let Some(contact) = contact_manager.contacts.get_mut(edge.contact) else {
                        continue;
                    };

                    // Has this contact already been added to an island?
                    if contact.flags.contains(ContactFlags::ISLAND) {
                        continue;
                    }

                    // Is this contact solid and touching?
                    if !contact.is_enabled() || !contact.is_touching() {
                        continue;
                    }

                    // Skip sensors.
                    let sensor = [contact.fixture_a, contact.fixture_b]
                        .iter()
                        .any(|&f| fixtures.get(f).is_some_and(|f| f.is_sensor));
                    if sensor {
                        continue;
                    }

                    island.add_contact(edge.contact);
                    contact.flags.insert(ContactFlags::ISLAND);

                    let Some(other) = bodies.get_mut(edge.other) else {
                        continue;
                    };

                    // Was the other body already added to this island?
                    if other.flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }

                    stack.push(edge.other);
                    other.flags.insert(BodyFlags::ISLAND);
                }

                for i in 0..joint_count {
                    let Some(edge) = bodies.get(handle).and_then(|b| b.joint_edges.get(i)).copied() else {
                        break;
                    };
                    let Some(joint) = joints.get_mut(edge.joint) else {
                        continue;
                    };

                    if joint.island_flag {
                        continue;
                    }

                    let Some(other) = bodies.get_mut(edge.other) else {
                        continue;
                    };

                    // Don't simulate joints connected to disabled bodies.
                    if !other.is_enabled() {
                        continue;
                    }

                    island.add_joint(edge.joint);
                    joint.island_flag = true;

                    if other.flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }

                    stack.push(edge.other);
                    other.flags.insert(BodyFlags::ISLAND);
                }
            }

            let mut world = IslandWorld {
                bodies: &mut *bodies,
                fixtures: &*fixtures,
                contacts: &mut contact_manager.contacts,
                joints: &mut *joints,
                listener: &mut contact_manager.contact_listener,
            };
            island.solve(profile, step, gravity, allow_sleep, &mut world);

            // Allow static bodies to participate in other islands.
            for &handle in &island.bodies {
                if let Some(body) = bodies.get_mut(handle) {
                    if body.body_type == BodyType::Static {
                        body.flags.remove(BodyFlags::ISLAND);
                    }
                }
            }
        }

        let timer = Instant::now();

        // Synchronize fixtures, check for out of range bodies.
        for body in bodies.values() {
            // If a body was not in an island then it did not move.
            if !body.flags.contains(BodyFlags::ISLAND) || body.body_type == BodyType::Static {
                continue;
            }

            synchronize_fixtures(body, fixtures, &mut contact_manager.broad_phase);
        }

        // Look for new contacts.
        contact_manager.find_new_contacts(bodies, fixtures, joints);
        profile.broadphase = timer.elapsed();
    }

    /// Finds the earliest time of impact among the active contacts, moves the
    /// two bodies there and solves a small island around them. Repeats until
    /// the step is free of impacts, or once when sub-stepping. Returns the
    /// number of impacts handled.
    fn solve_toi(&mut self, step: &TimeStep) -> usize {
        let sub_stepping = self.config.sub_stepping;
        let World { bodies, fixtures, joints, contact_manager, island, step_complete, .. } = self;

        if *step_complete {
            for body in bodies.values_mut() {
                body.flags.remove(BodyFlags::ISLAND);
                body.sweep.alpha0 = 0.0;
            }

            for contact in contact_manager.contacts.values_mut() {
                // Invalidate TOI
                contact.flags.remove(ContactFlags::TOI | ContactFlags::ISLAND);
                contact.toi_count = 0;
                contact.toi = 1.0;
            }
        }

        let mut events = 0;

        // Find TOI events and solve them.
        loop {
            // Find the first TOI.
            let mut min_contact = None;
            let mut min_alpha = 1.0;

            for (handle, contact) in contact_manager.contacts.iter_mut() {
                // Is this contact disabled?
                if !contact.is_enabled() {
                    continue;
                }

                // Prevent excessive sub-stepping.
                if contact.toi_count > MAX_SUB_STEPS {
                    continue;
                }

                let alpha = if contact.flags.contains(ContactFlags::TOI) {
                    // This contact has a valid cached TOI.
                    contact.toi
                } else {
                    let (Some(fixture_a), Some(fixture_b)) =
                        (fixtures.get(contact.fixture_a), fixtures.get(contact.fixture_b))
                    else {
                        continue;
                    };

                    // Is there a sensor?
                    if fixture_a.is_sensor || fixture_b.is_sensor {
                        continue;
                    }

                    let (Some(a), Some(b)) = (bodies.get(contact.body_a), bodies.get(contact.body_b)) else {
                        continue;
                    };

                    let active_a = a.is_awake() && a.body_type != BodyType::Static;
                    let active_b = b.is_awake() && b.body_type != BodyType::Static;

                    // Is at least one body active (awake and dynamic or kinematic)?
                    if !active_a && !active_b {
                        continue;
                    }

                    let collide_a = a.is_bullet() || a.body_type != BodyType::Dynamic;
                    let collide_b = b.is_bullet() || b.body_type != BodyType::Dynamic;

                    // Are these two non-bullet dynamic bodies?
                    if !collide_a && !collide_b {
                        continue;
                    }

                    // Compute the TOI for this contact.
                    // Put the sweeps onto the same time interval.
                    let mut sweep_a = a.sweep;
                    let mut sweep_b = b.sweep;
                    let alpha0 = if sweep_a.alpha0 < sweep_b.alpha0 {
                        sweep_a.advance(sweep_b.alpha0);
                        sweep_b.alpha0
                    } else if sweep_b.alpha0 < sweep_a.alpha0 {
                        sweep_b.advance(sweep_a.alpha0);
                        sweep_a.alpha0
                    } else {
                        sweep_a.alpha0
                    };

                    debug_assert!(alpha0 < 1.0);

                    let input = ToiInput {
                        proxy_a: DistanceProxy::from_shape(&fixture_a.shape, contact.child_a),
                        proxy_b: DistanceProxy::from_shape(&fixture_b.shape, contact.child_b),
                        sweep_a,
                        sweep_b,
                        t_max: 1.0,
                    };

                    let body_a = contact.body_a;
                    let body_b = contact.body_b;
                    if let Some(a) = bodies.get_mut(body_a) {
                        a.sweep = sweep_a;
                    }
                    if let Some(b) = bodies.get_mut(body_b) {
                        b.sweep = sweep_b;
                    }

                    let output = time_of_impact(&input);

                    // Beta is the fraction of the remaining portion of the sweep.
                    let alpha = if output.state == ToiState::Touching {
                        (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
                    } else {
                        1.0
                    };

                    contact.toi = alpha;
                    contact.flags.insert(ContactFlags::TOI);
                    alpha
                };

                if alpha < min_alpha {
                    // This is the minimum TOI found so far.
                    min_contact = Some(handle);
                    min_alpha = alpha;
                }
            }

            let Some(min_handle) = min_contact.filter(|_| min_alpha <= 1.0 - 10.0 * f32::EPSILON) else {
                // No more TOI events. Done!
                *step_complete = true;
                break;
            };

            let Some(contact) = contact_manager.contacts.get(min_handle) else {
                *step_complete = true;
                break;
            };
            let (handle_a, handle_b) = (contact.body_a, contact.body_b);
            let (fixture_a_handle, fixture_b_handle) = (contact.fixture_a, contact.fixture_b);
            let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(fixture_a_handle), fixtures.get(fixture_b_handle))
            else {
                *step_complete = true;
                break;
            };
            let (Some(backup_a), Some(backup_b)) =
                (bodies.get(handle_a).map(|b| b.sweep), bodies.get(handle_b).map(|b| b.sweep))
            else {
                *step_complete = true;
                break;
            };

            // Advance the bodies to the TOI.
            for handle in [handle_a, handle_b] {
                if let Some(body) = bodies.get_mut(handle) {
                    body.advance(min_alpha);
                }
            }

            // The TOI contact likely has some new contact points.
            let solid = match contact_manager.contacts.get_mut(min_handle) {
                Some(contact) => {
                    contact.update(fixture_a, fixture_b, bodies, &mut contact_manager.contact_listener);
                    contact.flags.remove(ContactFlags::TOI);
                    contact.toi_count += 1;

                    // Is the contact solid?
                    if !contact.is_enabled() || !contact.is_touching() {
                        // Restore the sweeps.
                        contact.set_enabled(false);
                        false
                    } else {
                        true
                    }
                }
                None => false,
            };

            if !solid {
                for (handle, backup) in [(handle_a, backup_a), (handle_b, backup_b)] {
                    if let Some(body) = bodies.get_mut(handle) {
                        body.sweep = backup;
                        body.synchronize_transform();
                    }
                }
                continue;
            }

            // Build the island
            island.clear();
            for handle in [handle_a, handle_b] {
                if let Some(body) = bodies.get_mut(handle) {
                    body.set_awake(true);
                    island.add_body(handle, body);
                    body.flags.insert(BodyFlags::ISLAND);
                }
            }
            island.add_contact(min_handle);
            if let Some(contact) = contact_manager.contacts.get_mut(min_handle) {
                contact.flags.insert(ContactFlags::ISLAND);
            }

            // Get contacts on bodyA and bodyB.
            for handle in [handle_a, handle_b] {
                let Some(body) = bodies.get(handle) else {
                    continue;
                };
                if body.body_type != BodyType::Dynamic {
                    continue;
                }
                let body_is_bullet = body.is_bullet();
                let edge_count = body.contact_edges.len();

                for i in 0..edge_count {
                    if island.body_count() == 2 * MAX_TOI_CONTACTS || island.contact_count() == MAX_TOI_CONTACTS {
                        break;
                    }

                    let Some(edge) = bodies.get(handle).and_then(|b| b.contact_edges.get(i)).copied() else {
                        break;
                    };
                    let Some(contact) = contact_manager.contacts.get(edge.contact) else {
                        continue;
                    };

                    // Has this contact already been added to the island?
                    if contact.flags.contains(ContactFlags::ISLAND) {
                        continue;
                    }

                    let Some(other) = bodies.get(edge.other) else {
                        continue;
                    };

                    // Only add static, kinematic, or bullet bodies.
                    if other.body_type == BodyType::Dynamic && !body_is_bullet && !other.is_bullet() {
                        continue;
                    }

                    // Skip sensors.
                    let (Some(fixture_a), Some(fixture_b)) =
                        (fixtures.get(contact.fixture_a), fixtures.get(contact.fixture_b))
                    else {
                        continue;
                    };
                    if fixture_a.is_sensor || fixture_b.is_sensor {
                        continue;
                    }

                    // Tentatively advance the body to the TOI.
                    let backup = other.sweep;
                    let other_in_island = other.flags.contains(BodyFlags::ISLAND);
                    if !other_in_island {
                        if let Some(other) = bodies.get_mut(edge.other) {
                            other.advance(min_alpha);
                        }
                    }

                    // Update the contact points
                    let Some(contact) = contact_manager.contacts.get_mut(edge.contact) else {
                        continue;
                    };
                    contact.update(fixture_a, fixture_b, bodies, &mut contact_manager.contact_listener);

                    // Was the contact disabled by the user?
                    // Are there contact points?
                    if !contact.is_enabled() || !contact.is_touching() {
                        if let Some(other) = bodies.get_mut(edge.other) {
                            other.sweep = backup;
                            other.synchronize_transform();
                        }
                        continue;
                    }

                    // Add the contact to the island
                    contact.flags.insert(ContactFlags::ISLAND);
                    island.add_contact(edge.contact);

                    // Has the other body already been added to the island?
                    let Some(other) = bodies.get_mut(edge.other) else {
                        continue;
                    };
                    if other.flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }

                    // Add the other body to the island.
                    other.flags.insert(BodyFlags::ISLAND);
                    if other.body_type != BodyType::Static {
                        other.set_awake(true);
                    }
                    island.add_body(edge.other, other);
                }
            }

            let dt = (1.0 - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: 1.0 / dt,
                dt_ratio: 1.0,
                position_iterations: 20,
                velocity_iterations: step.velocity_iterations,
                warm_starting: false,
            };

            let index_a = bodies.get(handle_a).map_or(0, |b| b.island_index);
            let index_b = bodies.get(handle_b).map_or(0, |b| b.island_index);

            let mut world = IslandWorld {
                bodies: &mut *bodies,
                fixtures: &*fixtures,
                contacts: &mut contact_manager.contacts,
                joints: &mut *joints,
                listener: &mut contact_manager.contact_listener,
            };
            island.solve_toi(&sub_step, index_a, index_b, &mut world);

            // Reset island flags and synchronize broad-phase proxies.
            for &handle in &island.bodies {
                let Some(body) = bodies.get_mut(handle) else {
                    continue;
                };
                body.flags.remove(BodyFlags::ISLAND);

                if body.body_type != BodyType::Dynamic {
                    continue;
                }

                synchronize_fixtures(body, fixtures, &mut contact_manager.broad_phase);

                // Invalidate all contact TOIs on this displaced body.
                for edge in &body.contact_edges {
                    if let Some(contact) = contact_manager.contacts.get_mut(edge.contact) {
                        contact.flags.remove(ContactFlags::TOI | ContactFlags::ISLAND);
                    }
                }
            }

            // Commit fixture proxy movements to the broad-phase so that new
            // contacts are created. Also, some contacts can be destroyed.
            contact_manager.find_new_contacts(bodies, fixtures, joints);
            events += 1;

            if sub_stepping {
                *step_complete = false;
                break;
            }
        }

        events
    }
}
