//! Joints constrain the relative motion of two bodies.
//!
//! Every joint is a [`Joint`] owned by the world, holding the bodies it
//! connects and a [`JointKind`] with the variant-specific state. The
//! island solver drives all variants through the same three phases:
//! velocity initialization, velocity iterations and position iterations.

mod distance;
mod friction;
mod gear;
mod motor;
mod mouse;
mod prismatic;
mod pulley;
mod revolute;
mod weld;
mod wheel;

use std::f32::consts::PI;

use slotmap::{new_key_type, SlotMap};

use crate::dynamics::{Body, BodyHandle, BodyType, SolverBody, SolverData};
use crate::error::{Error, Result};
use crate::math::Vec2;

pub use distance::{DistanceJoint, DistanceJointDef};
pub use friction::{FrictionJoint, FrictionJointDef};
pub use gear::{GearJoint, GearJointDef};
pub use motor::{MotorJoint, MotorJointDef};
pub use mouse::{MouseJoint, MouseJointDef};
pub use prismatic::{PrismaticJoint, PrismaticJointDef};
pub use pulley::{PulleyJoint, PulleyJointDef};
pub use revolute::{RevoluteJoint, RevoluteJointDef};
pub use weld::{WeldJoint, WeldJointDef};
pub use wheel::{WheelJoint, WheelJointDef};

use gear::GearSide;

new_key_type! {
    /// Stable handle to a joint owned by a world
    pub struct JointHandle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum JointType {
    Distance,
    Friction,
    Gear,
    Motor,
    Mouse,
    Prismatic,
    Pulley,
    Revolute,
    Weld,
    Wheel,
}

/// Definition of any joint, passed to
/// [`World::create_joint`](crate::World::create_joint)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum JointDef {
    Distance(DistanceJointDef),
    Friction(FrictionJointDef),
    Gear(GearJointDef),
    Motor(MotorJointDef),
    Mouse(MouseJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
    Revolute(RevoluteJointDef),
    Weld(WeldJointDef),
    Wheel(WheelJointDef),
}

macro_rules! joint_def_from {
    ($($variant:ident => $def:ty),* $(,)?) => {
        $(
            impl From<$def> for JointDef {
                fn from(def: $def) -> Self {
                    JointDef::$variant(def)
                }
            }
        )*
    };
}

joint_def_from! {
    Distance => DistanceJointDef,
    Friction => FrictionJointDef,
    Gear => GearJointDef,
    Motor => MotorJointDef,
    Mouse => MouseJointDef,
    Prismatic => PrismaticJointDef,
    Pulley => PulleyJointDef,
    Revolute => RevoluteJointDef,
    Weld => WeldJointDef,
    Wheel => WheelJointDef,
}

impl JointDef {
    pub fn joint_type(&self) -> JointType {
        match self {
            Self::Distance(_) => JointType::Distance,
            Self::Friction(_) => JointType::Friction,
            Self::Gear(_) => JointType::Gear,
            Self::Motor(_) => JointType::Motor,
            Self::Mouse(_) => JointType::Mouse,
            Self::Prismatic(_) => JointType::Prismatic,
            Self::Pulley(_) => JointType::Pulley,
            Self::Revolute(_) => JointType::Revolute,
            Self::Weld(_) => JointType::Weld,
            Self::Wheel(_) => JointType::Wheel,
        }
    }

    /// The two bodies named by the definition. Gear joints take their
    /// bodies from the joints they couple and return `None`.
    pub fn bodies(&self) -> Option<(BodyHandle, BodyHandle)> {
        match self {
            Self::Distance(d) => Some((d.body_a, d.body_b)),
            Self::Friction(d) => Some((d.body_a, d.body_b)),
            Self::Gear(_) => None,
            Self::Motor(d) => Some((d.body_a, d.body_b)),
            Self::Mouse(d) => Some((d.body_a, d.body_b)),
            Self::Prismatic(d) => Some((d.body_a, d.body_b)),
            Self::Pulley(d) => Some((d.body_a, d.body_b)),
            Self::Revolute(d) => Some((d.body_a, d.body_b)),
            Self::Weld(d) => Some((d.body_a, d.body_b)),
            Self::Wheel(d) => Some((d.body_a, d.body_b)),
        }
    }

    pub fn collide_connected(&self) -> bool {
        match self {
            Self::Distance(d) => d.collide_connected,
            Self::Friction(d) => d.collide_connected,
            Self::Gear(d) => d.collide_connected,
            Self::Motor(d) => d.collide_connected,
            Self::Mouse(d) => d.collide_connected,
            Self::Prismatic(d) => d.collide_connected,
            Self::Pulley(d) => d.collide_connected,
            Self::Revolute(d) => d.collide_connected,
            Self::Weld(d) => d.collide_connected,
            Self::Wheel(d) => d.collide_connected,
        }
    }
}

/// Variant-specific joint state
#[derive(Debug, Clone)]
pub enum JointKind {
    Distance(DistanceJoint),
    Friction(FrictionJoint),
    Gear(GearJoint),
    Motor(MotorJoint),
    Mouse(MouseJoint),
    Prismatic(PrismaticJoint),
    Pulley(PulleyJoint),
    Revolute(RevoluteJoint),
    Weld(WeldJoint),
    Wheel(WheelJoint),
}

/// A constraint between two bodies
#[derive(Debug, Clone)]
pub struct Joint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collide_connected: bool,
    pub(crate) island_flag: bool,
    pub(crate) user_data: u64,
    pub(crate) kind: JointKind,
}

macro_rules! joint_accessors {
    ($($variant:ident, $as_ref:ident, $as_mut:ident => $ty:ty;)*) => {
        $(
            #[inline]
            pub fn $as_ref(&self) -> Option<&$ty> {
                match &self.kind {
                    JointKind::$variant(joint) => Some(joint),
                    _ => None,
                }
            }

            #[inline]
            pub fn $as_mut(&mut self) -> Option<&mut $ty> {
                match &mut self.kind {
                    JointKind::$variant(joint) => Some(joint),
                    _ => None,
                }
            }
        )*
    };
}

impl Joint {
    /// Builds a joint from its definition, validating the bodies and, for
    /// gears, the coupled joints
    pub(crate) fn new(
        def: &JointDef,
        bodies: &SlotMap<BodyHandle, Body>,
        joints: &SlotMap<JointHandle, Joint>,
    ) -> Result<Self> {
        let (body_a, body_b, kind) = match def {
            JointDef::Gear(gear) => {
                let joint1 = joints.get(gear.joint1).ok_or(Error::InvalidJoint(gear.joint1))?;
                let joint2 = joints.get(gear.joint2).ok_or(Error::InvalidJoint(gear.joint2))?;
                let side1 = joint1.gear_side().ok_or(Error::InvalidGearJoint)?;
                let side2 = joint2.gear_side().ok_or(Error::InvalidGearJoint)?;

                let a = bodies.get(joint1.body_b).ok_or(Error::InvalidBody(joint1.body_b))?;
                let b = bodies.get(joint2.body_b).ok_or(Error::InvalidBody(joint2.body_b))?;
                let c = bodies.get(joint1.body_a).ok_or(Error::InvalidBody(joint1.body_a))?;
                let d = bodies.get(joint2.body_a).ok_or(Error::InvalidBody(joint2.body_a))?;

                if a.body_type != BodyType::Dynamic || b.body_type != BodyType::Dynamic {
                    return Err(Error::InvalidGearJoint);
                }

                let joint = GearJoint::new(gear, side1, side2, a, (joint1.body_a, c), b, (joint2.body_a, d));
                (joint1.body_b, joint2.body_b, JointKind::Gear(joint))
            }
            _ => {
                let Some((body_a, body_b)) = def.bodies() else {
                    return Err(Error::InvalidGearJoint);
                };
                if !bodies.contains_key(body_a) {
                    return Err(Error::InvalidBody(body_a));
                }
                let b = bodies.get(body_b).ok_or(Error::InvalidBody(body_b))?;
                let kind = JointKind::from_def(def, b).ok_or(Error::InvalidGearJoint)?;
                (body_a, body_b, kind)
            }
        };

        if body_a == body_b {
            return Err(Error::SameBody);
        }

        Ok(Self {
            body_a,
            body_b,
            collide_connected: def.collide_connected(),
            island_flag: false,
            user_data: 0,
            kind,
        })
    }

    #[inline]
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    #[inline]
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// Whether the connected bodies may still collide with each other
    #[inline]
    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    pub fn joint_type(&self) -> JointType {
        match self.kind {
            JointKind::Distance(_) => JointType::Distance,
            JointKind::Friction(_) => JointType::Friction,
            JointKind::Gear(_) => JointType::Gear,
            JointKind::Motor(_) => JointType::Motor,
            JointKind::Mouse(_) => JointType::Mouse,
            JointKind::Prismatic(_) => JointType::Prismatic,
            JointKind::Pulley(_) => JointType::Pulley,
            JointKind::Revolute(_) => JointType::Revolute,
            JointKind::Weld(_) => JointType::Weld,
            JointKind::Wheel(_) => JointType::Wheel,
        }
    }

    #[inline]
    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    #[inline]
    pub fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    pub fn set_user_data(&mut self, user_data: u64) {
        self.user_data = user_data;
    }

    joint_accessors! {
        Distance, as_distance, as_distance_mut => DistanceJoint;
        Friction, as_friction, as_friction_mut => FrictionJoint;
        Gear, as_gear, as_gear_mut => GearJoint;
        Motor, as_motor, as_motor_mut => MotorJoint;
        Mouse, as_mouse, as_mouse_mut => MouseJoint;
        Prismatic, as_prismatic, as_prismatic_mut => PrismaticJoint;
        Pulley, as_pulley, as_pulley_mut => PulleyJoint;
        Revolute, as_revolute, as_revolute_mut => RevoluteJoint;
        Weld, as_weld, as_weld_mut => WeldJoint;
        Wheel, as_wheel, as_wheel_mut => WheelJoint;
    }

    /// World anchor on body A, which must be the joint's body A
    pub fn anchor_a(&self, a: &Body) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => j.anchor_a(a),
            JointKind::Friction(j) => j.anchor_a(a),
            JointKind::Gear(j) => j.anchor_a(a),
            JointKind::Motor(j) => j.anchor_a(a),
            JointKind::Mouse(j) => j.anchor_a(),
            JointKind::Prismatic(j) => j.anchor_a(a),
            JointKind::Pulley(j) => j.anchor_a(a),
            JointKind::Revolute(j) => j.anchor_a(a),
            JointKind::Weld(j) => j.anchor_a(a),
            JointKind::Wheel(j) => j.anchor_a(a),
        }
    }

    /// World anchor on body B, which must be the joint's body B
    pub fn anchor_b(&self, b: &Body) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => j.anchor_b(b),
            JointKind::Friction(j) => j.anchor_b(b),
            JointKind::Gear(j) => j.anchor_b(b),
            JointKind::Motor(j) => j.anchor_b(b),
            JointKind::Mouse(j) => j.anchor_b(b),
            JointKind::Prismatic(j) => j.anchor_b(b),
            JointKind::Pulley(j) => j.anchor_b(b),
            JointKind::Revolute(j) => j.anchor_b(b),
            JointKind::Weld(j) => j.anchor_b(b),
            JointKind::Wheel(j) => j.anchor_b(b),
        }
    }

    /// Reaction force on body B at the joint anchor, in N
    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => j.reaction_force(inv_dt),
            JointKind::Friction(j) => j.reaction_force(inv_dt),
            JointKind::Gear(j) => j.reaction_force(inv_dt),
            JointKind::Motor(j) => j.reaction_force(inv_dt),
            JointKind::Mouse(j) => j.reaction_force(inv_dt),
            JointKind::Prismatic(j) => j.reaction_force(inv_dt),
            JointKind::Pulley(j) => j.reaction_force(inv_dt),
            JointKind::Revolute(j) => j.reaction_force(inv_dt),
            JointKind::Weld(j) => j.reaction_force(inv_dt),
            JointKind::Wheel(j) => j.reaction_force(inv_dt),
        }
    }

    /// Reaction torque on body B, in N*m
    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        match &self.kind {
            JointKind::Friction(j) => j.reaction_torque(inv_dt),
            JointKind::Gear(j) => j.reaction_torque(inv_dt),
            JointKind::Motor(j) => j.reaction_torque(inv_dt),
            JointKind::Prismatic(j) => j.reaction_torque(inv_dt),
            JointKind::Revolute(j) => j.reaction_torque(inv_dt),
            JointKind::Weld(j) => j.reaction_torque(inv_dt),
            JointKind::Wheel(j) => j.reaction_torque(inv_dt),
            JointKind::Distance(_) | JointKind::Mouse(_) | JointKind::Pulley(_) => 0.0,
        }
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        match &mut self.kind {
            JointKind::Mouse(j) => j.shift_origin(new_origin),
            JointKind::Pulley(j) => j.shift_origin(new_origin),
            _ => {}
        }
    }

    fn gear_side(&self) -> Option<GearSide> {
        match &self.kind {
            JointKind::Revolute(j) => Some(GearSide::Revolute {
                local_anchor_ground: j.local_anchor_a(),
                local_anchor_body: j.local_anchor_b(),
                reference_angle: j.reference_angle(),
            }),
            JointKind::Prismatic(j) => Some(GearSide::Prismatic {
                local_anchor_ground: j.local_anchor_a(),
                local_anchor_body: j.local_anchor_b(),
                reference_angle: j.reference_angle(),
                local_axis: j.local_axis_a(),
            }),
            _ => None,
        }
    }

    pub(crate) fn init_velocity_constraints(&mut self, bodies: &SlotMap<BodyHandle, Body>, data: &mut SolverData) {
        let (Some(body_a), Some(body_b)) = (bodies.get(self.body_a), bodies.get(self.body_b)) else {
            return;
        };
        let (a, b) = (SolverBody::new(body_a), SolverBody::new(body_b));

        match &mut self.kind {
            JointKind::Distance(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Friction(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Gear(j) => {
                let (Some(c), Some(d)) = (bodies.get(j.body_c), bodies.get(j.body_d)) else {
                    return;
                };
                j.init_velocity_constraints([a, b, SolverBody::new(c), SolverBody::new(d)], data);
            }
            JointKind::Motor(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Mouse(j) => j.init_velocity_constraints(b, data),
            JointKind::Prismatic(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Pulley(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Revolute(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Weld(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Wheel(j) => j.init_velocity_constraints(a, b, data),
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_velocity_constraints(data),
            JointKind::Friction(j) => j.solve_velocity_constraints(data),
            JointKind::Gear(j) => j.solve_velocity_constraints(data),
            JointKind::Motor(j) => j.solve_velocity_constraints(data),
            JointKind::Mouse(j) => j.solve_velocity_constraints(data),
            JointKind::Prismatic(j) => j.solve_velocity_constraints(data),
            JointKind::Pulley(j) => j.solve_velocity_constraints(data),
            JointKind::Revolute(j) => j.solve_velocity_constraints(data),
            JointKind::Weld(j) => j.solve_velocity_constraints(data),
            JointKind::Wheel(j) => j.solve_velocity_constraints(data),
        }
    }

    /// Returns true when the joint error is within tolerance
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_position_constraints(data),
            JointKind::Friction(j) => j.solve_position_constraints(data),
            JointKind::Gear(j) => j.solve_position_constraints(data),
            JointKind::Motor(j) => j.solve_position_constraints(data),
            JointKind::Mouse(_) => true,
            JointKind::Prismatic(j) => j.solve_position_constraints(data),
            JointKind::Pulley(j) => j.solve_position_constraints(data),
            JointKind::Revolute(j) => j.solve_position_constraints(data),
            JointKind::Weld(j) => j.solve_position_constraints(data),
            JointKind::Wheel(j) => j.solve_position_constraints(data),
        }
    }
}

impl JointKind {
    /// Gears need their coupled joints and yield `None` here
    fn from_def(def: &JointDef, b: &Body) -> Option<Self> {
        let kind = match def {
            JointDef::Distance(d) => Self::Distance(DistanceJoint::new(d)),
            JointDef::Friction(d) => Self::Friction(FrictionJoint::new(d)),
            JointDef::Motor(d) => Self::Motor(MotorJoint::new(d)),
            JointDef::Mouse(d) => Self::Mouse(MouseJoint::new(d, b)),
            JointDef::Prismatic(d) => Self::Prismatic(PrismaticJoint::new(d)),
            JointDef::Pulley(d) => Self::Pulley(PulleyJoint::new(d)),
            JointDef::Revolute(d) => Self::Revolute(RevoluteJoint::new(d)),
            JointDef::Weld(d) => Self::Weld(WeldJoint::new(d)),
            JointDef::Wheel(d) => Self::Wheel(WheelJoint::new(d)),
            JointDef::Gear(_) => return None,
        };
        Some(kind)
    }
}

/// Applies an equal and opposite impulse `p` at the anchors plus an
/// angular impulse, body A receiving the negative.
#[inline]
pub(crate) fn apply_impulse(
    data: &mut SolverData,
    a: &SolverBody,
    r_a: Vec2,
    b: &SolverBody,
    r_b: Vec2,
    p: Vec2,
    angular: f32,
) {
    let va = &mut data.velocities[a.index];
    va.v -= p * a.inv_mass;
    va.w -= a.inv_i * (r_a.cross(p) + angular);

    let vb = &mut data.velocities[b.index];
    vb.v += p * b.inv_mass;
    vb.w += b.inv_i * (r_b.cross(p) + angular);
}

/// Applies a linear impulse `p` with precomputed angular terms `l_a` and
/// `l_b`, used by the axis-based joints
#[inline]
pub(crate) fn apply_jacobian(data: &mut SolverData, a: &SolverBody, b: &SolverBody, p: Vec2, l_a: f32, l_b: f32) {
    let va = &mut data.velocities[a.index];
    va.v -= p * a.inv_mass;
    va.w -= a.inv_i * l_a;

    let vb = &mut data.velocities[b.index];
    vb.v += p * b.inv_mass;
    vb.w += b.inv_i * l_b;
}

/// Reduced mass of two bodies, ignoring a body with no mass
fn reduced(a: f32, b: f32) -> f32 {
    if a > 0.0 && b > 0.0 {
        a * b / (a + b)
    } else if a > 0.0 {
        a
    } else {
        b
    }
}

/// Converts a frequency in Hz and a damping ratio into a linear
/// `(stiffness, damping)` pair for the two bodies
pub fn linear_stiffness(frequency: f32, damping_ratio: f32, a: &Body, b: &Body) -> (f32, f32) {
    let mass = reduced(a.mass(), b.mass());
    let omega = 2.0 * PI * frequency;
    (mass * omega * omega, 2.0 * mass * damping_ratio * omega)
}

/// Angular counterpart of [`linear_stiffness`], using rotational inertia
pub fn angular_stiffness(frequency: f32, damping_ratio: f32, a: &Body, b: &Body) -> (f32, f32) {
    let inertia = reduced(a.inertia(), b.inertia());
    let omega = 2.0 * PI * frequency;
    (inertia * omega * omega, 2.0 * inertia * damping_ratio * omega)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::BodyDef;
    use crate::geometry::MassData;
    use approx::assert_relative_eq;

    fn dynamic(bodies: &mut SlotMap<BodyHandle, Body>, position: Vec2) -> BodyHandle {
        let mut body = Body::new(&BodyDef::dynamic().with_position(position));
        body.set_mass_data(&MassData { mass: 2.0, center: Vec2::ZERO, inertia: 0.5 });
        bodies.insert(body)
    }

    #[test]
    fn test_def_conversion_and_type() {
        let def: JointDef = RevoluteJointDef::default().into();
        assert_eq!(def.joint_type(), JointType::Revolute);
        assert!(!def.collide_connected());

        let def: JointDef = PulleyJointDef::default().into();
        assert!(def.collide_connected());
        assert!(JointDef::from(GearJointDef::default()).bodies().is_none());
    }

    #[test]
    fn test_same_body_is_rejected() {
        let mut bodies = SlotMap::with_key();
        let a = dynamic(&mut bodies, Vec2::ZERO);
        let joints = SlotMap::with_key();

        let def = JointDef::from(WeldJointDef { body_a: a, body_b: a, ..Default::default() });
        assert_eq!(Joint::new(&def, &bodies, &joints).err(), Some(Error::SameBody));
    }

    #[test]
    fn test_gear_needs_revolute_or_prismatic() {
        let mut bodies = SlotMap::with_key();
        let ground = bodies.insert(Body::new(&BodyDef::default()));
        let a = dynamic(&mut bodies, Vec2::ZERO);
        let b = dynamic(&mut bodies, Vec2::new(2.0, 0.0));

        let mut joints: SlotMap<JointHandle, Joint> = SlotMap::with_key();
        let revolute = RevoluteJointDef::initialize(ground, &bodies[ground], a, &bodies[a], Vec2::ZERO);
        let j1 = joints.insert(Joint::new(&revolute.into(), &bodies, &joints).unwrap());
        let weld = WeldJointDef::initialize(ground, &bodies[ground], b, &bodies[b], Vec2::new(2.0, 0.0));
        let j2 = joints.insert(Joint::new(&weld.into(), &bodies, &joints).unwrap());

        let gear = JointDef::from(GearJointDef::new(j1, j2, 1.0));
        assert_eq!(Joint::new(&gear, &bodies, &joints).err(), Some(Error::InvalidGearJoint));

        let prismatic = PrismaticJointDef::initialize(ground, &bodies[ground], b, &bodies[b], Vec2::new(2.0, 0.0), Vec2::X);
        let j3 = joints.insert(Joint::new(&prismatic.into(), &bodies, &joints).unwrap());
        let gear = Joint::new(&GearJointDef::new(j1, j3, 2.0).into(), &bodies, &joints).unwrap();
        assert_eq!(gear.body_a(), a);
        assert_eq!(gear.body_b(), b);
        assert_relative_eq!(gear.as_gear().unwrap().ratio(), 2.0);
    }

    #[test]
    fn test_variant_accessors() {
        let mut bodies = SlotMap::with_key();
        let a = dynamic(&mut bodies, Vec2::ZERO);
        let b = dynamic(&mut bodies, Vec2::new(1.0, 0.0));
        let joints = SlotMap::with_key();

        let def = DistanceJointDef::initialize(a, &bodies[a], b, &bodies[b], Vec2::ZERO, Vec2::new(1.0, 0.0));
        let mut joint = Joint::new(&def.into(), &bodies, &joints).unwrap();

        assert!(joint.as_revolute().is_none());
        assert_relative_eq!(joint.as_distance().unwrap().length(), 1.0);
        joint.as_distance_mut().unwrap().set_length(2.0);
        assert_relative_eq!(joint.as_distance().unwrap().length(), 2.0);
        assert_eq!(joint.anchor_b(&bodies[b]), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_stiffness_helpers() {
        let mut bodies = SlotMap::with_key();
        let a = dynamic(&mut bodies, Vec2::ZERO);
        let ground = bodies.insert(Body::new(&BodyDef::default()));

        // Against a static body the full mass of the dynamic body is used
        let (k, d) = linear_stiffness(1.0, 0.5, &bodies[a], &bodies[ground]);
        let omega = 2.0 * PI;
        assert_relative_eq!(k, 2.0 * omega * omega, max_relative = 1e-5);
        assert_relative_eq!(d, 2.0 * 2.0 * 0.5 * omega, max_relative = 1e-5);

        let b = dynamic(&mut bodies, Vec2::ZERO);
        let (k, _) = angular_stiffness(1.0, 0.0, &bodies[a], &bodies[b]);
        assert_relative_eq!(k, 0.25 * omega * omega, max_relative = 1e-5);
    }
}
