//! # rustphy2d
//!
//! A 2D rigid body physics engine written in Rust.
//!
//! ## Features
//!
//! - **Rigid Body Dynamics**: static, kinematic and dynamic bodies with damping, gravity scale and sleep
//! - **Collision Shapes**: circles, polygons, edges and chains, attached to bodies through fixtures
//! - **Broad Phase**: dynamic AABB tree with fattened proxies
//! - **Narrow Phase**: SAT manifolds, GJK distance, shape casts and time of impact
//! - **Contact Solver**: sequential impulses with warm starting and a two-point block solver
//! - **Joints**: distance, revolute, prismatic, pulley, gear, wheel, weld, friction, mouse and motor
//! - **Continuous Collision**: time of impact sub-stepping keeps bullets from tunneling
//!
//! ## Quick Start
//!
//! ```rust
//! use rustphy2d::prelude::*;
//!
//! // Create a physics world
//! let mut world = World::new(Vec2::new(0.0, -10.0));
//!
//! // Create a static ground box
//! let ground = world.create_body(&BodyDef::default()).unwrap();
//! world
//!     .create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(10.0, 0.5)))
//!     .unwrap();
//!
//! // Create a dynamic ball
//! let ball = world
//!     .create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 5.0)))
//!     .unwrap();
//! world
//!     .create_fixture(ball, &FixtureDef::new(CircleShape::new(0.5)).with_density(1.0))
//!     .unwrap();
//!
//! // Simulation loop
//! let dt = 1.0 / 60.0;
//! for _ in 0..120 {
//!     world.step(dt, 8, 3);
//! }
//!
//! let position = world.body(ball).unwrap().position();
//! assert!(position.y < 5.0 && position.y > 0.5);
//! ```

pub mod callbacks;
pub mod collision;
pub mod draw;
pub mod dynamics;
pub mod error;
pub mod geometry;
pub mod joints;
pub mod math;
pub mod settings;
pub mod solver;
mod world;

pub use error::{Error, Result};
pub use world::{RayCastHit, World, WorldConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::callbacks::{ContactFilter, ContactImpulse, ContactListener, DestructionListener};
    pub use crate::collision::{Manifold, WorldManifold};
    pub use crate::draw::{Color, DebugDraw, DrawFlags};
    pub use crate::dynamics::{
        Body, BodyDef, BodyHandle, BodyType, Contact, ContactHandle, Filter, Fixture, FixtureDef, FixtureHandle,
    };
    pub use crate::error::{Error, Result};
    pub use crate::geometry::{Aabb, ChainShape, CircleShape, EdgeShape, MassData, PolygonShape, Shape, ShapeType};
    pub use crate::joints::{
        DistanceJointDef, FrictionJointDef, GearJointDef, Joint, JointDef, JointHandle, JointType, MotorJointDef,
        MouseJointDef, PrismaticJointDef, PulleyJointDef, RevoluteJointDef, WeldJointDef, WheelJointDef,
    };
    pub use crate::math::{Rot, Transform, Vec2};
    pub use crate::world::{RayCastHit, World, WorldConfig};
}
