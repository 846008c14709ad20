//! Debug drawing sink.
//!
//! The world turns its state into primitives and hands them to a
//! [`DebugDraw`] implementation; rendering is entirely up to the caller.

use bitflags::bitflags;

use crate::math::{Transform, Vec2};

bitflags! {
    /// What [`World::debug_draw`](crate::World::debug_draw) emits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawFlags: u32 {
        /// Fixture shapes
        const SHAPES         = 1 << 0;
        /// Joint connections
        const JOINTS         = 1 << 1;
        /// Broad-phase fat AABBs
        const AABBS          = 1 << 2;
        /// Broad-phase pairs
        const PAIRS          = 1 << 3;
        /// Centers of mass
        const CENTER_OF_MASS = 1 << 4;
    }
}

/// RGBA color with components in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(0.5, 0.5, 0.5)
    }
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Same color with scaled RGB, used for fill colors
    pub fn scaled(self, s: f32) -> Self {
        Self::new(s * self.r, s * self.g, s * self.b, self.a)
    }
}

/// Receives debug geometry in world coordinates
pub trait DebugDraw {
    /// Closed polygon outline, vertices in counter-clockwise order
    fn draw_polygon(&mut self, vertices: &[Vec2], color: Color);

    fn draw_solid_polygon(&mut self, vertices: &[Vec2], color: Color);

    fn draw_circle(&mut self, center: Vec2, radius: f32, color: Color);

    fn draw_solid_circle(&mut self, center: Vec2, radius: f32, axis: Vec2, color: Color);

    fn draw_segment(&mut self, p1: Vec2, p2: Vec2, color: Color);

    /// Draws a frame: red x-axis, green y-axis
    fn draw_transform(&mut self, xf: Transform);

    fn draw_point(&mut self, p: Vec2, size: f32, color: Color);
}
