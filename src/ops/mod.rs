//! Deferred render ops.
//!
//! Painting never talks to the graphics backend directly. The traversal
//! records typed ops through an [`OpBuilder`], which deduplicates redundant
//! state changes and merges contiguous draws, and the whole buffer is
//! replayed against the backend once per frame by [`replay`].

mod buffer;
mod builder;
mod replay;

pub use buffer::OpBuffer;
pub use builder::{OpBuilder, Recording};
pub use replay::replay;

use bytemuck::{Pod, Zeroable};

use crate::color::Color;
use crate::geometry::RectF;

/// Discriminant of one recorded op. Payload layouts live alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpKind {
    /// Sentinel at slot zero of every buffer; never replayed.
    Noop = 0,
    Program,
    Projection,
    Transform,
    Viewport,
    Clip,
    Texture,
    Color,
    Opacity,
    Draw,
    Clear,
    DebugPush,
    DebugPop,
}

/// One textured vertex. Draws are quad lists: four vertices per quad, in
/// top-left, top-right, bottom-left, bottom-right order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
}

impl Vertex {
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { x, y, u, v }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ProgramOp {
    pub program: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ProjectionOp {
    pub width: f32,
    pub height: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TransformOp {
    pub dx: f32,
    pub dy: f32,
    pub sx: f32,
    pub sy: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ViewportOp {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Clip bounds in root space plus per-corner radii
/// (top-left, top-right, bottom-right, bottom-left).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ClipOp {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub radii: [f32; 4],
}

impl ClipOp {
    pub fn new(bounds: RectF, radii: [f32; 4]) -> Self {
        Self {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            radii,
        }
    }

    pub fn bounds(&self) -> RectF {
        RectF::new(self.x, self.y, self.width, self.height)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TextureOp {
    pub target: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorOp {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl From<Color> for ColorOp {
    fn from(c: Color) -> Self {
        Self { r: c.r, g: c.g, b: c.b, a: c.a }
    }
}

impl From<ColorOp> for Color {
    fn from(op: ColorOp) -> Self {
        Color::rgba(op.r, op.g, op.b, op.a)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct OpacityOp {
    pub value: f32,
}

/// A vertex range to draw with the current state: `first..first + count`
/// into the recording's vertex array.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawOp {
    pub first: u32,
    pub count: u32,
}

/// Debug-group label, NUL-padded. Longer labels are truncated.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DebugOp {
    pub label: [u8; 32],
}

impl DebugOp {
    pub fn new(label: &str) -> Self {
        let mut out = [0u8; 32];
        let n = label.len().min(32);
        out[..n].copy_from_slice(&label.as_bytes()[..n]);
        Self { label: out }
    }

    /// The label as text. Truncation can cut a multi-byte character; the
    /// damaged tail is dropped rather than reported as an error.
    pub fn text(&self) -> &str {
        let end = self.label.iter().position(|&b| b == 0).unwrap_or(32);
        match std::str::from_utf8(&self.label[..end]) {
            Ok(s) => s,
            Err(e) => {
                let valid = e.valid_up_to();
                // Safe: valid_up_to marks a UTF-8 boundary.
                std::str::from_utf8(&self.label[..valid]).unwrap_or("")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_label_roundtrip() {
        assert_eq!(DebugOp::new("panel").text(), "panel");
        assert_eq!(DebugOp::new("").text(), "");
    }

    #[test]
    fn debug_label_truncates() {
        let long = "a".repeat(50);
        assert_eq!(DebugOp::new(&long).text(), "a".repeat(32));
    }

    #[test]
    fn color_op_roundtrip() {
        let c = Color::rgba(0.1, 0.2, 0.3, 0.4);
        assert_eq!(Color::from(ColorOp::from(c)), c);
    }
}
