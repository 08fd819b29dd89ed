//! Graphics backend boundary.
//!
//! The stage records ops and replays them against this trait once per
//! frame; nothing else in the crate talks to the device. Offscreen target
//! management is the one surface that can fail, and the stage degrades to
//! uncached painting when it does.

use std::collections::HashMap;

use thiserror::Error;

use crate::color::Color;
use crate::geometry::RectF;
use crate::ops::Vertex;
use crate::transform::Transform;

/// Handle to a backend-owned offscreen render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub u32);

/// Handle to a backend-compiled shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Blend modes the stage resets between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blend {
    #[default]
    Alpha,
    Add,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("offscreen target allocation failed ({width}x{height})")]
    TargetAllocation { width: u32, height: u32 },
    #[error("unknown offscreen target {0:?}")]
    UnknownTarget(TargetId),
}

pub trait Backend {
    fn set_program(&mut self, program: ProgramId);
    fn set_projection(&mut self, width: f32, height: f32);
    fn set_transform(&mut self, transform: Transform);
    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    /// `bounds` is in root space; `radii` are corner radii in
    /// top-left, top-right, bottom-right, bottom-left order.
    fn set_clip(&mut self, bounds: RectF, radii: [f32; 4]);
    fn set_source_texture(&mut self, target: TargetId);
    fn set_color(&mut self, color: Color);
    fn set_opacity(&mut self, opacity: f32);
    fn set_blend(&mut self, blend: Blend);
    /// Draw a quad list: every four vertices form one quad.
    fn draw(&mut self, vertices: &[Vertex]);
    fn clear(&mut self, color: Color);
    fn push_debug_group(&mut self, label: &str);
    fn pop_debug_group(&mut self);

    fn create_offscreen_target(&mut self, width: u32, height: u32)
        -> Result<TargetId, BackendError>;
    fn resize_offscreen_target(
        &mut self,
        target: TargetId,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;
    fn destroy_offscreen_target(&mut self, target: TargetId);
    /// Route subsequent draws into `target`, or back to the frame for `None`.
    fn bind_target(&mut self, target: Option<TargetId>);
}

/// One backend call, as recorded by [`TraceBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum TraceCall {
    Program(ProgramId),
    Projection(f32, f32),
    Transform(Transform),
    Viewport(i32, i32, i32, i32),
    Clip(RectF, [f32; 4]),
    Texture(TargetId),
    Color(Color),
    Opacity(f32),
    Blend(Blend),
    /// Vertex count of one draw call.
    Draw(usize),
    Clear(Color),
    DebugPush(String),
    DebugPop,
    CreateTarget(TargetId, u32, u32),
    ResizeTarget(TargetId, u32, u32),
    DestroyTarget(TargetId),
    Bind(Option<TargetId>),
}

/// Backend that records every call instead of touching a device.
///
/// Tests assert on [`calls`](Self::calls); demos print them. Target
/// allocation hands out incrementing ids and can be made to fail to
/// exercise degraded paths.
#[derive(Debug, Default)]
pub struct TraceBackend {
    pub calls: Vec<TraceCall>,
    pub fail_allocations: bool,
    next_target: u32,
    targets: HashMap<TargetId, (u32, u32)>,
}

impl TraceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of live offscreen targets.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Allocated size of a live target.
    pub fn target_size(&self, target: TargetId) -> Option<(u32, u32)> {
        self.targets.get(&target).copied()
    }

    pub fn draw_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, TraceCall::Draw(_)))
            .count()
    }
}

impl Backend for TraceBackend {
    fn set_program(&mut self, program: ProgramId) {
        self.calls.push(TraceCall::Program(program));
    }

    fn set_projection(&mut self, width: f32, height: f32) {
        self.calls.push(TraceCall::Projection(width, height));
    }

    fn set_transform(&mut self, transform: Transform) {
        self.calls.push(TraceCall::Transform(transform));
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.calls.push(TraceCall::Viewport(x, y, width, height));
    }

    fn set_clip(&mut self, bounds: RectF, radii: [f32; 4]) {
        self.calls.push(TraceCall::Clip(bounds, radii));
    }

    fn set_source_texture(&mut self, target: TargetId) {
        self.calls.push(TraceCall::Texture(target));
    }

    fn set_color(&mut self, color: Color) {
        self.calls.push(TraceCall::Color(color));
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.calls.push(TraceCall::Opacity(opacity));
    }

    fn set_blend(&mut self, blend: Blend) {
        self.calls.push(TraceCall::Blend(blend));
    }

    fn draw(&mut self, vertices: &[Vertex]) {
        self.calls.push(TraceCall::Draw(vertices.len()));
    }

    fn clear(&mut self, color: Color) {
        self.calls.push(TraceCall::Clear(color));
    }

    fn push_debug_group(&mut self, label: &str) {
        self.calls.push(TraceCall::DebugPush(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        self.calls.push(TraceCall::DebugPop);
    }

    fn create_offscreen_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<TargetId, BackendError> {
        if self.fail_allocations {
            return Err(BackendError::TargetAllocation { width, height });
        }
        let id = TargetId(self.next_target);
        self.next_target += 1;
        self.targets.insert(id, (width, height));
        self.calls.push(TraceCall::CreateTarget(id, width, height));
        Ok(id)
    }

    fn resize_offscreen_target(
        &mut self,
        target: TargetId,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        match self.targets.get_mut(&target) {
            Some(size) => {
                *size = (width, height);
                self.calls.push(TraceCall::ResizeTarget(target, width, height));
                Ok(())
            }
            None => Err(BackendError::UnknownTarget(target)),
        }
    }

    fn destroy_offscreen_target(&mut self, target: TargetId) {
        self.targets.remove(&target);
        self.calls.push(TraceCall::DestroyTarget(target));
    }

    fn bind_target(&mut self, target: Option<TargetId>) {
        self.calls.push(TraceCall::Bind(target));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_targets_get_unique_ids() {
        let mut b = TraceBackend::new();
        let a = b.create_offscreen_target(64, 64).unwrap();
        let c = b.create_offscreen_target(128, 32).unwrap();
        assert_ne!(a, c);
        assert_eq!(b.target_count(), 2);
        assert_eq!(b.target_size(c), Some((128, 32)));
    }

    #[test]
    fn failed_allocation_reports_size() {
        let mut b = TraceBackend::new();
        b.fail_allocations = true;
        let err = b.create_offscreen_target(256, 256).unwrap_err();
        assert!(matches!(
            err,
            BackendError::TargetAllocation { width: 256, height: 256 }
        ));
        assert_eq!(b.target_count(), 0);
    }

    #[test]
    fn resize_unknown_target_errors() {
        let mut b = TraceBackend::new();
        assert!(b.resize_offscreen_target(TargetId(9), 8, 8).is_err());
    }

    #[test]
    fn destroy_forgets_target() {
        let mut b = TraceBackend::new();
        let t = b.create_offscreen_target(64, 64).unwrap();
        b.destroy_offscreen_target(t);
        assert_eq!(b.target_count(), 0);
        assert_eq!(b.target_size(t), None);
    }
}
