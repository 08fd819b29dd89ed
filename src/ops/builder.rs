//! State-tracking op recorder.
//!
//! The builder eliminates redundant state changes at record time so the
//! replay loop stays a dumb interpreter:
//!
//! - every state setter is value-deduplicated against the last-known state
//!   of the active shader program, so re-setting an unchanged value is free;
//! - switching programs re-emits only the state the incoming program has
//!   not seen yet;
//! - popping a clip or transform whose op was never consumed by a draw
//!   removes the dead op instead of stacking a correction after it;
//! - contiguous draw ranges merge into a single draw op.
//!
//! Offscreen recording nests: [`begin_offscreen`](OpBuilder::begin_offscreen)
//! redirects appends into a fresh output while all state tracking continues,
//! so ops recorded after the offscreen render resumes still see the state
//! the target's replay left behind.

use crate::backend::{ProgramId, TargetId};
use crate::color::Color;
use crate::geometry::RectF;
use crate::transform::Transform;

use super::{
    ClipOp, ColorOp, DebugOp, DrawOp, OpBuffer, OpKind, OpacityOp, ProgramOp, ProjectionOp,
    TextureOp, TransformOp, Vertex, ViewportOp,
};

/// Upper bound on program ids the state table will grow to.
const MAX_PROGRAMS: usize = 64;

#[derive(Debug, Default)]
struct Output {
    ops: OpBuffer,
    vertices: Vec<Vertex>,
    work: u32,
}

/// A finished offscreen recording: ops plus the vertex array they index.
///
/// Must be replayed before the output it suspended is flushed, so the state
/// the tracker assumed while recording is the state the device actually has.
#[derive(Debug, Default)]
pub struct Recording {
    pub ops: OpBuffer,
    pub vertices: Vec<Vertex>,
    work: u32,
}

impl Recording {
    pub fn has_work(&self) -> bool {
        self.work > 0
    }
}

/// Last state emitted while a given program was active.
#[derive(Debug, Clone, Default)]
struct ProgramState {
    projection: Option<ProjectionOp>,
    transform: Option<TransformOp>,
    viewport: Option<ViewportOp>,
    clip: Option<ClipOp>,
    opacity: Option<OpacityOp>,
    color: Option<ColorOp>,
}

#[derive(Debug)]
pub struct OpBuilder {
    /// Output stack: slot 0 is the live frame, deeper entries are pending
    /// offscreen recordings.
    outputs: Vec<Output>,
    clips: Vec<ClipOp>,
    transforms: Vec<Transform>,
    programs: Vec<ProgramState>,
    active: Option<ProgramId>,
    texture: Option<TargetId>,
    projection: Option<ProjectionOp>,
    viewport: Option<ViewportOp>,
    opacity: Option<OpacityOp>,
}

impl OpBuilder {
    pub fn new() -> Self {
        Self {
            outputs: vec![Output::default()],
            clips: Vec::new(),
            transforms: Vec::new(),
            programs: Vec::new(),
            active: None,
            texture: None,
            projection: None,
            viewport: None,
            opacity: None,
        }
    }

    fn out(&mut self) -> &mut Output {
        // Invariant: always at least the live frame output.
        let last = self.outputs.len() - 1;
        &mut self.outputs[last]
    }

    fn out_ref(&self) -> &Output {
        &self.outputs[self.outputs.len() - 1]
    }

    fn slot_mut(&mut self, program: ProgramId) -> &mut ProgramState {
        let idx = program.0 as usize;
        debug_assert!(idx < MAX_PROGRAMS, "program id {idx} out of range");
        if idx >= self.programs.len() {
            self.programs.resize_with(idx + 1, ProgramState::default);
        }
        &mut self.programs[idx]
    }

    /// Append unless the most recently appended op is the same kind with an
    /// equal payload. Used when no program is active to dedup against.
    fn append_unless_tail<T: bytemuck::Pod + PartialEq>(&mut self, kind: OpKind, payload: &T) {
        let out = self.out();
        if out.ops.tail_kind() == kind && out.ops.read_tail::<T>() == *payload {
            return;
        }
        out.ops.append(kind, payload);
    }

    pub fn set_program(&mut self, program: ProgramId) {
        if self.active == Some(program) {
            return;
        }
        self.out()
            .ops
            .append(OpKind::Program, &ProgramOp { program: program.0 });
        self.active = Some(program);
        self.reprime();
    }

    /// Re-emit state the newly activated program has not seen yet.
    fn reprime(&mut self) {
        let Some(program) = self.active else { return };
        let known = self.slot_mut(program).clone();

        if let Some(proj) = self.projection {
            if known.projection != Some(proj) {
                self.out().ops.append(OpKind::Projection, &proj);
                self.slot_mut(program).projection = Some(proj);
            }
        }
        if let Some(&top) = self.transforms.last() {
            let op = transform_op(top);
            if known.transform != Some(op) {
                self.out().ops.append(OpKind::Transform, &op);
                self.slot_mut(program).transform = Some(op);
            }
        }
        if let Some(vp) = self.viewport {
            if known.viewport != Some(vp) {
                self.out().ops.append(OpKind::Viewport, &vp);
                self.slot_mut(program).viewport = Some(vp);
            }
        }
        if let Some(&clip) = self.clips.last() {
            if known.clip != Some(clip) {
                self.out().ops.append(OpKind::Clip, &clip);
                self.slot_mut(program).clip = Some(clip);
            }
        }
        if let Some(op) = self.opacity {
            if known.opacity != Some(op) {
                self.out().ops.append(OpKind::Opacity, &op);
                self.slot_mut(program).opacity = Some(op);
            }
        }
    }

    pub fn set_projection(&mut self, width: f32, height: f32) {
        let op = ProjectionOp { width, height };
        self.projection = Some(op);
        if let Some(p) = self.active {
            if self.slot_mut(p).projection == Some(op) {
                return;
            }
            self.slot_mut(p).projection = Some(op);
            self.out().ops.append(OpKind::Projection, &op);
        } else {
            self.append_unless_tail(OpKind::Projection, &op);
        }
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let op = ViewportOp { x, y, width, height };
        self.viewport = Some(op);
        if let Some(p) = self.active {
            if self.slot_mut(p).viewport == Some(op) {
                return;
            }
            self.slot_mut(p).viewport = Some(op);
            self.out().ops.append(OpKind::Viewport, &op);
        } else {
            self.append_unless_tail(OpKind::Viewport, &op);
        }
    }

    pub fn set_color(&mut self, color: Color) {
        let op = ColorOp::from(color);
        if let Some(p) = self.active {
            if self.slot_mut(p).color == Some(op) {
                return;
            }
            self.slot_mut(p).color = Some(op);
            self.out().ops.append(OpKind::Color, &op);
        } else {
            self.append_unless_tail(OpKind::Color, &op);
        }
    }

    pub fn set_opacity(&mut self, value: f32) {
        let op = OpacityOp { value };
        self.opacity = Some(op);
        if let Some(p) = self.active {
            if self.slot_mut(p).opacity == Some(op) {
                return;
            }
            self.slot_mut(p).opacity = Some(op);
            self.out().ops.append(OpKind::Opacity, &op);
        } else {
            self.append_unless_tail(OpKind::Opacity, &op);
        }
    }

    /// Bindings are device-global, so texture dedup ignores the program.
    pub fn set_source_texture(&mut self, target: TargetId) {
        if self.texture == Some(target) {
            return;
        }
        self.texture = Some(target);
        self.out()
            .ops
            .append(OpKind::Texture, &TextureOp { target: target.0 });
    }

    /// Emit a clip directly, without touching the clip stack. `bounds` is in
    /// root space. Prefer [`push_clip`](Self::push_clip) during traversal.
    pub fn set_clip(&mut self, bounds: RectF, radii: [f32; 4]) {
        let op = ClipOp::new(bounds, radii);
        self.emit_clip(op);
    }

    fn emit_clip(&mut self, op: ClipOp) {
        if let Some(p) = self.active {
            if self.slot_mut(p).clip == Some(op) {
                return;
            }
            self.slot_mut(p).clip = Some(op);
            self.out().ops.append(OpKind::Clip, &op);
        } else {
            self.append_unless_tail(OpKind::Clip, &op);
        }
    }

    /// Push a clip given in the current transform's local space. The stored
    /// and emitted rect is pre-adjusted into root space so later pops can
    /// restore it verbatim.
    pub fn push_clip(&mut self, bounds: RectF, radii: [f32; 4]) {
        let t = self.transforms.last().copied().unwrap_or(Transform::IDENTITY);
        let (x, y) = t.apply(bounds.x, bounds.y);
        let adjusted = RectF::new(x, y, bounds.width * t.sx, bounds.height * t.sy);
        let op = ClipOp::new(adjusted, radii);
        self.clips.push(op);
        // Pushes append unconditionally so an unconsumed pop can always
        // remove exactly the op its push added.
        if let Some(p) = self.active {
            self.slot_mut(p).clip = Some(op);
        }
        self.out().ops.append(OpKind::Clip, &op);
    }

    pub fn pop_clip(&mut self) {
        if self.clips.pop().is_none() {
            debug_assert!(false, "pop_clip with empty clip stack");
            return;
        }
        if self.out_ref().ops.tail_kind() == OpKind::Clip {
            // Never consumed by a draw: the stream before it already holds
            // the right state.
            self.out().ops.pop_tail();
            if let Some(p) = self.active {
                self.slot_mut(p).clip = None;
            }
        } else if let Some(&top) = self.clips.last() {
            self.emit_clip(top);
        }
    }

    fn emit_transform(&mut self, op: TransformOp) {
        if let Some(p) = self.active {
            if self.slot_mut(p).transform == Some(op) {
                return;
            }
            self.slot_mut(p).transform = Some(op);
            self.out().ops.append(OpKind::Transform, &op);
        } else {
            self.append_unless_tail(OpKind::Transform, &op);
        }
    }

    /// Compose `t` with the current transform and push the result.
    pub fn push_transform(&mut self, t: Transform) {
        let composed = match self.transforms.last() {
            Some(top) => top.then(&t),
            None => t,
        };
        self.transforms.push(composed);
        let op = transform_op(composed);
        if let Some(p) = self.active {
            self.slot_mut(p).transform = Some(op);
        }
        self.out().ops.append(OpKind::Transform, &op);
    }

    /// Push an absolute transform, ignoring whatever is stacked below.
    /// Offscreen passes start from this, since their target has its own
    /// coordinate space.
    pub fn push_absolute_transform(&mut self, t: Transform) {
        self.transforms.push(t);
        let op = transform_op(t);
        if let Some(p) = self.active {
            self.slot_mut(p).transform = Some(op);
        }
        self.out().ops.append(OpKind::Transform, &op);
    }

    /// Replace the top of the transform stack with an absolute value.
    pub fn set_transform(&mut self, t: Transform) {
        match self.transforms.last_mut() {
            Some(top) => *top = t,
            None => {
                debug_assert!(false, "set_transform with empty transform stack");
                self.transforms.push(t);
            }
        }
        self.emit_transform(transform_op(t));
    }

    pub fn pop_transform(&mut self) {
        if self.transforms.pop().is_none() {
            debug_assert!(false, "pop_transform with empty transform stack");
            return;
        }
        if self.out_ref().ops.tail_kind() == OpKind::Transform {
            self.out().ops.pop_tail();
            if let Some(p) = self.active {
                self.slot_mut(p).transform = None;
            }
        } else if let Some(&top) = self.transforms.last() {
            self.emit_transform(transform_op(top));
        }
    }

    /// The current composed transform, if any is pushed.
    pub fn current_transform(&self) -> Option<Transform> {
        self.transforms.last().copied()
    }

    /// Append one quad's vertices, returning its `(first, count)` range.
    pub fn quad(&mut self, rect: RectF, uv: RectF) -> (u32, u32) {
        let out = self.out();
        let first = out.vertices.len() as u32;
        let (x2, y2) = (rect.x + rect.width, rect.y + rect.height);
        let (u2, v2) = (uv.x + uv.width, uv.y + uv.height);
        out.vertices.push(Vertex::new(rect.x, rect.y, uv.x, uv.y));
        out.vertices.push(Vertex::new(x2, rect.y, u2, uv.y));
        out.vertices.push(Vertex::new(rect.x, y2, uv.x, v2));
        out.vertices.push(Vertex::new(x2, y2, u2, v2));
        (first, 4)
    }

    /// Record a draw of `first..first + count` vertices. A range contiguous
    /// with an immediately preceding draw grows that op instead.
    pub fn draw(&mut self, first: u32, count: u32) {
        if count == 0 {
            return;
        }
        let out = self.out();
        out.work += 1;
        if out.ops.tail_kind() == OpKind::Draw {
            let tail: DrawOp = out.ops.read_tail();
            if tail.first + tail.count == first {
                out.ops.write_tail(&DrawOp {
                    first: tail.first,
                    count: tail.count + count,
                });
                return;
            }
        }
        out.ops.append(OpKind::Draw, &DrawOp { first, count });
    }

    /// Fill `rect` with a flat color.
    pub fn rect(&mut self, rect: RectF, color: Color) {
        if rect.is_empty() {
            return;
        }
        self.set_color(color);
        let (first, count) = self.quad(rect, RectF::new(0.0, 0.0, 1.0, 1.0));
        self.draw(first, count);
    }

    /// Draw a textured quad sampling `uv` from `target`.
    pub fn texture_rect(&mut self, target: TargetId, rect: RectF, uv: RectF) {
        if rect.is_empty() {
            return;
        }
        self.set_source_texture(target);
        let (first, count) = self.quad(rect, uv);
        self.draw(first, count);
    }

    pub fn clear(&mut self, color: Color) {
        let op = ColorOp::from(color);
        let out = self.out();
        out.ops.append(OpKind::Clear, &op);
        out.work += 1;
    }

    pub fn push_debug_group(&mut self, label: &str) {
        let op = DebugOp::new(label);
        self.out().ops.append(OpKind::DebugPush, &op);
    }

    pub fn pop_debug_group(&mut self) {
        self.out().ops.append_empty(OpKind::DebugPop);
    }

    /// Suspend the current output and record into a fresh one. State
    /// tracking (stacks, program caches) continues uninterrupted.
    pub fn begin_offscreen(&mut self) {
        self.outputs.push(Output::default());
    }

    /// Finish the innermost offscreen recording.
    pub fn end_offscreen(&mut self) -> Recording {
        if self.outputs.len() <= 1 {
            debug_assert!(false, "end_offscreen without begin_offscreen");
            return Recording::default();
        }
        let out = self.outputs.pop().unwrap_or_default();
        Recording {
            ops: out.ops,
            vertices: out.vertices,
            work: out.work,
        }
    }

    /// The live frame's recorded ops and vertices.
    pub fn frame(&self) -> (&OpBuffer, &[Vertex]) {
        let out = &self.outputs[0];
        (&out.ops, &out.vertices)
    }

    /// True when the live frame holds at least one draw or clear.
    pub fn has_work(&self) -> bool {
        self.outputs[0].work > 0
    }

    /// Drop the live frame's ops, keeping allocations and all tracked state.
    /// State survives so the next frame can skip ops the device still holds.
    pub fn clear_frame(&mut self) {
        debug_assert!(self.outputs.len() == 1, "clear_frame during offscreen recording");
        debug_assert!(self.clips.is_empty(), "unbalanced clip stack at frame end");
        debug_assert!(self.transforms.is_empty(), "unbalanced transform stack at frame end");
        let out = &mut self.outputs[0];
        out.ops.clear();
        out.vertices.clear();
        out.work = 0;
    }

    /// Forget everything, including per-program caches. For use after the
    /// device context is rebuilt and no previously set state survives.
    pub fn reset_state(&mut self) {
        self.outputs.clear();
        self.outputs.push(Output::default());
        self.clips.clear();
        self.transforms.clear();
        self.programs.clear();
        self.active = None;
        self.texture = None;
        self.projection = None;
        self.viewport = None;
        self.opacity = None;
    }
}

impl Default for OpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn transform_op(t: Transform) -> TransformOp {
    TransformOp {
        dx: t.dx,
        dy: t.dy,
        sx: t.sx,
        sy: t.sy,
    }
}
