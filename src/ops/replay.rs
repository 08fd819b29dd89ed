//! Single-pass interpretation of a recorded op stream.

use crate::backend::{Backend, ProgramId, TargetId};
use crate::color::Color;
use crate::transform::Transform;

use super::{
    ClipOp, ColorOp, DebugOp, DrawOp, OpBuffer, OpKind, OpacityOp, ProgramOp, ProjectionOp,
    TextureOp, TransformOp, Vertex, ViewportOp,
};

/// Replay every op in `ops` against `backend`, in append order. Draw ops
/// index into `vertices`; a range that falls outside it is logged and
/// skipped rather than replayed truncated.
pub fn replay(ops: &OpBuffer, vertices: &[Vertex], backend: &mut dyn Backend) {
    for (kind, payload) in ops.iter() {
        match kind {
            OpKind::Noop => {}
            OpKind::Program => {
                let op: ProgramOp = bytemuck::pod_read_unaligned(payload);
                backend.set_program(ProgramId(op.program));
            }
            OpKind::Projection => {
                let op: ProjectionOp = bytemuck::pod_read_unaligned(payload);
                backend.set_projection(op.width, op.height);
            }
            OpKind::Transform => {
                let op: TransformOp = bytemuck::pod_read_unaligned(payload);
                backend.set_transform(Transform::new(op.dx, op.dy, op.sx, op.sy));
            }
            OpKind::Viewport => {
                let op: ViewportOp = bytemuck::pod_read_unaligned(payload);
                backend.set_viewport(op.x, op.y, op.width, op.height);
            }
            OpKind::Clip => {
                let op: ClipOp = bytemuck::pod_read_unaligned(payload);
                backend.set_clip(op.bounds(), op.radii);
            }
            OpKind::Texture => {
                let op: TextureOp = bytemuck::pod_read_unaligned(payload);
                backend.set_source_texture(TargetId(op.target));
            }
            OpKind::Color => {
                let op: ColorOp = bytemuck::pod_read_unaligned(payload);
                backend.set_color(Color::from(op));
            }
            OpKind::Opacity => {
                let op: OpacityOp = bytemuck::pod_read_unaligned(payload);
                backend.set_opacity(op.value);
            }
            OpKind::Draw => {
                let op: DrawOp = bytemuck::pod_read_unaligned(payload);
                let first = op.first as usize;
                let end = first + op.count as usize;
                match vertices.get(first..end) {
                    Some(range) => backend.draw(range),
                    None => {
                        debug_assert!(false, "draw range {first}..{end} out of bounds");
                        log::warn!(
                            "skipping draw op {}..{} past vertex array of {}",
                            first,
                            end,
                            vertices.len()
                        );
                    }
                }
            }
            OpKind::Clear => {
                let op: ColorOp = bytemuck::pod_read_unaligned(payload);
                backend.clear(Color::from(op));
            }
            OpKind::DebugPush => {
                let op: DebugOp = bytemuck::pod_read_unaligned(payload);
                backend.push_debug_group(op.text());
            }
            OpKind::DebugPop => {
                backend.pop_debug_group();
            }
        }
    }
}
