//! Frame production.
//!
//! [`Stage::paint`] walks the tree and records ops through the stage's
//! persistent builder, then replays the result against the backend. Cached
//! subtrees render into offscreen targets and composite back as a single
//! textured quad; a valid cache skips the subtree entirely and only the
//! composite is re-recorded.
//!
//! Everything below the root records in root content space: the root's
//! region origin is applied by the viewport, not the transform stack.

use crate::backend::{Backend, BackendError, Blend, ProgramId, TargetId};
use crate::color::Color;
use crate::geometry::{Point, Rect, RectF};
use crate::ops::{replay, OpBuilder};
use crate::transform::Transform;

use super::cache::{next_pow2, oversized};
use super::{ActorId, Chain, Stage};

#[derive(Debug, Clone, Copy)]
struct FrameEnv {
    projection: (f32, f32),
    viewport: (i32, i32, i32, i32),
}

/// Per-frame pairing of the stage's op builder with a backend.
///
/// Behaviour draw hooks receive one of these: [`builder`](Self::builder)
/// records ops, [`program`](Self::program) names the program draws at the
/// current tree position should use.
pub struct Painter<'a> {
    backend: &'a mut dyn Backend,
    builder: OpBuilder,
    frames: Vec<FrameEnv>,
    pub(crate) program: ProgramId,
}

impl<'a> Painter<'a> {
    fn new(backend: &'a mut dyn Backend, builder: OpBuilder, program: ProgramId) -> Self {
        Self {
            backend,
            builder,
            frames: Vec::new(),
            program,
        }
    }

    /// The op stream under construction.
    pub fn builder(&mut self) -> &mut OpBuilder {
        &mut self.builder
    }

    /// Program in effect for the actor currently drawing. Hooks that
    /// record after a subtree (which may have switched programs) reassert
    /// it via [`OpBuilder::set_program`].
    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub(crate) fn backend(&mut self) -> &mut dyn Backend {
        self.backend
    }

    fn push_env(&mut self, projection: (f32, f32), viewport: (i32, i32, i32, i32)) {
        self.frames.push(FrameEnv {
            projection,
            viewport,
        });
        self.builder.set_projection(projection.0, projection.1);
        self.builder
            .set_viewport(viewport.0, viewport.1, viewport.2, viewport.3);
    }

    /// Redirect recording into an offscreen pass over a fresh target-local
    /// coordinate space.
    fn start_offscreen(&mut self, width: u32, height: u32) {
        self.builder.begin_offscreen();
        self.builder.push_absolute_transform(Transform::IDENTITY);
        self.builder
            .push_clip(RectF::new(0.0, 0.0, width as f32, height as f32), [0.0; 4]);
        self.push_env(
            (width as f32, height as f32),
            (0, 0, width as i32, height as i32),
        );
        self.builder.clear(Color::TRANSPARENT);
    }

    /// Close the innermost offscreen pass and render it into `target`,
    /// then re-assert the suspended pass's projection and viewport so
    /// recording resumes where it left off.
    fn finish_offscreen(&mut self, target: TargetId) {
        self.builder.pop_clip();
        self.builder.pop_transform();
        let recording = self.builder.end_offscreen();
        self.frames.pop();

        self.backend.bind_target(Some(target));
        replay(&recording.ops, &recording.vertices, self.backend);
        self.backend.bind_target(None);

        if let Some(env) = self.frames.last().copied() {
            self.builder.set_projection(env.projection.0, env.projection.1);
            self.builder.set_viewport(
                env.viewport.0,
                env.viewport.1,
                env.viewport.2,
                env.viewport.3,
            );
        }
    }

    /// Replay the live frame if it recorded any work, then reset it.
    fn flush(&mut self) -> bool {
        let flushed = self.builder.has_work();
        if flushed {
            let (ops, vertices) = self.builder.frame();
            replay(ops, vertices, self.backend);
        }
        self.builder.clear_frame();
        if flushed {
            // Replays may leave any blend mode behind.
            self.backend.set_blend(Blend::Alpha);
        }
        flushed
    }

    fn into_builder(self) -> OpBuilder {
        self.builder
    }
}

impl Stage {
    /// Record and replay one frame. Returns whether every painted actor
    /// reported success; the frame is flushed either way.
    pub fn paint(&mut self, backend: &mut dyn Backend) -> bool {
        if !self.realized {
            self.realize();
        }
        self.reclaim(backend);

        let root = self.root();
        let (region, scroll) = match self.actor(root) {
            Some(a) => (a.region, a.scroll),
            None => return false,
        };
        if region.is_empty() {
            log::warn!(
                "paint skipped: root region {}x{} has no area",
                region.width(),
                region.height()
            );
            return false;
        }

        let builder = std::mem::take(&mut self.builder);
        let mut painter = Painter::new(backend, builder, self.base_program);

        painter.builder().set_program(self.base_program);
        painter.push_env(
            (region.width() as f32, region.height() as f32),
            (region.x1, region.y1, region.width(), region.height()),
        );
        painter.builder().push_transform(Transform::IDENTITY);
        let clip = if scroll.is_empty() {
            Rect::from_size(region.width(), region.height())
        } else {
            scroll
        };
        painter.builder().push_clip(RectF::from(clip), [0.0; 4]);
        painter.builder().clear(self.background);

        let ok = self.paint_node(&mut painter, root);

        painter.builder().pop_clip();
        painter.builder().pop_transform();
        painter.flush();
        self.builder = painter.into_builder();
        ok
    }

    fn paint_node(&mut self, painter: &mut Painter<'_>, id: ActorId) -> bool {
        if !self.paintable(id) {
            // Skipped is not failed.
            return true;
        }
        let Some(a) = self.actor(id) else { return true };
        let region = a.region;
        let scroll = a.scroll;
        let override_program = a.program;
        let cache_enabled = a.cache.enabled;
        let cache_ready = a.cache.valid && a.cache.target.is_some();
        let label = if self.debug_groups {
            a.name.clone()
        } else {
            None
        };

        let w = region.width().max(0) as u32;
        let h = region.height().max(0) as u32;
        let caching = cache_enabled && !region.is_empty() && !oversized(w, h);
        if cache_enabled && oversized(w, h) {
            log::debug!("cache bypassed: {w}x{h} exceeds the target axis limit");
        }

        let is_root = id == self.root();
        let base = if is_root { Point::ZERO } else { region.origin() };
        let offset = if caching {
            base
        } else {
            base.offset(scroll.origin())
        };

        if let Some(name) = label.as_deref() {
            painter.builder().push_debug_group(name);
        }
        let moved = offset != Point::ZERO;
        if moved {
            painter
                .builder()
                .push_transform(Transform::translate(offset.x as f32, offset.y as f32));
        }
        // Content under an uncached scroll box stays inside its window.
        let windowed = !is_root && !caching && !scroll.is_empty();
        if windowed {
            painter.builder().push_clip(
                RectF::new(0.0, 0.0, scroll.width() as f32, scroll.height() as f32),
                [0.0; 4],
            );
        }
        let outer_program = painter.program;
        painter.program = override_program.unwrap_or(outer_program);
        let program = painter.program;
        painter.builder().set_program(program);

        let ok = if caching {
            self.paint_cached(painter, id, cache_ready)
        } else {
            self.draw_chain(painter, id)
        };

        painter.program = outer_program;
        if windowed {
            painter.builder().pop_clip();
        }
        if moved {
            painter.builder().pop_transform();
        }
        if label.is_some() {
            painter.builder().pop_debug_group();
        }
        ok
    }

    fn paint_cached(&mut self, painter: &mut Painter<'_>, id: ActorId, ready: bool) -> bool {
        if ready {
            self.composite(painter, id);
            return true;
        }
        match self.render_cache(painter, id) {
            Ok(ok) => {
                self.composite(painter, id);
                ok
            }
            Err(err) => {
                log::warn!("render cache unavailable, painting direct: {err}");
                let scroll = self
                    .actor(id)
                    .map(|a| a.scroll)
                    .unwrap_or(Rect::ZERO);
                // The cached offset split left the scroll shift out.
                let windowed = !scroll.is_empty();
                if windowed {
                    painter.builder().push_clip(RectF::from(scroll), [0.0; 4]);
                }
                let shift = scroll.origin();
                let moved = shift != Point::ZERO;
                if moved {
                    painter
                        .builder()
                        .push_transform(Transform::translate(shift.x as f32, shift.y as f32));
                }
                let ok = self.draw_chain(painter, id);
                if moved {
                    painter.builder().pop_transform();
                }
                if windowed {
                    painter.builder().pop_clip();
                }
                ok
            }
        }
    }

    /// Render `id`'s subtree into its offscreen target, allocating or
    /// resizing the target to the region's size class first.
    fn render_cache(
        &mut self,
        painter: &mut Painter<'_>,
        id: ActorId,
    ) -> Result<bool, BackendError> {
        let (request, size, existing, old_size) = {
            let Some(a) = self.actor(id) else { return Ok(true) };
            let request = (a.region.width() as u32, a.region.height() as u32);
            (
                request,
                (next_pow2(request.0), next_pow2(request.1)),
                a.cache.target,
                a.cache.size,
            )
        };
        let target = match existing {
            Some(t) if old_size == size => t,
            Some(t) => {
                painter.backend().resize_offscreen_target(t, size.0, size.1)?;
                t
            }
            None => painter.backend().create_offscreen_target(size.0, size.1)?,
        };
        if let Some(a) = self.actor_mut(id) {
            a.cache.target = Some(target);
            a.cache.size = size;
            a.cache.request = request;
        }

        painter.start_offscreen(size.0, size.1);
        let ok = self.draw_chain(painter, id);
        painter.finish_offscreen(target);

        if let Some(a) = self.actor_mut(id) {
            // Partial content still composites, but stays dirty.
            a.cache.valid = ok;
        }
        Ok(ok)
    }

    /// Draw `id`'s cached target as one textured quad. The content extent
    /// lands at the cache offset plus the scroll origin, so a scrolled
    /// actor re-composites without re-rendering.
    fn composite(&mut self, painter: &mut Painter<'_>, id: ActorId) {
        let is_root = id == self.root();
        let Some(a) = self.actor(id) else { return };
        let Some(target) = a.cache.target else { return };
        let (req_w, req_h) = a.cache.request;
        let (size_w, size_h) = a.cache.size;
        if req_w == 0 || req_h == 0 || size_w == 0 || size_h == 0 {
            return;
        }
        let scroll = a.scroll;
        let pos = a.cache.offset.offset(scroll.origin());
        let rect = RectF::new(pos.x as f32, pos.y as f32, req_w as f32, req_h as f32);
        let uv = RectF::new(
            0.0,
            0.0,
            req_w as f32 / size_w as f32,
            req_h as f32 / size_h as f32,
        );
        let blit = self.blit_program;
        let windowed = !is_root && !scroll.is_empty();
        let b = painter.builder();
        if windowed {
            b.push_clip(RectF::from(scroll), [0.0; 4]);
        }
        b.set_program(blit);
        b.set_color(Color::WHITE);
        b.texture_rect(target, rect, uv);
        if windowed {
            b.pop_clip();
        }
    }

    /// Run the rest of `id`'s draw chain: behaviours not yet consumed,
    /// then the class paint and child recursion. Behaviour draw hooks call
    /// this to forward to the remainder.
    pub fn continue_draw(&mut self, painter: &mut Painter<'_>, id: ActorId, chain: Chain) -> bool {
        let index = chain.0;
        let count = self.actor(id).map(|a| a.behaviours.len()).unwrap_or(0);
        if index < count {
            return self
                .with_behaviour(id, index, |stage, b| {
                    b.draw(stage, painter, id, Chain(index + 1))
                })
                .unwrap_or(true);
        }
        self.draw_core(painter, id)
    }

    fn draw_chain(&mut self, painter: &mut Painter<'_>, id: ActorId) -> bool {
        self.continue_draw(painter, id, Chain(0))
    }

    fn draw_core(&mut self, painter: &mut Painter<'_>, id: ActorId) -> bool {
        let mut ok = true;
        let paints = self.actor(id).map(|a| a.class.paints()).unwrap_or(false);
        if paints {
            ok &= self
                .with_class(id, |stage, class| match stage.actor(id) {
                    Some(a) => class.paint(a, painter.builder()),
                    None => true,
                })
                .unwrap_or(true);
        }
        let kids = match self.actor(id) {
            Some(a) => a.children.clone(),
            None => return ok,
        };
        for child in kids {
            ok &= self.paint_node(painter, child);
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{TraceBackend, TraceCall};
    use crate::stage::{ActorClass, Panel};

    fn stage() -> Stage {
        Stage::new(Rect::from_size(800, 600))
    }

    struct FailingPaint;

    impl ActorClass for FailingPaint {
        fn paint(&mut self, actor: &crate::stage::Actor, ops: &mut OpBuilder) -> bool {
            let r = actor.region();
            ops.rect(
                RectF::new(0.0, 0.0, r.width() as f32, r.height() as f32),
                Color::rgb(1.0, 0.0, 0.0),
            );
            false
        }
    }

    #[test]
    fn empty_root_region_skips_the_frame() {
        let mut s = Stage::new(Rect::ZERO);
        let mut backend = TraceBackend::new();
        assert!(!s.paint(&mut backend));
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn first_frame_primes_device_state() {
        let mut s = stage();
        let root = s.root();
        let a = s.create(Box::new(Panel::new(Color::WHITE)));
        s.set_region(a, Rect::new(10, 10, 110, 110));
        s.add_child(root, a);

        let mut backend = TraceBackend::new();
        assert!(s.paint(&mut backend));

        assert_eq!(backend.calls[0], TraceCall::Program(ProgramId(0)));
        assert_eq!(backend.calls[1], TraceCall::Projection(800.0, 600.0));
        assert_eq!(backend.calls[2], TraceCall::Viewport(0, 0, 800, 600));
        assert!(backend
            .calls
            .contains(&TraceCall::Clear(Color::BLACK)));
        assert_eq!(backend.draw_calls(), 1);
        assert_eq!(backend.calls.last(), Some(&TraceCall::Blend(Blend::Alpha)));
    }

    #[test]
    fn offscreen_pass_restores_outer_env() {
        let mut builder = OpBuilder::new();
        builder.set_program(ProgramId(0));
        let mut backend = TraceBackend::new();
        let target = backend.create_offscreen_target(64, 64).unwrap();
        backend.clear_calls();

        let mut painter = Painter::new(&mut backend, builder, ProgramId(0));
        painter.push_env((800.0, 600.0), (0, 0, 800, 600));
        painter.builder().push_transform(Transform::IDENTITY);

        painter.start_offscreen(64, 64);
        painter.builder().rect(
            RectF::new(0.0, 0.0, 32.0, 32.0),
            Color::WHITE,
        );
        painter.finish_offscreen(target);

        painter.builder().pop_transform();
        let builder = painter.into_builder();

        // The offscreen replay is bracketed by binds.
        assert_eq!(backend.calls.first(), Some(&TraceCall::Bind(Some(target))));
        assert!(backend
            .calls
            .contains(&TraceCall::Clear(Color::TRANSPARENT)));
        assert_eq!(backend.calls.last(), Some(&TraceCall::Bind(None)));

        // Recording resumed with the outer projection re-emitted.
        let (ops, _) = builder.frame();
        let tail: crate::ops::ViewportOp = ops.read_tail();
        assert_eq!((tail.width, tail.height), (800, 600));
    }

    #[test]
    fn flush_without_work_stays_silent() {
        let builder = OpBuilder::new();
        let mut backend = TraceBackend::new();
        let mut painter = Painter::new(&mut backend, builder, ProgramId(0));
        assert!(!painter.flush());
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn failed_paint_reports_but_still_flushes() {
        let mut s = stage();
        let root = s.root();
        let bad = s.create(Box::new(FailingPaint));
        s.set_region(bad, Rect::new(0, 0, 50, 50));
        s.add_child(root, bad);
        let good = s.create(Box::new(Panel::new(Color::WHITE)));
        s.set_region(good, Rect::new(60, 0, 110, 50));
        s.add_child(root, good);

        let mut backend = TraceBackend::new();
        assert!(!s.paint(&mut backend));
        // Both actors drew; the failure only taints the return value.
        assert_eq!(backend.draw_calls(), 2);
        assert_eq!(backend.calls.last(), Some(&TraceCall::Blend(Blend::Alpha)));
    }
}
