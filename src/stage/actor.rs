//! Actors and their class/behaviour hooks.
//!
//! An actor's visual identity comes from its class (one per actor, owns the
//! paint hook) and a list of behaviours (decorators that can wrap layout,
//! draw and event handling). Behaviour draw hooks chain: each one receives a
//! [`Chain`] cursor and decides whether and when to run the rest of the
//! chain, which ends at the class paint plus child recursion.

use std::any::Any;

use crate::backend::ProgramId;
use crate::color::Color;
use crate::geometry::{Rect, RectF};
use crate::ops::OpBuilder;
use crate::stage::cache::RenderCache;
use crate::stage::input::{Event, EventResponse};
use crate::stage::paint::Painter;
use crate::stage::Stage;
use crate::transition::TransitionId;

/// Stable handle to an actor in a stage's arena.
///
/// Ids are generational: after an actor is removed its slot can be reused,
/// and handles to the old occupant go stale instead of aliasing the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ActorId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Downcast support for concrete classes and behaviours.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-actor visual identity: sizing, painting and event handling.
pub trait ActorClass: AsAny {
    /// One-time setup once the actor sits under a realized stage. Runs
    /// again after a context reset, so implementations must be idempotent.
    fn init(&mut self, _actor: ActorId) {}

    /// Recompute the actor's region given the parent's box.
    fn set_size(&mut self, _region: &mut Rect, _parent: Rect) {}

    /// Record ops for the actor's own content, in local coordinates.
    /// Return `false` to report a failed paint; traversal continues.
    fn paint(&mut self, _actor: &Actor, _ops: &mut OpBuilder) -> bool {
        true
    }

    /// Whether this class produces visual output. Classes that return
    /// `false` are structural: they are traversed even at zero size and
    /// their paint hook is never called.
    fn paints(&self) -> bool {
        true
    }

    fn event(&mut self, _stage: &mut Stage, _actor: ActorId, _event: &Event) -> EventResponse {
        EventResponse::Ignored
    }

    /// The actor was explicitly invalidated.
    fn invalidated(&mut self) {}

    /// The actor is being removed from its stage.
    fn dispose(&mut self) {}
}

/// Cursor into an actor's behaviour chain during draw dispatch. Pass it
/// unchanged to [`Stage::continue_draw`] to run the remainder.
#[derive(Debug, Clone, Copy)]
pub struct Chain(pub(crate) usize);

/// Decorator attached to an actor.
pub trait Behaviour: AsAny {
    fn init(&mut self, _actor: ActorId) {}

    /// Adjust the actor's region during sizing.
    fn layout(&mut self, _region: &mut Rect, _parent: Rect) {}

    /// Wrap the rest of the draw chain. The default is transparent; an
    /// override can record ops before and after forwarding, or skip the
    /// forward entirely to suppress the subtree.
    fn draw(
        &mut self,
        stage: &mut Stage,
        painter: &mut Painter<'_>,
        actor: ActorId,
        chain: Chain,
    ) -> bool {
        stage.continue_draw(painter, actor, chain)
    }

    fn event(&mut self, _stage: &mut Stage, _actor: ActorId, _event: &Event) -> EventResponse {
        EventResponse::Ignored
    }
}

/// Stand-in while a behaviour is lent out to its own hook.
pub(crate) struct PlaceholderBehaviour;

impl Behaviour for PlaceholderBehaviour {}

/// An in-flight transition owned by the external engine.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ActiveTransition {
    pub(crate) id: TransitionId,
    /// Re-enable the render cache when the transition ends.
    pub(crate) restore_cache: bool,
}

/// One node of the stage tree.
pub struct Actor {
    pub(crate) name: Option<String>,
    pub(crate) parent: Option<ActorId>,
    pub(crate) children: Vec<ActorId>,
    pub(crate) z: i32,
    pub(crate) region: Rect,
    /// Scroll box: origin shifts the content, extent replaces the region
    /// as the visibility box. Empty means unset.
    pub(crate) scroll: Rect,
    pub(crate) program: Option<ProgramId>,
    pub(crate) disabled: bool,
    pub(crate) inited: bool,
    pub(crate) class: Box<dyn ActorClass>,
    pub(crate) behaviours: Vec<Box<dyn Behaviour>>,
    pub(crate) cache: RenderCache,
    pub(crate) transition: Option<ActiveTransition>,
}

impl Actor {
    pub(crate) fn new(class: Box<dyn ActorClass>) -> Self {
        Self {
            name: None,
            parent: None,
            children: Vec::new(),
            z: 0,
            region: Rect::ZERO,
            scroll: Rect::ZERO,
            program: None,
            disabled: false,
            inited: false,
            class,
            behaviours: Vec::new(),
            cache: RenderCache::default(),
            transition: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<ActorId> {
        self.parent
    }

    pub fn children(&self) -> &[ActorId] {
        &self.children
    }

    pub fn z(&self) -> i32 {
        self.z
    }

    pub fn region(&self) -> Rect {
        self.region
    }

    pub fn scroll(&self) -> Rect {
        self.scroll
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Downcast the class to its concrete type.
    pub fn downcast<T: ActorClass + 'static>(&self) -> Option<&T> {
        (*self.class).as_any().downcast_ref::<T>()
    }
}

/// Structural grouping node with no visual output of its own.
pub struct Group;

impl ActorClass for Group {
    fn paints(&self) -> bool {
        false
    }
}

/// Flat colored rectangle filling the actor's region.
pub struct Panel {
    pub color: Color,
}

impl Panel {
    pub fn new(color: Color) -> Self {
        Self { color }
    }
}

impl ActorClass for Panel {
    fn paint(&mut self, actor: &Actor, ops: &mut OpBuilder) -> bool {
        let r = actor.region();
        ops.rect(
            RectF::new(0.0, 0.0, r.width() as f32, r.height() as f32),
            self.color,
        );
        true
    }
}

/// Clips the actor's content and children to its region, with optional
/// rounded corners.
pub struct ClipChildren {
    pub radii: [f32; 4],
}

impl ClipChildren {
    pub fn new() -> Self {
        Self { radii: [0.0; 4] }
    }

    pub fn rounded(radius: f32) -> Self {
        Self { radii: [radius; 4] }
    }
}

impl Default for ClipChildren {
    fn default() -> Self {
        Self::new()
    }
}

impl Behaviour for ClipChildren {
    fn draw(
        &mut self,
        stage: &mut Stage,
        painter: &mut Painter<'_>,
        actor: ActorId,
        chain: Chain,
    ) -> bool {
        let Some(a) = stage.actor(actor) else { return false };
        let r = a.region();
        painter.builder().push_clip(
            RectF::new(0.0, 0.0, r.width() as f32, r.height() as f32),
            self.radii,
        );
        let ok = stage.continue_draw(painter, actor, chain);
        painter.builder().pop_clip();
        ok
    }
}

/// Draws a frame over the actor's content and children.
pub struct Border {
    pub color: Color,
    pub width: i32,
}

impl Border {
    pub fn new(color: Color, width: i32) -> Self {
        Self { color, width }
    }
}

impl Behaviour for Border {
    fn draw(
        &mut self,
        stage: &mut Stage,
        painter: &mut Painter<'_>,
        actor: ActorId,
        chain: Chain,
    ) -> bool {
        let ok = stage.continue_draw(painter, actor, chain);
        let Some(a) = stage.actor(actor) else { return ok };
        let w = a.region().width() as f32;
        let h = a.region().height() as f32;
        let t = (self.width.max(0) as f32).min(w / 2.0).min(h / 2.0);
        if t > 0.0 {
            // Children may have left a composite program active.
            let program = painter.program();
            let b = painter.builder();
            b.set_program(program);
            b.rect(RectF::new(0.0, 0.0, w, t), self.color);
            b.rect(RectF::new(0.0, h - t, w, t), self.color);
            b.rect(RectF::new(0.0, t, t, h - 2.0 * t), self.color);
            b.rect(RectF::new(w - t, t, t, h - 2.0 * t), self.color);
        }
        ok
    }
}
