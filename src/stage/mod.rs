//! The retained scene tree and its root-level state.
//!
//! A [`Stage`] owns every actor in a generational slot arena, the pointer
//! routing state (selected, hovered, grabbed), the persistent op builder,
//! and the hooks that connect it to a host: a redraw callback and an
//! optional external animation engine. Actors are addressed by [`ActorId`];
//! handles held across a removal go stale rather than aliasing a reused
//! slot.

mod actor;
mod cache;
mod dump;
mod hit;
mod input;
mod paint;

pub use actor::{
    Actor, ActorClass, ActorId, AsAny, Behaviour, Border, Chain, ClipChildren, Group, Panel,
};
pub use cache::{RenderCache, MAX_TARGET_AXIS};
pub use input::{Button, Crossing, Event, EventResponse, Modifiers};
pub use paint::Painter;

use crate::backend::{Backend, ProgramId, TargetId};
use crate::color::Color;
use crate::geometry::{Point, Rect};
use crate::ops::OpBuilder;
use crate::transition::{Animatable, TransitionId, Transitions};

use actor::{ActiveTransition, PlaceholderBehaviour};

#[derive(Default)]
struct Slot {
    generation: u32,
    actor: Option<Actor>,
}

pub struct Stage {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: ActorId,
    pub(crate) background: Color,
    pub(crate) selected: Option<ActorId>,
    pub(crate) hovered: Option<ActorId>,
    pub(crate) grabbed: Option<ActorId>,
    animations_enabled: bool,
    pub(crate) realized: bool,
    pub(crate) base_program: ProgramId,
    pub(crate) blit_program: ProgramId,
    pub(crate) debug_groups: bool,
    pub(crate) builder: OpBuilder,
    redraw_hook: Option<Box<dyn FnMut()>>,
    transitions: Option<Box<dyn Transitions>>,
    pub(crate) dead_targets: Vec<TargetId>,
}

impl Stage {
    /// Create a stage whose root covers `viewport`.
    pub fn new(viewport: Rect) -> Self {
        let mut stage = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: ActorId::new(0, 0),
            background: Color::BLACK,
            selected: None,
            hovered: None,
            grabbed: None,
            animations_enabled: true,
            realized: false,
            base_program: ProgramId(0),
            blit_program: ProgramId(1),
            debug_groups: false,
            builder: OpBuilder::new(),
            redraw_hook: None,
            transitions: None,
            dead_targets: Vec::new(),
        };
        let mut root = Actor::new(Box::new(Group));
        root.region = viewport;
        stage.root = stage.alloc(root);
        stage
    }

    pub fn root(&self) -> ActorId {
        self.root
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.actor.as_ref()
    }

    pub(crate) fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.actor.as_mut()
    }

    /// Borrow an actor's class as its concrete type.
    pub fn class_ref<T: ActorClass + 'static>(&self, id: ActorId) -> Option<&T> {
        (*self.actor(id)?.class).as_any().downcast_ref::<T>()
    }

    /// Mutably borrow an actor's class as its concrete type. The caller is
    /// responsible for invalidating if the mutation changes visuals.
    pub fn class_mut<T: ActorClass + 'static>(&mut self, id: ActorId) -> Option<&mut T> {
        (*self.actor_mut(id)?.class).as_any_mut().downcast_mut::<T>()
    }

    pub fn actor_count(&self) -> usize {
        self.slots.iter().filter(|s| s.actor.is_some()).count()
    }

    pub fn find_named(&self, name: &str) -> Option<ActorId> {
        self.slots.iter().enumerate().find_map(|(i, slot)| {
            let a = slot.actor.as_ref()?;
            (a.name.as_deref() == Some(name)).then(|| ActorId::new(i as u32, slot.generation))
        })
    }

    pub fn create(&mut self, class: Box<dyn ActorClass>) -> ActorId {
        self.alloc(Actor::new(class))
    }

    pub fn create_named(&mut self, class: Box<dyn ActorClass>, name: &str) -> ActorId {
        let mut actor = Actor::new(class);
        actor.name = Some(name.to_string());
        self.alloc(actor)
    }

    fn alloc(&mut self, actor: Actor) -> ActorId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.actor.is_none());
            slot.actor = Some(actor);
            ActorId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                actor: Some(actor),
            });
            ActorId::new(index, 0)
        }
    }

    fn free_slot(&mut self, id: ActorId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.actor.is_some() {
                slot.actor = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    /// Run `f` with the actor's class temporarily extracted, so the hook can
    /// re-enter the stage. The class is restored unless the actor was
    /// removed while borrowed.
    pub(crate) fn with_class<R>(
        &mut self,
        id: ActorId,
        f: impl FnOnce(&mut Stage, &mut Box<dyn ActorClass>) -> R,
    ) -> Option<R> {
        let mut class = {
            let a = self.actor_mut(id)?;
            std::mem::replace(&mut a.class, Box::new(Group))
        };
        let result = f(self, &mut class);
        if let Some(a) = self.actor_mut(id) {
            a.class = class;
        }
        Some(result)
    }

    /// As [`with_class`](Self::with_class), for one behaviour.
    pub(crate) fn with_behaviour<R>(
        &mut self,
        id: ActorId,
        index: usize,
        f: impl FnOnce(&mut Stage, &mut Box<dyn Behaviour>) -> R,
    ) -> Option<R> {
        let mut behaviour = {
            let a = self.actor_mut(id)?;
            let slot = a.behaviours.get_mut(index)?;
            std::mem::replace(slot, Box::new(PlaceholderBehaviour))
        };
        let result = f(self, &mut behaviour);
        if let Some(a) = self.actor_mut(id) {
            if let Some(slot) = a.behaviours.get_mut(index) {
                *slot = behaviour;
            }
        }
        Some(result)
    }

    // ----- tree shape -----

    /// Attach `child` under `parent`, ordered after siblings whose z does
    /// not exceed the child's.
    pub fn add_child(&mut self, parent: ActorId, child: ActorId) {
        if self.actor(parent).is_none() || self.actor(child).is_none() {
            debug_assert!(false, "add_child with stale id");
            log::warn!("add_child: stale actor id");
            return;
        }
        if self.actor(child).map(|a| a.parent.is_some()) == Some(true) {
            debug_assert!(false, "add_child: actor already has a parent");
            log::warn!("add_child: actor already parented");
            return;
        }
        if parent == child || self.is_descendant(parent, child) {
            debug_assert!(false, "add_child would create a cycle");
            log::warn!("add_child: cycle rejected");
            return;
        }
        let z = self.actor(child).map(|a| a.z).unwrap_or(0);
        let pos = self.insert_position(parent, z);
        if let Some(p) = self.actor_mut(parent) {
            p.children.insert(pos, child);
        }
        if let Some(c) = self.actor_mut(child) {
            c.parent = Some(parent);
        }
        if self.realized {
            self.init_subtree(child);
        }
        self.invalidate(parent);
    }

    fn insert_position(&self, parent: ActorId, z: i32) -> usize {
        let siblings = match self.actor(parent) {
            Some(p) => &p.children,
            None => return 0,
        };
        siblings
            .iter()
            .position(|&c| self.actor(c).map(|a| a.z).unwrap_or(0) > z)
            .unwrap_or(siblings.len())
    }

    /// Detach `child` and free its whole subtree. Returns `false` when
    /// `child` is not currently a child of `parent`.
    pub fn remove_child(&mut self, parent: ActorId, child: ActorId) -> bool {
        let is_member = self
            .actor(parent)
            .map(|p| p.children.contains(&child))
            .unwrap_or(false);
        if !is_member {
            debug_assert!(false, "remove_child: not a child of this parent");
            log::warn!("remove_child: actor is not a child of the given parent");
            return false;
        }
        if let Some(p) = self.actor_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        self.free_subtree(child);
        self.invalidate(parent);
        true
    }

    /// Swap `old` for `new` at the same position in `parent`'s child list,
    /// freeing `old`'s subtree.
    pub fn replace_child(&mut self, parent: ActorId, old: ActorId, new: ActorId) {
        let pos = self
            .actor(parent)
            .and_then(|p| p.children.iter().position(|&c| c == old));
        let Some(pos) = pos else {
            debug_assert!(false, "replace_child: old actor not found under parent");
            log::warn!("replace_child: old actor is not a child of the given parent");
            return;
        };
        if self.actor(new).is_none()
            || self.actor(new).map(|a| a.parent.is_some()) == Some(true)
            || parent == new
            || self.is_descendant(parent, new)
        {
            debug_assert!(false, "replace_child: replacement unusable");
            log::warn!("replace_child: replacement actor rejected");
            return;
        }
        if let Some(p) = self.actor_mut(parent) {
            p.children[pos] = new;
        }
        if let Some(n) = self.actor_mut(new) {
            n.parent = Some(parent);
        }
        self.free_subtree(old);
        if self.realized {
            self.init_subtree(new);
        }
        self.invalidate(parent);
    }

    fn free_subtree(&mut self, id: ActorId) {
        let kids = match self.actor(id) {
            Some(a) => a.children.clone(),
            None => return,
        };
        for c in kids {
            self.free_subtree(c);
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        if self.hovered == Some(id) {
            self.hovered = None;
        }
        if self.grabbed == Some(id) {
            self.grabbed = None;
        }
        let (transition, target) = match self.actor_mut(id) {
            Some(a) => {
                a.class.dispose();
                (a.transition.take(), a.cache.target.take())
            }
            None => return,
        };
        if let Some(t) = transition {
            if let Some(engine) = self.transitions.as_mut() {
                engine.cancel(t.id);
            }
        }
        if let Some(t) = target {
            // Released at the next paint, when a backend is in reach.
            self.dead_targets.push(t);
        }
        self.free_slot(id);
    }

    /// True when `actor` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, actor: ActorId, ancestor: ActorId) -> bool {
        let mut cur = self.actor(actor).and_then(|a| a.parent);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.actor(id).and_then(|a| a.parent);
        }
        false
    }

    /// Change stacking order among siblings.
    pub fn set_z(&mut self, id: ActorId, z: i32) {
        let parent = match self.actor_mut(id) {
            Some(a) => {
                a.z = z;
                a.parent
            }
            None => return,
        };
        let Some(parent) = parent else { return };
        if let Some(p) = self.actor_mut(parent) {
            p.children.retain(|&c| c != id);
        }
        let pos = self.insert_position(parent, z);
        if let Some(p) = self.actor_mut(parent) {
            p.children.insert(pos, id);
        }
        self.invalidate(parent);
    }

    // ----- actor properties -----

    pub fn set_name(&mut self, id: ActorId, name: &str) {
        if let Some(a) = self.actor_mut(id) {
            a.name = Some(name.to_string());
        }
    }

    /// A disabled actor is skipped by hit-testing, subtree included. It
    /// still paints.
    pub fn set_disabled(&mut self, id: ActorId, disabled: bool) {
        if let Some(a) = self.actor_mut(id) {
            a.disabled = disabled;
        }
    }

    /// Program the actor's subtree draws with, overriding the stage base
    /// program. `None` inherits from the nearest ancestor override.
    pub fn set_actor_program(&mut self, id: ActorId, program: Option<ProgramId>) {
        let changed = match self.actor_mut(id) {
            Some(a) if a.program != program => {
                a.program = program;
                true
            }
            _ => false,
        };
        if changed {
            self.invalidate(id);
        }
    }

    pub fn add_behaviour(&mut self, id: ActorId, behaviour: Box<dyn Behaviour>) {
        let added = match self.actor_mut(id) {
            Some(a) => {
                a.behaviours.push(behaviour);
                true
            }
            None => false,
        };
        if added {
            if self.realized {
                if let Some(a) = self.actor_mut(id) {
                    if a.inited {
                        let index = a.behaviours.len() - 1;
                        a.behaviours[index].init(id);
                    }
                }
            }
            self.invalidate(id);
        }
    }

    // ----- geometry -----

    pub fn set_region(&mut self, id: ActorId, region: Rect) {
        let changed = match self.actor_mut(id) {
            Some(a) if a.region != region => {
                a.region = region;
                let w = region.width().max(0) as u32;
                let h = region.height().max(0) as u32;
                if a.cache.note_size(w, h) {
                    a.cache.valid = false;
                }
                true
            }
            _ => false,
        };
        if changed {
            self.invalidate(id);
        }
    }

    pub fn set_scroll(&mut self, id: ActorId, scroll: Rect) {
        let changed = match self.actor_mut(id) {
            Some(a) if a.scroll != scroll => {
                a.scroll = scroll;
                true
            }
            _ => false,
        };
        if changed {
            self.invalidate(id);
        }
    }

    /// Re-run sizing hooks for `id` and its whole subtree, top-down. Each
    /// actor's behaviours adjust the region first, then its class.
    pub fn set_size(&mut self, id: ActorId) {
        let parent_box = match self.actor(id) {
            Some(a) => match a.parent {
                Some(p) => self
                    .actor(p)
                    .map(|pa| Rect::from_size(pa.region.width(), pa.region.height()))
                    .unwrap_or(Rect::ZERO),
                None => a.region,
            },
            None => return,
        };
        let changed = {
            let Some(a) = self.actor_mut(id) else { return };
            let mut region = a.region;
            for b in &mut a.behaviours {
                b.layout(&mut region, parent_box);
            }
            a.class.set_size(&mut region, parent_box);
            let changed = a.region != region;
            a.region = region;
            let w = region.width().max(0) as u32;
            let h = region.height().max(0) as u32;
            if a.cache.note_size(w, h) {
                a.cache.valid = false;
            }
            changed
        };
        if changed {
            self.invalidate(id);
        }
        let kids = match self.actor(id) {
            Some(a) => a.children.clone(),
            None => return,
        };
        for c in kids {
            self.set_size(c);
        }
    }

    // ----- invalidation -----

    /// Mark `id`'s cache invalid, fire its hook, and invalidate every
    /// ancestor's cache so the change composites through.
    pub fn invalidate(&mut self, id: ActorId) {
        let parent = match self.actor_mut(id) {
            Some(a) => {
                a.cache.valid = false;
                a.class.invalidated();
                a.parent
            }
            None => return,
        };
        let mut cur = parent;
        while let Some(pid) = cur {
            match self.actor_mut(pid) {
                Some(p) => {
                    p.cache.valid = false;
                    cur = p.parent;
                }
                None => break,
            }
        }
        self.request_redraw();
    }

    /// As [`invalidate`](Self::invalidate), also invalidating every
    /// descendant.
    pub fn invalidate_down(&mut self, id: ActorId) {
        self.invalidate(id);
        let kids = match self.actor(id) {
            Some(a) => a.children.clone(),
            None => return,
        };
        for c in kids {
            self.invalidate_subtree(c);
        }
    }

    fn invalidate_subtree(&mut self, id: ActorId) {
        let kids = match self.actor_mut(id) {
            Some(a) => {
                a.cache.valid = false;
                a.class.invalidated();
                a.children.clone()
            }
            None => return,
        };
        for c in kids {
            self.invalidate_subtree(c);
        }
    }

    // ----- render cache -----

    /// Toggle cache eligibility for `id` and every ancestor. A cached
    /// ancestor would otherwise bake a now-dynamic subtree into its
    /// target. Enabling never validates by itself.
    pub fn enable_cache(&mut self, id: ActorId, enabled: bool) {
        let mut cur = Some(id);
        while let Some(cid) = cur {
            match self.actor_mut(cid) {
                Some(a) => {
                    a.cache.enabled = enabled;
                    if !enabled {
                        a.cache.valid = false;
                    }
                    cur = a.parent;
                }
                None => break,
            }
        }
    }

    /// Offset applied when compositing `id`'s cached content. Changing it
    /// scrolls the cached image without invalidating the cache itself;
    /// only ancestors re-render, since their composites baked the old
    /// position.
    pub fn set_cache_offset(&mut self, id: ActorId, offset: Point) {
        let parent = match self.actor_mut(id) {
            Some(a) if a.cache.offset != offset => {
                a.cache.offset = offset;
                a.parent
            }
            _ => return,
        };
        match parent {
            Some(p) => self.invalidate(p),
            None => self.request_redraw(),
        }
    }

    // ----- routing state -----

    pub fn selected(&self) -> Option<ActorId> {
        self.selected
    }

    pub fn hovered(&self) -> Option<ActorId> {
        self.hovered
    }

    pub fn grabbed(&self) -> Option<ActorId> {
        self.grabbed
    }

    /// Change the keyboard selection, invalidating both ends.
    pub fn set_selected(&mut self, id: Option<ActorId>) {
        let id = id.filter(|&a| self.actor(a).is_some());
        if self.selected == id {
            return;
        }
        let old = self.selected;
        self.selected = id;
        if let Some(o) = old {
            self.invalidate(o);
        }
        if let Some(n) = id {
            self.invalidate(n);
        }
    }

    /// Route all pointer events to `id` until release or
    /// [`ungrab`](Self::ungrab).
    pub fn grab(&mut self, id: ActorId) {
        if self.actor(id).is_some() {
            self.grabbed = Some(id);
        } else {
            log::warn!("grab: stale actor id");
        }
    }

    pub fn ungrab(&mut self) {
        self.grabbed = None;
    }

    // ----- stage-wide settings -----

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        if self.background != color {
            self.background = color;
            self.request_redraw();
        }
    }

    pub fn animations_enabled(&self) -> bool {
        self.animations_enabled
    }

    /// Gate for [`begin_transition`](Self::begin_transition). When off,
    /// callers are expected to apply end values immediately.
    pub fn set_animations_enabled(&mut self, enabled: bool) {
        self.animations_enabled = enabled;
    }

    /// Programs used for ordinary drawing and cache compositing.
    pub fn set_programs(&mut self, base: ProgramId, blit: ProgramId) {
        self.base_program = base;
        self.blit_program = blit;
    }

    /// Wrap named actors' paint in backend debug groups.
    pub fn set_debug_groups(&mut self, enabled: bool) {
        self.debug_groups = enabled;
    }

    /// Install the host's wake-up callback, fired whenever the stage
    /// needs a repaint. Must not call back into the stage.
    pub fn set_redraw_hook(&mut self, hook: impl FnMut() + 'static) {
        self.redraw_hook = Some(Box::new(hook));
    }

    pub(crate) fn request_redraw(&mut self) {
        if let Some(hook) = self.redraw_hook.as_mut() {
            hook();
        }
    }

    // ----- transitions -----

    pub fn set_transitions(&mut self, engine: Box<dyn Transitions>) {
        self.transitions = Some(engine);
    }

    /// Hand `values` to the animation engine for `id`. Returns `false`
    /// when animations are disabled or no engine is installed; the caller
    /// then applies end values directly. The actor's render cache is
    /// suspended while the transition runs.
    pub fn begin_transition(&mut self, id: ActorId, values: &[Animatable]) -> bool {
        if !self.animations_enabled || self.transitions.is_none() {
            return false;
        }
        if self.actor(id).is_none() {
            log::warn!("begin_transition: stale actor id");
            return false;
        }
        let prior = self.actor_mut(id).and_then(|a| a.transition.take());
        if let Some(p) = prior.as_ref() {
            if let Some(engine) = self.transitions.as_mut() {
                engine.cancel(p.id);
            }
        }
        let tid = match self.transitions.as_mut() {
            Some(engine) => engine.begin(id, values),
            None => return false,
        };
        if let Some(a) = self.actor_mut(id) {
            let restore = prior.map(|p| p.restore_cache).unwrap_or(a.cache.enabled);
            a.cache.enabled = false;
            a.cache.valid = false;
            a.transition = Some(ActiveTransition {
                id: tid,
                restore_cache: restore,
            });
        }
        self.invalidate(id);
        true
    }

    /// Called by the engine when `id`'s transition completes. Restores the
    /// cache flag suspended by [`begin_transition`](Self::begin_transition).
    pub fn finish_transition(&mut self, id: ActorId) {
        let finished = match self.actor_mut(id) {
            Some(a) => match a.transition.take() {
                Some(t) => {
                    if t.restore_cache {
                        a.cache.enabled = true;
                    }
                    true
                }
                None => false,
            },
            None => false,
        };
        if finished {
            self.invalidate(id);
        }
    }

    pub(crate) fn transition_id(&self, id: ActorId) -> Option<TransitionId> {
        self.actor(id)?.transition.as_ref().map(|t| t.id)
    }

    // ----- lifecycle -----

    /// Run pending init hooks for the whole tree and mark the stage live.
    /// Called automatically by the first paint.
    pub fn realize(&mut self) {
        self.realized = true;
        self.init_subtree(self.root);
    }

    pub(crate) fn init_subtree(&mut self, id: ActorId) {
        let kids = {
            let Some(a) = self.actor_mut(id) else { return };
            if !a.inited {
                a.inited = true;
                a.class.init(id);
                for b in &mut a.behaviours {
                    b.init(id);
                }
            }
            a.children.clone()
        };
        for c in kids {
            self.init_subtree(c);
        }
    }

    /// The device context was lost or rebuilt: forget every offscreen
    /// target and all cached device state, and re-run init hooks. Old
    /// target handles are dropped without destroy calls since they died
    /// with the context.
    pub fn reset_context(&mut self) {
        log::debug!("device context reset: dropping cached targets");
        self.dead_targets.clear();
        for slot in &mut self.slots {
            if let Some(a) = slot.actor.as_mut() {
                a.cache.target = None;
                a.cache.valid = false;
                a.cache.size = (0, 0);
                a.inited = false;
            }
        }
        self.builder.reset_state();
        if self.realized {
            self.init_subtree(self.root);
        }
        self.request_redraw();
    }

    /// Destroy targets whose actors were removed since the last paint.
    /// Runs automatically at the start of every paint.
    pub fn reclaim(&mut self, backend: &mut dyn Backend) {
        for t in self.dead_targets.drain(..) {
            backend.destroy_offscreen_target(t);
        }
    }
}
