//! Bridge to an external animation engine.
//!
//! The stage does not run timers or easing itself. A host installs a
//! [`Transitions`] engine on the stage; actors start value transitions
//! through it and the engine drives per-frame updates (typically by
//! mutating actor state and invalidating). The stage's side of the
//! contract is cache handling: a transitioning actor's offscreen cache is
//! suspended until the transition finishes, and a transition is cancelled
//! when its actor is removed.

use crate::stage::ActorId;

/// Handle to an in-flight transition, issued by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionId(pub u64);

/// One animated value: from `from` to `to` over `duration_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Animatable {
    pub from: f32,
    pub to: f32,
    pub duration_ms: u32,
}

impl Animatable {
    pub const fn new(from: f32, to: f32, duration_ms: u32) -> Self {
        Self { from, to, duration_ms }
    }
}

pub trait Transitions {
    /// Start animating `values` for `actor`, returning a handle the stage
    /// keeps until the transition finishes or the actor is removed.
    fn begin(&mut self, actor: ActorId, values: &[Animatable]) -> TransitionId;

    /// Stop a transition early. Called when the owning actor is removed
    /// or a new transition replaces it.
    fn cancel(&mut self, transition: TransitionId);
}
