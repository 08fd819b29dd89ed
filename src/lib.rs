pub mod color;
pub mod geometry;
pub mod stage;
pub mod transform;
pub mod transition;

// These modules are public for advanced use cases
pub mod backend;
pub mod ops;

pub mod prelude {
    pub use crate::backend::{Backend, BackendError, Blend, ProgramId, TargetId, TraceBackend};
    pub use crate::color::Color;
    pub use crate::geometry::{Point, PointF, Rect, RectF};
    pub use crate::ops::{OpBuilder, OpKind};
    pub use crate::stage::{
        Actor, ActorClass, ActorId, Behaviour, Border, Button, Chain, ClipChildren, Crossing,
        Event, EventResponse, Group, Modifiers, Painter, Panel, Stage,
    };
    pub use crate::transform::Transform;
    pub use crate::transition::{Animatable, TransitionId, Transitions};
}
