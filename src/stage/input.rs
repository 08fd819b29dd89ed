//! Input events and their routing through the actor tree.
//!
//! Pointer events are delivered to the actor under the pointer and bubble
//! toward the root until a hook reports [`EventResponse::Handled`]. Key
//! events start at the selected actor instead. A pointer grab short-circuits
//! picking entirely. Coordinates are rewritten per level, so every hook
//! sees the point in its own content space.

use bitflags::bitflags;

use crate::geometry::Point;

use super::{ActorId, Stage};

bitflags! {
    /// Keyboard modifier state carried by key and button events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const LOGO = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
}

impl Button {
    /// Wheel pseudo-buttons never move the keyboard selection.
    pub(crate) fn selects(self) -> bool {
        matches!(self, Button::Left | Button::Middle | Button::Right)
    }
}

/// How an enter or leave relates to the previous hover target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// The pointer arrived from (or left toward) an unrelated actor.
    Normal,
    /// The pointer stayed inside this actor's subtree.
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ButtonPress {
        point: Point,
        button: Button,
        modifiers: Modifiers,
    },
    ButtonRelease {
        point: Point,
        button: Button,
        modifiers: Modifiers,
    },
    Motion {
        point: Point,
        modifiers: Modifiers,
    },
    Enter {
        point: Point,
        crossing: Crossing,
    },
    Leave {
        point: Point,
        crossing: Crossing,
    },
    KeyPress {
        key: u32,
        modifiers: Modifiers,
    },
    KeyRelease {
        key: u32,
        modifiers: Modifiers,
    },
}

impl Event {
    /// The event's position, for pointer events.
    pub fn coords(&self) -> Option<Point> {
        match self {
            Event::ButtonPress { point, .. }
            | Event::ButtonRelease { point, .. }
            | Event::Motion { point, .. }
            | Event::Enter { point, .. }
            | Event::Leave { point, .. } => Some(*point),
            Event::KeyPress { .. } | Event::KeyRelease { .. } => None,
        }
    }

    /// Copy of the event with its position replaced.
    pub fn with_coords(&self, point: Point) -> Event {
        let mut event = self.clone();
        match &mut event {
            Event::ButtonPress { point: p, .. }
            | Event::ButtonRelease { point: p, .. }
            | Event::Motion { point: p, .. }
            | Event::Enter { point: p, .. }
            | Event::Leave { point: p, .. } => *p = point,
            Event::KeyPress { .. } | Event::KeyRelease { .. } => {}
        }
        event
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResponse {
    /// Keep looking: offer the event to the next hook, then the parent.
    Ignored,
    /// Stop routing.
    Handled,
}

impl Stage {
    /// Route one event through the tree. Returns whether any hook
    /// handled it.
    pub fn dispatch(&mut self, event: Event) -> bool {
        match event {
            Event::KeyPress { .. } | Event::KeyRelease { .. } => {
                let Some(sel) = self.selected.filter(|&s| self.actor(s).is_some()) else {
                    return false;
                };
                self.bubble(sel, &event)
            }
            _ => self.dispatch_pointer(event),
        }
    }

    fn dispatch_pointer(&mut self, event: Event) -> bool {
        let Some(point) = event.coords() else {
            return false;
        };
        if let Some(g) = self.grabbed {
            if self.actor(g).is_none() {
                // The grab died with its actor.
                self.grabbed = None;
            } else {
                let handled = self.bubble(g, &event);
                if matches!(event, Event::ButtonRelease { .. }) {
                    self.grabbed = None;
                }
                return handled;
            }
        }
        match event {
            Event::Motion { .. } => {
                let target = self.pick(point);
                self.update_hover(target, point);
                match target {
                    Some(t) => self.bubble(t, &event),
                    None => false,
                }
            }
            Event::Enter { .. } => {
                let target = self.pick(point);
                self.update_hover(target, point);
                false
            }
            Event::Leave { .. } => {
                self.update_hover(None, point);
                false
            }
            Event::ButtonPress { button, .. } | Event::ButtonRelease { button, .. } => {
                let Some(target) = self.pick(point) else {
                    return false;
                };
                if button.selects() {
                    self.set_selected(Some(target));
                }
                self.bubble(target, &event)
            }
            Event::KeyPress { .. } | Event::KeyRelease { .. } => false,
        }
    }

    /// Offer `event` to `origin` and each ancestor in turn, localizing
    /// coordinates per level.
    fn bubble(&mut self, origin: ActorId, event: &Event) -> bool {
        let mut cur = Some(origin);
        while let Some(id) = cur {
            let local = match event.coords() {
                Some(p) => event.with_coords(p.diff(self.find_offset(id))),
                None => event.clone(),
            };
            if self.deliver(id, &local) == EventResponse::Handled {
                return true;
            }
            cur = self.actor(id).and_then(|a| a.parent);
        }
        false
    }

    /// One level of delivery: behaviours in attach order, then the class.
    fn deliver(&mut self, id: ActorId, event: &Event) -> EventResponse {
        let count = self.actor(id).map(|a| a.behaviours.len()).unwrap_or(0);
        for i in 0..count {
            let response = self.with_behaviour(id, i, |stage, b| b.event(stage, id, event));
            if response == Some(EventResponse::Handled) {
                return EventResponse::Handled;
            }
        }
        self.with_class(id, |stage, class| class.event(stage, id, event))
            .unwrap_or(EventResponse::Ignored)
    }

    /// Retarget the hover, synthesizing leave then enter. Synthesized
    /// crossings are delivered to their actor only, without bubbling.
    fn update_hover(&mut self, target: Option<ActorId>, point: Point) {
        let old = self.hovered.filter(|&h| self.actor(h).is_some());
        if old == target {
            self.hovered = target;
            return;
        }
        self.hovered = target;
        if let Some(o) = old {
            let crossing = match target {
                Some(n) if self.is_descendant(n, o) => Crossing::Descendant,
                _ => Crossing::Normal,
            };
            let local = point.diff(self.find_offset(o));
            self.deliver(
                o,
                &Event::Leave {
                    point: local,
                    crossing,
                },
            );
        }
        if let Some(n) = target {
            let crossing = match old {
                Some(o) if self.is_descendant(o, n) => Crossing::Descendant,
                _ => Crossing::Normal,
            };
            let local = point.diff(self.find_offset(n));
            self.deliver(
                n,
                &Event::Enter {
                    point: local,
                    crossing,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::geometry::Rect;
    use crate::stage::{ActorClass, Behaviour};

    type Log = Rc<RefCell<Vec<(&'static str, Event)>>>;

    struct Listener {
        name: &'static str,
        log: Log,
        response: EventResponse,
    }

    impl Listener {
        fn new(name: &'static str, log: &Log, response: EventResponse) -> Box<Self> {
            Box::new(Self {
                name,
                log: Rc::clone(log),
                response,
            })
        }
    }

    impl ActorClass for Listener {
        fn event(&mut self, _stage: &mut Stage, _actor: ActorId, event: &Event) -> EventResponse {
            self.log.borrow_mut().push((self.name, event.clone()));
            self.response
        }
    }

    struct Tap {
        name: &'static str,
        log: Log,
        response: EventResponse,
    }

    impl Behaviour for Tap {
        fn event(&mut self, _stage: &mut Stage, _actor: ActorId, event: &Event) -> EventResponse {
            self.log.borrow_mut().push((self.name, event.clone()));
            self.response
        }
    }

    fn stage() -> Stage {
        Stage::new(Rect::from_size(800, 600))
    }

    fn listener_at(
        s: &mut Stage,
        parent: ActorId,
        region: Rect,
        name: &'static str,
        log: &Log,
        response: EventResponse,
    ) -> ActorId {
        let id = s.create(Listener::new(name, log, response));
        s.set_region(id, region);
        s.add_child(parent, id);
        id
    }

    fn motion(x: i32, y: i32) -> Event {
        Event::Motion {
            point: Point::new(x, y),
            modifiers: Modifiers::empty(),
        }
    }

    fn press(x: i32, y: i32, button: Button) -> Event {
        Event::ButtonPress {
            point: Point::new(x, y),
            button,
            modifiers: Modifiers::empty(),
        }
    }

    fn release(x: i32, y: i32, button: Button) -> Event {
        Event::ButtonRelease {
            point: Point::new(x, y),
            button,
            modifiers: Modifiers::empty(),
        }
    }

    fn kinds(log: &Log) -> Vec<&'static str> {
        log.borrow()
            .iter()
            .map(|(_, event)| match event {
                Event::ButtonPress { .. } => "press",
                Event::ButtonRelease { .. } => "release",
                Event::Motion { .. } => "motion",
                Event::Enter { .. } => "enter",
                Event::Leave { .. } => "leave",
                Event::KeyPress { .. } => "key",
                Event::KeyRelease { .. } => "key-up",
            })
            .collect()
    }

    #[test]
    fn key_events_follow_selection() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let a = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 110, 110),
            "a",
            &log,
            EventResponse::Handled,
        );
        let key = Event::KeyPress {
            key: 0x20,
            modifiers: Modifiers::empty(),
        };

        assert!(!s.dispatch(key.clone()));
        assert!(log.borrow().is_empty());

        s.set_selected(Some(a));
        assert!(s.dispatch(key));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].0, "a");
    }

    #[test]
    fn press_selects_and_bubbles_to_handler() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let outer = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 210, 210),
            "outer",
            &log,
            EventResponse::Handled,
        );
        let inner = listener_at(
            &mut s,
            outer,
            Rect::new(20, 20, 120, 120),
            "inner",
            &log,
            EventResponse::Ignored,
        );

        assert!(s.dispatch(press(50, 50, Button::Left)));
        assert_eq!(s.selected(), Some(inner));
        let seen: Vec<&str> = log.borrow().iter().map(|(n, _)| *n).collect();
        assert_eq!(seen, vec!["inner", "outer"]);
    }

    #[test]
    fn bubbling_localizes_coordinates_per_level() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let outer = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 210, 210),
            "outer",
            &log,
            EventResponse::Ignored,
        );
        let inner = listener_at(
            &mut s,
            outer,
            Rect::new(20, 20, 120, 120),
            "inner",
            &log,
            EventResponse::Ignored,
        );
        let _ = inner;

        s.dispatch(press(50, 50, Button::Left));
        let seen = log.borrow();
        assert_eq!(seen[0].1.coords(), Some(Point::new(20, 20)));
        assert_eq!(seen[1].1.coords(), Some(Point::new(40, 40)));
    }

    #[test]
    fn wheel_press_keeps_selection() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let a = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 110, 110),
            "a",
            &log,
            EventResponse::Handled,
        );
        let b = listener_at(
            &mut s,
            root,
            Rect::new(200, 10, 300, 110),
            "b",
            &log,
            EventResponse::Handled,
        );
        let _ = b;

        s.dispatch(press(50, 50, Button::Left));
        assert_eq!(s.selected(), Some(a));

        s.dispatch(press(250, 50, Button::WheelDown));
        assert_eq!(s.selected(), Some(a));
    }

    #[test]
    fn motion_synthesizes_enter_and_leave() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let a = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 110, 110),
            "a",
            &log,
            EventResponse::Ignored,
        );
        let b = listener_at(
            &mut s,
            root,
            Rect::new(200, 10, 300, 110),
            "b",
            &log,
            EventResponse::Ignored,
        );
        let _ = (a, b);

        s.dispatch(motion(50, 50));
        s.dispatch(motion(250, 50));
        let seen: Vec<(&str, &str)> = log
            .borrow()
            .iter()
            .zip(kinds(&log))
            .map(|((name, _), kind)| (*name, kind))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("a", "enter"),
                ("a", "motion"),
                ("a", "leave"),
                ("b", "enter"),
                ("b", "motion"),
            ]
        );
    }

    #[test]
    fn crossings_mark_subtree_moves() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let outer = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 310, 310),
            "outer",
            &log,
            EventResponse::Ignored,
        );
        let inner = listener_at(
            &mut s,
            outer,
            Rect::new(100, 100, 200, 200),
            "inner",
            &log,
            EventResponse::Ignored,
        );
        let _ = inner;

        s.dispatch(motion(50, 50)); // over outer only
        s.dispatch(motion(150, 150)); // into inner
        s.dispatch(motion(50, 50)); // back out to outer

        let crossings: Vec<(&str, Crossing, &str)> = log
            .borrow()
            .iter()
            .filter_map(|(name, event)| match event {
                Event::Enter { crossing, .. } => Some((*name, *crossing, "enter")),
                Event::Leave { crossing, .. } => Some((*name, *crossing, "leave")),
                _ => None,
            })
            .collect();
        assert_eq!(
            crossings,
            vec![
                ("outer", Crossing::Normal, "enter"),
                ("outer", Crossing::Descendant, "leave"),
                ("inner", Crossing::Normal, "enter"),
                ("inner", Crossing::Normal, "leave"),
                ("outer", Crossing::Descendant, "enter"),
            ]
        );
    }

    #[test]
    fn synthesized_crossings_do_not_bubble() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let outer = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 310, 310),
            "outer",
            &log,
            EventResponse::Ignored,
        );
        let inner = listener_at(
            &mut s,
            outer,
            Rect::new(100, 100, 200, 200),
            "inner",
            &log,
            EventResponse::Ignored,
        );
        let _ = inner;

        s.dispatch(motion(150, 150));
        // Outer sees the bubbled motion but not inner's enter.
        let outer_kinds: Vec<&str> = log
            .borrow()
            .iter()
            .zip(kinds(&log))
            .filter(|((name, _), _)| *name == "outer")
            .map(|(_, kind)| kind)
            .collect();
        assert_eq!(outer_kinds, vec!["motion"]);
    }

    #[test]
    fn grab_routes_all_pointer_events() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let a = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 110, 110),
            "a",
            &log,
            EventResponse::Handled,
        );
        let b = listener_at(
            &mut s,
            root,
            Rect::new(200, 10, 300, 110),
            "b",
            &log,
            EventResponse::Handled,
        );
        let _ = b;

        s.grab(a);
        // Pointer is over b, but the grab wins; coords localize to a.
        assert!(s.dispatch(motion(250, 50)));
        assert_eq!(log.borrow()[0].0, "a");
        assert_eq!(log.borrow()[0].1.coords(), Some(Point::new(240, 40)));

        assert!(s.dispatch(release(250, 50, Button::Left)));
        assert_eq!(s.grabbed(), None);

        log.borrow_mut().clear();
        s.dispatch(motion(250, 50));
        assert_eq!(log.borrow().last().map(|(n, _)| *n), Some("b"));
    }

    #[test]
    fn dead_grab_self_heals() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let a = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 110, 110),
            "a",
            &log,
            EventResponse::Handled,
        );
        let b = listener_at(
            &mut s,
            root,
            Rect::new(200, 10, 300, 110),
            "b",
            &log,
            EventResponse::Handled,
        );
        let _ = b;

        s.remove_child(root, a);
        // A grab that somehow survived its actor must not eat events.
        s.grabbed = Some(a);
        assert!(s.dispatch(motion(250, 50)));
        assert_eq!(s.grabbed(), None);
        assert_eq!(log.borrow().last().map(|(n, _)| *n), Some("b"));
    }

    #[test]
    fn behaviours_run_before_class() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let a = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 110, 110),
            "class",
            &log,
            EventResponse::Ignored,
        );
        s.add_behaviour(
            a,
            Box::new(Tap {
                name: "first",
                log: Rc::clone(&log),
                response: EventResponse::Ignored,
            }),
        );
        s.add_behaviour(
            a,
            Box::new(Tap {
                name: "second",
                log: Rc::clone(&log),
                response: EventResponse::Handled,
            }),
        );

        assert!(s.dispatch(press(50, 50, Button::Left)));
        let seen: Vec<&str> = log.borrow().iter().map(|(n, _)| *n).collect();
        // The handling behaviour stops delivery before the class runs.
        assert_eq!(seen, vec!["first", "second"]);
    }

    #[test]
    fn leave_event_clears_hover() {
        let mut s = stage();
        let root = s.root();
        let log: Log = Rc::default();
        let a = listener_at(
            &mut s,
            root,
            Rect::new(10, 10, 110, 110),
            "a",
            &log,
            EventResponse::Ignored,
        );
        let _ = a;

        s.dispatch(motion(50, 50));
        assert!(s.hovered().is_some());
        s.dispatch(Event::Leave {
            point: Point::new(-1, -1),
            crossing: Crossing::Normal,
        });
        assert_eq!(s.hovered(), None);
        assert_eq!(kinds(&log).last(), Some(&"leave"));
    }
}
