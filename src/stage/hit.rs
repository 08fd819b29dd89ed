//! Point-to-actor resolution and visibility tests.
//!
//! Stage coordinates are the root's content space: the root's own region
//! origin is a window placement handled by the viewport, so it never enters
//! these sums. Scroll origins do, since they shift where content paints.

use crate::geometry::{Point, Rect};

use super::{ActorId, Stage};

impl Stage {
    /// Translation from stage coordinates to `id`'s content coordinates.
    /// Subtracting it from a stage point yields the point an actor's paint
    /// and event hooks see.
    pub fn find_offset(&self, id: ActorId) -> Point {
        let mut offset = Point::ZERO;
        let mut cur = Some(id);
        while let Some(cid) = cur {
            let Some(a) = self.actor(cid) else { break };
            if cid != self.root {
                offset = offset.offset(a.region.origin());
            }
            offset = offset.offset(a.scroll.origin());
            cur = a.parent;
        }
        offset
    }

    /// Deepest, topmost actor under `point`, or `None` when the point is
    /// outside the stage. Disabled actors hide their whole subtree; a point
    /// exactly on an actor's edge falls through to the actor behind it.
    pub fn pick(&self, point: Point) -> Option<ActorId> {
        let root = self.actor(self.root)?;
        if root.disabled {
            return None;
        }
        let extent = Rect::from_size(root.region.width(), root.region.height());
        if !extent.contains(point) {
            return None;
        }
        let p = point.diff(root.scroll.origin());
        self.hit(self.root, p)
    }

    fn hit(&self, id: ActorId, p: Point) -> Option<ActorId> {
        let a = self.actor(id)?;
        // Later children stack above earlier ones.
        for &child in a.children.iter().rev() {
            let Some(c) = self.actor(child) else { continue };
            if c.disabled || !c.region.contains_interior(p) {
                continue;
            }
            let q = p.diff(c.region.origin()).diff(c.scroll.origin());
            if let Some(found) = self.hit(child, q) {
                return Some(found);
            }
        }
        Some(id)
    }

    /// Whether any part of `id`'s visible bounds lands inside the stage
    /// area. The bounds are the scroll window when one is set, otherwise
    /// the full extent.
    pub(crate) fn onscreen(&self, id: ActorId) -> bool {
        let Some(root) = self.actor(self.root) else {
            return false;
        };
        let visible = Rect::from_size(root.region.width(), root.region.height());
        let Some(a) = self.actor(id) else { return false };
        let local = if a.scroll.is_empty() {
            Rect::from_size(a.region.width(), a.region.height())
        } else {
            a.scroll
        };
        // The scroll window itself does not move with the content.
        let base = self.find_offset(id).diff(a.scroll.origin());
        local.translated(base).intersects(&visible)
    }

    /// Whether painting `id` can have any effect. Actors without positive
    /// extent are skipped unless they are pure structure, which still
    /// positions children.
    pub(crate) fn paintable(&self, id: ActorId) -> bool {
        let Some(a) = self.actor(id) else { return false };
        if a.region.is_empty() {
            return !a.class.paints();
        }
        self.onscreen(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::stage::{Group, Panel};

    fn stage() -> Stage {
        Stage::new(Rect::from_size(800, 600))
    }

    fn panel_at(s: &mut Stage, parent: ActorId, region: Rect) -> ActorId {
        let id = s.create(Box::new(Panel::new(Color::WHITE)));
        s.set_region(id, region);
        s.add_child(parent, id);
        id
    }

    #[test]
    fn find_offset_sums_ancestors_without_root_origin() {
        let mut s = Stage::new(Rect::new(100, 50, 900, 650));
        let root = s.root();
        let a = panel_at(&mut s, root, Rect::new(10, 20, 110, 120));
        let b = panel_at(&mut s, a, Rect::new(5, 5, 50, 50));
        assert_eq!(s.find_offset(a), Point::new(10, 20));
        assert_eq!(s.find_offset(b), Point::new(15, 25));
    }

    #[test]
    fn find_offset_includes_scroll_origins() {
        let mut s = stage();
        let root = s.root();
        let a = panel_at(&mut s, root, Rect::new(10, 10, 210, 210));
        s.set_scroll(a, Rect::new(-30, 0, 170, 200));
        let b = panel_at(&mut s, a, Rect::new(5, 5, 50, 50));
        assert_eq!(s.find_offset(b), Point::new(-15, 15));
    }

    #[test]
    fn pick_returns_deepest_actor() {
        let mut s = stage();
        let root = s.root();
        let outer = panel_at(&mut s, root, Rect::new(10, 10, 210, 210));
        let inner = panel_at(&mut s, outer, Rect::new(20, 20, 120, 120));
        assert_eq!(s.pick(Point::new(50, 50)), Some(inner));
        assert_eq!(s.pick(Point::new(15, 15)), Some(outer));
        assert_eq!(s.pick(Point::new(500, 500)), Some(root));
    }

    #[test]
    fn pick_prefers_later_sibling_on_overlap() {
        let mut s = stage();
        let root = s.root();
        let below = panel_at(&mut s, root, Rect::new(10, 10, 110, 110));
        let above = panel_at(&mut s, root, Rect::new(50, 50, 150, 150));
        assert_eq!(s.pick(Point::new(60, 60)), Some(above));
        assert_eq!(s.pick(Point::new(20, 20)), Some(below));
    }

    #[test]
    fn edge_points_fall_through() {
        let mut s = stage();
        let root = s.root();
        let a = panel_at(&mut s, root, Rect::new(10, 10, 110, 110));
        assert_eq!(s.pick(Point::new(10, 50)), Some(root));
        assert_eq!(s.pick(Point::new(110, 50)), Some(root));
        assert_eq!(s.pick(Point::new(50, 10)), Some(root));
        assert_eq!(s.pick(Point::new(50, 110)), Some(root));
        assert_eq!(s.pick(Point::new(11, 50)), Some(a));
    }

    #[test]
    fn disabled_hides_subtree() {
        let mut s = stage();
        let root = s.root();
        let a = panel_at(&mut s, root, Rect::new(10, 10, 210, 210));
        let b = panel_at(&mut s, a, Rect::new(20, 20, 120, 120));
        assert_eq!(s.pick(Point::new(50, 50)), Some(b));
        s.set_disabled(a, true);
        assert_eq!(s.pick(Point::new(50, 50)), Some(root));
    }

    #[test]
    fn scrolled_parent_shifts_child_hits() {
        let mut s = stage();
        let root = s.root();
        let pane = panel_at(&mut s, root, Rect::new(0, 0, 300, 300));
        s.set_scroll(pane, Rect::new(0, -40, 300, 260));
        let item = panel_at(&mut s, pane, Rect::new(10, 100, 110, 140));
        // Content is shifted up by 40, so the item shows at y 60..100.
        assert_eq!(s.pick(Point::new(50, 70)), Some(item));
        assert_eq!(s.pick(Point::new(50, 120)), Some(pane));
    }

    #[test]
    fn onscreen_tracks_stage_area() {
        let mut s = stage();
        let root = s.root();
        let visible = panel_at(&mut s, root, Rect::new(700, 500, 900, 700));
        let gone = panel_at(&mut s, root, Rect::new(800, 0, 900, 100));
        assert!(s.onscreen(visible));
        assert!(!s.onscreen(gone));
    }

    #[test]
    fn scroll_window_defines_visibility() {
        let mut s = Stage::new(Rect::from_size(100, 50));
        let root = s.root();
        let pane = panel_at(&mut s, root, Rect::new(0, 0, 100, 50));
        s.set_scroll(pane, Rect::new(-10, 0, 90, 50));
        assert!(s.onscreen(pane));
        s.set_scroll(pane, Rect::new(-200, 0, -110, 50));
        assert!(!s.onscreen(pane));
    }

    #[test]
    fn degenerate_structure_stays_paintable() {
        let mut s = stage();
        let root = s.root();
        let group = s.create(Box::new(Group));
        s.add_child(root, group);
        let leaf = panel_at(&mut s, group, Rect::new(0, 0, 0, 40));
        assert!(s.paintable(group));
        assert!(!s.paintable(leaf));
    }
}
