//! Plain-text tree dump for logs and bug reports.

use std::fmt::{self, Write};

use super::{ActorId, Stage};

impl Stage {
    /// Write one line per live actor, indented by depth: name (or `-`),
    /// region as `WxH+X+Y`, absolute offset, then any noteworthy flags.
    pub fn dump_tree(&self, out: &mut dyn Write) -> fmt::Result {
        self.dump_node(out, self.root(), 0)
    }

    fn dump_node(&self, out: &mut dyn Write, id: ActorId, depth: usize) -> fmt::Result {
        let Some(a) = self.actor(id) else { return Ok(()) };
        for _ in 0..depth {
            out.write_str("  ")?;
        }
        let r = a.region;
        write!(
            out,
            "{} {}x{}{:+}{:+}",
            a.name.as_deref().unwrap_or("-"),
            r.width(),
            r.height(),
            r.x1,
            r.y1,
        )?;
        let off = self.find_offset(id);
        write!(out, " at=({},{})", off.x, off.y)?;
        if !self.onscreen(id) {
            out.write_str(" offscreen")?;
        }
        if r.width() < 0 || r.height() < 0 {
            out.write_str(" negative")?;
        } else if r.is_empty() {
            out.write_str(" zero")?;
        }
        if a.disabled {
            out.write_str(" disabled")?;
        }
        if a.cache.enabled {
            out.write_str(if a.cache.valid {
                " cache=valid"
            } else {
                " cache=dirty"
            })?;
        }
        if !a.scroll.is_empty() {
            let s = a.scroll;
            write!(
                out,
                " scroll={}x{}{:+}{:+}",
                s.width(),
                s.height(),
                s.x1,
                s.y1
            )?;
        }
        out.write_str("\n")?;
        for &child in &a.children {
            self.dump_node(out, child, depth + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::color::Color;
    use crate::geometry::Rect;
    use crate::stage::{Panel, Stage};

    #[test]
    fn dump_lists_tree_with_flags() {
        let mut s = Stage::new(Rect::from_size(800, 600));
        let root = s.root();
        let sidebar = s.create_named(Box::new(Panel::new(Color::WHITE)), "sidebar");
        s.set_region(sidebar, Rect::new(0, 0, 200, 600));
        s.add_child(root, sidebar);
        let stray = s.create(Box::new(Panel::new(Color::BLACK)));
        s.set_region(stray, Rect::new(900, 0, 1000, 100));
        s.add_child(root, stray);
        s.enable_cache(sidebar, true);

        let mut text = String::new();
        s.dump_tree(&mut text).unwrap();
        assert_eq!(
            text,
            "- 800x600+0+0 at=(0,0) cache=dirty\n\
             \x20 sidebar 200x600+0+0 at=(0,0) cache=dirty\n\
             \x20 - 100x100+900+0 at=(900,0) offscreen\n"
        );
    }
}
