//! A headless tour of the stage pipeline.
//!
//! This example shows:
//! 1. Building an actor tree with panels, borders and a scrolled list
//! 2. What the first frame records and replays against the backend
//! 3. How a cached subtree collapses to a single composite on frame two
//! 4. Scrolling a cached list by moving only its composite offset
//! 5. Hit-testing and event dispatch on the same tree
//!
//! Run with `RUST_LOG=debug` to see the stage's own logging.

use palco::backend::TraceCall;
use palco::prelude::*;

fn print_frame(label: &str, backend: &TraceBackend) {
    println!("--- {label} ({} calls) ---", backend.calls.len());
    for call in &backend.calls {
        println!("  {call:?}");
    }
    println!();
}

fn main() {
    env_logger::init();

    let mut stage = Stage::new(Rect::from_size(480, 320));
    stage.set_background(Color::from_hex(0x101018));
    let root = stage.root();

    // A framed header across the top.
    let header = stage.create_named(Box::new(Panel::new(Color::from_hex(0x2d3a55))), "header");
    stage.set_region(header, Rect::new(10, 10, 470, 50));
    stage.add_behaviour(header, Box::new(Border::new(Color::WHITE, 2)));
    stage.add_child(root, header);

    // A scrollable list, cached so scrolling re-composites instead of
    // re-painting every row.
    let list = stage.create_named(Box::new(Panel::new(Color::from_hex(0x1a2230))), "list");
    stage.set_region(list, Rect::new(10, 60, 230, 310));
    stage.set_scroll(list, Rect::new(0, 0, 220, 250));
    stage.add_behaviour(list, Box::new(ClipChildren::new()));
    stage.enable_cache(list, true);
    stage.add_child(root, list);
    for i in 0..8 {
        let row = stage.create(Box::new(Panel::new(Color::rgb(
            0.2,
            0.3 + i as f32 * 0.05,
            0.5,
        ))));
        stage.set_region(row, Rect::new(5, 5 + i * 40, 215, 40 + i * 40));
        stage.add_child(list, row);
    }

    // An uncached panel beside it for contrast.
    let side = stage.create_named(Box::new(Panel::new(Color::from_hex(0x224433))), "side");
    stage.set_region(side, Rect::new(250, 60, 470, 310));
    stage.add_child(root, side);

    let mut backend = TraceBackend::new();

    stage.paint(&mut backend);
    print_frame("frame 1: everything renders", &backend);

    backend.clear_calls();
    stage.paint(&mut backend);
    print_frame("frame 2: caches valid, only the root composite replays", &backend);

    // Scroll the list up by 80 pixels. Its target is untouched; only the
    // ancestors that baked its position re-render.
    stage.set_cache_offset(list, Point::new(0, -80));
    backend.clear_calls();
    stage.paint(&mut backend);
    let rerendered = backend
        .calls
        .iter()
        .filter(|c| matches!(c, TraceCall::Bind(Some(_))))
        .count();
    print_frame("frame 3: scrolled by composite offset", &backend);
    println!("targets re-rendered while scrolling: {rerendered}");
    println!("offscreen targets alive: {}", backend.target_count());
    println!();

    // The same tree answers pointer queries.
    let hit = stage.pick(Point::new(100, 80));
    println!("pick(100, 80) -> {hit:?} (the first list row)");
    stage.dispatch(Event::ButtonPress {
        point: Point::new(100, 80),
        button: Button::Left,
        modifiers: Modifiers::empty(),
    });
    println!("after a left press there, selected: {:?}", stage.selected());
    println!();

    let mut tree = String::new();
    if stage.dump_tree(&mut tree).is_ok() {
        println!("--- tree ---");
        print!("{tree}");
    }
}
