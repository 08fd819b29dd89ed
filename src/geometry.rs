//! Geometry value types shared by the stage tree and the render-op stream.
//!
//! Tree-side geometry (regions, scroll areas, hit points) is integer pixel
//! math; op payloads and vertex data use the float variants.

/// An integer point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise sum.
    pub fn offset(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    /// Component-wise difference.
    pub fn diff(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

/// A float point, used for vertex and clip payloads.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<Point> for PointF {
    fn from(p: Point) -> Self {
        PointF::new(p.x as f32, p.y as f32)
    }
}

/// An integer rectangle stored as corner bounds.
///
/// The covered pixel span is half-open: `[x1, x2) x [y1, y2)`, so width is
/// `x2 - x1`. A rect with non-positive width or height is empty and is never
/// drawn or hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub const ZERO: Rect = Rect { x1: 0, y1: 0, x2: 0, y2: 0 };

    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// A rect at the origin with the given extent.
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self { x1: 0, y1: 0, x2: width, y2: height }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    /// True when the covered pixel span is empty (zero or inverted bounds).
    pub fn is_empty(&self) -> bool {
        self.width() < 1 || self.height() < 1
    }

    /// The same rect shifted by `d`.
    pub fn translated(&self, d: Point) -> Rect {
        Rect::new(self.x1 + d.x, self.y1 + d.y, self.x2 + d.x, self.y2 + d.y)
    }

    /// Half-open containment: includes the `x1`/`y1` edges, excludes `x2`/`y2`.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x1 && p.x < self.x2 && p.y >= self.y1 && p.y < self.y2
    }

    /// Strict interior containment: all four edges excluded.
    ///
    /// Hit-testing uses this so a pointer resting exactly on a child's border
    /// falls through to the parent.
    pub fn contains_interior(&self, p: Point) -> bool {
        p.x > self.x1 && p.x < self.x2 && p.y > self.y1 && p.y < self.y2
    }

    /// True when the two half-open spans overlap by at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x1 < other.x2
            && other.x1 < self.x2
            && self.y1 < other.y2
            && other.y1 < self.y2
    }
}

/// A float rectangle stored as origin plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

impl From<Rect> for RectF {
    fn from(r: Rect) -> Self {
        RectF::new(
            r.x1 as f32,
            r.y1 as f32,
            r.width() as f32,
            r.height() as f32,
        )
    }
}
