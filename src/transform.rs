//! Flat 2D transforms: translation and axis-aligned scale only.
//!
//! The stage never rotates or shears, so a transform is four floats plus a
//! category tag. The tag is carried through composition so consumers can
//! skip work for identity or translation-only transforms without comparing
//! float components.

/// Coarse classification of a [`Transform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Identity,
    Translation,
    Affine,
}

/// A composed transform: `p' = p * (sx, sy) + (dx, dy)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub dx: f32,
    pub dy: f32,
    pub sx: f32,
    pub sy: f32,
    category: Category,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        dx: 0.0,
        dy: 0.0,
        sx: 1.0,
        sy: 1.0,
        category: Category::Identity,
    };

    /// Build from raw components, classifying the result.
    pub fn new(dx: f32, dy: f32, sx: f32, sy: f32) -> Self {
        let category = if sx != 1.0 || sy != 1.0 {
            Category::Affine
        } else if dx != 0.0 || dy != 0.0 {
            Category::Translation
        } else {
            Category::Identity
        };
        Self { dx, dy, sx, sy, category }
    }

    pub fn translate(dx: f32, dy: f32) -> Self {
        Self::new(dx, dy, 1.0, 1.0)
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self::new(0.0, 0.0, sx, sy)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn is_identity(&self) -> bool {
        self.category == Category::Identity
    }

    /// Compose so that `other` applies first, then `self`.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            dx: self.sx * other.dx + self.dx,
            dy: self.sy * other.dy + self.dy,
            sx: self.sx * other.sx,
            sy: self.sy * other.sy,
            category: self.category.max(other.category),
        }
    }

    /// Apply to a point.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.sx + self.dx, y * self.sy + self.dy)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn constructors_classify() {
        assert_eq!(Transform::IDENTITY.category(), Category::Identity);
        assert_eq!(Transform::translate(0.0, 0.0).category(), Category::Identity);
        assert_eq!(Transform::translate(3.0, 0.0).category(), Category::Translation);
        assert_eq!(Transform::scale(2.0, 2.0).category(), Category::Affine);
        assert_eq!(Transform::scale(1.0, 1.0).category(), Category::Identity);
    }

    #[test]
    fn then_applies_other_first() {
        // Scale by 2, then translate by (10, 0): the point (1, 1) lands at
        // (12, 2) when the composed transform is built as t.then(&s).
        let s = Transform::scale(2.0, 2.0);
        let t = Transform::translate(10.0, 0.0);
        let composed = t.then(&s);
        let (x, y) = composed.apply(1.0, 1.0);
        assert!(approx_eq(x, 12.0));
        assert!(approx_eq(y, 2.0));
    }

    #[test]
    fn nested_translations_accumulate() {
        let a = Transform::translate(5.0, 7.0);
        let b = Transform::translate(-2.0, 3.0);
        let composed = a.then(&b);
        assert_eq!(composed.category(), Category::Translation);
        let (x, y) = composed.apply(0.0, 0.0);
        assert!(approx_eq(x, 3.0));
        assert!(approx_eq(y, 10.0));
    }

    #[test]
    fn scaled_composition_scales_inner_offset() {
        // The outer scale multiplies the inner translation.
        let outer = Transform::scale(2.0, 2.0);
        let inner = Transform::translate(10.0, 10.0);
        let composed = outer.then(&inner);
        let (x, y) = composed.apply(0.0, 0.0);
        assert!(approx_eq(x, 20.0));
        assert!(approx_eq(y, 20.0));
    }

    #[test]
    fn category_survives_composition() {
        let t = Transform::translate(1.0, 0.0);
        let s = Transform::scale(3.0, 1.0);
        assert_eq!(t.then(&Transform::IDENTITY).category(), Category::Translation);
        assert_eq!(t.then(&s).category(), Category::Affine);
        assert_eq!(
            Transform::IDENTITY.then(&Transform::IDENTITY).category(),
            Category::Identity
        );
    }
}
