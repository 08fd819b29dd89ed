//! RGBA color with float components in `0.0..=1.0`.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Build an opaque color from a `0xRRGGBB` literal.
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
            a: 1.0,
        }
    }

    /// The same color with its alpha replaced.
    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
}

impl Default for Color {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_hex_extracts_channels() {
        let c = Color::from_hex(0xFF8000);
        assert!((c.r - 1.0).abs() < 1e-6);
        assert!((c.g - 0.502).abs() < 1e-3);
        assert!((c.b - 0.0).abs() < 1e-6);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn with_alpha_keeps_channels() {
        let c = Color::from_hex(0x336699).with_alpha(0.5);
        assert_eq!(c.a, 0.5);
        assert_eq!(c.b, Color::from_hex(0x336699).b);
    }
}
