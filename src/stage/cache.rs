//! Per-actor offscreen render cache.

use crate::backend::TargetId;
use crate::geometry::Point;

/// Largest axis an offscreen target may have. Actors bigger than this are
/// painted uncached.
pub const MAX_TARGET_AXIS: u32 = 4096;

/// Round a content extent up to its allocation size class.
pub(crate) fn next_pow2(v: u32) -> u32 {
    v.max(1).next_power_of_two()
}

/// True when an extent cannot be cached at all.
pub(crate) fn oversized(width: u32, height: u32) -> bool {
    width > MAX_TARGET_AXIS || height > MAX_TARGET_AXIS
}

/// Cache state carried by every actor.
///
/// `size` is the allocated power-of-two extent of `target`; `request` is
/// the content extent actually rendered into it. Compositing samples only
/// the `request` portion.
#[derive(Debug, Default)]
pub struct RenderCache {
    pub(crate) enabled: bool,
    pub(crate) valid: bool,
    pub(crate) target: Option<TargetId>,
    pub(crate) size: (u32, u32),
    pub(crate) request: (u32, u32),
    pub(crate) offset: Point,
}

impl RenderCache {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn target(&self) -> Option<TargetId> {
        self.target
    }

    /// Composite offset applied when drawing the cached content.
    pub fn offset(&self) -> Point {
        self.offset
    }

    /// Record a new content extent. Returns `true` when the power-of-two
    /// size class changes, which means the backing target no longer fits
    /// its content and must change size at the next render.
    pub(crate) fn note_size(&mut self, width: u32, height: u32) -> bool {
        self.request = (width, height);
        self.target.is_some() && (next_pow2(width), next_pow2(height)) != self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow2_rounds_up_with_floor_of_one() {
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(65), 128);
        assert_eq!(next_pow2(128), 128);
        assert_eq!(next_pow2(129), 256);
    }

    #[test]
    fn oversized_checks_each_axis() {
        assert!(!oversized(4096, 4096));
        assert!(oversized(4097, 10));
        assert!(oversized(10, 5000));
    }

    #[test]
    fn note_size_detects_class_change() {
        let mut cache = RenderCache {
            target: Some(TargetId(1)),
            size: (128, 64),
            ..Default::default()
        };
        // Same class: resize in place.
        assert!(!cache.note_size(100, 40));
        assert_eq!(cache.request, (100, 40));
        // Crossing a power of two: reallocate.
        assert!(cache.note_size(130, 40));
    }

    #[test]
    fn note_size_without_target_never_reallocates() {
        let mut cache = RenderCache::default();
        assert!(!cache.note_size(500, 500));
        assert_eq!(cache.request, (500, 500));
    }
}
