#![forbid(unsafe_code)]

//! Geometric primitives.
//!
//! Coordinates are unsigned pixels with the origin at the top-left of the
//! scrollable content. `u32` keeps the cumulative height of very long row
//! maps representable.

/// A rectangle used for row bounds, editor placement, and hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: u32,
    /// Top edge (inclusive).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// The empty rectangle at the origin.
    pub const EMPTY: Rect = Rect::new(0, 0, 0, 0);

    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Same rectangle with its horizontal extent replaced.
    #[inline]
    #[must_use]
    pub const fn with_horizontal(self, x: u32, width: u32) -> Self {
        Self::new(x, self.y, width, self.height)
    }

    /// Shift the rectangle up by `dy`, saturating at zero.
    #[inline]
    #[must_use]
    pub const fn offset_up(self, dy: u32) -> Self {
        Self::new(self.x, self.y.saturating_sub(dy), self.width, self.height)
    }
}

/// A width/height pair reported by measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a new size.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::Rect;

    #[test]
    fn bottom_edge() {
        assert_eq!(Rect::new(10, 20, 30, 40).bottom(), 60);
        assert_eq!(Rect::new(0, u32::MAX - 3, 0, 100).bottom(), u32::MAX);
    }

    #[test]
    fn default_is_origin() {
        assert_eq!(Rect::default(), Rect::EMPTY);
        assert_eq!(Rect::EMPTY.bottom(), 0);
    }

    #[test]
    fn with_horizontal_keeps_vertical_extent() {
        let row = Rect::new(0, 40, 0, 20);
        assert_eq!(row.with_horizontal(16, 100), Rect::new(16, 40, 100, 20));
        assert_eq!(row.offset_up(30), Rect::new(0, 10, 0, 20));
        assert_eq!(row.offset_up(100).y, 0);
    }
}
