#![forbid(unsafe_code)]

//! Row layout: mapping logical rows to pixel bounds.
//!
//! Two strategies implement [`RowLayout`]:
//!
//! - [`FixedRowLayout`]: every row has the preferred height; all queries are
//!   closed-form O(1).
//! - [`AutoRowLayout`]: each row is measured on demand through the column
//!   renderers. Heights are cached on the node and a prefix cache of row
//!   offsets is extended only as far as a query needs.
//!
//! Row bounds carry `x = 0` and `width = 0`; horizontal placement belongs to
//! the column model.
//!
//! # Invariants
//!
//! 1. For rows `r1 < r2`, `row_bounds(r1).bottom() <= row_bounds(r2).y`, and
//!    consecutive rows touch with no gap.
//! 2. The offset cache is always a valid prefix of the current row map;
//!    `invalidate_from(row)` truncates it so no entry computed before a
//!    mutation survives for a row at or after the first affected row.
//! 3. Page sizes are at least 1 whenever there is a row and the viewport has
//!    a non-zero height.

use arbor_core::geometry::Rect;

use crate::error::Result;
use crate::node::NodeStore;
use crate::render::ColumnSet;
use crate::rows::VisibleRowIndex;

/// The visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// First row shown at the top.
    pub first_row: usize,
    /// Height in pixels.
    pub height: u32,
    /// Width in pixels.
    pub width: u32,
}

impl Viewport {
    /// Create a viewport.
    #[must_use]
    pub const fn new(first_row: usize, width: u32, height: u32) -> Self {
        Self {
            first_row,
            height,
            width,
        }
    }
}

/// Borrowed view of everything a layout needs to measure rows.
pub struct LayoutContext<'a, T> {
    store: &'a NodeStore<T>,
    rows: &'a VisibleRowIndex,
    columns: &'a ColumnSet<T>,
    row_count: usize,
}

impl<'a, T> LayoutContext<'a, T> {
    /// Bundle the inputs. Fails if the row map is stale.
    pub fn new(
        store: &'a NodeStore<T>,
        rows: &'a VisibleRowIndex,
        columns: &'a ColumnSet<T>,
    ) -> Result<Self> {
        let row_count = rows.row_count()?;
        Ok(Self {
            store,
            rows,
            columns,
            row_count,
        })
    }

    /// Number of rows in the map.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Natural height of `row`, cached on the node.
    ///
    /// Falls back to `fallback` when no renderer reports a positive height.
    fn measure(&self, row: usize, fallback: u32) -> u32 {
        let Some(node) = self
            .rows
            .node_at(row)
            .ok()
            .and_then(|id| self.store.get(id))
        else {
            return fallback;
        };
        if let Some(height) = node.cached_height() {
            return height;
        }
        let measured = self.columns.measure_height(node.tag());
        let height = if measured > 0 { measured } else { fallback };
        node.cache_height(height);
        height
    }
}

/// Maps logical rows to pixel rectangles.
pub trait RowLayout<T> {
    /// Height used by fixed rows and as the fallback for unmeasurable rows.
    fn preferred_row_height(&self) -> u32;

    /// Change the preferred height (clamped to at least 1). Drops the cache.
    fn set_preferred_row_height(&mut self, height: u32);

    /// Bounds of `row`; [`Rect::EMPTY`] when out of range.
    fn row_bounds(&mut self, row: usize, cx: &LayoutContext<'_, T>) -> Rect;

    /// Rows fitting on a full page that ends at the last row.
    fn rows_per_page(&mut self, viewport: &Viewport, cx: &LayoutContext<'_, T>) -> usize;

    /// Rows fitting on the page starting at `viewport.first_row`.
    fn current_page_size(&mut self, viewport: &Viewport, cx: &LayoutContext<'_, T>) -> usize;

    /// First row of the page whose last fully fitting row is `last_visible_row`.
    fn first_row(
        &mut self,
        last_visible_row: usize,
        viewport: &Viewport,
        cx: &LayoutContext<'_, T>,
    ) -> usize;

    /// Row containing vertical offset `y`.
    fn row_at_offset(&mut self, y: u32, cx: &LayoutContext<'_, T>) -> Option<usize>;

    /// Total height of all rows.
    fn content_height(&mut self, cx: &LayoutContext<'_, T>) -> u32;

    /// Drop every cached bound.
    fn invalidate_cache(&mut self);

    /// Drop cached bounds for `row` and everything after it.
    fn invalidate_from(&mut self, _row: usize) {
        self.invalidate_cache();
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Count rows from `rows` (in walk order) until `height` is filled.
///
/// A row that does not fit completely ends the page, except for the first.
fn fill_page(height: u32, rows: impl Iterator<Item = u32>) -> usize {
    if height == 0 {
        return 0;
    }
    let mut used = 0u32;
    let mut count = 0usize;
    for h in rows {
        if count > 0 && used.saturating_add(h) > height {
            break;
        }
        used = used.saturating_add(h);
        count += 1;
        if used >= height {
            break;
        }
    }
    count
}

// ---------------------------------------------------------------------------
// Fixed
// ---------------------------------------------------------------------------

/// Every row has the same height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRowLayout {
    height: u32,
}

impl Default for FixedRowLayout {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FixedRowLayout {
    /// Create a layout with the given row height (at least 1).
    #[must_use]
    pub fn new(height: u32) -> Self {
        Self {
            height: height.max(1),
        }
    }

    fn rows_in(&self, viewport: &Viewport, available: usize) -> usize {
        if available == 0 || viewport.height == 0 {
            return 0;
        }
        ((viewport.height / self.height).max(1) as usize).min(available)
    }
}

impl<T> RowLayout<T> for FixedRowLayout {
    fn preferred_row_height(&self) -> u32 {
        self.height
    }

    fn set_preferred_row_height(&mut self, height: u32) {
        self.height = height.max(1);
    }

    fn row_bounds(&mut self, row: usize, cx: &LayoutContext<'_, T>) -> Rect {
        if row >= cx.row_count() {
            return Rect::EMPTY;
        }
        Rect::new(0, to_u32(row).saturating_mul(self.height), 0, self.height)
    }

    fn rows_per_page(&mut self, viewport: &Viewport, cx: &LayoutContext<'_, T>) -> usize {
        self.rows_in(viewport, cx.row_count())
    }

    fn current_page_size(&mut self, viewport: &Viewport, cx: &LayoutContext<'_, T>) -> usize {
        self.rows_in(
            viewport,
            cx.row_count().saturating_sub(viewport.first_row),
        )
    }

    fn first_row(
        &mut self,
        last_visible_row: usize,
        viewport: &Viewport,
        cx: &LayoutContext<'_, T>,
    ) -> usize {
        if cx.row_count() == 0 {
            return 0;
        }
        let last = last_visible_row.min(cx.row_count() - 1);
        (last + 1).saturating_sub(self.rows_in(viewport, last + 1))
    }

    fn row_at_offset(&mut self, y: u32, cx: &LayoutContext<'_, T>) -> Option<usize> {
        let row = (y / self.height) as usize;
        (row < cx.row_count()).then_some(row)
    }

    fn content_height(&mut self, cx: &LayoutContext<'_, T>) -> u32 {
        to_u32(cx.row_count()).saturating_mul(self.height)
    }

    fn invalidate_cache(&mut self) {}

    fn invalidate_from(&mut self, _row: usize) {}
}

// ---------------------------------------------------------------------------
// Auto
// ---------------------------------------------------------------------------

/// Rows are as tall as their tallest renderer.
///
/// `tops[i]` and `heights[i]` describe row `i` for every `i` in the cached
/// prefix.
#[derive(Debug, Clone, Default)]
pub struct AutoRowLayout {
    preferred: u32,
    tops: Vec<u32>,
    heights: Vec<u32>,
}

impl AutoRowLayout {
    /// Create a layout using `preferred` for rows no renderer can measure.
    #[must_use]
    pub fn new(preferred: u32) -> Self {
        Self {
            preferred: preferred.max(1),
            tops: Vec::new(),
            heights: Vec::new(),
        }
    }

    /// Number of rows whose bounds are cached.
    #[must_use]
    pub fn cached_rows(&self) -> usize {
        self.heights.len()
    }

    fn extend_to<T>(&mut self, row: usize, cx: &LayoutContext<'_, T>) {
        let target = row.min(cx.row_count().saturating_sub(1));
        if cx.row_count() == 0 {
            return;
        }
        while self.heights.len() <= target {
            let next = self.heights.len();
            let top = match (self.tops.last(), self.heights.last()) {
                (Some(&t), Some(&h)) => t.saturating_add(h),
                _ => 0,
            };
            let height = cx.measure(next, self.preferred);
            self.tops.push(top);
            self.heights.push(height);
        }
    }

    fn height_of<T>(&self, row: usize, cx: &LayoutContext<'_, T>) -> u32 {
        self.heights
            .get(row)
            .copied()
            .unwrap_or_else(|| cx.measure(row, self.preferred))
    }

    fn bottom(&self) -> u32 {
        match (self.tops.last(), self.heights.last()) {
            (Some(&t), Some(&h)) => t.saturating_add(h),
            _ => 0,
        }
    }
}

impl<T> RowLayout<T> for AutoRowLayout {
    fn preferred_row_height(&self) -> u32 {
        self.preferred
    }

    fn set_preferred_row_height(&mut self, height: u32) {
        self.preferred = height.max(1);
        self.tops.clear();
        self.heights.clear();
    }

    fn row_bounds(&mut self, row: usize, cx: &LayoutContext<'_, T>) -> Rect {
        if row >= cx.row_count() {
            return Rect::EMPTY;
        }
        self.extend_to(row, cx);
        Rect::new(0, self.tops[row], 0, self.heights[row])
    }

    fn rows_per_page(&mut self, viewport: &Viewport, cx: &LayoutContext<'_, T>) -> usize {
        let count = cx.row_count();
        fill_page(
            viewport.height,
            (0..count).rev().map(|row| self.height_of(row, cx)),
        )
    }

    fn current_page_size(&mut self, viewport: &Viewport, cx: &LayoutContext<'_, T>) -> usize {
        let count = cx.row_count();
        fill_page(
            viewport.height,
            (viewport.first_row.min(count)..count).map(|row| self.height_of(row, cx)),
        )
    }

    fn first_row(
        &mut self,
        last_visible_row: usize,
        viewport: &Viewport,
        cx: &LayoutContext<'_, T>,
    ) -> usize {
        let count = cx.row_count();
        if count == 0 {
            return 0;
        }
        let last = last_visible_row.min(count - 1);
        let fits = fill_page(
            viewport.height,
            (0..=last).rev().map(|row| self.height_of(row, cx)),
        );
        (last + 1).saturating_sub(fits)
    }

    fn row_at_offset(&mut self, y: u32, cx: &LayoutContext<'_, T>) -> Option<usize> {
        let count = cx.row_count();
        while self.bottom() <= y && self.heights.len() < count {
            let next = self.heights.len();
            self.extend_to(next, cx);
        }
        let row = self.tops.partition_point(|&top| top <= y).checked_sub(1)?;
        (y < self.tops[row].saturating_add(self.heights[row])).then_some(row)
    }

    fn content_height(&mut self, cx: &LayoutContext<'_, T>) -> u32 {
        let count = cx.row_count();
        if count == 0 {
            return 0;
        }
        self.extend_to(count - 1, cx);
        self.bottom()
    }

    fn invalidate_cache(&mut self) {
        self.tops.clear();
        self.heights.clear();
    }

    fn invalidate_from(&mut self, row: usize) {
        self.tops.truncate(row);
        self.heights.truncate(row);
    }
}
