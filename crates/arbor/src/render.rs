#![forbid(unsafe_code)]

//! Field renderers, editors, columns, and the drawing surface.
//!
//! A row is drawn by the field renderers bound to each column. Renderers
//! always measure and draw; editing and search participation are optional
//! capabilities exposed through [`FieldRenderer::editable`] and
//! [`FieldRenderer::searchable`].
//!
//! The engine never talks to a rendering backend. Everything visual goes
//! through the narrow [`Surface`] sink supplied by the host.

use arbor_core::event::KeyEvent;
use arbor_core::geometry::{Rect, Size};
use bitflags::bitflags;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

bitflags! {
    /// Per-row state passed to renderers when drawing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RowFlags: u8 {
        /// The row is selected.
        const SELECTED = 0b0000_0001;
        /// The node is expanded.
        const EXPANDED = 0b0000_0010;
        /// The node has, or may lazily have, children.
        const EXPANDABLE = 0b0000_0100;
        /// An editor is open on this row.
        const EDITING = 0b0000_1000;
        /// The editor carries a validation error.
        const INVALID = 0b0001_0000;
    }
}

/// Drawing sink provided by the host.
pub trait Surface {
    /// Draw `text` clipped to `area`.
    fn draw_text(&mut self, area: Rect, text: &str, flags: RowFlags);
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

/// What an editor wants done after handling a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorAction {
    /// The key changed the editor state.
    Consumed,
    /// The key is not meaningful to the editor.
    Ignored,
    /// Validate and close.
    Commit,
    /// Validate and reopen on the same node ("confirm and continue").
    CommitAndContinue,
    /// Close without applying.
    Cancel,
}

/// A live in-place editor.
pub trait FieldEditor {
    /// Pending value as text.
    fn value(&self) -> String;

    /// Replace the pending value.
    fn set_value(&mut self, value: &str);

    /// Feed a key event.
    fn handle_key(&mut self, key: &KeyEvent) -> EditorAction;

    /// Screen rectangle the editor occupies.
    fn bounds(&self) -> Rect;

    /// Move or resize the editor.
    fn set_bounds(&mut self, bounds: Rect);

    /// The validation error from the last commit attempt.
    fn error(&self) -> Option<&ValidationError>;

    /// Attach or clear a validation error.
    fn set_error(&mut self, error: Option<ValidationError>);

    /// Draw the editor. The default paints the pending value clipped to its
    /// bounds, followed by the validation message after a rejected commit.
    fn draw(&self, surface: &mut dyn Surface) {
        let bounds = self.bounds();
        let value = self.value();
        draw_editor(surface, bounds, fit_width(&value, bounds.width), self.error());
    }
}

/// Longest prefix of `text` whose display width fits in `width` cells.
pub(crate) fn fit_width(text: &str, width: u32) -> &str {
    let mut used = 0usize;
    for (offset, g) in text.grapheme_indices(true) {
        used += UnicodeWidthStr::width(g);
        if used > width as usize {
            return &text[..offset];
        }
    }
    text
}

/// Display width of `text` in cells.
pub(crate) fn text_width(text: &str) -> u32 {
    u32::try_from(UnicodeWidthStr::width(text)).unwrap_or(u32::MAX)
}

/// Paint an editor value into `bounds`.
///
/// With an `error`, the value keeps only the width it needs and the message
/// takes what is left of the row after a one-cell gap. Both carry
/// [`RowFlags::INVALID`].
pub fn draw_editor(
    surface: &mut dyn Surface,
    bounds: Rect,
    value: &str,
    error: Option<&ValidationError>,
) {
    let flags = RowFlags::EDITING | RowFlags::SELECTED;
    let Some(error) = error else {
        surface.draw_text(bounds, value, flags);
        return;
    };
    let used = text_width(value).saturating_add(1).min(bounds.width);
    surface.draw_text(
        bounds.with_horizontal(bounds.x, used),
        value,
        flags | RowFlags::INVALID,
    );
    let rest = bounds.width - used;
    if rest > 0 {
        let area = bounds.with_horizontal(bounds.x.saturating_add(used), rest);
        surface.draw_text(area, fit_width(&error.message, rest), RowFlags::INVALID);
    }
}

/// Editing capability of a renderer.
pub trait Editable<T> {
    /// Open an editor initialised from the node's current value.
    ///
    /// `None` means this particular value cannot be edited right now.
    fn begin_edit(&self, tag: &T) -> Option<Box<dyn FieldEditor>>;

    /// Parse the editor's pending value and write it into `tag`.
    ///
    /// On `Err` the payload must be left untouched.
    fn apply_edit(&self, tag: &mut T, editor: &dyn FieldEditor) -> Result<(), ValidationError>;

    /// Release an editor that is no longer needed.
    fn dispose_editor(&self, editor: Box<dyn FieldEditor>) {
        drop(editor);
    }
}

/// Search capability of a renderer.
pub trait Searchable<T> {
    /// Text matched by incremental search, if any.
    fn search_label(&self, tag: &T) -> Option<String>;
}

// ---------------------------------------------------------------------------
// FieldRenderer
// ---------------------------------------------------------------------------

/// Measures and draws one field of a node.
pub trait FieldRenderer<T> {
    /// Natural size of the field for `tag`.
    fn measure(&self, tag: &T) -> Size;

    /// Paint the field inside `area`.
    fn draw(&self, tag: &T, area: Rect, flags: RowFlags, surface: &mut dyn Surface);

    /// Editing capability, if supported.
    fn editable(&self) -> Option<&dyn Editable<T>> {
        None
    }

    /// Search capability, if supported.
    fn searchable(&self) -> Option<&dyn Searchable<T>> {
        None
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// Identifies one renderer inside a [`ColumnSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RendererRef {
    /// Column index.
    pub column: usize,
    /// Renderer index within the column.
    pub slot: usize,
}

impl RendererRef {
    /// Shorthand constructor.
    #[must_use]
    pub const fn new(column: usize, slot: usize) -> Self {
        Self { column, slot }
    }
}

/// A column: a header, a pixel width, a visibility flag, and its renderers.
pub struct Column<T> {
    header: String,
    width: u32,
    visible: bool,
    renderers: Vec<Box<dyn FieldRenderer<T>>>,
}

impl<T> std::fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("header", &self.header)
            .field("width", &self.width)
            .field("visible", &self.visible)
            .field("renderers", &self.renderers.len())
            .finish()
    }
}

impl<T> Column<T> {
    /// Create a visible column.
    #[must_use]
    pub fn new(header: impl Into<String>, width: u32) -> Self {
        Self {
            header: header.into(),
            width,
            visible: true,
            renderers: Vec::new(),
        }
    }

    /// Append a renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: impl FieldRenderer<T> + 'static) -> Self {
        self.renderers.push(Box::new(renderer));
        self
    }

    /// Set visibility.
    #[must_use]
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Header text.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Change the width.
    pub fn set_width(&mut self, width: u32) {
        self.width = width;
    }

    /// Whether the column is shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide the column.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Bound renderers, drawn left to right.
    pub fn renderers(&self) -> impl Iterator<Item = &dyn FieldRenderer<T>> {
        self.renderers.iter().map(|r| r.as_ref())
    }
}

/// Horizontal placement of one column for a given row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpan {
    /// Column index.
    pub column: usize,
    /// Left edge.
    pub x: u32,
    /// Width.
    pub width: u32,
}

/// The ordered column model.
///
/// With columns disabled only the first column is used, as a single implicit
/// column spanning from the row's indentation to the viewport's right edge.
pub struct ColumnSet<T> {
    columns: Vec<Column<T>>,
    enabled: bool,
}

impl<T> std::fmt::Debug for ColumnSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnSet")
            .field("columns", &self.columns)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl<T> Default for ColumnSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ColumnSet<T> {
    /// An empty set with columns disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            enabled: false,
        }
    }

    /// A set with one implicit column holding `renderer`.
    #[must_use]
    pub fn single(renderer: impl FieldRenderer<T> + 'static) -> Self {
        Self::new().with_column(Column::new("", 0).with_renderer(renderer))
    }

    /// Append a column.
    #[must_use]
    pub fn with_column(mut self, column: Column<T>) -> Self {
        self.columns.push(column);
        self
    }

    /// Enable or disable the multi-column layout.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the multi-column layout is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggle the multi-column layout.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column by index.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Column<T>> {
        self.columns.get(index)
    }

    /// Mutable column by index.
    pub fn column_mut(&mut self, index: usize) -> Option<&mut Column<T>> {
        self.columns.get_mut(index)
    }

    /// Resolve a renderer reference.
    #[must_use]
    pub fn renderer(&self, r: RendererRef) -> Option<&dyn FieldRenderer<T>> {
        self.columns
            .get(r.column)
            .and_then(|c| c.renderers.get(r.slot))
            .map(|r| r.as_ref())
    }

    /// Columns taking part in layout, with their indices.
    fn active(&self) -> impl Iterator<Item = (usize, &Column<T>)> {
        let limit = if self.enabled { self.columns.len() } else { 1 };
        self.columns
            .iter()
            .enumerate()
            .take(limit)
            .filter(|(_, c)| c.visible || !self.enabled)
    }

    /// Every active renderer with its reference.
    pub fn renderers(&self) -> impl Iterator<Item = (RendererRef, &dyn FieldRenderer<T>)> {
        self.active().flat_map(|(ci, column)| {
            column
                .renderers
                .iter()
                .enumerate()
                .map(move |(si, r)| (RendererRef::new(ci, si), r.as_ref()))
        })
    }

    /// First active renderer that can edit.
    #[must_use]
    pub fn first_editable(&self) -> Option<RendererRef> {
        self.renderers()
            .find(|(_, r)| r.editable().is_some())
            .map(|(r, _)| r)
    }

    /// Row height for `tag`: the tallest active renderer, 0 if none reports.
    #[must_use]
    pub fn measure_height(&self, tag: &T) -> u32 {
        self.renderers()
            .map(|(_, r)| r.measure(tag).height)
            .max()
            .unwrap_or(0)
    }

    /// Search labels from every searchable active renderer.
    pub fn search_labels<'a>(&'a self, tag: &'a T) -> impl Iterator<Item = String> + 'a {
        self.renderers()
            .filter_map(move |(_, r)| r.searchable().and_then(|s| s.search_label(tag)))
    }

    /// Horizontal placement of each active column.
    ///
    /// `indent_x` is where the node's content starts (after indentation and
    /// expander); `viewport_width` bounds the implicit column.
    #[must_use]
    pub fn spans(&self, indent_x: u32, viewport_width: u32) -> Vec<ColumnSpan> {
        if !self.enabled {
            return self
                .active()
                .map(|(column, _)| ColumnSpan {
                    column,
                    x: indent_x,
                    width: viewport_width.saturating_sub(indent_x),
                })
                .collect();
        }
        let mut x = 0u32;
        let mut spans = Vec::new();
        for (column, c) in self.active() {
            let start = if column == 0 { x.max(indent_x) } else { x };
            let end = x.saturating_add(c.width);
            spans.push(ColumnSpan {
                column,
                x: start,
                width: end.saturating_sub(start),
            });
            x = end;
        }
        spans
    }

    /// Placement of one column, if active.
    #[must_use]
    pub fn span_of(&self, column: usize, indent_x: u32, viewport_width: u32) -> Option<ColumnSpan> {
        self.spans(indent_x, viewport_width)
            .into_iter()
            .find(|s| s.column == column)
    }
}
