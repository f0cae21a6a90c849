#![forbid(unsafe_code)]

//! Reference text renderer and editor.
//!
//! [`TextField`] renders a string derived from the node payload, one row per
//! text line, and optionally edits it through [`TextEditor`].
//!
//! # Example
//!
//! ```
//! use arbor::error::ValidationError;
//! use arbor::renderers::TextField;
//!
//! struct Item { name: String }
//!
//! let field = TextField::new(|item: &Item| item.name.clone()).with_setter(
//!     |item: &mut Item, value: &str| {
//!         if value.trim().is_empty() {
//!             return Err(ValidationError::new("empty", "name is required"));
//!         }
//!         item.name = value.to_string();
//!         Ok(())
//!     },
//! );
//! # let _ = field;
//! ```

use arbor_core::event::{KeyCode, KeyEvent, KeyEventKind};
use arbor_core::geometry::{Rect, Size};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::error::ValidationError;
use crate::render::{
    EditorAction, Editable, FieldEditor, FieldRenderer, RowFlags, Searchable, Surface, fit_width,
    text_width,
};

type Getter<T> = Box<dyn Fn(&T) -> String>;
type Setter<T> = Box<dyn Fn(&mut T, &str) -> Result<(), ValidationError>>;

// ---------------------------------------------------------------------------
// TextField
// ---------------------------------------------------------------------------

/// A text renderer backed by closures.
pub struct TextField<T> {
    label: Getter<T>,
    setter: Option<Setter<T>>,
    search: bool,
}

impl<T> TextField<T> {
    /// Create a read-only, searchable text field.
    #[must_use]
    pub fn new(label: impl Fn(&T) -> String + 'static) -> Self {
        Self {
            label: Box::new(label),
            setter: None,
            search: true,
        }
    }

    /// Make the field editable. `setter` parses and stores the edited text.
    #[must_use]
    pub fn with_setter(
        mut self,
        setter: impl Fn(&mut T, &str) -> Result<(), ValidationError> + 'static,
    ) -> Self {
        self.setter = Some(Box::new(setter));
        self
    }

    /// Include or exclude the field from incremental search.
    #[must_use]
    pub fn with_search(mut self, search: bool) -> Self {
        self.search = search;
        self
    }

    /// The text shown for `tag`.
    #[must_use]
    pub fn text(&self, tag: &T) -> String {
        (self.label)(tag)
    }
}

impl<T> FieldRenderer<T> for TextField<T> {
    fn measure(&self, tag: &T) -> Size {
        let text = self.text(tag);
        let (lines, width) = text.lines().fold((0u32, 0u32), |(n, w), line| {
            (n.saturating_add(1), w.max(text_width(line)))
        });
        Size::new(width, lines.max(1))
    }

    fn draw(&self, tag: &T, area: Rect, flags: RowFlags, surface: &mut dyn Surface) {
        let text = self.text(tag);
        for (y, line) in (area.y..area.bottom()).zip(text.lines()) {
            let row = Rect::new(area.x, y, area.width, 1);
            surface.draw_text(row, fit_width(line, area.width), flags);
        }
    }

    fn editable(&self) -> Option<&dyn Editable<T>> {
        self.setter.as_ref().map(|_| self as &dyn Editable<T>)
    }

    fn searchable(&self) -> Option<&dyn Searchable<T>> {
        self.search.then_some(self as &dyn Searchable<T>)
    }
}

impl<T> Editable<T> for TextField<T> {
    fn begin_edit(&self, tag: &T) -> Option<Box<dyn FieldEditor>> {
        self.setter.as_ref()?;
        Some(Box::new(TextEditor::new(self.text(tag))))
    }

    fn apply_edit(&self, tag: &mut T, editor: &dyn FieldEditor) -> Result<(), ValidationError> {
        match &self.setter {
            Some(setter) => setter(tag, &editor.value()),
            None => Err(ValidationError::new("read_only", "field is not editable")),
        }
    }
}

impl<T> Searchable<T> for TextField<T> {
    fn search_label(&self, tag: &T) -> Option<String> {
        Some(self.text(tag))
    }
}

// ---------------------------------------------------------------------------
// TextEditor
// ---------------------------------------------------------------------------

/// Single-line, grapheme-aware text editor.
///
/// Enter commits, Tab commits and continues, Escape cancels.
#[derive(Debug, Clone, Default)]
pub struct TextEditor {
    value: String,
    /// Cursor position (grapheme index).
    cursor: usize,
    bounds: Rect,
    error: Option<ValidationError>,
}

impl TextEditor {
    /// Create an editor with the cursor at the end of `value`.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.graphemes(true).count();
        Self {
            value,
            cursor,
            bounds: Rect::EMPTY,
            error: None,
        }
    }

    /// Cursor position (grapheme index).
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Display column of the cursor relative to the editor's left edge.
    #[must_use]
    pub fn cursor_column(&self) -> usize {
        self.value
            .graphemes(true)
            .take(self.cursor)
            .map(UnicodeWidthStr::width)
            .sum()
    }

    fn grapheme_count(&self) -> usize {
        self.value.graphemes(true).count()
    }

    fn grapheme_byte_offset(&self, grapheme_idx: usize) -> usize {
        self.value
            .grapheme_indices(true)
            .nth(grapheme_idx)
            .map_or(self.value.len(), |(i, _)| i)
    }

    fn insert_char(&mut self, c: char) {
        let byte_offset = self.grapheme_byte_offset(self.cursor);
        self.value.insert(byte_offset, c);
        // A combining mark merges into the previous grapheme.
        self.cursor = self.value[..byte_offset + c.len_utf8()].graphemes(true).count();
    }

    fn delete_back(&mut self) {
        if self.cursor > 0 {
            let start = self.grapheme_byte_offset(self.cursor - 1);
            let end = self.grapheme_byte_offset(self.cursor);
            self.value.drain(start..end);
            self.cursor -= 1;
        }
    }

    fn delete_forward(&mut self) {
        if self.cursor < self.grapheme_count() {
            let start = self.grapheme_byte_offset(self.cursor);
            let end = self.grapheme_byte_offset(self.cursor + 1);
            self.value.drain(start..end);
        }
    }
}

impl FieldEditor for TextEditor {
    fn value(&self) -> String {
        self.value.clone()
    }

    fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor = self.cursor.min(self.grapheme_count());
    }

    fn handle_key(&mut self, key: &KeyEvent) -> EditorAction {
        if key.kind == KeyEventKind::Release {
            return EditorAction::Ignored;
        }
        match key.code {
            KeyCode::Enter => return EditorAction::Commit,
            KeyCode::Tab => return EditorAction::CommitAndContinue,
            KeyCode::Escape => return EditorAction::Cancel,
            KeyCode::Char(_) => match key.text_char() {
                Some(c) => self.insert_char(c),
                None => return EditorAction::Ignored,
            },
            KeyCode::Backspace => self.delete_back(),
            KeyCode::Delete => self.delete_forward(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.grapheme_count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.grapheme_count(),
            _ => return EditorAction::Ignored,
        }
        self.error = None;
        EditorAction::Consumed
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    fn set_error(&mut self, error: Option<ValidationError>) {
        self.error = error;
    }
}
