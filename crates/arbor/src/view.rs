#![forbid(unsafe_code)]

//! The tree view host.
//!
//! [`TreeView`] owns a [`NodeStore`] and everything derived from it: the
//! visible row map, the row layout, the column model, the edit session, and
//! incremental search. Every store mutation goes through
//! [`TreeView::mutate`] (or a view operation that mutates internally), after
//! which the view drains the change journal and brings the derived state
//! back in line:
//!
//! 1. the row map is notified and rebuilt,
//! 2. layout caches are truncated from the first affected row,
//! 3. a selection that left the map moves to its nearest visible ancestor,
//! 4. an edit or arm on a node that left the map is dropped,
//! 5. the scroll position is clamped and the editor repositioned.
//!
//! Time is injected: event handlers and [`TreeView::tick`] take the current
//! [`Instant`] so the click-to-edit timer and search timeout are testable.
//!
//! # Example
//!
//! ```
//! use arbor::{ColumnSet, NodeStore, TreeView, TreeViewConfig};
//! use arbor::renderers::TextField;
//!
//! let mut store = NodeStore::new("root".to_string());
//! let root = store.root();
//! let docs = store.push_child(root, "docs".to_string()).unwrap();
//! store.push_child(docs, "guide".to_string()).unwrap();
//!
//! let columns = ColumnSet::single(TextField::new(|s: &String| s.clone()));
//! let mut view = TreeView::new(store, columns, TreeViewConfig::default());
//! assert_eq!(view.row_count(), 1);
//!
//! view.expand(docs).unwrap();
//! assert_eq!(view.row_count(), 2);
//! ```

use std::fmt;
use std::ops::Range;
use std::time::Instant;

use arbor_core::click::{ClickDetector, ClickKind};
use arbor_core::event::{Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEventKind};
use arbor_core::geometry::Rect;

use crate::config::{RowHeight, TreeViewConfig};
use crate::edit::{CommitMode, EditOutcome, EditSession, EditTarget};
use crate::error::{Result, TreeError};
use crate::layout::{LayoutContext, RowLayout, Viewport};
use crate::node::{NodeId, NodeStore};
use crate::render::{ColumnSet, RendererRef, RowFlags, Surface};
use crate::rows::VisibleRowIndex;
use crate::search::{IncrementalSearch, SearchContext};

const EXPANDED_GLYPH: &str = "-";
const COLLAPSED_GLYPH: &str = "+";

/// What the view did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The event was not for the view.
    Ignored,
    /// The view consumed the event.
    Handled,
    /// The event drove the edit session.
    Edit(EditOutcome),
}

impl Response {
    /// Whether the event was consumed.
    #[must_use]
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// A virtualized, editable tree view.
pub struct TreeView<T> {
    store: NodeStore<T>,
    rows: VisibleRowIndex,
    layout: Box<dyn RowLayout<T>>,
    columns: ColumnSet<T>,
    edit: EditSession,
    search: IncrementalSearch,
    clicks: ClickDetector,
    config: TreeViewConfig,
    viewport: Viewport,
    selected: Option<NodeId>,
    pending_press: Option<(NodeId, Option<RendererRef>)>,
    armed_renderer: Option<RendererRef>,
    focused: bool,
}

impl<T: fmt::Debug> fmt::Debug for TreeView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeView")
            .field("store", &self.store)
            .field("rows", &self.rows)
            .field("edit", &self.edit)
            .field("search", &self.search)
            .field("viewport", &self.viewport)
            .field("selected", &self.selected)
            .field("focused", &self.focused)
            .finish()
    }
}

impl<T> TreeView<T> {
    /// Build a view over `store`.
    ///
    /// `config.use_columns` overrides whatever `columns` was built with.
    pub fn new(store: NodeStore<T>, mut columns: ColumnSet<T>, config: TreeViewConfig) -> Self {
        columns.set_enabled(config.use_columns);
        let mut view = Self {
            store,
            rows: VisibleRowIndex::new(config.show_root),
            layout: config.row_height.build(),
            columns,
            edit: EditSession::new(config.arm_delay),
            search: IncrementalSearch::new(config.search_timeout),
            clicks: ClickDetector::new(config.click.clone()),
            config,
            viewport: Viewport::default(),
            selected: None,
            pending_press: None,
            armed_renderer: None,
            focused: true,
        };
        view.sync();
        view
    }

    // -- accessors -----------------------------------------------------------

    /// The node store.
    #[must_use]
    pub fn store(&self) -> &NodeStore<T> {
        &self.store
    }

    /// The visible row map.
    #[must_use]
    pub fn rows(&self) -> &VisibleRowIndex {
        &self.rows
    }

    /// The column model.
    #[must_use]
    pub fn columns(&self) -> &ColumnSet<T> {
        &self.columns
    }

    /// Mutate the column model. Cached heights are dropped afterwards.
    pub fn update_columns<R>(&mut self, f: impl FnOnce(&mut ColumnSet<T>) -> R) -> R {
        let out = f(&mut self.columns);
        self.invalidate_layout();
        out
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &TreeViewConfig {
        &self.config
    }

    /// The edit session.
    #[must_use]
    pub fn edit_session(&self) -> &EditSession {
        &self.edit
    }

    /// The incremental search state.
    #[must_use]
    pub fn search(&self) -> &IncrementalSearch {
        &self.search
    }

    /// The current viewport.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Whether the view has input focus.
    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Number of visible rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.row_count().unwrap_or(0)
    }

    /// Row currently showing `node`.
    #[must_use]
    pub fn row_of(&self, node: NodeId) -> Option<usize> {
        self.rows.row_of(node).ok().flatten()
    }

    /// Node shown at `row`.
    pub fn node_at(&self, row: usize) -> Result<NodeId> {
        self.rows.node_at(row)
    }

    // -- mutation ------------------------------------------------------------

    /// Run `f` against the store, then resynchronize the view.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut NodeStore<T>) -> R) -> R {
        let out = f(&mut self.store);
        self.sync();
        out
    }

    /// Switch row height strategy. All measurements are discarded.
    pub fn set_row_height(&mut self, row_height: RowHeight) {
        self.config.row_height = row_height;
        self.layout = row_height.build();
        self.store.clear_cached_heights();
        self.reposition_editor();
    }

    /// Show or hide the root row.
    pub fn set_show_root(&mut self, show_root: bool) {
        self.config.show_root = show_root;
        self.rows.set_show_root(show_root);
        self.sync();
    }

    /// Drop every measured height, e.g. after renderers changed.
    pub fn invalidate_layout(&mut self) {
        self.store.clear_cached_heights();
        self.layout.invalidate_cache();
        self.clamp_scroll();
        self.reposition_editor();
    }

    fn sync(&mut self) {
        let changes = self.store.take_changes();
        if changes.is_empty() && !self.rows.is_stale() {
            return;
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "sync",
            changes = changes.len(),
            revision = self.store.revision()
        )
        .entered();

        let was_stale = self.rows.is_stale();
        let first_affected = changes.iter().filter_map(|c| self.rows.notify(c)).min();
        self.rows.rebuild(&self.store);
        if was_stale {
            self.layout.invalidate_cache();
        } else if let Some(row) = first_affected {
            self.layout.invalidate_from(row);
        }

        self.repair_selection();
        self.repair_edit();
        self.clamp_scroll();
        self.reposition_editor();
    }

    fn repair_selection(&mut self) {
        let Some(selected) = self.selected else {
            return;
        };
        if self.row_of(selected).is_some() {
            return;
        }
        let mut ancestor = self.store.get(selected).and_then(|n| n.parent());
        let replacement = loop {
            match ancestor {
                Some(id) if self.row_of(id).is_some() => break Some(id),
                Some(id) => ancestor = self.store.get(id).and_then(|n| n.parent()),
                None => break None,
            }
        };
        arbor_core::debug!(from = %selected, to = ?replacement, "selection left the row map");
        self.set_selection(replacement);
    }

    fn repair_edit(&mut self) {
        let tracked = [self.edit.editing_node(), self.edit.armed_node()];
        for node in tracked.into_iter().flatten() {
            if self.row_of(node).is_none() {
                self.edit.forget_node(node, &self.columns);
            }
        }
        if self
            .pending_press
            .is_some_and(|(node, _)| self.row_of(node).is_none())
        {
            self.pending_press = None;
        }
        self.update_search_suspension();
    }

    fn update_search_suspension(&mut self) {
        if self.edit.is_editing() {
            self.search.suspend();
        } else if self.search.is_suspended() {
            self.search.resume();
        }
    }

    fn after_edit(&mut self) {
        self.sync();
        self.update_search_suspension();
    }

    // -- layout --------------------------------------------------------------

    fn with_layout<R>(
        &mut self,
        f: impl FnOnce(&mut dyn RowLayout<T>, &LayoutContext<'_, T>) -> R,
    ) -> Result<R> {
        let cx = LayoutContext::new(&self.store, &self.rows, &self.columns)?;
        Ok(f(self.layout.as_mut(), &cx))
    }

    /// Bounds of `row` in content coordinates.
    pub fn row_bounds(&mut self, row: usize) -> Result<Rect> {
        self.with_layout(|layout, cx| layout.row_bounds(row, cx))
    }

    /// Total height of all rows.
    pub fn content_height(&mut self) -> Result<u32> {
        self.with_layout(|layout, cx| layout.content_height(cx))
    }

    /// Rows fitting on the current page.
    pub fn current_page_size(&mut self) -> Result<usize> {
        let viewport = self.viewport;
        self.with_layout(|layout, cx| layout.current_page_size(&viewport, cx))
    }

    /// Rows fitting on a page ending at the last row.
    pub fn rows_per_page(&mut self) -> Result<usize> {
        let viewport = self.viewport;
        self.with_layout(|layout, cx| layout.rows_per_page(&viewport, cx))
    }

    fn content_top(&mut self) -> Result<u32> {
        if self.viewport.first_row >= self.row_count() {
            return Ok(0);
        }
        Ok(self.row_bounds(self.viewport.first_row)?.y)
    }

    /// Row under viewport-relative offset `y`.
    pub fn row_at(&mut self, y: u32) -> Result<Option<usize>> {
        if y >= self.viewport.height {
            return Ok(None);
        }
        let top = self.content_top()?;
        self.with_layout(|layout, cx| layout.row_at_offset(top.saturating_add(y), cx))
    }

    /// Rows intersecting the viewport.
    pub fn visible_range(&mut self) -> Result<Range<usize>> {
        let count = self.row_count();
        let first = self.viewport.first_row.min(count);
        let top = self.content_top()?;
        let mut end = first;
        while end < count {
            if self.row_bounds(end)?.y.saturating_sub(top) >= self.viewport.height {
                break;
            }
            end += 1;
        }
        Ok(first..end)
    }

    fn indent_x(&self, depth: usize) -> u32 {
        let levels = u32::try_from(depth).unwrap_or(u32::MAX).saturating_add(1);
        levels.saturating_mul(self.config.indent)
    }

    /// Where the editor for `renderer` on `node` goes, relative to the viewport.
    pub fn editor_bounds(&mut self, node: NodeId, renderer: RendererRef) -> Result<Rect> {
        let row = self.row_of(node).ok_or(TreeError::NotVisible(node))?;
        let depth = self.rows.depth_at(row)?;
        let top = self.content_top()?;
        let bounds = self.row_bounds(row)?;
        let span = self
            .columns
            .span_of(renderer.column, self.indent_x(depth), self.viewport.width)
            .ok_or(TreeError::NotEditable(node))?;
        Ok(bounds.offset_up(top).with_horizontal(span.x, span.width))
    }

    fn reposition_editor(&mut self) {
        let (Some(node), Some(renderer)) = (self.edit.editing_node(), self.edit.editing_renderer())
        else {
            return;
        };
        if let Ok(bounds) = self.editor_bounds(node, renderer) {
            self.edit.set_bounds(bounds);
        }
    }

    // -- scrolling -----------------------------------------------------------

    /// Resize the viewport.
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.viewport.width = width;
        self.viewport.height = height;
        self.clamp_scroll();
        self.reposition_editor();
    }

    /// Scroll so `first_row` is at the top (clamped).
    pub fn scroll_to(&mut self, first_row: usize) {
        self.viewport.first_row = first_row;
        self.clamp_scroll();
        self.reposition_editor();
    }

    /// Scroll by `delta` rows.
    pub fn scroll_by(&mut self, delta: isize) {
        let target = self.viewport.first_row.saturating_add_signed(delta);
        self.scroll_to(target);
    }

    fn clamp_scroll(&mut self) {
        let count = self.row_count();
        if count == 0 {
            self.viewport.first_row = 0;
            return;
        }
        let max_first = if self.viewport.height == 0 {
            count - 1
        } else {
            let viewport = self.viewport;
            self.with_layout(|layout, cx| layout.first_row(count - 1, &viewport, cx))
                .unwrap_or(0)
        };
        self.viewport.first_row = self.viewport.first_row.min(max_first);
    }

    /// Scroll the minimum amount that brings `row` fully into view.
    pub fn ensure_visible(&mut self, row: usize) -> Result<()> {
        let count = self.row_count();
        if row >= count {
            return Err(TreeError::IndexOutOfRange { index: row, len: count });
        }
        if row < self.viewport.first_row || self.viewport.height == 0 {
            self.viewport.first_row = row;
        } else {
            let page = self.current_page_size()?;
            if row >= self.viewport.first_row + page {
                let viewport = self.viewport;
                self.viewport.first_row =
                    self.with_layout(|layout, cx| layout.first_row(row, &viewport, cx))?;
            }
        }
        self.reposition_editor();
        Ok(())
    }

    // -- selection -----------------------------------------------------------

    /// The selected node.
    #[must_use]
    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Row of the selected node.
    #[must_use]
    pub fn selected_row(&self) -> Option<usize> {
        self.selected.and_then(|id| self.row_of(id))
    }

    /// Select a visible node.
    pub fn select(&mut self, node: NodeId) -> Result<()> {
        self.store.node(node)?;
        self.row_of(node).ok_or(TreeError::NotVisible(node))?;
        self.set_selection(Some(node));
        Ok(())
    }

    /// Select the node at `row` and scroll it into view.
    pub fn select_row(&mut self, row: usize) -> Result<()> {
        let node = self.rows.node_at(row)?;
        self.set_selection(Some(node));
        self.ensure_visible(row)
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.set_selection(None);
    }

    fn set_selection(&mut self, node: Option<NodeId>) {
        if self.selected == node {
            return;
        }
        if let Some(old) = self.selected {
            self.mark_selected(old, false);
        }
        if let Some(new) = node {
            self.mark_selected(new, true);
        }
        self.selected = node;
        self.edit.cancel_arm();
        self.armed_renderer = None;
        self.pending_press = None;
    }

    fn mark_selected(&mut self, id: NodeId, selected: bool) {
        if let Err(err) = self.store.set_selected(id, selected) {
            // Only a deleted node can refuse the flag.
            debug_assert!(matches!(err, TreeError::UnknownNode(_)), "{err}");
            arbor_core::debug!(node = %id, "selection flag skipped for a deleted node");
        }
    }

    // -- expansion -----------------------------------------------------------

    /// Whether `node` has, or can lazily load, children.
    pub fn can_expand(&mut self, node: NodeId) -> Result<bool> {
        let result = self.store.can_expand(node);
        self.sync();
        result
    }

    /// Expand `node`, loading its children if needed.
    pub fn expand(&mut self, node: NodeId) -> Result<()> {
        self.mutate(|store| store.set_expanded(node, true, false))
    }

    /// Collapse `node`.
    pub fn collapse(&mut self, node: NodeId) -> Result<()> {
        self.mutate(|store| store.set_expanded(node, false, false))
    }

    /// Flip `node`. Returns the new expanded state.
    pub fn toggle(&mut self, node: NodeId) -> Result<bool> {
        self.mutate(|store| store.toggle(node))
    }

    /// Expand `node` and its whole subtree.
    pub fn expand_all(&mut self, node: NodeId) -> Result<()> {
        self.mutate(|store| store.set_expanded(node, true, true))
    }

    /// Collapse `node` and its whole subtree.
    pub fn collapse_all(&mut self, node: NodeId) -> Result<()> {
        self.mutate(|store| store.set_expanded(node, false, true))
    }

    // -- editing -------------------------------------------------------------

    /// Edit `node` with the first editable renderer.
    pub fn begin_edit(&mut self, node: NodeId) -> Result<EditOutcome> {
        let renderer = self
            .columns
            .first_editable()
            .ok_or(TreeError::NotEditable(node))?;
        self.begin_edit_with(node, renderer)
    }

    /// Edit `node` with a specific renderer.
    pub fn begin_edit_with(&mut self, node: NodeId, renderer: RendererRef) -> Result<EditOutcome> {
        self.store.node(node)?;
        let bounds = self.editor_bounds(node, renderer)?;
        let outcome = self.edit.begin(
            &mut self.store,
            &self.columns,
            EditTarget {
                node,
                renderer,
                bounds,
            },
        )?;
        self.after_edit();
        Ok(outcome)
    }

    /// Validate and write the open edit.
    pub fn commit_edit(&mut self, mode: CommitMode) -> Result<EditOutcome> {
        let outcome = self.edit.commit(&mut self.store, &self.columns, mode);
        self.after_edit();
        outcome
    }

    /// Discard the open edit or armed node.
    pub fn cancel_edit(&mut self) -> EditOutcome {
        let outcome = self.edit.cancel(&self.columns);
        self.armed_renderer = None;
        self.update_search_suspension();
        outcome
    }

    /// Editable renderer under horizontal position `x` on a row at `depth`.
    fn renderer_at(&self, x: u32, depth: usize) -> Option<RendererRef> {
        let column = self
            .columns
            .spans(self.indent_x(depth), self.viewport.width)
            .into_iter()
            .find(|s| x >= s.x && x < s.x.saturating_add(s.width))
            .map(|s| s.column);
        column
            .and_then(|c| {
                self.columns
                    .renderers()
                    .find(|(r, renderer)| r.column == c && renderer.editable().is_some())
                    .map(|(r, _)| r)
            })
            .or_else(|| self.columns.first_editable())
    }

    // -- events --------------------------------------------------------------

    /// Route an input event.
    pub fn handle_event(&mut self, event: &Event, now: Instant) -> Result<Response> {
        match event {
            Event::Key(key) => self.handle_key(key, now),
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Down(MouseButton::Left) => self.press(mouse.x, mouse.y, now),
                MouseEventKind::Up(MouseButton::Left) => self.release(mouse.y, now),
                MouseEventKind::ScrollUp => {
                    self.scroll_by(-1);
                    Ok(Response::Handled)
                }
                MouseEventKind::ScrollDown => {
                    self.scroll_by(1);
                    Ok(Response::Handled)
                }
                _ => Ok(Response::Ignored),
            },
            Event::Resize { width, height } => {
                self.set_viewport_size(*width, *height);
                Ok(Response::Handled)
            }
            Event::Focus(true) => {
                self.focused = true;
                Ok(Response::Handled)
            }
            Event::Focus(false) => self.focus_lost(),
            Event::Tick => self.tick(now),
        }
    }

    /// Advance timers: the search timeout and the click-to-edit arm.
    pub fn tick(&mut self, now: Instant) -> Result<Response> {
        self.search.check_timeout(now);
        let Some(node) = self.edit.poll_arm(now) else {
            return Ok(Response::Ignored);
        };
        let renderer = self.armed_renderer.take();
        let eligible = self.store.contains(node)
            && self.row_of(node).is_some()
            && self.selected == Some(node);
        if !eligible {
            arbor_core::debug!(node = %node, "armed node no longer eligible for editing");
            return Ok(Response::Ignored);
        }
        let Some(renderer) = renderer.or_else(|| self.columns.first_editable()) else {
            return Ok(Response::Ignored);
        };
        Ok(Response::Edit(self.begin_edit_with(node, renderer)?))
    }

    fn focus_lost(&mut self) -> Result<Response> {
        self.focused = false;
        self.search.end_search();
        self.edit.cancel_arm();
        self.armed_renderer = None;
        self.pending_press = None;
        if self.edit.is_editing() {
            return Ok(Response::Edit(self.commit_edit(CommitMode::Close)?));
        }
        Ok(Response::Handled)
    }

    fn handle_key(&mut self, key: &KeyEvent, now: Instant) -> Result<Response> {
        if key.kind == KeyEventKind::Release {
            return Ok(Response::Ignored);
        }
        if self.edit.is_editing() {
            let outcome = self.edit.handle_key(key, &mut self.store, &self.columns);
            self.after_edit();
            return Ok(Response::Edit(outcome?));
        }

        let response = match key.code {
            KeyCode::Up => self.move_selection(-1)?,
            KeyCode::Down => self.move_selection(1)?,
            KeyCode::PageUp => {
                let page = self.current_page_size()?.max(1);
                self.move_selection(-isize::try_from(page).unwrap_or(isize::MAX))?
            }
            KeyCode::PageDown => {
                let page = self.current_page_size()?.max(1);
                self.move_selection(isize::try_from(page).unwrap_or(isize::MAX))?
            }
            KeyCode::Home => self.jump_to(0)?,
            KeyCode::End => self.jump_to(self.row_count().saturating_sub(1))?,
            KeyCode::Left => self.collapse_or_parent()?,
            KeyCode::Right => self.expand_or_child()?,
            KeyCode::Enter => match self.selected {
                Some(node) => {
                    self.toggle(node)?;
                    Response::Handled
                }
                None => Response::Ignored,
            },
            KeyCode::F(2) => match self.selected {
                Some(node) => Response::Edit(self.begin_edit(node)?),
                None => Response::Ignored,
            },
            KeyCode::Escape => {
                let searching = self.search.is_active();
                self.search.end_search();
                match self.cancel_edit() {
                    EditOutcome::Ignored if !searching => Response::Ignored,
                    EditOutcome::Ignored => Response::Handled,
                    outcome => Response::Edit(outcome),
                }
            }
            KeyCode::Char(_) => {
                return match key.text_char() {
                    Some(ch) => self.type_char(ch, now),
                    None => Ok(Response::Ignored),
                };
            }
            _ => Response::Ignored,
        };
        if response.is_handled() {
            self.search.end_search();
        }
        Ok(response)
    }

    fn move_selection(&mut self, delta: isize) -> Result<Response> {
        let count = self.row_count();
        if count == 0 {
            return Ok(Response::Ignored);
        }
        let target = match self.selected_row() {
            Some(row) => row.saturating_add_signed(delta).min(count - 1),
            None => 0,
        };
        self.select_row(target)?;
        Ok(Response::Handled)
    }

    fn jump_to(&mut self, row: usize) -> Result<Response> {
        if self.row_count() == 0 {
            return Ok(Response::Ignored);
        }
        self.select_row(row)?;
        Ok(Response::Handled)
    }

    fn collapse_or_parent(&mut self) -> Result<Response> {
        let Some(node) = self.selected else {
            return Ok(Response::Ignored);
        };
        let current = self.store.node(node)?;
        if current.is_expanded() && !current.children().is_empty() {
            self.collapse(node)?;
            return Ok(Response::Handled);
        }
        match current.parent().and_then(|p| self.row_of(p)) {
            Some(row) => {
                self.select_row(row)?;
                Ok(Response::Handled)
            }
            None => Ok(Response::Ignored),
        }
    }

    fn expand_or_child(&mut self) -> Result<Response> {
        let Some(node) = self.selected else {
            return Ok(Response::Ignored);
        };
        if !self.store.node(node)?.is_expanded() {
            if !self.can_expand(node)? {
                return Ok(Response::Ignored);
            }
            self.expand(node)?;
            return Ok(Response::Handled);
        }
        match self.store.children(node)?.first().copied() {
            Some(child) => {
                let row = self.row_of(child).ok_or(TreeError::NotVisible(child))?;
                self.select_row(row)?;
                Ok(Response::Handled)
            }
            None => Ok(Response::Ignored),
        }
    }

    fn type_char(&mut self, ch: char, now: Instant) -> Result<Response> {
        let cx = SearchContext {
            store: &self.store,
            rows: &self.rows,
            columns: &self.columns,
            selected: self.selected,
        };
        let Some(found) = self.search.on_character(ch, now, &cx)? else {
            return Ok(if self.search.is_active() {
                Response::Handled
            } else {
                Response::Ignored
            });
        };
        let row = self.row_of(found).ok_or(TreeError::NotVisible(found))?;
        self.set_selection(Some(found));
        self.ensure_visible(row)?;
        Ok(Response::Handled)
    }

    fn press(&mut self, x: u32, y: u32, now: Instant) -> Result<Response> {
        let Some(row) = self.row_at(y)? else {
            self.clicks.reset();
            return Ok(Response::Ignored);
        };
        let node = self.rows.node_at(row)?;
        let depth = self.rows.depth_at(row)?;
        self.search.end_search();

        if self.clicks.press(MouseButton::Left, x, y, now) == ClickKind::Double {
            self.edit.cancel_arm();
            self.armed_renderer = None;
            self.pending_press = None;
            if self.edit.editing_node() != Some(node) {
                self.toggle(node)?;
            }
            return Ok(Response::Handled);
        }

        let expander_x = self.indent_x(depth).saturating_sub(self.config.indent);
        if x >= expander_x && x < expander_x.saturating_add(self.config.indent) && self.can_expand(node)? {
            self.toggle(node)?;
            return Ok(Response::Handled);
        }

        if let Some(editing) = self.edit.editing_node() {
            if editing == node {
                return Ok(Response::Handled);
            }
            let outcome = self.commit_edit(CommitMode::Close)?;
            if matches!(outcome, EditOutcome::Rejected(_)) {
                return Ok(Response::Edit(outcome));
            }
        }

        let was_selected = self.selected == Some(node);
        self.set_selection(Some(node));
        if was_selected {
            let renderer = self.renderer_at(x, depth);
            if self.config.edit_on_click {
                if let Some(renderer) = renderer {
                    return Ok(Response::Edit(self.begin_edit_with(node, renderer)?));
                }
            } else {
                self.pending_press = Some((node, renderer));
            }
        }
        Ok(Response::Handled)
    }

    fn release(&mut self, y: u32, now: Instant) -> Result<Response> {
        let Some((node, renderer)) = self.pending_press.take() else {
            return Ok(Response::Ignored);
        };
        let Some(row) = self.row_at(y)? else {
            return Ok(Response::Ignored);
        };
        if self.rows.node_at(row)? != node {
            return Ok(Response::Ignored);
        }
        self.armed_renderer = renderer;
        Ok(Response::Edit(self.edit.arm(node, now)))
    }

    // -- drawing -------------------------------------------------------------

    /// Paint the visible rows, then the editor on top.
    pub fn draw(&mut self, surface: &mut dyn Surface) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "draw",
            first_row = self.viewport.first_row,
            height = self.viewport.height
        )
        .entered();

        let range = self.visible_range()?;
        let top = self.content_top()?;
        let editing = self.edit.editing_node();
        for row in range {
            let bounds = self.row_bounds(row)?;
            let y = bounds.y.saturating_sub(top);
            let height = bounds.height.min(self.viewport.height.saturating_sub(y));
            let id = self.rows.node_at(row)?;
            let depth = self.rows.depth_at(row)?;
            let indent_x = self.indent_x(depth);
            let node = self.store.node(id)?;

            let mut flags = RowFlags::empty();
            flags.set(RowFlags::SELECTED, node.is_selected());
            flags.set(RowFlags::EXPANDED, node.is_expanded());
            flags.set(RowFlags::EDITING, editing == Some(id));
            let expandable = !node.is_leaf()
                && (!node.children().is_empty()
                    || (self.store.is_lazy() && !node.is_expanded_once()));
            flags.set(RowFlags::EXPANDABLE, expandable);

            if expandable {
                let glyph = if node.is_expanded() {
                    EXPANDED_GLYPH
                } else {
                    COLLAPSED_GLYPH
                };
                let area = Rect::new(indent_x.saturating_sub(self.config.indent), y, self.config.indent, height);
                surface.draw_text(area, glyph, flags);
            }

            for span in self.columns.spans(indent_x, self.viewport.width) {
                let Some(column) = self.columns.column(span.column) else {
                    continue;
                };
                let renderers: Vec<_> = column.renderers().collect();
                let end = span.x.saturating_add(span.width);
                let mut x = span.x;
                for (i, renderer) in renderers.iter().enumerate() {
                    let remaining = end.saturating_sub(x);
                    let width = if i + 1 == renderers.len() {
                        remaining
                    } else {
                        renderer.measure(node.tag()).width.min(remaining)
                    };
                    renderer.draw(node.tag(), Rect::new(x, y, width, height), flags, surface);
                    x = x.saturating_add(width);
                }
            }
        }

        if let Some(editor) = self.edit.editor() {
            editor.draw(surface);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::EditState;
    use crate::error::{ProviderError, ValidationError};
    use crate::renderers::TextField;
    use arbor_core::event::MouseEvent;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    const MS: Duration = Duration::from_millis(1);

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Rect, String, RowFlags)>,
    }

    impl Surface for Recorder {
        fn draw_text(&mut self, area: Rect, text: &str, flags: RowFlags) {
            self.calls.push((area, text.to_string(), flags));
        }
    }

    struct Ids {
        n1: NodeId,
        n1a: NodeId,
        n1b: NodeId,
        n2: NodeId,
    }

    fn name_field() -> TextField<String> {
        TextField::new(|s: &String| s.clone()).with_setter(|s: &mut String, value: &str| {
            if value.is_empty() {
                return Err(ValidationError::new("empty", "a name is required"));
            }
            *s = value.to_string();
            Ok(())
        })
    }

    fn sample(config: TreeViewConfig) -> (TreeView<String>, Ids) {
        let mut store = NodeStore::new("root".to_string());
        let root = store.root();
        let n1 = store.push_child(root, "N1".into()).unwrap();
        let n1a = store.push_child(n1, "N1a".into()).unwrap();
        let n1b = store.push_child(n1, "N1b".into()).unwrap();
        let n2 = store.push_child(root, "N2".into()).unwrap();
        store.set_expanded(n1, true, false).unwrap();
        let mut view = TreeView::new(store, ColumnSet::single(name_field()), config);
        view.set_viewport_size(40, 10);
        (view, Ids { n1, n1a, n1b, n2 })
    }

    fn key(view: &mut TreeView<String>, code: KeyCode, now: Instant) -> Response {
        view.handle_event(&Event::Key(KeyEvent::new(code)), now)
            .unwrap()
    }

    fn mouse(view: &mut TreeView<String>, kind: MouseEventKind, x: u32, y: u32, now: Instant) -> Response {
        view.handle_event(&Event::Mouse(MouseEvent::new(kind, x, y)), now)
            .unwrap()
    }

    fn click(view: &mut TreeView<String>, x: u32, y: u32, now: Instant) -> (Response, Response) {
        let down = mouse(view, MouseEventKind::Down(MouseButton::Left), x, y, now);
        let up = mouse(view, MouseEventKind::Up(MouseButton::Left), x, y, now);
        (down, up)
    }

    fn visible(view: &TreeView<String>) -> Vec<NodeId> {
        view.rows().rows().unwrap().to_vec()
    }

    #[test]
    fn collapse_shrinks_row_map() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        assert_eq!(visible(&view), vec![ids.n1, ids.n1a, ids.n1b, ids.n2]);
        assert_eq!(view.row_of(ids.n1b), Some(2));

        view.collapse(ids.n1).unwrap();
        assert_eq!(visible(&view), vec![ids.n1, ids.n2]);
        assert_eq!(view.row_of(ids.n2), Some(1));
        assert_eq!(view.row_of(ids.n1a), None);
    }

    #[test]
    fn fixed_rows_have_closed_form_bounds() {
        let (mut view, _) = sample(TreeViewConfig::default().with_row_height(RowHeight::Fixed(20)));
        assert_eq!(view.row_bounds(3).unwrap(), Rect::new(0, 60, 0, 20));
        assert_eq!(view.content_height().unwrap(), 80);
    }

    #[test]
    fn click_on_selected_row_arms_then_edits() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();

        assert_eq!(click(&mut view, 5, 1, t), (Response::Handled, Response::Ignored));
        assert_eq!(view.selected(), Some(ids.n1a));

        let (_, up) = click(&mut view, 5, 1, t + 1000 * MS);
        assert_eq!(up, Response::Edit(EditOutcome::Armed(ids.n1a)));
        assert_eq!(view.tick(t + 1499 * MS).unwrap(), Response::Ignored);
        assert_eq!(
            view.tick(t + 1500 * MS).unwrap(),
            Response::Edit(EditOutcome::Started(ids.n1a))
        );

        let editor = view.edit_session().editor().unwrap();
        assert_eq!(editor.bounds(), Rect::new(4, 1, 36, 1));
        assert!(view.search().is_suspended());
    }

    #[test]
    fn double_click_suppresses_edit() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        click(&mut view, 5, 1, t);
        click(&mut view, 5, 1, t + 1000 * MS);
        assert_eq!(view.edit_session().armed_node(), Some(ids.n1a));

        let down = mouse(&mut view, MouseEventKind::Down(MouseButton::Left), 5, 1, t + 1100 * MS);
        assert_eq!(down, Response::Handled);
        assert_eq!(view.edit_session().state(), EditState::Idle);
        assert_eq!(view.tick(t + 2000 * MS).unwrap(), Response::Ignored);
        assert!(!view.edit_session().is_editing());
    }

    #[test]
    fn double_click_toggles_expansion() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        click(&mut view, 10, 0, t);
        click(&mut view, 10, 0, t + 100 * MS);
        assert!(!view.store().node(ids.n1).unwrap().is_expanded());
        assert_eq!(view.row_count(), 2);
    }

    #[test]
    fn edit_on_click_starts_immediately() {
        let (mut view, ids) = sample(TreeViewConfig::default().with_edit_on_click(true));
        let t = Instant::now();
        click(&mut view, 5, 3, t);
        let (down, _) = click(&mut view, 5, 3, t + 1000 * MS);
        assert_eq!(down, Response::Edit(EditOutcome::Started(ids.n2)));
        assert_eq!(view.edit_session().editing_node(), Some(ids.n2));
    }

    #[test]
    fn selection_change_cancels_arm() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        click(&mut view, 5, 1, t);
        click(&mut view, 5, 1, t + 1000 * MS);
        assert_eq!(view.edit_session().armed_node(), Some(ids.n1a));

        key(&mut view, KeyCode::Down, t + 1100 * MS);
        assert_eq!(view.selected(), Some(ids.n1b));
        assert_eq!(view.edit_session().armed_node(), None);
        assert_eq!(view.tick(t + 2000 * MS).unwrap(), Response::Ignored);
    }

    #[test]
    fn expander_click_toggles() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        let (down, _) = click(&mut view, 0, 0, t);
        assert_eq!(down, Response::Handled);
        assert!(!view.store().node(ids.n1).unwrap().is_expanded());
        assert_eq!(view.selected(), None);
        assert_eq!(view.row_count(), 2);
    }

    #[test]
    fn click_below_last_row_is_ignored() {
        let (mut view, _) = sample(TreeViewConfig::default());
        let (down, up) = click(&mut view, 5, 7, Instant::now());
        assert_eq!(down, Response::Ignored);
        assert_eq!(up, Response::Ignored);
    }

    #[test]
    fn arrow_navigation() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();

        key(&mut view, KeyCode::Down, t);
        assert_eq!(view.selected(), Some(ids.n1));
        key(&mut view, KeyCode::Down, t);
        assert_eq!(view.selected(), Some(ids.n1a));
        key(&mut view, KeyCode::End, t);
        assert_eq!(view.selected(), Some(ids.n2));
        key(&mut view, KeyCode::Up, t);
        assert_eq!(view.selected(), Some(ids.n1b));

        key(&mut view, KeyCode::Left, t);
        assert_eq!(view.selected(), Some(ids.n1));
        key(&mut view, KeyCode::Left, t);
        assert_eq!(view.row_count(), 2);
        key(&mut view, KeyCode::Right, t);
        assert_eq!(view.row_count(), 4);
        key(&mut view, KeyCode::Right, t);
        assert_eq!(view.selected(), Some(ids.n1a));

        key(&mut view, KeyCode::Home, t);
        assert_eq!(view.selected(), Some(ids.n1));
        assert_eq!(key(&mut view, KeyCode::Up, t), Response::Handled);
        assert_eq!(view.selected(), Some(ids.n1));
    }

    #[test]
    fn enter_toggles_selected() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        assert_eq!(key(&mut view, KeyCode::Enter, t), Response::Ignored);
        view.select(ids.n1).unwrap();
        key(&mut view, KeyCode::Enter, t);
        assert_eq!(view.row_count(), 2);
    }

    #[test]
    fn typing_searches_labels() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        assert_eq!(key(&mut view, KeyCode::Char('n'), t), Response::Handled);
        assert_eq!(view.selected(), Some(ids.n1));
        key(&mut view, KeyCode::Char('2'), t + 100 * MS);
        assert_eq!(view.selected(), Some(ids.n2));
        assert_eq!(view.search().buffer(), "n2");
    }

    #[test]
    fn search_is_suspended_while_editing() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        view.select(ids.n2).unwrap();
        assert_eq!(
            key(&mut view, KeyCode::F(2), t),
            Response::Edit(EditOutcome::Started(ids.n2))
        );
        assert!(view.search().is_suspended());

        // Typing goes to the editor, not the search.
        key(&mut view, KeyCode::Char('x'), t);
        assert_eq!(view.search().buffer(), "");
        assert_eq!(view.edit_session().editor().unwrap().value(), "N2x");

        assert_eq!(
            key(&mut view, KeyCode::Escape, t),
            Response::Edit(EditOutcome::Cancelled(ids.n2))
        );
        assert!(!view.search().is_suspended());
        assert_eq!(view.store().tag(ids.n2).unwrap(), "N2");
    }

    #[test]
    fn focus_loss_commits() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        view.select(ids.n2).unwrap();
        view.begin_edit(ids.n2).unwrap();
        key(&mut view, KeyCode::Char('x'), t);

        let response = view.handle_event(&Event::Focus(false), t).unwrap();
        assert_eq!(response, Response::Edit(EditOutcome::Committed(ids.n2)));
        assert_eq!(view.store().tag(ids.n2).unwrap(), "N2x");
        assert!(!view.is_focused());
        assert!(!view.search().is_suspended());
    }

    #[test]
    fn rejected_value_keeps_editing() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        view.select(ids.n2).unwrap();
        key(&mut view, KeyCode::F(2), t);
        key(&mut view, KeyCode::Backspace, t);
        key(&mut view, KeyCode::Backspace, t);

        let Response::Edit(EditOutcome::Rejected(err)) = key(&mut view, KeyCode::Enter, t) else {
            panic!("expected a rejection");
        };
        assert_eq!(err.code, "empty");
        assert!(view.edit_session().is_editing());
        assert_eq!(view.store().tag(ids.n2).unwrap(), "N2");
    }

    #[test]
    fn rejected_edit_draws_message() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        view.select(ids.n2).unwrap();
        view.begin_edit(ids.n2).unwrap();
        key(&mut view, KeyCode::Backspace, t);
        key(&mut view, KeyCode::Backspace, t);
        key(&mut view, KeyCode::Enter, t);

        let mut surface = Recorder::default();
        view.draw(&mut surface).unwrap();
        let (area, text, flags) = surface.calls.last().unwrap();
        assert_eq!(text, "a name is required");
        assert_eq!(*area, Rect::new(3, 3, 37, 1));
        assert_eq!(*flags, RowFlags::INVALID);
    }

    #[test]
    fn clicking_elsewhere_commits_edit() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        view.select(ids.n2).unwrap();
        view.begin_edit(ids.n2).unwrap();
        key(&mut view, KeyCode::Char('!'), t);

        click(&mut view, 5, 0, t);
        assert_eq!(view.store().tag(ids.n2).unwrap(), "N2!");
        assert_eq!(view.selected(), Some(ids.n1));
        assert!(!view.edit_session().is_editing());
    }

    #[test]
    fn rejected_commit_blocks_click() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        view.select(ids.n2).unwrap();
        view.begin_edit(ids.n2).unwrap();
        key(&mut view, KeyCode::Backspace, t);
        key(&mut view, KeyCode::Backspace, t);

        let (down, _) = click(&mut view, 5, 0, t);
        assert!(matches!(down, Response::Edit(EditOutcome::Rejected(_))));
        assert_eq!(view.selected(), Some(ids.n2));
        assert_eq!(view.edit_session().editing_node(), Some(ids.n2));
    }

    #[test]
    fn removing_edited_node_cancels_edit() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        view.select(ids.n1a).unwrap();
        view.begin_edit(ids.n1a).unwrap();
        assert!(view.search().is_suspended());

        let removed = view.mutate(|store| store.remove(ids.n1, 0)).unwrap();
        assert_eq!(removed, ids.n1a);
        assert!(!view.edit_session().is_editing());
        assert!(!view.search().is_suspended());
        assert_eq!(view.selected(), None);
        assert_eq!(visible(&view), vec![ids.n1, ids.n1b, ids.n2]);
    }

    #[test]
    fn armed_node_deleted_before_delay_is_dropped() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        click(&mut view, 5, 1, t);
        click(&mut view, 5, 1, t + 1000 * MS);
        assert_eq!(view.edit_session().armed_node(), Some(ids.n1a));

        view.mutate(|s| s.delete(ids.n1a)).unwrap();
        assert_eq!(view.edit_session().armed_node(), None);
        assert_eq!(view.tick(t + 2000 * MS).unwrap(), Response::Ignored);
        assert!(!view.edit_session().is_editing());
        assert_eq!(view.selected(), None);
    }

    #[test]
    fn armed_node_hidden_before_delay_is_dropped() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        let t = Instant::now();
        click(&mut view, 5, 1, t);
        click(&mut view, 5, 1, t + 1000 * MS);
        assert_eq!(view.edit_session().armed_node(), Some(ids.n1a));

        view.collapse(ids.n1).unwrap();
        assert_eq!(view.edit_session().armed_node(), None);
        assert_eq!(view.tick(t + 2000 * MS).unwrap(), Response::Ignored);
        assert!(!view.edit_session().is_editing());
        assert_eq!(view.selected(), Some(ids.n1));
    }

    #[test]
    fn deleting_selected_node_keeps_flags_consistent() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        view.select(ids.n1a).unwrap();
        view.mutate(|s| s.delete(ids.n1a)).unwrap();
        assert_eq!(view.selected(), None);

        view.select(ids.n2).unwrap();
        assert_eq!(view.selected(), Some(ids.n2));
        assert!(view.store().node(ids.n2).unwrap().is_selected());
        let flagged: Vec<_> = visible(&view)
            .into_iter()
            .filter(|&id| view.store().node(id).unwrap().is_selected())
            .collect();
        assert_eq!(flagged, vec![ids.n2]);
    }

    #[test]
    fn collapsing_moves_selection_to_ancestor() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        view.select(ids.n1b).unwrap();
        view.collapse(ids.n1).unwrap();
        assert_eq!(view.selected(), Some(ids.n1));
        assert!(view.store().node(ids.n1).unwrap().is_selected());
        assert!(!view.store().node(ids.n1b).unwrap().is_selected());
    }

    #[test]
    fn hidden_nodes_cannot_be_selected_or_edited() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        view.collapse(ids.n1).unwrap();
        assert!(matches!(view.select(ids.n1a), Err(TreeError::NotVisible(_))));
        assert!(matches!(view.begin_edit(ids.n1a), Err(TreeError::NotVisible(_))));
    }

    #[test]
    fn editor_follows_scroll() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        view.set_viewport_size(40, 2);
        view.select(ids.n1b).unwrap();
        view.begin_edit(ids.n1b).unwrap();
        assert_eq!(view.edit_session().editor().unwrap().bounds(), Rect::new(4, 2, 36, 1));
        view.scroll_to(1);
        assert_eq!(view.edit_session().editor().unwrap().bounds(), Rect::new(4, 1, 36, 1));
    }

    #[test]
    fn draw_paints_visible_rows() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        view.set_viewport_size(40, 3);
        view.select(ids.n1).unwrap();
        let mut surface = Recorder::default();
        view.draw(&mut surface).unwrap();

        let texts: Vec<_> = surface.calls.iter().map(|(_, t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["-", "N1", "N1a", "N1b"]);
        let (area, _, flags) = &surface.calls[1];
        assert_eq!(*area, Rect::new(2, 0, 38, 1));
        assert!(flags.contains(RowFlags::SELECTED | RowFlags::EXPANDED | RowFlags::EXPANDABLE));
        assert_eq!(surface.calls[3].0, Rect::new(4, 2, 36, 1));
        assert!(!surface.calls[3].2.contains(RowFlags::EXPANDABLE));
    }

    #[test]
    fn draw_puts_editor_last() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        view.select(ids.n2).unwrap();
        view.begin_edit(ids.n2).unwrap();
        let mut surface = Recorder::default();
        view.draw(&mut surface).unwrap();

        let (area, text, _) = surface.calls.last().unwrap();
        assert_eq!(text, "N2");
        assert_eq!(*area, Rect::new(2, 3, 38, 1));
        let row = surface.calls.iter().find(|(a, t, _)| t == "N2" && a.y == 3).unwrap();
        assert!(row.2.contains(RowFlags::EDITING));
    }

    #[test]
    fn auto_heights_follow_content() {
        let mut store = NodeStore::new(String::new());
        let root = store.root();
        let a = store.push_child(root, "a\nb".into()).unwrap();
        store.push_child(root, "c".into()).unwrap();
        store.push_child(root, "d".into()).unwrap();
        let config = TreeViewConfig::default().with_row_height(RowHeight::Auto { preferred: 1 });
        let mut view = TreeView::new(store, ColumnSet::single(name_field()), config);
        view.set_viewport_size(20, 10);

        assert_eq!(view.row_bounds(1).unwrap(), Rect::new(0, 2, 0, 1));
        view.mutate(|store| store.set_tag(a, "a".into())).unwrap();
        assert_eq!(view.row_bounds(1).unwrap(), Rect::new(0, 1, 0, 1));
        assert_eq!(view.row_at(2).unwrap(), Some(2));
    }

    #[test]
    fn lazy_children_load_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let provider = move |tag: &String| -> std::result::Result<Vec<String>, ProviderError> {
            counter.set(counter.get() + 1);
            Ok(match tag.as_str() {
                "root" => vec!["a".into(), "b".into()],
                "a" => vec!["a1".into()],
                _ => Vec::new(),
            })
        };
        let store = NodeStore::with_provider("root".to_string(), provider).unwrap();
        let mut view = TreeView::new(store, ColumnSet::single(name_field()), TreeViewConfig::default());
        assert_eq!(view.row_count(), 2);
        let a = view.node_at(0).unwrap();

        view.expand(a).unwrap();
        assert_eq!(view.row_count(), 3);
        let loads = calls.get();
        view.collapse(a).unwrap();
        view.expand(a).unwrap();
        assert_eq!(calls.get(), loads);
    }

    #[test]
    fn scrolling_keeps_selection_visible() {
        let mut store = NodeStore::new("root".to_string());
        let root = store.root();
        for i in 0..10 {
            store.push_child(root, format!("item {i}")).unwrap();
        }
        let mut view = TreeView::new(store, ColumnSet::single(name_field()), TreeViewConfig::default());
        view.set_viewport_size(40, 3);
        let t = Instant::now();

        key(&mut view, KeyCode::End, t);
        assert_eq!(view.viewport().first_row, 7);
        assert_eq!(view.visible_range().unwrap(), 7..10);
        key(&mut view, KeyCode::PageUp, t);
        assert_eq!(view.selected_row(), Some(6));
        assert_eq!(view.viewport().first_row, 6);
        key(&mut view, KeyCode::Home, t);
        assert_eq!(view.viewport().first_row, 0);

        view.scroll_by(100);
        assert_eq!(view.viewport().first_row, 7);
        view.scroll_by(-100);
        assert_eq!(view.viewport().first_row, 0);
    }

    #[test]
    fn explicit_columns_bound_editor_and_draw() {
        let mut store = NodeStore::new("root".to_string());
        let root = store.root();
        let node = store.push_child(root, "name".to_string()).unwrap();
        let columns = ColumnSet::new()
            .with_column(crate::render::Column::new("Name", 10).with_renderer(name_field()))
            .with_column(
                crate::render::Column::new("Size", 20)
                    .with_renderer(TextField::new(|s: &String| s.len().to_string())),
            );
        let mut view = TreeView::new(store, columns, TreeViewConfig::default().with_columns(true));
        view.set_viewport_size(40, 5);

        view.select(node).unwrap();
        view.begin_edit(node).unwrap();
        assert_eq!(view.edit_session().editor().unwrap().bounds(), Rect::new(2, 0, 8, 1));
        view.cancel_edit();

        let mut surface = Recorder::default();
        view.draw(&mut surface).unwrap();
        let placed: Vec<_> = surface.calls.iter().map(|(a, t, _)| (*a, t.as_str())).collect();
        assert_eq!(
            placed,
            vec![(Rect::new(2, 0, 8, 1), "name"), (Rect::new(10, 0, 20, 1), "4")]
        );
    }

    #[test]
    fn show_root_adds_row_zero() {
        let (mut view, ids) = sample(TreeViewConfig::default());
        view.set_show_root(true);
        assert_eq!(view.row_count(), 5);
        assert_eq!(view.row_of(ids.n1), Some(1));
        assert_eq!(view.node_at(0).unwrap(), view.store().root());
    }
}
