#![forbid(unsafe_code)]

//! Type-to-select incremental search.
//!
//! Each printable keystroke either starts a **first-char** search or extends
//! a **continuous** search:
//!
//! | Condition | Mode | Scan starts at |
//! |-----------|------|----------------|
//! | More than `timeout` since the previous key | first-char | row after the selection |
//! | Buffer is that same single character (repeat) | first-char | row after the selection |
//! | Otherwise | continuous | the selected row |
//!
//! A space that would start a first-char search is ignored.
//!
//! Matching is a case-insensitive prefix test against every search label the
//! row's renderers provide. The scan wraps around and visits each row at most
//! once.

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::node::{NodeId, NodeStore};
use crate::render::ColumnSet;
use crate::rows::VisibleRowIndex;

/// Default window within which keystrokes extend the current search.
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_millis(300);

/// How the last keystroke was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Jump to the next row starting with the typed character.
    Standard,
    /// Match the whole accumulated buffer.
    Continuous,
}

/// Inputs for a search step.
#[derive(Debug)]
pub struct SearchContext<'a, T> {
    /// Node payloads.
    pub store: &'a NodeStore<T>,
    /// Current row map.
    pub rows: &'a VisibleRowIndex,
    /// Renderers supplying search labels.
    pub columns: &'a ColumnSet<T>,
    /// Currently selected node.
    pub selected: Option<NodeId>,
}

/// Incremental search state.
#[derive(Debug, Clone)]
pub struct IncrementalSearch {
    timeout: Duration,
    buffer: String,
    last_key: Option<Instant>,
    cursor: Option<NodeId>,
    mode: Option<SearchMode>,
    suspended: bool,
}

impl Default for IncrementalSearch {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_TIMEOUT)
    }
}

impl IncrementalSearch {
    /// Create an idle search with the given timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            buffer: String::new(),
            last_key: None,
            cursor: None,
            mode: None,
            suspended: false,
        }
    }

    /// Keystroke window.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the keystroke window.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Accumulated search text.
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Node matched by the last step.
    #[must_use]
    pub fn cursor(&self) -> Option<NodeId> {
        self.cursor
    }

    /// Mode of the last step, `None` when idle.
    #[must_use]
    pub fn mode(&self) -> Option<SearchMode> {
        self.mode
    }

    /// Whether keystrokes are currently ignored.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Whether a search is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Feed a typed character.
    ///
    /// Returns the node to select, or `None` when the key was ignored or
    /// nothing matched (the selection then stays where it is).
    pub fn on_character<T>(
        &mut self,
        ch: char,
        now: Instant,
        cx: &SearchContext<'_, T>,
    ) -> Result<Option<NodeId>> {
        if self.suspended || ch.is_control() {
            return Ok(None);
        }

        let timed_out = self
            .last_key
            .is_none_or(|t| now.saturating_duration_since(t) > self.timeout);
        let repeat = !timed_out && {
            let mut chars = self.buffer.chars();
            matches!((chars.next(), chars.next()), (Some(first), None) if same_letter(first, ch))
        };
        let first_char = timed_out || repeat;
        // A space only extends a running search; the buffer and window stay as they are.
        if ch == ' ' && (first_char || self.buffer.is_empty()) {
            return Ok(None);
        }
        self.last_key = Some(now);

        let (mode, start) = if first_char {
            self.buffer.clear();
            self.buffer.push(ch);
            (SearchMode::Standard, selected_row(cx)?.map_or(0, |r| r + 1))
        } else {
            self.buffer.push(ch);
            (SearchMode::Continuous, selected_row(cx)?.unwrap_or(0))
        };
        self.mode = Some(mode);

        let found = self.scan(start, cx)?;
        if found.is_some() {
            self.cursor = found;
        }
        arbor_core::trace!(buffer = %self.buffer, ?mode, matched = found.is_some(), "search step");
        Ok(found)
    }

    fn scan<T>(&self, start: usize, cx: &SearchContext<'_, T>) -> Result<Option<NodeId>> {
        let rows = cx.rows.rows()?;
        let n = rows.len();
        if n == 0 {
            return Ok(None);
        }
        let needle = self.buffer.to_lowercase();
        for step in 0..n {
            let node = rows[(start + step) % n];
            let tag = cx.store.tag(node)?;
            if cx
                .columns
                .search_labels(tag)
                .any(|label| label.to_lowercase().starts_with(&needle))
            {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// End the search if the keystroke window has elapsed.
    ///
    /// Returns `true` if the search was reset.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        match self.last_key {
            Some(t) if now.saturating_duration_since(t) > self.timeout => {
                self.end_search();
                true
            }
            _ => false,
        }
    }

    /// Reset buffer and cursor (focus loss, cancel).
    pub fn end_search(&mut self) {
        self.buffer.clear();
        self.last_key = None;
        self.cursor = None;
        self.mode = None;
    }

    /// Ignore keystrokes until [`IncrementalSearch::resume`].
    pub fn suspend(&mut self) {
        self.end_search();
        self.suspended = true;
    }

    /// Accept keystrokes again.
    pub fn resume(&mut self) {
        self.suspended = false;
    }
}

fn same_letter(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn selected_row<T>(cx: &SearchContext<'_, T>) -> Result<Option<usize>> {
    match cx.selected {
        Some(node) => cx.rows.row_of(node),
        None => Ok(None),
    }
}
