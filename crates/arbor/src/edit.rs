#![forbid(unsafe_code)]

//! In-place editing session.
//!
//! One [`EditSession`] per view drives the edit lifecycle:
//!
//! ```text
//!   Idle ──arm──▶ Armed ──timer fires / begin──▶ Editing
//!    ▲              │                              │  ▲
//!    │         double click                     commit │ rejected
//!    │              ▼                              ▼  │
//!    └────────────Idle ◀──────committed──────── Validating
//! ```
//!
//! Arming defers the start of an edit so that a second click can turn the
//! gesture into a double click instead. The deadline is checked against an
//! injected `Instant` (see [`EditSession::poll_arm`]); no clock is read here.
//!
//! # Invariants
//!
//! 1. At most one node is armed or being edited.
//! 2. Starting an edit elsewhere first validates the current one; a rejected
//!    value keeps the old editor open and the new edit does not start.
//! 3. A rejected value is never written; the error is attached to the editor
//!    and the session stays in `Editing`.
//! 4. Cancelling never writes.

use std::fmt;
use std::time::{Duration, Instant};

use arbor_core::deferred::Deferred;
use arbor_core::event::KeyEvent;
use arbor_core::geometry::Rect;

use crate::error::{Result, TreeError, ValidationError};
use crate::node::{NodeId, NodeStore};
use crate::render::{ColumnSet, Editable, EditorAction, FieldEditor, RendererRef};

/// Default delay between a qualifying click and the start of editing.
pub const DEFAULT_ARM_DELAY: Duration = Duration::from_millis(500);

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    /// Nothing pending.
    #[default]
    Idle,
    /// A click armed the timer; editing starts when it fires.
    Armed,
    /// An editor is open.
    Editing,
    /// The pending value is being parsed and applied.
    Validating,
}

/// How a successful commit ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Close the editor.
    Close,
    /// Reopen a fresh editor on the same node.
    Continue,
}

/// Result of a session operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Nothing happened.
    Ignored,
    /// The editor handled a key.
    Consumed,
    /// The node was armed.
    Armed(NodeId),
    /// An editor was opened on the node.
    Started(NodeId),
    /// The value was written and the editor closed.
    Committed(NodeId),
    /// The value was written and a fresh editor opened.
    Continued(NodeId),
    /// The value was rejected; the editor stays open.
    Rejected(ValidationError),
    /// The editor (or the armed timer) was discarded without writing.
    Cancelled(NodeId),
}

/// What to edit and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditTarget {
    /// Node being edited.
    pub node: NodeId,
    /// Renderer providing the editor.
    pub renderer: RendererRef,
    /// Screen rectangle for the editor.
    pub bounds: Rect,
}

struct ActiveEdit {
    node: NodeId,
    renderer: RendererRef,
    editor: Box<dyn FieldEditor>,
}

/// The edit state machine.
pub struct EditSession {
    state: EditState,
    arm: Deferred<NodeId>,
    active: Option<ActiveEdit>,
}

impl fmt::Debug for EditSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("state", &self.state)
            .field("armed", &self.arm.payload())
            .field("editing", &self.editing_node())
            .finish()
    }
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(DEFAULT_ARM_DELAY)
    }
}

fn editable_of<T>(columns: &ColumnSet<T>, target: RendererRef) -> Option<&dyn Editable<T>> {
    columns.renderer(target).and_then(|r| r.editable())
}

impl EditSession {
    /// Create an idle session with the given arm delay.
    #[must_use]
    pub fn new(arm_delay: Duration) -> Self {
        Self {
            state: EditState::Idle,
            arm: Deferred::new(arm_delay),
            active: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EditState {
        self.state
    }

    /// Whether an editor is open.
    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.active.is_some()
    }

    /// Node with an open editor.
    #[must_use]
    pub fn editing_node(&self) -> Option<NodeId> {
        self.active.as_ref().map(|a| a.node)
    }

    /// Renderer that owns the open editor.
    #[must_use]
    pub fn editing_renderer(&self) -> Option<RendererRef> {
        self.active.as_ref().map(|a| a.renderer)
    }

    /// Node waiting for the arm timer.
    #[must_use]
    pub fn armed_node(&self) -> Option<NodeId> {
        self.arm.payload().copied()
    }

    /// The open editor.
    #[must_use]
    pub fn editor(&self) -> Option<&dyn FieldEditor> {
        self.active.as_ref().map(|a| a.editor.as_ref())
    }

    /// Mutable access to the open editor.
    pub fn editor_mut(&mut self) -> Option<&mut (dyn FieldEditor + 'static)> {
        self.active.as_mut().map(|a| a.editor.as_mut())
    }

    /// Configured arm delay.
    #[must_use]
    pub fn arm_delay(&self) -> Duration {
        self.arm.delay()
    }

    /// Change the arm delay for future arms.
    pub fn set_arm_delay(&mut self, delay: Duration) {
        self.arm.set_delay(delay);
    }

    // -- arming --------------------------------------------------------------

    /// Arm `node`; editing starts once the delay elapses.
    ///
    /// Replaces any previously armed node. Ignored while an editor is open.
    pub fn arm(&mut self, node: NodeId, now: Instant) -> EditOutcome {
        if self.active.is_some() {
            return EditOutcome::Ignored;
        }
        self.arm.schedule(node, now);
        self.state = EditState::Armed;
        arbor_core::debug!(node = %node, "edit armed");
        EditOutcome::Armed(node)
    }

    /// Withdraw the armed node (double click, selection change).
    pub fn cancel_arm(&mut self) -> Option<NodeId> {
        let node = self.arm.cancel();
        if self.state == EditState::Armed {
            self.state = EditState::Idle;
        }
        node
    }

    /// Fire the arm timer if due and return the node to start editing.
    ///
    /// The caller revalidates the node before calling [`EditSession::begin`].
    pub fn poll_arm(&mut self, now: Instant) -> Option<NodeId> {
        let node = self.arm.poll(now)?;
        if self.state == EditState::Armed {
            self.state = EditState::Idle;
        }
        Some(node)
    }

    /// Time left before the armed node fires.
    #[must_use]
    pub fn time_until_arm(&self, now: Instant) -> Option<Duration> {
        self.arm.time_until_due(now)
    }

    // -- editing -------------------------------------------------------------

    /// Open an editor on `target`.
    ///
    /// An edit already open on another node is committed first; if that
    /// value is rejected the new edit does not start and the rejection is
    /// returned.
    pub fn begin<T>(
        &mut self,
        store: &mut NodeStore<T>,
        columns: &ColumnSet<T>,
        target: EditTarget,
    ) -> Result<EditOutcome> {
        if let Some(active) = &self.active {
            if active.node == target.node && active.renderer == target.renderer {
                return Ok(EditOutcome::Ignored);
            }
            if let EditOutcome::Rejected(err) = self.commit(store, columns, CommitMode::Close)? {
                return Ok(EditOutcome::Rejected(err));
            }
        }
        self.arm.cancel();

        let editable =
            editable_of(columns, target.renderer).ok_or(TreeError::NotEditable(target.node))?;
        let Some(mut editor) = editable.begin_edit(store.tag(target.node)?) else {
            self.state = EditState::Idle;
            return Ok(EditOutcome::Ignored);
        };
        editor.set_bounds(target.bounds);

        self.active = Some(ActiveEdit {
            node: target.node,
            renderer: target.renderer,
            editor,
        });
        self.state = EditState::Editing;
        arbor_core::debug!(node = %target.node, "edit started");
        Ok(EditOutcome::Started(target.node))
    }

    /// Validate and apply the pending value.
    pub fn commit<T>(
        &mut self,
        store: &mut NodeStore<T>,
        columns: &ColumnSet<T>,
        mode: CommitMode,
    ) -> Result<EditOutcome> {
        let Some(active) = self.active.as_mut() else {
            return Ok(EditOutcome::Ignored);
        };
        let node = active.node;
        let Some(editable) = editable_of(columns, active.renderer) else {
            self.discard(columns);
            return Err(TreeError::NotEditable(node));
        };
        let tag = match store.tag_mut(node) {
            Ok(tag) => tag,
            Err(err) => {
                self.discard(columns);
                return Err(err);
            }
        };

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("validate_edit", node = %node).entered();

        self.state = EditState::Validating;
        if let Err(err) = editable.apply_edit(tag, active.editor.as_ref()) {
            arbor_core::debug!(node = %node, code = err.code, "edit rejected");
            active.editor.set_error(Some(err.clone()));
            self.state = EditState::Editing;
            return Ok(EditOutcome::Rejected(err));
        }
        store.mark_content_changed(node)?;

        if mode == CommitMode::Continue {
            let bounds = active.editor.bounds();
            if let Some(mut fresh) = editable.begin_edit(store.tag(node)?) {
                fresh.set_bounds(bounds);
                let old = std::mem::replace(&mut active.editor, fresh);
                editable.dispose_editor(old);
                self.state = EditState::Editing;
                arbor_core::debug!(node = %node, "edit committed, continuing");
                return Ok(EditOutcome::Continued(node));
            }
        }

        self.discard(columns);
        arbor_core::debug!(node = %node, "edit committed");
        Ok(EditOutcome::Committed(node))
    }

    /// Discard the open editor (or the armed node) without writing.
    pub fn cancel<T>(&mut self, columns: &ColumnSet<T>) -> EditOutcome {
        if let Some(node) = self.cancel_arm() {
            return EditOutcome::Cancelled(node);
        }
        match self.discard(columns) {
            Some(node) => {
                arbor_core::debug!(node = %node, "edit cancelled");
                EditOutcome::Cancelled(node)
            }
            None => EditOutcome::Ignored,
        }
    }

    /// Route a key to the open editor.
    pub fn handle_key<T>(
        &mut self,
        key: &KeyEvent,
        store: &mut NodeStore<T>,
        columns: &ColumnSet<T>,
    ) -> Result<EditOutcome> {
        let Some(active) = self.active.as_mut() else {
            return Ok(EditOutcome::Ignored);
        };
        match active.editor.handle_key(key) {
            EditorAction::Consumed => Ok(EditOutcome::Consumed),
            EditorAction::Ignored => Ok(EditOutcome::Ignored),
            EditorAction::Commit => self.commit(store, columns, CommitMode::Close),
            EditorAction::CommitAndContinue => self.commit(store, columns, CommitMode::Continue),
            EditorAction::Cancel => Ok(self.cancel(columns)),
        }
    }

    /// Move the open editor.
    pub fn set_bounds(&mut self, bounds: Rect) {
        if let Some(active) = self.active.as_mut() {
            active.editor.set_bounds(bounds);
        }
    }

    /// Drop any arm or edit referring to `node`, without writing.
    pub fn forget_node<T>(&mut self, node: NodeId, columns: &ColumnSet<T>) -> Option<EditOutcome> {
        if self.armed_node() == Some(node) {
            self.cancel_arm();
            return Some(EditOutcome::Cancelled(node));
        }
        if self.editing_node() == Some(node) {
            self.discard(columns);
            arbor_core::debug!(node = %node, "edited node left the row map");
            return Some(EditOutcome::Cancelled(node));
        }
        None
    }

    fn discard<T>(&mut self, columns: &ColumnSet<T>) -> Option<NodeId> {
        let active = self.active.take()?;
        match editable_of(columns, active.renderer) {
            Some(editable) => editable.dispose_editor(active.editor),
            None => drop(active.editor),
        }
        self.state = if self.arm.is_pending() {
            EditState::Armed
        } else {
            EditState::Idle
        };
        Some(active.node)
    }
}
