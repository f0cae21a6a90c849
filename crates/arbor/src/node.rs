#![forbid(unsafe_code)]

//! Node storage for hierarchical data.
//!
//! [`NodeStore`] is an arena that owns every node of one tree. Nodes are
//! addressed by [`NodeId`], a slot index paired with a generation counter,
//! so ids held across a `delete` are detected instead of silently aliasing
//! a recycled slot.
//!
//! Every mutation that can change which rows are visible, or how tall they
//! are, appends a [`StructureChange`] to an internal journal and bumps the
//! store revision. Views drain the journal with [`NodeStore::take_changes`];
//! nothing ever scans the tree to discover what changed.
//!
//! # Invariants
//!
//! 1. For every attached node, `node.index() == Some(i)` where
//!    `parent.children()[i] == node`.
//! 2. The root has no parent and cannot be moved or deleted.
//! 3. Detached nodes (after [`NodeStore::remove`]) keep their subtree but have
//!    no parent and no index.
//! 4. The children provider is asked at most once per node unless
//!    [`NodeStore::refresh_children`] is called.
//!
//! # Example
//!
//! ```
//! use arbor::node::NodeStore;
//!
//! let mut store = NodeStore::new("root");
//! let root = store.root();
//! let a = store.push_child(root, "a").unwrap();
//! let b = store.push_child(root, "b").unwrap();
//!
//! // Move `b` in front of `a`.
//! store.insert(root, 0, b).unwrap();
//! assert_eq!(store.children(root).unwrap(), &[b, a]);
//! assert_eq!(store.index_of(a).unwrap(), Some(1));
//! ```

use std::cell::Cell;
use std::fmt;

use crate::error::{ProviderError, Result, TreeError};

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Handle to a node inside a [`NodeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    slot: u32,
    generation: u32,
}

impl NodeId {
    /// Arena slot index.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> usize {
        self.slot as usize
    }

    /// Generation of the slot when this id was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.slot, self.generation)
    }
}

// ---------------------------------------------------------------------------
// Children provider
// ---------------------------------------------------------------------------

/// Lazy source of child payloads.
///
/// Called the first time a node is expanded or asked whether it can expand.
pub trait ChildrenProvider<T> {
    /// Produce the children of `parent`.
    fn children(&self, parent: &T) -> std::result::Result<Vec<T>, ProviderError>;

    /// Whether `tag` can never have children. Leaves are never queried.
    fn is_leaf(&self, _tag: &T) -> bool {
        false
    }
}

impl<T, F> ChildrenProvider<T> for F
where
    F: Fn(&T) -> std::result::Result<Vec<T>, ProviderError>,
{
    fn children(&self, parent: &T) -> std::result::Result<Vec<T>, ProviderError> {
        self(parent)
    }
}

// ---------------------------------------------------------------------------
// StructureChange
// ---------------------------------------------------------------------------

/// A journal entry describing one structural or content mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureChange {
    /// `node` was attached as `parent.children[index]`.
    Inserted {
        /// New parent.
        parent: NodeId,
        /// Attached node.
        node: NodeId,
        /// Position among the siblings.
        index: usize,
    },
    /// `node` was detached from `parent.children[index]`.
    Removed {
        /// Former parent.
        parent: NodeId,
        /// Detached node.
        node: NodeId,
        /// Former position among the siblings.
        index: usize,
    },
    /// The node's expanded flag was set.
    Expanded(NodeId),
    /// The node's expanded flag was cleared.
    Collapsed(NodeId),
    /// The node's children were (re)populated by the provider.
    ChildrenLoaded(NodeId),
    /// The node's payload changed; its cached height was dropped.
    ContentChanged(NodeId),
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One element of the tree.
#[derive(Debug)]
pub struct Node<T> {
    tag: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    index: Option<usize>,
    expanded: bool,
    expanded_once: bool,
    leaf: bool,
    height: Cell<Option<u32>>,
    selected: bool,
}

impl<T> Node<T> {
    fn new(tag: T, leaf: bool) -> Self {
        Self {
            tag,
            parent: None,
            children: Vec::new(),
            index: None,
            expanded: false,
            expanded_once: false,
            leaf,
            height: Cell::new(None),
            selected: false,
        }
    }

    /// The payload.
    #[must_use]
    pub fn tag(&self) -> &T {
        &self.tag
    }

    /// Parent, or `None` for the root and detached nodes.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in display order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Position within the parent's children.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Whether the node shows its children.
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Whether the provider has already populated the children.
    #[must_use]
    pub fn is_expanded_once(&self) -> bool {
        self.expanded_once
    }

    /// Whether the node can never have children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// Selection flag.
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Last measured row height, if still valid.
    #[must_use]
    pub fn cached_height(&self) -> Option<u32> {
        self.height.get()
    }

    pub(crate) fn cache_height(&self, height: u32) {
        self.height.set(Some(height));
    }
}

// ---------------------------------------------------------------------------
// NodeStore
// ---------------------------------------------------------------------------

struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// Arena owning one tree of nodes.
pub struct NodeStore<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    root: NodeId,
    live: usize,
    provider: Option<Box<dyn ChildrenProvider<T>>>,
    changes: Vec<StructureChange>,
    revision: u64,
}

impl<T: fmt::Debug> fmt::Debug for NodeStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStore")
            .field("root", &self.root)
            .field("len", &self.live)
            .field("revision", &self.revision)
            .field("pending_changes", &self.changes.len())
            .field("lazy", &self.provider.is_some())
            .finish()
    }
}

impl<T> NodeStore<T> {
    /// Create a store holding only an expanded root.
    #[must_use]
    pub fn new(root_tag: T) -> Self {
        let mut root = Node::new(root_tag, false);
        root.expanded = true;
        root.expanded_once = true;
        Self::with_root(root, None)
    }

    /// Create a store whose children are fetched lazily from `provider`.
    ///
    /// The root's own children are fetched immediately.
    pub fn with_provider(root_tag: T, provider: impl ChildrenProvider<T> + 'static) -> Result<Self> {
        let mut root = Node::new(root_tag, false);
        root.expanded = true;
        let mut store = Self::with_root(root, Some(Box::new(provider)));
        let root = store.root;
        store.ensure_loaded(root)?;
        Ok(store)
    }

    fn with_root(root: Node<T>, provider: Option<Box<dyn ChildrenProvider<T>>>) -> Self {
        let mut store = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                slot: 0,
                generation: 0,
            },
            live: 0,
            provider,
            changes: Vec::new(),
            revision: 0,
        };
        store.root = store.alloc(root);
        store
    }

    // -- lookup --------------------------------------------------------------

    /// The root node.
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, attached or detached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Always false: the root cannot be deleted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of arena slots ever allocated (upper bound on `NodeId::slot`).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether children are fetched lazily from a provider.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.provider.is_some()
    }

    /// Whether `id` names a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node<T>> {
        self.slots
            .get(id.slot())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// Look up a node, failing on unknown ids.
    pub fn node(&self, id: NodeId) -> Result<&Node<T>> {
        self.get(id).ok_or(TreeError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<T>> {
        self.slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(TreeError::UnknownNode(id))
    }

    /// The node's payload.
    pub fn tag(&self, id: NodeId) -> Result<&T> {
        self.node(id).map(Node::tag)
    }

    /// Mutable access to the payload.
    ///
    /// Changes made through this reference are not journaled; follow up with
    /// [`NodeStore::mark_content_changed`] when they affect rendering.
    pub fn tag_mut(&mut self, id: NodeId) -> Result<&mut T> {
        self.node_mut(id).map(|node| &mut node.tag)
    }

    /// The node's parent.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.node(id).map(Node::parent)
    }

    /// The node's children.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        self.node(id).map(Node::children)
    }

    /// The node's position within its parent.
    pub fn index_of(&self, id: NodeId) -> Result<Option<usize>> {
        self.node(id).map(Node::index)
    }

    /// Distance from the top of the node's tree (the root has depth 0).
    pub fn depth(&self, id: NodeId) -> Result<usize> {
        let mut depth = 0;
        let mut current = self.node(id)?.parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.node(parent)?.parent;
        }
        Ok(depth)
    }

    /// Child positions leading from the top of the node's tree to `id`.
    pub fn path(&self, id: NodeId) -> Result<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = self.node(id)?;
        while let (Some(parent), Some(index)) = (current.parent, current.index) {
            path.push(index);
            current = self.node(parent)?;
        }
        path.reverse();
        Ok(path)
    }

    /// Follow child positions from the root.
    #[must_use]
    pub fn node_at_path(&self, path: &[usize]) -> Option<NodeId> {
        path.iter().try_fold(self.root, |id, &index| {
            self.get(id).and_then(|node| node.children.get(index).copied())
        })
    }

    /// Whether `ancestor` is a proper ancestor of `id`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.get(id).and_then(Node::parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.get(parent).and_then(Node::parent);
        }
        false
    }

    /// Pre-order iterator over the strict descendants of `id`.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Descendants<'_, T> {
        let stack = self
            .get(id)
            .map(|node| node.children.iter().rev().copied().collect())
            .unwrap_or_default();
        Descendants { store: self, stack }
    }

    // -- journal -------------------------------------------------------------

    /// Monotonic counter bumped by every journaled change.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Changes recorded since the last [`NodeStore::take_changes`].
    #[must_use]
    pub fn pending_changes(&self) -> &[StructureChange] {
        &self.changes
    }

    /// Drain the change journal.
    pub fn take_changes(&mut self) -> Vec<StructureChange> {
        std::mem::take(&mut self.changes)
    }

    fn record(&mut self, change: StructureChange) {
        self.changes.push(change);
        self.revision += 1;
    }

    // -- allocation ----------------------------------------------------------

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.node = Some(node);
            return NodeId {
                slot,
                generation: entry.generation,
            };
        }
        let slot = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            slot,
            generation: 0,
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(id.slot())
                .filter(|slot| slot.generation == id.generation)
            else {
                continue;
            };
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                stack.extend(node.children);
                self.free.push(id.slot);
                self.live -= 1;
            }
        }
    }

    /// Create a detached node.
    pub fn create(&mut self, tag: T) -> NodeId {
        let leaf = self
            .provider
            .as_deref()
            .is_some_and(|provider| provider.is_leaf(&tag));
        self.alloc(Node::new(tag, leaf))
    }

    /// Create a node and append it to `parent`'s children.
    pub fn push_child(&mut self, parent: NodeId, tag: T) -> Result<NodeId> {
        let index = self.node(parent)?.children.len();
        let id = self.create(tag);
        self.attach(parent, index, id)?;
        Ok(id)
    }

    // -- structure -----------------------------------------------------------

    /// Insert `node` as `parent.children[index]`.
    ///
    /// A node that already has a parent is detached first. When it moves
    /// within the same parent, `index` refers to the list before removal, so
    /// the node lands directly in front of the sibling that was at `index`.
    pub fn insert(&mut self, parent: NodeId, index: usize, node: NodeId) -> Result<()> {
        self.node(parent)?;
        let (old_parent, old_index) = {
            let n = self.node(node)?;
            (n.parent, n.index)
        };
        if node == self.root || node == parent || self.is_ancestor(node, parent) {
            return Err(TreeError::InvalidMove { node, parent });
        }

        let len = self.node(parent)?.children.len();
        if index > len {
            return Err(TreeError::IndexOutOfRange { index, len });
        }

        let mut target = index;
        if old_parent == Some(parent) && old_index.is_some_and(|old| old < index) {
            target -= 1;
        }
        self.detach(node)?;
        self.attach(parent, target, node)
    }

    /// Detach the child at `parent.children[index]` and return it.
    ///
    /// The removed subtree stays alive as a detached tree.
    pub fn remove(&mut self, parent: NodeId, index: usize) -> Result<NodeId> {
        let children = &self.node(parent)?.children;
        let Some(&node) = children.get(index) else {
            return Err(TreeError::IndexOutOfRange {
                index,
                len: children.len(),
            });
        };
        self.detach(node)?;
        Ok(node)
    }

    /// Detach `id` if attached and free its whole subtree.
    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        if id == self.root {
            return Err(TreeError::InvalidMove {
                node: id,
                parent: id,
            });
        }
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    fn attach(&mut self, parent: NodeId, index: usize, node: NodeId) -> Result<()> {
        let p = self.node_mut(parent)?;
        p.children.insert(index, node);
        p.leaf = false;
        self.node_mut(node)?.parent = Some(parent);
        self.reindex(parent, index)?;
        self.record(StructureChange::Inserted {
            parent,
            node,
            index,
        });
        Ok(())
    }

    fn detach(&mut self, node: NodeId) -> Result<()> {
        let n = self.node(node)?;
        let (Some(parent), Some(index)) = (n.parent, n.index) else {
            return Ok(());
        };
        self.node_mut(parent)?.children.remove(index);
        self.reindex(parent, index)?;
        let n = self.node_mut(node)?;
        n.parent = None;
        n.index = None;
        self.record(StructureChange::Removed {
            parent,
            node,
            index,
        });
        Ok(())
    }

    fn reindex(&mut self, parent: NodeId, from: usize) -> Result<()> {
        let len = self.node(parent)?.children.len();
        for i in from..len {
            let child = self.node(parent)?.children[i];
            self.node_mut(child)?.index = Some(i);
        }
        Ok(())
    }

    fn adopt(&mut self, parent: NodeId, tags: Vec<T>) -> Result<()> {
        let first = self.node(parent)?.children.len();
        let ids: Vec<NodeId> = tags.into_iter().map(|tag| self.create(tag)).collect();
        for (offset, &child) in ids.iter().enumerate() {
            let c = self.node_mut(child)?;
            c.parent = Some(parent);
            c.index = Some(first + offset);
        }
        let p = self.node_mut(parent)?;
        p.children.extend(ids);
        p.expanded_once = true;
        self.record(StructureChange::ChildrenLoaded(parent));
        Ok(())
    }

    /// Fetch children from the provider the first time they are needed.
    fn ensure_loaded(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        if node.expanded_once || node.leaf {
            return Ok(());
        }
        let Some(provider) = self.provider.as_deref() else {
            self.node_mut(id)?.expanded_once = true;
            return Ok(());
        };

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("load_children", node = %id).entered();

        let tags = match provider.children(&node.tag) {
            Ok(tags) => tags,
            Err(err) => {
                arbor_core::warn!(node = %id, error = %err, "children provider failed");
                return Err(err.into());
            }
        };
        arbor_core::debug!(node = %id, count = tags.len(), "children loaded");
        self.adopt(id, tags)
    }

    /// Whether the node has, or can lazily produce, children.
    ///
    /// Triggers the one-time provider fetch for non-leaf nodes.
    pub fn can_expand(&mut self, id: NodeId) -> Result<bool> {
        if self.node(id)?.leaf {
            return Ok(false);
        }
        self.ensure_loaded(id)?;
        Ok(!self.node(id)?.children.is_empty())
    }

    /// Expand or collapse a node, optionally with its whole subtree.
    ///
    /// Expanding fetches children lazily first. A provider failure leaves the
    /// failing node collapsed and not marked as loaded.
    pub fn set_expanded(&mut self, id: NodeId, value: bool, include_descendants: bool) -> Result<()> {
        self.node(id)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if value {
                self.ensure_loaded(current)?;
            }
            let node = self.node_mut(current)?;
            let changed = node.expanded != value && !(value && node.leaf);
            if changed {
                node.expanded = value;
                self.record(if value {
                    StructureChange::Expanded(current)
                } else {
                    StructureChange::Collapsed(current)
                });
            }
            if include_descendants {
                stack.extend(self.node(current)?.children.iter().rev());
            }
        }
        Ok(())
    }

    /// Flip the expanded flag. Returns the new state.
    pub fn toggle(&mut self, id: NodeId) -> Result<bool> {
        let value = !self.node(id)?.expanded;
        self.set_expanded(id, value, false)?;
        Ok(value)
    }

    /// Re-query the provider and replace the node's children.
    ///
    /// Old children are freed. Without a provider this is a no-op. On
    /// failure the existing children are kept.
    pub fn refresh_children(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        let Some(provider) = self.provider.as_deref() else {
            return Ok(());
        };
        if node.leaf {
            return Ok(());
        }
        let tags = provider.children(&node.tag)?;
        let old = std::mem::take(&mut self.node_mut(id)?.children);
        for child in old {
            self.free_subtree(child);
        }
        self.adopt(id, tags)
    }

    // -- content -------------------------------------------------------------

    /// Replace the payload, returning the old one.
    pub fn set_tag(&mut self, id: NodeId, tag: T) -> Result<T> {
        let node = self.node_mut(id)?;
        let old = std::mem::replace(&mut node.tag, tag);
        node.height.set(None);
        self.record(StructureChange::ContentChanged(id));
        Ok(old)
    }

    /// Modify the payload in place and journal the change.
    pub fn update_tag<R>(&mut self, id: NodeId, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let node = self.node_mut(id)?;
        let out = f(&mut node.tag);
        node.height.set(None);
        self.record(StructureChange::ContentChanged(id));
        Ok(out)
    }

    /// Journal a payload change made through [`NodeStore::tag_mut`].
    pub fn mark_content_changed(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?.height.set(None);
        self.record(StructureChange::ContentChanged(id));
        Ok(())
    }

    /// Set the selection flag.
    pub fn set_selected(&mut self, id: NodeId, selected: bool) -> Result<()> {
        self.node_mut(id)?.selected = selected;
        Ok(())
    }

    /// Drop every cached row height.
    pub fn clear_cached_heights(&self) {
        for node in self.slots.iter().filter_map(|slot| slot.node.as_ref()) {
            node.height.set(None);
        }
    }
}

/// Iterator returned by [`NodeStore::descendants`].
pub struct Descendants<'a, T> {
    store: &'a NodeStore<T>,
    stack: Vec<NodeId>,
}

impl<T> Iterator for Descendants<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Some(node) = self.store.get(id) {
            self.stack.extend(node.children.iter().rev());
        }
        Some(id)
    }
}
