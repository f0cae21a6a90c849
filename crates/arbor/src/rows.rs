#![forbid(unsafe_code)]

//! The visible row map.
//!
//! [`VisibleRowIndex`] flattens the part of a [`NodeStore`] reachable through
//! expanded ancestors into an ordered list of rows (depth-first pre-order).
//! Lookups in both directions are O(1) once the map is current.
//!
//! The map never scans the store on its own. The owner feeds it every
//! [`StructureChange`] drained from the store via [`VisibleRowIndex::notify`],
//! which marks the map stale and reports the first row whose position or
//! content may differ, then calls [`VisibleRowIndex::rebuild`]. Queries made
//! in between fail with [`TreeError::StaleRowMap`].

use crate::error::{Result, TreeError};
use crate::node::{NodeId, NodeStore, StructureChange};

/// Ordered list of visible nodes with reverse lookup.
#[derive(Debug, Clone)]
pub struct VisibleRowIndex {
    rows: Vec<NodeId>,
    depths: Vec<usize>,
    /// Row number per arena slot; `None` when not visible.
    row_of_slot: Vec<Option<usize>>,
    root: Option<NodeId>,
    show_root: bool,
    stale: bool,
}

impl Default for VisibleRowIndex {
    fn default() -> Self {
        Self::new(false)
    }
}

impl VisibleRowIndex {
    /// Create an empty, stale map.
    ///
    /// With `show_root` the root occupies row 0; otherwise the root's
    /// children are the top-level rows.
    #[must_use]
    pub fn new(show_root: bool) -> Self {
        Self {
            rows: Vec::new(),
            depths: Vec::new(),
            row_of_slot: Vec::new(),
            root: None,
            show_root,
            stale: true,
        }
    }

    /// Whether the root is a row.
    #[must_use]
    pub fn show_root(&self) -> bool {
        self.show_root
    }

    /// Change root visibility. Marks the map stale.
    pub fn set_show_root(&mut self, show_root: bool) {
        if self.show_root != show_root {
            self.show_root = show_root;
            self.stale = true;
        }
    }

    /// Whether a rebuild is pending.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Record a structural change.
    ///
    /// Returns the first row of the previous map that the change can affect,
    /// or `None` when it touches nothing visible.
    pub fn notify(&mut self, change: &StructureChange) -> Option<usize> {
        self.stale = true;
        match *change {
            StructureChange::Inserted { parent, .. } => self.after(parent),
            StructureChange::Removed { node, .. } => self.previous_row_of(node),
            StructureChange::Expanded(node)
            | StructureChange::Collapsed(node)
            | StructureChange::ChildrenLoaded(node) => self.after(node),
            StructureChange::ContentChanged(node) => self.previous_row_of(node),
        }
    }

    /// First row below `node`, in the previous map.
    fn after(&self, node: NodeId) -> Option<usize> {
        if Some(node) == self.root && !self.show_root {
            return Some(0);
        }
        self.previous_row_of(node).map(|row| row + 1)
    }

    /// Row of `node` in the last built map, ignoring staleness.
    fn previous_row_of(&self, node: NodeId) -> Option<usize> {
        self.row_of_slot
            .get(node.slot())
            .copied()
            .flatten()
            .filter(|&row| self.rows.get(row) == Some(&node))
    }

    /// Recompute the map from the store.
    pub fn rebuild<T>(&mut self, store: &NodeStore<T>) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("rebuild_rows", revision = store.revision()).entered();

        for id in self.rows.drain(..) {
            if let Some(slot) = self.row_of_slot.get_mut(id.slot()) {
                *slot = None;
            }
        }
        self.depths.clear();
        self.row_of_slot.resize(store.slot_count(), None);

        let root = store.root();
        self.root = Some(root);

        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        if self.show_root {
            stack.push((root, 0));
        } else if let Some(node) = store.get(root) {
            stack.extend(node.children().iter().rev().map(|&child| (child, 0)));
        }

        while let Some((id, depth)) = stack.pop() {
            let Some(node) = store.get(id) else {
                continue;
            };
            let row = self.rows.len();
            self.rows.push(id);
            self.depths.push(depth);
            self.row_of_slot[id.slot()] = Some(row);
            if node.is_expanded() {
                stack.extend(node.children().iter().rev().map(|&child| (child, depth + 1)));
            }
        }

        self.stale = false;
        arbor_core::trace!(rows = self.rows.len(), "row map rebuilt");
    }

    fn current(&self) -> Result<()> {
        if self.stale {
            Err(TreeError::StaleRowMap)
        } else {
            Ok(())
        }
    }

    /// Number of visible rows.
    pub fn row_count(&self) -> Result<usize> {
        self.current()?;
        Ok(self.rows.len())
    }

    /// All visible nodes in row order.
    pub fn rows(&self) -> Result<&[NodeId]> {
        self.current()?;
        Ok(&self.rows)
    }

    /// The node displayed at `row`.
    pub fn node_at(&self, row: usize) -> Result<NodeId> {
        self.current()?;
        self.rows
            .get(row)
            .copied()
            .ok_or(TreeError::IndexOutOfRange {
                index: row,
                len: self.rows.len(),
            })
    }

    /// The row displaying `node`, or `None` if it is not visible.
    pub fn row_of(&self, node: NodeId) -> Result<Option<usize>> {
        self.current()?;
        Ok(self.previous_row_of(node))
    }

    /// Indentation depth of `row` (top-level rows have depth 0).
    pub fn depth_at(&self, row: usize) -> Result<usize> {
        self.current()?;
        self.depths
            .get(row)
            .copied()
            .ok_or(TreeError::IndexOutOfRange {
                index: row,
                len: self.depths.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        store: NodeStore<&'static str>,
        n1: NodeId,
        n1a: NodeId,
        n1b: NodeId,
        n2: NodeId,
    }

    /// root -> [N1 -> [N1a, N1b], N2], N1 expanded.
    fn fixture() -> Fixture {
        let mut store = NodeStore::new("root");
        let root = store.root();
        let n1 = store.push_child(root, "N1").unwrap();
        let n2 = store.push_child(root, "N2").unwrap();
        let n1a = store.push_child(n1, "N1a").unwrap();
        let n1b = store.push_child(n1, "N1b").unwrap();
        store.set_expanded(n1, true, false).unwrap();
        store.take_changes();
        Fixture {
            store,
            n1,
            n1a,
            n1b,
            n2,
        }
    }

    #[test]
    fn expanded_children_are_rows() {
        let f = fixture();
        let mut rows = VisibleRowIndex::new(false);
        rows.rebuild(&f.store);
        assert_eq!(rows.rows().unwrap(), &[f.n1, f.n1a, f.n1b, f.n2]);
        assert_eq!(rows.row_of(f.n1b).unwrap(), Some(2));
        assert_eq!(rows.depth_at(1).unwrap(), 1);
        assert_eq!(rows.depth_at(3).unwrap(), 0);
    }

    #[test]
    fn collapse_shifts_following_rows() {
        let mut f = fixture();
        let mut rows = VisibleRowIndex::new(false);
        rows.rebuild(&f.store);

        f.store.set_expanded(f.n1, false, false).unwrap();
        let first: Option<usize> = f
            .store
            .take_changes()
            .iter()
            .filter_map(|c| rows.notify(c))
            .min();
        assert_eq!(first, Some(1));
        assert!(matches!(rows.row_count(), Err(TreeError::StaleRowMap)));

        rows.rebuild(&f.store);
        assert_eq!(rows.rows().unwrap(), &[f.n1, f.n2]);
        assert_eq!(rows.row_of(f.n2).unwrap(), Some(1));
        assert_eq!(rows.row_of(f.n1a).unwrap(), None);
    }

    #[test]
    fn show_root_adds_row_zero() {
        let f = fixture();
        let mut rows = VisibleRowIndex::new(true);
        rows.rebuild(&f.store);
        assert_eq!(rows.row_count().unwrap(), 5);
        assert_eq!(rows.node_at(0).unwrap(), f.store.root());
        assert_eq!(rows.row_of(f.n1b).unwrap(), Some(3));
        assert_eq!(rows.depth_at(3).unwrap(), 2);
    }

    #[test]
    fn removal_drops_whole_subtree() {
        let mut f = fixture();
        let mut rows = VisibleRowIndex::new(false);
        rows.rebuild(&f.store);

        let root = f.store.root();
        f.store.remove(root, 0).unwrap();
        let changes = f.store.take_changes();
        assert_eq!(rows.notify(&changes[0]), Some(0));
        rows.rebuild(&f.store);
        assert_eq!(rows.rows().unwrap(), &[f.n2]);
        for id in [f.n1, f.n1a, f.n1b] {
            assert_eq!(rows.row_of(id).unwrap(), None);
        }
    }

    #[test]
    fn hidden_changes_report_no_row() {
        let mut f = fixture();
        let mut rows = VisibleRowIndex::new(false);
        rows.rebuild(&f.store);

        let deep = f.store.push_child(f.n2, "N2a").unwrap();
        f.store.set_tag(deep, "N2a'").unwrap();
        let changes = f.store.take_changes();
        assert_eq!(rows.notify(&changes[0]), Some(4));
        assert_eq!(rows.notify(&changes[1]), None);
        assert_eq!(rows.notify(&StructureChange::ContentChanged(f.n1a)), Some(1));
    }

    #[test]
    fn stale_ids_never_resolve_to_rows() {
        let mut f = fixture();
        let mut rows = VisibleRowIndex::new(false);
        rows.rebuild(&f.store);
        f.store.delete(f.n2).unwrap();
        let reused = f.store.create("reused");
        assert_eq!(reused.slot(), f.n2.slot());
        rows.rebuild(&f.store);
        assert_eq!(rows.row_of(reused).unwrap(), None);
        assert_eq!(rows.row_of(f.n2).unwrap(), None);
    }

    #[test]
    fn out_of_range_row() {
        let f = fixture();
        let mut rows = VisibleRowIndex::default();
        rows.rebuild(&f.store);
        assert!(matches!(
            rows.node_at(4),
            Err(TreeError::IndexOutOfRange { index: 4, len: 4 })
        ));
    }
}
