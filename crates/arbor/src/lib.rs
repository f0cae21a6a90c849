#![forbid(unsafe_code)]

//! Virtualized, editable tree view.
//!
//! The crate is layered bottom-up:
//!
//! - [`node`]: the arena [`NodeStore`] with its change journal and lazy
//!   children provider.
//! - [`rows`]: [`VisibleRowIndex`], the flat map of currently visible nodes.
//! - [`layout`]: [`RowLayout`] strategies mapping rows to pixel bounds.
//! - [`render`] and [`renderers`]: the column model and field renderers.
//! - [`edit`]: the click-to-edit state machine.
//! - [`search`]: type-to-select incremental search.
//! - [`view`]: [`TreeView`], which owns all of the above and keeps them
//!   consistent across mutations and input events.
//!
//! Nothing here talks to a terminal. Drawing goes through the [`Surface`]
//! trait and input arrives as [`arbor_core::event::Event`] values with an
//! injected timestamp.

pub mod config;
pub mod edit;
pub mod error;
pub mod layout;
pub mod node;
pub mod render;
pub mod renderers;
pub mod rows;
pub mod search;
pub mod view;

pub use config::{RowHeight, TreeViewConfig};
pub use edit::{CommitMode, EditOutcome, EditSession, EditState};
pub use error::{ProviderError, Result, TreeError, ValidationError};
pub use layout::{AutoRowLayout, FixedRowLayout, LayoutContext, RowLayout, Viewport};
pub use node::{ChildrenProvider, Node, NodeId, NodeStore, StructureChange};
pub use render::{
    Column, ColumnSet, ColumnSpan, Editable, EditorAction, FieldEditor, FieldRenderer,
    RendererRef, RowFlags, Searchable, Surface,
};
pub use rows::VisibleRowIndex;
pub use search::{IncrementalSearch, SearchMode};
pub use view::{Response, TreeView};
