#![forbid(unsafe_code)]

//! Error types for the tree engine.
//!
//! Three families, handled differently:
//!
//! | Family | Type | Handling |
//! |--------|------|----------|
//! | API misuse | [`TreeError`] | Returned as `Err`, not recovered |
//! | Rejected edit | [`ValidationError`] | Attached to the editor, session stays open |
//! | Children fetch failure | [`ProviderError`] | Wrapped in [`TreeError::Provider`], node stays collapsed |

use std::error::Error;
use std::fmt;

use crate::node::NodeId;

/// Crate-wide result alias.
pub type Result<T, E = TreeError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// TreeError
// ---------------------------------------------------------------------------

/// Misuse of the engine API.
#[derive(Debug)]
pub enum TreeError {
    /// The id does not name a live node (never allocated, or its slot was freed).
    UnknownNode(NodeId),
    /// Attaching `node` under `parent` would create a cycle or move the root.
    InvalidMove {
        /// Node being attached.
        node: NodeId,
        /// Requested parent.
        parent: NodeId,
    },
    /// A child position outside the valid range.
    IndexOutOfRange {
        /// Requested position.
        index: usize,
        /// Length of the range it was checked against.
        len: usize,
    },
    /// The row map was queried after a structural change but before a rebuild.
    StaleRowMap,
    /// The requested renderer does not exist or cannot edit.
    NotEditable(NodeId),
    /// The node has no row in the current row map.
    NotVisible(NodeId),
    /// The children provider failed.
    Provider(ProviderError),
}

impl TreeError {
    /// Whether this error belongs to the invalid-argument class.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::UnknownNode(_) | Self::InvalidMove { .. } | Self::IndexOutOfRange { .. }
        )
    }

    /// Whether this error reports an operation issued in the wrong state.
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Self::StaleRowMap | Self::NotEditable(_) | Self::NotVisible(_)
        )
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "unknown or deleted node {id}"),
            Self::InvalidMove { node, parent } => {
                write!(f, "cannot attach node {node} under {parent}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::StaleRowMap => write!(f, "row map queried before rebuild"),
            Self::NotEditable(id) => write!(f, "node {id} has no editable renderer"),
            Self::NotVisible(id) => write!(f, "node {id} is not in the row map"),
            Self::Provider(err) => write!(f, "children provider failed: {err}"),
        }
    }
}

impl Error for TreeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProviderError> for TreeError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Failure reported by a [`ChildrenProvider`](crate::node::ChildrenProvider).
#[derive(Debug)]
pub struct ProviderError {
    message: String,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ProviderError {
    /// Create an error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A rejected edit value.
///
/// `code` is a stable machine-readable identifier (e.g. `"empty"`,
/// `"not_a_number"`); `message` is shown next to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Stable identifier for programmatic handling.
    pub code: &'static str,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Io;

    impl fmt::Display for Io {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("disk gone")
        }
    }

    impl Error for Io {}

    #[test]
    fn provider_error_chains_source() {
        let err = TreeError::from(ProviderError::new("listing failed").with_source(Io));
        assert_eq!(err.to_string(), "children provider failed: listing failed");
        let provider = err.source().expect("provider source");
        assert_eq!(provider.source().expect("io source").to_string(), "disk gone");
    }

    #[test]
    fn classification() {
        assert!(TreeError::IndexOutOfRange { index: 3, len: 2 }.is_invalid_argument());
        assert!(TreeError::StaleRowMap.is_invalid_state());
        assert!(!TreeError::StaleRowMap.is_invalid_argument());
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::new("empty", "name is required");
        assert_eq!(err.to_string(), "name is required (empty)");
    }
}
