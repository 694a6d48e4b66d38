//! Error types for list operations.

use crate::error::CoreError;
use linkdb_codec::{CodecError, NodeKey};
use thiserror::Error;

/// Result type for list operations.
pub type ListResult<T> = Result<T, ListError>;

/// Errors raised by [`crate::LinkedList`] and [`crate::Item`].
#[derive(Debug, Error)]
pub enum ListError {
    /// Caller passed an unusable argument.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Operation needs at least one element.
    #[error("list is empty")]
    EmptyList,

    /// The item's node is gone, typically removed by another handle.
    #[error("node {key} not found")]
    NotFound {
        /// Key of the missing node.
        key: NodeKey,
    },

    /// No list with this name exists.
    #[error("list not found: {name}")]
    ListNotFound {
        /// Name of the list.
        name: String,
    },

    /// A mark or item does not belong to this list, or no longer exists.
    #[error("item is not a live element of list {list}")]
    InvalidMark {
        /// Name of the list the item was used with.
        list: String,
    },

    /// An item from one list was passed to an operation on another.
    #[error("cannot move an item of list {from} within list {to}")]
    InvalidMove {
        /// List that owns the item.
        from: String,
        /// List the move was attempted on.
        to: String,
    },

    /// A node record does not decode.
    #[error("node {key} is corrupt: {source}")]
    CorruptNode {
        /// Key of the corrupt node.
        key: NodeKey,
        /// Decoding failure.
        #[source]
        source: CodecError,
    },

    /// The list's metadata record is missing or does not decode.
    #[error("metadata of list {list} is corrupt: {message}")]
    CorruptMetadata {
        /// Name of the list.
        list: String,
        /// Description of the problem.
        message: String,
    },

    /// Links between nodes are inconsistent.
    #[error("broken chain in list {list}: {message}")]
    BrokenChain {
        /// Name of the list.
        list: String,
        /// Description of the inconsistency.
        message: String,
    },

    /// The underlying store failed.
    #[error("{op} failed: {source}")]
    Store {
        /// Operation that was running.
        op: &'static str,
        /// Store error.
        #[source]
        source: CoreError,
    },
}

impl ListError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a broken chain error.
    pub fn broken_chain(list: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrokenChain {
            list: list.into(),
            message: message.into(),
        }
    }

    /// Creates a corrupt metadata error.
    pub fn corrupt_metadata(list: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptMetadata {
            list: list.into(),
            message: message.into(),
        }
    }

    /// Names the operation a store error happened in.
    #[must_use]
    pub(crate) fn during(self, op: &'static str) -> Self {
        match self {
            Self::Store { source, .. } => Self::Store { op, source },
            other => other,
        }
    }

    /// Returns true if the error reports damaged persisted data.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::CorruptNode { .. } | Self::CorruptMetadata { .. } | Self::BrokenChain { .. } => {
                true
            }
            Self::Store { source, .. } => source.is_corruption(),
            _ => false,
        }
    }
}

impl From<CoreError> for ListError {
    fn from(source: CoreError) -> Self {
        Self::Store {
            op: "transaction",
            source,
        }
    }
}

impl From<CodecError> for ListError {
    fn from(source: CodecError) -> Self {
        CoreError::from(source).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn during_tags_store_errors_only() {
        let err = ListError::from(CoreError::DatabaseClosed).during("push_back");
        assert_eq!(err.to_string(), "push_back failed: database is closed");

        let err = ListError::EmptyList.during("move_to_front");
        assert!(matches!(err, ListError::EmptyList));
    }

    #[test]
    fn corruption_classification() {
        assert!(ListError::broken_chain("l", "cycle").is_corruption());
        assert!(ListError::from(CoreError::log_corruption(0, "x")).is_corruption());
        assert!(!ListError::EmptyList.is_corruption());
        assert!(!ListError::NotFound {
            key: NodeKey::from_sequence(1)
        }
        .is_corruption());
    }

    #[test]
    fn not_found_shows_hex_key() {
        let err = ListError::NotFound {
            key: NodeKey::from_sequence(0x2a),
        };
        assert_eq!(err.to_string(), "node 000000000000002a not found");
    }

    #[test]
    fn invalid_mark_covers_removed_items() {
        let err = ListError::InvalidMark { list: "tasks".into() };
        assert_eq!(err.to_string(), "item is not a live element of list tasks");
    }
}
