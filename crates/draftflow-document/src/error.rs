//! Error types for the document layer

use crate::anchor::Anchor;
use crate::block::BlockKind;

/// Errors raised by document resolution, mutation, and storage
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// An anchor path index was out of range against the current tree
    #[error("anchor {anchor} not found: index {index} out of range ({len} children)")]
    AnchorNotFound {
        /// The anchor that failed to resolve
        anchor: Anchor,
        /// The offending path segment
        index: usize,
        /// Child count at the failing level
        len: usize,
    },

    /// The resolved node's kind did not match what the requester expected
    ///
    /// Recoverable: the caller should refresh the outline and retry with a
    /// fresh anchor rather than guessing a substitute location.
    #[error("stale anchor {anchor}: expected {expected:?}, found {found:?}")]
    StaleAnchor {
        /// The anchor that resolved to the wrong kind of node
        anchor: Anchor,
        /// Kind the requester expected
        expected: BlockKind,
        /// Kind actually found
        found: BlockKind,
    },

    /// The operation cannot target the document root
    #[error("operation requires a non-root anchor")]
    RootAnchor,

    /// No document stored under the given reference
    #[error("document `{0}` not found")]
    NotFound(String),

    /// No snapshot retained for the given reference
    #[error("no snapshot retained for document `{0}`")]
    NoSnapshot(String),

    /// Backing store I/O failure
    #[error("document storage i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure
    #[error("document serialization: {0}")]
    Serde(#[from] serde_json::Error),
}
