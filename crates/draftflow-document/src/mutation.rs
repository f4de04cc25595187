//! Mutation executor
//!
//! Applies a single proposed change at a resolved anchor. The executor is a
//! pure function over the document value; atomicity against the backing
//! store is the storage layer's job (`save` commits the full new tree or
//! nothing).
//!
//! Before touching the tree, the executor verifies that the node the anchor
//! resolves to *now* has the kind the requester saw when it built the
//! request. A mismatch raises `StaleAnchor` instead of corrupting the
//! document.

use crate::anchor::Anchor;
use crate::block::{Block, BlockKind, ImageWidth};
use crate::document::Document;
use crate::error::DocumentError;
use serde::{Deserialize, Serialize};

/// Where an inserted sibling lands relative to the anchored node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Insert immediately before the anchored node
    Before,
    /// Insert immediately after the anchored node
    After,
}

/// A single proposed change at an anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "operation")]
pub enum MutationOp {
    /// Add a new sibling adjacent to the resolved node
    Insert {
        /// Before or after the anchor
        placement: Placement,
        /// The block to insert
        block: Block,
    },
    /// Overwrite the resolved node in place
    Replace {
        /// The replacement block
        block: Block,
    },
    /// Remove the node, collapsing its parent's child list
    Delete,
}

impl MutationOp {
    /// Short verb for logs and human descriptions
    #[inline]
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            MutationOp::Insert { .. } => "insert",
            MutationOp::Replace { .. } => "replace",
            MutationOp::Delete => "delete",
        }
    }
}

/// A change bound to an anchor, with the requester's view of the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Path to the target node
    pub target_anchor: Anchor,
    /// Kind the requester observed at the anchor when building the request
    pub expected_kind: BlockKind,
    /// The proposed operation
    pub op: MutationOp,
}

impl Mutation {
    /// Insert a sibling block adjacent to the anchor
    #[inline]
    #[must_use]
    pub fn insert(
        target_anchor: Anchor,
        expected_kind: BlockKind,
        placement: Placement,
        block: Block,
    ) -> Self {
        Self {
            target_anchor,
            expected_kind,
            op: MutationOp::Insert { placement, block },
        }
    }

    /// Replace the anchored node
    #[inline]
    #[must_use]
    pub fn replace(target_anchor: Anchor, expected_kind: BlockKind, block: Block) -> Self {
        Self {
            target_anchor,
            expected_kind,
            op: MutationOp::Replace { block },
        }
    }

    /// Delete the anchored node
    #[inline]
    #[must_use]
    pub fn delete(target_anchor: Anchor, expected_kind: BlockKind) -> Self {
        Self {
            target_anchor,
            expected_kind,
            op: MutationOp::Delete,
        }
    }

    /// Embed an image with a declared layout width
    ///
    /// `placement = None` replaces the anchored node; otherwise the image is
    /// inserted before or after it.
    #[must_use]
    pub fn embed_image(
        target_anchor: Anchor,
        expected_kind: BlockKind,
        width: ImageWidth,
        alt: impl Into<String>,
        placement: Option<Placement>,
    ) -> Self {
        let image = Block::image(width, alt);
        match placement {
            Some(placement) => Self::insert(target_anchor, expected_kind, placement, image),
            None => Self::replace(target_anchor, expected_kind, image),
        }
    }
}

/// Apply a mutation, producing the new document
///
/// No index bookkeeping is persisted after an insert or delete; anchors held
/// elsewhere are simply recomputed on their next resolution.
///
/// # Errors
/// - `AnchorNotFound` if the path is out of range against the current tree
/// - `StaleAnchor` if the resolved node's kind differs from `expected_kind`
pub fn apply(doc: &Document, mutation: &Mutation) -> Result<Document, DocumentError> {
    let found = doc.resolve(&mutation.target_anchor)?.kind();
    if found != mutation.expected_kind {
        return Err(DocumentError::StaleAnchor {
            anchor: mutation.target_anchor.clone(),
            expected: mutation.expected_kind,
            found,
        });
    }

    let mut next = doc.clone();
    let (siblings, index) = next.resolve_siblings_mut(&mutation.target_anchor)?;
    match &mutation.op {
        MutationOp::Insert { placement, block } => {
            let at = match placement {
                Placement::Before => index,
                Placement::After => index + 1,
            };
            siblings.insert(at, block.clone());
        }
        MutationOp::Replace { block } => {
            siblings[index] = block.clone();
        }
        MutationOp::Delete => {
            siblings.remove(index);
        }
    }

    tracing::debug!(
        anchor = %mutation.target_anchor,
        op = mutation.op.verb(),
        "applied document mutation"
    );
    Ok(next)
}
