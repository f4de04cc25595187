//! Draftflow Document - structured document model
//!
//! The document layer of the draftflow pipeline:
//! - Ordered tree of block nodes (paragraphs, headings, tables, images)
//! - Path-based anchors, recomputed on every resolution
//! - Outline extraction for stages and approval descriptions
//! - Mutation executor with stale-anchor detection
//! - Atomic JSON persistence with pre-mutation snapshots
//!
//! # Example
//!
//! ```rust
//! use draftflow_document::{apply, Anchor, Block, BlockKind, Document, Mutation, Placement};
//!
//! let doc = Document::from_blocks(vec![
//!     Block::heading(1, "Overview"),
//!     Block::paragraph("original"),
//! ]);
//! let mutation = Mutation::insert(
//!     Anchor::root_block(1),
//!     BlockKind::Paragraph,
//!     Placement::After,
//!     Block::paragraph("appended"),
//! );
//! let next = apply(&doc, &mutation).unwrap();
//! assert_eq!(next.blocks.len(), 3);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod anchor;
pub mod block;
pub mod document;
pub mod error;
pub mod mutation;
pub mod storage;

pub use anchor::{Anchor, AnchorParseError};
pub use block::{Block, BlockContent, BlockKind, ImageWidth, Run};
pub use document::{Document, OutlineEntry};
pub use error::DocumentError;
pub use mutation::{apply, Mutation, MutationOp, Placement};
pub use storage::{revision, DocumentRef, DocumentStorage, JsonDocumentStore};
