//! Document tree, lazy anchor resolution, and outline extraction
//!
//! Anchors are resolved against the *current* tree on every call. Resolving
//! the same path before and after a sibling insertion can legitimately yield
//! a different node; nothing here caches or renumbers indices.

use crate::anchor::Anchor;
use crate::block::{Block, BlockContent};
use crate::error::DocumentError;
use serde::{Deserialize, Serialize};

/// Ordered tree of block nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Root-level blocks in document order
    pub blocks: Vec<Block>,
}

/// A heading-like node surfaced by [`Document::outline`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineEntry {
    /// Path to the heading at the time the outline was taken
    pub anchor: Anchor,
    /// Heading text
    pub label: String,
    /// Heading level, 1 = top
    pub level: u8,
}

impl Document {
    /// Empty document
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Document from root-level blocks
    #[inline]
    #[must_use]
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Whether the document has no blocks
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Resolve an anchor against the current tree
    ///
    /// # Errors
    /// `DocumentError::AnchorNotFound` if any path index is out of range,
    /// `DocumentError::RootAnchor` for the empty path.
    pub fn resolve(&self, anchor: &Anchor) -> Result<&Block, DocumentError> {
        let mut segments = anchor.path().iter();
        let first = *segments.next().ok_or(DocumentError::RootAnchor)?;
        let mut node = self.blocks.get(first).ok_or(DocumentError::AnchorNotFound {
            anchor: anchor.clone(),
            index: first,
            len: self.blocks.len(),
        })?;
        for &index in segments {
            node = node
                .children
                .get(index)
                .ok_or(DocumentError::AnchorNotFound {
                    anchor: anchor.clone(),
                    index,
                    len: node.children.len(),
                })?;
        }
        Ok(node)
    }

    /// Resolve the child list that contains the anchored node
    ///
    /// Returns the sibling vector plus the target's index within it. Used by
    /// the mutation executor for insert and delete.
    pub(crate) fn resolve_siblings_mut(
        &mut self,
        anchor: &Anchor,
    ) -> Result<(&mut Vec<Block>, usize), DocumentError> {
        let target = anchor.last_index().ok_or(DocumentError::RootAnchor)?;
        let parent = anchor.parent().ok_or(DocumentError::RootAnchor)?;

        let siblings: &mut Vec<Block> = if parent.is_root() {
            &mut self.blocks
        } else {
            let mut segments = parent.path().iter();
            let first = *segments.next().ok_or(DocumentError::RootAnchor)?;
            let len = self.blocks.len();
            let mut node = self
                .blocks
                .get_mut(first)
                .ok_or(DocumentError::AnchorNotFound {
                    anchor: anchor.clone(),
                    index: first,
                    len,
                })?;
            for &index in segments {
                let len = node.children.len();
                node = node
                    .children
                    .get_mut(index)
                    .ok_or(DocumentError::AnchorNotFound {
                        anchor: anchor.clone(),
                        index,
                        len,
                    })?;
            }
            &mut node.children
        };

        if target >= siblings.len() {
            let len = siblings.len();
            return Err(DocumentError::AnchorNotFound {
                anchor: anchor.clone(),
                index: target,
                len,
            });
        }
        Ok((siblings, target))
    }

    /// Flatten heading-like nodes with their paths
    ///
    /// Stages and approval descriptions reference locations through this
    /// outline; entries carry anchors valid against the tree as it is *now*.
    #[must_use]
    pub fn outline(&self) -> Vec<OutlineEntry> {
        let mut entries = Vec::new();
        collect_headings(&self.blocks, &Anchor::new(Vec::new()), &mut entries);
        entries
    }
}

fn collect_headings(blocks: &[Block], base: &Anchor, out: &mut Vec<OutlineEntry>) {
    for (index, block) in blocks.iter().enumerate() {
        let anchor = base.child(index);
        if let BlockContent::Heading { level, .. } = &block.content {
            out.push(OutlineEntry {
                anchor: anchor.clone(),
                label: block.plain_text(),
                level: *level,
            });
        }
        collect_headings(&block.children, &anchor, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;

    fn sample() -> Document {
        Document::from_blocks(vec![
            Block::heading(1, "Overview").with_children(vec![
                Block::paragraph("intro"),
                Block::paragraph("scope"),
                Block::table(vec![vec!["a".into(), "b".into()]]),
            ]),
            Block::heading(1, "Pricing").with_children(vec![Block::paragraph("rates")]),
        ])
    }

    #[test]
    fn resolve_walks_nested_path() {
        let doc = sample();
        let node = doc.resolve(&Anchor::new(vec![0, 2])).unwrap();
        assert_eq!(node.kind(), BlockKind::Table);

        let node = doc.resolve(&Anchor::new(vec![1, 0])).unwrap();
        assert_eq!(node.plain_text(), "rates");
    }

    #[test]
    fn resolve_out_of_range_is_anchor_not_found() {
        let doc = sample();
        let err = doc.resolve(&Anchor::new(vec![0, 9])).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::AnchorNotFound { index: 9, len: 3, .. }
        ));

        let err = doc.resolve(&Anchor::new(vec![5])).unwrap_err();
        assert!(matches!(err, DocumentError::AnchorNotFound { index: 5, .. }));
    }

    #[test]
    fn resolve_root_is_rejected() {
        let doc = sample();
        assert!(matches!(
            doc.resolve(&Anchor::new(vec![])),
            Err(DocumentError::RootAnchor)
        ));
    }

    #[test]
    fn outline_flattens_headings_with_paths() {
        let doc = Document::from_blocks(vec![
            Block::heading(1, "Top").with_children(vec![
                Block::paragraph("text"),
                Block::heading(2, "Nested"),
            ]),
            Block::paragraph("loose"),
            Block::heading(1, "Second"),
        ]);
        let outline = doc.outline();
        assert_eq!(outline.len(), 3);
        assert_eq!(outline[0].label, "Top");
        assert_eq!(outline[1].anchor, Anchor::new(vec![0, 1]));
        assert_eq!(outline[1].level, 2);
        assert_eq!(outline[2].anchor, Anchor::root_block(2));
    }
}
