//! Anchors for addressing nodes within a document tree
//!
//! Provides [`Anchor`] for path-based addressing of blocks. An anchor is an
//! ordered list of child indices from the document root, optionally plus a
//! text offset into the addressed node.
//!
//! Anchors are *not* stable identities. They are recomputed by walking the
//! current tree every time they are resolved, so the same path can address a
//! different node after a sibling edit.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Index path into a document tree
///
/// # Examples
/// - `[0, 2]` → third child of the first root block, rendered `0.2`
/// - `[1]` with offset 4 → second root block, text offset 4, rendered `1@4`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Anchor {
    path: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    offset: Option<usize>,
}

impl Anchor {
    /// Create an anchor from child indices
    #[inline]
    #[must_use]
    pub fn new(path: Vec<usize>) -> Self {
        Self { path, offset: None }
    }

    /// Anchor addressing a single root-level block
    #[inline]
    #[must_use]
    pub fn root_block(index: usize) -> Self {
        Self::new(vec![index])
    }

    /// Attach a text offset
    #[inline]
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Path segments from root to target
    #[inline]
    #[must_use]
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Optional text offset into the target node
    #[inline]
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Number of path segments
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Whether the anchor addresses the document root itself
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Anchor of the parent node, if any
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            None
        } else {
            Some(Self::new(self.path[..self.path.len() - 1].to_vec()))
        }
    }

    /// Index of the target within its parent, if any
    #[inline]
    #[must_use]
    pub fn last_index(&self) -> Option<usize> {
        self.path.last().copied()
    }

    /// Append a child index, returning a new anchor
    #[inline]
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        Self::new(path)
    }

    /// Check whether this anchor is a strict ancestor of another
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.path.len() < other.path.len() && other.path[..self.path.len()] == self.path[..]
    }
}

impl Display for Anchor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let segs: Vec<String> = self.path.iter().map(usize::to_string).collect();
        write!(f, "{}", segs.join("."))?;
        if let Some(off) = self.offset {
            write!(f, "@{off}")?;
        }
        Ok(())
    }
}

/// Anchor parse failure
#[derive(Debug, thiserror::Error)]
#[error("invalid anchor `{input}`")]
pub struct AnchorParseError {
    /// The rejected input
    pub input: String,
}

impl FromStr for Anchor {
    type Err = AnchorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AnchorParseError {
            input: s.to_string(),
        };
        let (path_part, offset) = match s.split_once('@') {
            Some((p, o)) => (p, Some(o.parse::<usize>().map_err(|_| err())?)),
            None => (s, None),
        };
        let mut path = Vec::new();
        if !path_part.is_empty() {
            for seg in path_part.split('.') {
                path.push(seg.parse::<usize>().map_err(|_| err())?);
            }
        }
        Ok(Self { path, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_display_round_trip() {
        let anchor = Anchor::new(vec![0, 2, 1]);
        assert_eq!(anchor.to_string(), "0.2.1");
        assert_eq!("0.2.1".parse::<Anchor>().unwrap(), anchor);

        let with_offset = Anchor::new(vec![3]).with_offset(12);
        assert_eq!(with_offset.to_string(), "3@12");
        assert_eq!("3@12".parse::<Anchor>().unwrap(), with_offset);
    }

    #[test]
    fn anchor_parent_and_child() {
        let anchor = Anchor::new(vec![0, 2]);
        assert_eq!(anchor.parent(), Some(Anchor::root_block(0)));
        assert_eq!(anchor.child(5).path(), &[0, 2, 5]);
        assert_eq!(anchor.last_index(), Some(2));
        assert!(Anchor::new(vec![]).parent().is_none());
    }

    #[test]
    fn anchor_ancestry() {
        let top = Anchor::root_block(1);
        let deep = Anchor::new(vec![1, 0, 3]);
        assert!(top.is_ancestor_of(&deep));
        assert!(!deep.is_ancestor_of(&top));
        assert!(!top.is_ancestor_of(&top));
    }

    #[test]
    fn anchor_rejects_garbage() {
        assert!("a.b".parse::<Anchor>().is_err());
        assert!("1.2@x".parse::<Anchor>().is_err());
    }
}
