//! Block and run nodes of the document tree

use serde::{Deserialize, Serialize};

/// A text span inside a paragraph-like block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Span text
    pub text: String,
    /// Bold styling flag
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
}

impl Run {
    /// Plain text run
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    /// Bold text run
    #[inline]
    #[must_use]
    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

/// Declared layout width for embedded images, in inches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageWidth(pub f32);

/// Payload-free discriminant of a block's content
///
/// Used by mutation requests to pin down what kind of node the requester
/// expected at an anchor, so the executor can detect stale anchors before
/// touching the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Paragraph-like text block
    Paragraph,
    /// Heading-like block (appears in the outline)
    Heading,
    /// Table-like grid block
    Table,
    /// Non-text embedded block
    Image,
}

/// Content carried by a block node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockContent {
    /// Paragraph of ordered runs
    Paragraph {
        /// Ordered text spans
        runs: Vec<Run>,
    },
    /// Heading with an outline level
    Heading {
        /// Outline level, 1 = top
        level: u8,
        /// Ordered text spans
        runs: Vec<Run>,
    },
    /// Table as rows of cell text
    Table {
        /// Row-major cell grid
        rows: Vec<Vec<String>>,
    },
    /// Embedded image with a declared layout width
    Image {
        /// Layout width
        width: ImageWidth,
        /// Alternative text
        alt: String,
    },
}

impl BlockContent {
    /// Discriminant of this content
    #[inline]
    #[must_use]
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockContent::Paragraph { .. } => BlockKind::Paragraph,
            BlockContent::Heading { .. } => BlockKind::Heading,
            BlockContent::Table { .. } => BlockKind::Table,
            BlockContent::Image { .. } => BlockKind::Image,
        }
    }
}

/// A node in the document tree
///
/// Blocks form an ordered tree: each block carries its content plus an
/// ordered list of child blocks (sub-paragraphs under a heading, nested
/// content inside a table cell rendered flat, and so on).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Node content
    pub content: BlockContent,
    /// Ordered child blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl Block {
    /// Create a block with no children
    #[inline]
    #[must_use]
    pub fn new(content: BlockContent) -> Self {
        Self {
            content,
            children: Vec::new(),
        }
    }

    /// Paragraph block from plain text
    #[inline]
    #[must_use]
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockContent::Paragraph {
            runs: vec![Run::text(text)],
        })
    }

    /// Heading block from plain text
    #[inline]
    #[must_use]
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::new(BlockContent::Heading {
            level,
            runs: vec![Run::text(text)],
        })
    }

    /// Table block from a cell grid
    #[inline]
    #[must_use]
    pub fn table(rows: Vec<Vec<String>>) -> Self {
        Self::new(BlockContent::Table { rows })
    }

    /// Image block with a declared layout width
    #[inline]
    #[must_use]
    pub fn image(width: ImageWidth, alt: impl Into<String>) -> Self {
        Self::new(BlockContent::Image {
            width,
            alt: alt.into(),
        })
    }

    /// Attach children, returning the block
    #[inline]
    #[must_use]
    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.children = children;
        self
    }

    /// Discriminant of this block's content
    #[inline]
    #[must_use]
    pub fn kind(&self) -> BlockKind {
        self.content.kind()
    }

    /// Concatenated run text, empty for tables and images
    #[must_use]
    pub fn plain_text(&self) -> String {
        match &self.content {
            BlockContent::Paragraph { runs } | BlockContent::Heading { runs, .. } => {
                runs.iter().map(|r| r.text.as_str()).collect()
            }
            BlockContent::Table { .. } | BlockContent::Image { .. } => String::new(),
        }
    }
}
