//! External capability contracts
//!
//! Retrieval and generation are opaque collaborators: the pipeline core
//! defines only the narrow contracts it consumes. Generation may fail and
//! callers must treat that as recoverable; retrieval guarantees nothing
//! beyond descending score order.

use async_trait::async_trait;

/// A retrieved passage with provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    /// Passage text
    pub content: String,
    /// Source identifier (file, collection, url)
    pub source: String,
    /// Relevance score; results arrive in descending score order
    pub score: f32,
}

/// Relevance search over indexed content
#[async_trait]
pub trait RetrievalCapability: Send + Sync {
    /// Query for passages relevant to `text`, best first
    async fn query(&self, text: &str) -> Vec<Passage>;
}

/// Generation failure
///
/// Recoverable by contract: stage workers substitute fallback content
/// instead of propagating this upward.
#[derive(Debug, Clone, thiserror::Error)]
#[error("generation failed: {0}")]
pub struct GenerationError(pub String);

/// Opaque text-generation capability
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    /// Generate text for an instruction against accumulated context
    ///
    /// # Errors
    /// `GenerationError` when the underlying service fails; callers must
    /// recover locally.
    async fn generate(&self, context: &str, instruction: &str) -> Result<String, GenerationError>;
}
