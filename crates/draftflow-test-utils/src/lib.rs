//! Shared test doubles for the draftflow workspace
//!
//! Deterministic in-memory stand-ins for the pieces that touch disk or
//! external services: a document store, retrieval/generation capabilities,
//! and scripted stage workers. Used by integration tests across crates.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

use async_trait::async_trait;
use draftflow_document::{
    Anchor, Block, BlockKind, Document, DocumentError, DocumentRef, DocumentStorage, Mutation,
    Placement,
};
use draftflow_pipeline::{
    GenerationCapability, GenerationError, MutationRequest, Passage, RetrievalCapability,
    StageContext, StageId, StageOutcome, StageOutput,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory document store with snapshot support
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<DocumentRef, Document>>,
    snapshots: Mutex<HashMap<DocumentRef, Document>>,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one document
    #[must_use]
    pub fn with_document(doc_ref: DocumentRef, doc: Document) -> Self {
        let store = Self::new();
        store.docs.lock().insert(doc_ref, doc);
        store
    }

    /// Whether a snapshot is currently retained
    #[must_use]
    pub fn has_snapshot(&self, doc_ref: &DocumentRef) -> bool {
        self.snapshots.lock().contains_key(doc_ref)
    }
}

impl DocumentStorage for MemoryDocumentStore {
    fn load(&self, doc_ref: &DocumentRef) -> Result<Document, DocumentError> {
        self.docs
            .lock()
            .get(doc_ref)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(doc_ref.to_string()))
    }

    fn save(&self, doc_ref: &DocumentRef, doc: &Document) -> Result<(), DocumentError> {
        self.docs.lock().insert(doc_ref.clone(), doc.clone());
        Ok(())
    }

    fn ensure_snapshot(&self, doc_ref: &DocumentRef) -> Result<(), DocumentError> {
        let mut snapshots = self.snapshots.lock();
        if snapshots.contains_key(doc_ref) {
            return Ok(());
        }
        let current = self
            .docs
            .lock()
            .get(doc_ref)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(doc_ref.to_string()))?;
        snapshots.insert(doc_ref.clone(), current);
        Ok(())
    }

    fn restore_snapshot(&self, doc_ref: &DocumentRef) -> Result<Document, DocumentError> {
        let snapshot = self
            .snapshots
            .lock()
            .get(doc_ref)
            .cloned()
            .ok_or_else(|| DocumentError::NoSnapshot(doc_ref.to_string()))?;
        self.docs.lock().insert(doc_ref.clone(), snapshot.clone());
        Ok(snapshot)
    }

    fn clear_snapshot(&self, doc_ref: &DocumentRef) -> Result<(), DocumentError> {
        self.snapshots.lock().remove(doc_ref);
        Ok(())
    }
}

/// Retrieval that always returns the same passages
#[derive(Debug, Default)]
pub struct StaticRetrieval {
    passages: Vec<Passage>,
}

impl StaticRetrieval {
    #[must_use]
    pub fn new(passages: Vec<Passage>) -> Self {
        Self { passages }
    }

    /// One passage per text, sourced `kb`, score 1.0
    #[must_use]
    pub fn of(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| Passage {
                    content: (*t).to_string(),
                    source: "kb".to_string(),
                    score: 1.0,
                })
                .collect(),
        )
    }
}

#[async_trait]
impl RetrievalCapability for StaticRetrieval {
    async fn query(&self, _text: &str) -> Vec<Passage> {
        self.passages.clone()
    }
}

/// Generation that echoes the instruction with a fixed prefix
#[derive(Debug)]
pub struct StaticGeneration {
    prefix: String,
}

impl StaticGeneration {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for StaticGeneration {
    fn default() -> Self {
        Self::new("generated")
    }
}

#[async_trait]
impl GenerationCapability for StaticGeneration {
    async fn generate(&self, _context: &str, instruction: &str) -> Result<String, GenerationError> {
        Ok(format!("{}: {instruction}", self.prefix))
    }
}

/// Generation that always fails, for degraded-fallback tests
#[derive(Debug, Default)]
pub struct FailingGeneration;

#[async_trait]
impl GenerationCapability for FailingGeneration {
    async fn generate(
        &self,
        _context: &str,
        _instruction: &str,
    ) -> Result<String, GenerationError> {
        Err(GenerationError("model unavailable".to_string()))
    }
}

/// Stage that returns canned content and counts its dispatches
#[derive(Debug)]
pub struct ScriptedStage {
    id: StageId,
    content: String,
    calls: AtomicUsize,
}

impl ScriptedStage {
    #[must_use]
    pub fn new(id: StageId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times this stage was dispatched
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl draftflow_pipeline::StageWorker for ScriptedStage {
    fn stage_id(&self) -> StageId {
        self.id.clone()
    }

    async fn produce(&self, _ctx: &StageContext<'_>) -> StageOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StageOutcome::Content(StageOutput::ok(self.id.clone(), self.content.clone(), vec![]))
    }
}

/// Stage that proposes one mutation, then reacts to its fate
///
/// First dispatch returns a mutation request. A later dispatch produces
/// content: if a rejection addressed to this stage is visible in context,
/// the content acknowledges the rejection instead of retrying the mutation.
#[derive(Debug)]
pub struct MutateOnceStage {
    id: StageId,
    mutation: Mutation,
    description: String,
    proposed: AtomicUsize,
}

impl MutateOnceStage {
    #[must_use]
    pub fn new(id: StageId, mutation: Mutation, description: impl Into<String>) -> Self {
        Self {
            id,
            mutation,
            description: description.into(),
            proposed: AtomicUsize::new(0),
        }
    }

    /// Stage proposing to append a paragraph after the document's first block
    #[must_use]
    pub fn appending_paragraph(id: StageId, text: &str) -> Self {
        let mutation = Mutation::insert(
            Anchor::root_block(0),
            BlockKind::Heading,
            Placement::After,
            Block::paragraph(text),
        );
        Self::new(
            id,
            mutation,
            format!("Insert paragraph \"{text}\" after the title"),
        )
    }
}

#[async_trait]
impl draftflow_pipeline::StageWorker for MutateOnceStage {
    fn stage_id(&self) -> StageId {
        self.id.clone()
    }

    async fn produce(&self, ctx: &StageContext<'_>) -> StageOutcome {
        let rejected = ctx.rejections_for(&self.id).next().is_some();
        if rejected {
            let comment = ctx
                .rejections_for(&self.id)
                .filter_map(|r| r.comment.as_deref())
                .last()
                .unwrap_or("no comment");
            return StageOutcome::Content(StageOutput::ok(
                self.id.clone(),
                format!("Change withdrawn after rejection: {comment}"),
                vec![],
            ));
        }
        if self.proposed.fetch_add(1, Ordering::SeqCst) == 0 {
            return StageOutcome::Mutation(MutationRequest::new(
                self.mutation.clone(),
                self.id.clone(),
                self.description.clone(),
            ));
        }
        StageOutcome::Content(StageOutput::ok(self.id.clone(), "no further changes", vec![]))
    }
}

/// Three-block sample document: heading, paragraph, paragraph
#[must_use]
pub fn sample_document() -> Document {
    Document::from_blocks(vec![
        Block::heading(1, "Proposal"),
        Block::paragraph("Executive summary."),
        Block::paragraph("Closing remarks."),
    ])
}
