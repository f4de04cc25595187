//! Orchestrator configuration and stage registration
//!
//! Pipelines are configured with an ordered list of stage ids and worker
//! bindings at construction time; this configuration is immutable for the
//! life of a thread. Configuration is explicit and threaded through
//! constructors; there is no module-level state.

use draftflow_document::DocumentRef;
use draftflow_pipeline::{StageId, StageWorker};
use indexmap::IndexMap;
use std::sync::Arc;

/// Ordered stage-id → worker bindings
#[derive(Clone, Default)]
pub struct StageRegistry {
    workers: IndexMap<StageId, Arc<dyn StageWorker>>,
}

impl StageRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker, preserving registration order
    #[must_use]
    pub fn register(mut self, worker: Arc<dyn StageWorker>) -> Self {
        self.workers.insert(worker.stage_id(), worker);
        self
    }

    /// Registered stage ids, in order
    #[must_use]
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.workers.keys().cloned().collect()
    }

    /// Worker bound to a stage
    #[inline]
    #[must_use]
    pub fn worker(&self, stage_id: &StageId) -> Option<&Arc<dyn StageWorker>> {
        self.workers.get(stage_id)
    }

    /// Number of registered stages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether no stages are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.stage_ids())
            .finish()
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Document new threads bind their mutations to, if any
    pub document_ref: Option<DocumentRef>,
    /// Maximum router cycles per external request
    pub max_cycles: usize,
}

impl OrchestratorConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a bound document
    #[inline]
    #[must_use]
    pub fn with_document(mut self, doc_ref: DocumentRef) -> Self {
        self.document_ref = Some(doc_ref);
        self
    }

    /// With a cycle budget
    #[inline]
    #[must_use]
    pub fn with_max_cycles(mut self, max: usize) -> Self {
        self.max_cycles = max;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            document_ref: None,
            max_cycles: 32,
        }
    }
}
