//! Pipeline orchestrator
//!
//! Drives one thread at a time through the route/dispatch cycle:
//! - Resolves the conversation to its thread and takes the per-thread
//!   writer lock for the whole request
//! - Routes with the supervisor decision table, dispatches the selected
//!   stage worker, and commits after every completed stage
//! - Suspends at the approval checkpoint when a worker proposes a document
//!   mutation, and resumes from persisted state on the approver's decision
//! - Composes the final markdown document when routing terminates

use crate::approval::{
    commit_or_rollback, ApprovalCheckpoint, ApprovalDecision, ApprovalRequestWire,
};
use crate::compose::compose_final;
use crate::config::{OrchestratorConfig, StageRegistry};
use crate::error::OrchestratorError;
use draftflow_document::{DocumentStorage, OutlineEntry};
use draftflow_pipeline::{
    route, CompletionTracker, GenerationCapability, RetrievalCapability, RouterDecision,
    RouterInput, StageContext, StageOutcome,
};
use draftflow_store::{ConversationId, Thread, ThreadId, ThreadStatus, ThreadStore};
use std::sync::Arc;

/// How a request cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// All stages complete; the assembled document is attached
    Completed {
        /// The finished thread
        thread: ThreadId,
        /// Final markdown document
        document: String,
    },
    /// The thread is suspended on a pending document mutation
    AwaitingApproval {
        /// The suspended thread
        thread: ThreadId,
        /// Approval request to surface to the approver
        request: ApprovalRequestWire,
    },
}

/// Approval-gated content assembly pipeline
pub struct Orchestrator {
    registry: StageRegistry,
    store: Arc<ThreadStore>,
    documents: Arc<dyn DocumentStorage>,
    retrieval: Arc<dyn RetrievalCapability>,
    generation: Arc<dyn GenerationCapability>,
    checkpoint: ApprovalCheckpoint,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Assemble an orchestrator from its parts
    #[must_use]
    pub fn new(
        registry: StageRegistry,
        store: Arc<ThreadStore>,
        documents: Arc<dyn DocumentStorage>,
        retrieval: Arc<dyn RetrievalCapability>,
        generation: Arc<dyn GenerationCapability>,
        config: OrchestratorConfig,
    ) -> Self {
        let checkpoint = ApprovalCheckpoint::new(Arc::clone(&store), Arc::clone(&documents));
        Self {
            registry,
            store,
            documents,
            retrieval,
            generation,
            checkpoint,
            config,
        }
    }

    /// Thread store backing this orchestrator
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<ThreadStore> {
        &self.store
    }

    /// Handle an external request on a conversation
    ///
    /// The conversation maps 1:1 to a thread: a repeated request on the same
    /// conversation continues the existing thread rather than starting a new
    /// one. A thread already suspended for approval makes no progress and
    /// returns its pending request again.
    ///
    /// # Errors
    /// `ThreadInactive` for aborted threads, plus routing, worker, and
    /// persistence failures.
    pub async fn handle_request(
        &self,
        conversation_id: &ConversationId,
        request: &str,
    ) -> Result<RunOutcome, OrchestratorError> {
        let id = self.store.get_or_create(conversation_id, |id| {
            let tracker = CompletionTracker::with_stages(self.registry.stage_ids());
            let mut thread = Thread::new(id, conversation_id.clone(), request, tracker);
            if let Some(doc_ref) = &self.config.document_ref {
                thread = thread.with_document(doc_ref.clone());
            }
            thread
        })?;
        let mut guard = self.store.lock(id).await?;
        self.run_loop(&mut guard).await
    }

    /// Resume a suspended thread with an approval decision
    ///
    /// Works across a process restart: the thread id is enough, no
    /// in-process continuation is involved.
    ///
    /// # Errors
    /// `ThreadNotFound` if the thread expired, `NoPendingApproval` if it was
    /// not suspended, plus anything `handle_request` can raise.
    pub async fn resume(
        &self,
        thread_id: ThreadId,
        decision: &ApprovalDecision,
    ) -> Result<RunOutcome, OrchestratorError> {
        let mut guard = self.store.lock(thread_id).await?;
        self.checkpoint.resolve(&mut guard, decision)?;
        self.run_loop(&mut guard).await
    }

    /// Abort a thread, releasing any pending mutation without applying it
    ///
    /// # Errors
    /// `ThreadNotFound` or persistence failure.
    pub async fn abort(&self, thread_id: ThreadId) -> Result<(), OrchestratorError> {
        let mut guard = self.store.lock(thread_id).await?;
        self.checkpoint.abort(&mut guard)?;
        Ok(())
    }

    /// Purge threads idle past the store's configured timeout
    ///
    /// Threads awaiting approval get the configured grace window on top.
    ///
    /// # Errors
    /// I/O failure removing persisted thread state.
    pub async fn sweep_expired(&self) -> Result<Vec<ThreadId>, OrchestratorError> {
        let timeout = self.store.config().inactivity_timeout;
        Ok(self.store.expire_inactive(timeout).await?)
    }

    async fn run_loop(&self, thread: &mut Thread) -> Result<RunOutcome, OrchestratorError> {
        match thread.status {
            ThreadStatus::Expired => return Err(OrchestratorError::ThreadInactive(thread.id)),
            ThreadStatus::AwaitingApproval => {
                // Suspended: no progress until the pending request resolves,
                // but polling refreshes the thread's activity clock.
                let before = thread.clone();
                commit_or_rollback(&self.store, thread, before)?;
                return self.pending_outcome(thread);
            }
            ThreadStatus::Completed => {
                return Ok(self.completed_outcome(thread));
            }
            ThreadStatus::Active => {}
        }

        for cycle in 0..self.config.max_cycles {
            let decision = route(RouterInput {
                tracker: &thread.tracker,
                hint: thread.next_stage_hint.as_ref(),
                last_output: thread.last_output(),
            })?;

            match decision {
                RouterDecision::Terminate => {
                    let before = thread.clone();
                    thread.status = ThreadStatus::Completed;
                    commit_or_rollback(&self.store, thread, before)?;
                    tracing::info!(thread = %thread.id, cycles = cycle, "pipeline complete");
                    return Ok(self.completed_outcome(thread));
                }
                RouterDecision::Dispatch { stage, rule } => {
                    // A hint dispatches at most once.
                    thread.next_stage_hint = None;
                    let worker = self
                        .registry
                        .worker(&stage)
                        .ok_or_else(|| OrchestratorError::MissingWorker(stage.clone()))?;
                    tracing::debug!(thread = %thread.id, stage = %stage, rule = ?rule, "dispatching");

                    let outline = self.load_outline(thread);
                    let outcome = {
                        let ctx = StageContext {
                            request: &thread.request,
                            outputs: &thread.outputs,
                            rejections: &thread.rejections,
                            outline: &outline,
                            retrieval: self.retrieval.as_ref(),
                            generation: self.generation.as_ref(),
                        };
                        worker.produce(&ctx).await
                    };

                    match outcome {
                        StageOutcome::Content(output) => {
                            let before = thread.clone();
                            thread.tracker.mark_complete(&output.stage_id)?;
                            thread.outputs.insert(output.stage_id.clone(), output);
                            commit_or_rollback(&self.store, thread, before)?;
                        }
                        StageOutcome::Mutation(request) => {
                            let wire = ApprovalRequestWire::from_request(&request);
                            self.checkpoint.request_mutation(thread, request)?;
                            return Ok(RunOutcome::AwaitingApproval {
                                thread: thread.id,
                                request: wire,
                            });
                        }
                    }
                }
            }
        }
        Err(OrchestratorError::CycleBudgetExceeded {
            thread: thread.id,
            budget: self.config.max_cycles,
        })
    }

    fn pending_outcome(&self, thread: &Thread) -> Result<RunOutcome, OrchestratorError> {
        let request = thread
            .pending_mutation
            .as_ref()
            .map(ApprovalRequestWire::from_request)
            .ok_or(draftflow_store::StoreError::InvariantViolation {
                thread: thread.id,
                detail: "awaiting approval without a pending mutation".to_string(),
            })?;
        Ok(RunOutcome::AwaitingApproval {
            thread: thread.id,
            request,
        })
    }

    fn completed_outcome(&self, thread: &Thread) -> RunOutcome {
        let document = compose_final(&thread.request, thread.tracker.registered(), &thread.outputs);
        RunOutcome::Completed {
            thread: thread.id,
            document,
        }
    }

    /// Outline of the bound document, if any
    ///
    /// A missing or unreadable document degrades to an empty outline rather
    /// than failing the dispatch; only mutations require the document.
    fn load_outline(&self, thread: &Thread) -> Vec<OutlineEntry> {
        let Some(doc_ref) = &thread.document_ref else {
            return Vec::new();
        };
        match self.documents.load(doc_ref) {
            Ok(doc) => doc.outline(),
            Err(err) => {
                tracing::warn!(thread = %thread.id, doc = %doc_ref, error = %err, "outline unavailable");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
