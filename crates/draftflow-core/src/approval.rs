//! Approval checkpoint
//!
//! Suspends and resumes a thread around a pending document mutation. The
//! original coroutine-style interrupt is reframed as explicit persisted
//! state: `(pending_mutation, resume_point)` is committed before control
//! returns, and the resuming caller passes a thread id rather than relying
//! on any in-process continuation. Resume therefore works across a process
//! restart.

use crate::error::ApprovalError;
use chrono::Utc;
use draftflow_document::{apply, Anchor, Document, DocumentRef, DocumentStorage};
use draftflow_pipeline::{MutationRequest, RejectionRecord, StageOutput};
use draftflow_store::{ResumePoint, Thread, ThreadStatus, ThreadStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The approver's verdict on a pending mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Approve or reject
    pub approved: bool,
    /// Optional comment surfaced to the requesting stage on rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ApprovalDecision {
    /// Plain approval
    #[inline]
    #[must_use]
    pub fn approve() -> Self {
        Self {
            approved: true,
            comment: None,
        }
    }

    /// Rejection with an optional comment
    #[inline]
    #[must_use]
    pub fn reject(comment: Option<String>) -> Self {
        Self {
            approved: false,
            comment,
        }
    }
}

/// Wire shape of an approval request shown to the external approver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequestWire {
    /// Always `"approval_request"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Operation verb: insert, replace, or delete
    pub operation: String,
    /// Target anchor at request time
    pub target_anchor: Anchor,
    /// Full operation payload
    pub args: serde_json::Value,
    /// Human-readable description
    pub human_description: String,
}

impl ApprovalRequestWire {
    /// Build the wire shape for a mutation request
    #[must_use]
    pub fn from_request(request: &MutationRequest) -> Self {
        Self {
            kind: "approval_request".to_string(),
            operation: request.mutation.op.verb().to_string(),
            target_anchor: request.mutation.target_anchor.clone(),
            args: serde_json::to_value(&request.mutation.op).unwrap_or_default(),
            human_description: request.human_description.clone(),
        }
    }
}

/// Commit a transition, restoring the pre-mutation copy on failure
///
/// A failed write is treated as not having happened; retry is the caller's
/// responsibility.
pub(crate) fn commit_or_rollback(
    store: &ThreadStore,
    thread: &mut Thread,
    before: Thread,
) -> Result<(), draftflow_store::StoreError> {
    if let Err(err) = store.commit(thread) {
        *thread = before;
        return Err(err);
    }
    Ok(())
}

/// Suspend/resume gate around pending mutations
pub struct ApprovalCheckpoint {
    store: Arc<ThreadStore>,
    documents: Arc<dyn DocumentStorage>,
}

impl ApprovalCheckpoint {
    /// Create a checkpoint over the given store and document storage
    #[inline]
    #[must_use]
    pub fn new(store: Arc<ThreadStore>, documents: Arc<dyn DocumentStorage>) -> Self {
        Self { store, documents }
    }

    /// Suspend the thread on a mutation request
    ///
    /// Persists `(pending_mutation, resume_point)` and flips the thread to
    /// `AwaitingApproval` before returning the request's human description.
    /// No further pipeline progress occurs until the request is resolved.
    ///
    /// # Errors
    /// `ApprovalConflict` if a mutation is already pending; the existing one
    /// is untouched.
    pub fn request_mutation(
        &self,
        thread: &mut Thread,
        request: MutationRequest,
    ) -> Result<String, ApprovalError> {
        if thread.pending_mutation.is_some() {
            return Err(ApprovalError::ApprovalConflict { thread: thread.id });
        }

        let before = thread.clone();
        let description = request.human_description.clone();
        thread.resume_point = Some(ResumePoint {
            stage: request.requesting_stage.clone(),
        });
        tracing::info!(
            thread = %thread.id,
            stage = %request.requesting_stage,
            op = request.mutation.op.verb(),
            "suspending for approval"
        );
        thread.pending_mutation = Some(request);
        thread.status = ThreadStatus::AwaitingApproval;
        commit_or_rollback(&self.store, thread, before)?;
        Ok(description)
    }

    /// Resolve the pending mutation with an approval decision
    ///
    /// Approved: the mutation is applied atomically to the bound document
    /// (with a pre-mutation snapshot retained on the first mutation of the
    /// session), the requesting stage is marked complete, and the thread
    /// reactivates at its saved resume point. On any failure in this path,
    /// including a stale anchor, the thread is left suspended exactly as it
    /// was, so the caller can refresh and re-decide.
    ///
    /// Rejected: the mutation is discarded without touching the document, a
    /// rejection record is made visible to the requesting stage's context,
    /// and routing is steered *back* to that stage so it can react rather
    /// than being skipped.
    ///
    /// # Errors
    /// `NoPendingApproval` if the thread is not awaiting approval;
    /// `StaleAnchor`/storage errors from the approved path.
    pub fn resolve(
        &self,
        thread: &mut Thread,
        decision: &ApprovalDecision,
    ) -> Result<(), ApprovalError> {
        if thread.status != ThreadStatus::AwaitingApproval {
            return Err(ApprovalError::NoPendingApproval { thread: thread.id });
        }
        let before = thread.clone();
        let Some(request) = thread.pending_mutation.take() else {
            return Err(ApprovalError::NoPendingApproval { thread: thread.id });
        };
        thread.resume_point = None;
        thread.status = ThreadStatus::Active;

        let result = if decision.approved {
            self.apply_approved(thread, &request).map(Some)
        } else {
            tracing::info!(thread = %thread.id, stage = %request.requesting_stage, "mutation rejected");
            thread.rejections.push(RejectionRecord {
                stage: request.requesting_stage.clone(),
                description: request.human_description.clone(),
                comment: decision.comment.clone(),
                at: Utc::now(),
            });
            // Route back into the pipeline, not forward.
            thread.next_stage_hint = Some(request.requesting_stage.clone());
            Ok(None)
        };

        match result {
            Ok(applied) => {
                if let Err(err) = commit_or_rollback(&self.store, thread, before) {
                    // The thread is back in its suspended state; the
                    // document must follow, or a retried approval would
                    // apply the same mutation twice.
                    if let Some((doc_ref, previous)) = applied {
                        if let Err(doc_err) = self.documents.save(&doc_ref, &previous) {
                            tracing::error!(
                                thread = %thread.id,
                                doc = %doc_ref,
                                error = %doc_err,
                                "document rollback failed after commit failure"
                            );
                        }
                    }
                    return Err(err.into());
                }
                Ok(())
            }
            Err(err) => {
                *thread = before;
                Err(err)
            }
        }
    }

    /// Apply the mutation and record the completion on the thread
    ///
    /// Returns the document reference and its pre-mutation version so the
    /// caller can undo the document write if the thread transition fails to
    /// persist.
    fn apply_approved(
        &self,
        thread: &mut Thread,
        request: &MutationRequest,
    ) -> Result<(DocumentRef, Document), ApprovalError> {
        let doc_ref = thread
            .document_ref
            .clone()
            .ok_or(ApprovalError::NoDocument { thread: thread.id })?;

        let doc = self.documents.load(&doc_ref)?;
        self.documents.ensure_snapshot(&doc_ref)?;
        let next = apply(&doc, &request.mutation)?;
        self.documents.save(&doc_ref, &next)?;

        let stage = request.requesting_stage.clone();
        thread.tracker.mark_complete(&stage)?;
        thread.outputs.insert(
            stage.clone(),
            StageOutput::ok(
                stage.clone(),
                format!("Applied approved document change: {}", request.human_description),
                vec![doc_ref.to_string()],
            ),
        );
        tracing::info!(thread = %thread.id, stage = %stage, doc = %doc_ref, "approved mutation applied");
        Ok((doc_ref, doc))
    }

    /// Abort the thread
    ///
    /// Handled identically to a rejection with respect to the pending
    /// mutation (released without touching the document), but the thread
    /// is marked inactive and dispatches nothing further.
    ///
    /// # Errors
    /// Persistence failure; the thread state is then unchanged.
    pub fn abort(&self, thread: &mut Thread) -> Result<(), ApprovalError> {
        let before = thread.clone();
        if let Some(request) = thread.pending_mutation.take() {
            thread.rejections.push(RejectionRecord {
                stage: request.requesting_stage.clone(),
                description: request.human_description.clone(),
                comment: Some("aborted".to_string()),
                at: Utc::now(),
            });
        }
        thread.resume_point = None;
        thread.next_stage_hint = None;
        thread.status = ThreadStatus::Expired;
        commit_or_rollback(&self.store, thread, before)?;
        tracing::info!(thread = %thread.id, "thread aborted");
        Ok(())
    }
}
