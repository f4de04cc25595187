//! Error types for the orchestration layer

use draftflow_document::DocumentError;
use draftflow_pipeline::{RouterError, StageId, TrackerError};
use draftflow_store::{StoreError, ThreadId};

/// Approval checkpoint errors
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A second write intent arrived while one was pending
    ///
    /// The existing pending mutation is untouched; second intents are
    /// rejected, never queued or silently overwritten.
    #[error("a mutation is already pending approval on thread `{thread}`")]
    ApprovalConflict {
        /// The suspended thread
        thread: ThreadId,
    },

    /// Resume arrived without a prior suspended mutation
    #[error("thread `{thread}` has no pending approval")]
    NoPendingApproval {
        /// The targeted thread
        thread: ThreadId,
    },

    /// The thread proposed a mutation but has no bound document
    #[error("thread `{thread}` has no bound document")]
    NoDocument {
        /// The offending thread
        thread: ThreadId,
    },

    /// Document load/apply/save failure (includes `StaleAnchor`)
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Completion bookkeeping failure
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Orchestrator errors
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// No worker bound for a registered stage
    #[error("no worker bound for stage `{0}`")]
    MissingWorker(StageId),

    /// The thread was aborted or expired and cannot take new requests
    #[error("thread `{0}` is no longer active; start a new thread")]
    ThreadInactive(ThreadId),

    /// Loop guard tripped
    ///
    /// The router's own inconsistency check should fire first; this is the
    /// backstop against a misbehaving worker re-entering the same state.
    #[error("thread `{thread}` exceeded the cycle budget of {budget}")]
    CycleBudgetExceeded {
        /// The looping thread
        thread: ThreadId,
        /// Configured maximum cycles per request
        budget: usize,
    },

    /// Routing failure
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Completion bookkeeping failure
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Approval checkpoint failure
    #[error(transparent)]
    Approval(#[from] ApprovalError),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
