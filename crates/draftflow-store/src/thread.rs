//! Thread state
//!
//! A thread is the persisted execution context for one pipeline run, one per
//! external conversation id. It owns everything the orchestrator needs to
//! resume after a process restart: completion state, accumulated outputs,
//! the pending mutation (if suspended), and the exact resume point.

use chrono::{DateTime, Utc};
use draftflow_document::DocumentRef;
use draftflow_pipeline::{
    CompletionTracker, MutationRequest, RejectionRecord, StageId, StageOutputs,
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use ulid::Ulid;

/// Unique thread identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub Ulid);

impl ThreadId {
    /// Generate a new thread id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ThreadId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External conversation identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    /// Create a conversation id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Lifecycle status of a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// Executing or ready to execute
    Active,
    /// Suspended on a pending mutation
    AwaitingApproval,
    /// All registered stages complete
    Completed,
    /// Aborted or purged after inactivity
    Expired,
}

/// Where to continue after an approval decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    /// Stage whose mutation suspended the thread
    pub stage: StageId,
}

/// Persisted execution context for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Thread id
    pub id: ThreadId,
    /// Owning conversation
    pub conversation_id: ConversationId,
    /// The external request text driving this run
    pub request: String,
    /// Registered stages and their completion set
    pub tracker: CompletionTracker,
    /// Accumulated stage outputs, in completion order
    pub outputs: StageOutputs,
    /// At most one pending mutation; set iff status is `AwaitingApproval`
    pub pending_mutation: Option<MutationRequest>,
    /// Saved continuation for a suspended thread
    pub resume_point: Option<ResumePoint>,
    /// Explicit next-stage hint for the router, possibly stale
    pub next_stage_hint: Option<StageId>,
    /// Rejections of this thread's earlier mutation requests
    pub rejections: Vec<RejectionRecord>,
    /// Lifecycle status
    pub status: ThreadStatus,
    /// Target document for mutations, if one is bound
    pub document_ref: Option<DocumentRef>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last state transition time
    pub last_activity: DateTime<Utc>,
}

impl Thread {
    /// Create an active thread with a registered stage list
    #[must_use]
    pub fn new(
        id: ThreadId,
        conversation_id: ConversationId,
        request: impl Into<String>,
        tracker: CompletionTracker,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            conversation_id,
            request: request.into(),
            tracker,
            outputs: StageOutputs::new(),
            pending_mutation: None,
            resume_point: None,
            next_stage_hint: None,
            rejections: Vec::new(),
            status: ThreadStatus::Active,
            document_ref: None,
            created_at: now,
            last_activity: now,
        }
    }

    /// Bind the document mutations will target
    #[inline]
    #[must_use]
    pub fn with_document(mut self, doc_ref: DocumentRef) -> Self {
        self.document_ref = Some(doc_ref);
        self
    }

    /// Stamp a state transition
    #[inline]
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Most recently recorded stage output
    #[inline]
    #[must_use]
    pub fn last_output(&self) -> Option<&draftflow_pipeline::StageOutput> {
        self.outputs.values().last()
    }

    /// Check the pending-mutation/status coupling invariant
    ///
    /// `status == AwaitingApproval` iff `pending_mutation` is set.
    #[inline]
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        (self.status == ThreadStatus::AwaitingApproval) == self.pending_mutation.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftflow_document::{Anchor, Block, BlockKind, Mutation, Placement};
    use draftflow_pipeline::MutationRequest;

    fn thread() -> Thread {
        Thread::new(
            ThreadId::new(),
            ConversationId::from("conv-1"),
            "rfp text",
            CompletionTracker::with_stages(["t1", "t2"].map(StageId::from)),
        )
    }

    #[test]
    fn new_thread_is_active_and_consistent() {
        let t = thread();
        assert_eq!(t.status, ThreadStatus::Active);
        assert!(t.pending_mutation.is_none());
        assert!(t.invariants_hold());
    }

    #[test]
    fn invariant_detects_status_mutation_mismatch() {
        let mut t = thread();
        t.status = ThreadStatus::AwaitingApproval;
        assert!(!t.invariants_hold());

        t.pending_mutation = Some(MutationRequest::new(
            Mutation::insert(
                Anchor::root_block(0),
                BlockKind::Paragraph,
                Placement::After,
                Block::paragraph("x"),
            ),
            StageId::from("t1"),
            "insert paragraph",
        ));
        assert!(t.invariants_hold());

        t.status = ThreadStatus::Active;
        assert!(!t.invariants_hold());
    }

    #[test]
    fn serde_round_trip_preserves_state() {
        let mut t = thread();
        t.tracker.mark_complete(&StageId::from("t1")).unwrap();
        t.next_stage_hint = Some(StageId::from("t2"));

        let json = serde_json::to_string(&t).unwrap();
        let back: Thread = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert!(back.tracker.is_stage_complete(&StageId::from("t1")));
    }
}
