//! Stage worker contract
//!
//! A stage is a pluggable unit of pipeline work. Each cycle the supervisor
//! dispatches one stage worker, which either produces a named content
//! contribution (ending the stage) or a mutation request (suspending the
//! thread at the approval checkpoint).
//!
//! Workers never propagate generation failures upward: a failed external
//! call is caught locally and replaced with deterministic, clearly labeled
//! fallback content at `Degraded` status, and the stage still completes.

use crate::capabilities::{GenerationCapability, RetrievalCapability};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use draftflow_document::{Mutation, OutlineEntry};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Identifier of a registered stage
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageId(String);

impl StageId {
    /// Create a stage id
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

impl Display for StageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Whether a stage produced real or fallback content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Content generated normally
    Ok,
    /// Fallback content substituted after a capability failure
    Degraded,
}

/// Provenance attached to a stage output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetadata {
    /// Sources consulted while producing the content
    pub sources: Vec<String>,
    /// When the output was produced
    pub timestamp: DateTime<Utc>,
}

impl StageMetadata {
    /// Metadata stamped now
    #[inline]
    #[must_use]
    pub fn now(sources: Vec<String>) -> Self {
        Self {
            sources,
            timestamp: Utc::now(),
        }
    }
}

/// A named content contribution from one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Producing stage
    pub stage_id: StageId,
    /// Contributed content
    pub content: String,
    /// Provenance
    pub metadata: StageMetadata,
    /// Ok or degraded
    pub status: StageStatus,
    /// Explicit successor directive, if the stage names one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<StageId>,
}

impl StageOutput {
    /// Normal output with sources
    #[inline]
    #[must_use]
    pub fn ok(stage_id: StageId, content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            stage_id,
            content: content.into(),
            metadata: StageMetadata::now(sources),
            status: StageStatus::Ok,
            next_stage: None,
        }
    }

    /// Fallback output after a capability failure
    #[inline]
    #[must_use]
    pub fn degraded(stage_id: StageId, content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            stage_id,
            content: content.into(),
            metadata: StageMetadata::now(sources),
            status: StageStatus::Degraded,
            next_stage: None,
        }
    }

    /// Attach a successor directive
    #[inline]
    #[must_use]
    pub fn with_next_stage(mut self, next: StageId) -> Self {
        self.next_stage = Some(next);
        self
    }
}

/// A proposed document change awaiting human approval
///
/// Lives only inside a thread's `pending_mutation` slot and is cleared on
/// decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    /// Request id
    pub id: Uuid,
    /// The proposed change
    pub mutation: Mutation,
    /// Stage that proposed it
    pub requesting_stage: StageId,
    /// Human-readable description shown to the approver
    pub human_description: String,
}

impl MutationRequest {
    /// Create a request with a fresh id
    #[inline]
    #[must_use]
    pub fn new(
        mutation: Mutation,
        requesting_stage: StageId,
        human_description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mutation,
            requesting_stage,
            human_description: human_description.into(),
        }
    }
}

/// Record of a rejected mutation, visible to the requesting stage's context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    /// Stage whose mutation was rejected
    pub stage: StageId,
    /// Description of the rejected operation
    pub description: String,
    /// Approver's comment, if any
    pub comment: Option<String>,
    /// When the rejection happened
    pub at: DateTime<Utc>,
}

/// Ordered accumulation of stage outputs, keyed by producing stage
pub type StageOutputs = IndexMap<StageId, StageOutput>;

/// What a dispatched stage produced
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// A content contribution; the stage is complete
    Content(StageOutput),
    /// A mutation request; the thread suspends for approval
    Mutation(MutationRequest),
}

/// Accumulated context handed to a dispatched stage worker
pub struct StageContext<'a> {
    /// The external request text driving this thread
    pub request: &'a str,
    /// Prior stage outputs, in completion order
    pub outputs: &'a StageOutputs,
    /// Rejections of this thread's earlier mutation requests
    pub rejections: &'a [RejectionRecord],
    /// Outline of the target document, if one is bound
    pub outline: &'a [OutlineEntry],
    /// Relevance search handle
    pub retrieval: &'a dyn RetrievalCapability,
    /// Text generation handle
    pub generation: &'a dyn GenerationCapability,
}

impl StageContext<'_> {
    /// Rejections addressed to one stage
    pub fn rejections_for(&self, stage: &StageId) -> impl Iterator<Item = &RejectionRecord> {
        // Owned id: the iterator must not capture the lookup borrow.
        let stage = stage.clone();
        self.rejections.iter().filter(move |r| r.stage == stage)
    }
}

/// Pluggable unit of pipeline work
///
/// Implementations must be stateless descriptors: all mutable state lives in
/// the thread, and any capability failure is handled inside `produce`.
#[async_trait]
pub trait StageWorker: Send + Sync {
    /// The stage this worker produces
    fn stage_id(&self) -> StageId;

    /// Produce this stage's contribution or a mutation request
    async fn produce(&self, ctx: &StageContext<'_>) -> StageOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_output_builders_set_status() {
        let ok = StageOutput::ok(StageId::from("technical"), "body", vec!["kb".into()]);
        assert_eq!(ok.status, StageStatus::Ok);
        assert!(ok.next_stage.is_none());

        let degraded = StageOutput::degraded(StageId::from("qa"), "fallback", vec![]);
        assert_eq!(degraded.status, StageStatus::Degraded);

        let directed = ok.with_next_stage(StageId::from("pricing"));
        assert_eq!(directed.next_stage, Some(StageId::from("pricing")));
    }

    #[test]
    fn rejections_for_filters_by_stage() {
        let rejections = vec![
            RejectionRecord {
                stage: StageId::from("legal"),
                description: "delete clause".into(),
                comment: None,
                at: Utc::now(),
            },
            RejectionRecord {
                stage: StageId::from("qa"),
                description: "replace summary".into(),
                comment: Some("keep original".into()),
                at: Utc::now(),
            },
        ];
        let outputs = StageOutputs::new();
        let ctx = StageContext {
            request: "rfp",
            outputs: &outputs,
            rejections: &rejections,
            outline: &[],
            retrieval: &NoRetrieval,
            generation: &NoGeneration,
        };
        let for_qa: Vec<_> = ctx.rejections_for(&StageId::from("qa")).collect();
        assert_eq!(for_qa.len(), 1);
        assert_eq!(for_qa[0].comment.as_deref(), Some("keep original"));
    }

    #[test]
    fn rejections_iterator_outlives_the_lookup_id() {
        let rejections = vec![RejectionRecord {
            stage: StageId::from("legal"),
            description: "delete clause".into(),
            comment: None,
            at: Utc::now(),
        }];
        let outputs = StageOutputs::new();
        let ctx = StageContext {
            request: "rfp",
            outputs: &outputs,
            rejections: &rejections,
            outline: &[],
            retrieval: &NoRetrieval,
            generation: &NoGeneration,
        };
        // The id passed in is a temporary; the iterator stays usable after
        // it is gone.
        let pending = ctx.rejections_for(&StageId::from("legal"));
        assert_eq!(pending.count(), 1);
    }

    struct NoRetrieval;

    #[async_trait]
    impl crate::capabilities::RetrievalCapability for NoRetrieval {
        async fn query(&self, _text: &str) -> Vec<crate::capabilities::Passage> {
            Vec::new()
        }
    }

    struct NoGeneration;

    #[async_trait]
    impl crate::capabilities::GenerationCapability for NoGeneration {
        async fn generate(
            &self,
            _context: &str,
            _instruction: &str,
        ) -> Result<String, crate::capabilities::GenerationError> {
            Ok(String::new())
        }
    }
}
