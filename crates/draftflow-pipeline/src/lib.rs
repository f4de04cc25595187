//! Draftflow Pipeline - stages, completion, and routing
//!
//! The control-plane vocabulary of the draftflow core:
//! - Stage worker contract with degraded-fallback semantics
//! - Set-based completion tracking (never a count)
//! - Priority-ordered supervisor routing with the terminal check first
//! - Narrow contracts for the external retrieval/generation capabilities
//!
//! # Example
//!
//! ```rust
//! use draftflow_pipeline::{route, CompletionTracker, RouterDecision, RouterInput, StageId};
//!
//! let mut tracker = CompletionTracker::with_stages(
//!     ["outline", "draft"].map(StageId::from),
//! );
//! tracker.mark_complete(&StageId::from("outline")).unwrap();
//!
//! let decision = route(RouterInput {
//!     tracker: &tracker,
//!     hint: None,
//!     last_output: None,
//! }).unwrap();
//! assert!(matches!(decision, RouterDecision::Dispatch { .. }));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod capabilities;
pub mod error;
pub mod router;
pub mod section;
pub mod stage;
pub mod tracker;

pub use capabilities::{GenerationCapability, GenerationError, Passage, RetrievalCapability};
pub use error::{RouterError, TrackerError};
pub use router::{route, RouteRule, RouterDecision, RouterInput, DECISION_TABLE};
pub use section::SectionStage;
pub use stage::{
    MutationRequest, RejectionRecord, StageContext, StageId, StageMetadata, StageOutcome,
    StageOutput, StageOutputs, StageStatus, StageWorker,
};
pub use tracker::CompletionTracker;
