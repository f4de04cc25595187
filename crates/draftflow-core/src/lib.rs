//! Draftflow Core - approval-gated, resumable content assembly
//!
//! Ties the workspace together:
//! - [`Orchestrator`]: route/dispatch loop over registered stage workers,
//!   one writer per thread, committed state transition by state transition
//! - [`ApprovalCheckpoint`]: suspend/resume around pending document
//!   mutations, persisted so resume survives a process restart
//! - [`compose::compose_final`]: final markdown assembly in stage
//!   registration order
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use draftflow_core::{Orchestrator, OrchestratorConfig, StageRegistry};
//! use draftflow_document::JsonDocumentStore;
//! use draftflow_pipeline::{SectionStage, StageId};
//! use draftflow_store::{ConversationId, StoreConfig, ThreadStore};
//!
//! # async fn run(
//! #     retrieval: Arc<dyn draftflow_pipeline::RetrievalCapability>,
//! #     generation: Arc<dyn draftflow_pipeline::GenerationCapability>,
//! # ) -> anyhow::Result<()> {
//! let registry = StageRegistry::new().register(Arc::new(SectionStage::new(
//!     StageId::from("technical"),
//!     "Technical Approach",
//!     "Describe the solution architecture",
//!     "Standard architecture overview to be supplied.",
//! )));
//! let store = Arc::new(ThreadStore::open(StoreConfig::new("threads"))?);
//! let documents = Arc::new(JsonDocumentStore::new("documents")?);
//! let orchestrator = Orchestrator::new(
//!     registry,
//!     store,
//!     documents,
//!     retrieval,
//!     generation,
//!     OrchestratorConfig::new(),
//! );
//! let outcome = orchestrator
//!     .handle_request(&ConversationId::from("conv-1"), "Draft the proposal")
//!     .await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod approval;
pub mod compose;
pub mod config;
pub mod error;
pub mod orchestrator;

pub use approval::{ApprovalCheckpoint, ApprovalDecision, ApprovalRequestWire};
pub use compose::compose_final;
pub use config::{OrchestratorConfig, StageRegistry};
pub use error::{ApprovalError, OrchestratorError};
pub use orchestrator::{Orchestrator, RunOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
