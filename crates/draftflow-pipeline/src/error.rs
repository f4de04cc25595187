//! Error types for the pipeline layer

use crate::stage::StageId;

/// Completion tracker errors
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Attempted to complete a stage that was never registered
    #[error("stage `{0}` is not registered")]
    UnknownStage(StageId),
}

/// Supervisor router errors
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The pipeline is incomplete but no rule can dispatch a stage
    ///
    /// Fatal state inconsistency. The router fails loudly here; it never
    /// loops silently.
    #[error("routing inconsistency: {} stage(s) incomplete but none dispatchable", remaining.len())]
    Inconsistent {
        /// Stages still registered-but-incomplete
        remaining: Vec<StageId>,
    },
}
