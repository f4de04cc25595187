//! Error types for the thread store

use crate::thread::ThreadId;

/// Thread store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No thread under the given id (never created, or purged)
    ///
    /// Fatal for the triggering call; the caller must start a new thread.
    #[error("thread `{0}` not found")]
    ThreadNotFound(ThreadId),

    /// A state transition broke the pending-mutation/status coupling
    #[error("thread `{thread}` invariant violated: {detail}")]
    InvariantViolation {
        /// The offending thread
        thread: ThreadId,
        /// What was inconsistent
        detail: String,
    },

    /// Backing store I/O failure
    ///
    /// The triggering update is rolled back in memory: a failed write is
    /// treated as not having happened.
    #[error("thread store i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure
    #[error("thread serialization: {0}")]
    Serde(#[from] serde_json::Error),
}
