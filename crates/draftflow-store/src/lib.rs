//! Draftflow Store - durable thread/session state
//!
//! The persistence layer of the draftflow core:
//! - 1:1 conversation-id → thread mapping, stable and idempotent
//! - Per-thread single-writer locking
//! - Synchronous atomic commits on every state transition
//! - Inactivity expiry with a grace window for threads awaiting approval
//! - Full recovery from disk after a process restart

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod store;
pub mod thread;

pub use error::StoreError;
pub use store::{StoreConfig, ThreadStore};
pub use thread::{ConversationId, ResumePoint, Thread, ThreadId, ThreadStatus};
