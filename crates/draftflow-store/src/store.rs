//! Durable thread store
//!
//! Maintains the 1:1 map from conversation id to pipeline execution state.
//! Every state transition elsewhere in the system is persisted through this
//! store synchronously before control returns to the caller, so a crash
//! between request and response leaves a thread in the last fully committed
//! state, never half-updated.
//!
//! Updates are serialized per thread id: each thread sits behind its own
//! async mutex, acquired through [`ThreadStore::lock`]. Commits write the
//! full thread JSON to a temporary file and rename it into place.

use crate::error::StoreError;
use crate::thread::{ConversationId, Thread, ThreadId, ThreadStatus};
use chrono::Utc;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Thread store configuration
///
/// Explicit configuration threaded through construction; the store has no
/// module-level defaults.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding one JSON file per thread
    pub root: PathBuf,
    /// Inactivity timeout before a thread is eligible for purging
    pub inactivity_timeout: Duration,
    /// Extra grace on top of the timeout for threads awaiting approval
    pub approval_grace: Duration,
}

impl StoreConfig {
    /// Configuration rooted at a directory
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            inactivity_timeout: Duration::from_secs(60 * 60),
            approval_grace: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// With an inactivity timeout
    #[inline]
    #[must_use]
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// With an approval grace window
    #[inline]
    #[must_use]
    pub fn with_approval_grace(mut self, grace: Duration) -> Self {
        self.approval_grace = grace;
        self
    }
}

/// Durable 1:1 map from conversation id to thread state
#[derive(Debug)]
pub struct ThreadStore {
    config: StoreConfig,
    index: DashMap<ConversationId, ThreadId>,
    threads: DashMap<ThreadId, Arc<Mutex<Thread>>>,
}

impl ThreadStore {
    /// Open a store, reloading any threads persisted under the root
    ///
    /// # Errors
    /// I/O failure creating the root or reading persisted threads.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(&config.root)?;
        let store = Self {
            config,
            index: DashMap::new(),
            threads: DashMap::new(),
        };
        store.reload()?;
        Ok(store)
    }

    fn reload(&self) -> Result<(), StoreError> {
        let mut loaded = 0usize;
        for entry in fs::read_dir(&self.config.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_thread(&path) {
                Ok(thread) => {
                    self.index.insert(thread.conversation_id.clone(), thread.id);
                    self.threads.insert(thread.id, Arc::new(Mutex::new(thread)));
                    loaded += 1;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable thread file");
                }
            }
        }
        if loaded > 0 {
            tracing::info!(count = loaded, "reloaded persisted threads");
        }
        Ok(())
    }

    fn read_thread(path: &Path) -> Result<Thread, StoreError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn thread_path(&self, id: ThreadId) -> PathBuf {
        self.config.root.join(format!("{id}.json"))
    }

    /// Store configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Stable, idempotent conversation-to-thread mapping
    ///
    /// Returns the existing thread for the conversation, or builds one with
    /// `make`, persists it, and indexes it. The thread handed back by `make`
    /// gets its id and conversation rebound to the store's values.
    ///
    /// # Errors
    /// Persistence failure; in that case nothing is indexed.
    pub fn get_or_create(
        &self,
        conversation_id: &ConversationId,
        make: impl FnOnce(ThreadId) -> Thread,
    ) -> Result<ThreadId, StoreError> {
        use dashmap::mapref::entry::Entry;

        match self.index.entry(conversation_id.clone()) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let id = ThreadId::new();
                let mut thread = make(id);
                thread.id = id;
                thread.conversation_id = conversation_id.clone();
                self.write_committed(&thread)?;
                self.threads.insert(id, Arc::new(Mutex::new(thread)));
                entry.insert(id);
                tracing::info!(thread = %id, conversation = %conversation_id, "thread created");
                Ok(id)
            }
        }
    }

    /// Thread id for a conversation, if one exists
    #[inline]
    #[must_use]
    pub fn resolve(&self, conversation_id: &ConversationId) -> Option<ThreadId> {
        self.index.get(conversation_id).map(|r| *r)
    }

    /// Acquire the per-thread writer lock
    ///
    /// # Errors
    /// `StoreError::ThreadNotFound` if the thread never existed or was
    /// purged.
    pub async fn lock(&self, id: ThreadId) -> Result<OwnedMutexGuard<Thread>, StoreError> {
        let arc = self
            .threads
            .get(&id)
            .map(|r| Arc::clone(r.value()))
            .ok_or(StoreError::ThreadNotFound(id))?;
        Ok(arc.lock_owned().await)
    }

    /// Snapshot a thread's current state
    ///
    /// # Errors
    /// `StoreError::ThreadNotFound` if the thread never existed or was
    /// purged.
    pub async fn get(&self, id: ThreadId) -> Result<Thread, StoreError> {
        Ok(self.lock(id).await?.clone())
    }

    /// Apply a transition under the per-thread lock and commit it
    ///
    /// If the commit fails the thread is restored to its state before `f`
    /// ran.
    ///
    /// # Errors
    /// `ThreadNotFound`, `InvariantViolation`, or persistence failure.
    pub async fn update<F, T>(&self, id: ThreadId, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Thread) -> T,
    {
        let mut guard = self.lock(id).await?;
        let before = guard.clone();
        let out = f(&mut guard);
        if let Err(err) = self.commit(&mut guard) {
            *guard = before;
            return Err(err);
        }
        Ok(out)
    }

    /// Commit a state transition
    ///
    /// Validates the pending-mutation/status coupling, stamps
    /// `last_activity`, and persists synchronously. Callers that mutated a
    /// locked thread must restore their pre-mutation copy if this fails: a
    /// failed write is treated as not having happened.
    ///
    /// # Errors
    /// `InvariantViolation` for inconsistent state, or persistence failure.
    pub fn commit(&self, thread: &mut Thread) -> Result<(), StoreError> {
        if !thread.invariants_hold() {
            return Err(StoreError::InvariantViolation {
                thread: thread.id,
                detail: format!(
                    "status {:?} with pending_mutation={}",
                    thread.status,
                    thread.pending_mutation.is_some()
                ),
            });
        }
        thread.touch();
        self.write_committed(thread)
    }

    fn write_committed(&self, thread: &Thread) -> Result<(), StoreError> {
        let path = self.thread_path(thread.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(thread)?)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(thread = %thread.id, status = ?thread.status, "thread persisted");
        Ok(())
    }

    /// Purge threads idle past `timeout`
    ///
    /// Threads awaiting approval get `timeout + approval_grace` before they
    /// are purged. Returns the purged thread ids.
    ///
    /// # Errors
    /// I/O failure removing a persisted thread file.
    pub async fn expire_inactive(&self, timeout: Duration) -> Result<Vec<ThreadId>, StoreError> {
        let now = Utc::now();
        let handles: Vec<(ThreadId, Arc<Mutex<Thread>>)> = self
            .threads
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect();

        let mut purged = Vec::new();
        for (id, arc) in handles {
            let (conversation, expired) = {
                let thread = arc.lock().await;
                let idle = (now - thread.last_activity).to_std().unwrap_or_default();
                let allowed = if thread.status == ThreadStatus::AwaitingApproval {
                    timeout + self.config.approval_grace
                } else {
                    timeout
                };
                (thread.conversation_id.clone(), idle > allowed)
            };
            if expired {
                self.threads.remove(&id);
                self.index.remove(&conversation);
                let path = self.thread_path(id);
                if path.exists() {
                    fs::remove_file(&path)?;
                }
                tracing::info!(thread = %id, conversation = %conversation, "thread purged after inactivity");
                purged.push(id);
            }
        }
        Ok(purged)
    }

    /// Number of live threads
    #[inline]
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftflow_document::{Anchor, Block, BlockKind, Mutation, Placement};
    use draftflow_pipeline::{CompletionTracker, MutationRequest, StageId};

    fn make_thread(id: ThreadId) -> Thread {
        Thread::new(
            id,
            ConversationId::from("placeholder"),
            "rfp",
            CompletionTracker::with_stages(["t1", "t2"].map(StageId::from)),
        )
    }

    fn pending() -> MutationRequest {
        MutationRequest::new(
            Mutation::insert(
                Anchor::root_block(0),
                BlockKind::Paragraph,
                Placement::After,
                Block::paragraph("x"),
            ),
            StageId::from("t1"),
            "insert paragraph after block 0",
        )
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThreadStore::open(StoreConfig::new(dir.path())).unwrap();
        let conv = ConversationId::from("user-42");

        let first = store.get_or_create(&conv, make_thread).unwrap();
        let second = store.get_or_create(&conv, make_thread).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.thread_count(), 1);

        let other = store
            .get_or_create(&ConversationId::from("user-43"), make_thread)
            .unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn commit_persists_and_reopen_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let conv = ConversationId::from("user-42");
        let id = {
            let store = ThreadStore::open(StoreConfig::new(dir.path())).unwrap();
            let id = store.get_or_create(&conv, make_thread).unwrap();
            let mut guard = store.lock(id).await.unwrap();
            guard.tracker.mark_complete(&StageId::from("t1")).unwrap();
            guard.pending_mutation = Some(pending());
            guard.status = ThreadStatus::AwaitingApproval;
            guard.resume_point = Some(crate::thread::ResumePoint {
                stage: StageId::from("t1"),
            });
            store.commit(&mut guard).unwrap();
            id
        };

        // Fresh store over the same directory: a process restart.
        let store = ThreadStore::open(StoreConfig::new(dir.path())).unwrap();
        assert_eq!(store.resolve(&conv), Some(id));
        let thread = store.get(id).await.unwrap();
        assert_eq!(thread.status, ThreadStatus::AwaitingApproval);
        assert!(thread.pending_mutation.is_some());
        assert!(thread.tracker.is_stage_complete(&StageId::from("t1")));
    }

    #[tokio::test]
    async fn update_commits_or_restores() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThreadStore::open(StoreConfig::new(dir.path())).unwrap();
        let id = store
            .get_or_create(&ConversationId::from("u"), make_thread)
            .unwrap();

        let newly = store
            .update(id, |t| t.tracker.mark_complete(&StageId::from("t1")).unwrap())
            .await
            .unwrap();
        assert!(newly);

        // A transition that breaks the invariant rolls back in memory.
        let err = store
            .update(id, |t| t.status = ThreadStatus::AwaitingApproval)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation { .. }));
        let thread = store.get(id).await.unwrap();
        assert_eq!(thread.status, ThreadStatus::Active);
        assert!(thread.tracker.is_stage_complete(&StageId::from("t1")));
    }

    #[tokio::test]
    async fn commit_rejects_invariant_violations() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThreadStore::open(StoreConfig::new(dir.path())).unwrap();
        let id = store
            .get_or_create(&ConversationId::from("c"), make_thread)
            .unwrap();

        let mut guard = store.lock(id).await.unwrap();
        guard.status = ThreadStatus::AwaitingApproval; // no pending mutation
        let err = store.commit(&mut guard).unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation { .. }));
    }

    #[tokio::test]
    async fn expire_purges_idle_threads() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThreadStore::open(StoreConfig::new(dir.path())).unwrap();
        let conv = ConversationId::from("idle-user");
        let id = store.get_or_create(&conv, make_thread).unwrap();

        {
            let mut guard = store.lock(id).await.unwrap();
            guard.last_activity = Utc::now() - chrono::Duration::hours(2);
            // Bypass commit's touch to keep the stale timestamp.
            store.write_committed(&guard).unwrap();
        }

        let purged = store
            .expire_inactive(Duration::from_secs(60 * 60))
            .await
            .unwrap();
        assert_eq!(purged, vec![id]);
        assert!(matches!(
            store.get(id).await,
            Err(StoreError::ThreadNotFound(_))
        ));
        assert_eq!(store.resolve(&conv), None);

        // Gone from disk too: a reopen sees nothing.
        let reopened = ThreadStore::open(StoreConfig::new(dir.path())).unwrap();
        assert_eq!(reopened.thread_count(), 0);
    }

    #[tokio::test]
    async fn awaiting_approval_gets_grace_window() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path())
            .with_approval_grace(Duration::from_secs(10 * 60 * 60));
        let store = ThreadStore::open(config).unwrap();
        let id = store
            .get_or_create(&ConversationId::from("waiting"), make_thread)
            .unwrap();

        {
            let mut guard = store.lock(id).await.unwrap();
            guard.pending_mutation = Some(pending());
            guard.status = ThreadStatus::AwaitingApproval;
            guard.last_activity = Utc::now() - chrono::Duration::hours(2);
            store.write_committed(&guard).unwrap();
        }

        // Two hours idle exceeds the one-hour timeout, but the thread is
        // awaiting approval and inside the grace window.
        let purged = store
            .expire_inactive(Duration::from_secs(60 * 60))
            .await
            .unwrap();
        assert!(purged.is_empty());
        assert!(store.get(id).await.is_ok());
    }
}
