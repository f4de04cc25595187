//! Completion tracking
//!
//! Completion is represented strictly as a set of stage ids, never as a
//! count or boolean flag: a count cannot distinguish "4 of 4 distinct
//! stages" from "one stage run 4 times". `mark_complete` is the single
//! mutation entry point and is idempotent.

use crate::error::TrackerError;
use crate::stage::StageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set-based record of which stages have finished
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionTracker {
    registered: Vec<StageId>,
    completed: BTreeSet<StageId>,
}

impl CompletionTracker {
    /// Empty tracker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker over an ordered stage list
    #[must_use]
    pub fn with_stages(stages: impl IntoIterator<Item = StageId>) -> Self {
        let mut tracker = Self::new();
        for stage in stages {
            tracker.register(stage);
        }
        tracker
    }

    /// Register a stage, preserving registration order
    ///
    /// Re-registering an already-known id is a no-op.
    pub fn register(&mut self, stage_id: StageId) {
        if !self.registered.contains(&stage_id) {
            self.registered.push(stage_id);
        }
    }

    /// Mark a stage complete
    ///
    /// Idempotent: re-marking an already-complete id leaves the set
    /// unchanged. Returns whether the stage was newly completed.
    ///
    /// # Errors
    /// `TrackerError::UnknownStage` if the id was never registered, so the
    /// `completed ⊆ registered` invariant can never be violated.
    pub fn mark_complete(&mut self, stage_id: &StageId) -> Result<bool, TrackerError> {
        if !self.registered.contains(stage_id) {
            return Err(TrackerError::UnknownStage(stage_id.clone()));
        }
        Ok(self.completed.insert(stage_id.clone()))
    }

    /// Pipeline is complete iff every registered stage is in the set
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.registered.iter().all(|s| self.completed.contains(s))
    }

    /// Whether one stage has completed
    #[inline]
    #[must_use]
    pub fn is_stage_complete(&self, stage_id: &StageId) -> bool {
        self.completed.contains(stage_id)
    }

    /// Whether one stage is registered
    #[inline]
    #[must_use]
    pub fn is_registered(&self, stage_id: &StageId) -> bool {
        self.registered.contains(stage_id)
    }

    /// Registered stages in registration order
    #[inline]
    #[must_use]
    pub fn registered(&self) -> &[StageId] {
        &self.registered
    }

    /// Completed stage count (distinct stages, by construction)
    #[inline]
    #[must_use]
    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    /// Earliest registered stage not yet complete
    #[inline]
    #[must_use]
    pub fn first_incomplete(&self) -> Option<&StageId> {
        self.registered.iter().find(|s| !self.completed.contains(*s))
    }

    /// Registered-but-incomplete stages in registration order
    pub fn remaining(&self) -> impl Iterator<Item = &StageId> {
        self.registered.iter().filter(|s| !self.completed.contains(*s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(ids: &[&str]) -> CompletionTracker {
        CompletionTracker::with_stages(ids.iter().map(|s| StageId::from(*s)))
    }

    #[test]
    fn mark_complete_is_idempotent() {
        let mut tracker = stages(&["t1", "t2"]);
        assert!(tracker.mark_complete(&StageId::from("t1")).unwrap());
        let before = tracker.completed_len();
        assert!(!tracker.mark_complete(&StageId::from("t1")).unwrap());
        assert_eq!(tracker.completed_len(), before);
    }

    #[test]
    fn repeated_runs_of_one_stage_do_not_complete_pipeline() {
        let mut tracker = stages(&["t1", "t2", "t3", "t4"]);
        for _ in 0..4 {
            tracker.mark_complete(&StageId::from("t1")).unwrap();
        }
        assert_eq!(tracker.completed_len(), 1);
        assert!(!tracker.is_complete());
    }

    #[test]
    fn complete_iff_all_registered_done() {
        let mut tracker = stages(&["t1", "t2"]);
        assert!(!tracker.is_complete());
        tracker.mark_complete(&StageId::from("t1")).unwrap();
        assert!(!tracker.is_complete());
        tracker.mark_complete(&StageId::from("t2")).unwrap();
        assert!(tracker.is_complete());
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let mut tracker = stages(&["t1"]);
        let err = tracker.mark_complete(&StageId::from("ghost")).unwrap_err();
        assert!(matches!(err, TrackerError::UnknownStage(_)));
        assert_eq!(tracker.completed_len(), 0);
    }

    #[test]
    fn first_incomplete_follows_registration_order() {
        let mut tracker = stages(&["t1", "t2", "t3"]);
        tracker.mark_complete(&StageId::from("t1")).unwrap();
        assert_eq!(tracker.first_incomplete(), Some(&StageId::from("t2")));
        tracker.mark_complete(&StageId::from("t3")).unwrap();
        assert_eq!(tracker.first_incomplete(), Some(&StageId::from("t2")));

        let remaining: Vec<_> = tracker.remaining().collect();
        assert_eq!(remaining, vec![&StageId::from("t2")]);
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let tracker = stages(&["t1", "t1", "t2"]);
        assert_eq!(tracker.registered().len(), 2);
    }
}
