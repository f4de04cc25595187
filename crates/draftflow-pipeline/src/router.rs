//! Supervisor router
//!
//! Routing is a single ordered decision table, evaluated top to bottom every
//! cycle. The terminal check is always first: it runs before any explicit
//! next-stage hint, so a stale hint can never keep a completed pipeline
//! cycling. If no rule dispatches and the pipeline is not complete, routing
//! fails loudly instead of looping.

use crate::error::RouterError;
use crate::stage::{StageId, StageOutput};
use crate::tracker::CompletionTracker;
use serde::{Deserialize, Serialize};

/// The rule that produced a routing decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteRule {
    /// All registered stages complete
    Terminal,
    /// A valid explicit next-stage hint was present
    ExplicitHint,
    /// The last stage output carried a successor directive
    SuccessorDirective,
    /// Fell through to the earliest registered incomplete stage
    EarliestIncomplete,
}

/// Evaluation order of the decision table
pub const DECISION_TABLE: [RouteRule; 4] = [
    RouteRule::Terminal,
    RouteRule::ExplicitHint,
    RouteRule::SuccessorDirective,
    RouteRule::EarliestIncomplete,
];

/// Next action for a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterDecision {
    /// Pipeline complete; compose and stop
    Terminate,
    /// Dispatch one stage
    Dispatch {
        /// Stage to run
        stage: StageId,
        /// Rule that selected it
        rule: RouteRule,
    },
}

/// Everything the router is allowed to look at
#[derive(Debug, Clone, Copy)]
pub struct RouterInput<'a> {
    /// Completion state
    pub tracker: &'a CompletionTracker,
    /// Explicit next-stage hint carried in thread state, possibly stale
    pub hint: Option<&'a StageId>,
    /// Output of the most recently completed stage, if any
    pub last_output: Option<&'a StageOutput>,
}

impl RouteRule {
    /// Evaluate one rule against the input
    fn evaluate(self, input: &RouterInput<'_>) -> Option<RouterDecision> {
        match self {
            RouteRule::Terminal => input.tracker.is_complete().then_some(RouterDecision::Terminate),
            RouteRule::ExplicitHint => dispatchable(input.tracker, input.hint, self),
            RouteRule::SuccessorDirective => {
                let successor = input.last_output.and_then(|o| o.next_stage.as_ref());
                dispatchable(input.tracker, successor, self)
            }
            RouteRule::EarliestIncomplete => {
                input.tracker.first_incomplete().map(|stage| RouterDecision::Dispatch {
                    stage: stage.clone(),
                    rule: self,
                })
            }
        }
    }
}

/// A hint or directive dispatches only if it names a registered,
/// not-yet-completed stage; anything else is skipped, not an error.
fn dispatchable(
    tracker: &CompletionTracker,
    candidate: Option<&StageId>,
    rule: RouteRule,
) -> Option<RouterDecision> {
    let stage = candidate?;
    (tracker.is_registered(stage) && !tracker.is_stage_complete(stage)).then(|| {
        RouterDecision::Dispatch {
            stage: stage.clone(),
            rule,
        }
    })
}

/// Select the next action for a thread
///
/// # Errors
/// `RouterError::Inconsistent` if the pipeline is incomplete yet no rule can
/// dispatch a stage. This is a fatal state inconsistency, never a silent
/// loop.
pub fn route(input: RouterInput<'_>) -> Result<RouterDecision, RouterError> {
    for rule in DECISION_TABLE {
        if let Some(decision) = rule.evaluate(&input) {
            match &decision {
                RouterDecision::Terminate => {
                    tracing::debug!("router: pipeline complete, terminating");
                }
                RouterDecision::Dispatch { stage, rule } => {
                    tracing::debug!(stage = %stage, rule = ?rule, "router: dispatching stage");
                }
            }
            return Ok(decision);
        }
    }
    Err(RouterError::Inconsistent {
        remaining: input.tracker.remaining().cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageOutput;

    fn tracker(ids: &[&str], done: &[&str]) -> CompletionTracker {
        let mut t = CompletionTracker::with_stages(ids.iter().map(|s| StageId::from(*s)));
        for id in done {
            t.mark_complete(&StageId::from(*id)).unwrap();
        }
        t
    }

    fn dispatch_of(decision: RouterDecision) -> (StageId, RouteRule) {
        match decision {
            RouterDecision::Dispatch { stage, rule } => (stage, rule),
            RouterDecision::Terminate => panic!("expected dispatch"),
        }
    }

    #[test]
    fn terminal_check_beats_stale_hint() {
        // The exact shape of the historical infinite loop: everything is
        // complete but a stale hint still points at a stage.
        let t = tracker(&["t1", "t2"], &["t1", "t2"]);
        let hint = StageId::from("t1");
        let decision = route(RouterInput {
            tracker: &t,
            hint: Some(&hint),
            last_output: None,
        })
        .unwrap();
        assert_eq!(decision, RouterDecision::Terminate);
    }

    #[test]
    fn valid_hint_dispatches() {
        let t = tracker(&["t1", "t2"], &["t1"]);
        let hint = StageId::from("t2");
        let (stage, rule) = dispatch_of(
            route(RouterInput {
                tracker: &t,
                hint: Some(&hint),
                last_output: None,
            })
            .unwrap(),
        );
        assert_eq!(stage, StageId::from("t2"));
        assert_eq!(rule, RouteRule::ExplicitHint);
    }

    #[test]
    fn hint_to_completed_stage_is_skipped() {
        let t = tracker(&["t1", "t2"], &["t1"]);
        let hint = StageId::from("t1");
        let (stage, rule) = dispatch_of(
            route(RouterInput {
                tracker: &t,
                hint: Some(&hint),
                last_output: None,
            })
            .unwrap(),
        );
        assert_eq!(stage, StageId::from("t2"));
        assert_eq!(rule, RouteRule::EarliestIncomplete);
    }

    #[test]
    fn hint_to_unknown_stage_is_skipped() {
        let t = tracker(&["t1", "t2"], &[]);
        let hint = StageId::from("ghost");
        let (stage, _) = dispatch_of(
            route(RouterInput {
                tracker: &t,
                hint: Some(&hint),
                last_output: None,
            })
            .unwrap(),
        );
        assert_eq!(stage, StageId::from("t1"));
    }

    #[test]
    fn successor_directive_wins_over_registration_order() {
        let t = tracker(&["t1", "t2", "t3"], &["t1"]);
        let last = StageOutput::ok(StageId::from("t1"), "done", vec![])
            .with_next_stage(StageId::from("t3"));
        let (stage, rule) = dispatch_of(
            route(RouterInput {
                tracker: &t,
                hint: None,
                last_output: Some(&last),
            })
            .unwrap(),
        );
        assert_eq!(stage, StageId::from("t3"));
        assert_eq!(rule, RouteRule::SuccessorDirective);
    }

    #[test]
    fn hint_outranks_successor_directive() {
        let t = tracker(&["t1", "t2", "t3"], &["t1"]);
        let hint = StageId::from("t2");
        let last = StageOutput::ok(StageId::from("t1"), "done", vec![])
            .with_next_stage(StageId::from("t3"));
        let (stage, rule) = dispatch_of(
            route(RouterInput {
                tracker: &t,
                hint: Some(&hint),
                last_output: Some(&last),
            })
            .unwrap(),
        );
        assert_eq!(stage, StageId::from("t2"));
        assert_eq!(rule, RouteRule::ExplicitHint);
    }

    #[test]
    fn empty_registration_fails_loudly() {
        // No stages registered and "complete" vacuously true terminates; an
        // inconsistent tracker with nothing dispatchable must error instead.
        let t = CompletionTracker::new();
        let decision = route(RouterInput {
            tracker: &t,
            hint: None,
            last_output: None,
        })
        .unwrap();
        assert_eq!(decision, RouterDecision::Terminate);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const STAGES: [&str; 5] = ["t1", "t2", "t3", "t4", "t5"];

        proptest! {
            /// For every completion state: if all registered stages are
            /// complete, the router terminates regardless of any hint.
            #[test]
            fn complete_always_terminates(
                done_mask in proptest::collection::vec(any::<bool>(), 5),
                hint_idx in proptest::option::of(0usize..5),
            ) {
                let mut t = CompletionTracker::with_stages(
                    STAGES.iter().map(|s| StageId::from(*s)),
                );
                for (stage, done) in STAGES.iter().zip(&done_mask) {
                    if *done {
                        t.mark_complete(&StageId::from(*stage)).unwrap();
                    }
                }
                let hint = hint_idx.map(|i| StageId::from(STAGES[i]));
                let decision = route(RouterInput {
                    tracker: &t,
                    hint: hint.as_ref(),
                    last_output: None,
                }).unwrap();

                if done_mask.iter().all(|d| *d) {
                    prop_assert_eq!(decision, RouterDecision::Terminate);
                } else {
                    // Incomplete pipelines always dispatch something
                    // incomplete and registered.
                    match decision {
                        RouterDecision::Dispatch { stage, .. } => {
                            prop_assert!(t.is_registered(&stage));
                            prop_assert!(!t.is_stage_complete(&stage));
                        }
                        RouterDecision::Terminate => prop_assert!(false, "terminated early"),
                    }
                }
            }
        }
    }
}
