//! Dispatcher: turns eligible verdicts into posted nudges under a per-run cap.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use triage::{NudgeKind, PrRef, RunState, Verdict};

use crate::github_bridge::SignalSource;

/// What happened when a verdict reached the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DispatchOutcome {
    /// Comment posted; one unit of budget spent.
    Posted { nudge: NudgeKind },
    /// Dry run: logged and budget spent, nothing posted.
    DryRun { nudge: NudgeKind },
    /// Budget already exhausted; nothing happened.
    SkippedLimit,
    /// Verdict carried no action.
    NotEligible,
    /// The post failed; budget untouched.
    Failed { error: String },
}

impl DispatchOutcome {
    /// Whether an action was counted against the budget.
    pub fn dispatched(&self) -> bool {
        matches!(self, Self::Posted { .. } | Self::DryRun { .. })
    }
}

pub struct Dispatcher {
    source: Arc<dyn SignalSource>,
    dry_run: bool,
}

impl Dispatcher {
    pub fn new(source: Arc<dyn SignalSource>, dry_run: bool) -> Self {
        Self { source, dry_run }
    }

    /// Execute a verdict against the shared budget.
    pub async fn dispatch(
        &self,
        state: &mut RunState,
        pr: &PrRef,
        verdict: &Verdict,
    ) -> DispatchOutcome {
        let Some(nudge) = verdict.action.nudge().filter(|_| verdict.eligible) else {
            return DispatchOutcome::NotEligible;
        };
        if state.budget_exhausted() {
            info!(pr = %pr, nudge = %nudge, "Nudge limit reached — skipping");
            return DispatchOutcome::SkippedLimit;
        }

        if self.dry_run {
            let spent = state.try_consume();
            debug_assert!(spent, "budget checked before dispatch");
            info!(
                pr = %pr,
                nudge = %nudge,
                remaining = state.remaining_budget(),
                "[dry-run] Would post nudge"
            );
            return DispatchOutcome::DryRun { nudge };
        }

        match self.source.post_comment(pr, nudge.body()).await {
            Ok(()) => {
                let spent = state.try_consume();
                debug_assert!(spent, "budget checked before posting");
                info!(
                    pr = %pr,
                    nudge = %nudge,
                    remaining = state.remaining_budget(),
                    "Posted nudge"
                );
                DispatchOutcome::Posted { nudge }
            }
            Err(e) => {
                warn!(pr = %pr, nudge = %nudge, error = %e, "Failed to post nudge");
                DispatchOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use triage::{
        ActionKind, CheckRun, Comment, Notification, PrSnapshot, TimelineEvent, VerdictReason,
    };

    use crate::error::TransportError;

    /// Records posts; every read is unused here.
    #[derive(Default)]
    struct RecordingSource {
        posts: Mutex<Vec<(String, String)>>,
        fail_posts: bool,
    }

    #[async_trait]
    impl SignalSource for RecordingSource {
        async fn list_notifications(&self) -> Result<Vec<Notification>, TransportError> {
            Ok(Vec::new())
        }

        async fn get_pull_request(&self, pr: &PrRef) -> Result<PrSnapshot, TransportError> {
            Err(TransportError::Decode {
                url: pr.key(),
                message: "unused".into(),
            })
        }

        async fn list_issue_comments(
            &self,
            _pr: &PrRef,
            _limit: u32,
        ) -> Result<Vec<Comment>, TransportError> {
            Ok(Vec::new())
        }

        async fn list_review_comments(
            &self,
            _pr: &PrRef,
            _limit: u32,
        ) -> Result<Vec<Comment>, TransportError> {
            Ok(Vec::new())
        }

        async fn list_timeline_events(
            &self,
            _pr: &PrRef,
            _limit: u32,
        ) -> Result<Vec<TimelineEvent>, TransportError> {
            Ok(Vec::new())
        }

        async fn list_check_runs(
            &self,
            _pr: &PrRef,
            _git_ref: &str,
        ) -> Result<Vec<CheckRun>, TransportError> {
            Ok(Vec::new())
        }

        async fn post_comment(&self, pr: &PrRef, body: &str) -> Result<(), TransportError> {
            if self.fail_posts {
                return Err(TransportError::Status {
                    url: pr.key(),
                    status: 403,
                    body: "Resource not accessible by integration".into(),
                });
            }
            self.posts
                .lock()
                .unwrap()
                .push((pr.key(), body.to_string()));
            Ok(())
        }
    }

    fn pr() -> PrRef {
        PrRef::new("octo", "widgets", 42)
    }

    #[tokio::test]
    async fn test_live_post_consumes_budget() {
        let source = Arc::new(RecordingSource::default());
        let dispatcher = Dispatcher::new(source.clone(), false);
        let mut state = RunState::new(2);

        let outcome = dispatcher
            .dispatch(&mut state, &pr(), &Verdict::eligible(ActionKind::CiFailure))
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Posted {
                nudge: NudgeKind::CiFailure
            }
        );
        assert_eq!(state.remaining_budget(), 1);
        let posts = source.posts.lock().unwrap();
        assert_eq!(
            *posts,
            vec![("octo/widgets#42".to_string(), NudgeKind::CiFailure.body().to_string())]
        );
    }

    #[tokio::test]
    async fn test_dry_run_consumes_without_posting() {
        let source = Arc::new(RecordingSource::default());
        let dispatcher = Dispatcher::new(source.clone(), true);
        let mut state = RunState::new(1);

        let outcome = dispatcher
            .dispatch(&mut state, &pr(), &Verdict::eligible(ActionKind::Conflict))
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::DryRun {
                nudge: NudgeKind::Conflict
            }
        );
        assert!(outcome.dispatched());
        assert!(state.budget_exhausted());
        assert!(source.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_budget_skips_without_side_effects() {
        let source = Arc::new(RecordingSource::default());
        let dispatcher = Dispatcher::new(source.clone(), false);
        let mut state = RunState::new(1);
        assert!(state.try_consume());

        let outcome = dispatcher
            .dispatch(&mut state, &pr(), &Verdict::eligible(ActionKind::GenericNudge))
            .await;

        assert_eq!(outcome, DispatchOutcome::SkippedLimit);
        assert_eq!(state.dispatched(), 1);
        assert!(source.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cap_of_one_allows_a_single_post() {
        let source = Arc::new(RecordingSource::default());
        let dispatcher = Dispatcher::new(source.clone(), false);
        let mut state = RunState::new(1);
        let verdict = Verdict::eligible(ActionKind::GenericNudge);

        let first = dispatcher.dispatch(&mut state, &pr(), &verdict).await;
        let second = dispatcher
            .dispatch(&mut state, &PrRef::new("octo", "widgets", 43), &verdict)
            .await;

        assert!(first.dispatched());
        assert_eq!(second, DispatchOutcome::SkippedLimit);
        assert_eq!(state.dispatched(), 1);
        assert_eq!(source.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ineligible_verdict_is_not_dispatched() {
        let source = Arc::new(RecordingSource::default());
        let dispatcher = Dispatcher::new(source.clone(), false);
        let mut state = RunState::new(3);

        let outcome = dispatcher
            .dispatch(
                &mut state,
                &pr(),
                &Verdict::ineligible(VerdictReason::AlreadyResolved),
            )
            .await;

        assert_eq!(outcome, DispatchOutcome::NotEligible);
        assert_eq!(state.remaining_budget(), 3);
        assert!(source.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_post_keeps_budget() {
        let source = Arc::new(RecordingSource {
            fail_posts: true,
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(source, false);
        let mut state = RunState::new(3);

        let outcome = dispatcher
            .dispatch(&mut state, &pr(), &Verdict::eligible(ActionKind::Feedback))
            .await;

        assert!(matches!(outcome, DispatchOutcome::Failed { ref error } if error.contains("403")));
        assert!(!outcome.dispatched());
        assert_eq!(state.remaining_budget(), 3);
    }
}
