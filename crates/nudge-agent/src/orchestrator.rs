//! Run loop: derive candidates from the inbox, then sweep them in two passes.
//!
//! ```text
//!  notifications ──► PR candidates ──► dedupe by key ──► shuffle once
//!                                                           │
//!                         ┌─────────────────────────────────┘
//!                         ▼
//!   pass 1 (strict threshold) ── dispatched < floor && budget left? ──► pass 2 (relaxed)
//!                                                                      skips terminal keys
//! ```
//!
//! Per PR: fetch PR (failure is terminal) → auxiliary fetches (failure
//! degrades the signal) → extract signals → screen → oracle (cached per
//! PR) → decide → dispatch. One PR is finished before the next starts, so
//! the budget and dedup set need no locking.
//!
//! Terminal keys: not-automated verdicts, primary fetch failures, dispatched
//! nudges and failed posts. Everything else may be reconsidered in pass 2.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};
use triage::{
    DecisionPolicy, Notification, PrRef, RunState, Screening, SignalInputs, Signals, Verdict,
};

use crate::config::RunConfig;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::TransportError;
use crate::github_bridge::{fetch_aux, SignalSource};
use crate::oracle::{CompletionOracle, OracleCache};
use crate::telemetry::{Pass, PassReport, PrOutcome, RunReport};

/// Source of "now" for stall checks.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Mutable state scoped to a single run.
struct RunContext {
    state: RunState,
    oracle: OracleCache,
    outcomes: Vec<PrOutcome>,
    limit_reached: bool,
}

pub struct Orchestrator {
    source: Arc<dyn SignalSource>,
    oracle: Option<Arc<dyn CompletionOracle>>,
    config: RunConfig,
    policy: DecisionPolicy,
    dispatcher: Dispatcher,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn SignalSource>,
        oracle: Option<Arc<dyn CompletionOracle>>,
        config: RunConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(source.clone(), config.dry_run);
        Self {
            source,
            oracle,
            config,
            policy: DecisionPolicy::new(),
            dispatcher,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Run once, shuffling with the configured seed or the thread RNG.
    pub async fn run(&self) -> Result<RunReport, TransportError> {
        let mut candidates = self.collect_candidates().await?;
        match self.config.seed {
            Some(seed) => candidates.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => candidates.shuffle(&mut rand::rng()),
        }
        Ok(self.run_passes(candidates).await)
    }

    /// Run once with a caller-supplied shuffle source.
    pub async fn run_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<RunReport, TransportError> {
        let mut candidates = self.collect_candidates().await?;
        candidates.shuffle(rng);
        Ok(self.run_passes(candidates).await)
    }

    /// Unique PR candidates from the inbox, in inbox order.
    async fn collect_candidates(&self) -> Result<Vec<PrRef>, TransportError> {
        let notifications = self.source.list_notifications().await?;
        let candidates = pull_request_candidates(&notifications);
        info!(
            notifications = notifications.len(),
            candidates = candidates.len(),
            "Collected PR candidates"
        );
        Ok(candidates)
    }

    async fn run_passes(&self, order: Vec<PrRef>) -> RunReport {
        let mut ctx = RunContext {
            state: RunState::new(self.config.max_nudges),
            oracle: OracleCache::new(),
            outcomes: Vec::new(),
            limit_reached: false,
        };

        let mut passes = vec![
            self.run_pass(&mut ctx, &order, Pass::Strict, self.config.strict_threshold)
                .await,
        ];

        let dispatched = ctx.state.dispatched();
        if dispatched < self.config.min_dispatched && !ctx.state.budget_exhausted() {
            info!(
                dispatched,
                floor = self.config.min_dispatched,
                "Below dispatch floor — starting relaxed pass"
            );
            passes.push(
                self.run_pass(&mut ctx, &order, Pass::Relaxed, self.config.relaxed_threshold)
                    .await,
            );
        }

        RunReport {
            dry_run: self.config.dry_run,
            cap: ctx.state.cap(),
            candidates: order.len(),
            dispatched: ctx.state.dispatched(),
            remaining_budget: ctx.state.remaining_budget(),
            oracle_calls: ctx.oracle.calls(),
            limit_reached: ctx.limit_reached,
            passes,
            outcomes: ctx.outcomes,
        }
    }

    /// Sweep the candidates in order, skipping terminal keys.
    ///
    /// Once the budget is spent, one more candidate is evaluated so the
    /// limit shows up in the report, then the pass stops.
    async fn run_pass(
        &self,
        ctx: &mut RunContext,
        order: &[PrRef],
        pass: Pass,
        threshold: Duration,
    ) -> PassReport {
        let dispatched_before = ctx.state.dispatched();
        let mut evaluated = 0;

        for pr in order {
            if ctx.state.is_terminal(pr) {
                debug!(pr = %pr, pass = %pass, "Already settled — skipping");
                continue;
            }
            let exhausted = ctx.state.budget_exhausted();
            let outcome = self.evaluate(ctx, pr, pass, threshold).await;
            ctx.outcomes.push(outcome);
            evaluated += 1;
            if exhausted {
                info!(pass = %pass, "Nudge budget exhausted — stopping");
                ctx.limit_reached = true;
                break;
            }
        }

        let report = PassReport {
            pass,
            threshold_mins: threshold.num_minutes(),
            evaluated,
            dispatched: ctx.state.dispatched() - dispatched_before,
        };
        info!(
            pass = %pass,
            evaluated = report.evaluated,
            dispatched = report.dispatched,
            remaining = ctx.state.remaining_budget(),
            "Pass complete"
        );
        report
    }

    async fn evaluate(
        &self,
        ctx: &mut RunContext,
        pr: &PrRef,
        pass: Pass,
        threshold: Duration,
    ) -> PrOutcome {
        let snapshot = match self.source.get_pull_request(pr).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    pr = %pr,
                    pass = %pass,
                    error = %e,
                    "Failed to fetch PR — excluding from run"
                );
                ctx.state.mark_terminal(pr);
                return PrOutcome {
                    pr: pr.key(),
                    pass,
                    verdict: None,
                    dispatch: None,
                    error: Some(e.to_string()),
                    terminal: true,
                };
            }
        };

        let limit = self.config.comment_limit;
        let comments =
            fetch_aux(pr, "issue_comments", self.source.list_issue_comments(pr, limit)).await;
        let review_comments =
            fetch_aux(pr, "review_comments", self.source.list_review_comments(pr, limit)).await;
        let timeline = fetch_aux(
            pr,
            "timeline",
            self.source.list_timeline_events(pr, self.config.timeline_limit),
        )
        .await;
        let check_runs = fetch_aux(
            pr,
            "check_runs",
            self.source.list_check_runs(pr, &snapshot.head_sha),
        )
        .await;

        let inputs = SignalInputs {
            pr: snapshot,
            comments,
            review_comments,
            timeline,
            check_runs,
        };
        let signals = Signals::extract(&inputs, &self.config.bot_login, (self.clock)());
        let verdict = self.judge(ctx, pr, &signals, threshold).await;
        info!(
            pr = %pr,
            pass = %pass,
            eligible = verdict.eligible,
            action = %verdict.action,
            reason = %verdict.reason,
            "Verdict"
        );

        let dispatch = self.dispatcher.dispatch(&mut ctx.state, pr, &verdict).await;
        let terminal = verdict.is_terminal()
            || dispatch.dispatched()
            || matches!(dispatch, DispatchOutcome::Failed { .. });
        if terminal {
            ctx.state.mark_terminal(pr);
        }

        PrOutcome {
            pr: pr.key(),
            pass,
            verdict: Some(verdict),
            dispatch: Some(dispatch),
            error: None,
            terminal,
        }
    }

    /// Screen first; only PRs that pass the cheap gates reach the oracle.
    async fn judge(
        &self,
        ctx: &mut RunContext,
        pr: &PrRef,
        signals: &Signals,
        threshold: Duration,
    ) -> Verdict {
        let judged_fixed = match self.policy.screen(signals, threshold) {
            Screening::Rejected(verdict) => return verdict,
            Screening::NeedsOracle => {
                ctx.oracle
                    .judge(pr, signals.oracle_subject(), self.oracle.as_deref())
                    .await
            }
        };
        self.policy.decide(signals, threshold, judged_fixed)
    }
}

/// PR references from notifications, first occurrence wins.
pub fn pull_request_candidates(notifications: &[Notification]) -> Vec<PrRef> {
    let mut seen = HashSet::new();
    notifications
        .iter()
        .filter_map(Notification::pr_ref)
        .filter(|pr| seen.insert(pr.clone()))
        .collect()
}
