//! Signal extraction — pure predicates over fetched pull-request data
//!
//! No I/O happens here. Every function is deterministic given its inputs
//! (the caller supplies `now`), so each one can be tested against fixtures.

use chrono::{DateTime, Duration, Utc};
use crate::model::{
    CheckRun, Comment, Mergeable, PrSnapshot, SessionOutcome, TimelineEvent, TimelineKind,
};
use crate::resilience::Availability;
use crate::templates::is_nudge_template;

/// Phrases the assistant uses when it gives up or hits an error.
/// Matched against the lower-cased comment body.
pub const ERROR_PHRASES: &[&str] = &[
    "encountered an error",
    "was unable to",
    "i apologize",
    "unfortunately",
    "something went wrong",
    "failed to",
    "having trouble",
    "i'm sorry",
];

const ASSISTANT_MARKER: &str = "copilot";
const WIP_MARKER: &str = "wip";
const DIRTY_STATE: &str = "dirty";

/// Whether the PR is attributable to the coding assistant.
pub fn is_automated_author_pr(pr: &PrSnapshot, bot_login: &str) -> bool {
    pr.author_login.eq_ignore_ascii_case(bot_login)
        || pr.title.to_lowercase().contains(ASSISTANT_MARKER)
        || pr
            .body
            .as_deref()
            .is_some_and(|body| body.contains(ASSISTANT_MARKER))
}

/// Title mentions WIP (any case) or the PR is a draft.
pub fn is_wip(pr: &PrSnapshot) -> bool {
    pr.is_draft || pr.title.to_lowercase().contains(WIP_MARKER)
}

/// True iff the PR has been idle strictly longer than `threshold`.
pub fn is_stalled(pr: &PrSnapshot, threshold: Duration, now: DateTime<Utc>) -> bool {
    now - pr.updated_at > threshold
}

/// Only an explicit `mergeable = false` with state `dirty` is a conflict.
/// Unknown mergeability means the host has not finished computing it.
pub fn has_merge_conflict(pr: &PrSnapshot) -> bool {
    pr.mergeable == Mergeable::No && pr.mergeable_state.as_deref() == Some(DIRTY_STATE)
}

pub fn session_stopped(events: &[TimelineEvent]) -> bool {
    events.iter().any(|e| e.kind == TimelineKind::SessionStopped)
}

pub fn session_failed(events: &[TimelineEvent]) -> bool {
    events.iter().any(|e| {
        e.kind == TimelineKind::SessionStopped && e.session_outcome == Some(SessionOutcome::Failure)
    })
}

/// A bot-authored comment that reads like an error report or apology.
pub fn has_error_comment(comment: Option<&Comment>, bot_login: &str) -> bool {
    let Some(comment) = comment else {
        return false;
    };
    let by_bot = comment
        .author_login
        .as_deref()
        .is_some_and(|login| login.eq_ignore_ascii_case(bot_login));
    if !by_bot {
        return false;
    }
    let Some(body) = comment.body.as_deref() else {
        return false;
    };
    let body = body.to_lowercase();
    ERROR_PHRASES.iter().any(|phrase| body.contains(phrase))
}

/// Failure, action_required and timed_out count; pending, neutral and skipped do not.
pub fn has_failing_checks(check_runs: &[CheckRun]) -> bool {
    check_runs
        .iter()
        .any(|run| run.conclusion.is_some_and(|c| c.is_failing()))
}

/// Newest comment that is not one of our own nudges.
pub fn find_relevant_comment(comments: &[Comment]) -> Option<&Comment> {
    comments
        .iter()
        .find(|c| !c.body.as_deref().is_some_and(is_nudge_template))
}

/// Newest review comment with a known author other than the bot.
pub fn find_latest_review_comment<'a>(
    review_comments: &'a [Comment],
    bot_login: &str,
) -> Option<&'a Comment> {
    review_comments.iter().find(|c| {
        c.author_login
            .as_deref()
            .is_some_and(|login| !login.eq_ignore_ascii_case(bot_login))
    })
}

/// Any open line feedback counts as unresolved work, whoever wrote it.
pub fn has_review_comments(review_comments: &[Comment]) -> bool {
    !review_comments.is_empty()
}

/// Everything fetched for one PR in one pass.
#[derive(Debug, Clone)]
pub struct SignalInputs {
    pub pr: PrSnapshot,
    pub comments: Availability<Vec<Comment>>,
    pub review_comments: Availability<Vec<Comment>>,
    pub timeline: Availability<Vec<TimelineEvent>>,
    pub check_runs: Availability<Vec<CheckRun>>,
}

impl SignalInputs {
    /// Inputs with every auxiliary list present but empty.
    pub fn bare(pr: PrSnapshot) -> Self {
        Self {
            pr,
            comments: Vec::new().into(),
            review_comments: Vec::new().into(),
            timeline: Vec::new().into(),
            check_runs: Vec::new().into(),
        }
    }
}

/// Derived signals for one PR. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Signals {
    pub is_automated_author_pr: bool,
    pub is_wip: bool,
    /// Time since the last update, re-tested against each pass's threshold.
    pub idle_for: Duration,
    pub has_merge_conflict: bool,
    pub session_stopped: bool,
    pub session_failed: bool,
    pub has_error_comment: bool,
    pub has_failing_checks: bool,
    pub has_review_comments: bool,
    pub latest_relevant_comment: Option<Comment>,
    pub latest_feedback_comment: Option<Comment>,
}

impl Signals {
    pub fn extract(inputs: &SignalInputs, bot_login: &str, now: DateTime<Utc>) -> Self {
        let pr = &inputs.pr;
        let comments = inputs.comments.items();
        let review_comments = inputs.review_comments.items();
        let timeline = inputs.timeline.items();

        let latest_relevant_comment = find_relevant_comment(comments).cloned();
        let has_error_comment = has_error_comment(latest_relevant_comment.as_ref(), bot_login);

        Self {
            is_automated_author_pr: is_automated_author_pr(pr, bot_login),
            is_wip: is_wip(pr),
            idle_for: now - pr.updated_at,
            has_merge_conflict: has_merge_conflict(pr),
            session_stopped: session_stopped(timeline),
            session_failed: session_failed(timeline),
            has_error_comment,
            has_failing_checks: has_failing_checks(inputs.check_runs.items()),
            has_review_comments: has_review_comments(review_comments),
            latest_relevant_comment,
            latest_feedback_comment: find_latest_review_comment(review_comments, bot_login)
                .cloned(),
        }
    }

    /// Same comparison as [`is_stalled`], against the stored idle time.
    pub fn is_stalled(&self, threshold: Duration) -> bool {
        self.idle_for > threshold
    }

    /// WIP, or the assistant stopped, errored, or left CI red.
    pub fn needs_attention(&self) -> bool {
        self.is_wip
            || self.session_stopped
            || self.has_error_comment
            || self.session_failed
            || self.has_failing_checks
    }

    /// The latest human-facing comment to hand to the completion oracle:
    /// whichever of the relevant issue comment and the feedback comment is newer.
    pub fn oracle_subject(&self) -> Option<&Comment> {
        match (
            self.latest_relevant_comment.as_ref(),
            self.latest_feedback_comment.as_ref(),
        ) {
            (Some(issue), Some(review)) if review.created_at > issue.created_at => Some(review),
            (Some(issue), _) => Some(issue),
            (None, review) => review,
        }
    }
}
