//! Decision Policy — eligibility gate and action priority
//!
//! Consumes [`Signals`] plus the completion oracle's answer and produces a
//! [`Verdict`]. All decisions are deterministic; the oracle call itself
//! happens outside this module.
//!
//! # Eligibility gate (all must hold, evaluated in order)
//!
//! ```text
//! automated author ──no──► NotAutomated        (terminal)
//!     │
//! stalled > threshold ──no──► NotStalled       (retry in relaxed pass)
//!     │
//! needs attention ──no──► NoAttentionNeeded    (retry in relaxed pass)
//!     │
//! oracle says fixed ──yes──► AlreadyResolved
//!     │
//!     ▼
//! action: conflict > ci-failure > feedback > generic-nudge
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::signals::Signals;
use crate::templates::NudgeKind;

/// Which nudge, if any, a verdict calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Conflict,
    CiFailure,
    Feedback,
    GenericNudge,
    None,
}

impl ActionKind {
    /// Template to post, `None` for [`ActionKind::None`].
    pub fn nudge(self) -> Option<NudgeKind> {
        match self {
            Self::Conflict => Some(NudgeKind::Conflict),
            Self::CiFailure => Some(NudgeKind::CiFailure),
            Self::Feedback => Some(NudgeKind::Feedback),
            Self::GenericNudge => Some(NudgeKind::GenericNudge),
            Self::None => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.nudge() {
            Some(kind) => write!(f, "{kind}"),
            None => write!(f, "none"),
        }
    }
}

/// Why a verdict came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum VerdictReason {
    /// Not attributable to the coding assistant.
    NotAutomated,
    /// Updated too recently for this pass's threshold.
    NotStalled { idle_secs: i64, threshold_secs: i64 },
    /// Stalled, but nothing indicates the assistant needs a push.
    NoAttentionNeeded,
    /// The completion oracle judged the latest comment as resolved.
    AlreadyResolved,
    /// Eligible; a nudge was selected.
    Actionable,
}

impl std::fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAutomated => write!(f, "not an assistant PR"),
            Self::NotStalled {
                idle_secs,
                threshold_secs,
            } => write!(f, "idle {}s (threshold: {}s)", idle_secs, threshold_secs),
            Self::NoAttentionNeeded => write!(f, "no attention signal"),
            Self::AlreadyResolved => write!(f, "judged already resolved"),
            Self::Actionable => write!(f, "actionable"),
        }
    }
}

/// Outcome of the policy for one PR in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub eligible: bool,
    pub action: ActionKind,
    pub reason: VerdictReason,
}

impl Verdict {
    /// An ineligible verdict. The action is always `None`.
    pub fn ineligible(reason: VerdictReason) -> Self {
        Self {
            eligible: false,
            action: ActionKind::None,
            reason,
        }
    }

    pub fn eligible(action: ActionKind) -> Self {
        Self {
            eligible: true,
            action,
            reason: VerdictReason::Actionable,
        }
    }

    /// Whether this verdict settles the PR for the rest of the run.
    ///
    /// Only "not automated" is final on its own. Stall and attention
    /// failures may flip under the relaxed threshold, and an eligible
    /// verdict becomes terminal through dispatch, not here.
    pub fn is_terminal(&self) -> bool {
        matches!(self.reason, VerdictReason::NotAutomated)
    }
}

/// Result of gates 1–3, before the oracle is consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    Rejected(Verdict),
    /// Passed the cheap gates; ask the oracle before deciding.
    NeedsOracle,
}

/// The policy has no tunables beyond the per-pass threshold today, but it
/// is kept as a value so callers hold one instance per run.
#[derive(Debug, Clone, Default)]
pub struct DecisionPolicy;

impl DecisionPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Apply the oracle-free gates in order.
    pub fn screen(&self, signals: &Signals, stall_threshold: Duration) -> Screening {
        if !signals.is_automated_author_pr {
            return Screening::Rejected(Verdict::ineligible(VerdictReason::NotAutomated));
        }
        if !signals.is_stalled(stall_threshold) {
            return Screening::Rejected(Verdict::ineligible(VerdictReason::NotStalled {
                idle_secs: signals.idle_for.num_seconds(),
                threshold_secs: stall_threshold.num_seconds(),
            }));
        }
        if !signals.needs_attention() {
            return Screening::Rejected(Verdict::ineligible(VerdictReason::NoAttentionNeeded));
        }
        Screening::NeedsOracle
    }

    /// Full verdict given the oracle's answer.
    pub fn decide(
        &self,
        signals: &Signals,
        stall_threshold: Duration,
        judged_fixed: bool,
    ) -> Verdict {
        if let Screening::Rejected(verdict) = self.screen(signals, stall_threshold) {
            return verdict;
        }
        if judged_fixed {
            return Verdict::ineligible(VerdictReason::AlreadyResolved);
        }
        Verdict::eligible(self.select_action(signals))
    }

    /// First match wins: conflict blocks everything, then red CI, then
    /// line feedback, then the generic nudge.
    pub fn select_action(&self, signals: &Signals) -> ActionKind {
        if signals.has_merge_conflict {
            ActionKind::Conflict
        } else if signals.has_failing_checks {
            ActionKind::CiFailure
        } else if signals.has_review_comments {
            ActionKind::Feedback
        } else {
            ActionKind::GenericNudge
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> Signals {
        Signals {
            is_automated_author_pr: true,
            is_wip: true,
            idle_for: Duration::hours(2),
            has_merge_conflict: false,
            session_stopped: false,
            session_failed: false,
            has_error_comment: false,
            has_failing_checks: false,
            has_review_comments: false,
            latest_relevant_comment: None,
            latest_feedback_comment: None,
        }
    }

    fn strict() -> Duration {
        Duration::hours(1)
    }

    #[test]
    fn test_not_automated_is_rejected_first() {
        let mut s = signals();
        s.is_automated_author_pr = false;
        s.idle_for = Duration::zero();
        let v = DecisionPolicy::new().decide(&s, strict(), false);
        assert_eq!(v.reason, VerdictReason::NotAutomated);
        assert!(v.is_terminal());
    }

    #[test]
    fn test_not_stalled_reports_idle_and_threshold() {
        let mut s = signals();
        s.idle_for = Duration::minutes(45);
        let v = DecisionPolicy::new().decide(&s, strict(), false);
        assert_eq!(
            v.reason,
            VerdictReason::NotStalled {
                idle_secs: 45 * 60,
                threshold_secs: 3600
            }
        );
        assert!(!v.is_terminal());
        assert!(DecisionPolicy::new()
            .decide(&s, Duration::minutes(30), false)
            .eligible);
    }

    #[test]
    fn test_each_attention_signal_qualifies() {
        let setters: [fn(&mut Signals); 5] = [
            |s| s.is_wip = true,
            |s| s.session_stopped = true,
            |s| s.has_error_comment = true,
            |s| s.session_failed = true,
            |s| s.has_failing_checks = true,
        ];
        for set in setters {
            let mut s = signals();
            s.is_wip = false;
            set(&mut s);
            assert!(DecisionPolicy::new().decide(&s, strict(), false).eligible);
        }
    }

    #[test]
    fn test_no_attention_signal_is_not_terminal() {
        let mut s = signals();
        s.is_wip = false;
        let v = DecisionPolicy::new().decide(&s, strict(), false);
        assert_eq!(v.reason, VerdictReason::NoAttentionNeeded);
        assert_eq!(v.action, ActionKind::None);
        assert!(!v.is_terminal());
    }

    #[test]
    fn test_oracle_fixed_blocks_eligibility() {
        let v = DecisionPolicy::new().decide(&signals(), strict(), true);
        assert!(!v.eligible);
        assert_eq!(v.action, ActionKind::None);
        assert_eq!(v.reason, VerdictReason::AlreadyResolved);
    }

    #[test]
    fn test_screen_passes_before_oracle() {
        assert_eq!(
            DecisionPolicy::new().screen(&signals(), strict()),
            Screening::NeedsOracle
        );
    }

    #[test]
    fn test_priority_order() {
        let policy = DecisionPolicy::new();
        let mut s = signals();
        assert_eq!(policy.select_action(&s), ActionKind::GenericNudge);
        s.has_review_comments = true;
        assert_eq!(policy.select_action(&s), ActionKind::Feedback);
        s.has_failing_checks = true;
        assert_eq!(policy.select_action(&s), ActionKind::CiFailure);
        s.has_merge_conflict = true;
        assert_eq!(policy.select_action(&s), ActionKind::Conflict);
    }

    #[test]
    fn test_action_nudge_mapping() {
        assert_eq!(ActionKind::None.nudge(), None);
        assert_eq!(ActionKind::Feedback.nudge(), Some(NudgeKind::Feedback));
        assert_eq!(ActionKind::CiFailure.to_string(), "ci-failure");
        assert_eq!(ActionKind::None.to_string(), "none");
    }
}
