//! Triage — deterministic decision logic for nudging stalled assistant PRs
//!
//! This crate provides:
//! - A typed model of the pull-request data a run fetches
//! - Pure signal extraction over that data
//! - The eligibility gate and action priority (`DecisionPolicy`)
//! - The closed set of nudge templates
//! - Run-scoped budget and dedup bookkeeping (`RunState`)
//!
//! Nothing in here performs I/O. The `nudge-agent` crate owns transport,
//! the completion oracle, dispatch and the two-pass run loop.

pub mod model;
pub mod policy;
pub mod resilience;
pub mod run_state;
pub mod signals;
pub mod templates;

pub use model::{
    CheckConclusion, CheckRun, Comment, Mergeable, Notification, PrRef, PrSnapshot,
    SessionOutcome, TimelineEvent, TimelineKind,
};
pub use policy::{ActionKind, DecisionPolicy, Screening, Verdict, VerdictReason};
pub use resilience::Availability;
pub use run_state::RunState;
pub use signals::{SignalInputs, Signals};
pub use templates::{is_nudge_template, NudgeKind, DEFAULT_BOT_LOGIN};
