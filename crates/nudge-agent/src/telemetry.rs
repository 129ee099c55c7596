//! Run telemetry: tracing setup and the serialisable run report.
//!
//! Every per-PR log line carries `pr` and `pass` fields. The report is the
//! machine-readable summary of one run, printed with `--json`.

use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use triage::Verdict;

use crate::dispatcher::DispatchOutcome;

/// Install the fmt subscriber with `RUST_LOG` filtering (default `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

/// Which sweep a PR was evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    Strict,
    Relaxed,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Relaxed => write!(f, "relaxed"),
        }
    }
}

/// The result of evaluating one PR in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct PrOutcome {
    /// `owner/repo#number`.
    pub pr: String,
    pub pass: Pass,
    /// Absent when the PR itself could not be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Absent when no verdict was reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchOutcome>,
    /// Primary fetch failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the PR was excluded from the rest of the run.
    pub terminal: bool,
}

/// Per-pass counters.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass: Pass,
    pub threshold_mins: i64,
    /// PRs evaluated in this pass.
    pub evaluated: usize,
    /// Actions counted against the budget in this pass.
    pub dispatched: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    /// Configured maximum nudges.
    pub cap: u32,
    /// Unique PR candidates derived from the inbox.
    pub candidates: usize,
    pub dispatched: u32,
    pub remaining_budget: u32,
    /// Completions actually requested from the oracle.
    pub oracle_calls: u32,
    /// Whether evaluation stopped because the budget ran out.
    pub limit_reached: bool,
    pub passes: Vec<PassReport>,
    pub outcomes: Vec<PrOutcome>,
}

impl RunReport {
    pub fn log_summary(&self) {
        info!(
            dry_run = self.dry_run,
            candidates = self.candidates,
            dispatched = self.dispatched,
            remaining = self.remaining_budget,
            passes = self.passes.len(),
            oracle_calls = self.oracle_calls,
            limit_reached = self.limit_reached,
            "Run complete"
        );
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
