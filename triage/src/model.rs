//! Data model — snapshots of pull-request state as seen by one run
//!
//! Every value here is immutable for the duration of a single evaluation.
//! Nothing is persisted between runs; eligibility is always re-derived
//! from freshly fetched snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifies one pull request across repositories.
///
/// Its `key()` form (`owner/repo#number`) is what the dedup set stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PrRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    /// Render the stable `owner/repo#number` key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for PrRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// One inbox notification. Only pull-request subjects become candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject_type: String,
    pub subject_url: String,
    pub repo_owner: String,
    pub repo_name: String,
}

impl Notification {
    pub const PULL_REQUEST_SUBJECT: &'static str = "PullRequest";

    /// Resolve the pull request this notification is about.
    ///
    /// Returns `None` for non-PR subjects or subject URLs that do not end in
    /// `/pulls/<number>`.
    pub fn pr_ref(&self) -> Option<PrRef> {
        if self.subject_type != Self::PULL_REQUEST_SUBJECT {
            return None;
        }
        let mut segments = self.subject_url.trim_end_matches('/').rsplit('/');
        let number = segments.next()?.parse::<u64>().ok()?;
        if segments.next()? != "pulls" {
            return None;
        }
        Some(PrRef::new(&self.repo_owner, &self.repo_name, number))
    }
}

/// Tri-state mergeability as reported by the host.
///
/// The host computes mergeability lazily, so `Unknown` is a normal state
/// right after a push and must never be read as a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mergeable {
    Yes,
    No,
    #[default]
    Unknown,
}

impl From<Option<bool>> for Mergeable {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Yes,
            Some(false) => Self::No,
            None => Self::Unknown,
        }
    }
}

impl From<Mergeable> for Option<bool> {
    fn from(value: Mergeable) -> Self {
        match value {
            Mergeable::Yes => Some(true),
            Mergeable::No => Some(false),
            Mergeable::Unknown => None,
        }
    }
}

impl Serialize for Mergeable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Option::<bool>::from(*self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Mergeable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<bool>::deserialize(deserializer)?.into())
    }
}

/// Pull request state frozen for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrSnapshot {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub author_login: String,
    #[serde(default)]
    pub is_draft: bool,
    pub updated_at: DateTime<Utc>,
    pub head_sha: String,
    #[serde(default)]
    pub mergeable: Mergeable,
    #[serde(default)]
    pub mergeable_state: Option<String>,
}

/// An issue comment or a review (line) comment. Lists are newest-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub author_login: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Timeline event kinds the signal extractor cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    /// The assistant's working session ended.
    SessionStopped,
    /// Anything else, kept verbatim for logging.
    Other(String),
}

/// How an assistant session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Success,
    Failure,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub kind: TimelineKind,
    #[serde(default)]
    pub actor_login: Option<String>,
    #[serde(default)]
    pub session_outcome: Option<SessionOutcome>,
}

/// Check-run conclusion. `None` on the owning `CheckRun` means still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    ActionRequired,
    TimedOut,
    Neutral,
    Skipped,
    Cancelled,
    Stale,
    #[serde(other)]
    Other,
}

impl CheckConclusion {
    /// Whether this conclusion counts as red CI.
    pub fn is_failing(self) -> bool {
        matches!(self, Self::Failure | Self::ActionRequired | Self::TimedOut)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    #[serde(default)]
    pub conclusion: Option<CheckConclusion>,
}
