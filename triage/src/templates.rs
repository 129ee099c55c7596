//! Nudge templates — the only comment bodies this system ever posts
//!
//! The same closed set is used for dispatch (what to post) and for
//! recognising our own prior nudges in a comment thread, so the two can
//! never drift apart.

use serde::{Deserialize, Serialize};

/// Login the coding assistant authors pull requests and comments under.
pub const DEFAULT_BOT_LOGIN: &str = "Copilot";

/// Which templated nudge to post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NudgeKind {
    Conflict,
    CiFailure,
    Feedback,
    GenericNudge,
}

impl NudgeKind {
    pub const ALL: [NudgeKind; 4] = [
        Self::Conflict,
        Self::CiFailure,
        Self::Feedback,
        Self::GenericNudge,
    ];

    /// Exact comment text for this nudge.
    pub fn body(self) -> &'static str {
        match self {
            Self::Conflict => {
                "@copilot This PR has a merge conflict. Please merge in the base branch and resolve the conflicts."
            }
            Self::CiFailure => {
                "@copilot The CI checks are failing on this PR. Please fix the failing tests or build issues."
            }
            Self::Feedback => "@copilot Please implement the feedback left on this PR.",
            Self::GenericNudge => "@copilot Are you still working?",
        }
    }

    /// Find the template a text is an exact (whitespace-trimmed) copy of.
    pub fn from_body(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|kind| kind.body() == text)
    }
}

impl std::fmt::Display for NudgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::CiFailure => write!(f, "ci-failure"),
            Self::Feedback => write!(f, "feedback"),
            Self::GenericNudge => write!(f, "generic-nudge"),
        }
    }
}

/// Whether `text` is one of our own nudges.
pub fn is_nudge_template(text: &str) -> bool {
    NudgeKind::from_body(text).is_some()
}
