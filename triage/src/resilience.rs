//! Resilience — degraded mode for auxiliary signal fetches
//!
//! Timeline, check-run, comment and review fetches are helpful but not
//! essential. Instead of propagating their errors, callers wrap the result
//! in [`Availability`] and the signal extractor reads an unavailable list
//! as "signal absent".
//!
//! ```text
//! fetch timeline
//!   ├─ Ok(events)  → Available{value}    → sessionStopped computed
//!   └─ Err(e)      → Unavailable{reason} → sessionStopped = false
//! ```

use serde::{Deserialize, Serialize};

/// Tagged outcome of a fallible auxiliary fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Availability<T> {
    Available { value: T },
    Unavailable { reason: String },
}

impl<T> Availability<T> {
    pub fn available(value: T) -> Self {
        Self::Available { value }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Wrap any result, keeping only the error's display text.
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::available(value),
            Err(e) => Self::unavailable(e.to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Self::Available { value } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    /// Why the value is missing, if it is.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Available { .. } => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

impl<T> Availability<Vec<T>> {
    /// Items if available, else an empty slice.
    pub fn items(&self) -> &[T] {
        self.as_option().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl<T> From<T> for Availability<T> {
    fn from(value: T) -> Self {
        Self::available(value)
    }
}
