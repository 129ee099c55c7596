//! Error types for configuration, transport and the completion oracle.
//!
//! Only `ConfigError` is fatal. Transport and oracle errors are caught at
//! the point of use and degrade the affected PR's signals.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required credential is not set.
    #[error("missing credential: set {var}")]
    MissingCredential { var: &'static str },

    /// A value is present but unusable.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl TransportError {
    /// HTTP status code, when the host answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Decode { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle client setup failed: {0}")]
    Setup(String),

    #[error("oracle completion failed: {0}")]
    Completion(String),
}
