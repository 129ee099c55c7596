//! Nudge agent — async collaborators and the two-pass run loop.
//!
//! The decision logic lives in the `triage` crate. This crate wires it to
//! the GitHub REST API, an optional completion oracle and a rate-limited
//! dispatcher.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod github_bridge;
pub mod oracle;
pub mod orchestrator;
pub mod telemetry;

pub use config::{Cli, NudgeConfig, RunConfig};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{ConfigError, OracleError, TransportError};
pub use github_bridge::{GithubBridge, SignalSource};
pub use oracle::{CompletionOracle, OracleCache, RigOracle};
pub use orchestrator::Orchestrator;
pub use telemetry::{Pass, PassReport, PrOutcome, RunReport};
