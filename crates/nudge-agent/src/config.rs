use chrono::Duration;
use clap::Parser;
use triage::DEFAULT_BOT_LOGIN;

use crate::error::ConfigError;

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_ORACLE_MODEL: &str = "gpt-4o-mini";

/// Command-line flags for one run.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "nudge-agent",
    about = "Nudge stalled coding-assistant pull requests found in the notification inbox"
)]
pub struct Cli {
    /// Log intended nudges instead of posting them (still counts against the budget).
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum nudges per run, across both passes.
    #[arg(long, default_value_t = 5)]
    pub max_nudges: u32,

    /// Idle minutes before a PR counts as stalled in the first pass.
    #[arg(long, default_value_t = 60)]
    pub strict_threshold_mins: u32,

    /// Idle minutes before a PR counts as stalled in the relaxed second pass.
    #[arg(long, default_value_t = 30)]
    pub relaxed_threshold_mins: u32,

    /// Run the relaxed pass when the first pass dispatched fewer than this.
    #[arg(long, default_value_t = 2)]
    pub min_dispatched: u32,

    /// Issue and review comments fetched per PR (newest first).
    #[arg(long, default_value_t = 10)]
    pub comment_limit: u32,

    /// Timeline events fetched per PR.
    #[arg(long, default_value_t = 100)]
    pub timeline_limit: u32,

    /// Seed the candidate shuffle for a reproducible order.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// GitHub REST endpoint and credential.
#[derive(Debug, Clone)]
pub struct GithubEndpoint {
    pub api_url: String,
    pub token: String,
}

/// OpenAI-compatible completion endpoint for the resolution oracle.
#[derive(Debug, Clone)]
pub struct OracleEndpoint {
    pub url: String,
    pub api_key: String,
    pub model: String,
}

/// Knobs for the two-pass run loop.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub bot_login: String,
    pub max_nudges: u32,
    pub strict_threshold: Duration,
    pub relaxed_threshold: Duration,
    pub min_dispatched: u32,
    pub comment_limit: u32,
    pub timeline_limit: u32,
    pub dry_run: bool,
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            bot_login: DEFAULT_BOT_LOGIN.into(),
            max_nudges: 5,
            strict_threshold: Duration::hours(1),
            relaxed_threshold: Duration::minutes(30),
            min_dispatched: 2,
            comment_limit: 10,
            timeline_limit: 100,
            dry_run: false,
            seed: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_nudges == 0 {
            return Err(ConfigError::Invalid {
                message: "--max-nudges must be at least 1".into(),
            });
        }
        if self.relaxed_threshold >= self.strict_threshold {
            return Err(ConfigError::Invalid {
                message: format!(
                    "relaxed threshold ({}m) must be below strict threshold ({}m)",
                    self.relaxed_threshold.num_minutes(),
                    self.strict_threshold.num_minutes()
                ),
            });
        }
        if self.bot_login.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "NUDGE_BOT_LOGIN must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct NudgeConfig {
    pub github: GithubEndpoint,
    /// Resolution oracle (optional; absent means "never judged fixed").
    pub oracle: Option<OracleEndpoint>,
    pub run: RunConfig,
}

impl NudgeConfig {
    /// Build from CLI flags and the process environment.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::from_lookup(cli, |key| std::env::var(key).ok())
    }

    /// Build from CLI flags and an arbitrary variable lookup.
    pub fn from_lookup<F>(cli: &Cli, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("GITHUB_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingCredential {
                var: "GITHUB_TOKEN",
            })?;
        let github = GithubEndpoint {
            api_url: lookup("NUDGE_GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.into()),
            token,
        };

        let run = RunConfig {
            bot_login: lookup("NUDGE_BOT_LOGIN").unwrap_or_else(|| DEFAULT_BOT_LOGIN.into()),
            max_nudges: cli.max_nudges,
            strict_threshold: Duration::minutes(i64::from(cli.strict_threshold_mins)),
            relaxed_threshold: Duration::minutes(i64::from(cli.relaxed_threshold_mins)),
            min_dispatched: cli.min_dispatched,
            comment_limit: cli.comment_limit,
            timeline_limit: cli.timeline_limit,
            dry_run: cli.dry_run,
            seed: cli.seed,
        };
        run.validate()?;

        Ok(Self {
            github,
            oracle: Self::oracle_from_lookup(&lookup),
            run,
        })
    }

    fn oracle_from_lookup<F>(lookup: &F) -> Option<OracleEndpoint>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("NUDGE_ORACLE_URL")?;
        let api_key = lookup("NUDGE_ORACLE_API_KEY").unwrap_or_else(|| "not-needed".into());
        let model = lookup("NUDGE_ORACLE_MODEL").unwrap_or_else(|| DEFAULT_ORACLE_MODEL.into());
        Some(OracleEndpoint {
            url,
            api_key,
            model,
        })
    }
}
