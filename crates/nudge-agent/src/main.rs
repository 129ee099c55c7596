use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use nudge_agent::telemetry::init_tracing;
use nudge_agent::{
    Cli, CompletionOracle, GithubBridge, NudgeConfig, Orchestrator, RigOracle, SignalSource,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = NudgeConfig::load(&cli)?;
    info!(
        api = %config.github.api_url,
        bot = %config.run.bot_login,
        max_nudges = config.run.max_nudges,
        dry_run = config.run.dry_run,
        oracle = config.oracle.as_ref().map(|o| o.url.as_str()).unwrap_or("none"),
        "Nudge agent starting"
    );

    let source: Arc<dyn SignalSource> = Arc::new(GithubBridge::new(&config.github)?);
    let oracle: Option<Arc<dyn CompletionOracle>> = match &config.oracle {
        Some(endpoint) => match RigOracle::new(endpoint) {
            Ok(oracle) => Some(Arc::new(oracle) as Arc<dyn CompletionOracle>),
            Err(e) => {
                warn!("Oracle not available — every PR treated as unresolved: {e}");
                None
            }
        },
        None => None,
    };

    let orchestrator = Orchestrator::new(source, oracle, config.run);
    let report = orchestrator
        .run()
        .await
        .context("failed to list notifications")?;

    report.log_summary();
    if cli.json {
        println!("{}", report.to_json()?);
    }

    Ok(())
}
