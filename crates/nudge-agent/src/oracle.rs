//! Completion oracle: asks a language model whether the latest comment on a
//! PR says the work is already done.
//!
//! The oracle is optional. With no endpoint, no comment, or any failure the
//! answer is "not resolved", so the run keeps nudging rather than silently
//! going quiet.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use tracing::{debug, warn};
use triage::{Comment, PrRef};

use crate::config::OracleEndpoint;
use crate::error::OracleError;

const PREAMBLE: &str = "You review pull request conversations. Answer with YES or NO only.";

/// A text-completion backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionOracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// `CompletionOracle` over an OpenAI-compatible endpoint via rig.
pub struct RigOracle {
    client: openai::CompletionsClient,
    model: String,
}

impl RigOracle {
    pub fn new(endpoint: &OracleEndpoint) -> Result<Self, OracleError> {
        let client = openai::CompletionsClient::builder()
            .api_key(&endpoint.api_key)
            .base_url(&endpoint.url)
            .build()
            .map_err(|e| OracleError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            model: endpoint.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionOracle for RigOracle {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let agent = self.client.agent(&self.model).preamble(PREAMBLE).build();
        let response: String = agent.prompt(prompt).await?;
        Ok(response)
    }
}

/// Prompt embedding the comment body verbatim.
pub fn resolution_prompt(comment_body: &str) -> String {
    format!(
        "Here is the latest comment on a pull request:\n\n\
         ---\n{comment_body}\n---\n\n\
         Does this comment indicate that the issue has been resolved and no further \
         work is needed? Reply YES or NO."
    )
}

/// Trim, uppercase, look for YES anywhere in the reply.
pub fn parse_resolution(reply: &str) -> bool {
    reply.trim().to_uppercase().contains("YES")
}

async fn ask(body: &str, oracle: &dyn CompletionOracle) -> Result<bool, OracleError> {
    let reply = oracle
        .complete(&resolution_prompt(body))
        .await
        .map_err(|e| OracleError::Completion(format!("{e:#}")))?;
    debug!(reply = %reply.trim(), "Oracle replied");
    Ok(parse_resolution(&reply))
}

/// Per-run memo of oracle answers, so a PR revisited in the relaxed pass is
/// not asked twice. Failed calls are not memoised.
#[derive(Debug, Default)]
pub struct OracleCache {
    answers: HashMap<PrRef, bool>,
    calls: u32,
}

impl OracleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completions actually requested this run.
    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn cached(&self, pr: &PrRef) -> Option<bool> {
        self.answers.get(pr).copied()
    }

    /// Cached answer, or ask the oracle and remember a successful reply.
    ///
    /// A missing comment, body or oracle is `Ok(false)` without a call.
    pub async fn resolve(
        &mut self,
        pr: &PrRef,
        comment: Option<&Comment>,
        oracle: Option<&dyn CompletionOracle>,
    ) -> Result<bool, OracleError> {
        if let Some(answer) = self.cached(pr) {
            debug!(pr = %pr, answer, "Oracle answer reused");
            return Ok(answer);
        }
        let (Some(body), Some(oracle)) = (comment.and_then(|c| c.body.as_deref()), oracle) else {
            return Ok(false);
        };
        self.calls += 1;
        let answer = ask(body, oracle).await?;
        self.answers.insert(pr.clone(), answer);
        Ok(answer)
    }

    /// Whether the latest comment says the work is done. Never propagates:
    /// any oracle failure reads as "not resolved".
    pub async fn judge(
        &mut self,
        pr: &PrRef,
        comment: Option<&Comment>,
        oracle: Option<&dyn CompletionOracle>,
    ) -> bool {
        self.resolve(pr, comment, oracle).await.unwrap_or_else(|e| {
            warn!(pr = %pr, error = %e, "Oracle failed — assuming not resolved");
            false
        })
    }
}
