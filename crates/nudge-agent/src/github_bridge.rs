//! Bridge to the GitHub REST API.
//!
//! `SignalSource` is the seam the orchestrator and dispatcher depend on;
//! `GithubBridge` implements it over `reqwest`. Tests provide recording
//! mocks instead. Calls are not retried.
//!
//! Issue comments and timeline events only list oldest-first, so the bridge
//! reads the `Link` header of page 1 and fetches the last pages to reach
//! the newest entries.

use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use triage::{
    Availability, CheckRun, Comment, Notification, PrRef, PrSnapshot, SessionOutcome,
    TimelineEvent, TimelineKind,
};

use crate::config::GithubEndpoint;
use crate::error::TransportError;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("nudge-agent/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_PER_PAGE: u32 = 100;
const ERROR_BODY_MAX_CHARS: usize = 200;

const SESSION_FINISHED_EVENT: &str = "copilot_work_finished";
const SESSION_FAILED_EVENT: &str = "copilot_work_finished_failure";

/// Read and write access to the code host, as the run loop needs it.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn list_notifications(&self) -> Result<Vec<Notification>, TransportError>;

    async fn get_pull_request(&self, pr: &PrRef) -> Result<PrSnapshot, TransportError>;

    /// Newest first, at most `limit`.
    async fn list_issue_comments(
        &self,
        pr: &PrRef,
        limit: u32,
    ) -> Result<Vec<Comment>, TransportError>;

    /// Newest first, at most `limit`.
    async fn list_review_comments(
        &self,
        pr: &PrRef,
        limit: u32,
    ) -> Result<Vec<Comment>, TransportError>;

    /// The newest `limit` events, oldest-first.
    async fn list_timeline_events(
        &self,
        pr: &PrRef,
        limit: u32,
    ) -> Result<Vec<TimelineEvent>, TransportError>;

    async fn list_check_runs(
        &self,
        pr: &PrRef,
        git_ref: &str,
    ) -> Result<Vec<CheckRun>, TransportError>;

    async fn post_comment(&self, pr: &PrRef, body: &str) -> Result<(), TransportError>;
}

/// Await an auxiliary fetch, downgrading failure to "unavailable".
pub async fn fetch_aux<T, F>(pr: &PrRef, signal: &'static str, fetch: F) -> Availability<T>
where
    F: Future<Output = Result<T, TransportError>>,
{
    let result = fetch.await;
    if let Err(e) = &result {
        warn!(pr = %pr, signal, error = %e, "Auxiliary fetch failed — treating signal as absent");
    }
    Availability::from_result(result)
}

// ── Wire types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawNotification {
    subject: RawSubject,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawSubject {
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    name: String,
    owner: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RawPull {
    number: u64,
    title: String,
    body: Option<String>,
    user: Option<RawUser>,
    #[serde(default)]
    draft: bool,
    updated_at: DateTime<Utc>,
    head: RawHead,
    mergeable: Option<bool>,
    mergeable_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    user: Option<RawUser>,
    body: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawTimelineEvent {
    event: Option<String>,
    actor: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawCheckRuns {
    check_runs: Vec<CheckRun>,
}

fn notification_from_raw(raw: RawNotification) -> Option<Notification> {
    Some(Notification {
        subject_type: raw.subject.kind,
        subject_url: raw.subject.url?,
        repo_owner: raw.repository.owner.login,
        repo_name: raw.repository.name,
    })
}

fn snapshot_from_raw(raw: RawPull) -> PrSnapshot {
    PrSnapshot {
        number: raw.number,
        title: raw.title,
        body: raw.body,
        author_login: raw.user.map(|u| u.login).unwrap_or_default(),
        is_draft: raw.draft,
        updated_at: raw.updated_at,
        head_sha: raw.head.sha,
        mergeable: raw.mergeable.into(),
        mergeable_state: raw.mergeable_state,
    }
}

fn comment_from_raw(raw: RawComment) -> Comment {
    Comment {
        author_login: raw.user.map(|u| u.login),
        body: raw.body,
        created_at: raw.created_at,
    }
}

fn timeline_event_from_raw(raw: RawTimelineEvent) -> TimelineEvent {
    let (kind, session_outcome) = match raw.event.as_deref() {
        Some(SESSION_FINISHED_EVENT) => {
            (TimelineKind::SessionStopped, Some(SessionOutcome::Success))
        }
        Some(SESSION_FAILED_EVENT) => {
            (TimelineKind::SessionStopped, Some(SessionOutcome::Failure))
        }
        Some(other) => (TimelineKind::Other(other.to_string()), None),
        None => (TimelineKind::Other("unknown".into()), None),
    };
    TimelineEvent {
        kind,
        actor_login: raw.actor.map(|a| a.login),
        session_outcome,
    }
}

/// Sort newest first and keep at most `limit`.
fn newest_first(mut comments: Vec<Comment>, limit: u32) -> Vec<Comment> {
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    comments.truncate(limit as usize);
    comments
}

/// The `page` number of the `rel="last"` entry in a `Link` header.
fn last_page(link: &str) -> Option<u32> {
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="last""#) {
            return None;
        }
        let url = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        let (_, query) = url.split_once('?')?;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("page=")?.parse().ok())
    })
}

/// Pages to fetch after page 1, given the last page number.
///
/// The page before the last is included so a short last page still yields
/// a full page of the newest entries.
fn tail_pages(last: u32) -> RangeInclusive<u32> {
    last.saturating_sub(1).max(2)..=last
}

/// Join page 1 with the tail pages and keep the newest `limit`, oldest-first.
///
/// Page 1 is only contiguous with the tail when the listing has at most two
/// pages; otherwise it is dropped.
fn tail_of_listing<T>(first: Vec<T>, last: u32, tail: Vec<T>, limit: u32) -> Vec<T> {
    let mut items = if last <= 2 { first } else { Vec::new() };
    items.extend(tail);
    let skip = items.len().saturating_sub(limit as usize);
    items.split_off(skip)
}

fn truncate_for_error(text: &str) -> String {
    if text.chars().count() <= ERROR_BODY_MAX_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(ERROR_BODY_MAX_CHARS).collect();
    out.push('…');
    out
}

// ── Client ────────────────────────────────────────────────────────────

/// `SignalSource` over the GitHub REST API.
pub struct GithubBridge {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl GithubBridge {
    pub fn new(endpoint: &GithubEndpoint) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build GitHub HTTP client")?;
        Ok(Self {
            client,
            api_url: endpoint.api_url.trim_end_matches('/').to_string(),
            token: endpoint.token.clone(),
        })
    }

    fn repo_url(&self, pr: &PrRef, tail: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, pr.owner, pr.repo, tail)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(&self.token)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, TransportError> {
        let response = request.send().await.map_err(|source| TransportError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: truncate_for_error(&body),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TransportError> {
        Ok(self.get_page(url).await?.0)
    }

    /// GET and decode, also returning the last page number from `Link`.
    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<(T, Option<u32>), TransportError> {
        debug!(url, "GET");
        let response = self
            .send(self.request(reqwest::Method::GET, url), url)
            .await?;
        let last = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(last_page);
        let body = response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok((body, last))
    }

    /// The newest `limit` entries of an oldest-first listing, oldest-first.
    ///
    /// At most one full page is returned.
    async fn get_newest<T: DeserializeOwned>(
        &self,
        listing_url: &str,
        limit: u32,
    ) -> Result<Vec<T>, TransportError> {
        let page_url = |page: u32| format!("{listing_url}?per_page={MAX_PER_PAGE}&page={page}");
        let (first, last) = self.get_page::<Vec<T>>(&page_url(1)).await?;
        let last = last.unwrap_or(1);
        let mut tail = Vec::new();
        for page in tail_pages(last) {
            tail.extend(self.get_json::<Vec<T>>(&page_url(page)).await?);
        }
        if last > 1 {
            debug!(url = listing_url, last_page = last, "Read tail of paginated listing");
        }
        Ok(tail_of_listing(first, last, tail, limit.min(MAX_PER_PAGE)))
    }
}

#[async_trait]
impl SignalSource for GithubBridge {
    async fn list_notifications(&self) -> Result<Vec<Notification>, TransportError> {
        let url = format!("{}/notifications", self.api_url);
        let raw: Vec<RawNotification> = self.get_json(&url).await?;
        Ok(raw.into_iter().filter_map(notification_from_raw).collect())
    }

    async fn get_pull_request(&self, pr: &PrRef) -> Result<PrSnapshot, TransportError> {
        let url = self.repo_url(pr, &format!("pulls/{}", pr.number));
        let raw: RawPull = self.get_json(&url).await?;
        Ok(snapshot_from_raw(raw))
    }

    async fn list_issue_comments(
        &self,
        pr: &PrRef,
        limit: u32,
    ) -> Result<Vec<Comment>, TransportError> {
        let url = self.repo_url(pr, &format!("issues/{}/comments", pr.number));
        let raw: Vec<RawComment> = self.get_newest(&url, limit).await?;
        Ok(newest_first(
            raw.into_iter().map(comment_from_raw).collect(),
            limit,
        ))
    }

    async fn list_review_comments(
        &self,
        pr: &PrRef,
        limit: u32,
    ) -> Result<Vec<Comment>, TransportError> {
        let url = self.repo_url(
            pr,
            &format!(
                "pulls/{}/comments?sort=created&direction=desc&per_page={}",
                pr.number,
                limit.min(MAX_PER_PAGE)
            ),
        );
        let raw: Vec<RawComment> = self.get_json(&url).await?;
        Ok(newest_first(
            raw.into_iter().map(comment_from_raw).collect(),
            limit,
        ))
    }

    async fn list_timeline_events(
        &self,
        pr: &PrRef,
        limit: u32,
    ) -> Result<Vec<TimelineEvent>, TransportError> {
        let url = self.repo_url(pr, &format!("issues/{}/timeline", pr.number));
        let raw: Vec<RawTimelineEvent> = self.get_newest(&url, limit).await?;
        Ok(raw.into_iter().map(timeline_event_from_raw).collect())
    }

    async fn list_check_runs(
        &self,
        pr: &PrRef,
        git_ref: &str,
    ) -> Result<Vec<CheckRun>, TransportError> {
        let url = self.repo_url(
            pr,
            &format!("commits/{}/check-runs?per_page={}", git_ref, MAX_PER_PAGE),
        );
        let raw: RawCheckRuns = self.get_json(&url).await?;
        Ok(raw.check_runs)
    }

    async fn post_comment(&self, pr: &PrRef, body: &str) -> Result<(), TransportError> {
        let url = self.repo_url(pr, &format!("issues/{}/comments", pr.number));
        debug!(url = %url, "POST comment");
        let request = self
            .request(reqwest::Method::POST, &url)
            .json(&serde_json::json!({ "body": body }));
        self.send(request, &url).await?;
        Ok(())
    }
}
