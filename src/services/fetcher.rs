//! Rate-Limited Fetcher
//!
//! Wraps outbound HTTP calls to the stargazer feed and backs off when the
//! upstream rate limit is nearly exhausted. The limit state is read fresh
//! from every response and never cached across requests; the backoff is
//! applied after the triggering response is already in hand, so it
//! throttles the next call rather than the current one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{self, HeaderMap};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::FetcherConfig;
use crate::models::StargazerEvent;

/// Remaining-request threshold below which the guard sleeps until reset.
const MIN_REMAINING: i64 = 10;

/// Grace period added past the reset instant, in milliseconds.
const RESET_GRACE_MS: i64 = 1000;

/// Rate limit header names (matched case-insensitively by `HeaderMap`).
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Errors that can occur while fetching from the upstream feed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode stargazer feed: {0}")]
    Decode(String),
}

/// Millisecond clock, injectable so backoff math is testable.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Rate limit metadata derived from a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: i64,
    pub reset_at_epoch_secs: i64,
}

impl RateLimitState {
    /// Read the limit headers from a response. Absent or unparseable
    /// values default to 0, which makes a malformed response throttle
    /// rather than stampede.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: header_i64(headers, REMAINING_HEADER),
            reset_at_epoch_secs: header_i64(headers, RESET_HEADER),
        }
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> i64 {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Decides whether the next outbound call must wait for the limit window
/// to reset.
#[derive(Clone)]
pub struct RateLimitGuard {
    clock: Arc<dyn Clock>,
}

impl Default for RateLimitGuard {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl RateLimitGuard {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Delay to apply before the next call, if the observed state is close
    /// to exhaustion. Waits until one second past the reset instant.
    pub fn backoff_delay(&self, state: &RateLimitState) -> Option<Duration> {
        if state.remaining >= MIN_REMAINING {
            return None;
        }
        let delay_ms = state.reset_at_epoch_secs * 1000 - self.clock.now_ms() + RESET_GRACE_MS;
        Some(Duration::from_millis(delay_ms.max(0) as u64))
    }

    /// Suspend the caller until the limit window resets, if needed.
    pub async fn throttle(&self, state: &RateLimitState) {
        if let Some(delay) = self.backoff_delay(state) {
            if delay.is_zero() {
                return;
            }
            warn!(
                "Rate limit nearly exhausted ({} remaining), sleeping {:?} until reset",
                state.remaining, delay
            );
            sleep(delay).await;
        }
    }
}

impl std::fmt::Debug for RateLimitGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitGuard").finish_non_exhaustive()
    }
}

/// HTTP client wrapper that applies rate-limit backoff after every call.
///
/// Transport failures propagate untouched; there are no retries at this
/// layer.
#[derive(Debug, Clone)]
pub struct RateLimitedFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    guard: RateLimitGuard,
}

impl RateLimitedFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self::with_guard(config, RateLimitGuard::default())
    }

    /// Construct with a custom guard (fake clock in tests).
    pub fn with_guard(config: FetcherConfig, guard: RateLimitGuard) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            guard,
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Perform one GET request, then throttle on the rate limit state the
    /// response reports.
    pub async fn fetch(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        debug!("Fetching {}", url);

        let mut request = self
            .client
            .get(url)
            .header(header::USER_AGENT, &self.config.user_agent)
            .header(header::ACCEPT, "application/vnd.github.star+json");

        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        let state = RateLimitState::from_headers(response.headers());
        self.guard.throttle(&state).await;

        Ok(response)
    }
}

/// Source of timestamped stargazer events, one page at a time.
#[async_trait]
pub trait StargazerEventSource: Send + Sync {
    /// Fetch page `page` (1-based) of the login's stargazer feed, at most
    /// `per_page` events.
    async fn stargazer_page(
        &self,
        login: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StargazerEvent>, FetchError>;
}

/// Event source backed by the GitHub stargazers endpoint.
#[derive(Debug, Clone)]
pub struct GithubEventSource {
    fetcher: RateLimitedFetcher,
}

impl GithubEventSource {
    pub fn new(config: FetcherConfig) -> Self {
        Self {
            fetcher: RateLimitedFetcher::new(config),
        }
    }

    pub fn with_fetcher(fetcher: RateLimitedFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl StargazerEventSource for GithubEventSource {
    async fn stargazer_page(
        &self,
        login: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StargazerEvent>, FetchError> {
        let url = format!(
            "{}/repos/{}/stargazers?per_page={}&page={}",
            self.fetcher.config().base_api_url,
            login,
            per_page,
            page
        );

        let response = self.fetcher.fetch(&url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
