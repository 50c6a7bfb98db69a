//! Shared HTTP session for the local generation backend.
//!
//! [`BackendClient`] is created once at process start and shared by every
//! job. It holds no per-job state: only the connection pool, the base
//! address and the retry configuration.
//!
//! Two retry layers apply:
//! - transport: connection errors, and for GET also 502/503/504
//!   responses, are retried with exponential backoff ([`RetryPolicy`],
//!   10 retries from 100ms). Gateway errors on POST are returned as-is.
//! - `post` only: a 404 is retried up to [`POST_RETRIES`] times with a
//!   fixed [`POST_RETRY_DELAY`], since the backend answers 404 while its
//!   model is still loading.
//!
//! Every other status is handed back to the caller untouched.

use std::time::Duration;

use comfyrelay_core::error::JobError;
use comfyrelay_core::job::normalize_endpoint;
use reqwest::{RequestBuilder, Response, StatusCode};

use crate::retry::{next_delay, RetryPolicy};

/// Total timeout for a single HTTP call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
/// Extra attempts for a POST answered with 404.
pub const POST_RETRIES: u32 = 3;
/// Pause between 404 retries. Does not grow.
pub const POST_RETRY_DELAY: Duration = Duration::from_millis(200);
/// Pause between readiness probes.
pub const READINESS_INTERVAL: Duration = Duration::from_millis(200);
/// Timeout for one readiness probe.
pub const READINESS_PROBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors from the backend HTTP session.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP request itself failed (connection refused, timeout, ...).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend kept answering with a transient status.
    #[error("Backend returned {status} after {retries} retries")]
    RetriesExhausted { status: u16, retries: u32 },
}

impl From<BackendError> for JobError {
    fn from(err: BackendError) -> Self {
        JobError::Transport(err.to_string())
    }
}

/// Which failures `send` may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryScope {
    /// Idempotent requests: transient statuses and connection errors.
    StatusAndConnect,
    /// Requests with side effects: only failures to connect.
    ConnectOnly,
}

/// HTTP client bound to one backend base address.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
    post_retries: u32,
    post_retry_delay: Duration,
}

impl BackendClient {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:8188`) with
    /// the default timeout and retry policies.
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::default(),
            post_retries: POST_RETRIES,
            post_retry_delay: POST_RETRY_DELAY,
        }
    }

    /// Override the transport retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the 404 retry budget for `post`.
    pub fn with_post_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.post_retries = retries;
        self.post_retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an endpoint, with or without a leading `/`.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, normalize_endpoint(endpoint))
    }

    pub async fn get(&self, endpoint: &str) -> Result<Response, BackendError> {
        let url = self.url(endpoint);
        self.send(endpoint, RetryScope::StatusAndConnect, || self.http.get(&url))
            .await
    }

    pub async fn get_with_query(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, BackendError> {
        let url = self.url(endpoint);
        self.send(endpoint, RetryScope::StatusAndConnect, || {
            self.http.get(&url).query(query)
        })
            .await
    }

    /// POST a JSON body.
    ///
    /// Retries a 404 answer up to the configured budget and returns the
    /// last response received, whatever its status.
    pub async fn post(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<Response, BackendError> {
        let url = self.url(endpoint);
        let build = || self.http.post(&url).json(body);

        let mut response = self.send(endpoint, RetryScope::ConnectOnly, build).await?;
        let mut retry = 0;
        while response.status() == StatusCode::NOT_FOUND && retry < self.post_retries {
            retry += 1;
            tracing::warn!(endpoint, retry, "Received HTTP 404, retrying");
            tokio::time::sleep(self.post_retry_delay).await;
            response = self.send(endpoint, RetryScope::ConnectOnly, build).await?;
        }

        Ok(response)
    }

    /// Block until the backend answers a GET on `probe_endpoint`.
    ///
    /// Any HTTP status counts as ready; connection errors are swallowed.
    /// There is no ceiling: the worker must not accept jobs before the
    /// backend is reachable.
    pub async fn wait_until_ready(&self, probe_endpoint: &str) {
        let url = self.url(probe_endpoint);
        let mut attempts = 0u64;
        loop {
            attempts += 1;
            match self
                .http
                .get(&url)
                .timeout(READINESS_PROBE_TIMEOUT)
                .send()
                .await
            {
                Ok(response) => {
                    tracing::info!(
                        url = %url,
                        status = response.status().as_u16(),
                        attempts,
                        "Backend is ready",
                    );
                    return;
                }
                Err(e) => {
                    if attempts % 50 == 1 {
                        tracing::info!(url = %url, error = %e, "Service not ready yet, retrying");
                    } else {
                        tracing::trace!(url = %url, error = %e, "Service not ready yet");
                    }
                }
            }
            tokio::time::sleep(READINESS_INTERVAL).await;
        }
    }

    // ---- private helpers ----

    /// Send a request built by `build`, retrying transient failures
    /// within `scope`.
    async fn send<F>(
        &self,
        endpoint: &str,
        scope: RetryScope,
        build: F,
    ) -> Result<Response, BackendError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0u32;
        let mut delay = self.policy.initial_delay;

        loop {
            let result = build().send().await;

            let transient = match &result {
                Ok(response) => {
                    scope == RetryScope::StatusAndConnect
                        && RetryPolicy::is_transient(response.status())
                }
                Err(e) => e.is_connect(),
            };
            if !transient {
                return Ok(result?);
            }

            if retries >= self.policy.max_retries {
                return match result {
                    Ok(response) => Err(BackendError::RetriesExhausted {
                        status: response.status().as_u16(),
                        retries,
                    }),
                    Err(e) => Err(e.into()),
                };
            }

            retries += 1;
            match &result {
                Ok(response) => tracing::warn!(
                    endpoint,
                    retry = retries,
                    status = response.status().as_u16(),
                    delay_ms = delay.as_millis() as u64,
                    "Transient backend status, retrying",
                ),
                Err(e) => tracing::warn!(
                    endpoint,
                    retry = retries,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Backend connection failed, retrying",
                ),
            }

            tokio::time::sleep(delay).await;
            delay = next_delay(delay, &self.policy);
        }
    }
}
