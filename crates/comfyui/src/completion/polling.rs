//! Completion by polling `/history/{prompt_id}` at a fixed interval.
//!
//! The wait is bounded by attempt count, not wall clock: at most
//! `max_attempts` polls, `interval` apart. The defaults (250ms x 5000)
//! allow a generation roughly 21 minutes.

use std::time::Duration;

use async_trait::async_trait;

use crate::api::ComfyUIApi;
use crate::history::{HistoryEntry, OutputSelector};

use super::{fetch_artifact, submit, Completion, CompletionError, CompletionStrategy};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5000;

/// Polls the history endpoint until the prompt's outputs appear.
#[derive(Debug, Clone)]
pub struct PollingStrategy {
    client_id: String,
    output: OutputSelector,
    interval: Duration,
    max_attempts: u32,
}

impl PollingStrategy {
    /// `client_id` is the process-wide id workflows are submitted under.
    pub fn new(client_id: impl Into<String>, output: OutputSelector) -> Self {
        Self {
            client_id: client_id.into(),
            output,
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Poll until the history holds outputs for `prompt_id`.
    async fn wait_for_outputs(
        &self,
        api: &ComfyUIApi,
        prompt_id: &str,
    ) -> Result<HistoryEntry, CompletionError> {
        let mut attempts = 0;
        while attempts < self.max_attempts {
            let history = api
                .get_history(prompt_id)
                .await
                .map_err(|e| CompletionError::Wait(e.to_string()))?;

            if let Some(entry) = history.into_completed(prompt_id) {
                tracing::debug!(prompt_id, polls = attempts + 1, "Outputs present");
                return Ok(entry);
            }

            tokio::time::sleep(self.interval).await;
            attempts += 1;
        }

        tracing::warn!(prompt_id, attempts, "Gave up waiting for outputs");
        Err(CompletionError::Timeout { attempts })
    }
}

#[async_trait]
impl CompletionStrategy for PollingStrategy {
    fn name(&self) -> &'static str {
        "polling"
    }

    async fn complete(
        &self,
        api: &ComfyUIApi,
        workflow: &serde_json::Value,
    ) -> Result<Completion, CompletionError> {
        let prompt_id = submit(api, workflow, &self.client_id).await?;

        tracing::info!(
            prompt_id = %prompt_id,
            interval_ms = self.interval.as_millis() as u64,
            max_attempts = self.max_attempts,
            "Waiting until workflow is complete",
        );
        let entry = self.wait_for_outputs(api, &prompt_id).await?;

        fetch_artifact(api, prompt_id, &entry, &self.output).await
    }
}
