//! Completion by watching the ComfyUI event stream.
//!
//! The socket is opened before the workflow is queued so no event can be
//! missed, and closed on every exit path. Completion is the `executing`
//! event with `node: null` for our prompt. Binary frames received while
//! the configured stream node is executing are that node's output bytes.
//!
//! The wait is bounded by the same ceiling as polling: `interval *
//! max_attempts` from the moment the workflow is queued.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::api::ComfyUIApi;
use crate::client::{ComfyUIClient, WsStream};
use crate::history::OutputSelector;
use crate::messages::{binary_payload, parse_message, ComfyUIMessage};
use crate::retry::RetryPolicy;

use super::polling::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use super::{fetch_artifact, submit, Completion, CompletionError, CompletionStrategy};

/// Waits on the WebSocket event stream for the prompt to finish.
#[derive(Debug, Clone)]
pub struct StreamingStrategy {
    client: ComfyUIClient,
    output: OutputSelector,
    stream_node: Option<String>,
    connect_policy: RetryPolicy,
    interval: Duration,
    max_attempts: u32,
}

impl StreamingStrategy {
    pub fn new(client: ComfyUIClient, output: OutputSelector) -> Self {
        Self {
            client,
            output,
            stream_node: None,
            connect_policy: RetryPolicy::default(),
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Take the artifact from binary frames sent while `node` executes
    /// instead of fetching it through `/view`.
    pub fn with_stream_node(mut self, node: Option<String>) -> Self {
        self.stream_node = node;
        self
    }

    pub fn with_connect_policy(mut self, policy: RetryPolicy) -> Self {
        self.connect_policy = policy;
        self
    }

    /// Give up after `interval * max_attempts` without completion.
    pub fn with_wait_budget(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.interval = interval;
        self.max_attempts = max_attempts;
        self
    }

    pub fn wait_budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }

    async fn run(
        &self,
        ws: &mut WsStream,
        api: &ComfyUIApi,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<Completion, CompletionError> {
        let prompt_id = submit(api, workflow, client_id).await?;

        let mut streamed = self.wait_for_completion(ws, &prompt_id).await?;
        if !streamed.is_empty() {
            tracing::info!(
                prompt_id = %prompt_id,
                frames = streamed.len(),
                "Using streamed output",
            );
            return Ok(Completion {
                prompt_id,
                descriptor: None,
                bytes: streamed.swap_remove(0),
            });
        }

        let entry = api
            .get_history(&prompt_id)
            .await
            .map_err(|e| CompletionError::Wait(e.to_string()))?
            .into_entry(&prompt_id);

        fetch_artifact(api, prompt_id, &entry, &self.output).await
    }

    /// Read frames until the prompt finishes or the budget runs out.
    /// Returns the payloads of binary frames captured from the stream
    /// node, in arrival order.
    async fn wait_for_completion(
        &self,
        ws: &mut WsStream,
        prompt_id: &str,
    ) -> Result<Vec<Vec<u8>>, CompletionError> {
        let deadline = Instant::now() + self.wait_budget();
        let mut current_node: Option<String> = None;
        let mut streamed = Vec::new();

        loop {
            let frame = match tokio::time::timeout_at(deadline, ws.next()).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    return Err(CompletionError::Wait(
                        "event stream ended before completion".to_string(),
                    ));
                }
                Err(_) => {
                    tracing::warn!(
                        prompt_id,
                        current_node = ?current_node,
                        budget_ms = self.wait_budget().as_millis() as u64,
                        "Gave up waiting for completion event",
                    );
                    return Err(CompletionError::Timeout {
                        attempts: self.max_attempts,
                    });
                }
            };

            match frame {
                Ok(Message::Text(text)) => match parse_message(&text) {
                    Ok(msg) => {
                        if self.on_event(msg, prompt_id, &mut current_node)? {
                            return Ok(streamed);
                        }
                    }
                    Err(e) => {
                        tracing::trace!(error = %e, "Skipping unrecognized event");
                    }
                },
                Ok(Message::Binary(bytes)) => {
                    let capturing = self.stream_node.is_some() && current_node == self.stream_node;
                    if let (true, Some(payload)) = (capturing, binary_payload(&bytes)) {
                        streamed.push(payload.to_vec());
                    }
                }
                Ok(Message::Close(frame)) => {
                    tracing::warn!(prompt_id, ?frame, "Event stream closed by backend");
                    return Err(CompletionError::Wait(
                        "event stream closed before completion".to_string(),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(CompletionError::Wait(format!("event stream error: {e}")));
                }
            }
        }
    }

    /// Apply one event. Returns `true` once the prompt has finished.
    fn on_event(
        &self,
        msg: ComfyUIMessage,
        prompt_id: &str,
        current_node: &mut Option<String>,
    ) -> Result<bool, CompletionError> {
        // Older backends send progress without a prompt id.
        let ours = msg.prompt_id().is_none_or(|id| id == prompt_id);

        match msg {
            ComfyUIMessage::Status(status) => {
                tracing::debug!(
                    prompt_id,
                    queue_remaining = status.queue_remaining(),
                    "Queue status",
                );
            }
            ComfyUIMessage::Progress(data) if ours => {
                tracing::debug!(
                    prompt_id,
                    node = ?data.node,
                    value = data.value,
                    max = data.max,
                    percent = data.percent(),
                    "Generation progress",
                );
            }
            other if other.prompt_id() != Some(prompt_id) => {}
            ComfyUIMessage::ExecutionStart(_) => {
                tracing::info!(prompt_id, "Execution started");
            }
            ComfyUIMessage::ExecutionCached(data) => {
                tracing::debug!(prompt_id, cached = data.nodes.len(), "Cached nodes skipped");
            }
            ComfyUIMessage::Executing(data) => match data.node {
                None => {
                    tracing::info!(prompt_id, "Execution completed");
                    return Ok(true);
                }
                Some(node) => {
                    tracing::debug!(prompt_id, node = %node, "Executing node");
                    *current_node = Some(node);
                }
            },
            ComfyUIMessage::Executed(data) => {
                tracing::debug!(prompt_id, node = %data.node, "Node produced output");
            }
            ComfyUIMessage::ExecutionSuccess(_) => {
                tracing::debug!(prompt_id, "Backend reported success");
            }
            ComfyUIMessage::ExecutionError(data) => {
                tracing::error!(
                    prompt_id,
                    node_id = ?data.node_id,
                    error_type = %data.exception_type,
                    error_message = %data.exception_message,
                    "Execution error",
                );
                return Err(CompletionError::Wait(format!(
                    "{}: {}",
                    data.exception_type, data.exception_message
                )));
            }
            ComfyUIMessage::ExecutionInterrupted(data) => {
                return Err(CompletionError::Wait(format!(
                    "execution interrupted at node {}",
                    data.node_id.as_deref().unwrap_or("?")
                )));
            }
            ComfyUIMessage::Progress(_) => {}
        }

        Ok(false)
    }
}

#[async_trait]
impl CompletionStrategy for StreamingStrategy {
    fn name(&self) -> &'static str {
        "streaming"
    }

    async fn complete(
        &self,
        api: &ComfyUIApi,
        workflow: &serde_json::Value,
    ) -> Result<Completion, CompletionError> {
        let conn = self
            .client
            .connect_with_retry(&self.connect_policy)
            .await
            .map_err(|e| CompletionError::Submission(e.to_string()))?;

        let client_id = conn.client_id;
        let mut ws = conn.ws_stream;

        let outcome = self.run(&mut ws, api, workflow, &client_id).await;

        if let Err(e) = ws.close(None).await {
            tracing::debug!(error = %e, "Closing event stream failed");
        }

        outcome
    }
}
