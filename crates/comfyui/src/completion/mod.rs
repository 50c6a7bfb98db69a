//! Completion coordinator.
//!
//! A generation goes through `SUBMITTING -> WAITING -> FETCHING -> DONE`,
//! with any phase able to fail:
//!
//! - submitting queues the workflow and yields a fresh `prompt_id`,
//! - waiting detects completion, either by polling `/history`
//!   ([`PollingStrategy`]) or by watching the event stream
//!   ([`StreamingStrategy`]),
//! - fetching downloads the artifact exactly once. It is not retried:
//!   the backend has persisted the file by the time outputs appear.
//!
//! The strategies are interchangeable behind [`CompletionStrategy`].

pub mod polling;
pub mod streaming;

pub use polling::PollingStrategy;
pub use streaming::StreamingStrategy;

use async_trait::async_trait;
use comfyrelay_core::error::JobError;
use comfyrelay_core::types::ArtifactDescriptor;

use crate::api::ComfyUIApi;
use crate::history::{HistoryEntry, OutputSelector};

/// Result of a finished generation.
#[derive(Debug, Clone)]
pub struct Completion {
    pub prompt_id: String,
    /// `None` when the bytes were streamed rather than saved by the backend.
    pub descriptor: Option<ArtifactDescriptor>,
    pub bytes: Vec<u8>,
}

/// Failure of one phase of a generation.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Queuing the workflow failed. Nothing was submitted.
    #[error("{0}")]
    Submission(String),

    /// The attempt ceiling was reached without seeing outputs.
    #[error("no outputs after {attempts} polls")]
    Timeout { attempts: u32 },

    /// Polling or streaming failed before completion was observed.
    #[error("{0}")]
    Wait(String),

    /// Outputs are present but hold nothing at the selected node.
    #[error("no artifact under output node {node} ({kind})")]
    MissingArtifact { node: String, kind: String },

    /// Downloading the artifact failed.
    #[error("{0}")]
    Fetch(String),
}

impl From<CompletionError> for JobError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Submission(msg) => JobError::Submission(msg),
            CompletionError::Timeout { attempts } => JobError::CompletionTimeout { attempts },
            CompletionError::Wait(msg) => JobError::CompletionWait(msg),
            e @ CompletionError::MissingArtifact { .. } => JobError::Artifact(e.to_string()),
            CompletionError::Fetch(msg) => JobError::Artifact(msg),
        }
    }
}

/// A way of waiting for a submitted workflow to finish.
#[async_trait]
pub trait CompletionStrategy: Send + Sync {
    /// Short name for logs and configuration.
    fn name(&self) -> &'static str;

    /// Submit `workflow`, wait for it to finish and fetch its artifact.
    async fn complete(
        &self,
        api: &ComfyUIApi,
        workflow: &serde_json::Value,
    ) -> Result<Completion, CompletionError>;
}

/// Queue a workflow and return its ticket.
pub(crate) async fn submit(
    api: &ComfyUIApi,
    workflow: &serde_json::Value,
    client_id: &str,
) -> Result<String, CompletionError> {
    let response = api
        .submit_workflow(workflow, client_id)
        .await
        .map_err(|e| CompletionError::Submission(e.to_string()))?;

    tracing::info!(
        prompt_id = %response.prompt_id,
        queue_position = ?response.number,
        "Queued workflow",
    );
    Ok(response.prompt_id)
}

/// Locate the selected artifact in a history entry and download it.
pub(crate) async fn fetch_artifact(
    api: &ComfyUIApi,
    prompt_id: String,
    entry: &HistoryEntry,
    output: &OutputSelector,
) -> Result<Completion, CompletionError> {
    let descriptor = entry
        .first_artifact(output)
        .ok_or_else(|| CompletionError::MissingArtifact {
            node: output.node.clone(),
            kind: output.kind.clone(),
        })?;

    let bytes = api
        .view(&descriptor)
        .await
        .map_err(|e| CompletionError::Fetch(e.to_string()))?;

    tracing::info!(
        prompt_id = %prompt_id,
        filename = %descriptor.filename,
        size = bytes.len(),
        "Fetched generated file",
    );

    Ok(Completion {
        prompt_id,
        descriptor: Some(descriptor),
        bytes,
    })
}
