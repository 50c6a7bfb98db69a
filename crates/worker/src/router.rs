//! Dispatch Router: picks what a validated request turns into.
//!
//! Local actions are looked up first by endpoint, then the method decides
//! between a passthrough GET, a workflow submission and a passthrough POST.

use comfyrelay_core::envelope::artifact_envelope;
use comfyrelay_core::error::JobError;
use comfyrelay_core::job::{Method, ValidatedRequest};
use comfyrelay_core::validation::schemas::{ENDPOINT_DOWNLOAD, ENDPOINT_SYNC};
use serde_json::Value;

use crate::actions::{download, sync};
use crate::state::WorkerState;

/// Queueing endpoint; POSTs to it go through the completion strategy.
pub const SUBMIT_ENDPOINT: &str = "prompt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    Download,
    Sync,
}

/// Endpoints served by the worker itself, checked before any method rule.
pub const LOCAL_ACTIONS: &[(&str, LocalAction)] = &[
    (ENDPOINT_DOWNLOAD, LocalAction::Download),
    (ENDPOINT_SYNC, LocalAction::Sync),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Local(LocalAction),
    Get,
    /// Submit a workflow and wait for its artifact.
    Submit,
    Post,
}

pub fn route(endpoint: &str, method: Method) -> Route {
    if let Some((_, action)) = LOCAL_ACTIONS.iter().find(|(name, _)| *name == endpoint) {
        return Route::Local(*action);
    }
    match method {
        Method::Get => Route::Get,
        Method::Post if endpoint == SUBMIT_ENDPOINT => Route::Submit,
        Method::Post => Route::Post,
    }
}

/// Execute a validated request and return the success envelope.
pub async fn dispatch(state: &WorkerState, request: &ValidatedRequest) -> Result<Value, JobError> {
    let endpoint = request.endpoint();
    let route = route(endpoint, request.method);
    tracing::debug!(endpoint, ?route, "Dispatching");

    match route {
        Route::Local(LocalAction::Download) => {
            Ok(download::run(&state.downloader, &request.payload).await?)
        }
        Route::Local(LocalAction::Sync) => Ok(sync::run(
            &state.downloader,
            &state.config.hf_endpoint,
            &request.payload,
        )
        .await?),
        Route::Get => {
            let response = state.backend().get(endpoint).await?;
            into_json(response).await
        }
        Route::Post => {
            let response = state.backend().post(endpoint, &request.payload).await?;
            into_json(response).await
        }
        Route::Submit => submit_workflow(state, workflow_of(&request.payload)).await,
    }
}

/// Run a workflow graph through the configured completion strategy.
pub async fn submit_workflow(state: &WorkerState, workflow: &Value) -> Result<Value, JobError> {
    let completion = state.completion.complete(&state.api, workflow).await?;
    Ok(artifact_envelope(
        completion.descriptor.as_ref(),
        &completion.bytes,
    ))
}

/// A `prompt` payload may carry the graph directly or wrapped as `{prompt: graph}`.
fn workflow_of(payload: &Value) -> &Value {
    match payload.get("prompt") {
        Some(graph) if graph.is_object() => graph,
        _ => payload,
    }
}

/// 200 becomes the decoded body; anything else is a backend error carrying it.
async fn into_json(response: reqwest::Response) -> Result<Value, JobError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| JobError::Transport(e.to_string()))?;

    if status == reqwest::StatusCode::OK {
        return serde_json::from_slice(&bytes)
            .map_err(|e| JobError::Transport(format!("Backend returned invalid JSON: {e}")));
    }

    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    tracing::error!(status = status.as_u16(), "Backend returned an error");
    Err(JobError::Backend {
        status: status.as_u16(),
        body,
    })
}
