//! Job handler: one invocation per job, always returns an envelope.

use comfyrelay_core::envelope::{error_envelope, force_refresh};
use comfyrelay_core::error::JobError;
use comfyrelay_core::job::{Job, JobFlavor};
use comfyrelay_core::validation::{validate_graph_job, validate_job};
use serde_json::Value;
use tracing::Instrument;

use crate::router;
use crate::state::WorkerState;

/// Process one job to completion.
///
/// Every failure is converted into an error envelope here; nothing
/// escapes to the caller.
pub async fn handle_job(state: &WorkerState, job: Job) -> Value {
    let span = tracing::info_span!("job", job_id = %job.id);
    async move {
        let envelope = match run(state, &job).await {
            Ok(envelope) => {
                tracing::info!("Job completed");
                envelope
            }
            Err(err) => {
                tracing::error!(kind = err.kind(), error = %err, "Job failed");
                error_envelope(&err)
            }
        };

        if state.config.refresh_worker {
            force_refresh(envelope)
        } else {
            envelope
        }
    }
    .instrument(span)
    .await
}

async fn run(state: &WorkerState, job: &Job) -> Result<Value, JobError> {
    match job.flavor() {
        JobFlavor::Dispatch => {
            let request = validate_job(job).map_err(JobError::Validation)?;
            router::dispatch(state, &request).await
        }
        JobFlavor::Graph => {
            let workflow = validate_graph_job(job).map_err(JobError::Validation)?;
            router::submit_workflow(state, &workflow).await
        }
    }
}
