use serde_json::Value;

/// Separator used when several validation messages are surfaced as one.
pub const VALIDATION_SEPARATOR: &str = "; ";

/// Failure classification at the job-handler boundary.
///
/// Every failure of a job invocation ends up as one of these and is turned
/// into an error envelope; nothing propagates out of the handler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobError {
    /// Caller input failed a schema layer. Backend state is unaffected.
    #[error("{}", .0.join(VALIDATION_SEPARATOR))]
    Validation(Vec<String>),

    #[error("Error queuing workflow: {0}")]
    Submission(String),

    #[error("Max retries reached while waiting for video generation")]
    CompletionTimeout { attempts: u32 },

    #[error("Error waiting for video generation: {0}")]
    CompletionWait(String),

    /// Completion was observed but the artifact could not be located or read.
    #[error("Error retrieving generated file: {0}")]
    Artifact(String),

    /// Non-200 response from a passthrough call.
    #[error("Backend status code: {status}")]
    Backend { status: u16, body: Value },

    #[error("Transport error: {0}")]
    Transport(String),

    /// A local action (`v1/download`, `v1/sync`) failed.
    #[error("{0}")]
    Action(String),
}

impl JobError {
    /// Whether the worker's backend should be discarded before the next job.
    ///
    /// Validation failures are caller-input issues; every other failure may
    /// have left the backend in an unknown state.
    pub fn refresh_worker(&self) -> bool {
        !matches!(self, JobError::Validation(_))
    }

    /// Short, stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "validation",
            JobError::Submission(_) => "submission",
            JobError::CompletionTimeout { .. } => "completion_timeout",
            JobError::CompletionWait(_) => "completion_wait",
            JobError::Artifact(_) => "artifact",
            JobError::Backend { .. } => "backend",
            JobError::Transport(_) => "transport",
            JobError::Action(_) => "action",
        }
    }
}
