//! Endpoints handled by the worker itself rather than the backend.

pub mod download;
pub mod sync;

use comfyrelay_core::error::JobError;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<ActionError> for JobError {
    fn from(err: ActionError) -> Self {
        JobError::Action(err.to_string())
    }
}
