use std::sync::Arc;

use comfyrelay_comfyui::api::ComfyUIApi;
use comfyrelay_comfyui::backend::{BackendClient, BackendError};
use comfyrelay_comfyui::client::ComfyUIClient;
use comfyrelay_comfyui::completion::{CompletionStrategy, PollingStrategy, StreamingStrategy};
use comfyrelay_comfyui::history::OutputSelector;

use crate::config::{CompletionMode, WorkerConfig};

/// Process-wide state shared by every job invocation.
///
/// Built once at startup. Cheap to clone: everything is behind `Arc` or is
/// itself a handle to a shared pool.
#[derive(Clone)]
pub struct WorkerState {
    pub config: Arc<WorkerConfig>,
    /// REST API over the shared backend session.
    pub api: ComfyUIApi,
    /// Strategy used to wait for submitted workflows.
    pub completion: Arc<dyn CompletionStrategy>,
    /// Client for remote downloads (`v1/download`, `v1/sync`).
    pub downloader: reqwest::Client,
    /// Client id sent with polled submissions. Generated once per process.
    pub client_id: String,
}

impl WorkerState {
    pub fn new(config: WorkerConfig) -> Result<Self, BackendError> {
        let backend = Arc::new(BackendClient::new(config.backend_url())?);
        let downloader = reqwest::Client::builder().build()?;
        let client_id = uuid::Uuid::new_v4().to_string();

        let output = OutputSelector::new(&config.output_node, &config.output_kind);
        let completion: Arc<dyn CompletionStrategy> = match config.completion {
            CompletionMode::Polling => Arc::new(
                PollingStrategy::new(client_id.clone(), output)
                    .with_interval(config.polling_interval)
                    .with_max_attempts(config.polling_max_retries),
            ),
            CompletionMode::Streaming => Arc::new(
                StreamingStrategy::new(ComfyUIClient::new(config.ws_url()), output)
                    .with_stream_node(config.stream_node.clone())
                    .with_wait_budget(config.polling_interval, config.polling_max_retries),
            ),
        };

        tracing::info!(
            backend = %config.backend_url(),
            strategy = completion.name(),
            client_id = %client_id,
            "Worker state initialised",
        );

        Ok(Self {
            config: Arc::new(config),
            api: ComfyUIApi::new(backend),
            completion,
            downloader,
            client_id,
        })
    }

    pub fn backend(&self) -> &BackendClient {
        self.api.backend()
    }
}
