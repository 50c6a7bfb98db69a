//! WebSocket client for connecting to a ComfyUI instance.
//!
//! [`ComfyUIClient`] holds the WebSocket base URL of one ComfyUI
//! instance. Call [`ComfyUIClient::connect`] (or
//! [`connect_with_retry`](ComfyUIClient::connect_with_retry)) to
//! establish a live [`ComfyUIConnection`]. Each connection gets its own
//! client id, so concurrent jobs never receive each other's events.

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::retry::{next_delay, RetryPolicy};

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for a ComfyUI event stream.
#[derive(Debug, Clone)]
pub struct ComfyUIClient {
    ws_url: String,
}

/// A live WebSocket connection to a ComfyUI instance.
pub struct ComfyUIConnection {
    /// Unique client ID sent during the WebSocket handshake. Workflows
    /// submitted with this id have their events routed to this socket.
    pub client_id: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: WsStream,
}

impl ComfyUIClient {
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8188`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        let ws_url: String = ws_url.into();
        Self {
            ws_url: ws_url.trim_end_matches('/').to_string(),
        }
    }

    /// WebSocket base URL (e.g. `ws://host:8188`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to the ComfyUI WebSocket endpoint.
    ///
    /// Generates a unique `client_id` (UUID v4) and appends it as a
    /// query parameter so that ComfyUI can address messages back to
    /// this specific client.
    pub async fn connect(&self) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/ws?clientId={}", self.ws_url, client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::debug!(client_id = %client_id, "Connected to ComfyUI at {}", self.ws_url);

        Ok(ComfyUIConnection {
            client_id,
            ws_stream,
        })
    }

    /// Connect with exponential backoff between failed attempts.
    ///
    /// Gives up after `policy.max_retries` retries and returns the last
    /// connection error.
    pub async fn connect_with_retry(
        &self,
        policy: &RetryPolicy,
    ) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let mut delay = policy.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.connect().await {
                Ok(conn) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Reconnected to ComfyUI");
                    }
                    return Ok(conn);
                }
                Err(e) if attempt > policy.max_retries => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Connect attempt {attempt} failed",
                    );
                }
            }

            tokio::time::sleep(delay).await;
            delay = next_delay(delay, policy);
        }
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
