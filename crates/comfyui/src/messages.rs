//! ComfyUI WebSocket event types and parser.
//!
//! Text frames are `{"type": "<kind>", "data": {...}}` envelopes and are
//! parsed into [`ComfyUIMessage`]. Binary frames carry raw output bytes
//! behind a fixed-size header, see [`binary_payload`].

use serde::Deserialize;

/// Length of the header preceding the payload of a binary frame
/// (event type and image format, 4 bytes each).
pub const BINARY_HEADER_LEN: usize = 8;

/// Events the completion wait reacts to or reports.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyUIMessage {
    /// Queue broadcast, sent on connect and whenever the queue changes.
    #[serde(rename = "status")]
    Status(StatusData),

    #[serde(rename = "execution_start")]
    ExecutionStart(PromptData),

    /// Nodes skipped because their outputs were cached.
    #[serde(rename = "execution_cached")]
    ExecutionCached(CachedData),

    /// The active node changed. `node: null` means the prompt is done.
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Step progress inside a long-running node (e.g. KSampler).
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A node finished and produced output.
    #[serde(rename = "executed")]
    Executed(NodeData),

    #[serde(rename = "execution_success")]
    ExecutionSuccess(PromptData),

    #[serde(rename = "execution_error")]
    ExecutionError(ErrorData),

    #[serde(rename = "execution_interrupted")]
    ExecutionInterrupted(InterruptedData),
}

impl ComfyUIMessage {
    /// Prompt the event belongs to. `None` for queue broadcasts and for
    /// events sent without a prompt id.
    pub fn prompt_id(&self) -> Option<&str> {
        match self {
            ComfyUIMessage::Status(_) => None,
            ComfyUIMessage::ExecutionStart(d) | ComfyUIMessage::ExecutionSuccess(d) => {
                Some(&d.prompt_id)
            }
            ComfyUIMessage::ExecutionCached(d) => Some(&d.prompt_id),
            ComfyUIMessage::Executing(d) => d.prompt_id.as_deref(),
            ComfyUIMessage::Progress(d) => d.prompt_id.as_deref(),
            ComfyUIMessage::Executed(d) => Some(&d.prompt_id),
            ComfyUIMessage::ExecutionError(d) => Some(&d.prompt_id),
            ComfyUIMessage::ExecutionInterrupted(d) => Some(&d.prompt_id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    status: QueueStatus,
}

#[derive(Debug, Clone, Deserialize)]
struct QueueStatus {
    exec_info: ExecInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct ExecInfo {
    queue_remaining: u32,
}

impl StatusData {
    /// Prompts still waiting or running on the backend.
    pub fn queue_remaining(&self) -> u32 {
        self.status.exec_info.queue_remaining
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptData {
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CachedData {
    pub prompt_id: String,
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    pub value: u32,
    pub max: u32,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
}

impl ProgressData {
    /// Completion percentage (0-100).
    pub fn percent(&self) -> u32 {
        if self.max == 0 {
            0
        } else {
            self.value.min(self.max) * 100 / self.max
        }
    }
}

/// `executed` payload. The node output itself is not needed: artifacts
/// are read from history or from binary frames.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeData {
    pub node: String,
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub prompt_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    pub exception_message: String,
    pub exception_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterruptedData {
    pub prompt_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Parse a text frame.
///
/// Malformed JSON and unknown `type` values (custom-node broadcasts such
/// as `crystools.monitor`) are errors; callers skip them.
pub fn parse_message(text: &str) -> Result<ComfyUIMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Strip the fixed header from a binary frame.
///
/// Returns `None` for frames too short to carry any payload.
pub fn binary_payload(frame: &[u8]) -> Option<&[u8]> {
    frame
        .get(BINARY_HEADER_LEN..)
        .filter(|payload| !payload.is_empty())
}
