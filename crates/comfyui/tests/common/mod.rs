//! In-process fake ComfyUI backend for integration tests.
//!
//! Serves `/prompt`, `/history/{id}`, `/view`, `/ws` and a scriptable
//! passthrough route on `127.0.0.1:0`, counting every hit.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::Notify;

pub const PROMPT_ID: &str = "prompt-0001";
pub const ARTIFACT_NAME: &str = "clip_00001.mp4";

/// A frame the fake event stream sends after the workflow is queued.
#[derive(Debug, Clone)]
pub enum WsFrame {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

impl WsFrame {
    pub fn executing(node: Option<&str>, prompt_id: &str) -> Self {
        WsFrame::Text(
            json!({"type": "executing", "data": {"node": node, "prompt_id": prompt_id}})
                .to_string(),
        )
    }
}

#[derive(Default)]
pub struct FakeBackend {
    /// History polls that return `{}` before outputs appear. `None` = never.
    pub outputs_after: Option<usize>,
    pub artifact: Vec<u8>,
    /// Status codes served by the passthrough route, in order. 200 once empty.
    pub passthrough_statuses: Mutex<VecDeque<u16>>,
    /// Status served by `/prompt`.
    pub prompt_status: Option<u16>,
    pub ws_script: Vec<WsFrame>,

    pub prompt_hits: AtomicUsize,
    pub history_hits: AtomicUsize,
    pub view_hits: AtomicUsize,
    pub passthrough_hits: AtomicUsize,
    pub submitted_client_id: Mutex<Option<String>>,
    /// Client id of every `/ws` connection, in connect order.
    pub ws_client_ids: Mutex<Vec<String>>,
    /// Event stream connections the client has hung up.
    pub ws_disconnects: AtomicUsize,
    pub queued: Notify,
}

impl FakeBackend {
    pub fn completing_after(polls: usize, artifact: &[u8]) -> Self {
        Self {
            outputs_after: Some(polls),
            artifact: artifact.to_vec(),
            ..Default::default()
        }
    }

    pub fn with_passthrough_statuses(self, statuses: &[u16]) -> Self {
        *self.passthrough_statuses.lock().unwrap() = statuses.iter().copied().collect();
        self
    }

    pub fn hits(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Bind the fake backend to an ephemeral port and serve it in the background.
pub async fn spawn(backend: FakeBackend) -> (SocketAddr, Arc<FakeBackend>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    spawn_on(listener, backend)
}

/// Serve the fake backend on an already bound listener.
pub fn spawn_on(
    listener: tokio::net::TcpListener,
    backend: FakeBackend,
) -> (SocketAddr, Arc<FakeBackend>) {
    let state = Arc::new(backend);
    let app = Router::new()
        .route("/prompt", post(queue_prompt))
        .route("/history/{prompt_id}", get(history))
        .route("/view", get(view))
        .route("/ws", get(ws_upgrade))
        .route("/sdapi/v1/txt2img", post(passthrough))
        .route("/sdapi/v1/options", get(passthrough))
        .with_state(Arc::clone(&state));

    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn queue_prompt(State(state): State<Arc<FakeBackend>>, Json(body): Json<Value>) -> Response {
    state.prompt_hits.fetch_add(1, Ordering::SeqCst);
    *state.submitted_client_id.lock().unwrap() = body["client_id"].as_str().map(String::from);

    if let Some(status) = state.prompt_status {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, Json(json!({"error": {"type": "prompt_outputs_failed_validation"}})))
            .into_response();
    }

    state.queued.notify_one();
    Json(json!({"prompt_id": PROMPT_ID, "number": 0, "node_errors": {}})).into_response()
}

async fn history(
    State(state): State<Arc<FakeBackend>>,
    Path(prompt_id): Path<String>,
) -> Json<Value> {
    let polls = state.history_hits.fetch_add(1, Ordering::SeqCst) + 1;
    match state.outputs_after {
        Some(after) if polls > after => Json(json!({
            prompt_id: {
                "outputs": {
                    "40": {"gifs": [{"filename": ARTIFACT_NAME, "subfolder": "", "type": "output"}]}
                },
                "status": {"status_str": "success", "completed": true}
            }
        })),
        _ => Json(json!({})),
    }
}

async fn view(
    State(state): State<Arc<FakeBackend>>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Response {
    state.view_hits.fetch_add(1, Ordering::SeqCst);
    let known = params.get("filename").map(String::as_str) == Some(ARTIFACT_NAME)
        && params.get("type").map(String::as_str) == Some("output");
    if known {
        state.artifact.clone().into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn passthrough(State(state): State<Arc<FakeBackend>>) -> Response {
    state.passthrough_hits.fetch_add(1, Ordering::SeqCst);
    let status = state
        .passthrough_statuses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(200);
    let status = StatusCode::from_u16(status).unwrap();
    (status, Json(json!({"images": [], "status": status.as_u16()}))).into_response()
}

async fn ws_upgrade(
    State(state): State<Arc<FakeBackend>>,
    Query(params): Query<std::collections::HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(id) = params.get("clientId") {
        state.ws_client_ids.lock().unwrap().push(id.clone());
    }
    ws.on_upgrade(move |socket| run_script(socket, state))
}

async fn run_script(mut socket: WebSocket, state: Arc<FakeBackend>) {
    let status = json!({"type": "status", "data": {"status": {"exec_info": {"queue_remaining": 0}}}});
    let _ = socket.send(Message::Text(status.to_string().into())).await;

    state.queued.notified().await;

    for frame in &state.ws_script {
        let msg = match frame {
            WsFrame::Text(text) => Message::Text(text.clone().into()),
            WsFrame::Binary(bytes) => Message::Binary(bytes.clone().into()),
            WsFrame::Close => Message::Close(None),
        };
        if socket.send(msg).await.is_err() {
            state.ws_disconnects.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }

    // Hold the socket open until the client hangs up.
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
    state.ws_disconnects.fetch_add(1, Ordering::SeqCst);
}
