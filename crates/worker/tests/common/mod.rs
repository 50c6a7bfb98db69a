//! Fake ComfyUI / model-repository servers and worker state for tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use comfyrelay_worker::config::WorkerConfig;
use comfyrelay_worker::state::WorkerState;
use serde_json::{json, Value};

pub const PROMPT_ID: &str = "prompt-0001";
pub const ARTIFACT: &[u8] = b"\x00\x00\x00\x18ftypmp42 fake video";
pub const HF_TOKEN: &str = "hf_test_token";

#[derive(Default)]
pub struct Backend {
    /// History polls answered with `{}` before outputs show up.
    pub outputs_after: usize,
    /// Statuses for `/sdapi/v1/*` calls, in order. 200 once drained.
    pub statuses: Mutex<VecDeque<u16>>,

    pub prompt_hits: AtomicUsize,
    pub history_hits: AtomicUsize,
    pub view_hits: AtomicUsize,
    pub sdapi_hits: AtomicUsize,
    pub last_sdapi_body: Mutex<Option<Value>>,
}

impl Backend {
    pub fn with_statuses(self, statuses: &[u16]) -> Self {
        *self.statuses.lock().unwrap() = statuses.iter().copied().collect();
        self
    }

    pub fn hits(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub async fn spawn_backend(backend: Backend) -> (SocketAddr, Arc<Backend>) {
    let state = Arc::new(backend);
    let app = Router::new()
        .route("/prompt", post(queue_prompt))
        .route("/history/{prompt_id}", get(history))
        .route("/view", get(view))
        .route("/sdapi/v1/{name}", get(sdapi_get).post(sdapi_post))
        .with_state(Arc::clone(&state));
    (serve(app).await, state)
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn queue_prompt(State(state): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    state.prompt_hits.fetch_add(1, Ordering::SeqCst);
    assert!(body["prompt"].is_object(), "workflow graph must be sent as `prompt`");
    assert!(body["client_id"].is_string());
    Json(json!({"prompt_id": PROMPT_ID, "number": 3}))
}

async fn history(State(state): State<Arc<Backend>>, Path(prompt_id): Path<String>) -> Json<Value> {
    let polls = state.history_hits.fetch_add(1, Ordering::SeqCst) + 1;
    if polls <= state.outputs_after {
        return Json(json!({}));
    }
    Json(json!({
        prompt_id: {
            "outputs": {
                "40": {"gifs": [{"filename": "clip_00001.mp4", "subfolder": "", "type": "output"}]}
            }
        }
    }))
}

async fn view(
    State(state): State<Arc<Backend>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.view_hits.fetch_add(1, Ordering::SeqCst);
    if params.get("filename").map(String::as_str) == Some("clip_00001.mp4") {
        ARTIFACT.to_vec().into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

fn next_status(state: &Backend) -> StatusCode {
    state.sdapi_hits.fetch_add(1, Ordering::SeqCst);
    let status = state.statuses.lock().unwrap().pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap()
}

async fn sdapi_get(State(state): State<Arc<Backend>>, Path(name): Path<String>) -> Response {
    let status = next_status(&state);
    (status, Json(json!({"endpoint": name, "sd_model_checkpoint": "v1-5"}))).into_response()
}

async fn sdapi_post(
    State(state): State<Arc<Backend>>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let status = next_status(&state);
    *state.last_sdapi_body.lock().unwrap() = Some(body);
    if status == StatusCode::OK {
        (status, Json(json!({"endpoint": name, "images": ["aW1n"]}))).into_response()
    } else {
        (status, Json(json!({"detail": "Model not loaded", "status": status.as_u16()})))
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Model repository
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Repository {
    /// Files served under `/{repo}/resolve/main/`, keyed by repo-relative path.
    pub files: HashMap<String, Vec<u8>>,
    pub downloads: Mutex<Vec<String>>,
    pub unauthorized: AtomicUsize,
}

impl Repository {
    pub fn with_files(files: &[(&str, &[u8])]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, bytes)| (path.to_string(), bytes.to_vec()))
                .collect(),
            ..Default::default()
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {HF_TOKEN}"))
}

pub async fn spawn_repository(repo: Repository) -> (String, Arc<Repository>) {
    let state = Arc::new(repo);
    let app = Router::new()
        .route("/api/models/{owner}/{name}", get(repo_info))
        .route("/{owner}/{name}/resolve/main/{*path}", get(resolve))
        .route("/files/{*path}", get(plain_file))
        .with_state(Arc::clone(&state));
    (format!("http://{}", serve(app).await), state)
}

async fn repo_info(
    State(state): State<Arc<Repository>>,
    Path((owner, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        state.unauthorized.fetch_add(1, Ordering::SeqCst);
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut siblings: Vec<Value> = state
        .files
        .keys()
        .map(|path| json!({"rfilename": path}))
        .collect();
    siblings.sort_by(|a, b| a["rfilename"].as_str().cmp(&b["rfilename"].as_str()));
    Json(json!({"id": format!("{owner}/{name}"), "siblings": siblings})).into_response()
}

async fn resolve(
    State(state): State<Arc<Repository>>,
    Path((_owner, _name, path)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        state.unauthorized.fetch_add(1, Ordering::SeqCst);
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.files.get(&path) {
        Some(bytes) => {
            state.downloads.lock().unwrap().push(path);
            Bytes::from(bytes.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn plain_file(State(state): State<Arc<Repository>>, Path(path): Path<String>) -> Response {
    match state.files.get(&path) {
        Some(bytes) => Bytes::from(bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Worker state
// ---------------------------------------------------------------------------

pub fn test_config(backend: SocketAddr) -> WorkerConfig {
    WorkerConfig {
        comfy_host: backend.to_string(),
        polling_interval: Duration::from_millis(5),
        polling_max_retries: 20,
        ..WorkerConfig::default()
    }
}

pub fn test_state(config: WorkerConfig) -> WorkerState {
    WorkerState::new(config).unwrap()
}
