//! Job model: the raw payload handed over by the job queue and the
//! validated request it turns into.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP method declared by a validated-dispatch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }

    /// Parse the wire form. Matching is exact (`"get"` is rejected).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work received from the job queue.
///
/// Owned by exactly one handler invocation and dropped when the handler
/// returns its envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub input: Value,
}

/// How a job asks to be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFlavor {
    /// `{input: {api: {endpoint, method}, payload}}`, routed by endpoint.
    Dispatch,
    /// `{input: {payload: <graph>}}`, submitted straight to the queue endpoint.
    Graph,
}

impl Job {
    pub fn new(id: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            input,
        }
    }

    /// Jobs that declare an `api` block are dispatched; everything else is
    /// treated as a bare workflow graph.
    pub fn flavor(&self) -> JobFlavor {
        if self.input.get("api").is_some() {
            JobFlavor::Dispatch
        } else {
            JobFlavor::Graph
        }
    }
}

/// Strip every leading `/` from an endpoint name.
pub fn normalize_endpoint(endpoint: &str) -> &str {
    endpoint.trim_start_matches('/')
}

/// A job that passed all validation layers.
///
/// The endpoint never carries a leading path separator.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    endpoint: String,
    pub method: Method,
    pub payload: Value,
}

impl ValidatedRequest {
    pub fn new(endpoint: &str, method: Method, payload: Value) -> Self {
        Self {
            endpoint: normalize_endpoint(endpoint).to_string(),
            method,
            payload,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
