//! Layered validation of a job input.
//!
//! Layers run in order and stop at the first one that fails:
//! 1. the whole input against [`INPUT_SCHEMA`],
//! 2. the `api` block (endpoint normalized first) against [`API_SCHEMA`],
//! 3. the payload against the endpoint's schema, if it has one.

use serde_json::Value;

use crate::job::{normalize_endpoint, Job, Method, ValidatedRequest};

use super::evaluator::validate;
use super::schemas::{payload_schema_for, API_SCHEMA, GRAPH_INPUT_SCHEMA, INPUT_SCHEMA};

/// Validate a dispatch-flavor job into a [`ValidatedRequest`].
pub fn validate_job(job: &Job) -> Result<ValidatedRequest, Vec<String>> {
    let input = validate(&job.input, &INPUT_SCHEMA)?;

    let mut api = input["api"].clone();
    if let Some(endpoint) = api.get_mut("endpoint") {
        if let Some(raw) = endpoint.as_str() {
            *endpoint = Value::String(normalize_endpoint(raw).to_string());
        }
    }
    let api = validate(&api, &API_SCHEMA)?;

    let endpoint = api["endpoint"].as_str().unwrap_or_default();
    let method = api["method"]
        .as_str()
        .and_then(Method::parse)
        .ok_or_else(|| vec!["method does not meet the constraints.".to_string()])?;

    let payload = input["payload"].clone();
    let payload = match payload_schema_for(endpoint, method) {
        Some(schema) => {
            tracing::info!(job_id = %job.id, endpoint, "Validating /{endpoint} payload");
            validate(&payload, schema)?
        }
        None => payload,
    };

    Ok(ValidatedRequest::new(endpoint, method, payload))
}

/// Validate a graph-flavor job and return the workflow graph.
pub fn validate_graph_job(job: &Job) -> Result<Value, Vec<String>> {
    let input = validate(&job.input, &GRAPH_INPUT_SCHEMA)?;
    Ok(input["payload"].clone())
}
