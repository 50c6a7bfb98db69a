//! Result envelopes returned to the job queue.
//!
//! Success envelopes carry the artifact descriptor plus the artifact bytes
//! as base64 text. Error envelopes carry a message, the backend body when
//! there is one, and the `refresh_worker` flag.

use base64::Engine;
use serde_json::{json, Map, Value};

use crate::error::JobError;
use crate::types::ArtifactDescriptor;

pub const DESCRIPTOR_FIELD: &str = "file_indicator";
pub const ARTIFACT_FIELD: &str = "video_base64";
pub const REFRESH_FIELD: &str = "refresh_worker";

/// Base64-encode raw artifact bytes (standard alphabet, padded).
pub fn encode_artifact(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Success envelope for a completed generation.
///
/// `descriptor` is `None` when the bytes were streamed by the backend and
/// never written to its output folder.
pub fn artifact_envelope(descriptor: Option<&ArtifactDescriptor>, bytes: &[u8]) -> Value {
    let mut envelope = Map::new();
    if let Some(descriptor) = descriptor {
        envelope.insert(DESCRIPTOR_FIELD.to_string(), json!(descriptor));
    }
    envelope.insert(
        ARTIFACT_FIELD.to_string(),
        Value::String(encode_artifact(bytes)),
    );
    Value::Object(envelope)
}

/// Error envelope: `{error, [output], [refresh_worker]}`.
pub fn error_envelope(err: &JobError) -> Value {
    let mut envelope = Map::new();
    envelope.insert("error".to_string(), Value::String(err.to_string()));
    if let JobError::Backend { body, .. } = err {
        envelope.insert("output".to_string(), body.clone());
    }
    if err.refresh_worker() {
        envelope.insert(REFRESH_FIELD.to_string(), Value::Bool(true));
    }
    Value::Object(envelope)
}

/// Mark an envelope so the runtime discards the worker after this job.
///
/// Non-object envelopes (a passthrough array, say) are left untouched.
pub fn force_refresh(mut envelope: Value) -> Value {
    if let Some(map) = envelope.as_object_mut() {
        map.insert(REFRESH_FIELD.to_string(), Value::Bool(true));
    }
    envelope
}
