//! Typed view of the `/history/{prompt_id}` response.
//!
//! The backend returns `{}` until it knows the prompt, then an entry whose
//! `outputs` map fills in once execution finishes:
//! `{prompt_id: {outputs: {node_id: {media_kind: [descriptor, ...]}}}}`.

use std::collections::HashMap;

use comfyrelay_core::types::ArtifactDescriptor;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Output node and media kind holding the artifact a workflow produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSelector {
    pub node: String,
    pub kind: String,
}

impl OutputSelector {
    pub fn new(node: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            kind: kind.into(),
        }
    }
}

/// Execution history keyed by prompt id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ExecutionHistory(HashMap<String, HistoryEntry>);

impl ExecutionHistory {
    pub fn entry(&self, prompt_id: &str) -> Option<&HistoryEntry> {
        self.0.get(prompt_id)
    }

    /// Take the entry for `prompt_id` if its outputs are present.
    pub fn into_completed(mut self, prompt_id: &str) -> Option<HistoryEntry> {
        self.0
            .remove(prompt_id)
            .filter(|entry| entry.has_outputs())
    }

    /// Take the entry for `prompt_id`, present or not.
    pub fn into_entry(mut self, prompt_id: &str) -> HistoryEntry {
        self.0.remove(prompt_id).unwrap_or_default()
    }
}

/// History record for one prompt.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub outputs: Option<Map<String, Value>>,
    #[serde(default)]
    pub status: Option<Value>,
}

impl HistoryEntry {
    pub fn has_outputs(&self) -> bool {
        self.outputs.as_ref().is_some_and(|o| !o.is_empty())
    }

    /// First artifact descriptor under the selected node and media kind.
    pub fn first_artifact(&self, selector: &OutputSelector) -> Option<ArtifactDescriptor> {
        let first = self
            .outputs
            .as_ref()?
            .get(&selector.node)?
            .get(&selector.kind)?
            .as_array()?
            .first()?;
        serde_json::from_value(first.clone()).ok()
    }
}
