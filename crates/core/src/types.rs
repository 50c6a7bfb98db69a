use serde::{Deserialize, Serialize};

/// Reference to a generated file held by the backend.
///
/// Enough to fetch the raw bytes through the backend's `/view` endpoint.
/// Only valid while the backend retains the file, so it must be fetched
/// before the job returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Backend storage bucket (`output`, `temp`, ...). Serialized as `type`.
    #[serde(rename = "type", default = "default_folder_type")]
    pub folder_type: String,
}

fn default_folder_type() -> String {
    "output".to_string()
}

impl ArtifactDescriptor {
    pub fn new(
        filename: impl Into<String>,
        subfolder: impl Into<String>,
        folder_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            subfolder: subfolder.into(),
            folder_type: folder_type.into(),
        }
    }

    /// Query parameters for `GET /view`.
    pub fn view_query(&self) -> [(&'static str, &str); 3] {
        [
            ("filename", self.filename.as_str()),
            ("subfolder", self.subfolder.as_str()),
            ("type", self.folder_type.as_str()),
        ]
    }
}
