//! `v1/sync`: mirror a model repository into a local directory.
//!
//! Only files inside a sub-folder of the repository are considered, and a
//! file whose destination already exists is never fetched again.

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use super::download::download_file;
use super::ActionError;

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub repo_id: String,
    pub sync_path: String,
    pub hf_token: String,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    siblings: Vec<RepoFile>,
}

#[derive(Debug, Deserialize)]
struct RepoFile {
    rfilename: String,
}

pub async fn run(
    http: &reqwest::Client,
    hf_endpoint: &str,
    payload: &Value,
) -> Result<Value, ActionError> {
    let request = SyncRequest::deserialize(payload)?;
    let files = list_repo_files(http, hf_endpoint, &request.repo_id, &request.hf_token).await?;

    let mut synced_files = Vec::new();
    for file in files.iter().filter(|f| in_subfolder(f)) {
        let dest_path = format!("{}/{}", request.sync_path.trim_end_matches('/'), file);
        if tokio::fs::try_exists(&dest_path).await? {
            tracing::debug!(file = %file, "Already present, skipping");
            continue;
        }

        tracing::info!(file = %file, dest_path = %dest_path, "Syncing");
        let url = format!("{hf_endpoint}/{}/resolve/main/{file}", request.repo_id);
        download_file(http, &url, Path::new(&dest_path), Some(&request.hf_token)).await?;
        synced_files.push(dest_path);
    }

    Ok(json!({
        "synced_count": synced_files.len(),
        "synced_files": synced_files,
    }))
}

/// Paths of every file in `repo_id`, relative to the repository root.
pub async fn list_repo_files(
    http: &reqwest::Client,
    hf_endpoint: &str,
    repo_id: &str,
    token: &str,
) -> Result<Vec<String>, ActionError> {
    let url = format!("{hf_endpoint}/api/models/{repo_id}");
    let response = http.get(&url).bearer_auth(token).send().await?;
    if !response.status().is_success() {
        return Err(ActionError::Status {
            url,
            status: response.status().as_u16(),
        });
    }

    let info: RepoInfo = response.json().await?;
    Ok(info.siblings.into_iter().map(|f| f.rfilename).collect())
}

fn in_subfolder(file: &str) -> bool {
    Path::new(file)
        .parent()
        .is_some_and(|p| !p.as_os_str().is_empty())
}
