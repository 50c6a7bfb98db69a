//! `v1/download`: stream a remote file to a local path.
//!
//! Bytes are written to a sibling temp file and renamed into place, so a
//! partial file is never visible at the destination.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use super::ActionError;

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub source_url: String,
    pub download_path: String,
}

pub async fn run(http: &reqwest::Client, payload: &Value) -> Result<Value, ActionError> {
    let request = DownloadRequest::deserialize(payload)?;
    let destination = Path::new(&request.download_path);

    let size = download_file(http, &request.source_url, destination, None).await?;
    tracing::info!(
        source_url = %request.source_url,
        download_path = %request.download_path,
        size,
        "Download successful",
    );

    Ok(json!({
        "msg": "Download successful",
        "source_url": request.source_url,
        "download_path": request.download_path,
    }))
}

/// Download `url` to `destination` through a temp file.
///
/// Returns the number of bytes written. The temp file is removed when
/// anything fails.
pub async fn download_file(
    http: &reqwest::Client,
    url: &str,
    destination: &Path,
    bearer_token: Option<&str>,
) -> Result<u64, ActionError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp = temp_path(destination);
    let result = write_to(http, url, &temp, bearer_token).await;
    let size = match result {
        Ok(size) => size,
        Err(e) => {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&temp, destination).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(size)
}

/// `{destination}.{pid}.{nonce}`, in the same directory so the final
/// rename stays on one filesystem.
fn temp_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(format!(
        ".{}.{}",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ));
    PathBuf::from(name)
}

async fn write_to(
    http: &reqwest::Client,
    url: &str,
    path: &Path,
    bearer_token: Option<&str>,
) -> Result<u64, ActionError> {
    let mut request = http.get(url);
    if let Some(token) = bearer_token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(ActionError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;

    Ok(written)
}
