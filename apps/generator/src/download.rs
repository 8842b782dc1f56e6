use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

pub const DEFAULT_VIDEO_FILE_NAME: &str = "ai-generated-video.mp4";

/// A directory destination gets the default file name appended.
pub fn resolve_destination(dest: &Path) -> PathBuf {
    if dest.is_dir() {
        dest.join(DEFAULT_VIDEO_FILE_NAME)
    } else {
        dest.to_path_buf()
    }
}

pub async fn save_video(http: &Client, video_url: &str, dest: &Path) -> Result<PathBuf> {
    let path = resolve_destination(dest);
    let response = http
        .get(video_url)
        .send()
        .await
        .with_context(|| format!("failed to request video '{video_url}'"))?
        .error_for_status()
        .with_context(|| format!("video download refused for '{video_url}'"))?;

    let written = match write_body(response, &path).await {
        Ok(written) => written,
        Err(err) => {
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %remove_err, "failed to remove partial video");
            }
            return Err(err);
        }
    };

    info!(path = %path.display(), bytes = written, "video saved");
    Ok(path)
}

async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create '{}'", path.display()))?;
    let mut body = std::pin::pin!(response.bytes_stream());
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("video download interrupted")?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
#[path = "tests/download_tests.rs"]
mod tests;
