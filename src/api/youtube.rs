use crate::logi;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub privacy_status: String,
    pub self_declared_made_for_kids: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoResource {
    pub snippet: Snippet,
    pub status: Status,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Uploads `video_path` with a two-step resumable upload and returns the
/// new video id.
pub async fn upload_video(
    client: &Client,
    access_token: &str,
    resource: &VideoResource,
    video_path: &Path,
) -> Result<String> {
    let bytes = fs::read(video_path)
        .await
        .with_context(|| format!("Failed to read video {}", video_path.display()))?;

    let session = client
        .post(UPLOAD_URL)
        .bearer_auth(access_token)
        .header("X-Upload-Content-Type", "video/mp4")
        .header("X-Upload-Content-Length", bytes.len().to_string())
        .json(resource)
        .timeout(Duration::from_secs(60))
        .send()
        .await
        .context("YouTube upload session request failed")?;

    let status = session.status();
    if !status.is_success() {
        let body = session.text().await.unwrap_or_default();
        let snippet = body.chars().take(800).collect::<String>();
        anyhow::bail!("YouTube session HTTP {}: {}", status.as_u16(), snippet);
    }

    let location = session
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .context("YouTube session response had no Location header")?;

    logi(format!("Uploading {} bytes to YouTube...", bytes.len()));
    let resp = client
        .put(location)
        .bearer_auth(access_token)
        .header(reqwest::header::CONTENT_TYPE, "video/mp4")
        .body(bytes)
        .timeout(Duration::from_secs(1800))
        .send()
        .await
        .context("YouTube upload request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        let snippet = raw.chars().take(800).collect::<String>();
        anyhow::bail!("YouTube upload HTTP {}: {}", status.as_u16(), snippet);
    }

    let inserted: InsertResponse =
        serde_json::from_str(&raw).context("YouTube upload response parse failed")?;
    Ok(inserted.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_serializes_in_api_shape() {
        let resource = VideoResource {
            snippet: Snippet {
                title: "t".to_string(),
                description: "d".to_string(),
                tags: vec!["ASMR".to_string()],
                category_id: "22".to_string(),
            },
            status: Status {
                privacy_status: "public".to_string(),
                self_declared_made_for_kids: false,
            },
        };
        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["snippet"]["categoryId"], "22");
        assert_eq!(value["status"]["privacyStatus"], "public");
        assert_eq!(value["status"]["selfDeclaredMadeForKids"], false);
    }

    #[test]
    fn watch_urls() {
        assert_eq!(watch_url("abc"), "https://www.youtube.com/watch?v=abc");
    }
}
