use crate::api::youtube::{self, Snippet, Status, VideoResource};
use crate::logok;
use crate::producer::Artifact;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

const TAGS: &[&str] = &["ASMR", "glass", "cutting", "relaxing", "sounds"];
const CATEGORY_PEOPLE_BLOGS: &str = "22";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: String,
}

impl VideoMetadata {
    pub fn for_subject(subject: &str) -> Self {
        Self {
            title: format!("ASMR Glass {} Cutting & Slicing Sounds 🔪✨", subject),
            description: format!(
                "Relaxing ASMR video of cutting a glass {}. Perfect for sleep, study, and relaxation. #ASMR #Glass #Cutting #Relaxing",
                subject.to_lowercase()
            ),
            tags: TAGS.iter().map(|t| t.to_string()).collect(),
            category_id: CATEGORY_PEOPLE_BLOGS.to_string(),
            privacy_status: "public".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Public reference (watch URL) of the published video.
    Published(String),
    /// Nothing was published; the reason is logged.
    Skipped(String),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, artifact: &Artifact, meta: &VideoMetadata) -> Result<PublishOutcome>;
}

pub struct YouTubePublisher {
    client: Client,
    access_token: String,
}

impl YouTubePublisher {
    pub fn new(client: Client, access_token: impl Into<String>) -> Self {
        Self {
            client,
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl Publisher for YouTubePublisher {
    async fn publish(&self, artifact: &Artifact, meta: &VideoMetadata) -> Result<PublishOutcome> {
        let path = artifact
            .path
            .as_deref()
            .context("Artifact has no local file to upload")?;

        let resource = VideoResource {
            snippet: Snippet {
                title: meta.title.clone(),
                description: meta.description.clone(),
                tags: meta.tags.clone(),
                category_id: meta.category_id.clone(),
            },
            status: Status {
                privacy_status: meta.privacy_status.clone(),
                self_declared_made_for_kids: false,
            },
        };

        let id = youtube::upload_video(&self.client, &self.access_token, &resource, path).await?;
        let url = youtube::watch_url(&id);
        logok(format!("YouTube upload successful: {}", url));
        Ok(PublishOutcome::Published(url))
    }
}

/// Publisher used when no upload credentials are configured.
pub struct PlaceholderPublisher {
    reason: String,
}

impl PlaceholderPublisher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Publisher for PlaceholderPublisher {
    async fn publish(&self, _artifact: &Artifact, _meta: &VideoMetadata) -> Result<PublishOutcome> {
        Ok(PublishOutcome::Skipped(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_for_subject() {
        let meta = VideoMetadata::for_subject("Dragon Fruit");
        assert_eq!(meta.title, "ASMR Glass Dragon Fruit Cutting & Slicing Sounds 🔪✨");
        assert!(meta.description.contains("cutting a glass dragon fruit."));
        assert_eq!(meta.tags.len(), 5);
        assert_eq!(meta.category_id, "22");
    }

    #[tokio::test]
    async fn placeholder_publisher_skips() {
        let publisher = PlaceholderPublisher::new("no credentials");
        let outcome = publisher
            .publish(&Artifact::placeholder("Kiwi"), &VideoMetadata::for_subject("Kiwi"))
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Skipped("no credentials".to_string()));
    }

    #[tokio::test]
    async fn youtube_publisher_needs_a_file() {
        let publisher = YouTubePublisher::new(Client::new(), "token");
        let result = publisher
            .publish(&Artifact::placeholder("Kiwi"), &VideoMetadata::for_subject("Kiwi"))
            .await;
        assert!(result.is_err());
    }
}
