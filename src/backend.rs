//! Wiring from [`Config`] to concrete stores, producer and publisher.
//!
//! A [`Workspace`] is opened at the start of each cycle and dropped at the
//! end of it, so no storage session outlives a cycle.

use crate::api::sheets::SheetsClient;
use crate::config::{BackendKind, Config, ProducerKind};
use crate::ledger::Ledger;
use crate::producer::{ArtifactProducer, FfmpegProducer, PlaceholderProducer};
use crate::publisher::{PlaceholderPublisher, Publisher, YouTubePublisher};
use crate::retry::RetryPolicy;
use crate::settings::Settings;
use crate::store::{CsvTable, MemoryTable, SheetsTable, TableStore};
use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

const STORAGE_BACKOFF: Duration = Duration::from_millis(500);

pub fn http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

pub struct Workspace {
    pub kind: &'static str,
    pub content_tracker: Arc<dyn TableStore>,
    pub catalog: Arc<dyn TableStore>,
    pub settings: Arc<dyn TableStore>,
}

impl Workspace {
    pub fn open(config: &Config, http: &Client) -> Result<Self> {
        config.validate()?;
        let tables = &config.tables;
        match config.backend() {
            BackendKind::Csv => Ok(Self {
                kind: "csv",
                content_tracker: Arc::new(CsvTable::new(config.csv_path(&tables.content_tracker))),
                catalog: Arc::new(CsvTable::new(config.csv_path(&tables.catalog))),
                settings: Arc::new(CsvTable::new(config.csv_path(&tables.settings))),
            }),
            BackendKind::Sheets => {
                let sheet_id = config.sheet_id.clone().unwrap_or_default();
                let token = config.google_access_token.clone().unwrap_or_default();
                let client = SheetsClient::new(http.clone(), sheet_id, token);
                Ok(Self {
                    kind: "sheets",
                    content_tracker: Arc::new(SheetsTable::new(client.clone(), &tables.content_tracker)),
                    catalog: Arc::new(SheetsTable::new(client.clone(), &tables.catalog)),
                    settings: Arc::new(SheetsTable::new(client, &tables.settings)),
                })
            }
        }
    }

    /// Empty in-memory tables, used for dry runs.
    pub fn in_memory(config: &Config) -> Self {
        let tables = &config.tables;
        Self {
            kind: "memory",
            content_tracker: Arc::new(MemoryTable::missing(&tables.content_tracker)),
            catalog: Arc::new(MemoryTable::missing(&tables.catalog)),
            settings: Arc::new(MemoryTable::missing(&tables.settings)),
        }
    }

    pub async fn load_settings(&self) -> Settings {
        Settings::load(self.settings.as_ref()).await
    }

    pub fn ledger(&self, settings: &Settings) -> Ledger {
        Ledger::new(self.content_tracker.clone(), settings.ledger_capacity())
            .with_retry(RetryPolicy::new(settings.max_retries(), STORAGE_BACKOFF))
    }
}

pub fn build_producer(config: &Config, settings: &Settings) -> Box<dyn ArtifactProducer> {
    match config.producer {
        ProducerKind::Ffmpeg => Box::new(
            FfmpegProducer::new(&config.output_dir, settings.video_duration_seconds())
                .with_audio_dir(config.audio_dir.clone()),
        ),
        ProducerKind::Placeholder => Box::new(PlaceholderProducer),
    }
}

pub fn build_publisher(config: &Config, http: &Client) -> Box<dyn Publisher> {
    match config.youtube_access_token.as_deref() {
        Some(token) if !token.trim().is_empty() => {
            Box::new(YouTubePublisher::new(http.clone(), token.trim()))
        }
        _ => Box::new(PlaceholderPublisher::new("YOUTUBE_ACCESS_TOKEN not set")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn csv_workspace_uses_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/fruit"),
            ..Config::default()
        };
        let ws = Workspace::open(&config, &Client::new()).unwrap();
        assert_eq!(ws.kind, "csv");
        assert_eq!(ws.catalog.name(), "/tmp/fruit/fruit_database.csv");
    }

    #[test]
    fn sheets_workspace_requires_credentials() {
        let config = Config {
            backend: Some(BackendKind::Sheets),
            sheet_id: Some("abc".to_string()),
            ..Config::default()
        };
        assert!(Workspace::open(&config, &Client::new()).is_err());

        let config = Config {
            google_access_token: Some("tok".to_string()),
            ..config
        };
        let ws = Workspace::open(&config, &Client::new()).unwrap();
        assert_eq!(ws.kind, "sheets");
        assert_eq!(ws.content_tracker.name(), "ASMR Content Tracker");
    }

    #[tokio::test]
    async fn ledger_capacity_follows_settings() {
        let ws = Workspace::in_memory(&Config::default());
        let settings = Settings::from_pairs([("Max_Ledger_Entries", "5")]);
        assert_eq!(ws.ledger(&settings).capacity(), 5);
    }
}
