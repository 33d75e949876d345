//! One automation cycle: select → produce → publish → log.
//!
//! Stages run strictly in order and the cycle always ends with exactly one
//! ledger write, whatever happened before it.

use crate::candidate::{load_catalog_from, select_candidate, Candidate};
use crate::ledger::{Ledger, RunRecord, RunStatus, FAILED_REF, UNKNOWN_SUBJECT};
use crate::producer::{Artifact, ArtifactProducer};
use crate::publisher::{PublishOutcome, Publisher, VideoMetadata};
use crate::settings::DEFAULT_MAX_RECENT;
use crate::store::TableStore;
use crate::{loge, logi, logok, logw};
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Started,
    SubjectSelected,
    ArtifactRequested,
    ArtifactReady,
    ArtifactFailed,
    Published,
    PublishFailed,
    PublishSkipped,
    Logged,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub subject: String,
    pub status: RunStatus,
    pub artifact_ref: String,
    pub duration_minutes: f64,
    /// Stages visited, in order. Always starts with `Started` and ends with `Logged`.
    pub stages: Vec<CycleStage>,
    /// Whether the ledger write went through.
    pub logged: bool,
    pub error: Option<String>,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.status != RunStatus::Failed
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() { 0 } else { 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOptions {
    pub max_recent: usize,
    pub upload_enabled: bool,
    pub keep_artifacts: bool,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            max_recent: DEFAULT_MAX_RECENT,
            upload_enabled: true,
            keep_artifacts: false,
        }
    }
}

pub struct AutomationCycle<'a> {
    ledger: &'a Ledger,
    catalog: &'a dyn TableStore,
    producer: &'a dyn ArtifactProducer,
    publisher: &'a dyn Publisher,
    options: CycleOptions,
}

struct Progress {
    stages: Vec<CycleStage>,
    subject: Option<Candidate>,
    artifact: Option<Artifact>,
}

impl Progress {
    fn enter(&mut self, stage: CycleStage) {
        self.stages.push(stage);
    }
}

struct Outcome {
    status: RunStatus,
    artifact_ref: String,
    error: Option<String>,
}

impl<'a> AutomationCycle<'a> {
    pub fn new(
        ledger: &'a Ledger,
        catalog: &'a dyn TableStore,
        producer: &'a dyn ArtifactProducer,
        publisher: &'a dyn Publisher,
    ) -> Self {
        Self {
            ledger,
            catalog,
            producer,
            publisher,
            options: CycleOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CycleOptions) -> Self {
        self.options = options;
        self
    }

    /// Picks the subject for this cycle from the catalog and the ledger's
    /// recency window.
    pub async fn select_subject(&self) -> Candidate {
        let recent: HashSet<String> = self
            .ledger
            .recent_subjects(self.options.max_recent)
            .await
            .into_iter()
            .collect();
        let catalog = load_catalog_from(self.catalog).await;
        if !recent.is_empty() {
            let mut names: Vec<&str> = recent.iter().map(String::as_str).collect();
            names.sort_unstable();
            logi(format!("Avoiding recent subjects: {}", names.join(", ")));
        }
        select_candidate(&catalog, &recent)
    }

    pub async fn run(&self) -> CycleReport {
        let started = Instant::now();
        logi(format!("Starting automation cycle at {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));

        let mut progress = Progress {
            stages: vec![CycleStage::Started],
            subject: None,
            artifact: None,
        };
        let outcome = self.run_stages(&mut progress).await;

        let duration_minutes = started.elapsed().as_secs_f64() / 60.0;
        let subject = progress
            .subject
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| UNKNOWN_SUBJECT.to_string());

        let record = RunRecord::new(
            RunRecord::decorated_subject(&subject),
            outcome.artifact_ref.clone(),
            outcome.status,
            duration_minutes,
        );
        let logged = self.ledger.append_logged(&record).await;
        progress.enter(CycleStage::Logged);

        if let Some(artifact) = &progress.artifact {
            self.cleanup(artifact).await;
        }

        match &outcome.error {
            None => logok(format!(
                "Automation cycle completed in {:.1} minutes ({})",
                duration_minutes, outcome.status
            )),
            Some(err) => loge(format!("Automation cycle failed: {}", err)),
        }

        CycleReport {
            subject,
            status: outcome.status,
            artifact_ref: outcome.artifact_ref,
            duration_minutes,
            stages: progress.stages,
            logged,
            error: outcome.error,
        }
    }

    async fn run_stages(&self, progress: &mut Progress) -> Outcome {
        let candidate = self.select_subject().await;
        logi(format!("Selected subject: {} (score {})", candidate.name, candidate.appeal_score));
        let name = candidate.name.clone();
        progress.subject = Some(candidate);
        progress.enter(CycleStage::SubjectSelected);

        progress.enter(CycleStage::ArtifactRequested);
        let artifact = match self.producer.produce(&name).await {
            Ok(artifact) => artifact,
            Err(err) => {
                progress.enter(CycleStage::ArtifactFailed);
                return Outcome {
                    status: RunStatus::Failed,
                    artifact_ref: FAILED_REF.to_string(),
                    error: Some(format!("Video generation failed: {:#}", err)),
                };
            }
        };
        progress.enter(CycleStage::ArtifactReady);
        progress.artifact = Some(artifact.clone());

        if artifact.placeholder {
            logi("Artifact is a placeholder; skipping publish.");
            progress.enter(CycleStage::PublishSkipped);
            return placeholder_outcome(&artifact);
        }
        if !self.options.upload_enabled {
            logi("Uploads disabled in settings; skipping publish.");
            progress.enter(CycleStage::PublishSkipped);
            return placeholder_outcome(&artifact);
        }

        let meta = VideoMetadata::for_subject(&name);
        match self.publisher.publish(&artifact, &meta).await {
            Ok(PublishOutcome::Published(url)) => {
                progress.enter(CycleStage::Published);
                Outcome {
                    status: RunStatus::Live,
                    artifact_ref: url,
                    error: None,
                }
            }
            Ok(PublishOutcome::Skipped(reason)) => {
                logi(format!("Publish skipped: {}", reason));
                progress.enter(CycleStage::PublishSkipped);
                placeholder_outcome(&artifact)
            }
            Err(err) => {
                progress.enter(CycleStage::PublishFailed);
                Outcome {
                    status: RunStatus::Failed,
                    artifact_ref: FAILED_REF.to_string(),
                    error: Some(format!("Upload failed: {:#}", err)),
                }
            }
        }
    }

    async fn cleanup(&self, artifact: &Artifact) {
        if self.options.keep_artifacts {
            return;
        }
        let Some(path) = artifact.path.as_deref() else {
            return;
        };
        if let Err(err) = fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                logw(format!("Could not remove {}: {}", path.display(), err));
            }
        }
    }
}

fn placeholder_outcome(artifact: &Artifact) -> Outcome {
    Outcome {
        status: RunStatus::Placeholder,
        artifact_ref: artifact.reference.clone(),
        error: None,
    }
}
