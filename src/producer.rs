use crate::ffmpeg;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "aac"];

/// Output of the generation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Local media file, absent for placeholder artifacts.
    pub path: Option<PathBuf>,
    /// Opaque reference recorded in the ledger when nothing is published.
    pub reference: String,
    /// True when no real media backend produced this artifact.
    pub placeholder: bool,
}

impl Artifact {
    pub fn file(path: PathBuf) -> Self {
        let reference = path
            .file_name()
            .and_then(OsStr::to_str)
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path: Some(path),
            reference,
            placeholder: false,
        }
    }

    pub fn placeholder(subject: &str) -> Self {
        Self {
            path: None,
            reference: format!("placeholder:glass_{}", fruit_slug(subject)),
            placeholder: true,
        }
    }
}

#[async_trait]
pub trait ArtifactProducer: Send + Sync {
    async fn produce(&self, subject: &str) -> Result<Artifact>;
}

pub fn fruit_slug(subject: &str) -> String {
    let mut out = String::new();
    for ch in subject.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if (ch == ' ' || ch == '-' || ch == '_') && !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "subject".to_string()
    } else {
        trimmed.to_string()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Audio files directly under `dir` or one level below, sorted by path.
pub fn list_audio_tracks(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut out: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(OsStr::to_str)
                .map(|ext| AUDIO_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
                .unwrap_or(false)
        })
        .collect();
    out.sort();
    out
}

/// Renders a title card per subject with ffmpeg, optionally with a random
/// audio track from `audio_dir`.
pub struct FfmpegProducer {
    output_dir: PathBuf,
    duration_seconds: u32,
    audio_dir: Option<PathBuf>,
}

impl FfmpegProducer {
    pub fn new(output_dir: impl Into<PathBuf>, duration_seconds: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            duration_seconds: duration_seconds.max(1),
            audio_dir: None,
        }
    }

    pub fn with_audio_dir(mut self, audio_dir: Option<PathBuf>) -> Self {
        self.audio_dir = audio_dir;
        self
    }

    fn pick_audio_track(&self) -> Option<PathBuf> {
        let dir = self.audio_dir.as_deref()?;
        let tracks = list_audio_tracks(dir);
        let mut rng = rand::rngs::StdRng::seed_from_u64(now_secs());
        tracks.choose(&mut rng).cloned()
    }
}

#[async_trait]
impl ArtifactProducer for FfmpegProducer {
    async fn produce(&self, subject: &str) -> Result<Artifact> {
        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;

        let stem = format!("glass_{}_{}", fruit_slug(subject), now_secs());
        let final_mp4 = self.output_dir.join(format!("{}.mp4", stem));
        let caption = format!("Glass {} ASMR", subject);

        let track = self.pick_audio_track();
        let render_target = match track {
            Some(_) => self.output_dir.join(format!("{}_silent.mp4", stem)),
            None => final_mp4.clone(),
        };

        logi(format!("Rendering {} ({}s) -> {}", caption, self.duration_seconds, render_target.display()));
        if !ffmpeg::ffmpeg_render_title_card(&caption, self.duration_seconds, &render_target).await? {
            anyhow::bail!("ffmpeg produced no file at {}", render_target.display());
        }

        if let Some(track) = track {
            logi(format!("Attaching audio track {}", track.display()));
            if !ffmpeg::ffmpeg_attach_audio(&render_target, &track, &final_mp4).await? {
                logw("Audio attach failed; keeping silent video.");
                fs::rename(&render_target, &final_mp4).await?;
            } else {
                let _ = fs::remove_file(&render_target).await;
            }
        }

        let duration = ffmpeg::ffprobe_duration_seconds(&final_mp4)
            .await
            .with_context(|| format!("Rendered video is unreadable: {}", final_mp4.display()))?;
        logok(format!("Video ready: {} ({:.1}s)", final_mp4.display(), duration));

        Ok(Artifact::file(final_mp4))
    }
}

/// Stand-in producer used when no media pipeline is configured.
pub struct PlaceholderProducer;

#[async_trait]
impl ArtifactProducer for PlaceholderProducer {
    async fn produce(&self, subject: &str) -> Result<Artifact> {
        logi(format!("Placeholder generation for {}", subject));
        Ok(Artifact::placeholder(subject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(fruit_slug("Dragon Fruit"), "dragon_fruit");
        assert_eq!(fruit_slug("  Kiwi "), "kiwi");
        assert_eq!(fruit_slug("Blood-Orange!!"), "blood_orange");
        assert_eq!(fruit_slug("???"), "subject");
    }

    #[test]
    fn artifact_references() {
        let a = Artifact::file(PathBuf::from("output/glass_kiwi_1.mp4"));
        assert_eq!(a.reference, "glass_kiwi_1.mp4");
        assert!(!a.placeholder);

        let p = Artifact::placeholder("Passion Fruit");
        assert_eq!(p.reference, "placeholder:glass_passion_fruit");
        assert!(p.placeholder);
        assert!(p.path.is_none());
    }

    #[test]
    fn audio_listing_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("a.M4A"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.wav"), b"x").unwrap();

        let names: Vec<String> = list_audio_tracks(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.M4A", "b.mp3", "c.wav"]);
        assert!(list_audio_tracks(&dir.path().join("missing")).is_empty());
    }

    #[tokio::test]
    async fn placeholder_producer_never_fails() {
        let artifact = PlaceholderProducer.produce("Fig").await.unwrap();
        assert!(artifact.placeholder);
    }
}
