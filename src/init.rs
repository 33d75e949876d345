use crate::config::{BackendKind, Config};
use crate::logi;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;

fn required_dirs(config: &Config) -> Vec<PathBuf> {
    let mut dirs = vec![config.output_dir.clone()];
    if config.backend() == BackendKind::Csv {
        dirs.push(config.data_dir.clone());
    }
    if let Some(audio) = &config.audio_dir {
        dirs.push(audio.clone());
    }
    dirs
}

pub async fn ensure_directories(config: &Config) -> Result<()> {
    for dir in required_dirs(config) {
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

pub async fn check_ffmpeg() -> bool {
    match tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
