use crate::logw;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::process::Command;

pub const FRAME_WIDTH: u32 = 720;
pub const FRAME_HEIGHT: u32 = 1280;
const BACKGROUND: &str = "0x1a1a2e";
const FONT_SIZE: u32 = 40;

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let output = cmd.output().await.context("Command execution failed")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let start = stderr.char_indices().rev().nth(599).map(|(i, _)| i).unwrap_or(0);
        return Err(anyhow::anyhow!("{} failed ({}): {}", args[0], output.status, &stderr[start..]));
    }

    Ok(())
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.1 {
        return Err(anyhow::anyhow!("Invalid duration"));
    }
    Ok(duration)
}

/// Escapes text for a `drawtext` value nested inside a filtergraph.
pub fn drawtext_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' | '\'' | ':' | '%' | ',' | ';' | '[' | ']' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' | '\r' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

pub fn title_card_args(caption: &str, duration_s: u32, out_mp4: &Path) -> Vec<String> {
    let filter = format!(
        "drawtext=text={}:fontcolor=white:fontsize={}:x=(w-text_w)/2:y=(h-text_h)/2",
        drawtext_escape(caption),
        FONT_SIZE
    );
    vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!(
            "color=c={}:size={}x{}:duration={}",
            BACKGROUND, FRAME_WIDTH, FRAME_HEIGHT, duration_s
        ),
        "-vf".to_string(),
        filter,
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-t".to_string(),
        duration_s.to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        out_mp4.display().to_string(),
    ]
}

/// Renders a vertical solid-color clip with `caption` centered on it.
pub async fn ffmpeg_render_title_card(caption: &str, duration_s: u32, out_mp4: &Path) -> Result<bool> {
    run_cmd(&title_card_args(caption, duration_s, out_mp4)).await?;
    Ok(out_mp4.exists())
}

/// Replaces the audio of `video_in` with `audio_in`, cut to the video length.
pub async fn ffmpeg_attach_audio(video_in: &Path, audio_in: &Path, video_out: &Path) -> Result<bool> {
    let args = vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        video_in.display().to_string(),
        "-i".to_string(),
        audio_in.display().to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-shortest".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        video_out.display().to_string(),
    ];

    if let Err(err) = run_cmd(&args).await {
        logw(format!("Audio attach failed: {}", err));
        return Ok(false);
    }

    Ok(video_out.exists())
}
