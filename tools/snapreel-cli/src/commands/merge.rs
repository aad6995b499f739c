//! Mix audio tracks onto an existing recording.

use std::path::PathBuf;

use anyhow::Context;
use snapreel_common::config::AppConfig;

pub async fn run(config: &AppConfig, video: PathBuf, audio: Vec<PathBuf>) -> anyhow::Result<()> {
    println!("Merging {} audio track(s) into {}", audio.len(), video.display());

    let encoder = config.recording.encoder.clone();
    let output = tokio::task::spawn_blocking(move || snapreel_finalize::merge(&encoder, &video, &audio))
        .await
        .context("merge task failed")??;

    println!("Merged output: {}", output.display());
    Ok(())
}
