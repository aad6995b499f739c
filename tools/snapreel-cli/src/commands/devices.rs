//! List audio endpoints.

use anyhow::Context;
use snapreel_capture_engine::{AudioCapture, AudioDevice, GstAudioCapture};
use snapreel_common::config::AppConfig;

fn print_group(title: &str, devices: &[AudioDevice]) {
    println!("{title}:");
    if devices.is_empty() {
        println!("  (none)");
    }
    for d in devices {
        let marker = if d.is_default { "*" } else { " " };
        println!("  {marker} {}", d.name);
        println!("      id: {}", d.id);
    }
}

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let audio = GstAudioCapture::new(config.recording.audio_sample_rate);
    let devices = tokio::task::spawn_blocking(move || audio.list_devices())
        .await
        .context("device enumeration task failed")??;

    print_group("Output devices", &devices.outputs);
    println!();
    print_group("Input devices", &devices.inputs);
    println!();
    println!("* = system default");
    Ok(())
}
