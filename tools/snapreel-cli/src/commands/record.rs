//! Record one region session.

use anyhow::Context;
use snapreel_capture_engine::platform::resolve_monitors_or_fallback;
use snapreel_capture_engine::{
    AudioCapture, AudioDevices, AudioSelection, GstAudioCapture, ScreenPoint, ScreenRecorder,
    SessionCoordinator, SessionParams, StatusSample,
};
use snapreel_common::config::AppConfig;
use snapreel_platform_core::{primary_monitor, MonitorDescriptor};

pub struct RecordArgs {
    pub region: Option<(ScreenPoint, ScreenPoint)>,
    pub output_devices: Vec<String>,
    pub default_output: bool,
    pub input_device: Option<String>,
    pub default_input: bool,
    pub json_status: bool,
}

impl RecordArgs {
    fn wants_audio(&self) -> bool {
        self.default_output
            || self.default_input
            || !self.output_devices.is_empty()
            || self.input_device.is_some()
    }
}

/// Corners of the primary monitor.
fn primary_region(monitors: &[MonitorDescriptor]) -> (ScreenPoint, ScreenPoint) {
    match primary_monitor(monitors) {
        Some(m) => (
            ScreenPoint::new(m.x, m.y),
            ScreenPoint::new(m.x + m.width as i32, m.y + m.height as i32),
        ),
        None => (ScreenPoint::new(0, 0), ScreenPoint::new(1920, 1080)),
    }
}

/// Resolve device names from the command line into backend ids.
fn select_devices(devices: &AudioDevices, args: &RecordArgs) -> anyhow::Result<AudioSelection> {
    let mut selection = AudioSelection::default();
    if args.default_output {
        let device = devices
            .default_output()
            .context("no default output device found")?;
        selection.outputs.push(device.id.clone());
    }
    for query in &args.output_devices {
        let device = devices
            .find_output(query)
            .with_context(|| format!("no output device matches '{query}'"))?;
        if !selection.outputs.contains(&device.id) {
            selection.outputs.push(device.id.clone());
        }
    }
    if let Some(query) = &args.input_device {
        let device = devices
            .find_input(query)
            .with_context(|| format!("no input device matches '{query}'"))?;
        selection.input = Some(device.id.clone());
    } else if args.default_input {
        let device = devices
            .default_input()
            .context("no default input device found")?;
        selection.input = Some(device.id.clone());
    }
    Ok(selection)
}

fn print_status(sample: &StatusSample, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(sample) {
            println!("{line}");
        }
    } else {
        println!(
            "  {}  {:>10}  {}  {}",
            sample.elapsed, sample.size, sample.resolution, sample.fps
        );
    }
}

pub async fn run(config: AppConfig, args: RecordArgs) -> anyhow::Result<()> {
    let monitors = resolve_monitors_or_fallback();
    let (p1, p2) = args.region.unwrap_or_else(|| primary_region(&monitors));

    let mut audio = GstAudioCapture::new(config.recording.audio_sample_rate);
    let selection = if args.wants_audio() {
        let (returned, devices) = tokio::task::spawn_blocking(move || {
            let devices = audio.list_devices();
            (audio, devices)
        })
        .await
        .context("device enumeration task failed")?;
        audio = returned;
        select_devices(&devices?, &args)?
    } else {
        AudioSelection::default()
    };

    record(config, audio, selection, p1, p2, &monitors, args.json_status).await
}

async fn record(
    config: AppConfig,
    audio: GstAudioCapture,
    selection: AudioSelection,
    p1: ScreenPoint,
    p2: ScreenPoint,
    monitors: &[MonitorDescriptor],
    json_status: bool,
) -> anyhow::Result<()> {
    let recorder = ScreenRecorder::from_config(&config);
    let mut coordinator = SessionCoordinator::new(&config, recorder, Box::new(audio));

    coordinator.begin(SessionParams {
        quality: i32::from(config.recording.quality),
        audio: selection,
    })?;
    let session = coordinator.commit_region(p1, p2, monitors).await?;

    println!("Recording {} at {}", session.region.resolution(), session.quality.fps_label());
    println!("  Video: {}", session.video_path.display());
    for path in &session.audio_paths {
        println!("  Audio: {}", path.display());
    }
    println!();
    println!("Press Ctrl+C to stop recording...");
    println!();

    let mut status = coordinator.subscribe_status();
    let printer = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let sample = status.borrow_and_update().clone();
            if let Some(sample) = sample {
                print_status(&sample, json_status);
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    println!();

    let result = coordinator.stop().await;
    printer.abort();
    let outcome = result?;

    if outcome.merged {
        println!("Recording saved with audio to: {}", outcome.artifact.display());
    } else {
        println!("Recording saved to: {}", outcome.artifact.display());
    }
    Ok(())
}
