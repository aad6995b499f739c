//! Audio capture facade.
//!
//! The session coordinator only sees [`AudioCapture`]: list endpoints,
//! start capturing a selection into WAV files, stop. [`GstAudioCapture`]
//! implements it with one GStreamer pipeline per selected device.

use std::path::{Path, PathBuf};

use gst::prelude::*;
use gstreamer as gst;
use serde::Serialize;
use snapreel_common::error::{SnapreelError, SnapreelResult};

use crate::pipeline::{escape_value, init_gstreamer, wav_pipeline_launch, CapturePipeline, GstCapturePipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Playback endpoint, captured through its loopback/monitor.
    Output,
    /// Recording endpoint such as a microphone.
    Input,
}

/// An audio endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioDevice {
    /// Backend identifier used to open the stream.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    pub is_default: bool,
    pub kind: DeviceKind,
}

/// Enumerated endpoints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AudioDevices {
    pub outputs: Vec<AudioDevice>,
    pub inputs: Vec<AudioDevice>,
}

impl AudioDevices {
    fn find<'a>(devices: &'a [AudioDevice], query: &str) -> Option<&'a AudioDevice> {
        devices
            .iter()
            .find(|d| d.id == query || d.name == query)
            .or_else(|| {
                let query = query.to_lowercase();
                devices.iter().find(|d| d.name.to_lowercase().contains(&query))
            })
    }

    /// Output device by exact id or name, else case-insensitive name substring.
    pub fn find_output(&self, query: &str) -> Option<&AudioDevice> {
        Self::find(&self.outputs, query)
    }

    /// Input device by exact id or name, else case-insensitive name substring.
    pub fn find_input(&self, query: &str) -> Option<&AudioDevice> {
        Self::find(&self.inputs, query)
    }

    pub fn default_output(&self) -> Option<&AudioDevice> {
        self.outputs.iter().find(|d| d.is_default)
    }

    pub fn default_input(&self) -> Option<&AudioDevice> {
        self.inputs.iter().find(|d| d.is_default)
    }
}

/// Devices chosen for one session, by backend id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioSelection {
    pub outputs: Vec<String>,
    pub input: Option<String>,
}

impl AudioSelection {
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty() && self.input.is_none()
    }
}

/// File paths for a selection: `<base>_output_<n>.wav` then `<base>_input.wav`.
pub fn audio_output_paths(base: &Path, selection: &AudioSelection) -> Vec<PathBuf> {
    let stem = base.to_string_lossy();
    let mut paths: Vec<PathBuf> = (1..=selection.outputs.len())
        .map(|n| PathBuf::from(format!("{stem}_output_{n}.wav")))
        .collect();
    if selection.input.is_some() {
        paths.push(PathBuf::from(format!("{stem}_input.wav")));
    }
    paths
}

/// Black-box audio recorder driven by the session coordinator.
pub trait AudioCapture: Send {
    fn list_devices(&self) -> SnapreelResult<AudioDevices>;

    /// Start capturing `selection` into files derived from `base`.
    ///
    /// Returns the file paths being written, in selection order. An empty
    /// selection returns no paths. On error nothing is left running.
    fn start(&mut self, selection: &AudioSelection, base: &Path) -> SnapreelResult<Vec<PathBuf>>;

    /// Stop and finalize every file from the last `start`. Idempotent.
    fn stop(&mut self) -> SnapreelResult<()>;
}

/// Audio server the GStreamer sources talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioBackend {
    Pulse,
    Wasapi,
}

impl AudioBackend {
    pub fn detect() -> Self {
        if cfg!(windows) {
            Self::Wasapi
        } else {
            Self::Pulse
        }
    }

    /// Source element capturing what an output device plays.
    pub fn output_source(self, device_id: &str) -> String {
        let id = escape_value(device_id);
        match self {
            Self::Pulse => format!("pulsesrc device=\"{id}.monitor\""),
            Self::Wasapi => format!("wasapisrc loopback=true low-latency=true device=\"{id}\""),
        }
    }

    /// Source element capturing an input device.
    pub fn input_source(self, device_id: &str) -> String {
        let id = escape_value(device_id);
        match self {
            Self::Pulse => format!("pulsesrc device=\"{id}\""),
            Self::Wasapi => format!("wasapisrc low-latency=true device=\"{id}\""),
        }
    }
}

/// GStreamer-backed [`AudioCapture`].
pub struct GstAudioCapture {
    backend: AudioBackend,
    sample_rate: u32,
    pipelines: Vec<Box<dyn CapturePipeline>>,
}

impl GstAudioCapture {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            backend: AudioBackend::detect(),
            sample_rate,
            pipelines: Vec::new(),
        }
    }

    fn launch_all(&mut self, sources: &[(String, String)], paths: &[PathBuf]) -> SnapreelResult<()> {
        for ((name, source), path) in sources.iter().zip(paths) {
            let launch = wav_pipeline_launch(source, self.sample_rate, path);
            tracing::debug!(pipeline = %name, %launch, "Starting audio pipeline");
            let mut pipeline = GstCapturePipeline::from_launch(name.clone(), &launch)?;
            pipeline.start()?;
            self.pipelines.push(Box::new(pipeline));
        }
        Ok(())
    }
}

impl AudioCapture for GstAudioCapture {
    fn list_devices(&self) -> SnapreelResult<AudioDevices> {
        init_gstreamer()?;

        let monitor = gst::DeviceMonitor::new();
        monitor.add_filter(Some("Audio/Sink"), None);
        monitor.add_filter(Some("Audio/Source"), None);
        monitor
            .start()
            .map_err(|e| SnapreelError::audio(format!("Failed to start device monitor: {e}")))?;
        let devices = monitor.devices();
        monitor.stop();

        let mut found = AudioDevices::default();
        for device in devices.iter() {
            let class = device.device_class();
            let props = device.properties();
            let is_monitor = props
                .as_ref()
                .and_then(|p| p.get::<String>("device.class").ok())
                .is_some_and(|c| c == "monitor");

            let kind = if class.starts_with("Audio/Sink") {
                DeviceKind::Output
            } else if class.starts_with("Audio/Source") && !is_monitor {
                DeviceKind::Input
            } else {
                continue;
            };

            let entry = AudioDevice {
                id: device_id(device),
                name: device.display_name().to_string(),
                is_default: props
                    .as_ref()
                    .and_then(|p| p.get::<bool>("is-default").ok())
                    .unwrap_or(false),
                kind,
            };
            match kind {
                DeviceKind::Output => found.outputs.push(entry),
                DeviceKind::Input => found.inputs.push(entry),
            }
        }

        tracing::debug!(
            outputs = found.outputs.len(),
            inputs = found.inputs.len(),
            "Audio devices enumerated"
        );
        Ok(found)
    }

    fn start(&mut self, selection: &AudioSelection, base: &Path) -> SnapreelResult<Vec<PathBuf>> {
        if !self.pipelines.is_empty() {
            return Err(SnapreelError::audio_start("audio capture already running"));
        }
        if selection.is_empty() {
            return Ok(Vec::new());
        }

        let mut sources: Vec<(String, String)> = selection
            .outputs
            .iter()
            .enumerate()
            .map(|(i, id)| (format!("output-{}", i + 1), self.backend.output_source(id)))
            .collect();
        if let Some(id) = &selection.input {
            sources.push(("input".to_string(), self.backend.input_source(id)));
        }
        let paths = audio_output_paths(base, selection);

        if let Err(e) = self.launch_all(&sources, &paths) {
            if let Err(stop_err) = self.stop() {
                tracing::warn!(error = %stop_err, "Failed to tear down partial audio capture");
            }
            return Err(SnapreelError::audio_start(e.to_string()));
        }

        tracing::info!(files = paths.len(), "Audio capture started");
        Ok(paths)
    }

    fn stop(&mut self) -> SnapreelResult<()> {
        let mut first_err = None;
        for mut pipeline in self.pipelines.drain(..) {
            if let Err(e) = pipeline.stop() {
                tracing::warn!(pipeline = %pipeline.name(), error = %e, "Audio pipeline stop failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

fn device_id(device: &gst::Device) -> String {
    if device.find_property("internal-name").is_some() {
        let id = device.property::<String>("internal-name");
        if !id.is_empty() {
            return id;
        }
    }
    device
        .properties()
        .and_then(|p| {
            ["device.strid", "device.api.id", "device.name"]
                .iter()
                .find_map(|key| p.get::<String>(*key).ok())
        })
        .unwrap_or_else(|| device.display_name().to_string())
}
