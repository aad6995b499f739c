//! GStreamer pipeline wrapper used by the audio facade.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use snapreel_common::error::{SnapreelError, SnapreelResult};

/// How long `stop` waits for EOS to drain through the pipeline.
const EOS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A media pipeline writing to one output file.
pub trait CapturePipeline: Send {
    /// Start the pipeline.
    fn start(&mut self) -> SnapreelResult<()>;

    /// Stop the pipeline and finalize output.
    fn stop(&mut self) -> SnapreelResult<()>;

    fn is_running(&self) -> bool;

    fn name(&self) -> &str;
}

pub struct GstCapturePipeline {
    name: String,
    pipeline: gst::Pipeline,
    running: bool,
}

impl GstCapturePipeline {
    pub fn from_launch(name: impl Into<String>, launch: &str) -> SnapreelResult<Self> {
        init_gstreamer()?;

        let element = gst::parse::launch(launch)
            .map_err(|e| SnapreelError::audio(format!("Failed to build pipeline: {e}")))?;

        let pipeline = element
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| SnapreelError::audio("Launch string did not produce a pipeline"))?;

        Ok(Self {
            name: name.into(),
            pipeline,
            running: false,
        })
    }

    fn drain_eos(&self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        let start = std::time::Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= EOS_DRAIN_TIMEOUT {
                tracing::warn!(pipeline = %self.name, "EOS drain timed out");
                return;
            }
            let remaining = gst::ClockTime::from_nseconds((EOS_DRAIN_TIMEOUT - elapsed).as_nanos() as u64);
            match bus.timed_pop(remaining) {
                Some(msg) => match msg.view() {
                    gst::MessageView::Eos(_) => {
                        tracing::debug!(pipeline = %self.name, "EOS received; pipeline drained");
                        return;
                    }
                    gst::MessageView::Error(e) => {
                        tracing::warn!(
                            pipeline = %self.name,
                            error = %e.error(),
                            "Pipeline error during EOS drain"
                        );
                        return;
                    }
                    _ => {}
                },
                None => {
                    tracing::warn!(pipeline = %self.name, "EOS drain timed out");
                    return;
                }
            }
        }
    }
}

impl CapturePipeline for GstCapturePipeline {
    fn start(&mut self) -> SnapreelResult<()> {
        self.pipeline.set_state(gst::State::Playing).map_err(|e| {
            SnapreelError::audio(format!("Failed to start {} pipeline: {e:?}", self.name))
        })?;

        // State changes are async; the source may not be open until Playing.
        match self.pipeline.state(gst::ClockTime::from_seconds(10)) {
            (Ok(_), gst::State::Playing, _) => {}
            (Ok(_), state, _) => {
                tracing::warn!(
                    pipeline = %self.name,
                    ?state,
                    "Pipeline did not reach Playing state within timeout"
                );
            }
            (Err(e), _, _) => {
                let _ = self.pipeline.set_state(gst::State::Null);
                return Err(SnapreelError::audio(format!(
                    "{} pipeline failed to reach Playing state: {e:?}",
                    self.name
                )));
            }
        }

        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> SnapreelResult<()> {
        if !self.running {
            return Ok(());
        }

        // wavenc only writes its header sizes on EOS.
        if self.pipeline.send_event(gst::event::Eos::new()) {
            self.drain_eos();
        } else {
            tracing::warn!(pipeline = %self.name, "Failed to send EOS event; output may be truncated");
        }

        self.running = false;
        self.pipeline.set_state(gst::State::Null).map_err(|e| {
            SnapreelError::audio(format!("Failed to stop {} pipeline: {e:?}", self.name))
        })?;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for GstCapturePipeline {
    fn drop(&mut self) {
        if self.running {
            let _ = self.pipeline.set_state(gst::State::Null);
        }
    }
}

pub(crate) fn init_gstreamer() -> SnapreelResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(SnapreelError::audio(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Quote a value for a `gst-launch` property.
pub(crate) fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `<source> ! convert ! resample ! rate caps ! wavenc ! filesink`.
pub fn wav_pipeline_launch(source: &str, sample_rate: u32, output: &Path) -> String {
    let path = escape_value(&output.to_string_lossy());
    format!(
        "{source} ! queue ! audioconvert ! audioresample ! audio/x-raw,rate={sample_rate} ! wavenc ! filesink location=\"{path}\""
    )
}
