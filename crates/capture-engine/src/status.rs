//! Periodic recording status sampling.
//!
//! While a session records, one background task samples elapsed time and
//! output size and publishes the latest [`StatusSample`] on a watch
//! channel. Consumers see only the newest value.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use snapreel_common::clock::{format_hms, format_size, RecordingClock};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::quality::QualityProfile;
use crate::region::CaptureRegion;
use crate::signal::RecordingWatch;

/// One status snapshot, preformatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSample {
    /// `HH:MM:SS`
    pub elapsed: String,
    /// Human-readable output size, e.g. `1.2 MB`.
    pub size: String,
    /// `WxH`
    pub resolution: String,
    /// `N fps`
    pub fps: String,
    pub elapsed_secs: u64,
    pub bytes: u64,
}

impl StatusSample {
    pub fn new(elapsed: Duration, bytes: u64, region: &CaptureRegion, profile: &QualityProfile) -> Self {
        Self {
            elapsed: format_hms(elapsed),
            size: format_size(bytes),
            resolution: region.resolution(),
            fps: profile.fps_label(),
            elapsed_secs: elapsed.as_secs(),
            bytes,
        }
    }
}

/// Publisher half of the status channel, shared with the monitor task.
pub type StatusPublisher = Arc<watch::Sender<Option<StatusSample>>>;

/// Receiver half handed to the presentation layer.
pub type StatusReceiver = watch::Receiver<Option<StatusSample>>;

/// Create an empty status channel.
pub fn status_channel() -> (StatusPublisher, StatusReceiver) {
    let (tx, rx) = watch::channel(None);
    (Arc::new(tx), rx)
}

/// What the monitor samples.
#[derive(Debug, Clone)]
pub struct StatusSource {
    pub output: PathBuf,
    pub clock: RecordingClock,
    pub region: CaptureRegion,
    pub profile: QualityProfile,
}

impl StatusSource {
    /// Take a sample now. A missing output file counts as zero bytes.
    pub async fn sample(&self) -> StatusSample {
        let bytes = tokio::fs::metadata(&self.output)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        StatusSample::new(self.clock.elapsed(), bytes, &self.region, &self.profile)
    }
}

/// Running status poller.
#[derive(Debug)]
pub struct StatusMonitor {
    task: JoinHandle<u64>,
}

impl StatusMonitor {
    /// Sample `source` every `interval` until `watch` reports stop.
    pub fn spawn(
        source: StatusSource,
        interval: Duration,
        publisher: StatusPublisher,
        mut watch: RecordingWatch,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut samples = 0u64;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = watch.stopped() => break,
                    _ = ticker.tick() => {
                        let sample = source.sample().await;
                        tracing::trace!(elapsed = %sample.elapsed, size = %sample.size, "Status sample");
                        if watch.is_recording() {
                            publisher.send_replace(Some(sample));
                            samples += 1;
                        }
                    }
                }
            }
            samples
        });
        Self { task }
    }

    /// Wait for the poller to exit after the recording signal fired.
    pub async fn join(self) {
        let mut task = self.task;
        match tokio::time::timeout(Duration::from_secs(2), &mut task).await {
            Ok(Ok(samples)) => tracing::debug!(samples, "Status monitor stopped"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Status monitor task failed"),
            Err(_) => {
                tracing::warn!("Status monitor did not stop in time, aborting it");
                task.abort();
            }
        }
    }
}
