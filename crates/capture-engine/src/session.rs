//! Recording session coordination.
//!
//! [`SessionCoordinator`] walks one recording through
//! `Idle → AwaitingRegion → Starting → Recording → Stopping → Finalizing →
//! Complete`, entering `Failed` when the video path cannot be recovered.
//! Audio problems never abort a session; they degrade it to video-only.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use snapreel_common::clock::{timestamp_slug, RecordingClock};
use snapreel_common::config::{AppConfig, StabilizationConfig};
use snapreel_common::error::{SnapreelError, SnapreelResult};
use snapreel_platform_core::MonitorDescriptor;

use crate::audio::{AudioCapture, AudioSelection};
use crate::quality::QualityProfile;
use crate::recorder::ScreenRecorder;
use crate::region::{CaptureRegion, RegionMatch, ScreenPoint};
use crate::signal::RecordingSignal;
use crate::stabilize::wait_for_stable_file;
use crate::status::{status_channel, StatusMonitor, StatusPublisher, StatusReceiver, StatusSource};

/// State of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session in progress.
    Idle,
    /// Parameters captured; waiting for the user to draw a region.
    AwaitingRegion,
    /// Region committed; capture is being launched.
    Starting,
    Recording,
    Stopping,
    /// Waiting for the video to settle, then mixing in audio.
    Finalizing,
    Complete,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Parameters fixed when a session begins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionParams {
    /// Quality level, clamped into 1..=5 at commit.
    pub quality: i32,
    pub audio: AudioSelection,
}

/// A session that has started recording.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub started_at: DateTime<Local>,
    pub clock: RecordingClock,
    pub video_path: PathBuf,
    /// Audio files being written; empty when recording video only.
    pub audio_paths: Vec<PathBuf>,
    pub region: CaptureRegion,
    /// Name of the monitor the region started on, if any matched.
    pub monitor: Option<String>,
    pub scaling: f64,
    pub quality: QualityProfile,
}

/// Result of a completed stop sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Final file to hand to the user.
    pub artifact: PathBuf,
    pub video_path: PathBuf,
    pub audio_paths: Vec<PathBuf>,
    /// Whether `artifact` is the merged audio/video file.
    pub merged: bool,
}

/// Drives one recording session at a time.
pub struct SessionCoordinator {
    state: SessionState,
    recorder: ScreenRecorder,
    audio: Option<Box<dyn AudioCapture>>,
    audio_active: bool,
    stabilization: StabilizationConfig,
    status_interval: Duration,
    params: Option<SessionParams>,
    session: Option<RecordingSession>,
    signal: Option<RecordingSignal>,
    status_monitor: Option<StatusMonitor>,
    status_tx: StatusPublisher,
    status_rx: StatusReceiver,
    outcome: Option<SessionOutcome>,
    last_error: Option<String>,
}

impl SessionCoordinator {
    pub fn new(config: &AppConfig, recorder: ScreenRecorder, audio: Box<dyn AudioCapture>) -> Self {
        let (status_tx, status_rx) = status_channel();
        Self {
            state: SessionState::Idle,
            recorder,
            audio: Some(audio),
            audio_active: false,
            stabilization: config.stabilization,
            status_interval: config.recording.status_interval(),
            params: None,
            session: None,
            signal: None,
            status_monitor: None,
            status_tx,
            status_rx,
            outcome: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The active or most recent session.
    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// Message of the error that moved the session to `Failed`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Latest status sample; `None` outside of `Recording`.
    pub fn subscribe_status(&self) -> StatusReceiver {
        self.status_rx.clone()
    }

    pub fn recorder(&self) -> &ScreenRecorder {
        &self.recorder
    }

    /// Capture session parameters and wait for a region.
    pub fn begin(&mut self, params: SessionParams) -> SnapreelResult<()> {
        self.expect_state(SessionState::Idle, "begin")?;
        tracing::debug!(quality = params.quality, audio = ?params.audio, "Session parameters captured");
        self.params = Some(params);
        self.state = SessionState::AwaitingRegion;
        Ok(())
    }

    /// Abandon region selection. Nothing has been allocated yet.
    pub fn cancel(&mut self) -> SnapreelResult<()> {
        self.expect_state(SessionState::AwaitingRegion, "cancel")?;
        self.params = None;
        self.state = SessionState::Idle;
        tracing::info!("Region selection cancelled");
        Ok(())
    }

    /// Return a finished coordinator to `Idle`.
    pub fn reset(&mut self) -> SnapreelResult<()> {
        if !(self.state.is_terminal() || self.state == SessionState::Idle) {
            return Err(SnapreelError::invalid_state(format!(
                "cannot reset while {:?}",
                self.state
            )));
        }
        self.params = None;
        self.session = None;
        self.outcome = None;
        self.last_error = None;
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Commit the region spanned by `p1` and `p2` and start recording.
    pub async fn commit_region(
        &mut self,
        p1: ScreenPoint,
        p2: ScreenPoint,
        monitors: &[MonitorDescriptor],
    ) -> SnapreelResult<RecordingSession> {
        self.expect_state(SessionState::AwaitingRegion, "commit a region")?;
        let params = self.params.clone().unwrap_or_default();
        self.state = SessionState::Starting;

        let matched = self.recorder.compute_region(p1, p2, monitors);
        let region = matched.region();
        match &matched {
            RegionMatch::Matched { monitor, .. } => {
                tracing::info!(monitor = %monitor.name, scaling = monitor.scaling, "Region matched monitor");
            }
            RegionMatch::Unmatched { .. } => {
                tracing::warn!(x = p1.x, y = p1.y, "Region start is outside every monitor, assuming scale 1.0");
            }
        }

        let quality = self.recorder.configure(params.quality);
        let output_dir = self.recorder.output_dir().to_path_buf();
        let slug = timestamp_slug();
        let video_path = output_dir.join(format!("recording_{slug}.mp4"));

        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            return Err(self.fail(e.into()));
        }

        // Video first; nothing else is started unless it succeeds.
        if let Err(e) = self.recorder.start_to(region, video_path.clone()) {
            return Err(self.fail(e));
        }
        let clock = RecordingClock::start();
        let signal = RecordingSignal::recording();

        let mut audio_paths = Vec::new();
        if !params.audio.is_empty() {
            let selection = params.audio.clone();
            let base = output_dir.join(format!("recording_{slug}"));
            match self.with_audio(move |audio| audio.start(&selection, &base)).await {
                Ok(paths) => {
                    tracing::info!(tracks = paths.len(), "Audio capture started");
                    self.audio_active = true;
                    audio_paths = paths;
                }
                Err(e) => {
                    let e = match e {
                        SnapreelError::AudioStartFailed { .. } => e,
                        other => SnapreelError::audio_start(other.to_string()),
                    };
                    tracing::warn!(error = %e, "Continuing with video only");
                }
            }
        }

        if let Err(e) = self.recorder.show_boundary_overlay(region, signal.watch()).await {
            tracing::warn!(error = %e, "Boundary overlay unavailable");
        }

        self.status_monitor = Some(StatusMonitor::spawn(
            StatusSource {
                output: video_path.clone(),
                clock: clock.clone(),
                region,
                profile: quality,
            },
            self.status_interval,
            self.status_tx.clone(),
            signal.watch(),
        ));
        self.signal = Some(signal);

        let session = RecordingSession {
            started_at: Local::now(),
            clock,
            video_path,
            audio_paths,
            region,
            monitor: matched.monitor().map(|m| m.name.clone()),
            scaling: matched.scaling(),
            quality,
        };
        tracing::info!(
            video = %session.video_path.display(),
            audio_tracks = session.audio_paths.len(),
            size = %region.resolution(),
            quality = quality.level,
            "Recording started"
        );
        self.session = Some(session.clone());
        self.state = SessionState::Recording;
        Ok(session)
    }

    /// Stop recording and finalize the session.
    ///
    /// Calling this again after `Complete` returns the same outcome without
    /// touching any file.
    pub async fn stop(&mut self) -> SnapreelResult<SessionOutcome> {
        match self.state {
            SessionState::Recording => {}
            SessionState::Complete => {
                if let Some(outcome) = &self.outcome {
                    return Ok(outcome.clone());
                }
            }
            SessionState::Failed => {
                return Err(SnapreelError::invalid_state(format!(
                    "session failed: {}",
                    self.last_error.as_deref().unwrap_or("unknown error")
                )));
            }
            _ => {}
        }
        self.expect_state(SessionState::Recording, "stop")?;
        self.state = SessionState::Stopping;

        if let Some(signal) = self.signal.take() {
            signal.stop();
        }

        match self.recorder.stop().await {
            Ok(Some(stopped)) if !stopped.exited_cleanly() => {
                tracing::warn!(forced = stopped.forced, status = ?stopped.status, "Video capture ended abnormally");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Stopping video capture failed"),
        }

        if self.audio_active {
            self.audio_active = false;
            if let Err(e) = self.with_audio(|audio| audio.stop()).await {
                tracing::warn!(error = %e, "Stopping audio capture failed");
            }
        }

        if let Some(monitor) = self.status_monitor.take() {
            monitor.join().await;
        }
        self.status_tx.send_replace(None);

        let (video_path, audio_paths) = match &self.session {
            Some(s) => (s.video_path.clone(), s.audio_paths.clone()),
            None => return Err(self.fail(SnapreelError::invalid_state("no session to stop"))),
        };

        if audio_paths.is_empty() {
            // The encoder may have died at launch without writing anything.
            if let Err(e) = snapreel_finalize::check_artifacts(&video_path, &[]) {
                return Err(self.fail(e));
            }
            return Ok(self.complete(SessionOutcome {
                artifact: video_path.clone(),
                video_path,
                audio_paths,
                merged: false,
            }));
        }

        self.state = SessionState::Finalizing;
        match wait_for_stable_file(&video_path, &self.stabilization).await {
            Ok(bytes) => tracing::debug!(bytes, "Video output settled"),
            Err(e) => tracing::warn!(error = %e, "Finalizing anyway"),
        }

        let encoder = self.recorder.encoder().clone();
        let video = video_path.clone();
        let audio = audio_paths.clone();
        let merged = tokio::task::spawn_blocking(move || snapreel_finalize::merge(&encoder, &video, &audio))
            .await
            .map_err(|e| SnapreelError::capture(format!("merge task failed: {e}")))
            .and_then(|r| r);

        match merged {
            Ok(artifact) => Ok(self.complete(SessionOutcome {
                artifact,
                video_path,
                audio_paths,
                merged: true,
            })),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn complete(&mut self, outcome: SessionOutcome) -> SessionOutcome {
        tracing::info!(artifact = %outcome.artifact.display(), merged = outcome.merged, "Session complete");
        self.outcome = Some(outcome.clone());
        self.state = SessionState::Complete;
        outcome
    }

    fn fail(&mut self, error: SnapreelError) -> SnapreelError {
        tracing::error!(error = %error, state = ?self.state, "Session failed");
        self.last_error = Some(error.to_string());
        self.state = SessionState::Failed;
        error
    }

    fn expect_state(&self, expected: SessionState, action: &str) -> SnapreelResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SnapreelError::invalid_state(format!(
                "cannot {action} while {:?}",
                self.state
            )))
        }
    }

    /// Run a blocking audio call off the async workers.
    ///
    /// A panic inside `f` is reported as an audio error; the facade is
    /// handed back either way.
    async fn with_audio<T, F>(&mut self, f: F) -> SnapreelResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn AudioCapture) -> SnapreelResult<T> + Send + 'static,
    {
        let mut audio = self
            .audio
            .take()
            .ok_or_else(|| SnapreelError::audio("audio capture is unavailable"))?;
        let (audio, result) = tokio::task::spawn_blocking(move || {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| f(audio.as_mut())))
                .unwrap_or_else(|_| Err(SnapreelError::audio("audio capture panicked")));
            (audio, result)
        })
        .await
        .map_err(|e| SnapreelError::audio(format!("audio task failed: {e}")))?;
        self.audio = Some(audio);
        result
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.stop();
        }
    }
}
