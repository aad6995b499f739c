//! Capture process management.
//!
//! [`ScreenRecorder`] owns at most one encoder process. Starting while a
//! process is active is an error; stopping is idempotent. The encoder is
//! asked to quit by writing `q` to its stdin and is killed if it does not
//! exit within the stop timeout.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use snapreel_common::clock::timestamp_slug;
use snapreel_common::config::{AppConfig, EncoderCommand};
use snapreel_common::error::{SnapreelError, SnapreelResult};
use snapreel_platform_core::MonitorDescriptor;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;

use crate::command::{CaptureCommand, CaptureSource};
use crate::overlay::{spawn_overlay, OverlayFactory, OverlayHandle, TracingOverlayFactory};
use crate::quality::{QualityProfile, DEFAULT_LEVEL};
use crate::region::{compute_region, CaptureRegion, RegionMatch, ScreenPoint};
use crate::signal::RecordingWatch;

/// Lines of encoder stderr kept for diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Returned by a successful start; echoes the geometry that was bound.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureStarted {
    pub region: CaptureRegion,
    pub output: PathBuf,
    pub profile: QualityProfile,
    pub pid: Option<u32>,
}

/// Returned by a stop that found an active process.
#[derive(Debug, Clone)]
pub struct CaptureStopped {
    pub output: PathBuf,
    pub status: Option<ExitStatus>,
    /// The encoder ignored `q` and had to be killed.
    pub forced: bool,
    pub stderr_tail: Vec<String>,
}

impl CaptureStopped {
    pub fn exited_cleanly(&self) -> bool {
        !self.forced && self.status.is_some_and(|s| s.success())
    }
}

type StderrTail = Arc<Mutex<VecDeque<String>>>;

struct CaptureProcess {
    child: Child,
    output: PathBuf,
    stderr_tail: StderrTail,
    drain: Option<JoinHandle<()>>,
}

fn spawn_stderr_drain(stderr: ChildStderr, tail: StderrTail) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(target: "snapreel::encoder", "{line}");
            if let Ok(mut tail) = tail.lock() {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
    })
}

/// Drives the external encoder for one region at a time.
pub struct ScreenRecorder {
    encoder: EncoderCommand,
    source: CaptureSource,
    profile: QualityProfile,
    output_dir: PathBuf,
    stop_timeout: Duration,
    overlay_refresh: Duration,
    overlay_factory: Arc<dyn OverlayFactory>,
    process: Option<CaptureProcess>,
    overlay: Option<OverlayHandle>,
}

impl ScreenRecorder {
    pub fn new(encoder: EncoderCommand, source: CaptureSource) -> Self {
        Self {
            encoder,
            source,
            profile: QualityProfile::for_level(i32::from(DEFAULT_LEVEL)),
            output_dir: PathBuf::from("."),
            stop_timeout: Duration::from_secs(5),
            overlay_refresh: Duration::from_millis(100),
            overlay_factory: Arc::new(TracingOverlayFactory),
            process: None,
            overlay: None,
        }
    }

    /// Recorder for the current platform using configured defaults.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut recorder = Self::new(config.recording.encoder.clone(), CaptureSource::detect())
            .with_output_dir(config.output_dir.clone())
            .with_stop_timeout(config.recording.stop_timeout())
            .with_overlay_refresh(config.recording.overlay_refresh_interval());
        recorder.configure(i32::from(config.recording.quality));
        recorder
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_overlay_refresh(mut self, interval: Duration) -> Self {
        self.overlay_refresh = interval;
        self
    }

    pub fn with_overlay_factory(mut self, factory: Arc<dyn OverlayFactory>) -> Self {
        self.overlay_factory = factory;
        self
    }

    /// Select the quality profile for `level`, clamped into 1..=5.
    pub fn configure(&mut self, level: i32) -> QualityProfile {
        self.profile = QualityProfile::for_level(level);
        tracing::debug!(
            level = self.profile.level,
            fps = self.profile.fps,
            crf = self.profile.crf,
            preset = %self.profile.preset,
            "Quality configured"
        );
        self.profile
    }

    pub fn profile(&self) -> QualityProfile {
        self.profile
    }

    pub fn encoder(&self) -> &EncoderCommand {
        &self.encoder
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn compute_region(
        &self,
        p1: ScreenPoint,
        p2: ScreenPoint,
        monitors: &[MonitorDescriptor],
    ) -> RegionMatch {
        compute_region(p1, p2, monitors)
    }

    pub fn is_recording(&self) -> bool {
        self.process.is_some()
    }

    /// Output path of the active capture.
    pub fn output_path(&self) -> Option<&Path> {
        self.process.as_ref().map(|p| p.output.as_path())
    }

    /// Start capturing to `screen_recording_<timestamp>.mp4` in the output directory.
    pub fn start(&mut self, region: CaptureRegion) -> SnapreelResult<CaptureStarted> {
        let output = self
            .output_dir
            .join(format!("screen_recording_{}.mp4", timestamp_slug()));
        self.start_to(region, output)
    }

    /// Start capturing `region` into `output`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_to(&mut self, region: CaptureRegion, output: PathBuf) -> SnapreelResult<CaptureStarted> {
        if self.process.is_some() {
            return Err(SnapreelError::AlreadyRecording);
        }
        if region.is_empty() {
            return Err(SnapreelError::capture(format!(
                "capture region {} is empty",
                region.resolution()
            )));
        }

        let capture = CaptureCommand::new(self.source.clone(), region, self.profile, &output);
        let args = capture.args();
        tracing::debug!(program = %self.encoder.display_name(), args = ?args, "Launching encoder");

        let mut child = Command::new(&self.encoder.program)
            .args(&self.encoder.pre_args)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SnapreelError::LaunchFailed {
                program: self.encoder.display_name(),
                source,
            })?;

        let pid = child.id();
        let stderr_tail: StderrTail = Arc::new(Mutex::new(VecDeque::new()));
        let drain = child
            .stderr
            .take()
            .map(|stderr| spawn_stderr_drain(stderr, Arc::clone(&stderr_tail)));

        tracing::info!(
            pid,
            source = self.source.format_name(),
            left = region.left,
            top = region.top,
            size = %region.resolution(),
            fps = self.profile.fps,
            output = %output.display(),
            "Capture process started"
        );

        self.process = Some(CaptureProcess {
            child,
            output: output.clone(),
            stderr_tail,
            drain,
        });

        Ok(CaptureStarted {
            region,
            output,
            profile: self.profile,
            pid,
        })
    }

    /// Stop the active capture, if any, and close the overlay.
    ///
    /// Returns `None` when nothing was running.
    pub async fn stop(&mut self) -> SnapreelResult<Option<CaptureStopped>> {
        let stopped = match self.process.take() {
            Some(process) => self.stop_process(process).await.map(Some),
            None => Ok(None),
        };
        // The overlay goes away even when the encoder could not be reaped.
        self.close_overlay().await;
        stopped
    }

    async fn stop_process(&self, mut process: CaptureProcess) -> SnapreelResult<CaptureStopped> {
        if let Some(mut stdin) = process.child.stdin.take() {
            let sent = async {
                stdin.write_all(b"q").await?;
                stdin.flush().await
            }
            .await;
            if let Err(e) = sent {
                // The encoder may already have exited on its own.
                tracing::warn!(error = %e, "Could not send quit to encoder");
            }
        }

        let (status, forced) = match tokio::time::timeout(self.stop_timeout, process.child.wait()).await {
            Ok(Ok(status)) => (Some(status), false),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Waiting on encoder failed, killing it");
                process.child.kill().await?;
                (process.child.wait().await.ok(), true)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "Encoder ignored quit request, killing it"
                );
                process.child.kill().await?;
                (process.child.wait().await.ok(), true)
            }
        };

        if let Some(mut drain) = process.drain.take() {
            if tokio::time::timeout(Duration::from_secs(1), &mut drain).await.is_err() {
                drain.abort();
            }
        }

        let stderr_tail: Vec<String> = process
            .stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect())
            .unwrap_or_default();

        let stopped = CaptureStopped {
            output: process.output,
            status,
            forced,
            stderr_tail,
        };

        if stopped.exited_cleanly() {
            tracing::info!(output = %stopped.output.display(), "Capture process stopped");
        } else {
            tracing::warn!(
                output = %stopped.output.display(),
                status = ?stopped.status,
                forced,
                stderr = %stopped.stderr_tail.join("\n"),
                "Capture process did not exit cleanly"
            );
        }
        Ok(stopped)
    }

    /// Outline `region` with an overlay kept on top while `watch` reports
    /// recording. Replaces any overlay this recorder already shows.
    pub async fn show_boundary_overlay(
        &mut self,
        region: CaptureRegion,
        watch: RecordingWatch,
    ) -> SnapreelResult<()> {
        self.close_overlay().await;
        let handle = spawn_overlay(
            self.overlay_factory.as_ref(),
            region,
            self.overlay_refresh,
            watch,
        )?;
        self.overlay = Some(handle);
        Ok(())
    }

    async fn close_overlay(&mut self) {
        if let Some(overlay) = self.overlay.take() {
            overlay.close().await;
        }
    }
}

impl std::fmt::Debug for ScreenRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenRecorder")
            .field("encoder", &self.encoder)
            .field("source", &self.source)
            .field("profile", &self.profile)
            .field("output_dir", &self.output_dir)
            .field("recording", &self.is_recording())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::overlay::testing::CountingOverlayFactory;
    use crate::signal::RecordingSignal;
    use std::sync::atomic::Ordering;

    /// Writes the output file, then exits once a byte arrives on stdin.
    const WELL_BEHAVED: &str =
        "for last; do :; done; printf frame-data > \"$last\"; head -c 1 >/dev/null";

    fn shell_encoder(script: &str) -> EncoderCommand {
        EncoderCommand {
            program: PathBuf::from("sh"),
            pre_args: vec!["-c".into(), script.into(), "fake-ffmpeg".into()],
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("snapreel_recorder_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn region() -> CaptureRegion {
        CaptureRegion {
            left: 10,
            top: 20,
            width: 320,
            height: 240,
        }
    }

    fn recorder(script: &str, tag: &str) -> ScreenRecorder {
        ScreenRecorder::new(
            shell_encoder(script),
            CaptureSource::X11 {
                display: ":99".into(),
            },
        )
        .with_output_dir(temp_dir(tag))
    }

    #[tokio::test]
    async fn start_then_stop_with_quit_byte() {
        let mut rec = recorder(WELL_BEHAVED, "quit");
        let started = rec.start(region()).unwrap();
        assert!(rec.is_recording());
        assert_eq!(started.region, region());
        assert!(started
            .output
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("screen_recording_"));

        let stopped = rec.stop().await.unwrap().unwrap();
        assert!(!stopped.forced);
        assert!(stopped.exited_cleanly());
        assert_eq!(std::fs::read(&started.output).unwrap(), b"frame-data");
        assert!(!rec.is_recording());
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_active() {
        let mut rec = recorder(WELL_BEHAVED, "twice");
        let first = rec.start(region()).unwrap();
        let err = rec.start(region()).unwrap_err();
        assert!(matches!(err, SnapreelError::AlreadyRecording));
        assert_eq!(rec.output_path(), Some(first.output.as_path()));
        rec.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut rec = recorder(WELL_BEHAVED, "idempotent");
        assert!(rec.stop().await.unwrap().is_none());
        rec.start(region()).unwrap();
        assert!(rec.stop().await.unwrap().is_some());
        assert!(rec.stop().await.unwrap().is_none());
        assert!(rec.stop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unresponsive_encoder_is_killed_after_timeout() {
        let mut rec = recorder("exec sleep 30", "kill").with_stop_timeout(Duration::from_millis(200));
        rec.start(region()).unwrap();

        let started = std::time::Instant::now();
        let stopped = rec.stop().await.unwrap().unwrap();
        assert!(stopped.forced);
        assert!(!stopped.exited_cleanly());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn encoder_stderr_tail_is_kept() {
        let script = "echo 'Unknown input format' >&2; exit 1";
        let mut rec = recorder(script, "stderr");
        rec.start(region()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stopped = rec.stop().await.unwrap().unwrap();
        assert!(!stopped.exited_cleanly());
        assert_eq!(stopped.stderr_tail, vec!["Unknown input format".to_string()]);
    }

    #[tokio::test]
    async fn missing_encoder_is_launch_failed_and_leaves_no_handle() {
        let mut rec = ScreenRecorder::new(
            EncoderCommand::program("/nonexistent/ffmpeg"),
            CaptureSource::Gdigrab,
        );
        let err = rec.start(region()).unwrap_err();
        assert!(matches!(err, SnapreelError::LaunchFailed { .. }));
        assert!(!rec.is_recording());
    }

    #[tokio::test]
    async fn empty_region_is_rejected_before_launch() {
        let mut rec = recorder(WELL_BEHAVED, "empty");
        let err = rec
            .start(CaptureRegion {
                width: 0,
                ..region()
            })
            .unwrap_err();
        assert!(matches!(err, SnapreelError::Capture { .. }));
        assert!(!rec.is_recording());
    }

    #[tokio::test]
    async fn stop_tears_down_overlay() {
        let factory = CountingOverlayFactory::default();
        let mut rec = recorder(WELL_BEHAVED, "overlay")
            .with_overlay_factory(Arc::new(factory.clone()))
            .with_overlay_refresh(Duration::from_millis(10));
        let signal = RecordingSignal::recording();

        rec.start(region()).unwrap();
        rec.show_boundary_overlay(region(), signal.watch()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        rec.stop().await.unwrap();
        assert!(factory.closed.load(Ordering::SeqCst));
        assert!(factory.raises.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn forced_stop_still_tears_down_overlay() {
        let factory = CountingOverlayFactory::default();
        let mut rec = recorder("exec sleep 30", "overlay_kill")
            .with_stop_timeout(Duration::from_millis(100))
            .with_overlay_factory(Arc::new(factory.clone()))
            .with_overlay_refresh(Duration::from_millis(10));
        let signal = RecordingSignal::recording();

        rec.start(region()).unwrap();
        rec.show_boundary_overlay(region(), signal.watch()).await.unwrap();

        let stopped = rec.stop().await.unwrap().unwrap();
        assert!(stopped.forced);
        assert!(factory.closed.load(Ordering::SeqCst));
        assert!(!rec.is_recording());
    }

    #[test]
    fn configure_clamps_level() {
        let mut rec = ScreenRecorder::new(EncoderCommand::default(), CaptureSource::Gdigrab);
        assert_eq!(rec.configure(9).level, 5);
        assert_eq!(rec.configure(-2).level, 1);
        assert_eq!(rec.profile().fps, 15);
    }
}
