//! Merge command construction and execution.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use snapreel_common::config::EncoderCommand;
use snapreel_common::error::{SnapreelError, SnapreelResult};

/// Audio bitrate of the merged track.
pub const AUDIO_BITRATE: &str = "192k";

/// A fully-resolved merge invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub video: PathBuf,
    pub audio: Vec<PathBuf>,
    pub output: PathBuf,
}

impl MergePlan {
    /// Plan a merge writing next to `video` as `<stem>_with_audio.<ext>`.
    pub fn new(video: &Path, audio: &[PathBuf]) -> Self {
        Self {
            video: video.to_path_buf(),
            audio: audio.to_vec(),
            output: merged_output_path(video),
        }
    }

    /// The `amix` filter graph, e.g. `[1:a][2:a]amix=inputs=2:duration=longest[aout]`.
    pub fn filter_graph(&self) -> String {
        let labels: String = (1..=self.audio.len()).map(|i| format!("[{i}:a]")).collect();
        format!(
            "{labels}amix=inputs={}:duration=longest[aout]",
            self.audio.len()
        )
    }

    /// Encoder arguments, excluding the program and any wrapper arguments.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            self.video.display().to_string(),
        ];
        for audio in &self.audio {
            args.push("-i".to_string());
            args.push(audio.display().to_string());
        }
        args.extend([
            "-filter_complex".to_string(),
            self.filter_graph(),
            "-map".to_string(),
            "0:v".to_string(),
            "-map".to_string(),
            "[aout]".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            AUDIO_BITRATE.to_string(),
            self.output.display().to_string(),
        ]);
        args
    }
}

/// `<dir>/<stem>_with_audio.<ext>` for a given video path.
pub fn merged_output_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match video.extension() {
        Some(ext) => format!("{stem}_with_audio.{}", ext.to_string_lossy()),
        None => format!("{stem}_with_audio"),
    };
    video.with_file_name(name)
}

fn non_empty(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Verify every input exists and is non-empty.
///
/// Audio files are checked in order; the first bad one is named in the
/// error. Nothing is modified.
pub fn check_artifacts(video: &Path, audio: &[PathBuf]) -> SnapreelResult<()> {
    if !non_empty(video) {
        return Err(SnapreelError::MissingVideoArtifact {
            path: video.to_path_buf(),
        });
    }
    if let Some(bad) = audio.iter().find(|p| !non_empty(p)) {
        return Err(SnapreelError::MissingAudioArtifact { path: bad.clone() });
    }
    Ok(())
}

/// Mix `audio` onto `video` and return the path of the final artifact.
///
/// With no audio inputs this is a no-op returning `video`. A failed
/// encoder run leaves any partial output in place.
pub fn merge(encoder: &EncoderCommand, video: &Path, audio: &[PathBuf]) -> SnapreelResult<PathBuf> {
    if audio.is_empty() {
        tracing::debug!(video = %video.display(), "No audio inputs, skipping merge");
        return Ok(video.to_path_buf());
    }

    check_artifacts(video, audio)?;
    let plan = MergePlan::new(video, audio);
    run_merge(encoder, &plan)?;

    tracing::info!(
        output = %plan.output.display(),
        tracks = plan.audio.len(),
        "Audio merged onto video"
    );
    Ok(plan.output)
}

fn run_merge(encoder: &EncoderCommand, plan: &MergePlan) -> SnapreelResult<()> {
    let args = plan.args();
    tracing::debug!(program = %encoder.display_name(), args = ?args, "Running merge");

    let mut child = Command::new(&encoder.program)
        .args(&encoder.pre_args)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SnapreelError::LaunchFailed {
            program: encoder.display_name(),
            source,
        })?;

    let stderr = child.stderr.take();
    let stderr_task = std::thread::spawn(move || -> String {
        let mut output = String::new();
        if let Some(mut stderr) = stderr {
            if let Err(err) = stderr.read_to_string(&mut output) {
                output.push_str(&format!("<failed to read encoder stderr: {err}>"));
            }
        }
        output
    });

    let status = child.wait()?;
    let stderr_output = stderr_task
        .join()
        .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

    if !status.success() {
        return Err(SnapreelError::MergeFailed {
            output: plan.output.clone(),
            status: status.to_string(),
            stderr: stderr_output.trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "snapreel_finalize_{tag}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn output_path_sits_next_to_video() {
        assert_eq!(
            merged_output_path(Path::new("/rec/recording_20240101_120000.mp4")),
            PathBuf::from("/rec/recording_20240101_120000_with_audio.mp4")
        );
        assert_eq!(
            merged_output_path(Path::new("clip.mkv")),
            PathBuf::from("clip_with_audio.mkv")
        );
        assert_eq!(
            merged_output_path(Path::new("raw")),
            PathBuf::from("raw_with_audio")
        );
    }

    #[test]
    fn two_tracks_mix_into_one_graph() {
        let plan = MergePlan::new(
            Path::new("v.mp4"),
            &[PathBuf::from("a_output_1.wav"), PathBuf::from("a_input.wav")],
        );
        assert_eq!(
            plan.filter_graph(),
            "[1:a][2:a]amix=inputs=2:duration=longest[aout]"
        );

        let args = plan.args();
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "v.mp4",
                "-i",
                "a_output_1.wav",
                "-i",
                "a_input.wav",
                "-filter_complex",
                "[1:a][2:a]amix=inputs=2:duration=longest[aout]",
                "-map",
                "0:v",
                "-map",
                "[aout]",
                "-c:v",
                "copy",
                "-c:a",
                "aac",
                "-b:a",
                "192k",
                "v_with_audio.mp4",
            ]
        );
    }

    #[test]
    fn single_track_graph() {
        let plan = MergePlan::new(Path::new("v.mp4"), &[PathBuf::from("mic.wav")]);
        assert_eq!(plan.filter_graph(), "[1:a]amix=inputs=1:duration=longest[aout]");
    }

    #[test]
    fn missing_video_is_reported_first() {
        let dir = temp_dir("missing_video");
        let audio = dir.join("a.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let err = check_artifacts(&dir.join("absent.mp4"), &[audio]).unwrap_err();
        assert!(matches!(err, SnapreelError::MissingVideoArtifact { .. }));
    }

    #[test]
    fn zero_byte_audio_is_named_and_video_untouched() {
        let dir = temp_dir("empty_audio");
        let video = dir.join("v.mp4");
        std::fs::write(&video, b"video-bytes").unwrap();
        let good = dir.join("v_output_1.wav");
        std::fs::write(&good, b"RIFF").unwrap();
        let empty = dir.join("v_input.wav");
        std::fs::write(&empty, b"").unwrap();

        let encoder = EncoderCommand::program("/nonexistent/ffmpeg");
        let err = merge(&encoder, &video, &[good, empty.clone()]).unwrap_err();
        match err {
            SnapreelError::MissingAudioArtifact { path } => assert_eq!(path, empty),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read(&video).unwrap(), b"video-bytes");
        assert!(!merged_output_path(&video).exists());
    }

    #[test]
    fn no_audio_returns_video_without_running_encoder() {
        let encoder = EncoderCommand::program("/nonexistent/ffmpeg");
        let video = Path::new("/does/not/matter.mp4");
        assert_eq!(merge(&encoder, video, &[]).unwrap(), video);
    }
}
