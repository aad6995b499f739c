//! Error types shared across Snapreel crates.

use std::path::PathBuf;

/// Top-level error type for Snapreel operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapreelError {
    #[error("Monitor geometry unavailable: {message}")]
    GeometryUnavailable { message: String },

    #[error("A capture process is already running for this recorder")]
    AlreadyRecording,

    #[error("Failed to launch encoder {program}: {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Audio capture failed to start: {message}")]
    AudioStartFailed { message: String },

    #[error("Video artifact missing or empty: {path}")]
    MissingVideoArtifact { path: PathBuf },

    #[error("Audio artifact missing or empty: {path}")]
    MissingAudioArtifact { path: PathBuf },

    #[error("Merge into {output} failed ({status}): {stderr}")]
    MergeFailed {
        output: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Output {path} did not stabilize within {waited_ms}ms")]
    StabilizationTimeout { path: PathBuf, waited_ms: u64 },

    #[error("Invalid session state: {message}")]
    InvalidState { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Platform error: {message}")]
    Platform { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SnapreelError.
pub type SnapreelResult<T> = Result<T, SnapreelError>;

impl SnapreelError {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::GeometryUnavailable {
            message: msg.into(),
        }
    }

    pub fn audio_start(msg: impl Into<String>) -> Self {
        Self::AudioStartFailed {
            message: msg.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio {
            message: msg.into(),
        }
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether the session can keep going after this error.
    ///
    /// Audio failures degrade a session to video-only and stabilization
    /// timeouts are soft deadlines; everything else is reported as fatal
    /// for the operation that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::GeometryUnavailable { .. }
                | Self::AudioStartFailed { .. }
                | Self::StabilizationTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_audio_message_names_file() {
        let err = SnapreelError::MissingAudioArtifact {
            path: PathBuf::from("/tmp/recording_output_1.wav"),
        };
        assert!(err.to_string().contains("recording_output_1.wav"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(SnapreelError::audio_start("no device").is_recoverable());
        assert!(SnapreelError::geometry("no display").is_recoverable());
        assert!(!SnapreelError::AlreadyRecording.is_recoverable());
        assert!(!SnapreelError::MissingVideoArtifact {
            path: PathBuf::from("a.mp4")
        }
        .is_recoverable());
    }
}
