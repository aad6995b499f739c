//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where recordings are written.
    pub output_dir: PathBuf,

    /// Default recording settings.
    pub recording: RecordingDefaults,

    /// Output stabilization before finalization.
    pub stabilization: StabilizationConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Quality level 1..=5 (clamped when used).
    pub quality: u8,

    /// External encoder invocation.
    pub encoder: EncoderCommand,

    /// How long to wait for the encoder to honor `q` before killing it.
    pub stop_timeout_ms: u64,

    /// Boundary overlay refresh rate (Hz).
    pub overlay_refresh_hz: u32,

    /// Status sampling interval.
    pub status_interval_ms: u64,

    /// Audio capture sample rate.
    pub audio_sample_rate: u32,
}

/// How to invoke the external encoder.
///
/// `pre_args` are placed between the program and the encoder arguments,
/// which allows wrappers such as `nice -n 10 ffmpeg`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncoderCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub pre_args: Vec<String>,
}

/// File-size stabilization policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StabilizationConfig {
    /// Interval between size samples.
    pub poll_interval_ms: u64,

    /// Total wall-clock budget for existence plus size stability.
    pub max_wait_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "snapreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            recording: RecordingDefaults::default(),
            stabilization: StabilizationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            quality: 3,
            encoder: EncoderCommand::default(),
            stop_timeout_ms: 5_000,
            overlay_refresh_hz: 10,
            status_interval_ms: 500,
            audio_sample_rate: 48_000,
        }
    }
}

impl RecordingDefaults {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(1))
    }

    pub fn overlay_refresh_interval(&self) -> Duration {
        Duration::from_millis(1_000 / u64::from(self.overlay_refresh_hz.max(1)))
    }
}

impl Default for EncoderCommand {
    fn default() -> Self {
        Self::program("ffmpeg")
    }
}

impl EncoderCommand {
    /// Invoke `program` directly with no wrapper arguments.
    pub fn program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            pre_args: Vec::new(),
        }
    }

    /// Program name for logs and error messages.
    pub fn display_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_wait_ms: 10_000,
        }
    }
}

impl StabilizationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("snapreel").join("config.json")
}
