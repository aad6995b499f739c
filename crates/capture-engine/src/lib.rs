//! Snapreel Capture Engine
//!
//! Records a user-selected screen region with an external encoder, with
//! optional audio tracks recorded alongside and mixed in when the session
//! stops.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              SessionCoordinator              │
//! │  ┌──────────────┐ ┌──────────┐ ┌───────────┐ │
//! │  │ScreenRecorder│ │  Audio   │ │  Status   │ │
//! │  │  + overlay   │ │ Capture  │ │  Monitor  │ │
//! │  └──────┬───────┘ └────┬─────┘ └─────┬─────┘ │
//! │         │              │             │       │
//! │         ▼              ▼             ▼       │
//! │  recording_<ts>.mp4  *_output_N.wav  watch   │
//! │         └──────┬───────┘                     │
//! │                ▼                             │
//! │   snapreel-finalize: *_with_audio.mp4        │
//! └──────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod command;
pub mod overlay;
pub mod pipeline;
pub mod platform;
pub mod quality;
pub mod recorder;
pub mod region;
pub mod session;
pub mod signal;
pub mod stabilize;
pub mod status;

pub use audio::{AudioCapture, AudioDevice, AudioDevices, AudioSelection, DeviceKind, GstAudioCapture};
pub use command::{CaptureCommand, CaptureSource};
pub use quality::QualityProfile;
pub use recorder::{CaptureStarted, CaptureStopped, ScreenRecorder};
pub use region::{compute_region, CaptureRegion, RegionMatch, ScreenPoint};
pub use session::*;
pub use signal::{RecordingSignal, RecordingWatch};
pub use status::{StatusReceiver, StatusSample};
