//! Encoder argument construction for region capture.

use std::path::{Path, PathBuf};

use crate::quality::QualityProfile;
use crate::region::CaptureRegion;

/// Where the encoder grabs desktop frames from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Windows GDI desktop grabber.
    Gdigrab,
    /// X11 grabber reading from the given display (e.g. `:0.0`).
    X11 { display: String },
}

impl CaptureSource {
    /// The grabber for the current platform.
    pub fn detect() -> Self {
        crate::platform::default_capture_source()
    }

    pub fn format_name(&self) -> &'static str {
        match self {
            Self::Gdigrab => "gdigrab",
            Self::X11 { .. } => "x11grab",
        }
    }

    fn input_args(&self, region: &CaptureRegion, fps: u32) -> Vec<String> {
        let size = region.resolution();
        match self {
            Self::Gdigrab => vec![
                "-f".into(),
                "gdigrab".into(),
                "-framerate".into(),
                fps.to_string(),
                "-offset_x".into(),
                region.left.to_string(),
                "-offset_y".into(),
                region.top.to_string(),
                "-video_size".into(),
                size,
                "-draw_mouse".into(),
                "1".into(),
                "-i".into(),
                "desktop".into(),
            ],
            Self::X11 { display } => vec![
                "-f".into(),
                "x11grab".into(),
                "-framerate".into(),
                fps.to_string(),
                "-video_size".into(),
                size,
                "-draw_mouse".into(),
                "1".into(),
                "-i".into(),
                format!("{display}+{},{}", region.left, region.top),
            ],
        }
    }
}

/// One capture invocation: grab `region` and encode it to `output`.
#[derive(Debug, Clone)]
pub struct CaptureCommand {
    pub source: CaptureSource,
    pub region: CaptureRegion,
    pub profile: QualityProfile,
    pub output: PathBuf,
}

impl CaptureCommand {
    pub fn new(
        source: CaptureSource,
        region: CaptureRegion,
        profile: QualityProfile,
        output: &Path,
    ) -> Self {
        Self {
            source,
            region,
            profile,
            output: output.to_path_buf(),
        }
    }

    /// Encoder arguments, excluding the program and wrapper arguments.
    pub fn args(&self) -> Vec<String> {
        let mut args = self.source.input_args(&self.region, self.profile.fps);
        args.extend([
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.profile.preset.to_string(),
            "-crf".to_string(),
            self.profile.crf.to_string(),
            "-b:v".to_string(),
            self.profile.bitrate.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            self.output.display().to_string(),
        ]);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> CaptureRegion {
        CaptureRegion {
            left: 100,
            top: 50,
            width: 400,
            height: 200,
        }
    }

    #[test]
    fn gdigrab_crops_the_desktop() {
        let cmd = CaptureCommand::new(
            CaptureSource::Gdigrab,
            region(),
            QualityProfile::for_level(3),
            Path::new("out.mp4"),
        );
        assert_eq!(
            cmd.args().join(" "),
            "-f gdigrab -framerate 24 -offset_x 100 -offset_y 50 -video_size 400x200 \
             -draw_mouse 1 -i desktop -c:v libx264 -preset medium -crf 23 -b:v 2500k \
             -pix_fmt yuv420p out.mp4"
        );
    }

    #[test]
    fn x11grab_encodes_offset_in_input() {
        let cmd = CaptureCommand::new(
            CaptureSource::X11 {
                display: ":1.0".to_string(),
            },
            CaptureRegion {
                left: -1920,
                ..region()
            },
            QualityProfile::for_level(5),
            Path::new("/tmp/out.mp4"),
        );
        let args = cmd.args();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], ":1.0+-1920,50");
        assert_eq!(args[1], "x11grab");
        assert!(args.windows(2).any(|w| w == ["-framerate", "60"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "veryslow"]));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }
}
