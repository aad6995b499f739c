//! Fixed quality ladder mapping a 1..=5 level to x264 encoder settings.

use std::fmt;

/// x264 speed presets, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoder parameters for one quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    pub level: u8,
    pub fps: u32,
    pub crf: u8,
    pub preset: Preset,
    pub bitrate: &'static str,
}

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;
pub const DEFAULT_LEVEL: u8 = 3;

const LADDER: [QualityProfile; 5] = [
    QualityProfile {
        level: 1,
        fps: 15,
        crf: 32,
        preset: Preset::Ultrafast,
        bitrate: "1000k",
    },
    QualityProfile {
        level: 2,
        fps: 20,
        crf: 28,
        preset: Preset::Veryfast,
        bitrate: "1500k",
    },
    QualityProfile {
        level: 3,
        fps: 24,
        crf: 23,
        preset: Preset::Medium,
        bitrate: "2500k",
    },
    QualityProfile {
        level: 4,
        fps: 30,
        crf: 20,
        preset: Preset::Slow,
        bitrate: "4000k",
    },
    QualityProfile {
        level: 5,
        fps: 60,
        crf: 18,
        preset: Preset::Veryslow,
        bitrate: "6000k",
    },
];

impl QualityProfile {
    /// Profile for `level`, clamped into `1..=5`.
    pub fn for_level(level: i32) -> Self {
        let clamped = level.clamp(i32::from(MIN_LEVEL), i32::from(MAX_LEVEL));
        LADDER[(clamped - 1) as usize]
    }

    /// `"N fps"`, as shown in status output.
    pub fn fps_label(&self) -> String {
        format!("{} fps", self.fps)
    }
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self::for_level(i32::from(DEFAULT_LEVEL))
    }
}
