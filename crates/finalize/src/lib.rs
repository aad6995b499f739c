//! Snapreel Finalization Pipeline
//!
//! Combines one recorded video with zero or more audio captures into a
//! single file. All audio inputs are summed with ffmpeg's `amix` filter and
//! the video stream is copied without re-encoding.

pub mod merge;

pub use merge::{check_artifacts, merge, merged_output_path, MergePlan};
