//! Snapreel CLI: record a screen region to MP4 with optional audio.
//!
//! Usage:
//!   snapreel record [OPTIONS]        Record a region until Ctrl+C
//!   snapreel monitors [--json]       Show monitor geometry and scaling
//!   snapreel devices                 List audio endpoints
//!   snapreel merge <VIDEO> <AUDIO>…  Mix audio tracks onto a video
//!   snapreel check                   Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use snapreel_capture_engine::ScreenPoint;
use snapreel_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "snapreel",
    about = "Region screen recorder with audio mixing",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a screen region until Ctrl+C
    Record {
        /// Region corners as X1,Y1,X2,Y2 (defaults to the primary monitor)
        #[arg(long, value_parser = parse_region, allow_hyphen_values = true)]
        region: Option<(ScreenPoint, ScreenPoint)>,

        /// Quality level 1-5 (out-of-range values are clamped)
        #[arg(short, long)]
        quality: Option<i32>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record what an output device plays (name or id; repeatable)
        #[arg(long = "output-device")]
        output_devices: Vec<String>,

        /// Record the default output device
        #[arg(long)]
        default_output: bool,

        /// Record an input device such as a microphone (name or id)
        #[arg(long, conflicts_with = "default_input")]
        input_device: Option<String>,

        /// Record the default input device
        #[arg(long)]
        default_input: bool,

        /// Print status samples as JSON lines
        #[arg(long)]
        json_status: bool,
    },

    /// Show monitor geometry and DPI scaling
    Monitors {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List audio output and input devices
    Devices,

    /// Mix audio tracks onto a recorded video
    Merge {
        /// Recorded video file
        video: PathBuf,

        /// Audio files to mix in
        #[arg(required = true)]
        audio: Vec<PathBuf>,
    },

    /// Check system capabilities
    Check {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write_config: bool,
    },
}

/// Parse `X1,Y1,X2,Y2` into two corner points.
fn parse_region(value: &str) -> Result<(ScreenPoint, ScreenPoint), String> {
    let coords = value
        .split(',')
        .map(|part| part.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid coordinate in '{value}': {e}"))?;
    match coords.as_slice() {
        [x1, y1, x2, y2] => Ok((ScreenPoint::new(*x1, *y1), ScreenPoint::new(*x2, *y2))),
        _ => Err(format!("expected X1,Y1,X2,Y2, got '{value}'")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Must precede any monitor or window query.
    let dpi_aware = snapreel_capture_engine::platform::init_dpi_awareness();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    snapreel_common::logging::init_logging(&config.logging);
    tracing::debug!(dpi_aware, "Process initialized");

    match cli.command {
        Commands::Record {
            region,
            quality,
            output,
            output_devices,
            default_output,
            input_device,
            default_input,
            json_status,
        } => {
            if let Some(quality) = quality {
                config.recording.quality = quality.clamp(1, 5) as u8;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            commands::record::run(
                config,
                commands::record::RecordArgs {
                    region,
                    output_devices,
                    default_output,
                    input_device,
                    default_input,
                    json_status,
                },
            )
            .await
        }
        Commands::Monitors { json } => commands::monitors::run(json),
        Commands::Devices => commands::devices::run(&config).await,
        Commands::Merge { video, audio } => commands::merge::run(&config, video, audio).await,
        Commands::Check { write_config } => commands::check::run(&config, write_config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn region_accepts_negative_coordinates() {
        let (p1, p2) = parse_region("-1920, 0,-100,540").unwrap();
        assert_eq!(p1, ScreenPoint::new(-1920, 0));
        assert_eq!(p2, ScreenPoint::new(-100, 540));
    }

    #[test]
    fn region_rejects_wrong_arity() {
        assert!(parse_region("1,2,3").is_err());
        assert!(parse_region("a,b,c,d").is_err());
    }

    #[test]
    fn record_flags_parse() {
        let cli = Cli::try_parse_from([
            "snapreel",
            "-v",
            "record",
            "--region",
            "100,100,501,300",
            "--output-device",
            "Speakers",
            "--output-device",
            "HDMI",
            "--input-device",
            "Mic",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Record {
                region,
                output_devices,
                input_device,
                ..
            } => {
                assert_eq!(region, Some((ScreenPoint::new(100, 100), ScreenPoint::new(501, 300))));
                assert_eq!(output_devices, vec!["Speakers", "HDMI"]);
                assert_eq!(input_device.as_deref(), Some("Mic"));
            }
            _ => panic!("expected record"),
        }
    }
}
