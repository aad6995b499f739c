//! Capability detection and guidance for Linux.
//!
//! Capture goes through ffmpeg's `x11grab`, so an X server (or XWayland)
//! is required. Audio is optional and needs a PulseAudio-compatible server.

use snapreel_common::config::EncoderCommand;
use snapreel_platform_core::capability::{check_encoder, command_exists, Capability};
use snapreel_platform_core::DisplayServer;

use crate::display::detect_display_server;

/// Check all capabilities and report status.
pub fn check_capabilities(encoder: &EncoderCommand) -> Vec<Capability> {
    vec![
        check_encoder(encoder),
        check_x11_access(),
        check_xrandr(),
        check_audio_server(),
    ]
}

fn check_x11_access() -> Capability {
    let server = detect_display_server();
    let has_x = std::env::var("DISPLAY").map(|d| !d.is_empty()).unwrap_or(false);

    let description = match server {
        DisplayServer::Wayland => "X11 display for x11grab (XWayland only sees X clients)",
        _ => "X11 display for x11grab",
    };

    Capability::new("X11 Display", description, has_x, true)
        .with_fix("Run inside a graphical X11 session or export DISPLAY")
}

fn check_xrandr() -> Capability {
    Capability::new(
        "xrandr",
        "Monitor enumeration (falls back to a single 1920x1080 monitor)",
        command_exists("xrandr", "--version"),
        false,
    )
    .with_fix("Install xrandr: sudo apt install x11-xserver-utils")
}

fn check_audio_server() -> Capability {
    let runtime_pulse = std::env::var("XDG_RUNTIME_DIR")
        .map(|dir| std::path::Path::new(&dir).join("pulse").exists())
        .unwrap_or(false);
    let available = runtime_pulse || command_exists("pactl", "--version");

    Capability::new(
        "Audio Server",
        "PulseAudio/PipeWire for output and microphone capture",
        available,
        false,
    )
    .with_fix("Install PipeWire: sudo apt install pipewire pipewire-pulse")
}
