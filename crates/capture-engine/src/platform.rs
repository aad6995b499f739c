//! Per-OS dispatch for monitor geometry, capabilities and capture source.

use snapreel_common::config::EncoderCommand;
use snapreel_common::error::SnapreelResult;
use snapreel_platform_core::capability::Capability;
use snapreel_platform_core::{fallback_monitor, DisplayServer, MonitorDescriptor};

use crate::command::CaptureSource;

/// Connected monitors with resolved scaling.
pub fn resolve_monitors() -> SnapreelResult<Vec<MonitorDescriptor>> {
    #[cfg(target_os = "linux")]
    {
        snapreel_platform_linux::detect_monitors()
    }
    #[cfg(windows)]
    {
        snapreel_platform_windows::detect_monitors()
    }
    #[cfg(not(any(target_os = "linux", windows)))]
    {
        Err(snapreel_common::error::SnapreelError::unsupported(
            "monitor detection is not implemented for this platform",
        ))
    }
}

/// [`resolve_monitors`], or a single 1920x1080 monitor at scale 1.0.
pub fn resolve_monitors_or_fallback() -> Vec<MonitorDescriptor> {
    match resolve_monitors() {
        Ok(monitors) => monitors,
        Err(e) => {
            tracing::warn!(error = %e, "Monitor geometry unavailable, using fallback");
            vec![fallback_monitor()]
        }
    }
}

pub fn check_capabilities(encoder: &EncoderCommand) -> Vec<Capability> {
    #[cfg(windows)]
    {
        snapreel_platform_windows::check_capabilities(encoder)
    }
    #[cfg(not(windows))]
    {
        snapreel_platform_linux::permissions::check_capabilities(encoder)
    }
}

pub fn default_capture_source() -> CaptureSource {
    #[cfg(windows)]
    {
        CaptureSource::Gdigrab
    }
    #[cfg(target_os = "linux")]
    {
        CaptureSource::X11 {
            display: snapreel_platform_linux::x11_display_name(),
        }
    }
    #[cfg(not(any(target_os = "linux", windows)))]
    {
        CaptureSource::X11 {
            display: ":0.0".to_string(),
        }
    }
}

pub fn display_server() -> DisplayServer {
    if cfg!(windows) {
        DisplayServer::Windows
    } else if cfg!(target_os = "macos") {
        DisplayServer::MacOS
    } else {
        snapreel_platform_linux::detect_display_server()
    }
}

/// Opt into per-monitor DPI awareness. No-op outside Windows.
pub fn init_dpi_awareness() -> bool {
    snapreel_platform_windows::init_dpi_awareness()
}
