//! Display/monitor detection and DPI handling on X11.
//!
//! Monitors come from `xrandr --query`. DPI is resolved through three
//! sources in order: per-output `QT_SCREEN_SCALE_FACTORS`, `Xft.dpi` from
//! the X resource database, then the desktop-wide `GDK_SCALE`.

use std::process::Command;

use snapreel_common::error::{SnapreelError, SnapreelResult};
use snapreel_platform_core::{
    resolve_monitors, DisplayEnumerator, DisplayServer, DpiProbe, MonitorDescriptor, RawMonitor,
    BASELINE_DPI,
};

/// Enumerates outputs by running `xrandr --query`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XrandrEnumerator;

impl DisplayEnumerator for XrandrEnumerator {
    fn enumerate(&self) -> SnapreelResult<Vec<RawMonitor>> {
        let output = Command::new("xrandr")
            .arg("--query")
            .output()
            .map_err(|e| SnapreelError::geometry(format!("failed to run xrandr: {e}")))?;

        if !output.status.success() {
            return Err(SnapreelError::geometry(format!(
                "xrandr exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_xrandr(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse the connected, active outputs from `xrandr --query` output.
///
/// Connected outputs without a mode (switched off) are skipped.
pub fn parse_xrandr(text: &str) -> Vec<RawMonitor> {
    text.lines()
        .filter(|line| !line.starts_with(char::is_whitespace))
        .filter_map(parse_output_line)
        .collect()
}

fn parse_output_line(line: &str) -> Option<RawMonitor> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    if tokens.next()? != "connected" {
        return None;
    }

    let mut primary = false;
    for token in tokens {
        if token == "primary" {
            primary = true;
            continue;
        }
        if let Some((width, height, x, y)) = parse_geometry(token) {
            return Some(RawMonitor {
                name: name.to_string(),
                x,
                y,
                width,
                height,
                primary,
            });
        }
        if token.starts_with('(') {
            break;
        }
    }
    None
}

/// Parse `WxH+X+Y` (offsets may be negative, e.g. `1920x1080+-1920+0`).
fn parse_geometry(token: &str) -> Option<(u32, u32, i32, i32)> {
    let (size, offsets) = token.split_once('+')?;
    let (width, height) = size.split_once('x')?;
    let (x, y) = offsets.split_once('+')?;
    Some((
        width.parse().ok()?,
        height.parse().ok()?,
        x.parse().ok()?,
        y.parse().ok()?,
    ))
}

/// DPI sources available on an X11 desktop.
///
/// Values are captured once so a resolution pass sees one consistent
/// snapshot of the environment.
#[derive(Debug, Clone, Default)]
pub struct LinuxDpiProbe {
    /// Raw `QT_SCREEN_SCALE_FACTORS` value.
    pub qt_scale_factors: Option<String>,
    /// `Xft.dpi` from the X resource database.
    pub xft_dpi: Option<u32>,
    /// Raw `GDK_SCALE` value.
    pub gdk_scale: Option<String>,
}

impl LinuxDpiProbe {
    /// Snapshot the current process environment and X resources.
    pub fn from_environment() -> Self {
        Self {
            qt_scale_factors: std::env::var("QT_SCREEN_SCALE_FACTORS").ok(),
            xft_dpi: query_xft_dpi(),
            gdk_scale: std::env::var("GDK_SCALE").ok(),
        }
    }
}

impl DpiProbe for LinuxDpiProbe {
    fn window_dpi(&self, monitor: &RawMonitor) -> SnapreelResult<u32> {
        let factors = self
            .qt_scale_factors
            .as_deref()
            .ok_or_else(|| SnapreelError::platform("QT_SCREEN_SCALE_FACTORS not set"))?;
        qt_scale_for(factors, &monitor.name)
            .map(scale_to_dpi)
            .ok_or_else(|| {
                SnapreelError::platform(format!("no Qt scale factor for output {}", monitor.name))
            })
    }

    fn display_dpi(&self, _monitor: &RawMonitor) -> SnapreelResult<u32> {
        self.xft_dpi
            .ok_or_else(|| SnapreelError::platform("Xft.dpi not present in X resources"))
    }

    fn primary_dpi(&self) -> SnapreelResult<u32> {
        self.gdk_scale
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(scale_to_dpi)
            .ok_or_else(|| SnapreelError::platform("GDK_SCALE not set or invalid"))
    }
}

fn scale_to_dpi(scale: f64) -> u32 {
    (scale * BASELINE_DPI).round().max(0.0) as u32
}

/// Scale factor for `output` from a `QT_SCREEN_SCALE_FACTORS` value.
///
/// Accepts `NAME=FACTOR` entries separated by `;` or `,`. A single bare
/// factor applies to every output.
pub fn qt_scale_for(factors: &str, output: &str) -> Option<f64> {
    let entries: Vec<&str> = factors
        .split([';', ','])
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect();

    if let [only] = entries.as_slice() {
        if !only.contains('=') {
            return only.parse().ok();
        }
    }

    entries.iter().find_map(|entry| {
        let (name, value) = entry.split_once('=')?;
        (name.trim() == output)
            .then(|| value.trim().parse().ok())
            .flatten()
    })
}

/// Extract `Xft.dpi` from `xrdb -query` output.
pub fn parse_xft_dpi(resources: &str) -> Option<u32> {
    resources.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() != "Xft.dpi" {
            return None;
        }
        let dpi: f64 = value.trim().parse().ok()?;
        Some(dpi.round() as u32)
    })
}

fn query_xft_dpi() -> Option<u32> {
    let output = Command::new("xrdb").arg("-query").output().ok()?;
    if !output.status.success() {
        tracing::debug!(status = %output.status, "xrdb -query failed");
        return None;
    }
    parse_xft_dpi(&String::from_utf8_lossy(&output.stdout))
}

/// Detect connected monitors with their DPI scaling.
pub fn detect_monitors() -> SnapreelResult<Vec<MonitorDescriptor>> {
    tracing::debug!("Detecting monitors via xrandr");
    resolve_monitors(&XrandrEnumerator, &LinuxDpiProbe::from_environment())
}

/// Detect the current display server.
pub fn detect_display_server() -> DisplayServer {
    if std::env::var("WAYLAND_DISPLAY").is_ok() {
        DisplayServer::Wayland
    } else if std::env::var("DISPLAY").is_ok() {
        DisplayServer::X11
    } else {
        DisplayServer::Unknown
    }
}

/// The X display name capture should read from (`$DISPLAY`, else `:0.0`).
pub fn x11_display_name() -> String {
    std::env::var("DISPLAY")
        .ok()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| ":0.0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const XRANDR_DUAL: &str = "\
Screen 0: minimum 320 x 200, current 4480 x 1440, maximum 16384 x 16384
eDP-1 connected primary 2560x1440+1920+0 (normal left inverted right x axis y axis) 309mm x 174mm
   2560x1440     60.00*+
   1920x1080     60.00
HDMI-1 connected 1920x1080+0+180 (normal left inverted right x axis y axis) 527mm x 296mm
   1920x1080     60.00*+  50.00
DP-1 disconnected (normal left inverted right x axis y axis)
DP-2 connected (normal left inverted right x axis y axis)
";

    #[test]
    fn parses_active_outputs_in_order() {
        let monitors = parse_xrandr(XRANDR_DUAL);
        assert_eq!(monitors.len(), 2);

        assert_eq!(monitors[0].name, "eDP-1");
        assert!(monitors[0].primary);
        assert_eq!((monitors[0].x, monitors[0].y), (1920, 0));
        assert_eq!((monitors[0].width, monitors[0].height), (2560, 1440));

        assert_eq!(monitors[1].name, "HDMI-1");
        assert!(!monitors[1].primary);
        assert_eq!((monitors[1].x, monitors[1].y), (0, 180));
    }

    #[test]
    fn parses_negative_offsets() {
        let monitors = parse_xrandr("DP-3 connected 1920x1080+-1920+0 (normal) 0mm x 0mm\n");
        assert_eq!(monitors[0].x, -1920);
    }

    #[test]
    fn qt_factors_by_name_and_bare() {
        assert_eq!(qt_scale_for("eDP-1=2;HDMI-1=1", "eDP-1"), Some(2.0));
        assert_eq!(qt_scale_for("eDP-1=2;HDMI-1=1.25", "HDMI-1"), Some(1.25));
        assert_eq!(qt_scale_for("eDP-1=2", "HDMI-1"), None);
        assert_eq!(qt_scale_for("1.5", "anything"), Some(1.5));
        assert_eq!(qt_scale_for("", "eDP-1"), None);
    }

    #[test]
    fn xft_dpi_is_read_from_resources() {
        let resources = "Xcursor.size:\t24\nXft.antialias:\t1\nXft.dpi:\t144\n";
        assert_eq!(parse_xft_dpi(resources), Some(144));
        assert_eq!(parse_xft_dpi("Xft.antialias:\t1\n"), None);
    }

    #[test]
    fn probe_tiers_follow_available_sources() {
        let monitor = RawMonitor {
            name: "eDP-1".to_string(),
            x: 0,
            y: 0,
            width: 2560,
            height: 1440,
            primary: true,
        };

        let probe = LinuxDpiProbe {
            qt_scale_factors: Some("eDP-1=2".to_string()),
            xft_dpi: Some(120),
            gdk_scale: Some("1".to_string()),
        };
        assert_eq!(probe.window_dpi(&monitor).unwrap(), 192);
        assert_eq!(probe.display_dpi(&monitor).unwrap(), 120);
        assert_eq!(probe.primary_dpi().unwrap(), 96);

        let empty = LinuxDpiProbe::default();
        assert!(empty.window_dpi(&monitor).is_err());
        assert!(empty.display_dpi(&monitor).is_err());
        assert!(empty.primary_dpi().is_err());
        assert_eq!(snapreel_platform_core::resolve_scaling(&empty, &monitor), 1.0);
    }
}
