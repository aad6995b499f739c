//! Snapreel platform core contracts.
//!
//! This crate contains the cross-platform monitor geometry model and the
//! DPI resolution algorithm. OS crates supply a [`DisplayEnumerator`] and a
//! [`DpiProbe`]; [`resolve_monitors`] turns them into descriptors without
//! knowing which platform it runs on.

pub mod capability;

use serde::{Deserialize, Serialize};
use snapreel_common::error::{SnapreelError, SnapreelResult};

/// DPI that corresponds to a scaling factor of 1.0.
pub const BASELINE_DPI: f64 = 96.0;

/// Resolved geometry of one connected monitor.
///
/// Origin and size are in DPI-aware desktop pixels as reported by the OS.
/// `scaling` is informational and is never applied to the size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorDescriptor {
    /// Monitor name/identifier.
    pub name: String,
    /// Position in the virtual desktop (pixels).
    pub x: i32,
    pub y: i32,
    /// Resolution in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Scale factor (for example 1.0, 1.25, 2.0). Never below 1.0.
    pub scaling: f64,
    /// Whether this monitor is primary.
    pub primary: bool,
}

impl MonitorDescriptor {
    pub fn origin(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the point lies inside the monitor rectangle. Both edges are
    /// inclusive, so a point on a shared border matches the first monitor
    /// listed.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        let left = i64::from(self.x);
        let top = i64::from(self.y);
        let right = left + i64::from(self.width);
        let bottom = top + i64::from(self.height);
        left <= x && x <= right && top <= y && y <= bottom
    }

    /// Logical resolution (physical / scale).
    pub fn logical_width(&self) -> u32 {
        (self.width as f64 / self.scaling) as u32
    }

    /// Logical resolution (physical / scale).
    pub fn logical_height(&self) -> u32 {
        (self.height as f64 / self.scaling) as u32
    }
}

/// A monitor as enumerated by the OS, before DPI is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMonitor {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub primary: bool,
}

/// Lists the physical displays of the desktop.
pub trait DisplayEnumerator {
    /// Enumerate displays in OS order. An error means the display API
    /// itself could not be reached.
    fn enumerate(&self) -> SnapreelResult<Vec<RawMonitor>>;
}

/// The three DPI query tiers, from most to least specific.
///
/// A tier "misses" by returning an error or zero; the resolver then moves
/// on to the next one.
pub trait DpiProbe {
    /// Per-display DPI of whatever covers the monitor's origin point.
    fn window_dpi(&self, monitor: &RawMonitor) -> SnapreelResult<u32>;

    /// Device-context DPI of the monitor.
    fn display_dpi(&self, monitor: &RawMonitor) -> SnapreelResult<u32>;

    /// Device-context DPI of the primary display.
    fn primary_dpi(&self) -> SnapreelResult<u32>;
}

/// Resolve the scaling factor of one monitor through the DPI tiers.
pub fn resolve_scaling(probe: &dyn DpiProbe, monitor: &RawMonitor) -> f64 {
    let tiers: [(&str, &dyn Fn() -> SnapreelResult<u32>); 3] = [
        ("window", &|| probe.window_dpi(monitor)),
        ("display", &|| probe.display_dpi(monitor)),
        ("primary", &|| probe.primary_dpi()),
    ];

    for (tier, query) in tiers {
        match query() {
            Ok(dpi) if dpi > 0 => {
                let scaling = (f64::from(dpi) / BASELINE_DPI).max(1.0);
                tracing::debug!(monitor = %monitor.name, tier, dpi, scaling, "Resolved DPI");
                return scaling;
            }
            Ok(_) => {
                tracing::debug!(monitor = %monitor.name, tier, "DPI tier returned zero");
            }
            Err(e) => {
                tracing::debug!(monitor = %monitor.name, tier, error = %e, "DPI tier failed");
            }
        }
    }

    tracing::warn!(monitor = %monitor.name, "All DPI tiers failed, assuming scaling 1.0");
    1.0
}

/// Enumerate monitors and resolve each one's scaling factor.
///
/// Fails with `GeometryUnavailable` when enumeration fails or yields no
/// displays.
pub fn resolve_monitors(
    enumerator: &dyn DisplayEnumerator,
    probe: &dyn DpiProbe,
) -> SnapreelResult<Vec<MonitorDescriptor>> {
    let raw = enumerator.enumerate().map_err(|e| match e {
        SnapreelError::GeometryUnavailable { .. } => e,
        other => SnapreelError::geometry(other.to_string()),
    })?;

    if raw.is_empty() {
        return Err(SnapreelError::geometry("display enumeration returned no monitors"));
    }

    Ok(raw
        .iter()
        .map(|m| MonitorDescriptor {
            name: m.name.clone(),
            x: m.x,
            y: m.y,
            width: m.width,
            height: m.height,
            scaling: resolve_scaling(probe, m),
            primary: m.primary,
        })
        .collect())
}

/// Synthetic descriptor used when geometry cannot be resolved.
pub fn fallback_monitor() -> MonitorDescriptor {
    MonitorDescriptor {
        name: "primary".to_string(),
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
        scaling: 1.0,
        primary: true,
    }
}

/// [`resolve_monitors`], substituting [`fallback_monitor`] on failure.
pub fn resolve_or_fallback(
    enumerator: &dyn DisplayEnumerator,
    probe: &dyn DpiProbe,
) -> Vec<MonitorDescriptor> {
    match resolve_monitors(enumerator, probe) {
        Ok(monitors) => monitors,
        Err(e) => {
            tracing::warn!(error = %e, "Falling back to a single synthetic monitor");
            vec![fallback_monitor()]
        }
    }
}

/// First monitor whose rectangle contains the point.
pub fn find_monitor(monitors: &[MonitorDescriptor], x: i32, y: i32) -> Option<&MonitorDescriptor> {
    monitors.iter().find(|m| m.contains(x, y))
}

/// The primary monitor, or the first one listed.
pub fn primary_monitor(monitors: &[MonitorDescriptor]) -> Option<&MonitorDescriptor> {
    monitors
        .iter()
        .find(|m| m.primary)
        .or_else(|| monitors.first())
}

/// Display server / platform family used for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayServer {
    Wayland,
    X11,
    Windows,
    MacOS,
    #[default]
    Unknown,
}

/// Compute virtual desktop bounds that include all connected monitors.
/// Returns `(min_x, min_y, width, height)` in physical pixels.
pub fn virtual_desktop_bounds(monitors: &[MonitorDescriptor]) -> (i32, i32, u32, u32) {
    if monitors.is_empty() {
        return (0, 0, 1920, 1080);
    }

    let min_x = monitors.iter().map(|m| m.x).min().unwrap_or(0);
    let min_y = monitors.iter().map(|m| m.y).min().unwrap_or(0);
    let max_x = monitors
        .iter()
        .map(|m| m.x + m.width as i32)
        .max()
        .unwrap_or(1920);
    let max_y = monitors
        .iter()
        .map(|m| m.y + m.height as i32)
        .max()
        .unwrap_or(1080);

    let width = (max_x - min_x).max(1) as u32;
    let height = (max_y - min_y).max(1) as u32;
    (min_x, min_y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn raw(name: &str, x: i32, y: i32, width: u32, height: u32) -> RawMonitor {
        RawMonitor {
            name: name.to_string(),
            x,
            y,
            width,
            height,
            primary: x == 0 && y == 0,
        }
    }

    fn descriptor(name: &str, x: i32, y: i32, width: u32, height: u32) -> MonitorDescriptor {
        MonitorDescriptor {
            name: name.to_string(),
            x,
            y,
            width,
            height,
            scaling: 1.0,
            primary: x == 0 && y == 0,
        }
    }

    struct FixedDisplays(SnapreelResult<Vec<RawMonitor>>);

    impl DisplayEnumerator for FixedDisplays {
        fn enumerate(&self) -> SnapreelResult<Vec<RawMonitor>> {
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(SnapreelError::platform(e.to_string())),
            }
        }
    }

    /// Each tier answers with a fixed value; `None` means the tier errors.
    struct TieredProbe {
        window: Option<u32>,
        display: Option<u32>,
        primary: Option<u32>,
        calls: Cell<u32>,
    }

    impl TieredProbe {
        fn new(window: Option<u32>, display: Option<u32>, primary: Option<u32>) -> Self {
            Self {
                window,
                display,
                primary,
                calls: Cell::new(0),
            }
        }

        fn answer(&self, value: Option<u32>) -> SnapreelResult<u32> {
            self.calls.set(self.calls.get() + 1);
            value.ok_or_else(|| SnapreelError::platform("probe failed"))
        }
    }

    impl DpiProbe for TieredProbe {
        fn window_dpi(&self, _monitor: &RawMonitor) -> SnapreelResult<u32> {
            self.answer(self.window)
        }

        fn display_dpi(&self, _monitor: &RawMonitor) -> SnapreelResult<u32> {
            self.answer(self.display)
        }

        fn primary_dpi(&self) -> SnapreelResult<u32> {
            self.answer(self.primary)
        }
    }

    #[test]
    fn first_tier_wins_without_querying_the_rest() {
        let probe = TieredProbe::new(Some(144), Some(96), Some(96));
        let scaling = resolve_scaling(&probe, &raw("a", 0, 0, 2560, 1440));
        assert!((scaling - 1.5).abs() < 1e-9);
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn zero_and_error_fall_through_to_later_tiers() {
        let probe = TieredProbe::new(Some(0), None, Some(120));
        let scaling = resolve_scaling(&probe, &raw("a", 0, 0, 1920, 1080));
        assert!((scaling - 1.25).abs() < 1e-9);
        assert_eq!(probe.calls.get(), 3);
    }

    #[test]
    fn all_tiers_failing_yields_unit_scaling() {
        let probe = TieredProbe::new(None, Some(0), None);
        assert_eq!(resolve_scaling(&probe, &raw("a", 0, 0, 1920, 1080)), 1.0);
    }

    #[test]
    fn low_dpi_is_floored_at_unit_scaling() {
        let probe = TieredProbe::new(Some(72), None, None);
        assert_eq!(resolve_scaling(&probe, &raw("a", 0, 0, 1920, 1080)), 1.0);
    }

    #[test]
    fn resolve_keeps_enumeration_order_and_raw_sizes() {
        let displays = FixedDisplays(Ok(vec![
            raw("right", 1920, 0, 3840, 2160),
            raw("main", 0, 0, 1920, 1080),
        ]));
        let probe = TieredProbe::new(Some(192), None, None);
        let monitors = resolve_monitors(&displays, &probe).unwrap();
        assert_eq!(monitors.len(), 2);
        assert_eq!(monitors[0].name, "right");
        assert_eq!(monitors[0].size(), (3840, 2160));
        assert!((monitors[0].scaling - 2.0).abs() < 1e-9);
        assert_eq!(monitors[1].origin(), (0, 0));
    }

    #[test]
    fn enumeration_failure_is_geometry_unavailable() {
        let displays = FixedDisplays(Err(SnapreelError::platform("no display")));
        let probe = TieredProbe::new(None, None, None);
        let err = resolve_monitors(&displays, &probe).unwrap_err();
        assert!(matches!(err, SnapreelError::GeometryUnavailable { .. }));

        let fallback = resolve_or_fallback(&displays, &probe);
        assert_eq!(fallback, vec![fallback_monitor()]);
    }

    #[test]
    fn empty_enumeration_is_geometry_unavailable() {
        let displays = FixedDisplays(Ok(Vec::new()));
        let probe = TieredProbe::new(None, None, None);
        assert!(matches!(
            resolve_monitors(&displays, &probe),
            Err(SnapreelError::GeometryUnavailable { .. })
        ));
    }

    #[test]
    fn find_monitor_uses_inclusive_edges_and_first_match() {
        let monitors = vec![descriptor("left", 0, 0, 1920, 1080), descriptor("right", 1920, 0, 1920, 1080)];
        assert_eq!(find_monitor(&monitors, 1920, 500).unwrap().name, "left");
        assert_eq!(find_monitor(&monitors, 1921, 500).unwrap().name, "right");
        assert!(find_monitor(&monitors, -1, 0).is_none());
        assert!(find_monitor(&monitors, 100, 1081).is_none());
    }

    #[test]
    fn primary_monitor_prefers_flag_then_first() {
        let mut monitors = vec![descriptor("a", 1920, 0, 100, 100), descriptor("b", 0, 0, 100, 100)];
        assert_eq!(primary_monitor(&monitors).unwrap().name, "b");
        monitors[1].primary = false;
        assert_eq!(primary_monitor(&monitors).unwrap().name, "a");
    }

    #[test]
    fn virtual_bounds_cover_negative_origin_layout() {
        let monitors = vec![
            descriptor("left", -1920, 0, 1920, 1080),
            descriptor("main", 0, 0, 2560, 1440),
        ];

        let (x, y, w, h) = virtual_desktop_bounds(&monitors);
        assert_eq!(x, -1920);
        assert_eq!(y, 0);
        assert_eq!(w, 4480);
        assert_eq!(h, 1440);
    }
}
