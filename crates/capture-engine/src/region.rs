//! Capture rectangle derivation from two arbitrary corner points.

use serde::{Deserialize, Serialize};
use snapreel_platform_core::{find_monitor, MonitorDescriptor};

/// A point in virtual desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for ScreenPoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// The rectangle handed to the encoder.
///
/// `width` and `height` are always even, since yuv420p subsamples chroma
/// by two in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    /// Normalize two corners into a top-left anchored, even-sized region.
    pub fn from_points(p1: ScreenPoint, p2: ScreenPoint) -> Self {
        let dx = (i64::from(p2.x) - i64::from(p1.x)).unsigned_abs();
        let dy = (i64::from(p2.y) - i64::from(p1.y)).unsigned_abs();
        Self {
            left: p1.x.min(p2.x),
            top: p1.y.min(p2.y),
            width: (dx & !1) as u32,
            height: (dy & !1) as u32,
        }
    }

    /// `"WxH"`.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Outcome of matching a region's anchor point against monitor geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionMatch {
    /// The first point lies on `monitor`.
    Matched {
        region: CaptureRegion,
        monitor: MonitorDescriptor,
    },
    /// No monitor contains the first point; coordinates are used raw.
    Unmatched { region: CaptureRegion },
}

impl RegionMatch {
    pub fn region(&self) -> CaptureRegion {
        match self {
            Self::Matched { region, .. } | Self::Unmatched { region } => *region,
        }
    }

    pub fn monitor(&self) -> Option<&MonitorDescriptor> {
        match self {
            Self::Matched { monitor, .. } => Some(monitor),
            Self::Unmatched { .. } => None,
        }
    }

    /// Scaling of the matched monitor, or 1.0.
    pub fn scaling(&self) -> f64 {
        self.monitor().map(|m| m.scaling).unwrap_or(1.0)
    }
}

/// Derive the capture region for the rectangle spanned by `p1` and `p2`.
///
/// Coordinates are already DPI-aware desktop pixels, so the matched
/// monitor only contributes its scaling for reporting.
pub fn compute_region(
    p1: ScreenPoint,
    p2: ScreenPoint,
    monitors: &[MonitorDescriptor],
) -> RegionMatch {
    let region = CaptureRegion::from_points(p1, p2);
    match find_monitor(monitors, p1.x, p1.y) {
        Some(monitor) => {
            tracing::debug!(
                monitor = %monitor.name,
                scaling = monitor.scaling,
                ?region,
                "Region anchored on monitor"
            );
            RegionMatch::Matched {
                region,
                monitor: monitor.clone(),
            }
        }
        None => {
            tracing::debug!(?region, "Region anchor outside all monitors, using raw coordinates");
            RegionMatch::Unmatched { region }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn monitor(name: &str, x: i32, y: i32, width: u32, height: u32, scaling: f64) -> MonitorDescriptor {
        MonitorDescriptor {
            name: name.to_string(),
            x,
            y,
            width,
            height,
            scaling,
            primary: x == 0 && y == 0,
        }
    }

    #[test]
    fn odd_span_on_single_monitor_is_truncated() {
        let monitors = vec![monitor("main", 0, 0, 1920, 1080, 1.0)];
        let m = compute_region(ScreenPoint::new(100, 100), ScreenPoint::new(501, 300), &monitors);
        assert_eq!(
            m.region(),
            CaptureRegion {
                left: 100,
                top: 100,
                width: 400,
                height: 200
            }
        );
        assert_eq!(m.monitor().map(|m| m.name.as_str()), Some("main"));
    }

    #[test]
    fn reversed_corners_anchor_top_left() {
        let region = CaptureRegion::from_points(ScreenPoint::new(800, 600), ScreenPoint::new(200, 101));
        assert_eq!(region.left, 200);
        assert_eq!(region.top, 101);
        assert_eq!(region.width, 600);
        assert_eq!(region.height, 498);
        assert_eq!(region.resolution(), "600x498");
    }

    #[test]
    fn anchor_off_every_monitor_is_unmatched_with_unit_scaling() {
        let monitors = vec![monitor("hidpi", 0, 0, 2560, 1440, 2.0)];
        let m = compute_region(ScreenPoint::new(-50, -50), ScreenPoint::new(100, 100), &monitors);
        assert!(matches!(m, RegionMatch::Unmatched { .. }));
        assert_eq!(m.scaling(), 1.0);
        assert_eq!(m.region().left, -50);
        assert_eq!(m.region().width, 150);
    }

    #[test]
    fn matched_monitor_reports_its_scaling_without_resizing() {
        let monitors = vec![
            monitor("left", 0, 0, 1920, 1080, 1.0),
            monitor("right", 1920, 0, 3840, 2160, 1.5),
        ];
        let m = compute_region(ScreenPoint::new(2000, 10), ScreenPoint::new(2400, 310), &monitors);
        assert_eq!(m.scaling(), 1.5);
        assert_eq!(m.region().width, 400);
        assert_eq!(m.region().height, 300);
    }

    #[test]
    fn zero_span_is_empty() {
        let region = CaptureRegion::from_points(ScreenPoint::new(5, 5), ScreenPoint::new(6, 5));
        assert!(region.is_empty());
    }

    proptest! {
        #[test]
        fn dimensions_are_always_even(
            x1 in -10_000i32..10_000, y1 in -10_000i32..10_000,
            x2 in -10_000i32..10_000, y2 in -10_000i32..10_000,
        ) {
            let monitors = vec![monitor("main", 0, 0, 1920, 1080, 1.25)];
            let region = compute_region(ScreenPoint::new(x1, y1), ScreenPoint::new(x2, y2), &monitors).region();
            prop_assert_eq!(region.width % 2, 0);
            prop_assert_eq!(region.height % 2, 0);
            prop_assert_eq!(region.left, x1.min(x2));
            prop_assert_eq!(region.top, y1.min(y2));
            prop_assert!(u64::from(region.width) <= (i64::from(x1) - i64::from(x2)).unsigned_abs());
        }

        #[test]
        fn region_is_symmetric_in_its_corners(
            x1 in any::<i32>(), y1 in any::<i32>(),
            x2 in any::<i32>(), y2 in any::<i32>(),
        ) {
            let a = CaptureRegion::from_points(ScreenPoint::new(x1, y1), ScreenPoint::new(x2, y2));
            let b = CaptureRegion::from_points(ScreenPoint::new(x2, y2), ScreenPoint::new(x1, y1));
            prop_assert_eq!(a, b);
        }
    }
}
