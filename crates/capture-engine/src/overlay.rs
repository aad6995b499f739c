//! Boundary overlay lifecycle.
//!
//! The overlay outlines the captured region in an always-on-top,
//! click-through window. Rendering belongs to the front end; this module
//! owns creation, the periodic raise that keeps the window on top, and
//! teardown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use snapreel_common::error::{SnapreelError, SnapreelResult};
use tokio::task::JoinHandle;

use crate::region::CaptureRegion;
use crate::signal::RecordingWatch;

/// A window outlining the capture region.
pub trait BoundaryOverlay: Send {
    /// Re-assert topmost position. An error ends the refresh loop.
    fn raise(&mut self) -> SnapreelResult<()>;

    /// Destroy the window. Called at most once.
    fn close(&mut self);
}

/// Creates overlays for a region.
pub trait OverlayFactory: Send + Sync {
    fn create(&self, region: CaptureRegion) -> SnapreelResult<Box<dyn BoundaryOverlay>>;
}

/// Headless overlay that only logs its lifecycle.
#[derive(Debug)]
pub struct TracingOverlay {
    region: CaptureRegion,
    raises: u64,
    closed: bool,
}

impl BoundaryOverlay for TracingOverlay {
    fn raise(&mut self) -> SnapreelResult<()> {
        if self.closed {
            return Err(SnapreelError::capture("overlay already closed"));
        }
        self.raises += 1;
        tracing::trace!(raises = self.raises, "Overlay raised");
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        tracing::debug!(
            region = %self.region.resolution(),
            raises = self.raises,
            "Boundary overlay closed"
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOverlayFactory;

impl OverlayFactory for TracingOverlayFactory {
    fn create(&self, region: CaptureRegion) -> SnapreelResult<Box<dyn BoundaryOverlay>> {
        tracing::info!(
            left = region.left,
            top = region.top,
            size = %region.resolution(),
            "Boundary overlay shown"
        );
        Ok(Box::new(TracingOverlay {
            region,
            raises: 0,
            closed: false,
        }))
    }
}

type SharedOverlay = Arc<Mutex<Box<dyn BoundaryOverlay>>>;

/// A live overlay plus its refresher task.
pub struct OverlayHandle {
    overlay: SharedOverlay,
    refresher: JoinHandle<()>,
}

impl std::fmt::Debug for OverlayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayHandle")
            .field("refresher_finished", &self.refresher.is_finished())
            .finish()
    }
}

/// Create an overlay for `region` and keep it on top every `refresh`
/// until `watch` reports that recording stopped.
pub fn spawn_overlay(
    factory: &dyn OverlayFactory,
    region: CaptureRegion,
    refresh: Duration,
    mut watch: RecordingWatch,
) -> SnapreelResult<OverlayHandle> {
    let overlay: SharedOverlay = Arc::new(Mutex::new(factory.create(region)?));
    let shared = Arc::clone(&overlay);

    let refresher = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = watch.stopped() => break,
                _ = ticker.tick() => {
                    let raised = match shared.lock() {
                        Ok(mut overlay) => overlay.raise(),
                        Err(_) => Err(SnapreelError::capture("overlay lock poisoned")),
                    };
                    if let Err(e) = raised {
                        tracing::debug!(error = %e, "Overlay refresh stopped");
                        break;
                    }
                }
            }
        }
    });

    Ok(OverlayHandle { overlay, refresher })
}

impl OverlayHandle {
    /// Destroy the window and wait briefly for the refresher to exit.
    pub async fn close(self) {
        if let Ok(mut overlay) = self.overlay.lock() {
            overlay.close();
        }
        let mut refresher = self.refresher;
        if tokio::time::timeout(Duration::from_secs(1), &mut refresher)
            .await
            .is_err()
        {
            tracing::warn!("Overlay refresher did not exit, aborting it");
            refresher.abort();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CountingOverlayFactory;
    use super::*;
    use crate::signal::RecordingSignal;
    use std::sync::atomic::Ordering;

    fn region() -> CaptureRegion {
        CaptureRegion {
            left: 0,
            top: 0,
            width: 100,
            height: 100,
        }
    }

    #[tokio::test]
    async fn refresher_raises_until_signal_stops() {
        let factory = CountingOverlayFactory::default();
        let signal = RecordingSignal::recording();
        let handle = spawn_overlay(&factory, region(), Duration::from_millis(10), signal.watch()).unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        signal.stop();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let after_stop = factory.raises.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "raised {after_stop} times");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(factory.raises.load(Ordering::SeqCst), after_stop);

        handle.close().await;
        assert!(factory.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn refresher_exits_when_raise_fails() {
        let factory = CountingOverlayFactory {
            fail_after: Some(3),
            ..Default::default()
        };
        let signal = RecordingSignal::recording();
        let handle = spawn_overlay(&factory, region(), Duration::from_millis(5), signal.watch()).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(factory.raises.load(Ordering::SeqCst), 3);
        assert!(signal.is_recording());
        handle.close().await;
    }

    #[test]
    fn tracing_overlay_refuses_raise_after_close() {
        let mut overlay = TracingOverlayFactory.create(region()).unwrap();
        overlay.raise().unwrap();
        overlay.close();
        assert!(overlay.raise().is_err());
    }
}
