//! Single-writer recording signal shared with background tasks.

use tokio::sync::watch;

/// Writer side, held only by the session coordinator.
#[derive(Debug)]
pub struct RecordingSignal {
    tx: watch::Sender<bool>,
}

/// Reader side handed to background tasks.
#[derive(Debug, Clone)]
pub struct RecordingWatch {
    rx: watch::Receiver<bool>,
}

impl RecordingSignal {
    /// A signal that starts in the recording state.
    pub fn recording() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx }
    }

    /// Mark recording as over. Safe to call repeatedly.
    pub fn stop(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_recording(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn watch(&self) -> RecordingWatch {
        RecordingWatch {
            rx: self.tx.subscribe(),
        }
    }
}

impl RecordingWatch {
    pub fn is_recording(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once recording has stopped or the signal was dropped.
    pub async fn stopped(&mut self) {
        let _ = self.rx.wait_for(|recording| !*recording).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn watchers_observe_stop() {
        let signal = RecordingSignal::recording();
        let mut watch = signal.watch();
        assert!(watch.is_recording());

        let waiter = tokio::spawn(async move {
            watch.stopped().await;
            watch.is_recording()
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.stop();
        signal.stop();

        let still_recording = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!still_recording);
        assert!(!signal.is_recording());
    }

    #[tokio::test]
    async fn late_watchers_see_stopped_immediately() {
        let signal = RecordingSignal::recording();
        signal.stop();
        let mut watch = signal.watch();
        tokio::time::timeout(Duration::from_millis(100), watch.stopped())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_signal_releases_watchers() {
        let signal = RecordingSignal::recording();
        let mut watch = signal.watch();
        drop(signal);
        tokio::time::timeout(Duration::from_millis(100), watch.stopped())
            .await
            .unwrap();
    }
}
