//! Wait for an encoder's output file to be fully flushed.

use std::path::Path;

use snapreel_common::config::StabilizationConfig;
use snapreel_common::error::{SnapreelError, SnapreelResult};
use tokio::time::Instant;

async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

/// Wait until `path` exists and its size is unchanged across two
/// consecutive samples.
///
/// One deadline covers both phases. Returns the stable size, or
/// `StabilizationTimeout` once `max_wait` has elapsed.
pub async fn wait_for_stable_file(path: &Path, policy: &StabilizationConfig) -> SnapreelResult<u64> {
    let start = Instant::now();
    let deadline = start + policy.max_wait();
    let poll = policy.poll_interval();

    let timed_out = || SnapreelError::StabilizationTimeout {
        path: path.to_path_buf(),
        waited_ms: start.elapsed().as_millis() as u64,
    };

    let mut last = loop {
        if let Some(size) = file_size(path).await {
            break size;
        }
        if Instant::now() >= deadline {
            return Err(timed_out());
        }
        tracing::debug!(path = %path.display(), "Waiting for output file to appear");
        tokio::time::sleep_until((Instant::now() + poll).min(deadline)).await;
    };

    loop {
        if Instant::now() >= deadline {
            return Err(timed_out());
        }
        tokio::time::sleep_until((Instant::now() + poll).min(deadline)).await;

        let current = file_size(path).await.unwrap_or(0);
        if current == last {
            tracing::debug!(
                path = %path.display(),
                bytes = current,
                waited_ms = start.elapsed().as_millis() as u64,
                "Output file stable"
            );
            return Ok(current);
        }
        tracing::debug!(path = %path.display(), bytes = current, "Output file still growing");
        last = current;
    }
}
