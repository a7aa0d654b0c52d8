//! Mutable runtime configuration.
//!
//! The poll interval is re-read by the scheduler on every tick, so an operator
//! can change the polling period without restarting. There is no global
//! singleton: hosts construct one [`MirrorConfig`], share it behind an `Arc`,
//! and hand the scheduler an explicit accessor closure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::info;

#[derive(Debug)]
pub struct MirrorConfig {
    poll_interval_seconds: AtomicU64,
}

impl MirrorConfig {
    pub fn new(poll_interval_seconds: u64) -> Self {
        Self {
            poll_interval_seconds: AtomicU64::new(poll_interval_seconds),
        }
    }

    /// Current polling period; read freshly on every scheduler tick.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.load(Ordering::Relaxed))
    }

    /// Change the polling period; takes effect at the next tick.
    pub fn set_poll_interval_seconds(&self, seconds: u64) {
        self.poll_interval_seconds.store(seconds, Ordering::Relaxed);
        info!(poll_interval_seconds = seconds, "poll interval updated");
    }

    pub fn trace_loaded(&self) {
        info!(
            poll_interval_seconds = self.poll_interval_seconds.load(Ordering::Relaxed),
            "Loaded MirrorConfig"
        );
    }
}
