//! Liveness guard for the playback worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Keeps `worker_alive` true for exactly as long as the worker runs,
/// including when it unwinds.
pub(super) struct PlaybackThreadGuard {
    alive: Arc<AtomicBool>,
}

impl PlaybackThreadGuard {
    pub(super) fn new(alive: Arc<AtomicBool>) -> Self {
        alive.store(true, Ordering::SeqCst);
        Self { alive }
    }
}

impl Drop for PlaybackThreadGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}
