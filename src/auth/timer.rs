//! Single-shot token expiration timer.
//!
//! The orchestrator owns exactly one of these per process. Arming cancels
//! any previous schedule, so only the latest expiry instant ever fires; the
//! fired message carries the session generation it was armed for so a
//! receiver can discard schedules that outlived their session.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Message sent when an armed schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired {
    pub generation: u64,
}

/// Cancelable single-shot scheduler backed by a tokio task.
#[derive(Default)]
pub struct ExpirationTimer {
    handle: Option<JoinHandle<()>>,
}

impl ExpirationTimer {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Schedule one `Expired` message after `duration`, replacing any
    /// previously armed schedule.
    pub fn arm(&mut self, duration: Duration, generation: u64, tx: mpsc::Sender<Expired>) {
        self.disarm();
        debug!(duration_ms = duration.as_millis() as u64, generation, "Arming expiration timer");
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // Receiver gone means the orchestrator is shutting down.
            let _ = tx.send(Expired { generation }).await;
        }));
    }

    /// Cancel without firing. O(1); safe to call when nothing is armed.
    pub fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a schedule is currently pending.
    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ExpirationTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

// ============================================================================
// Tests
// ============================================================================
