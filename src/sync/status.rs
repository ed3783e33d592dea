//! User-visible sync status with automatic revert to idle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::shutdown::Shutdown;

pub const SUCCESS_DISPLAY: Duration = Duration::from_secs(2);
pub const ERROR_DISPLAY: Duration = Duration::from_secs(5);

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

impl SyncStatus {
    fn display_window(self) -> Option<Duration> {
        match self {
            Self::Success => Some(SUCCESS_DISPLAY),
            Self::Error => Some(ERROR_DISPLAY),
            Self::Idle | Self::Syncing => None,
        }
    }
}

/// Publishes [`SyncStatus`] over a watch channel. `Success` and `Error` fall
/// back to `Idle` after their display window unless a newer status lands
/// first.
pub struct SyncStatusTracker {
    tx: Arc<watch::Sender<SyncStatus>>,
    generation: Arc<AtomicU64>,
    revert: Mutex<Option<JoinHandle<()>>>,
    shutdown: Shutdown,
}

impl SyncStatusTracker {
    #[must_use]
    pub fn new(shutdown: Shutdown) -> Self {
        let (tx, _rx) = watch::channel(SyncStatus::Idle);
        Self { tx: Arc::new(tx), generation: Arc::new(AtomicU64::new(0)), revert: Mutex::new(None), shutdown }
    }

    #[must_use]
    pub fn current(&self) -> SyncStatus {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    pub fn set(&self, status: SyncStatus) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut revert = self.revert.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = revert.take() {
            pending.abort();
        }

        if self.shutdown.is_triggered() {
            return;
        }
        self.tx.send_replace(status);

        let Some(window) = status.display_window() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(?status, "no runtime; status will not auto-revert");
            return;
        };

        let deadline = tokio::time::Instant::now() + window;
        let tx = self.tx.clone();
        let current = self.generation.clone();
        let shutdown = self.shutdown.clone();
        *revert = Some(runtime.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => {
                    if current.load(Ordering::SeqCst) == generation {
                        tx.send_replace(SyncStatus::Idle);
                    }
                }
                () = shutdown.triggered() => {}
            }
        }));
    }

    /// Abort any pending revert. Later `set` calls are ignored.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
        if let Some(pending) = self.revert.lock().unwrap_or_else(PoisonError::into_inner).take() {
            pending.abort();
        }
    }
}
