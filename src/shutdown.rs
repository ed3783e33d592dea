//! Teardown signal shared by every component that owns a timer.
//!
//! A `Shutdown` is sticky: once triggered it stays triggered, so a timer
//! armed after teardown still observes it. Clones share one flag.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger teardown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once teardown has been triggered.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
