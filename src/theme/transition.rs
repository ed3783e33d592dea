//! Animated theme transitions.
//!
//! DESIGN
//! ======
//! A single-flight state machine:
//!
//! ```text
//! Idle -> Preparing -> Transitioning -> Completing -> Idle
//! ```
//!
//! `Preparing` installs the transition style on the document. `Transitioning`
//! runs the caller's update, inside the native view-transition primitive when
//! one is available, otherwise directly followed by a wait for the duration.
//! `Completing` waits a short settle delay and removes the style again.
//!
//! A request that arrives while a transition is active is dropped and its
//! update is never called.
//!
//! ERROR HANDLING
//! ==============
//! A failing primitive is logged and the manual path takes over; the update
//! still runs exactly once. Every exit, including a panic in the update or
//! the caller dropping the future, restores `Idle` and clears the style.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::ports::{DocumentPort, ViewTransitionPort};
use crate::shutdown::Shutdown;

pub const DEFAULT_DURATION: Duration = Duration::from_millis(300);
pub const DEFAULT_EASING: &str = "cubic-bezier(0.4, 0, 0.2, 1)";
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

#[cfg(test)]
#[path = "transition_test.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    Preparing,
    Transitioning,
    Completing,
}

/// Style side effects installed on the document for one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionStyle {
    pub duration: Duration,
    pub easing: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionConfig {
    pub duration: Duration,
    pub easing: String,
    pub settle_delay: Duration,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self { duration: DEFAULT_DURATION, easing: DEFAULT_EASING.to_owned(), settle_delay: SETTLE_DELAY }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The update ran and the transition finished.
    Completed,
    /// Another transition was active; the update did not run.
    Dropped,
    /// Teardown interrupted the transition.
    Cancelled,
}

pub struct TransitionCoordinator {
    document: Arc<dyn DocumentPort>,
    primitive: Option<Arc<dyn ViewTransitionPort>>,
    config: TransitionConfig,
    phase: Mutex<TransitionPhase>,
    shutdown: Shutdown,
}

/// Resets the coordinator when a transition ends for any reason.
struct ActiveTransition<'a> {
    coordinator: &'a TransitionCoordinator,
}

impl Drop for ActiveTransition<'_> {
    fn drop(&mut self) {
        self.coordinator.document.end_transition();
        self.coordinator.set_phase(TransitionPhase::Idle);
    }
}

impl TransitionCoordinator {
    #[must_use]
    pub fn new(
        document: Arc<dyn DocumentPort>,
        primitive: Option<Arc<dyn ViewTransitionPort>>,
        config: TransitionConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self { document, primitive, config, phase: Mutex::new(TransitionPhase::Idle), shutdown }
    }

    #[must_use]
    pub fn phase(&self) -> TransitionPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: TransitionPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Claim the idle coordinator, or report that it is busy.
    fn try_begin(&self) -> bool {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase != TransitionPhase::Idle {
            return false;
        }
        *phase = TransitionPhase::Preparing;
        true
    }

    /// Run `update` inside an animated transition.
    pub async fn execute<F>(&self, reduce_motion: bool, update: F) -> TransitionOutcome
    where
        F: FnOnce() + Send,
    {
        if self.shutdown.is_triggered() {
            return TransitionOutcome::Cancelled;
        }
        if !self.try_begin() {
            debug!(phase = ?self.phase(), "transition in flight; request dropped");
            return TransitionOutcome::Dropped;
        }
        let _active = ActiveTransition { coordinator: self };

        let duration = if reduce_motion { Duration::ZERO } else { self.config.duration };
        self.document.begin_transition(&TransitionStyle { duration, easing: self.config.easing.clone() });

        self.set_phase(TransitionPhase::Transitioning);
        let mut slot = Some(update);
        let mut run_once = || {
            if let Some(update) = slot.take() {
                update();
            }
        };

        let mut ran_natively = false;
        if let Some(primitive) = &self.primitive {
            tokio::select! {
                result = primitive.run(&mut run_once) => match result {
                    Ok(()) => ran_natively = true,
                    Err(e) => warn!(error = %e, "view transition failed; using manual transition"),
                },
                () = self.shutdown.triggered() => return TransitionOutcome::Cancelled,
            }
        }

        run_once();
        if !ran_natively && !duration.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(duration) => {}
                () = self.shutdown.triggered() => return TransitionOutcome::Cancelled,
            }
        }

        self.set_phase(TransitionPhase::Completing);
        tokio::select! {
            () = tokio::time::sleep(self.config.settle_delay) => {}
            () = self.shutdown.triggered() => return TransitionOutcome::Cancelled,
        }

        TransitionOutcome::Completed
    }
}
