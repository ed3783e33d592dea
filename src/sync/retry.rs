//! Bounded exponential-backoff retry for user-visible sync calls.
//!
//! DESIGN
//! ======
//! Attempt 0 runs immediately. Retry *n* waits `base * 2^(n-1)` (1s, 2s,
//! 4s with the defaults), for at most `max_retries` extra attempts, so the
//! total wait is bounded at roughly 7 seconds plus request latency.
//!
//! Waits race the owner's `Shutdown`: once teardown is triggered the pending
//! timer is dropped and no further attempt is made.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::shutdown::Shutdown;

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, base_delay: DEFAULT_BASE_DELAY }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("retry cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RetryCoordinator {
    policy: RetryPolicy,
    shutdown: Shutdown,
}

impl RetryCoordinator {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_shutdown(policy, Shutdown::new())
    }

    #[must_use]
    pub fn with_shutdown(policy: RetryPolicy, shutdown: Shutdown) -> Self {
        Self { policy, shutdown }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Drop any pending retry and refuse new attempts.
    pub fn cancel(&self) {
        self.shutdown.trigger();
    }

    /// Run `op` with the configured retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Exhausted`] with the last error once every
    /// attempt failed, or [`RetryError::Cancelled`] if teardown happened first.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_with(self.policy.max_retries, op).await
    }

    /// Run `op` allowing `max_retries` attempts after the first.
    ///
    /// # Errors
    ///
    /// Same as [`RetryCoordinator::run`].
    pub async fn run_with<T, E, F, Fut>(&self, max_retries: u32, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut retries = 0_u32;
        loop {
            if self.shutdown.is_triggered() {
                return Err(RetryError::Cancelled);
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if retries < max_retries => {
                    retries += 1;
                    let delay = self.policy.delay_for(retries);
                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "operation failed; retry scheduled"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.shutdown.triggered() => {
                            debug!(retry = retries, "pending retry discarded by teardown");
                            return Err(RetryError::Cancelled);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempts = retries + 1, "operation failed; retries exhausted");
                    return Err(RetryError::Exhausted { attempts: retries + 1, last: e });
                }
            }
        }
    }
}
