//! Bounded fixed-delay retry for directory writes.
//!
//! The failures absorbed here are short-lived throttling and replication lag
//! on the write path, so the delay between attempts is flat: no backoff, no
//! jitter.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clock::pause;
use crate::error::{DirectoryResult, ReconcileError, ReconcileResult};

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Runs a write up to `retries + 1` times with a fixed delay between attempts.
#[derive(Debug, Clone)]
pub struct BoundedRetrier {
    retries: u32,
    delay: Duration,
}

impl Default for BoundedRetrier {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

impl BoundedRetrier {
    #[must_use]
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Total number of attempts, including the first one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `attempt` until it succeeds, fails permanently, or the budget is spent.
    ///
    /// `operation` names the write in logs and errors. Cancellation abandons an
    /// attempt in flight and interrupts the delay between attempts.
    ///
    /// # Errors
    ///
    /// - `TransientWrite` wrapping the last error once every attempt failed.
    /// - `PermanentWrite` as soon as an attempt fails with a non-transient error.
    /// - `Cancelled` if `cancel` fires.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> ReconcileResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DirectoryResult<T>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(operation));
            }

            attempts += 1;
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(operation)),
                outcome = attempt() => outcome,
            };

            match outcome {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(operation, attempts, "Write succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => {
                    warn!(
                        operation,
                        attempt = attempts,
                        error = %e,
                        "Write rejected, not retrying"
                    );
                    return Err(ReconcileError::PermanentWrite {
                        operation: operation.to_string(),
                        attempt: attempts,
                        source: e,
                    });
                }
                Err(e) if attempts >= max_attempts => {
                    warn!(
                        operation,
                        attempt = attempts,
                        max_attempts,
                        error = %e,
                        "Write failed, retries exhausted"
                    );
                    return Err(ReconcileError::TransientWrite {
                        operation: operation.to_string(),
                        attempts,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        operation,
                        attempt = attempts,
                        max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Write failed, retrying"
                    );
                    if !pause(self.delay, cancel).await {
                        return Err(cancelled(operation));
                    }
                }
            }
        }
    }
}

fn cancelled(operation: &str) -> ReconcileError {
    ReconcileError::Cancelled {
        operation: operation.to_string(),
    }
}
