//! Convergence polling for the lagging read path.
//!
//! A successful write is not visible to reads right away. The poller re-reads
//! a listing until the target ID shows up (or disappears) and gives up once
//! the poll budget is spent. Failed reads count as "not converged yet": the
//! inconsistency being waited out is the expected condition, so a single bad
//! read must not end the wait.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::pause;
use crate::error::{ReconcileError, ReconcileResult};

/// Deadline used when the timeout does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Whether the poller waits for the target to appear or to disappear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Presence {
    #[default]
    Present,
    Absent,
}

impl Presence {
    /// Check if the observed IDs satisfy this presence for `target`.
    #[must_use]
    pub fn is_satisfied(self, observed: &[String], target: &str) -> bool {
        let found = observed.iter().any(|id| id == target);
        match self {
            Self::Present => found,
            Self::Absent => !found,
        }
    }
}

/// Poll cadence and budget.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Pause after each read before the next one starts.
    pub poll_interval: Duration,
    /// Total wall-clock budget for the wait.
    pub timeout: Duration,
    pub presence: Presence,
}

impl PollOptions {
    #[must_use]
    pub fn new(poll_interval: Duration, timeout: Duration, presence: Presence) -> Self {
        Self {
            poll_interval,
            timeout,
            presence,
        }
    }
}

/// Waits for a read-derived ID list to reflect a write.
#[derive(Debug, Clone)]
pub struct ConvergencePoller {
    options: PollOptions,
}

impl ConvergencePoller {
    #[must_use]
    pub fn new(options: PollOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Poll `read` until `target` satisfies the configured presence.
    ///
    /// The first read happens immediately. A read that would start at or after
    /// the deadline is not made, and a read still in flight at the deadline is
    /// abandoned. Returns the IDs observed by the converged read.
    ///
    /// # Errors
    ///
    /// - `ConvergenceTimeout` naming `target` and `operation` when the budget is spent.
    /// - `Cancelled` if `cancel` fires.
    pub async fn wait<F, Fut>(
        &self,
        target: &str,
        operation: &str,
        cancel: &CancellationToken,
        mut read: F,
    ) -> ReconcileResult<Vec<String>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ReconcileResult<Vec<String>>>,
    {
        let started = Instant::now();
        let deadline = started
            .checked_add(self.options.timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let mut polls = 0u32;
        let mut last_read_error: Option<ReconcileError> = None;

        let timed_out = |polls: u32, last_read_error: Option<ReconcileError>| {
            ReconcileError::ConvergenceTimeout {
                target: target.to_string(),
                operation: operation.to_string(),
                elapsed: started.elapsed(),
                polls,
                last_read_error: last_read_error.map(Box::new),
            }
        };

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(operation, target));
            }

            polls += 1;
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(operation, target)),
                outcome = tokio::time::timeout_at(deadline, read()) => outcome,
            };

            match outcome {
                Err(_elapsed) => {
                    warn!(operation, target, polls, "Read still in flight at deadline");
                    return Err(timed_out(polls, last_read_error));
                }
                Ok(Ok(observed)) => {
                    if self.options.presence.is_satisfied(&observed, target) {
                        info!(
                            operation,
                            target,
                            polls,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Converged"
                        );
                        return Ok(observed);
                    }
                    debug!(
                        operation,
                        target,
                        poll = polls,
                        observed = observed.len(),
                        "Not converged yet"
                    );
                    last_read_error = None;
                }
                Ok(Err(e)) => {
                    warn!(
                        operation,
                        target,
                        poll = polls,
                        error = %e,
                        "Read failed while waiting for convergence"
                    );
                    last_read_error = Some(e);
                }
            }

            match Instant::now().checked_add(self.options.poll_interval) {
                Some(next_read) if next_read < deadline => {}
                _ => return Err(timed_out(polls, last_read_error)),
            }
            if !pause(self.options.poll_interval, cancel).await {
                return Err(cancelled(operation, target));
            }
        }
    }
}

fn cancelled(operation: &str, target: &str) -> ReconcileError {
    ReconcileError::Cancelled {
        operation: format!("waiting for {operation} of {target}"),
    }
}
