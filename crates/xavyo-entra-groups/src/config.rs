//! Reconciliation configuration.

use std::env;
use std::time::Duration;

use crate::error::{ReconcileError, ReconcileResult};
use crate::poller::{PollOptions, Presence};
use crate::retry::{BoundedRetrier, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};

/// Default time between convergence reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default wall-clock budget for convergence.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Retry and convergence settings for a [`GroupReconciler`](crate::GroupReconciler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Retries after the first write attempt (default: 10).
    pub retry_attempts: u32,
    /// Flat delay between write attempts (default: 2s).
    pub retry_delay: Duration,
    /// Time between convergence reads (default: 1s).
    pub poll_interval: Duration,
    /// Total budget for convergence (default: 5 minutes).
    pub poll_timeout: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl ReconcileConfig {
    /// Creates a configuration with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with short delays for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_secs(1),
        }
    }

    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ReconcileConfigBuilder {
        ReconcileConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// All optional, defaults as in [`ReconcileConfig::default`]:
    /// - `XAVYO_GROUPS_RETRY_ATTEMPTS`: retries after the first write attempt
    /// - `XAVYO_GROUPS_RETRY_DELAY_MS`: delay between write attempts
    /// - `XAVYO_GROUPS_POLL_INTERVAL_MS`: time between convergence reads
    /// - `XAVYO_GROUPS_POLL_TIMEOUT_SECS`: convergence budget
    pub fn from_env() -> ReconcileResult<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ReconcileResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |var: &str| -> ReconcileResult<Option<u64>> {
            lookup(var)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|e| ReconcileError::Config {
                        var: var.to_string(),
                        reason: format!("expected a non-negative integer, got {raw:?}: {e}"),
                    })
                })
                .transpose()
        };

        let mut builder = Self::builder();
        if let Some(attempts) = number("XAVYO_GROUPS_RETRY_ATTEMPTS")? {
            let attempts = u32::try_from(attempts).map_err(|_| ReconcileError::Config {
                var: "XAVYO_GROUPS_RETRY_ATTEMPTS".to_string(),
                reason: format!("{attempts} is out of range"),
            })?;
            builder = builder.retry_attempts(attempts);
        }
        if let Some(ms) = number("XAVYO_GROUPS_RETRY_DELAY_MS")? {
            builder = builder.retry_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = number("XAVYO_GROUPS_POLL_INTERVAL_MS")? {
            builder = builder.poll_interval(Duration::from_millis(ms));
        }
        if let Some(secs) = number("XAVYO_GROUPS_POLL_TIMEOUT_SECS")? {
            builder = builder.poll_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.poll_interval.is_zero() {
            return Err(ReconcileError::Config {
                var: "poll_interval".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.poll_timeout < self.poll_interval {
            return Err(ReconcileError::Config {
                var: "poll_timeout".to_string(),
                reason: format!(
                    "must be >= poll_interval ({:?} < {:?})",
                    self.poll_timeout, self.poll_interval
                ),
            });
        }
        Ok(())
    }

    /// Retrier for the write phase.
    #[must_use]
    pub fn retrier(&self) -> BoundedRetrier {
        BoundedRetrier::new(self.retry_attempts, self.retry_delay)
    }

    /// Poll options for the confirm phase.
    #[must_use]
    pub fn poll_options(&self, presence: Presence) -> PollOptions {
        PollOptions::new(self.poll_interval, self.poll_timeout, presence)
    }
}

/// Builder for `ReconcileConfig`.
#[derive(Debug, Default)]
pub struct ReconcileConfigBuilder {
    retry_attempts: Option<u32>,
    retry_delay: Option<Duration>,
    poll_interval: Option<Duration>,
    poll_timeout: Option<Duration>,
}

impl ReconcileConfigBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of retries after the first write attempt.
    #[must_use]
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    /// Set the delay between write attempts.
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Set the time between convergence reads.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set the convergence budget.
    #[must_use]
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> ReconcileResult<ReconcileConfig> {
        let defaults = ReconcileConfig::default();
        let config = ReconcileConfig {
            retry_attempts: self.retry_attempts.unwrap_or(defaults.retry_attempts),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            poll_timeout: self.poll_timeout.unwrap_or(defaults.poll_timeout),
        };
        config.validate()?;
        Ok(config)
    }
}
