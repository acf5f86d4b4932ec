//! Retry policy for queue entries that failed to sync.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PendingOperation;

/// What happens to FAILED entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// FAILED entries wait until someone calls `retry_failed`.
    #[default]
    Manual,
    /// FAILED entries are requeued at the start of a drain once their backoff elapsed.
    Backoff(BackoffConfig),
}

/// Exponential backoff between automatic retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Attempts after which an entry stays FAILED.
    pub max_retries: u32,
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Cap for exponential growth.
    pub max_delay: Duration,
    /// Growth factor per failed attempt.
    pub multiplier: f64,
}

impl BackoffConfig {
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30 * 60),
            multiplier: 2.0,
        }
    }

    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before retry number `attempt + 1` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(secs.max(0.0))
        } else {
            self.max_delay
        }
    }

    /// Whether a FAILED entry may be requeued at `now`.
    ///
    /// Entries without a parseable `last_retry` are due immediately.
    pub fn is_due(&self, operation: &PendingOperation, now: DateTime<Utc>) -> bool {
        if operation.retry_count >= self.max_retries {
            return false;
        }

        let Some(last_retry) = operation
            .last_retry
            .as_deref()
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        else {
            return true;
        };

        let delay = self.delay_for_attempt(operation.retry_count.saturating_sub(1));
        let Ok(delay) = chrono::Duration::from_std(delay) else {
            return false;
        };
        last_retry.with_timezone(&Utc) + delay <= now
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(5)
    }
}
