// Rate-limit retry policy
use crate::port::ApiResponse;
use std::time::Duration;
use tracing::warn;

use super::constants::{DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_ATTEMPTS};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the call after sleeping this long
    Retry(Duration),
    /// Hand the response back to the caller
    Done,
}

/// Linear backoff on HTTP 429
///
/// The n-th retry sleeps `n * backoff_unit` (1s, 2s, 3s, ...). Only 429 is
/// retried; every other status is terminal. Once the attempt counter
/// exceeds `max_attempts` the request is abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `max_attempts` - Retry ceiling (default: 30)
    /// * `backoff_unit` - Step of the linear backoff (default: 1s)
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts,
            backoff_unit,
        }
    }

    /// True once `attempts` retries have pushed past the ceiling
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts > self.max_attempts
    }

    /// Sleep before the `attempt`-th retry (1-indexed)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }

    /// Decide what to do with a response after `attempts` retries so far
    pub fn decide(&self, response: &ApiResponse, attempts: u32) -> RetryDecision {
        if !response.is_rate_limited() {
            return RetryDecision::Done;
        }

        let next = attempts + 1;
        let delay = self.backoff(next);
        warn!(
            attempt = next,
            delay_ms = delay.as_millis() as u64,
            "Rate limited response received, backing off"
        );
        RetryDecision::Retry(delay)
    }
}
