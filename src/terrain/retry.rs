//! Retry bookkeeping for land-use queries
//!
//! The state machine only decides; the caller owns the clock and sleeps
//! between attempts.

use std::time::Duration;

use crate::config::TerrainConfig;
use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub retry_request_errors: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &TerrainConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            retry_request_errors: config.retry_request_errors,
        }
    }

    /// Delay before the attempt following failed attempt `attempt` (0-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt + 1)
    }
}

/// What the caller should do after a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Sleep for the delay, then try again
    RetryAfter(Duration),
    /// Stop retrying; the batch degrades to an empty result
    GiveUp,
    /// The error must not be retried nor swallowed
    Escalate,
}

#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// 0-based index of the attempt in flight
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn on_failure(&mut self, error: &ServiceError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Escalate;
        }
        if !error.is_timeout() && !self.policy.retry_request_errors {
            return RetryDecision::GiveUp;
        }
        if self.attempt + 1 >= self.policy.max_attempts {
            return RetryDecision::GiveUp;
        }

        let delay = self.policy.delay_after(self.attempt);
        self.attempt += 1;
        RetryDecision::RetryAfter(delay)
    }
}
