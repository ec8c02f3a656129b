//! Retry decisions for unreliable network calls.

use std::time::Duration;

use crate::error::ErrorKind;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
/// Ceiling on any single retry delay.
pub const DEFAULT_CAP_DELAY_MS: u64 = 5_000;
/// Default total attempts (the first call plus retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Outcome of consulting the policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    fn give_up() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Exponential backoff policy, pure and deterministic.
///
/// The delay for attempt `n` is `min(base * 2^(n-1), cap)`. Only
/// network, server (5xx) and rate-limit failures are retried; every other
/// kind is surfaced to the caller immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay_ms: u64,
    cap_delay_ms: u64,
    max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_BASE_DELAY_MS,
            DEFAULT_CAP_DELAY_MS,
            DEFAULT_MAX_ATTEMPTS,
        )
    }
}

impl BackoffPolicy {
    #[must_use]
    pub fn new(base_delay_ms: u64, cap_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            cap_delay_ms,
            max_attempts,
        }
    }

    /// Policy with no delays, for tests that only care about attempt counts.
    #[must_use]
    pub fn without_delay(max_attempts: u32) -> Self {
        Self::new(0, 0, max_attempts)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide whether attempt `attempt` (1-based) that failed with `kind`
    /// should be re-issued, and after how long.
    #[must_use]
    pub fn next_delay(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::give_up();
        }

        let exponent = attempt.saturating_sub(1).min(31);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(1_u64 << exponent)
            .min(self.cap_delay_ms);

        RetryDecision {
            retry: true,
            delay: Duration::from_millis(delay_ms),
        }
    }
}
