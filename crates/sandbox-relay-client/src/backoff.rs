//! Exponential reconnect backoff.

use std::time::Duration;

/// Reconnect delay state.
///
/// The delay starts at `base`, doubles on each consecutive failure up to
/// `max`, and returns to `base` on [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_attempts: u32,
    current: Duration,
    failures: u32,
}

impl Backoff {
    /// `max_attempts` below 1 is treated as 1: a single attempt, no retry.
    #[must_use]
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max: max.max(base),
            max_attempts: max_attempts.max(1),
            current: base,
            failures: 0,
        }
    }

    /// Record a failed attempt.
    ///
    /// Returns the delay before the next attempt, or `None` once
    /// `max_attempts` consecutive attempts have failed.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.max_attempts {
            return None;
        }
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        Some(delay)
    }

    /// Back to the base delay. Called after a successful bind.
    pub const fn reset(&mut self) {
        self.current = self.base;
        self.failures = 0;
    }

    /// Delay the next attempt would wait for.
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.current
    }

    /// Consecutive failures since the last reset.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }
}
