//! # Exponential Backoff
//!
//! Delays between webhook delivery attempts. Each delay doubles the previous
//! one and is capped at a maximum, e.g. 1s, 2s, 4s, 8s, ... up to the cap.

use std::time::Duration;

/// Exponential backoff calculator
///
/// Yields `initial`, `initial * 2`, `initial * 4`, ... capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay returned by the next call
    current: Duration,
    /// Upper bound for any single delay
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a new backoff starting at `initial` and never exceeding `max`
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        result
    }
}
