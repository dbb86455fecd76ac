//! Restart delays for a failed pipeline.

use std::time::Duration;

/// Exponential backoff policy: the delay starts at `initial`, doubles after
/// every consecutive failure and never exceeds `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
        }
    }
}

impl BackoffConfig {
    /// An endless sequence of delays following this policy.
    pub fn delays(&self) -> Backoff {
        Backoff {
            next: self.initial.min(self.max),
            max: self.max,
        }
    }
}

/// Iterator over backoff delays. Never ends.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current.saturating_mul(2).min(self.max);
        Some(current)
    }
}
