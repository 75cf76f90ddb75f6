//! Exponential backoff for registration retries and push-channel reconnects.

use std::time::Duration;

use rand::Rng;

/// Bounds for a retry schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub min: Duration,
    pub max: Duration,
}

/// Shortest delay a schedule will produce.
const FLOOR: Duration = Duration::from_millis(1);

impl BackoffPolicy {
    /// Begin a schedule. A zero `min` is raised to 1ms so retries never spin.
    #[must_use]
    pub fn start(self) -> Backoff {
        let min = self.min.max(FLOOR);
        let policy = Self { min, max: self.max.max(min) };
        Backoff { policy, current: min }
    }
}

/// Running retry schedule: doubles from `min` up to `max`. Each delay gets
/// up to 10% random jitter.
#[derive(Clone, Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.policy.max);
        base + jitter(base)
    }

    /// Start over after a success.
    pub fn reset(&mut self) {
        self.current = self.policy.min;
    }
}

fn jitter(base: Duration) -> Duration {
    let ceiling = u64::try_from(base.as_millis() / 10).unwrap_or(0);
    if ceiling == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ceiling))
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
