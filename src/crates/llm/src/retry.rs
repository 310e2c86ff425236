//! Bounded retry with exponential backoff for transient backend failures.

use rand::Rng;
use std::time::Duration;

/// Retry configuration for transient failures.
///
/// Delay for attempt `n` (0-indexed) is
/// `initial_interval * backoff_factor^n`, capped at `max_interval`, with
/// optional jitter in the `0.5..=1.5` range.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: usize,

    /// Initial interval between attempts, in seconds.
    pub initial_interval: f64,

    /// Multiplier applied to the interval after each attempt.
    pub backoff_factor: f64,

    /// Upper bound on the interval, in seconds.
    pub max_interval: f64,

    /// Whether to randomize each delay.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy with the given attempt budget and default backoff settings.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 30.0,
            jitter: true,
        }
    }

    /// Set the initial interval in seconds.
    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Delay to sleep before the attempt following attempt number `attempt`.
    pub fn delay(&self, attempt: usize) -> Duration {
        let base = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_interval);
        let final_delay = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..=1.5)
        } else {
            capped
        };
        Duration::from_secs_f64(final_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
