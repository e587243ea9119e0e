//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

use crate::config::schema::ReconcileConfig;

/// Retry schedule: `steps` attempts, sleeping `initial * factor^n` (plus jitter) between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the second attempt.
    pub initial: Duration,
    /// Multiplier applied after every failed attempt.
    pub factor: f64,
    /// Upper bound of random extra delay, as a fraction of the computed delay.
    pub jitter: f64,
    /// Total number of attempts (retries + 1).
    pub steps: u32,
}

impl Backoff {
    /// Schedule for `retries` retries after the first attempt.
    pub fn with_retries(retries: u32, initial: Duration, factor: f64, jitter: f64) -> Self {
        Self {
            initial,
            factor,
            jitter,
            steps: retries.saturating_add(1),
        }
    }

    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self::with_retries(
            config.dynamic_retries,
            Duration::from_millis(config.retry_initial_ms),
            config.retry_factor,
            config.retry_jitter,
        )
    }

    /// Delay without jitter before attempt `attempt + 1`, where attempt 0 is the first failure.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = (self.initial.as_nanos() as f64 * self.factor.max(1.0).powi(exponent)).round();
        if nanos >= u64::MAX as f64 {
            return Duration::MAX;
        }
        Duration::from_nanos(nanos as u64)
    }

    /// Delay with jitter applied (0 to `jitter` of the base delay).
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..self.jitter);
        base.saturating_add(base.mul_f64(extra))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::with_retries(15, Duration::from_secs(1), 1.3, 0.1)
    }
}
