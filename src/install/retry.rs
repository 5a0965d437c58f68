//! Retry policy and executor for the installation phases.
//!
//! The executor retries only errors classified recoverable, honors the
//! error's suggested retry-after as a lower bound on the wait, and gives
//! cancellation precedence over everything: the token is checked before
//! each attempt and sleeps are raced against it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::{InstallError, Result};
use crate::install::cancel::CancelToken;

/// Retry configuration with backoff shape and an overall deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default)]
    pub backoff: BackoffStrategy,

    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    #[serde(default)]
    pub jitter: bool,

    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Overall budget across all attempts and waits, layered on top of the
    /// cancellable token rather than replacing it.
    #[serde(default, with = "humantime_serde")]
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff: BackoffStrategy::default(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            jitter: false,
            jitter_factor: default_jitter_factor(),
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Production policy for chart installation: convergence waits dominate,
    /// so the deadline is generous.
    pub fn installation() -> Self {
        Self {
            attempts: 3,
            backoff: BackoffStrategy::Exponential { base: 2.0 },
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(300),
            jitter: true,
            jitter_factor: default_jitter_factor(),
            deadline: Some(Duration::from_secs(60 * 60)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Linear {
        #[serde(with = "humantime_serde")]
        increment: Duration,
    },
    Exponential {
        #[serde(default = "default_exponential_base")]
        base: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential {
            base: default_exponential_base(),
        }
    }
}

/// Executes a fallible operation under a [`RetryPolicy`].
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `operation` until it succeeds, a non-recoverable error occurs,
    /// attempts are exhausted, the deadline elapses, or the token cancels.
    /// A cancellation observed before an attempt does not count as a failed
    /// attempt.
    pub async fn execute<F, Fut, T>(&self, cancel: &CancelToken, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(InstallError::Cancelled);
            }
            attempt += 1;

            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.is_cancelled() || cancel.is_cancelled() {
                return Err(InstallError::Cancelled);
            }
            if !err.is_recoverable() || attempt >= self.policy.attempts {
                return Err(err);
            }

            let mut delay = self.apply_jitter(self.backoff_delay(attempt));
            if let Some(min_wait) = err.retry_after() {
                delay = delay.max(min_wait);
            }

            if let Some(deadline) = self.policy.deadline {
                if started.elapsed() + delay >= deadline {
                    warn!(attempt, "retry deadline exhausted, giving up");
                    return Err(err);
                }
            }

            warn!(
                attempt,
                max_attempts = self.policy.attempts,
                wait = ?delay,
                error = %err,
                "installation attempt failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(InstallError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Delay for the given attempt number (1-based), capped at `max_delay`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_delay = match &self.policy.backoff {
            BackoffStrategy::Fixed => self.policy.initial_delay,
            BackoffStrategy::Linear { increment } => {
                self.policy.initial_delay + *increment * (attempt - 1)
            }
            BackoffStrategy::Exponential { base } => {
                let multiplier = base.powi(attempt as i32 - 1);
                Duration::from_secs_f64(self.policy.initial_delay.as_secs_f64() * multiplier)
            }
        };
        base_delay.min(self.policy.max_delay)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.policy.jitter {
            return delay;
        }
        let mut rng = rand::rng();
        let jitter_range = delay.as_secs_f64() * self.policy.jitter_factor;
        let jitter = rng.random_range(-jitter_range / 2.0..=jitter_range / 2.0);
        Duration::from_secs_f64((delay.as_secs_f64() + jitter).max(0.0))
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_jitter_factor() -> f64 {
    0.3
}

fn default_exponential_base() -> f64 {
    2.0
}
