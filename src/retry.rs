//! Bounded exponential backoff for transient backend failures.
//!
//! Only errors reporting [`crate::error::TubesageError::is_transient`] are retried. Overload
//! errors are returned immediately so callers can degrade instead of waiting.

use crate::config::RetrySettings;
use crate::error::{Result, TubesageError};
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::warn;

/// Retry policy for backend calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt in milliseconds.
    pub initial_delay_ms: u64,
    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
    /// Upper bound on any single delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay_ms: settings.initial_delay_ms,
            backoff_factor: settings.backoff_factor,
            max_delay_ms: settings.max_delay_ms,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay schedule without jitter. Attempts are bounded by `run`, not by elapsed time.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.initial_delay_ms))
            .with_multiplier(self.backoff_factor)
            .with_max_interval(Duration::from_millis(self.max_delay_ms))
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Run `op` until it succeeds, fails permanently or attempts run out.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts;
        let attempt = AtomicU32::new(0);

        backoff::future::retry_notify(
            self.backoff(),
            || {
                let current = attempt.fetch_add(1, Ordering::SeqCst) + 1;
                let fut = op();
                async move {
                    fut.await.map_err(|e| {
                        if e.is_transient() && current < max_attempts {
                            backoff::Error::transient(e)
                        } else {
                            backoff::Error::permanent(e)
                        }
                    })
                }
            },
            |e: TubesageError, delay: Duration| {
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt.load(Ordering::SeqCst),
                    max_attempts,
                    e,
                    delay
                );
            },
        )
        .await
    }
}
