use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::coordinator::AbortSignal;
use crate::errors::StreamError;

/// Bounded retry with exponential backoff around a whole streaming attempt.
///
/// Cancellation is never retried. The pause between attempts is raced
/// against the abort signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause before the first retry.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Multiplier applied to the pause after each failed attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound for any single pause.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_delay_ms() -> u64 {
    1_000
}

const fn default_backoff_factor() -> f64 {
    2.0
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn exponential(max_attempts: u32, initial_delay_ms: u64, backoff_factor: f64) -> Self {
        let factor = if backoff_factor <= 0.0 {
            default_backoff_factor()
        } else {
            backoff_factor
        };
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay_ms,
            backoff_factor: factor,
            max_delay_ms: default_max_delay_ms(),
        }
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms.max(1);
        self
    }

    /// Whether another attempt is allowed after `attempts_done` attempts.
    pub fn can_retry(&self, attempts_done: u32) -> bool {
        attempts_done < self.max_attempts.max(1)
    }

    /// Pause before retry number `retries_done + 1`.
    pub fn backoff_duration(&self, retries_done: u32) -> Duration {
        let exp = self.backoff_factor.powi(retries_done as i32);
        let base = (self.initial_delay_ms as f64 * exp).round() as u64;
        Duration::from_millis(base.min(self.max_delay_ms.max(1)))
    }

    /// Runs `attempt` until it succeeds, is cancelled, or attempts run out.
    ///
    /// `attempt` receives the shared state and the 1-based attempt number.
    pub async fn run<S, T, F>(
        &self,
        abort: &mut AbortSignal,
        state: &mut S,
        mut attempt: F,
    ) -> Result<T, StreamError>
    where
        F: FnMut(&mut S, u32) -> BoxFuture<'_, Result<T, StreamError>>,
    {
        let mut attempts_done = 0u32;
        loop {
            if abort.is_aborted() {
                return Err(StreamError::Cancelled);
            }
            let number = attempts_done + 1;
            let err = match attempt(state, number).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempts_done = number;
            if err.is_cancelled() {
                debug!(
                    event = "stream.attempt_cancelled",
                    domain = "retry",
                    attempt = number
                );
                return Err(err);
            }
            if !self.can_retry(attempts_done) {
                debug!(
                    event = "stream.retry_exhausted",
                    domain = "retry",
                    code = err.code(),
                    attempt = number,
                    error = %err
                );
                return Err(err);
            }
            let backoff = self.backoff_duration(attempts_done - 1);
            info!(
                event = "stream.retry_scheduled",
                domain = "retry",
                code = err.code(),
                attempt = number,
                next_attempt = number + 1,
                backoff_ms = backoff.as_millis() as u64,
                error = %err
            );
            tokio::select! {
                biased;
                _ = abort.cancelled() => return Err(StreamError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}
