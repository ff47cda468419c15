//! Retry logic with exponential backoff

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use tokio::time::{Instant, sleep, timeout};
use tracing::debug;

use crate::Error;

/// Upper bound on attempts regardless of the wait budget
const MAX_ATTEMPTS: usize = 16;

/// Retry policy: exponential backoff bounded by a total wait budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    /// Delay before the first retry; later delays double from here
    pub min_delay: Duration,
    /// Maximum total time spent on an operation, attempts and backoff included
    pub give_up_after: Duration,
}

impl RetryPolicy {
    /// Default base delay for pre-authorized transports (`retry.max_delay`)
    pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(500);
    /// Default wait budget for pre-authorized transports (`retry.give_up_after`)
    pub const DEFAULT_GIVE_UP_AFTER: Duration = Duration::from_secs(1);

    /// Fully configurable profile
    #[must_use]
    pub fn new(min_delay: Duration, give_up_after: Duration) -> Self {
        Self {
            min_delay,
            give_up_after,
        }
    }

    /// Fixed profile for transports that tolerate only small extra latency
    #[must_use]
    pub fn latency_tolerance_small() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(1))
    }

    /// Backoff delays, in order, that fit inside the wait budget
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.give_up_after)
            .with_factor(2.0)
            .with_max_times(MAX_ATTEMPTS - 1)
            .build();

        let mut waited = Duration::ZERO;
        let mut delays = Vec::new();
        for delay in backoff {
            waited += delay;
            if waited > self.give_up_after {
                break;
            }
            delays.push(delay);
        }
        delays
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_DELAY, Self::DEFAULT_GIVE_UP_AFTER)
    }
}

/// Execute a future with retry logic
///
/// Only errors for which [`Error::is_retryable`] holds are retried. The
/// policy's `give_up_after` is a deadline measured from the first attempt:
/// each attempt is cut off at the remaining budget, and no retry is
/// scheduled whose backoff would end past the deadline. A zero budget
/// allows exactly one attempt, bounded only by the client timeout.
///
/// # Errors
///
/// Returns the last error from `f` if the wait budget is exhausted or
/// the error is not retryable.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, name: &str, mut f: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let deadline = Instant::now() + policy.give_up_after;
    let mut delays = policy.delays().into_iter();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let remaining = deadline.saturating_duration_since(Instant::now());
        let result = if remaining.is_zero() {
            f().await
        } else {
            timeout(remaining, f()).await.unwrap_or_else(|_| {
                Err(Error::Transport(format!(
                    "attempt cut off after {}ms, retry budget spent",
                    remaining.as_millis()
                )))
            })
        };

        match result {
            Ok(result) => return Ok(result),
            Err(e) => {
                // Don't retry certain errors
                if !e.is_retryable() {
                    return Err(e);
                }

                match delays.next() {
                    Some(duration) if Instant::now() + duration < deadline => {
                        debug!(
                            operation = name,
                            attempt = attempts,
                            delay_ms = duration.as_millis(),
                            error = %e,
                            "Retrying after backoff"
                        );
                        sleep(duration).await;
                    }
                    _ => {
                        debug!(
                            operation = name,
                            attempts = attempts,
                            "Retry budget exhausted"
                        );
                        return Err(e);
                    }
                }
            }
        }
    }
}
