//! Retry logic with backoff
//!
//! Wraps one unit of work (fetch + extract for one package) in a bounded loop.
//! With the default [`RetryConfig`] the delay between attempts is a fixed interval;
//! a multiplier above 1.0 turns it into capped exponential backoff, and optional
//! jitter spreads retries from concurrent workers apart.
//!
//! # Example
//!
//! ```no_run
//! use nupkg_restore::config::RetryConfig;
//! use nupkg_restore::retry::{IsRetryable, retry_with_backoff};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! struct Flaky;
//!
//! impl std::fmt::Display for Flaky {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "flaky")
//!     }
//! }
//!
//! impl IsRetryable for Flaky {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let result = retry_with_backoff(
//!     &config,
//!     &cancel,
//!     |_attempt| async { Ok::<_, Flaky>(()) },
//!     |err, attempt| eprintln!("attempt {attempt} failed: {err}"),
//! )
//! .await;
//! assert!(result.is_ok());
//! # }
//! ```

use crate::config::RetryConfig;
use crate::types::FailureReason;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FailureReason {
    fn is_retryable(&self) -> bool {
        // Timeouts, bad statuses and signature failures are all retried
        !matches!(self, FailureReason::Cancelled)
    }
}

/// Successful result of a retried operation
#[derive(Debug)]
pub struct Retried<T> {
    /// Value produced by the successful attempt
    pub value: T,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// Terminal failure of a retried operation
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Error from the last attempt
    pub error: E,
    /// Attempts made
    pub attempts: u32,
    /// True when cancellation interrupted the backoff wait
    pub cancelled: bool,
}

/// Execute an async operation up to `config.max_attempts` times
///
/// `operation` receives the 1-based attempt number. `on_attempt_failed` runs for every
/// failed attempt before any backoff, so callers can report failures as they happen.
/// Non-retryable errors end the loop immediately. Cancellation during a backoff wait
/// ends the loop with `cancelled` set.
pub async fn retry_with_backoff<F, Fut, T, E, N>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
    mut on_attempt_failed: N,
) -> Result<Retried<T>, RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    N: FnMut(&E, u32),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) => {
                on_attempt_failed(&e, attempt);

                if !e.is_retryable() {
                    tracing::debug!(error = %e, attempt, "Operation failed with non-retryable error");
                    return Err(RetryFailure {
                        error: e,
                        attempts: attempt,
                        cancelled: false,
                    });
                }

                if attempt >= max_attempts {
                    tracing::warn!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                    return Err(RetryFailure {
                        error: e,
                        attempts: attempt,
                        cancelled: false,
                    });
                }

                let delay = backoff_delay(config, attempt);
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );

                if !sleep_or_cancel(delay, cancel).await {
                    return Err(RetryFailure {
                        error: e,
                        attempts: attempt,
                        cancelled: true,
                    });
                }
            }
        }
    }
}

/// Delay to wait after the given failed attempt (1-based)
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let scaled = config.backoff.as_secs_f64() * config.backoff_multiplier.max(1.0).powi(exponent);
    let capped = Duration::from_secs_f64(scaled.min(config.max_backoff.as_secs_f64()));

    if config.jitter { add_jitter(capped) } else { capped }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

/// Sleep for `delay` unless cancelled first; returns false on cancellation
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
