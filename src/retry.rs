//! Retry logic with exponential backoff
//!
//! Fetches that fail with a transient error are retried with exponential
//! backoff and optional jitter. Permanent errors are returned immediately.
//! Waiting between attempts is abandoned as soon as the batch is cancelled.
//!
//! # Example
//!
//! ```no_run
//! use attachment_dl::retry::{IsRetryable, fetch_with_retry};
//! use attachment_dl::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Busy,
//!     Gone,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Busy)
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let token = CancellationToken::new();
//! let bytes = fetch_with_retry(&config, &token, || async {
//!     Ok::<_, MyError>(vec![1u8, 2, 3])
//! })
//! .await;
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{AttachmentError, FetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, rate limits, connection resets) return `true`.
/// Permanent failures (attachment deleted, access denied) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Why [`fetch_with_retry`] gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    Exhausted {
        /// Total attempts made (first try plus retries)
        attempts: u32,
        /// The error from the final attempt
        last: E,
    },
    /// An attempt failed with a non-retryable error
    Permanent {
        /// Attempts made up to and including the failing one
        attempts: u32,
        /// The non-retryable error
        error: E,
    },
    /// Cancellation was observed while waiting to retry
    Cancelled {
        /// Attempts made before cancellation
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::Permanent { attempts, .. }
            | RetryError::Cancelled { attempts } => *attempts,
        }
    }
}

impl From<RetryError<FetchError>> for AttachmentError {
    fn from(err: RetryError<FetchError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => AttachmentError::TransientFetch {
                attempts,
                reason: last.reason().to_string(),
            },
            RetryError::Permanent { error, .. } => AttachmentError::PermanentFetch {
                reason: error.reason().to_string(),
            },
            RetryError::Cancelled { .. } => AttachmentError::Cancelled,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// The operation is attempted at most `config.max_retries + 1` times. The
/// delay starts at `initial_delay`, is multiplied by `backoff_multiplier`
/// after each retry and capped at `max_delay`. With `jitter` enabled each
/// sleep is stretched by a random factor in `[1.0, 2.0]`.
///
/// If `cancel_token` fires during a backoff sleep the wait is abandoned and
/// [`RetryError::Cancelled`] is returned; an attempt already running is never
/// interrupted.
pub async fn fetch_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    cancel_token: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt: u32 = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Fetch succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis(),
                    "Fetch failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::debug!(attempts = attempt, "Retry wait abandoned on cancellation");
                        return Err(RetryError::Cancelled { attempts: attempt });
                    }
                    _ = tokio::time::sleep(jittered_delay) => {}
                }

                delay = next_delay(delay, config);
            }
            Err(e) => {
                let attempts = attempt + 1;
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts,
                        "Fetch failed after all retry attempts exhausted"
                    );
                    return Err(RetryError::Exhausted { attempts, last: e });
                }
                tracing::error!(error = %e, "Fetch failed with non-retryable error");
                return Err(RetryError::Permanent { attempts, error: e });
            }
        }
    }
}

/// Multiply `delay` by the backoff multiplier, capped at `max_delay`
///
/// A product too large to represent is treated as the cap.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .map_or(config.max_delay, |next| next.min(config.max_delay))
}

/// Stretch a delay by a random factor in `[1.0, 2.0]`, saturating at `Duration::MAX`
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let extra = Duration::try_from_secs_f64(delay.as_secs_f64() * jitter_factor).unwrap_or(delay);
    delay.saturating_add(extra)
}
