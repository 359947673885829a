//! Resilient remote reads.
//!
//! Wraps a single read with bounded retry and exponential backoff:
//! - rate-limited errors are retried, delay doubling each attempt
//! - not-found errors are returned immediately (the account may simply not exist yet)
//! - anything else propagates immediately, unknown failures are never retried blindly
//!
//! This is the only layer that retries. Callers treat every `FetchError` as
//! terminal for the current attempt and rely on their next poll tick.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_INITIAL_DELAY_MS: u64 = 2000;

/// How a failed read should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The transport signalled too-many-requests.
    RateLimited,
    /// The queried entity does not exist (yet, or anymore).
    NotFound,
    /// Anything unclassified.
    Other,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::RateLimited => write!(f, "rate_limited"),
            ErrorClass::NotFound => write!(f, "not_found"),
            ErrorClass::Other => write!(f, "other"),
        }
    }
}

/// Errors that know their own retry class.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

/// Classify a raw transport message.
///
/// RPC nodes are inconsistent about status codes, so the message text is the
/// most reliable signal we get.
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();
    if lower.contains("account does not exist") || lower.contains("could not find account") {
        return ErrorClass::NotFound;
    }
    if lower.contains("429") || lower.contains("too many requests") {
        return ErrorClass::RateLimited;
    }
    ErrorClass::Other
}

/// Terminal outcome of a resilient read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("still rate limited after {attempts} attempts: {message}")]
    TransientFailure { attempts: u32, message: String },
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

/// Retry budget for rate-limited reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Run `op` until it succeeds, fails terminally, or the rate-limit budget runs out.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, FetchError>
where
    E: Classify + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retry = 0u32;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        match err.class() {
            ErrorClass::NotFound => return Err(FetchError::NotFound(err.to_string())),
            ErrorClass::Other => return Err(FetchError::Other(err.to_string())),
            ErrorClass::RateLimited if retry < policy.max_retries => {
                let delay = policy.delay_for(retry);
                warn!(
                    delay_ms = delay.as_millis() as u64,
                    retries_left = policy.max_retries - retry,
                    "rate limit hit, backing off"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            ErrorClass::RateLimited => {
                return Err(FetchError::TransientFailure {
                    attempts: retry + 1,
                    message: err.to_string(),
                });
            }
        }
    }
}
