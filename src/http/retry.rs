//! Retry logic with exponential backoff.
//!
//! Used by primary-only lookups and existence checks, which repeat a failed
//! mirror call once after a short pause before treating the mirror as
//! unreachable.

use crate::base::neterror::NetError;
use std::future::Future;
use std::time::Duration;

/// Reasons a failed request is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// Server closed connection unexpectedly
    ConnectionReset,
    /// Connection was closed during request
    ConnectionClosed,
    /// Could not establish the connection
    ConnectionFailed,
    /// Empty response received
    EmptyResponse,
    /// Request exceeded the client timeout
    HttpRequestTimeout,
    /// Name resolution failed
    NameNotResolved,
    /// 5xx from the mirror
    ServerError,
}

impl RetryReason {
    /// Map a NetError to a RetryReason, if the error is retryable.
    pub fn from_error(error: &NetError) -> Option<Self> {
        match error {
            NetError::ConnectionReset => Some(Self::ConnectionReset),
            NetError::ConnectionClosed => Some(Self::ConnectionClosed),
            NetError::ConnectionFailed
            | NetError::ConnectionRefused
            | NetError::ConnectionFailedTo { .. } => Some(Self::ConnectionFailed),
            NetError::EmptyResponse => Some(Self::EmptyResponse),
            NetError::ConnectionTimedOut => Some(Self::HttpRequestTimeout),
            e if e.is_dns_error() => Some(Self::NameNotResolved),
            NetError::HttpStatus { status, .. } if *status >= 500 => Some(Self::ServerError),
            _ => None,
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call (default: 3)
    pub max_attempts: usize,
    /// Base delay for exponential backoff in milliseconds (default: 100)
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds (default: 5000)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) to randomize delays (default: 0.1)
    pub jitter_factor: f64,
    /// Retry every error, not only the ones [`RetryReason`] recognizes.
    pub retry_all_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
            retry_all_errors: false,
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// One more attempt after 150ms, whatever the error.
    pub fn retry_once() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 150,
            max_delay_ms: 150,
            jitter_factor: 0.0,
            retry_all_errors: true,
        }
    }

    fn is_retryable(&self, error: &NetError) -> bool {
        self.retry_all_errors || RetryReason::from_error(error).is_some()
    }
}

/// Calculate backoff delay for a given attempt.
///
/// Uses exponential backoff: `base_delay * 2^(attempt-1)`
/// Capped at `max_delay_ms`.
pub fn calculate_backoff(attempt: usize, config: &RetryConfig) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let delay_ms = config
        .base_delay_ms
        .saturating_mul(1 << (attempt - 1).min(10));
    let capped_ms = delay_ms.min(config.max_delay_ms);

    let jitter_range = (capped_ms as f64 * config.jitter_factor) as u64;
    let jittered_ms = if jitter_range > 0 {
        // Deterministic jitter based on attempt number
        let jitter = (attempt as u64 * 7) % jitter_range;
        capped_ms.saturating_add(jitter)
    } else {
        capped_ms
    };

    Duration::from_millis(jittered_ms)
}

/// Check if we should retry based on attempt count.
pub fn should_retry(attempt: usize, config: &RetryConfig) -> bool {
    attempt < config.max_attempts
}

/// Runs `op` until it succeeds, the error is not retryable, or the attempt
/// budget is spent. Returns the last result.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, NetError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NetError>>,
{
    let mut retries = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if should_retry(retries, config) && config.is_retryable(&e) => {
                retries += 1;
                let delay = calculate_backoff(retries, config);
                tracing::debug!(attempt = retries, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
