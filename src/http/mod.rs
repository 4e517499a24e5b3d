//! Minimal HTTP/1.1 client stack for mirror APIs.

pub mod fetcher;
pub mod retry;
pub mod socket;

// Re-exports for convenience
pub use fetcher::{FetcherConfig, HttpFetcher, DEFAULT_USER_AGENT};
pub use retry::{with_retry, RetryConfig, RetryReason};
pub use socket::SocketType;
