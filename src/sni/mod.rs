//! SNI bypass: routing selected hosts through a proxy entry point.
//!
//! The real destination is carried either in the `Host` header or as the
//! first path segment, so the TLS handshake only ever names the proxy.
//!
//! - [`matches_any`]: dot-boundary domain rules
//! - [`rewrite`]: the pure URL transformation
//! - [`SniBypassManager`]: applies the active [`SniBypassConfig`] snapshot

mod config;
mod manager;
mod matcher;
mod rewrite;

pub use config::{decode_rules, default_rules, ProxySource, SniBypassConfig, DEFAULT_RULE_PATTERNS};
pub use manager::{PreviewFailure, SniBypassManager, SniBypassPreview};
pub use matcher::{matches_any, BypassRule};
pub use rewrite::{normalize_proxy_base_url, parse_http_url, rewrite, SniBypassMode};
