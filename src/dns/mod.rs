//! DNS Resolution Module
//!
//! Provides pluggable DNS resolution with support for:
//! - System resolver (getaddrinfo via thread pool)
//! - DNS-over-HTTPS through fixed providers (hickory-dns)
//! - Hosts-file style overrides with dot-boundary suffix matching
//!
//! # Architecture
//!
//! The `Resolve` trait is the core abstraction. [`DnsOverrideResolver`]
//! chains the other resolvers: override table, then DoH for allow-listed
//! domains, then the system resolver. Its configuration is an immutable
//! snapshot swapped atomically when settings change.
//!
//! # Example
//!
//! ```rust,ignore
//! use mirrornet::dns::{DnsOverrideConfig, DnsOverrideResolver};
//!
//! let resolver = DnsOverrideResolver::with_config(DnsOverrideConfig::default());
//! let addrs = resolver.lookup("www.dlsite.com").await?;
//! ```

mod doh;
mod gai;
mod hosts;
mod overrides;
mod resolve;

pub use doh::{should_use_doh, DohProvider, DohResolver, CLOUDFLARE, DEFAULT_DOH_SUFFIXES, GOOGLE};
pub use gai::GaiResolver;
pub use hosts::{HostOverrideEntry, HostOverrideTable, DEFAULT_HOSTS_TEXT};
pub(crate) use hosts::is_dot_suffix;
pub use overrides::{DnsOverrideConfig, DnsOverrideResolver, ResolveSource};
pub use resolve::{addrs_from_ips, sort_by_family, Addrs, Name, Resolve, Resolving};
