//! DNS-over-HTTPS providers backed by hickory-dns.
//!
//! Two fixed providers (Cloudflare, then Google) are reached through fixed
//! bootstrap IP literals, so looking them up never depends on the local,
//! possibly poisoned, resolver. Providers are queried in order and the first
//! non-empty answer wins; a failing provider just hands over to the next one.

use super::hosts::is_dot_suffix;
use super::{addrs_from_ips, Name, Resolve, Resolving};
use crate::base::neterror::NetError;
use hickory_resolver::{
    config::{LookupIpStrategy, NameServerConfigGroup, ResolverConfig},
    name_server::TokioConnectionProvider,
    TokioResolver,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;

/// Domains whose lookups are allowed to go through DoH.
pub const DEFAULT_DOH_SUFFIXES: &[&str] = &["dlsite.com", "chobit.cc"];

/// Whether `host` (lowercased) falls under the DoH allow-list.
pub fn should_use_doh(host: &str) -> bool {
    DEFAULT_DOH_SUFFIXES
        .iter()
        .any(|suffix| is_dot_suffix(host, suffix))
}

/// A fixed DoH endpoint.
#[derive(Debug, Clone, Copy)]
pub struct DohProvider {
    /// Label used in logs.
    pub name: &'static str,
    /// TLS server name of the endpoint (`/dns-query` on port 443).
    pub tls_dns_name: &'static str,
    /// Addresses used to reach the endpoint without a prior lookup.
    pub bootstrap: &'static [IpAddr],
}

pub const CLOUDFLARE: DohProvider = DohProvider {
    name: "cloudflare",
    tls_dns_name: "cloudflare-dns.com",
    bootstrap: &[
        IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
        IpAddr::V4(Ipv4Addr::new(1, 0, 0, 1)),
    ],
};

pub const GOOGLE: DohProvider = DohProvider {
    name: "google",
    tls_dns_name: "dns.google",
    bootstrap: &[
        IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
        IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)),
    ],
};

impl DohProvider {
    fn build_resolver(&self) -> TokioResolver {
        let group = NameServerConfigGroup::from_ips_https(
            self.bootstrap,
            443,
            self.tls_dns_name.to_string(),
            true,
        );
        let config = ResolverConfig::from_parts(None, vec![], group);
        let mut builder =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default());
        builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        builder.build()
    }
}

struct ProviderHandle {
    name: &'static str,
    resolver: TokioResolver,
}

/// Built once per process and shared read-only across lookups.
static PROVIDERS: LazyLock<Vec<ProviderHandle>> = LazyLock::new(|| {
    [CLOUDFLARE, GOOGLE]
        .iter()
        .map(|p| {
            tracing::debug!(provider = p.name, "initializing DoH provider");
            ProviderHandle {
                name: p.name,
                resolver: p.build_resolver(),
            }
        })
        .collect()
});

/// Resolver that walks the fixed DoH providers in order.
///
/// Resolution fails with [`NetError::NameResolutionFailed`] only when every
/// provider failed or returned nothing; the override chain treats that as
/// "fall through to the system resolver".
#[derive(Debug, Clone, Copy, Default)]
pub struct DohResolver;

impl DohResolver {
    pub fn new() -> Self {
        Self
    }

    /// Queries each provider in order; first non-empty answer wins.
    pub async fn lookup(&self, host: &str) -> Option<Vec<IpAddr>> {
        for provider in PROVIDERS.iter() {
            match provider.resolver.lookup_ip(host).await {
                Ok(lookup) => {
                    let ips: Vec<IpAddr> = lookup.iter().collect();
                    if !ips.is_empty() {
                        tracing::debug!(
                            host = %host,
                            provider = provider.name,
                            count = ips.len(),
                            "resolved via DoH"
                        );
                        return Some(ips);
                    }
                }
                Err(e) => {
                    tracing::debug!(host = %host, provider = provider.name, error = %e, "DoH lookup failed");
                }
            }
        }
        None
    }
}

impl Resolve for DohResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = *self;
        Box::pin(async move {
            match resolver.lookup(name.as_str()).await {
                Some(ips) => Ok(addrs_from_ips(ips)),
                None => Err(NetError::NameResolutionFailed),
            }
        })
    }
}
