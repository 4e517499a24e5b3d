//! Layered override resolver.
//!
//! Resolution order, stopping at the first non-empty answer:
//!
//! 1. exact match in the hosts override table
//! 2. dot-boundary suffix match in the same table (table order)
//! 3. DNS-over-HTTPS, for hosts on the DoH allow-list
//! 4. the system resolver
//!
//! Every answer is reordered IPv4-first before it is returned. The active
//! configuration is an immutable [`DnsOverrideConfig`] snapshot behind an
//! [`ArcSwap`]; each lookup loads it exactly once.

use super::doh::{should_use_doh, DohResolver};
use super::hosts::HostOverrideTable;
use super::{addrs_from_ips, sort_by_family, GaiResolver, Name, Resolve, Resolving};
use crate::base::neterror::NetError;
use crate::settings::Settings;
use arc_swap::ArcSwap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Immutable DNS override snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsOverrideConfig {
    /// Consult the hosts override table.
    pub override_enabled: bool,
    /// Consult DoH providers for allow-listed domains.
    pub doh_enabled: bool,
    pub table: HostOverrideTable,
}

impl Default for DnsOverrideConfig {
    fn default() -> Self {
        Self {
            override_enabled: false,
            doh_enabled: true,
            table: HostOverrideTable::parse_or_default(""),
        }
    }
}

impl DnsOverrideConfig {
    /// Builds a snapshot from persisted settings. Blank hosts text selects
    /// the built-in table.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            override_enabled: settings.dns_bypass_enabled,
            doh_enabled: settings.dns_doh_enabled,
            table: HostOverrideTable::parse_or_default(&settings.dns_bypass_hosts_text),
        }
    }
}

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveSource {
    Exact,
    Suffix,
    Doh,
    System,
}

/// DNS resolver implementing the override chain.
#[derive(Clone)]
pub struct DnsOverrideResolver {
    config: Arc<ArcSwap<DnsOverrideConfig>>,
    doh: Arc<dyn Resolve>,
    system: Arc<dyn Resolve>,
}

impl DnsOverrideResolver {
    /// Creates a resolver with explicit DoH and system stages.
    pub fn new(
        config: Arc<ArcSwap<DnsOverrideConfig>>,
        doh: Arc<dyn Resolve>,
        system: Arc<dyn Resolve>,
    ) -> Self {
        Self {
            config,
            doh,
            system,
        }
    }

    /// Creates a resolver using the built-in DoH providers and `getaddrinfo`.
    pub fn with_config(config: DnsOverrideConfig) -> Self {
        Self::new(
            Arc::new(ArcSwap::from_pointee(config)),
            Arc::new(DohResolver::new()),
            Arc::new(GaiResolver::new()),
        )
    }

    /// Shared handle the settings listener publishes into.
    pub fn config_handle(&self) -> Arc<ArcSwap<DnsOverrideConfig>> {
        Arc::clone(&self.config)
    }

    /// Replaces the active snapshot.
    pub fn store(&self, config: DnsOverrideConfig) {
        self.config.store(Arc::new(config));
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<DnsOverrideConfig> {
        self.config.load_full()
    }

    /// Resolves `hostname` through the override chain.
    ///
    /// Only a failure of the system resolver is returned as an error.
    pub async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, NetError> {
        self.lookup_with_source(hostname)
            .await
            .map(|(addrs, _)| addrs)
    }

    /// Like [`lookup`](Self::lookup), also reporting which stage answered.
    pub async fn lookup_with_source(
        &self,
        hostname: &str,
    ) -> Result<(Vec<IpAddr>, ResolveSource), NetError> {
        let cfg = self.config.load_full();
        let name = Name::new(hostname);
        let host = name.normalized();

        if cfg.override_enabled {
            if let Some(addrs) = cfg.table.get(&host).filter(|a| !a.is_empty()) {
                tracing::debug!(host = %host, count = addrs.len(), "resolved via override table");
                return Ok((sort_by_family(addrs.to_vec()), ResolveSource::Exact));
            }
            if let Some(addrs) = cfg.table.suffix_match(&host).filter(|a| !a.is_empty()) {
                tracing::debug!(host = %host, count = addrs.len(), "resolved via override suffix");
                return Ok((sort_by_family(addrs.to_vec()), ResolveSource::Suffix));
            }
        }

        if cfg.doh_enabled && should_use_doh(&host) {
            match self.doh.resolve(name.clone()).await {
                Ok(addrs) => {
                    let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
                    if !ips.is_empty() {
                        return Ok((sort_by_family(ips), ResolveSource::Doh));
                    }
                }
                Err(e) => {
                    tracing::debug!(host = %host, error = %e, "DoH stage failed, using system resolver");
                }
            }
        }

        let addrs = self.system.resolve(name).await?;
        let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
        Ok((sort_by_family(ips), ResolveSource::System))
    }
}

impl Resolve for DnsOverrideResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let ips = resolver.lookup(name.as_str()).await?;
            Ok(addrs_from_ips(ips))
        })
    }
}

impl fmt::Debug for DnsOverrideResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cfg = self.config.load();
        f.debug_struct("DnsOverrideResolver")
            .field("override_enabled", &cfg.override_enabled)
            .field("doh_enabled", &cfg.doh_enabled)
            .field("override_count", &cfg.table.len())
            .finish_non_exhaustive()
    }
}
