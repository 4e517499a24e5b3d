//! Network context - wires the whole stack together.
//!
//! Bundles the settings store, override resolver, SNI bypass manager, HTTP
//! fetcher, mirror adapters and failover orchestrator, and owns the settings
//! listener task that keeps their snapshots current.

use crate::base::neterror::NetError;
use crate::crawler::{CrawlerOrchestrator, MirrorSet, MirrorSite};
use crate::dns::{DnsOverrideConfig, DnsOverrideResolver, DohResolver, GaiResolver, Resolve};
use crate::http::{FetcherConfig, HttpFetcher};
use crate::settings::{spawn_settings_listener, SettingsStore, SnapshotTargets};
use crate::sni::{SniBypassConfig, SniBypassManager};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::atomic::AtomicI32;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Configuration options for [`NetworkContext`].
#[derive(Clone, Default)]
pub struct NetworkContextConfig {
    /// HTTP client knobs.
    pub fetcher: FetcherConfig,

    /// Last-resort resolver (None = getaddrinfo).
    pub system_resolver: Option<Arc<dyn Resolve>>,

    /// DoH stage (None = built-in Cloudflare/Google providers).
    pub doh_resolver: Option<Arc<dyn Resolve>>,

    /// Per-site API base overrides.
    pub mirror_base_urls: HashMap<MirrorSite, String>,
}

impl std::fmt::Debug for NetworkContextConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkContextConfig")
            .field("fetcher", &self.fetcher)
            .field("system_resolver", &self.system_resolver.is_some())
            .field("doh_resolver", &self.doh_resolver.is_some())
            .field("mirror_base_urls", &self.mirror_base_urls)
            .finish()
    }
}

/// The assembled network core.
///
/// Must be created inside a tokio runtime. Dropping the context stops the
/// settings listener.
#[derive(Debug)]
pub struct NetworkContext {
    settings: Arc<SettingsStore>,
    resolver: DnsOverrideResolver,
    sni: SniBypassManager,
    fetcher: HttpFetcher,
    orchestrator: CrawlerOrchestrator,
    listener: JoinHandle<()>,
}

impl NetworkContext {
    /// Builds the stack with default configuration.
    pub fn new(settings: Arc<SettingsStore>) -> Result<Self, NetError> {
        Self::with_config(settings, NetworkContextConfig::default())
    }

    /// Builds the stack and starts the settings listener.
    pub fn with_config(
        settings: Arc<SettingsStore>,
        config: NetworkContextConfig,
    ) -> Result<Self, NetError> {
        let current = settings.current();

        let dns = Arc::new(ArcSwap::from_pointee(DnsOverrideConfig::from_settings(&current)));
        let system = config
            .system_resolver
            .unwrap_or_else(|| Arc::new(GaiResolver::new()));
        let doh = config
            .doh_resolver
            .unwrap_or_else(|| Arc::new(DohResolver::new()));
        let resolver = DnsOverrideResolver::new(Arc::clone(&dns), doh, system);

        let sni = SniBypassManager::new(SniBypassConfig::from_settings(&current));
        let fetcher = HttpFetcher::new(Arc::new(resolver.clone()), sni.clone(), config.fetcher);

        let mirrors = MirrorSet::over_http_with_bases(&fetcher, &config.mirror_base_urls)?;

        let preferred_site = Arc::new(AtomicI32::new(current.asmr_one_site));
        let orchestrator = CrawlerOrchestrator::new(mirrors, Arc::clone(&preferred_site));

        let listener = spawn_settings_listener(
            settings.subscribe(),
            SnapshotTargets {
                dns,
                sni: sni.config_handle(),
                preferred_site,
            },
        );

        tracing::debug!(site = current.asmr_one_site, "network context started");

        Ok(Self {
            settings,
            resolver,
            sni,
            fetcher,
            orchestrator,
            listener,
        })
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn resolver(&self) -> &DnsOverrideResolver {
        &self.resolver
    }

    pub fn sni(&self) -> &SniBypassManager {
        &self.sni
    }

    pub fn fetcher(&self) -> &HttpFetcher {
        &self.fetcher
    }

    pub fn crawler(&self) -> &CrawlerOrchestrator {
        &self.orchestrator
    }
}

impl Drop for NetworkContext {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
