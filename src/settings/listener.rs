//! The single background task that publishes configuration snapshots.

use super::Settings;
use crate::dns::DnsOverrideConfig;
use crate::sni::SniBypassConfig;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Destinations the listener swaps new snapshots into.
#[derive(Debug, Clone)]
pub struct SnapshotTargets {
    pub dns: Arc<ArcSwap<DnsOverrideConfig>>,
    pub sni: Arc<ArcSwap<SniBypassConfig>>,
    pub preferred_site: Arc<AtomicI32>,
}

/// Rebuilds every snapshot from `settings` and swaps them in.
pub fn apply_settings(settings: &Settings, targets: &SnapshotTargets) {
    let dns = DnsOverrideConfig::from_settings(settings);
    let sni = SniBypassConfig::from_settings(settings);

    tracing::debug!(
        dns_override = dns.override_enabled,
        dns_doh = dns.doh_enabled,
        override_hosts = dns.table.len(),
        sni_enabled = sni.enabled,
        sni_rules = sni.rules.len(),
        site = settings.asmr_one_site,
        "publishing settings snapshots"
    );

    targets.dns.store(Arc::new(dns));
    targets.sni.store(Arc::new(sni));
    targets
        .preferred_site
        .store(settings.asmr_one_site, Ordering::Release);
}

/// Spawns the listener task.
///
/// The current value is applied immediately; afterwards every published
/// change is applied in order. The task ends when the store is dropped.
pub fn spawn_settings_listener(
    mut rx: watch::Receiver<Arc<Settings>>,
    targets: SnapshotTargets,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let initial = rx.borrow_and_update().clone();
        apply_settings(&initial, &targets);

        while rx.changed().await.is_ok() {
            let settings = rx.borrow_and_update().clone();
            apply_settings(&settings, &targets);
        }
        tracing::debug!("settings channel closed, listener exiting");
    })
}
