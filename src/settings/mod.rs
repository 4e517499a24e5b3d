//! Persisted settings and the reactive snapshot pipeline.
//!
//! [`Settings`] is the flat key/value record the application persists. Every
//! field has a default, so a missing or partially written file still loads.
//! [`SettingsStore`] owns the current value and publishes each change on a
//! watch channel; [`spawn_settings_listener`] is the single task that turns
//! those changes into immutable DNS/SNI/site snapshots.

mod listener;
mod store;

pub use listener::{apply_settings, spawn_settings_listener, SnapshotTargets};
pub use store::SettingsStore;

use crate::base::neterror::NetError;
use serde::{Deserialize, Serialize};

/// Default preferred mirror site code.
pub const DEFAULT_SITE: i32 = 200;

fn default_true() -> bool {
    true
}

fn default_site() -> i32 {
    DEFAULT_SITE
}

/// Persisted application settings relevant to the network core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Consult the hosts override table.
    pub dns_bypass_enabled: bool,
    /// Use DoH for allow-listed domains.
    #[serde(default = "default_true")]
    pub dns_doh_enabled: bool,
    /// Hosts-file style override text; blank selects the built-in table.
    pub dns_bypass_hosts_text: String,

    pub sni_bypass_enabled: bool,
    /// Legacy single proxy URL. Implies a custom source when no source is stored.
    pub sni_bypass_proxy_base_url: String,
    /// `0` built-in, `1` custom.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sni_bypass_proxy_source: Option<i32>,
    pub sni_bypass_proxy_custom_base_url: String,
    /// Proxy entry point used for the built-in source.
    pub sni_builtin_proxy_base_url: String,
    /// `0` HostHeader, `1` PathEncoded.
    pub sni_bypass_mode: i32,
    /// JSON array of `{"pattern": ..., "enabled": ...}`.
    pub sni_bypass_rules_json: String,

    /// Preferred mirror site code (100, 200 or 300).
    #[serde(default = "default_site")]
    pub asmr_one_site: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dns_bypass_enabled: false,
            dns_doh_enabled: true,
            dns_bypass_hosts_text: String::new(),
            sni_bypass_enabled: false,
            sni_bypass_proxy_base_url: String::new(),
            sni_bypass_proxy_source: None,
            sni_bypass_proxy_custom_base_url: String::new(),
            sni_builtin_proxy_base_url: String::new(),
            sni_bypass_mode: 0,
            sni_bypass_rules_json: String::new(),
            asmr_one_site: DEFAULT_SITE,
        }
    }
}

impl Settings {
    /// Parses settings from a JSON string. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json).map_err(|e| NetError::SettingsParse {
            message: e.to_string(),
        })
    }

    /// Serializes settings as pretty JSON.
    pub fn to_json_string(&self) -> Result<String, NetError> {
        serde_json::to_string_pretty(self).map_err(|e| NetError::SettingsParse {
            message: e.to_string(),
        })
    }
}
