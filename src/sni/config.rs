//! SNI bypass configuration snapshot and its decoding from settings.

use super::matcher::BypassRule;
use super::rewrite::SniBypassMode;
use crate::settings::Settings;

/// Domains routed through the bypass proxy when no rules are configured.
pub const DEFAULT_RULE_PATTERNS: &[&str] = &["dlsite.com", "chobit.cc", "byteair.volces.com"];

/// Built-in rule set.
pub fn default_rules() -> Vec<BypassRule> {
    DEFAULT_RULE_PATTERNS
        .iter()
        .map(|p| BypassRule::new(*p))
        .collect()
}

/// Where the proxy entry point comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxySource {
    #[default]
    BuiltIn,
    Custom,
}

impl ProxySource {
    pub fn code(self) -> i32 {
        match self {
            Self::BuiltIn => 0,
            Self::Custom => 1,
        }
    }

    /// Unknown codes map to [`ProxySource::BuiltIn`].
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Custom,
            _ => Self::BuiltIn,
        }
    }
}

/// Immutable SNI bypass snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniBypassConfig {
    pub enabled: bool,
    /// Raw proxy base; normalized lazily on each rewrite.
    pub proxy_base_url: String,
    pub mode: SniBypassMode,
    pub rules: Vec<BypassRule>,
}

impl Default for SniBypassConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            proxy_base_url: String::new(),
            mode: SniBypassMode::HostHeader,
            rules: default_rules(),
        }
    }
}

impl SniBypassConfig {
    /// Builds a snapshot from persisted settings.
    ///
    /// Never fails: malformed rules JSON and unknown codes fall back to defaults.
    pub fn from_settings(settings: &Settings) -> Self {
        let legacy = settings.sni_bypass_proxy_base_url.trim();
        let builtin = settings.sni_builtin_proxy_base_url.trim();

        let source = match settings.sni_bypass_proxy_source {
            Some(code) => ProxySource::from_code(code),
            None if !legacy.is_empty() => ProxySource::Custom,
            None => ProxySource::BuiltIn,
        };

        let custom = match settings.sni_bypass_proxy_custom_base_url.trim() {
            "" => legacy,
            url => url,
        };

        let proxy_base_url = match source {
            ProxySource::BuiltIn => builtin,
            ProxySource::Custom if custom.is_empty() => builtin,
            ProxySource::Custom => custom,
        };

        let rules = decode_rules(&settings.sni_bypass_rules_json);

        Self {
            enabled: settings.sni_bypass_enabled,
            proxy_base_url: proxy_base_url.to_string(),
            mode: SniBypassMode::from_code(settings.sni_bypass_mode),
            rules: if rules.is_empty() { default_rules() } else { rules },
        }
    }
}

/// Decodes a JSON rule array.
///
/// Patterns are trimmed and lowercased; blank patterns are dropped. Blank or
/// malformed input yields an empty list.
pub fn decode_rules(json: &str) -> Vec<BypassRule> {
    let clean = json.trim();
    if clean.is_empty() {
        return Vec::new();
    }

    let parsed: Vec<BypassRule> = match serde_json::from_str(clean) {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!(error = %e, "malformed SNI bypass rules, using defaults");
            return Vec::new();
        }
    };

    parsed
        .into_iter()
        .filter_map(|rule| {
            let pattern = rule.pattern.trim().to_lowercase();
            (!pattern.is_empty()).then(|| BypassRule::with_enabled(pattern, rule.enabled))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SniBypassConfig::from_settings(&Settings::default());
        assert!(!cfg.enabled);
        assert_eq!(cfg.mode, SniBypassMode::HostHeader);
        assert_eq!(cfg.rules, default_rules());
        assert_eq!(cfg.proxy_base_url, "");
    }

    #[test]
    fn test_decode_rules() {
        let rules = decode_rules(
            r#"[{"pattern":"  Example.COM ","enabled":true},{"pattern":"  ","enabled":true},{"pattern":"off.com","enabled":false}]"#,
        );
        assert_eq!(
            rules,
            vec![
                BypassRule::new("example.com"),
                BypassRule::with_enabled("off.com", false)
            ]
        );
    }

    #[test]
    fn test_malformed_rules_fall_back() {
        assert!(decode_rules("{oops").is_empty());
        assert!(decode_rules("").is_empty());

        let settings = Settings {
            sni_bypass_rules_json: "[{\"pattern\":\"\"}]".to_string(),
            ..Settings::default()
        };
        assert_eq!(SniBypassConfig::from_settings(&settings).rules, default_rules());
    }

    #[test]
    fn test_legacy_url_implies_custom() {
        let settings = Settings {
            sni_bypass_proxy_base_url: "https://legacy.example/".to_string(),
            sni_builtin_proxy_base_url: "https://builtin.example/".to_string(),
            ..Settings::default()
        };
        let cfg = SniBypassConfig::from_settings(&settings);
        assert_eq!(cfg.proxy_base_url, "https://legacy.example/");
    }

    #[test]
    fn test_builtin_source_ignores_custom() {
        let settings = Settings {
            sni_bypass_proxy_source: Some(0),
            sni_bypass_proxy_custom_base_url: "https://custom.example/".to_string(),
            sni_builtin_proxy_base_url: "https://builtin.example/".to_string(),
            ..Settings::default()
        };
        let cfg = SniBypassConfig::from_settings(&settings);
        assert_eq!(cfg.proxy_base_url, "https://builtin.example/");
    }

    #[test]
    fn test_custom_blank_falls_back_to_builtin() {
        let settings = Settings {
            sni_bypass_proxy_source: Some(1),
            sni_builtin_proxy_base_url: "https://builtin.example/".to_string(),
            ..Settings::default()
        };
        let cfg = SniBypassConfig::from_settings(&settings);
        assert_eq!(cfg.proxy_base_url, "https://builtin.example/");
    }

    #[test]
    fn test_custom_prefers_custom_over_legacy() {
        let settings = Settings {
            sni_bypass_proxy_source: Some(1),
            sni_bypass_proxy_base_url: "https://legacy.example/".to_string(),
            sni_bypass_proxy_custom_base_url: "https://custom.example/".to_string(),
            sni_bypass_mode: 1,
            ..Settings::default()
        };
        let cfg = SniBypassConfig::from_settings(&settings);
        assert_eq!(cfg.proxy_base_url, "https://custom.example/");
        assert_eq!(cfg.mode, SniBypassMode::PathEncoded);
    }

    #[test]
    fn test_proxy_source_codes() {
        assert_eq!(ProxySource::from_code(1), ProxySource::Custom);
        assert_eq!(ProxySource::from_code(7), ProxySource::BuiltIn);
        assert_eq!(ProxySource::Custom.code(), 1);
    }
}
