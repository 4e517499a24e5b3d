//! SNI bypass rule matching.
//!
//! A rule matches a host when the host equals the rule's domain or is a
//! subdomain of it at a dot boundary. Leading `*.` and `.` are accepted in
//! patterns and stripped before comparison.

use crate::dns::is_dot_suffix;
use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

/// A single domain rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassRule {
    #[serde(default)]
    pub pattern: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl BypassRule {
    /// Creates an enabled rule.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            enabled: true,
        }
    }

    /// Creates a rule with an explicit enabled flag.
    pub fn with_enabled(pattern: impl Into<String>, enabled: bool) -> Self {
        Self {
            pattern: pattern.into(),
            enabled,
        }
    }

    /// Check if `host` (already lowercased) matches this rule.
    pub fn matches(&self, host: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let pattern = self.pattern.trim().to_lowercase();
        let pattern = pattern.strip_prefix("*.").unwrap_or(&pattern);
        let pattern = pattern.strip_prefix('.').unwrap_or(pattern);
        is_dot_suffix(host, pattern)
    }
}

/// Check if `host` matches any enabled rule. Blank hosts never match.
pub fn matches_any(host: &str, rules: &[BypassRule]) -> bool {
    let host = host.trim();
    if host.is_empty() {
        return false;
    }
    let host = host.to_lowercase();
    rules.iter().any(|rule| rule.matches(&host))
}
