//! Request rewriting against the active SNI bypass snapshot.

use super::config::SniBypassConfig;
use super::matcher::matches_any;
use super::rewrite::{normalize_proxy_base_url, parse_http_url, rewrite, SniBypassMode};
use arc_swap::ArcSwap;
use http::header::{HeaderMap, HeaderValue, HOST};
use http::{Request, Uri};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Why a preview did not produce a rewritten URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewFailure {
    InvalidUrl,
    NotEnabled,
    NoRuleMatched,
    InvalidProxyBase,
    RewriteFailed,
}

impl fmt::Display for PreviewFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidUrl => "invalid URL",
            Self::NotEnabled => "not enabled",
            Self::NoRuleMatched => "no rule matched",
            Self::InvalidProxyBase => "invalid proxy base",
            Self::RewriteFailed => "rewrite failed",
        })
    }
}

/// Diagnostic outcome of rewriting one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniBypassPreview {
    pub enabled: bool,
    pub matched: bool,
    pub mode: SniBypassMode,
    pub original_url: String,
    pub rewritten_url: Option<String>,
    pub target_host: Option<String>,
    pub failure: Option<PreviewFailure>,
}

/// Applies the current SNI bypass snapshot to outgoing requests.
///
/// Every failed precondition leaves the request untouched.
#[derive(Debug, Clone)]
pub struct SniBypassManager {
    config: Arc<ArcSwap<SniBypassConfig>>,
}

impl Default for SniBypassManager {
    fn default() -> Self {
        Self::new(SniBypassConfig::default())
    }
}

impl SniBypassManager {
    pub fn new(config: SniBypassConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Shared handle the settings listener publishes into.
    pub fn config_handle(&self) -> Arc<ArcSwap<SniBypassConfig>> {
        Arc::clone(&self.config)
    }

    /// Current snapshot.
    pub fn config(&self) -> Arc<SniBypassConfig> {
        self.config.load_full()
    }

    /// Replaces the active snapshot.
    pub fn store(&self, config: SniBypassConfig) {
        self.config.store(Arc::new(config));
    }

    /// Rewrites `original` under `cfg`. Returns the new URL and the target host.
    fn plan(cfg: &SniBypassConfig, original: &Url) -> Option<(Url, String)> {
        if !cfg.enabled {
            return None;
        }
        let host = original.host_str()?.to_lowercase();
        if !matches_any(&host, &cfg.rules) {
            return None;
        }
        let proxy = normalize_proxy_base_url(&cfg.proxy_base_url)?;
        let url = rewrite(&proxy, original, &host, cfg.mode)?;
        Some((url, host))
    }

    fn extra_headers(mode: SniBypassMode, host: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if mode == SniBypassMode::HostHeader {
            if let Ok(value) = HeaderValue::from_str(host) {
                headers.insert(HOST, value);
            }
        }
        headers
    }

    /// Rewrites an outgoing request, or returns it unchanged.
    ///
    /// In HostHeader mode the real host is set as the `Host` header.
    pub fn rewrite_request<B>(&self, request: Request<B>) -> Request<B> {
        let cfg = self.config.load();
        if !cfg.enabled {
            return request;
        }

        let Some(original) = parse_http_url(&request.uri().to_string()) else {
            return request;
        };
        let Some((url, host)) = Self::plan(&cfg, &original) else {
            return request;
        };
        let Ok(uri) = url.as_str().parse::<Uri>() else {
            tracing::debug!(url = %url, "rewritten URL is not a valid request URI");
            return request;
        };

        tracing::trace!(host = %host, to = %url, mode = ?cfg.mode, "SNI bypass rewrite");

        let (mut parts, body) = request.into_parts();
        parts.uri = uri;
        parts.headers.extend(Self::extra_headers(cfg.mode, &host));
        Request::from_parts(parts, body)
    }

    /// Rewrites a bare URL for callers that build their own requests.
    ///
    /// Returns the new URL and the headers to send with it, or `None` when
    /// the URL should be used as is.
    pub fn rewrite_url(&self, url: &str) -> Option<(Url, HeaderMap)> {
        let cfg = self.config.load();
        if !cfg.enabled {
            return None;
        }
        let original = parse_http_url(url)?;
        let (rewritten, host) = Self::plan(&cfg, &original)?;
        Some((rewritten, Self::extra_headers(cfg.mode, &host)))
    }

    /// Explains what [`rewrite_request`](Self::rewrite_request) would do with `url`.
    pub fn preview(&self, url: &str) -> SniBypassPreview {
        let cfg = self.config.load();
        let mut preview = SniBypassPreview {
            enabled: cfg.enabled,
            matched: false,
            mode: cfg.mode,
            original_url: url.to_string(),
            rewritten_url: None,
            target_host: None,
            failure: None,
        };

        let Some(parsed) = parse_http_url(url) else {
            preview.failure = Some(PreviewFailure::InvalidUrl);
            return preview;
        };
        preview.original_url = parsed.to_string();

        let host = parsed.host_str().unwrap_or_default().to_lowercase();
        if !cfg.enabled {
            preview.failure = Some(PreviewFailure::NotEnabled);
            return preview;
        }
        if !matches_any(&host, &cfg.rules) {
            preview.failure = Some(PreviewFailure::NoRuleMatched);
            return preview;
        }

        preview.matched = true;
        preview.target_host = Some(host.clone());

        let Some(proxy) = normalize_proxy_base_url(&cfg.proxy_base_url) else {
            preview.failure = Some(PreviewFailure::InvalidProxyBase);
            return preview;
        };

        match rewrite(&proxy, &parsed, &host, cfg.mode) {
            Some(rewritten) => preview.rewritten_url = Some(rewritten.to_string()),
            None => preview.failure = Some(PreviewFailure::RewriteFailed),
        }
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sni::{default_rules, BypassRule};

    fn enabled(mode: SniBypassMode, proxy: &str) -> SniBypassManager {
        SniBypassManager::new(SniBypassConfig {
            enabled: true,
            proxy_base_url: proxy.to_string(),
            mode,
            rules: default_rules(),
        })
    }

    #[test]
    fn test_rewrite_request_host_header() {
        let manager = enabled(SniBypassMode::HostHeader, "https://proxy.example.com");
        let req = Request::get("https://play.dlsite.com/api/v3/download/sign/url?workno=RJ00000000")
            .body(())
            .unwrap();

        let out = manager.rewrite_request(req);
        assert_eq!(
            out.uri().to_string(),
            "https://proxy.example.com/api/v3/download/sign/url?workno=RJ00000000"
        );
        assert_eq!(out.headers()[HOST], "play.dlsite.com");
    }

    #[test]
    fn test_rewrite_request_path_encoded() {
        let manager = enabled(SniBypassMode::PathEncoded, "https://proxy.example.com/");
        let req = Request::get("https://media.chobit.cc/a.mp3").body(()).unwrap();

        let out = manager.rewrite_request(req);
        assert_eq!(
            out.uri().to_string(),
            "https://proxy.example.com/media.chobit.cc/a.mp3"
        );
        assert!(out.headers().get(HOST).is_none());
    }

    #[test]
    fn test_rewrite_request_passthrough() {
        let disabled = SniBypassManager::default();
        let req = Request::get("https://play.dlsite.com/x").body(()).unwrap();
        assert_eq!(disabled.rewrite_request(req).uri(), "https://play.dlsite.com/x");

        let no_proxy = enabled(SniBypassMode::HostHeader, "  ");
        let req = Request::get("https://play.dlsite.com/x").body(()).unwrap();
        assert_eq!(no_proxy.rewrite_request(req).uri(), "https://play.dlsite.com/x");

        let manager = enabled(SniBypassMode::HostHeader, "https://proxy.example.com/");
        let req = Request::get("https://example.org/x").body(()).unwrap();
        let out = manager.rewrite_request(req);
        assert_eq!(out.uri(), "https://example.org/x");
        assert!(out.headers().get(HOST).is_none());
    }

    #[test]
    fn test_rewrite_url() {
        let manager = enabled(SniBypassMode::HostHeader, "https://proxy.example.com/");
        let (url, headers) = manager
            .rewrite_url("https://www.dlsite.com/maniax/work/=/product_id/RJ01.html")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://proxy.example.com/maniax/work/=/product_id/RJ01.html"
        );
        assert_eq!(headers[HOST], "www.dlsite.com");

        assert!(manager.rewrite_url("not a url").is_none());
        assert!(manager.rewrite_url("https://example.org/").is_none());
    }

    #[test]
    fn test_preview_reasons() {
        let manager = enabled(SniBypassMode::HostHeader, "https://proxy.example.com/");
        assert_eq!(
            manager.preview("::nope").failure,
            Some(PreviewFailure::InvalidUrl)
        );
        assert_eq!(
            manager.preview("https://example.org/").failure,
            Some(PreviewFailure::NoRuleMatched)
        );

        let ok = manager.preview("https://play.dlsite.com/a?b=c");
        assert!(ok.matched);
        assert_eq!(ok.failure, None);
        assert_eq!(ok.target_host.as_deref(), Some("play.dlsite.com"));
        assert_eq!(
            ok.rewritten_url.as_deref(),
            Some("https://proxy.example.com/a?b=c")
        );

        let bad_proxy = enabled(SniBypassMode::HostHeader, "");
        let p = bad_proxy.preview("https://play.dlsite.com/");
        assert!(p.matched);
        assert_eq!(p.failure, Some(PreviewFailure::InvalidProxyBase));
        assert_eq!(p.failure.unwrap().to_string(), "invalid proxy base");

        let off = SniBypassManager::default();
        assert_eq!(
            off.preview("https://play.dlsite.com/").failure,
            Some(PreviewFailure::NotEnabled)
        );
    }

    #[test]
    fn test_snapshot_swap() {
        let manager = enabled(SniBypassMode::HostHeader, "https://proxy.example.com/");
        manager.store(SniBypassConfig {
            rules: vec![BypassRule::new("example.org")],
            ..(*manager.config()).clone()
        });

        assert!(manager.rewrite_url("https://play.dlsite.com/").is_none());
        assert!(manager.rewrite_url("https://example.org/").is_some());
    }
}
