//! URL rewriting toward an SNI bypass proxy.

use url::Url;

/// How the real destination host is carried to the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SniBypassMode {
    /// Original path and query on the proxy origin; real host in the `Host` header.
    #[default]
    HostHeader,
    /// Real host encoded as the first path segment on the proxy origin.
    PathEncoded,
}

impl SniBypassMode {
    /// Persisted code of this mode.
    pub fn code(self) -> i32 {
        match self {
            Self::HostHeader => 0,
            Self::PathEncoded => 1,
        }
    }

    /// Unknown codes map to [`SniBypassMode::HostHeader`].
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::PathEncoded,
            _ => Self::HostHeader,
        }
    }
}

/// Parses an absolute `http`/`https` URL with a host.
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Some(url),
        _ => None,
    }
}

/// Trims `raw`, appends a trailing `/` when missing and parses it.
///
/// Blank or unparsable input yields `None`.
pub fn normalize_proxy_base_url(raw: &str) -> Option<Url> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if s.ends_with('/') {
        parse_http_url(s)
    } else {
        parse_http_url(&format!("{s}/"))
    }
}

/// Rewrites `original` to go through `proxy`.
///
/// The proxy's scheme, host and port are kept; its path is replaced. The
/// original path and query are carried over in their encoded form.
pub fn rewrite(proxy: &Url, original: &Url, target_host: &str, mode: SniBypassMode) -> Option<Url> {
    let host = target_host.trim().to_lowercase();
    if host.is_empty() {
        return None;
    }

    let mut url = proxy.clone();
    match mode {
        SniBypassMode::HostHeader => url.set_path(original.path()),
        SniBypassMode::PathEncoded => url.set_path(&format!("/{}{}", host, original.path())),
    }
    url.set_query(original.query());
    url.set_fragment(None);
    Some(url)
}
