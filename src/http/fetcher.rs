//! JSON-over-HTTP/1.1 client used by the mirror adapters.
//!
//! Each request runs: SNI bypass rewrite -> override DNS -> TCP -> TLS ->
//! HTTP/1.1 -> JSON decode. Connections are not pooled; mirror calls are
//! infrequent and sequential.

use super::retry::{with_retry, RetryConfig};
use super::socket::connect;
use crate::base::neterror::NetError;
use crate::dns::Resolve;
use crate::sni::SniBypassManager;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, ACCEPT, HOST, USER_AGENT};
use http::{Request, Uri};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Desktop browser user agent sent to mirrors.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Client-level knobs.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Whole-request timeout; expiry is reported as [`NetError::ConnectionTimedOut`].
    pub timeout: Duration,
    pub user_agent: String,
    pub retry: RetryConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryConfig::no_retry(),
        }
    }
}

/// HTTP GET client wired through the override resolver and SNI bypass.
#[derive(Clone)]
pub struct HttpFetcher {
    resolver: Arc<dyn Resolve>,
    sni: SniBypassManager,
    config: FetcherConfig,
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpFetcher {
    pub fn new(resolver: Arc<dyn Resolve>, sni: SniBypassManager, config: FetcherConfig) -> Self {
        Self {
            resolver,
            sni,
            config,
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// GETs `url` and decodes the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<T, NetError> {
        let body = self.get_bytes(url, headers).await?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::debug!(url = %url, error = %e, "JSON decode failed");
            NetError::decode_failed(e.to_string())
        })
    }

    /// GETs `url` and returns the whole body, retrying per the configured policy.
    pub async fn get_bytes(&self, url: &str, headers: &HeaderMap) -> Result<Bytes, NetError> {
        with_retry(&self.config.retry, || async {
            match tokio::time::timeout(self.config.timeout, self.fetch(url, headers)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!(url = %url, timeout_ms = self.config.timeout.as_millis() as u64, "request timed out");
                    Err(NetError::ConnectionTimedOut)
                }
            }
        })
        .await
    }

    fn build_request(&self, url: &str, headers: &HeaderMap) -> Result<Request<Empty<Bytes>>, NetError> {
        let parsed = Url::parse(url).map_err(|_| NetError::InvalidUrl)?;
        let uri: Uri = parsed.as_str().parse().map_err(|_| NetError::InvalidUrl)?;

        let mut request = Request::get(uri)
            .body(Empty::<Bytes>::new())
            .map_err(|_| NetError::InvalidUrl)?;

        let request_headers = request.headers_mut();
        request_headers.extend(headers.clone());
        if !request_headers.contains_key(USER_AGENT) {
            if let Ok(ua) = HeaderValue::from_str(&self.config.user_agent) {
                request_headers.insert(USER_AGENT, ua);
            }
        }
        if !request_headers.contains_key(ACCEPT) {
            request_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        Ok(request)
    }

    async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Bytes, NetError> {
        let request = self.sni.rewrite_request(self.build_request(url, headers)?);
        let target = Url::parse(&request.uri().to_string()).map_err(|_| NetError::InvalidUrl)?;

        let socket = connect(&target, self.resolver.as_ref()).await?;
        let (mut sender, conn) = http1::handshake(TokioIo::new(socket))
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "HTTP/1.1 handshake failed");
                NetError::ConnectionFailed
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::trace!(error = %e, "connection driver ended");
            }
        });

        // HTTP/1.1 wants origin-form on the wire and the authority in Host.
        let (mut parts, body) = request.into_parts();
        let origin_form = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        if !parts.headers.contains_key(HOST) {
            let host = target.host_str().ok_or(NetError::InvalidUrl)?;
            let authority = match target.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            let value = HeaderValue::from_str(&authority).map_err(|_| NetError::InvalidUrl)?;
            parts.headers.insert(HOST, value);
        }
        parts.uri = origin_form.parse().map_err(|_| NetError::InvalidUrl)?;

        let response = sender
            .send_request(Request::from_parts(parts, body))
            .await
            .map_err(|e| {
                tracing::debug!(url = %target, error = %e, "request failed");
                NetError::ConnectionClosed
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "non-success status");
            return Err(NetError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|_| NetError::HttpBodyError)?
            .to_bytes();

        if body.is_empty() {
            return Err(NetError::EmptyResponse);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::GaiResolver;
    use crate::sni::{BypassRule, SniBypassConfig, SniBypassMode};
    use serde::Deserialize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serves one canned response and reports the raw request head.
    async fn serve_once(status: &'static str, body: &'static str) -> (u16, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });

        (port, rx)
    }

    fn fetcher(sni: SniBypassManager) -> HttpFetcher {
        HttpFetcher::new(Arc::new(GaiResolver::new()), sni, FetcherConfig::default())
    }

    #[derive(Debug, Deserialize)]
    struct Payload {
        id: i64,
    }

    #[tokio::test]
    async fn test_get_json() {
        let (port, head) = serve_once("200 OK", r#"{"id": 42}"#).await;
        let f = fetcher(SniBypassManager::default());

        let payload: Payload = f
            .get_json(&format!("http://127.0.0.1:{port}/api/work/42"), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(payload.id, 42);

        let head = head.await.unwrap();
        assert!(head.starts_with("GET /api/work/42 HTTP/1.1\r\n"));
        assert!(head.to_lowercase().contains(&format!("host: 127.0.0.1:{port}")));
        assert!(head.to_lowercase().contains("user-agent: mozilla/5.0"));
    }

    #[tokio::test]
    async fn test_status_error() {
        let (port, _head) = serve_once("404 Not Found", r#"{}"#).await;
        let f = fetcher(SniBypassManager::default());

        let err = f
            .get_json::<Payload>(&format!("http://127.0.0.1:{port}/missing"), &HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_decode_error() {
        let (port, _head) = serve_once("200 OK", "not json").await;
        let f = fetcher(SniBypassManager::default());

        let err = f
            .get_json::<Payload>(&format!("http://127.0.0.1:{port}/"), &HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::ResponseDecodeFailed { .. }));
    }

    #[tokio::test]
    async fn test_request_goes_through_sni_proxy() {
        let (port, head) = serve_once("200 OK", r#"{"id": 1}"#).await;
        let sni = SniBypassManager::new(SniBypassConfig {
            enabled: true,
            proxy_base_url: format!("http://127.0.0.1:{port}"),
            mode: SniBypassMode::PathEncoded,
            rules: vec![BypassRule::new("dlsite.com")],
        });
        let f = fetcher(sni);

        let payload: Payload = f
            .get_json("https://play.dlsite.com/api/v3/x?workno=RJ01", &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(payload.id, 1);

        let head = head.await.unwrap();
        assert!(head.starts_with("GET /play.dlsite.com/api/v3/x?workno=RJ01 HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_host_header_mode_sends_real_host() {
        let (port, head) = serve_once("200 OK", r#"{"id": 2}"#).await;
        let sni = SniBypassManager::new(SniBypassConfig {
            enabled: true,
            proxy_base_url: format!("http://127.0.0.1:{port}/"),
            mode: SniBypassMode::HostHeader,
            rules: vec![BypassRule::new("dlsite.com")],
        });
        let f = fetcher(sni);

        let _: Payload = f
            .get_json("https://www.dlsite.com/home", &HeaderMap::new())
            .await
            .unwrap();

        let head = head.await.unwrap().to_lowercase();
        assert!(head.starts_with("get /home http/1.1\r\n"));
        assert!(head.contains("host: www.dlsite.com\r\n"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let f = HttpFetcher::new(
            Arc::new(GaiResolver::new()),
            SniBypassManager::default(),
            FetcherConfig {
                timeout: Duration::from_millis(100),
                ..FetcherConfig::default()
            },
        );
        let err = f
            .get_bytes(&format!("http://127.0.0.1:{port}/"), &HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::ConnectionTimedOut));
    }
}
