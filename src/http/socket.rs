//! Connection setup: DNS -> TCP -> TLS.
//!
//! Resolution goes through the caller's [`Resolve`] implementation, so the
//! override chain decides which addresses are dialed. The TLS server name is
//! always the host of the URL being fetched, which after an SNI bypass
//! rewrite is the proxy's host.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::{Name, Resolve};
use boring::ssl::{SslConnector, SslMethod, SslVersion};
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use url::Url;

/// A connected socket (TCP or TLS).
#[derive(Debug)]
pub enum SocketType {
    Tcp(TcpStream),
    Ssl(tokio_boring::SslStream<TcpStream>),
}

impl SocketType {
    /// Peer address of the underlying TCP connection.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match self {
            SocketType::Tcp(s) => s.peer_addr().ok(),
            SocketType::Ssl(s) => s.get_ref().peer_addr().ok(),
        }
    }
}

impl AsyncRead for SocketType {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            SocketType::Ssl(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SocketType {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            SocketType::Ssl(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_flush(cx),
            SocketType::Ssl(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            SocketType::Ssl(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Host and port to dial for `url`.
pub fn target_of(url: &Url) -> Result<(String, u16), NetError> {
    let host = url.host_str().ok_or(NetError::InvalidUrl)?;
    let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host.to_string(), port))
}

/// Dials every resolved address in order until one accepts.
async fn connect_tcp(host: &str, port: u16, resolver: &dyn Resolve) -> Result<TcpStream, NetError> {
    let addrs: Vec<SocketAddr> = match host.parse() {
        Ok(ip) => vec![SocketAddr::new(ip, port)],
        Err(_) => resolver
            .resolve(Name::new(host))
            .await?
            .map(|a| SocketAddr::new(a.ip(), port))
            .collect(),
    };

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                tracing::trace!(host = %host, addr = %addr, "TCP connected");
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(host = %host, addr = %addr, error = %e, "TCP connect failed");
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) => Err(e).connection_context(host, port),
        None => Err(NetError::NameNotResolved),
    }
}

/// Opens a connection for `url`, with TLS for `https`.
pub async fn connect(url: &Url, resolver: &dyn Resolve) -> Result<SocketType, NetError> {
    let (host, port) = target_of(url)?;
    let stream = connect_tcp(&host, port, resolver).await?;

    if url.scheme() != "https" {
        return Ok(SocketType::Tcp(stream));
    }

    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
    builder
        .set_alpn_protos(b"\x08http/1.1")
        .map_err(|_| NetError::SslProtocolError)?;
    builder
        .set_min_proto_version(Some(SslVersion::TLS1_2))
        .map_err(|_| NetError::SslProtocolError)?;

    let config = builder
        .build()
        .configure()
        .map_err(|_| NetError::SslProtocolError)?;

    let tls = tokio_boring::connect(config, &host, stream)
        .await
        .map_err(|e| {
            tracing::debug!(host = %host, error = ?e, "TLS handshake failed");
            NetError::SslProtocolError
        })?;

    Ok(SocketType::Ssl(tls))
}
