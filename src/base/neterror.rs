use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Network error type shared by every layer of the crate.
///
/// Simple variants carry Chromium-style numeric codes (see [`NetError::as_i32`]).
/// Context variants keep their I/O source behind an `Arc` so the error stays
/// `Clone`; the failover loop stores the most recent error while it keeps trying.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection to {host}:{port} failed: {source}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Name not resolved for {domain}: {source}")]
    NameNotResolvedFor {
        domain: String,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Name resolution failed")]
    NameResolutionFailed,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Empty response")]
    EmptyResponse,
    #[error("HTTP body error")]
    HttpBodyError,
    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("Failed to decode response: {message}")]
    ResponseDecodeFailed { message: String },

    // Settings Errors
    #[error("Failed to load settings from {path}: {source}")]
    SettingsLoadFailed {
        path: String,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Failed to parse settings: {message}")]
    SettingsParse { message: String },

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionFailed | NetError::ConnectionFailedTo { .. } => -104,
            NetError::NameNotResolved | NetError::NameNotResolvedFor { .. } => -105,
            NetError::SslProtocolError => -107,
            NetError::ConnectionTimedOut => -118,
            NetError::NameResolutionFailed => -137,

            NetError::InvalidUrl => -300,
            NetError::InvalidResponse => -320,
            NetError::EmptyResponse => -324,
            NetError::ResponseDecodeFailed { .. } => -330,
            // Crate-specific codes live in the -900 range
            NetError::HttpBodyError => -905,
            NetError::HttpStatus { .. } => -906,
            NetError::SettingsLoadFailed { .. } => -910,
            NetError::SettingsParse { .. } => -911,
            NetError::Unknown(code) => *code,
        }
    }

    /// Connection failure with the target host and port attached.
    pub fn connection_failed_to(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        NetError::ConnectionFailedTo {
            host: host.into(),
            port,
            source: Arc::new(source),
        }
    }

    /// DNS failure with the queried domain attached.
    pub fn dns_failed(domain: impl Into<String>, source: io::Error) -> Self {
        NetError::NameNotResolvedFor {
            domain: domain.into(),
            source: Arc::new(source),
        }
    }

    /// JSON or body decoding failure.
    pub fn decode_failed(message: impl Into<String>) -> Self {
        NetError::ResponseDecodeFailed {
            message: message.into(),
        }
    }

    /// Whether the error came from name resolution.
    pub fn is_dns_error(&self) -> bool {
        matches!(
            self,
            NetError::NameNotResolved
                | NetError::NameNotResolvedFor { .. }
                | NetError::NameResolutionFailed
        )
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -107 => NetError::SslProtocolError,
            -118 => NetError::ConnectionTimedOut,
            -137 => NetError::NameResolutionFailed,

            -300 => NetError::InvalidUrl,
            -320 => NetError::InvalidResponse,
            -324 => NetError::EmptyResponse,
            -905 => NetError::HttpBodyError,
            _ => NetError::Unknown(code),
        }
    }
}

impl From<serde_json::Error> for NetError {
    fn from(err: serde_json::Error) -> Self {
        NetError::decode_failed(err.to_string())
    }
}
