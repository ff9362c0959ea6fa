//! Immutable WebSocket endpoint address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::http::uri::InvalidUri;

/// Errors produced when parsing an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid endpoint URI: {0}")]
    InvalidUri(String),

    #[error("unsupported scheme {0:?} (expected ws or wss)")]
    UnsupportedScheme(String),

    #[error("endpoint has no host")]
    MissingHost,
}

/// Transport scheme of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Ws,
    Wss,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }

    /// Port used when the address does not name one.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Ws => 80,
            Scheme::Wss => 443,
        }
    }
}

/// Address of the remote peer. Fixed for the lifetime of a manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    pub fn new(
        scheme: Scheme,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            scheme,
            host: host.into(),
            port,
            path,
        }
    }

    /// Parses a `ws://` or `wss://` URL.
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let uri: Uri = url
            .trim()
            .parse()
            .map_err(|e: InvalidUri| EndpointError::InvalidUri(e.to_string()))?;

        let scheme = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("ws") => Scheme::Ws,
            Some(s) if s.eq_ignore_ascii_case("wss") => Scheme::Wss,
            Some(other) => return Err(EndpointError::UnsupportedScheme(other.to_string())),
            None => return Err(EndpointError::UnsupportedScheme(String::new())),
        };

        let host = match uri.host() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(EndpointError::MissingHost),
        };
        let port = uri.port_u16().unwrap_or_else(|| scheme.default_port());

        let mut path = match uri.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };
        if let Some(query) = uri.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path including any query string. Always starts with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full URL used for the WebSocket handshake.
    pub fn url(&self) -> String {
        self.to_string()
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(Scheme::Ws, "localhost", 8765, "/")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.path
        )
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}
