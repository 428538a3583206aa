//! WebSocket endpoint parsing.
//!
//! Splits a `ws://` or `wss://` URL into the pieces the stream connect and
//! the upgrade request need.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use url::{Host, Url};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default port for `ws://`.
const DEFAULT_WS_PORT: u16 = 80;

/// Default port for `wss://`.
const DEFAULT_WSS_PORT: u16 = 443;

// ============================================================================
// Endpoint
// ============================================================================

/// A parsed WebSocket target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address, IPv6 without brackets.
    pub host: String,
    /// TCP port, defaulted from the scheme.
    pub port: u16,
    /// Request target: path plus query, never empty.
    pub path: String,
    /// `true` for `wss://`.
    pub use_tls: bool,
}

impl Endpoint {
    /// Parses a WebSocket URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] when the URL is malformed, has no host,
    /// or its scheme is not `ws`/`wss`.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input.trim())
            .map_err(|e| Error::invalid_url(format!("{input}: {e}")))?;

        let use_tls = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => {
                return Err(Error::invalid_url(format!(
                    "unsupported scheme {other:?}, expected ws or wss"
                )));
            }
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(Error::invalid_url(format!("{input}: missing host"))),
        };

        let port = url
            .port()
            .unwrap_or(if use_tls { DEFAULT_WSS_PORT } else { DEFAULT_WS_PORT });

        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            host,
            port,
            path,
            use_tls,
        })
    }

    /// Returns the value for the `Host` request header.
    #[must_use]
    pub fn host_header(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Returns `(host, port)` for the stream connect.
    #[inline]
    #[must_use]
    pub fn socket_target(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        write!(f, "{scheme}://{}{}", self.host_header(), self.path)
    }
}

// ============================================================================
// Tests
// ============================================================================
