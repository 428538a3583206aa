//! Plain or TLS byte stream.
//!
//! `ws://` endpoints get a bare [`TcpStream`]; `wss://` endpoints get the same
//! socket wrapped by `tokio-rustls`, verified against the `webpki-roots`
//! trust store with the URL host as SNI name.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::debug;

use crate::error::{Error, Result};

use super::endpoint::Endpoint;

// ============================================================================
// MaybeTlsStream
// ============================================================================

/// A connected socket, optionally TLS-wrapped.
pub enum MaybeTlsStream {
    /// Unencrypted TCP.
    Plain(TcpStream),
    /// TLS over TCP.
    Tls(Box<TlsStream<TcpStream>>),
}

impl MaybeTlsStream {
    /// Returns `true` for a TLS-wrapped stream.
    #[inline]
    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl fmt::Debug for MaybeTlsStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(stream) => f.debug_tuple("Plain").field(stream).finish(),
            Self::Tls(_) => f.write_str("Tls(..)"),
        }
    }
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

// ============================================================================
// Connect
// ============================================================================

/// Opens the stream for `endpoint`, running the TLS handshake for `wss://`.
///
/// # Errors
///
/// - [`Error::Connection`] if DNS resolution or TCP connect fails
/// - [`Error::Tls`] if the TLS setup or handshake fails
pub async fn connect(endpoint: &Endpoint) -> Result<MaybeTlsStream> {
    let tcp = TcpStream::connect(endpoint.socket_target())
        .await
        .map_err(|e| Error::connection(format!("{}:{}: {e}", endpoint.host, endpoint.port)))?;

    if let Err(e) = tcp.set_nodelay(true) {
        debug!(error = %e, "Failed to set TCP_NODELAY");
    }

    if !endpoint.use_tls {
        return Ok(MaybeTlsStream::Plain(tcp));
    }

    let server_name = ServerName::try_from(endpoint.host.clone())
        .map_err(|e| Error::tls(format!("invalid server name {:?}: {e}", endpoint.host)))?;

    let stream = tls_connector()?
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::tls(e.to_string()))?;

    debug!(host = %endpoint.host, "TLS session established");

    Ok(MaybeTlsStream::Tls(Box::new(stream)))
}

/// Builds a connector trusting the bundled web PKI roots.
fn tls_connector() -> Result<TlsConnector> {
    let roots: RootCertStore = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

// ============================================================================
// Tests
// ============================================================================
