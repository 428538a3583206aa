//! HTTP/1.1 Upgrade negotiation.
//!
//! Sends the client upgrade request over an already-connected stream and
//! reads the response head, buffering partial reads until `\r\n\r\n`.
//!
//! Bytes that arrive after the header terminator in the same read already
//! belong to the first WebSocket frame; [`negotiate`] hands them back so the
//! frame decoder can start from them.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::endpoint::Endpoint;

// ============================================================================
// Constants
// ============================================================================

/// Terminator of the response head.
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Upper bound on the response head before giving up.
const MAX_RESPONSE_HEAD_LEN: usize = 16 * 1024;

/// Read chunk size while waiting for the response head.
const READ_CHUNK_LEN: usize = 4096;

/// Status code for a successful upgrade.
const SWITCHING_PROTOCOLS: u16 = 101;

// ============================================================================
// HandshakeRequest
// ============================================================================

/// A client upgrade request with its nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// `Host` header value.
    host: String,
    /// Request target.
    path: String,
    /// Base64 of the 16-byte nonce.
    key: String,
}

impl HandshakeRequest {
    /// Builds a request for `endpoint` with a random nonce.
    #[must_use]
    pub fn new(endpoint: &Endpoint) -> Self {
        Self::with_nonce(endpoint, rand::random())
    }

    /// Builds a request with a caller-chosen nonce.
    #[must_use]
    pub fn with_nonce(endpoint: &Endpoint, nonce: [u8; 16]) -> Self {
        Self {
            host: endpoint.host_header(),
            path: endpoint.path.clone(),
            key: Base64Standard.encode(nonce),
        }
    }

    /// Returns the `Sec-WebSocket-Key` value.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the `Sec-WebSocket-Accept` value a compliant server answers with.
    #[inline]
    #[must_use]
    pub fn expected_accept(&self) -> String {
        derive_accept_key(self.key.as_bytes())
    }

    /// Renders the request head.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {key}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n",
            path = self.path,
            host = self.host,
            key = self.key,
        )
        .into_bytes()
    }
}

// ============================================================================
// HandshakeResponse
// ============================================================================

/// A parsed response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// First line, e.g. `HTTP/1.1 101 Switching Protocols`.
    pub status_line: String,
    /// Numeric status, if the status line had one.
    pub status: Option<u16>,
    /// Header fields in order.
    headers: Vec<(String, String)>,
}

impl HandshakeResponse {
    /// Parses a response head without its terminator.
    #[must_use]
    pub fn parse(head: &str) -> Self {
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default().to_string();
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok());

        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        Self {
            status_line,
            status,
            headers,
        }
    }

    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` for a `101` status.
    #[inline]
    #[must_use]
    pub fn is_switching_protocols(&self) -> bool {
        self.status == Some(SWITCHING_PROTOCOLS)
    }

    /// Checks the response against the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] for a non-101 status, or for a missing or
    /// wrong accept digest when `verify_accept` is set.
    pub fn validate(&self, request: &HandshakeRequest, verify_accept: bool) -> Result<()> {
        if !self.is_switching_protocols() {
            return Err(Error::handshake(format!(
                "unexpected status line {:?}",
                self.status_line
            )));
        }

        if verify_accept {
            let expected = request.expected_accept();
            match self.header("Sec-WebSocket-Accept") {
                Some(accept) if accept == expected => {}
                Some(accept) => {
                    return Err(Error::handshake(format!(
                        "Sec-WebSocket-Accept mismatch: got {accept:?}, expected {expected:?}"
                    )));
                }
                None => return Err(Error::handshake("missing Sec-WebSocket-Accept")),
            }
        }

        Ok(())
    }
}

// ============================================================================
// Negotiation
// ============================================================================

/// Returns the offset of the header terminator in `buf`.
#[inline]
#[must_use]
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

/// Performs the upgrade exchange on `stream`.
///
/// Returns any bytes read past the response head.
///
/// # Errors
///
/// - [`Error::Handshake`] if the server rejects the upgrade, closes early or
///   sends an oversized head
/// - [`Error::Io`] on read/write failure
pub async fn negotiate<S>(
    stream: &mut S,
    request: &HandshakeRequest,
    verify_accept: bool,
) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&request.to_bytes()).await?;
    stream.flush().await?;

    let mut buffer = Vec::with_capacity(READ_CHUNK_LEN);
    let mut chunk = [0u8; READ_CHUNK_LEN];

    let head_end = loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(Error::handshake(
                "connection closed before handshake completed",
            ));
        }
        buffer.extend_from_slice(&chunk[..read]);

        if let Some(end) = find_header_end(&buffer) {
            break end;
        }

        if buffer.len() > MAX_RESPONSE_HEAD_LEN {
            return Err(Error::handshake("response head too large"));
        }
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]);
    let response = HandshakeResponse::parse(&head);

    if let Err(e) = response.validate(request, verify_accept) {
        warn!(status = ?response.status, error = %e, "Handshake rejected");
        return Err(e);
    }

    let remainder = buffer.split_off(head_end + HEADER_TERMINATOR.len());
    debug!(leftover = remainder.len(), "Handshake completed");

    Ok(remainder)
}

// ============================================================================
// Tests
// ============================================================================
