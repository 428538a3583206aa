//! Sync client configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use token_beam::SyncOptions;
//!
//! let options = SyncOptions::new()
//!     .with_server_url("wss://tokenbeam.dev")
//!     .with_client_type("krita")
//!     .with_keepalive_interval(Duration::from_secs(30));
//!
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::session::DEFAULT_HANDSHAKE_TIMEOUT;
use crate::transport::{DEFAULT_MAX_FRAME_LEN, Endpoint, SessionConfig};

// ============================================================================
// Constants
// ============================================================================

/// Default sync server.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080";

/// Default `clientType` tag.
pub const DEFAULT_CLIENT_TYPE: &str = "blender";

/// Default host drain cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// SyncOptions
// ============================================================================

/// Settings for a [`crate::SyncClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// WebSocket URL of the sync server.
    pub server_url: String,

    /// Integrating application tag sent in `pair`.
    pub client_type: String,

    /// How often the host should drain the relay.
    pub poll_interval: Duration,

    /// Deadline for connect, TLS and upgrade together.
    pub handshake_timeout: Option<Duration>,

    /// Keep-alive ping period; unanswered for a full period closes the link.
    pub keepalive_interval: Option<Duration>,

    /// Check the server's `Sec-WebSocket-Accept` digest.
    pub verify_accept: bool,

    /// Largest accepted inbound frame payload in bytes.
    pub max_frame_len: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SyncOptions {
    /// Creates options with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            client_type: DEFAULT_CLIENT_TYPE.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            keepalive_interval: None,
            verify_accept: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SyncOptions {
    /// Sets the server URL.
    #[inline]
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Sets the `clientType` tag.
    #[inline]
    #[must_use]
    pub fn with_client_type(mut self, client_type: impl Into<String>) -> Self {
        self.client_type = client_type.into();
        self
    }

    /// Sets the host drain cadence.
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets or clears the handshake deadline.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Enables keep-alive pings at `interval`.
    #[inline]
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Turns accept-digest verification on or off.
    #[inline]
    #[must_use]
    pub fn with_verify_accept(mut self, verify: bool) -> Self {
        self.verify_accept = verify;
        self
    }

    /// Sets the inbound frame size bound.
    #[inline]
    #[must_use]
    pub fn with_max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = max;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SyncOptions {
    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] for a malformed or non-WebSocket URL
    /// - [`Error::Config`] for an empty client type, a zero duration or a
    ///   zero frame bound
    pub fn validate(&self) -> Result<()> {
        Endpoint::parse(&self.server_url)?;

        if self.client_type.trim().is_empty() {
            return Err(Error::config("client_type must not be empty"));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::config("poll_interval must be greater than zero"));
        }

        if self.handshake_timeout.is_some_and(|d| d.is_zero()) {
            return Err(Error::config("handshake_timeout must be greater than zero"));
        }

        if self.keepalive_interval.is_some_and(|d| d.is_zero()) {
            return Err(Error::config("keepalive_interval must be greater than zero"));
        }

        if self.max_frame_len == 0 {
            return Err(Error::config("max_frame_len must be greater than zero"));
        }

        Ok(())
    }

    /// Returns the per-connection transport settings.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            handshake_timeout: self.handshake_timeout,
            keepalive_interval: self.keepalive_interval,
            verify_accept: self.verify_accept,
            max_frame_len: self.max_frame_len,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
