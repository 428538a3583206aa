//! Builder pattern for sync client configuration.
//!
//! Provides a fluent API for configuring and creating [`SyncClient`] instances.
//!
//! # Example
//!
//! ```no_run
//! use token_beam::SyncClient;
//!
//! # #[tokio::main]
//! # async fn main() -> token_beam::Result<()> {
//! let client = SyncClient::builder()
//!     .server_url("wss://tokenbeam.dev")
//!     .client_type("krita")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::{Error, Result};

use super::client::SyncClient;
use super::options::SyncOptions;

// ============================================================================
// SyncClientBuilder
// ============================================================================

/// Builder for configuring a [`SyncClient`] instance.
///
/// Use [`SyncClient::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct SyncClientBuilder {
    /// Accumulated settings.
    options: SyncOptions,
    /// Runtime the session tasks run on.
    runtime: Option<Handle>,
}

// ============================================================================
// SyncClientBuilder Implementation
// ============================================================================

impl SyncClientBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the sync server URL (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.options.server_url = url.into();
        self
    }

    /// Sets the integrating application tag (e.g. `"blender"`, `"krita"`).
    #[inline]
    #[must_use]
    pub fn client_type(mut self, client_type: impl Into<String>) -> Self {
        self.options.client_type = client_type.into();
        self
    }

    /// Sets the host drain cadence.
    #[inline]
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    /// Sets the handshake deadline.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.options.handshake_timeout = Some(timeout);
        self
    }

    /// Removes the handshake deadline.
    #[inline]
    #[must_use]
    pub fn no_handshake_timeout(mut self) -> Self {
        self.options.handshake_timeout = None;
        self
    }

    /// Enables keep-alive pings.
    #[inline]
    #[must_use]
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.options.keepalive_interval = Some(interval);
        self
    }

    /// Turns accept-digest verification on or off.
    #[inline]
    #[must_use]
    pub fn verify_accept(mut self, verify: bool) -> Self {
        self.options.verify_accept = verify;
        self
    }

    /// Sets the inbound frame size bound.
    #[inline]
    #[must_use]
    pub fn max_frame_len(mut self, max: usize) -> Self {
        self.options.max_frame_len = max;
        self
    }

    /// Sets the runtime that session tasks are spawned on.
    #[inline]
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the server URL is not a WebSocket URL
    /// - [`Error::Config`] if a setting is out of range
    /// - [`Error::Config`] if no runtime was given and none is current
    pub fn build(self) -> Result<SyncClient> {
        self.options.validate()?;
        let runtime = self.validate_runtime()?;

        Ok(SyncClient::new(self.options, runtime))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SyncClientBuilder {
    /// Resolves the runtime handle.
    fn validate_runtime(&self) -> Result<Handle> {
        if let Some(handle) = &self.runtime {
            return Ok(handle.clone());
        }

        Handle::try_current().map_err(|_| {
            Error::config(
                "No tokio runtime available. Build inside a runtime or use .runtime().\n\
                 Example: SyncClient::builder().runtime(runtime.handle().clone())",
            )
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
