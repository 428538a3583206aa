//! Host-facing sync client.
//!
//! [`SyncClient`] is the whole surface a host integration needs:
//!
//! - [`SyncClient::connect`] / [`SyncClient::disconnect`] from UI actions
//! - [`SyncClient::tick`] (or [`SyncClient::poll`]) from the host's timer,
//!   every [`SyncClient::poll_interval`]
//!
//! None of these block on the network. Connection work runs on a session
//! task; its results reach the host only through the relay.
//!
//! # Example
//!
//! ```no_run
//! use token_beam::{HostState, SyncClient};
//!
//! # #[tokio::main]
//! # async fn main() -> token_beam::Result<()> {
//! let client = SyncClient::builder().build()?;
//! client.connect("beam://A1B2C3")?;
//!
//! let mut state = HostState::default();
//! loop {
//!     tokio::time::sleep(client.poll_interval()).await;
//!     if client.tick(&mut state) > 0 {
//!         println!("{} ({} colors)", state.status, state.colors.len());
//!     }
//! }
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::Result;
use crate::identifiers::{ClientId, Generation, SessionToken};
use crate::transport::{EventHandler, Reply, TransportHandle, TransportSession};

use super::builder::SyncClientBuilder;
use super::options::SyncOptions;
use super::relay::{EventRelay, HostState, RelayEvent};
use super::state::{ConnectOutcome, PairingState, SyncMachine};

// ============================================================================
// SyncClient
// ============================================================================

/// Real-time token sync client.
///
/// Dropping the client closes any live connection.
pub struct SyncClient {
    /// Validated settings.
    options: SyncOptions,
    /// Runtime for session tasks.
    runtime: Handle,
    /// Queue drained by the host.
    relay: EventRelay,
    /// Session handlers hold weak references to it.
    machine: Arc<Mutex<SyncMachine>>,
    /// Handle of the most recent session.
    transport: Mutex<Option<TransportHandle>>,
}

impl fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncClient")
            .field("server_url", &self.options.server_url)
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SyncClient {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SyncClientBuilder {
        SyncClientBuilder::new()
    }

    /// Creates a client from validated options.
    pub(crate) fn new(options: SyncOptions, runtime: Handle) -> Self {
        let relay = EventRelay::new();
        let machine = SyncMachine::new(options.client_type.as_str(), relay.clone());

        Self {
            options,
            runtime,
            relay,
            machine: Arc::new(Mutex::new(machine)),
            transport: Mutex::new(None),
        }
    }
}

// ============================================================================
// Host Operations
// ============================================================================

impl SyncClient {
    /// Starts connecting with a session token.
    ///
    /// Returns immediately; progress arrives as relay events. While a
    /// connection is active this reports `"Already connected"` and opens
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidToken`] if `token` does not normalize.
    pub fn connect(&self, token: &str) -> Result<ConnectOutcome> {
        // Held until the handle is stored so a concurrent disconnect sees it
        let mut transport = self.transport.lock();
        let outcome = self.machine.lock().begin_connect(token)?;

        let ConnectOutcome::Started(generation) = outcome else {
            return Ok(outcome);
        };

        let handler = self.session_handler(generation);
        let handle = TransportSession::open(
            &self.runtime,
            self.options.server_url.as_str(),
            self.options.session_config(),
            handler,
        );

        if let Some(previous) = transport.replace(handle) {
            previous.close();
        }

        debug!(generation = %generation, url = %self.options.server_url, "Session opened");
        Ok(outcome)
    }

    /// Drops the current connection, if any.
    ///
    /// Events still in flight from it are discarded.
    pub fn disconnect(&self) {
        let mut transport = self.transport.lock();
        self.machine.lock().disconnect();

        if let Some(handle) = transport.take() {
            handle.close();
        }
    }

    /// Drains pending events in arrival order.
    #[must_use]
    pub fn poll(&self) -> Vec<RelayEvent> {
        self.relay.drain()
    }

    /// Drains pending events into `state` and returns how many were applied.
    pub fn tick(&self, state: &mut HostState) -> usize {
        state.apply_all(self.relay.drain())
    }

    /// Handler routing one session's events into the state machine.
    ///
    /// Holds only a weak reference; once the client is gone the session is
    /// told to close.
    fn session_handler(&self, generation: Generation) -> EventHandler {
        let machine = Arc::downgrade(&self.machine);
        Box::new(move |event| match machine.upgrade() {
            Some(machine) => machine.lock().dispatch(generation, event),
            None => vec![Reply::Close],
        })
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl SyncClient {
    /// Returns the pairing state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> PairingState {
        self.machine.lock().state()
    }

    /// Returns `true` once the server confirmed pairing.
    #[inline]
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.state() == PairingState::Paired
    }

    /// Returns the current connection generation.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.machine.lock().generation()
    }

    /// Returns the token of the active connection.
    #[must_use]
    pub fn session_token(&self) -> Option<SessionToken> {
        self.machine.lock().token().cloned()
    }

    /// Returns the server-assigned client id.
    #[must_use]
    pub fn client_id(&self) -> Option<ClientId> {
        self.machine.lock().client_id().cloned()
    }

    /// Returns the settings.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Returns how often the host should call [`SyncClient::tick`].
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.options.poll_interval
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        if let Some(handle) = self.transport.get_mut().take() {
            debug!("SyncClient dropped, closing session");
            handle.close();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
