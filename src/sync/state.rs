//! Pairing state machine.
//!
//! [`SyncMachine`] owns the pairing state, the session token and the current
//! [`Generation`]. It performs no I/O: transport events go in through
//! [`SyncMachine::dispatch`], socket writes come out as [`Reply`] values, and
//! everything the host should see is pushed onto the [`EventRelay`].
//!
//! # Transitions
//!
//! | From | Trigger | To |
//! |------|---------|----|
//! | `Disconnected` | `begin_connect` with a valid token | `Connecting` |
//! | `Connecting` | transport connected | `AwaitingPair` |
//! | `AwaitingPair` | `pair` received | `Paired` |
//! | any | `error` with `Invalid session token` | `Disconnected` |
//! | any | transport closed, or `disconnect` | `Disconnected` |
//!
//! Events tagged with a generation other than the current one are dropped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tracing::{debug, info, warn};

use crate::color::extract_colors;
use crate::error::Result;
use crate::identifiers::{ClientId, Generation, SessionToken};
use crate::protocol::{InboundMessage, OutboundMessage, ServerError};
use crate::transport::{Reply, TransportEvent};

use super::relay::{EventRelay, RelayEvent};

// ============================================================================
// Status Text
// ============================================================================

const STATUS_CONNECTING: &str = "Connecting...";
const STATUS_PAIRING: &str = "Connected - pairing...";
const STATUS_ALREADY_CONNECTED: &str = "Already connected";
const STATUS_INVALID_TOKEN: &str = "Invalid token format";
const STATUS_DISCONNECTED: &str = "Disconnected";
const STATUS_NO_PAYLOAD: &str = "No payload in sync message";
const STATUS_NO_COLORS: &str = "No colors found in payload";
const STATUS_TIMED_OUT: &str = "Connection timed out";

/// Origin shown when a `pair` message names none.
const UNKNOWN_ORIGIN: &str = "unknown";

// ============================================================================
// PairingState
// ============================================================================

/// Where a connection is in the pairing lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PairingState {
    /// No connection.
    #[default]
    Disconnected,
    /// Transport connecting.
    Connecting,
    /// Transport up, `pair` request sent.
    AwaitingPair,
    /// Pairing confirmed by the server.
    Paired,
}

impl PairingState {
    /// Returns `true` for every state except [`PairingState::Disconnected`].
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for PairingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingPair => "awaiting-pair",
            Self::Paired => "paired",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ConnectOutcome
// ============================================================================

/// Result of a connect request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new connection attempt under this generation should be opened.
    Started(Generation),
    /// A connection is already active; nothing to open.
    AlreadyConnected,
}

// ============================================================================
// SyncMachine
// ============================================================================

/// Pairing and sync protocol state for one client.
#[derive(Debug)]
pub struct SyncMachine {
    /// Host-facing event sink.
    relay: EventRelay,
    /// Tag sent as `clientType` in `pair`.
    client_type: String,
    /// Current connection generation.
    generation: Generation,
    /// Current pairing state.
    state: PairingState,
    /// Token of the active connection.
    token: Option<SessionToken>,
    /// Identifier from `registered`.
    client_id: Option<ClientId>,
    /// A keep-alive ping is unanswered.
    awaiting_pong: bool,
}

impl SyncMachine {
    /// Creates a disconnected machine.
    #[must_use]
    pub fn new(client_type: impl Into<String>, relay: EventRelay) -> Self {
        Self {
            relay,
            client_type: client_type.into(),
            generation: Generation::default(),
            state: PairingState::Disconnected,
            token: None,
            client_id: None,
            awaiting_pong: false,
        }
    }

    /// Returns the pairing state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> PairingState {
        self.state
    }

    /// Returns the current generation.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns the token of the active connection.
    #[inline]
    #[must_use]
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// Returns the server-assigned client id.
    #[inline]
    #[must_use]
    pub fn client_id(&self) -> Option<&ClientId> {
        self.client_id.as_ref()
    }

    // ========================================================================
    // Host Operations
    // ========================================================================

    /// Validates `input` and starts a new generation.
    ///
    /// While a connection is active this only reports `"Already connected"`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidToken`] after reporting
    /// `"Invalid token format"`; the state is unchanged.
    pub fn begin_connect(&mut self, input: &str) -> Result<ConnectOutcome> {
        if self.state.is_active() {
            debug!(state = %self.state, "Connect ignored, already connected");
            self.relay.status(STATUS_ALREADY_CONNECTED);
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        let token = match SessionToken::parse(input) {
            Ok(token) => token,
            Err(e) => {
                self.relay.status(STATUS_INVALID_TOKEN);
                return Err(e);
            }
        };

        self.generation = self.generation.next();
        self.state = PairingState::Connecting;
        self.token = Some(token);
        self.client_id = None;
        self.awaiting_pong = false;

        debug!(generation = %self.generation, "Connecting");
        self.relay.status(STATUS_CONNECTING);

        Ok(ConnectOutcome::Started(self.generation))
    }

    /// Invalidates the current generation and resets to disconnected.
    ///
    /// Always reports `"Disconnected"`.
    pub fn disconnect(&mut self) {
        self.generation = self.generation.next();
        debug!(generation = %self.generation, from = %self.state, "Disconnect requested");
        self.reset();
        self.relay.push(RelayEvent::Connected(false));
        self.relay.status(STATUS_DISCONNECTED);
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Applies one transport event tagged with `generation`.
    ///
    /// Returns the replies to write back on that connection.
    pub fn dispatch(&mut self, generation: Generation, event: TransportEvent) -> Vec<Reply> {
        if generation != self.generation {
            debug!(
                event_generation = %generation,
                current = %self.generation,
                "Dropping stale transport event"
            );
            // A superseded session that just came up shuts itself down
            return match event {
                TransportEvent::Connected => vec![Reply::Close],
                _ => Vec::new(),
            };
        }

        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::KeepaliveDue => self.on_keepalive(),
            TransportEvent::Error(message) => {
                warn!(error = %message, "Transport error");
                self.relay.status(format!("Connection error: {message}"));
                Vec::new()
            }
            TransportEvent::Closed => {
                self.on_closed();
                Vec::new()
            }
        }
    }

    /// Transport up: send the pairing request.
    fn on_connected(&mut self) -> Vec<Reply> {
        let Some(token) = self.token.clone() else {
            debug!("Connected without a token, ignoring");
            return Vec::new();
        };

        self.state = PairingState::AwaitingPair;
        self.relay.status(STATUS_PAIRING);

        match OutboundMessage::pair(self.client_type.as_str(), token).to_json() {
            Ok(text) => vec![Reply::Text(text)],
            Err(e) => {
                self.relay.status(format!("Error: {e}"));
                Vec::new()
            }
        }
    }

    /// One inbound text message.
    fn on_message(&mut self, text: &str) -> Vec<Reply> {
        let keepalive_pending = std::mem::take(&mut self.awaiting_pong);

        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping malformed message");
                return Vec::new();
            }
        };

        match message {
            InboundMessage::Pair { origin } => {
                let origin = origin.unwrap_or_else(|| UNKNOWN_ORIGIN.to_string());
                info!(origin = %origin, "Paired");

                self.state = PairingState::Paired;
                self.relay.push(RelayEvent::Connected(true));
                self.relay
                    .status(format!("Paired with {origin} - waiting for data..."));
                Vec::new()
            }

            InboundMessage::Sync { payload: None } => {
                warn!("Sync message without payload object");
                self.relay.status(STATUS_NO_PAYLOAD);
                Vec::new()
            }

            InboundMessage::Sync {
                payload: Some(payload),
            } => {
                let colors = extract_colors(&payload);
                let count = colors.len();
                debug!(count, "Sync received");

                self.relay.push(RelayEvent::Colors(colors));
                if count > 0 {
                    self.relay.status(format!("{count} colors synced"));
                } else {
                    self.relay.status(STATUS_NO_COLORS);
                }
                Vec::new()
            }

            InboundMessage::Registered {
                client_id: Some(id),
            } => {
                let id = ClientId::new(id);
                debug!(client_id = %id, "Registered");
                self.client_id = Some(id.clone());
                self.relay.push(RelayEvent::ClientId(id));
                Vec::new()
            }

            InboundMessage::Registered { client_id: None } => {
                debug!("Registered message without clientId");
                Vec::new()
            }

            InboundMessage::Error { message } => self.on_server_error(&message),

            // Servers that echo `ping` back answer our keep-alive this way
            InboundMessage::Ping if keepalive_pending => {
                debug!("Keep-alive answered with ping");
                Vec::new()
            }

            InboundMessage::Ping => match OutboundMessage::Pong.to_json() {
                Ok(pong) => vec![Reply::Text(pong)],
                Err(e) => {
                    debug!(error = %e, "Failed to encode pong");
                    Vec::new()
                }
            },

            InboundMessage::Pong => Vec::new(),

            InboundMessage::Unknown { kind } => {
                debug!(kind = %kind, "Ignoring unknown message type");
                Vec::new()
            }
        }
    }

    /// Server-reported error text.
    fn on_server_error(&mut self, text: &str) -> Vec<Reply> {
        let classified = ServerError::classify(text);
        warn!(error = %text, fatal = classified.is_fatal(), "Server error");

        if !classified.is_fatal() {
            self.relay.status(classified.status_text());
            return Vec::new();
        }

        // Later events from this connection are stale
        self.generation = self.generation.next();
        self.reset();
        self.relay.push(RelayEvent::Connected(false));
        self.relay.status(classified.status_text());

        vec![Reply::Close]
    }

    /// Keep-alive tick: ping, or give up if the last ping went unanswered.
    fn on_keepalive(&mut self) -> Vec<Reply> {
        if !self.state.is_active() {
            return Vec::new();
        }

        if self.awaiting_pong {
            warn!("Keep-alive ping unanswered, closing");
            self.relay.status(STATUS_TIMED_OUT);
            return vec![Reply::Close];
        }

        match OutboundMessage::Ping.to_json() {
            Ok(ping) => {
                self.awaiting_pong = true;
                vec![Reply::Text(ping)]
            }
            Err(e) => {
                debug!(error = %e, "Failed to encode ping");
                Vec::new()
            }
        }
    }

    /// Transport gone.
    fn on_closed(&mut self) {
        debug!(from = %self.state, "Transport closed");
        self.reset();
        self.relay.push(RelayEvent::Connected(false));
        self.relay.status(STATUS_DISCONNECTED);
    }

    /// Clears per-connection state.
    fn reset(&mut self) {
        self.state = PairingState::Disconnected;
        self.token = None;
        self.client_id = None;
        self.awaiting_pong = false;
    }
}

// ============================================================================
// Tests
// ============================================================================
