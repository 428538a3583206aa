//! Token Beam - real-time design-token color sync client.
//!
//! This library pairs a creative application with a design-token source over
//! a WebSocket connection and delivers live color updates to the host's own
//! main loop.
//!
//! # Architecture
//!
//! The client follows a two-context model:
//!
//! - **Host (caller thread)**: connects, disconnects and drains events on a
//!   timer; never blocks on the network
//! - **Session task (tokio)**: owns the socket, runs the frame codec and feeds
//!   the pairing state machine
//!
//! Key design principles:
//!
//! - One generation per connection attempt; stale events are dropped
//! - A single dispatch function drives the pairing state machine
//! - The event relay is the only structure shared between both contexts
//! - Every `sync` replaces the color list wholesale
//!
//! # Quick Start
//!
//! ```no_run
//! use token_beam::{HostState, Result, SyncClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = SyncClient::builder()
//!         .server_url("ws://localhost:8080")
//!         .client_type("blender")
//!         .build()?;
//!
//!     client.connect("beam://A1B2C3")?;
//!
//!     let mut state = HostState::default();
//!     loop {
//!         tokio::time::sleep(client.poll_interval()).await;
//!         client.tick(&mut state);
//!         for color in &state.colors {
//!             println!("{} = {}", color.label(), color.to_hex());
//!         }
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`color`] | Hex parsing, sRGB/linear conversion, payload extraction |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Session token, generation and client id newtypes |
//! | [`protocol`] | Sync protocol JSON messages |
//! | [`sync`] | State machine, event relay and [`SyncClient`] |
//! | [`transport`] | WebSocket handshake, frame codec and session task |

// ============================================================================
// Modules
// ============================================================================

/// Color parsing and token payload extraction.
///
/// Turns `sync` payloads into [`ColorToken`] lists in linear space.
pub mod color;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers for the session token, connection generation and
/// server-assigned client id.
pub mod identifiers;

/// Sync protocol message types.
///
/// JSON structures exchanged with the sync server.
pub mod protocol;

/// Pairing state machine and host handoff.
///
/// Use [`SyncClient::builder()`] to create a configured client.
pub mod sync;

/// WebSocket transport layer.
///
/// Client handshake, frame codec and the per-connection session task.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Color types
pub use color::{ColorToken, Rgba, extract_colors, hex_to_rgba, linear_to_srgb, srgb_to_linear};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ClientId, Generation, SessionToken, normalize_token};

// Protocol types
pub use protocol::{InboundMessage, OutboundMessage, ServerError};

// Sync types
pub use sync::{
    ConnectOutcome, DEFAULT_SERVER_URL, EventRelay, HostState, PairingState, RelayEvent,
    SyncClient, SyncClientBuilder, SyncMachine, SyncOptions,
};

// Transport types
pub use transport::{Reply, SessionConfig, TransportEvent, TransportHandle, TransportSession};
