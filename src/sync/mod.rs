//! Pairing/sync protocol and host handoff.
//!
//! # Architecture
//!
//! ```text
//!  host thread                          session task
//!  ───────────                          ────────────
//!  SyncClient::connect ──► SyncMachine ◄── TransportEvent
//!  SyncClient::tick    ◄── EventRelay  ◄── RelayEvent
//! ```
//!
//! The host calls [`SyncClient::connect`] and [`SyncClient::disconnect`]
//! directly and drains the [`EventRelay`] on its own timer. The session task
//! feeds transport events into the [`SyncMachine`], which pushes everything
//! host-visible onto the relay.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`SyncClientBuilder`] |
//! | `client` | [`SyncClient`] host surface |
//! | `options` | [`SyncOptions`] and defaults |
//! | `relay` | [`EventRelay`], [`RelayEvent`], [`HostState`] |
//! | `state` | [`SyncMachine`] and [`PairingState`] |

// ============================================================================
// Submodules
// ============================================================================

/// Builder for [`SyncClient`].
pub mod builder;

/// Host-facing sync client.
pub mod client;

/// Client configuration.
pub mod options;

/// Cross-thread event relay.
pub mod relay;

/// Pairing state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SyncClientBuilder;
pub use client::SyncClient;
pub use options::{DEFAULT_CLIENT_TYPE, DEFAULT_POLL_INTERVAL, DEFAULT_SERVER_URL, SyncOptions};
pub use relay::{EventRelay, HostState, RelayEvent};
pub use state::{ConnectOutcome, PairingState, SyncMachine};
