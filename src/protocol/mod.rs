//! Sync protocol message types.
//!
//! JSON text frames exchanged with the sync server after the WebSocket
//! upgrade.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `pair` | Client → Server | Pairing request with session token |
//! | `pair` | Server → Client | Pairing confirmation with origin |
//! | `sync` | Server → Client | Full replacement token tree |
//! | `registered` | Server → Client | Assigned client identifier |
//! | `error` | Server → Client | Advisory, fatal or generic error text |
//! | `ping` / `pong` | Both | Application keep-alive |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `inbound` | Server messages and error classification |
//! | `outbound` | Client messages |

// ============================================================================
// Submodules
// ============================================================================

/// Server-to-client messages.
pub mod inbound;

/// Client-to-server messages.
pub mod outbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use inbound::{INVALID_SESSION_TOKEN, InboundMessage, ServerError, WARN_PREFIX};
pub use outbound::OutboundMessage;
