//! WebSocket transport layer.
//!
//! Client side of RFC 6455: the upgrade handshake, the frame codec and the
//! session task that owns the socket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Host (Rust)    │                              │  Sync Server    │
//! │                 │         WebSocket            │                 │
//! │ TransportHandle │◄────────────────────────────►│  session relay  │
//! │ → session task  │       ws:// or wss://        │                 │
//! │                 │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. `TransportSession::open` - Spawn the session task, get a handle
//! 2. `stream::connect` - TCP connect, TLS for `wss://`
//! 3. `handshake::negotiate` - HTTP Upgrade, `101` plus accept check
//! 4. Read loop - Decode frames, deliver text, answer pings
//! 5. `TransportHandle::close` - Close frame, then `Closed` event
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `endpoint` | `ws://`/`wss://` URL parsing |
//! | `frame` | Frame encoder and incremental decoder |
//! | `handshake` | Upgrade request and response validation |
//! | `session` | Session task, events and handle |
//! | `stream` | Plain or TLS byte stream |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket endpoint parsing.
pub mod endpoint;

/// Frame encoding and decoding.
pub mod frame;

/// HTTP Upgrade handshake.
pub mod handshake;

/// Transport session and read loop.
pub mod session;

/// Plain or TLS byte stream.
pub mod stream;

// ============================================================================
// Re-exports
// ============================================================================

pub use endpoint::Endpoint;
pub use frame::{DEFAULT_MAX_FRAME_LEN, Frame, FrameDecoder, Opcode, decode_frame, encode_frame};
pub use handshake::{HandshakeRequest, HandshakeResponse};
pub use session::{
    EventHandler, Reply, SessionConfig, TransportEvent, TransportHandle, TransportSession,
};
