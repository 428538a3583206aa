//! Client-to-server messages.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::error::Result;
use crate::identifiers::SessionToken;

// ============================================================================
// OutboundMessage
// ============================================================================

/// A message sent to the sync server.
///
/// # Format
///
/// ```json
/// { "type": "pair", "clientType": "blender", "sessionToken": "beam://ABC123" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Pairing request, sent right after the transport connects.
    Pair {
        /// Integrating application tag.
        #[serde(rename = "clientType")]
        client_type: String,
        /// Canonical session token.
        #[serde(rename = "sessionToken")]
        session_token: SessionToken,
    },

    /// Keep-alive request.
    Ping,

    /// Keep-alive answer.
    Pong,
}

impl OutboundMessage {
    /// Creates a pairing request.
    #[inline]
    #[must_use]
    pub fn pair(client_type: impl Into<String>, session_token: SessionToken) -> Self {
        Self::Pair {
            client_type: client_type.into(),
            session_token,
        }
    }

    /// Serializes to the wire text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
