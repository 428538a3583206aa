//! Server-to-client messages.
//!
//! Inbound frames are parsed leniently: the `type` tag selects the variant,
//! missing optional fields become `None`, and unknown types are kept as
//! [`InboundMessage::Unknown`] rather than failing.
//!
//! | `type` | Fields | Variant |
//! |--------|--------|---------|
//! | `pair` | `origin` | [`InboundMessage::Pair`] |
//! | `sync` | `payload` | [`InboundMessage::Sync`] |
//! | `registered` | `clientId` | [`InboundMessage::Registered`] |
//! | `error` | `error` | [`InboundMessage::Error`] |
//! | `ping` / `pong` | none | [`InboundMessage::Ping`] / [`InboundMessage::Pong`] |

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Prefix marking a non-fatal server advisory.
pub const WARN_PREFIX: &str = "[warn]";

/// Server text for an unknown or expired session token.
pub const INVALID_SESSION_TOKEN: &str = "Invalid session token";

/// Stand-in when an `error` message carries no text.
const UNKNOWN_ERROR: &str = "Unknown error";

// ============================================================================
// InboundMessage
// ============================================================================

/// A parsed message from the sync server.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Pairing confirmed.
    Pair {
        /// Name of the paired token source.
        origin: Option<String>,
    },

    /// Full replacement token tree.
    Sync {
        /// The `payload` object, `None` when missing or not an object.
        payload: Option<Value>,
    },

    /// Client identifier assigned by the server.
    Registered {
        /// Assigned identifier.
        client_id: Option<String>,
    },

    /// Server-reported error text.
    Error {
        /// Error text, `"Unknown error"` when absent.
        message: String,
    },

    /// Keep-alive request.
    Ping,

    /// Keep-alive answer.
    Pong,

    /// Any other `type`.
    Unknown {
        /// The unrecognised tag.
        kind: String,
    },
}

impl InboundMessage {
    /// Parses one text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not JSON
    /// - [`Error::Protocol`] if it is not an object with a string `type`
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Interprets an already-decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `value` is not an object with a string
    /// `type`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::protocol("message is not a JSON object"))?;

        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("message has no string \"type\""))?;

        let message = match kind {
            "pair" => Self::Pair {
                origin: string_field(object, "origin"),
            },
            "sync" => Self::Sync {
                payload: object.get("payload").filter(|p| p.is_object()).cloned(),
            },
            "registered" => Self::Registered {
                client_id: string_field(object, "clientId"),
            },
            "error" => Self::Error {
                message: match object.get("error") {
                    Some(Value::String(text)) => text.clone(),
                    Some(Value::Null) | None => UNKNOWN_ERROR.to_string(),
                    Some(other) => other.to_string(),
                },
            },
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            other => Self::Unknown {
                kind: other.to_string(),
            },
        };

        Ok(message)
    }

    /// Returns the wire `type` tag.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Pair { .. } => "pair",
            Self::Sync { .. } => "sync",
            Self::Registered { .. } => "registered",
            Self::Error { .. } => "error",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Unknown { kind } => kind,
        }
    }
}

/// Reads an optional string field.
fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

// ============================================================================
// ServerError
// ============================================================================

/// Classification of server-reported error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// `[warn]`-prefixed advisory; the connection stays up.
    Warning(String),
    /// The session token was rejected; the client must disconnect.
    SessionNotFound,
    /// Anything else; the connection stays up.
    Other(String),
}

impl ServerError {
    /// Classifies the `error` text of an `error` message.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        if let Some(advisory) = text.strip_prefix(WARN_PREFIX) {
            return Self::Warning(advisory.trim().to_string());
        }

        if text == INVALID_SESSION_TOKEN {
            return Self::SessionNotFound;
        }

        Self::Other(text.to_string())
    }

    /// Returns `true` if the connection must be torn down.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionNotFound)
    }

    /// Returns the status line shown to the user.
    #[must_use]
    pub fn status_text(&self) -> String {
        match self {
            Self::Warning(advisory) => advisory.clone(),
            Self::SessionNotFound => "Session not found".to_string(),
            Self::Other(text) => format!("Error: {text}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
