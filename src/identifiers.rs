//! Type-safe identifiers for sync sessions.
//!
//! Newtype wrappers keep the pairing token, the connection generation and the
//! server-assigned client id from being mixed up at compile time.
//!
//! | Type | Source | Lifetime |
//! |------|--------|----------|
//! | [`SessionToken`] | user input, normalized | one connection attempt |
//! | [`Generation`] | [`crate::sync::SyncMachine`] counter | one connect/disconnect call |
//! | [`ClientId`] | `registered` server message | one connection |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Scheme prefix of the canonical session token form.
pub const TOKEN_PREFIX: &str = "beam://";

/// Hex-only token body.
static TOKEN_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]+$").expect("token pattern is valid"));

// ============================================================================
// SessionToken
// ============================================================================

/// Pairing token in canonical `beam://<UPPERCASE_HEX>` form.
///
/// Only [`SessionToken::parse`] constructs one, so a value of this type is
/// always canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionToken(String);

impl SessionToken {
    /// Parses and normalizes user input.
    ///
    /// Surrounding whitespace and any literal `beam://` are removed, the rest
    /// must be hex digits (either case) and is uppercased.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] for empty or non-hex input.
    pub fn parse(input: &str) -> Result<Self> {
        normalize_token(input)
            .map(Self)
            .ok_or_else(|| Error::invalid_token(input))
    }

    /// Returns the canonical token string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the uppercase hex body without the `beam://` prefix.
    #[inline]
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.0[TOKEN_PREFIX.len()..]
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionToken {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SessionToken> for String {
    fn from(token: SessionToken) -> Self {
        token.0
    }
}

/// Normalizes a session token string.
///
/// Returns `None` when nothing hexadecimal remains after stripping.
#[must_use]
pub fn normalize_token(input: &str) -> Option<String> {
    let stripped = input.trim().replace(TOKEN_PREFIX, "");

    if !TOKEN_BODY.is_match(&stripped) {
        return None;
    }

    Some(format!("{TOKEN_PREFIX}{}", stripped.to_ascii_uppercase()))
}

// ============================================================================
// Generation
// ============================================================================

/// Monotonic tag of one logical connection attempt.
///
/// Every connect and disconnect advances the generation; events carrying an
/// older value are stale and get dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Creates a generation from a raw counter value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the following generation.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

// ============================================================================
// ClientId
// ============================================================================

/// Identifier the sync server assigns in a `registered` message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wraps a server-provided id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
