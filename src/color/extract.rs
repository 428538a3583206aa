//! Token payload walk.
//!
//! A `sync` payload is a tree:
//!
//! ```json
//! {
//!   "collections": [{
//!     "name": "Brand",
//!     "modes": [{
//!       "name": "Value",
//!       "tokens": [{ "type": "color", "name": "primary", "value": "#3366FF" }]
//!     }]
//!   }]
//! }
//! ```
//!
//! Only `type == "color"` tokens are kept. Anything else, including wrong
//! shapes, is skipped without failing the rest of the walk.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::convert::{Rgba, hex_to_rgba};

// ============================================================================
// ColorToken
// ============================================================================

/// One named color from a sync payload, in linear space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorToken {
    /// Token name.
    pub name: String,
    /// Linear RGB with straight alpha.
    pub rgba: Rgba,
    /// Owning collection name.
    pub collection: String,
    /// Mode name within the collection.
    pub mode: String,
}

impl ColorToken {
    /// Returns the color re-encoded as sRGB `#RRGGBBAA`.
    #[inline]
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.rgba.to_srgb().to_hex()
    }

    /// Returns `collection / name`, or just the name outside a collection.
    #[must_use]
    pub fn label(&self) -> String {
        if self.collection.is_empty() {
            self.name.clone()
        } else {
            format!("{} / {}", self.collection, self.name)
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Walks `collections → modes → tokens` and converts every color token.
///
/// Tokens whose value fails to parse are logged and skipped.
#[must_use]
pub fn extract_colors(payload: &Value) -> Vec<ColorToken> {
    let mut colors = Vec::new();

    for collection in children(payload, "collections") {
        let collection_name = get_string(collection, "name");

        for mode in children(collection, "modes") {
            let mode_name = get_string(mode, "name");

            for token in children(mode, "tokens") {
                if token.get("type").and_then(Value::as_str) != Some("color") {
                    continue;
                }

                let name = get_string(token, "name");
                let value = token.get("value").and_then(Value::as_str).unwrap_or_default();

                match hex_to_rgba(value) {
                    Ok(srgb) => colors.push(ColorToken {
                        name,
                        rgba: srgb.to_linear(),
                        collection: collection_name.clone(),
                        mode: mode_name.clone(),
                    }),
                    Err(e) => {
                        warn!(token = %name, value = ?token.get("value"), error = %e, "Skipping invalid color");
                    }
                }
            }
        }
    }

    colors
}

/// Iterates an array field, yielding nothing when absent or not an array.
fn children<'a>(node: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    node.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Gets a string field, empty when missing.
#[inline]
fn get_string(node: &Value, key: &str) -> String {
    node.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
