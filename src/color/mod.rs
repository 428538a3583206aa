//! Color extraction and normalization.
//!
//! Turns a nested design-token payload into a flat list of named colors in
//! linear space, the form 3D hosts store swatches in.
//!
//! # Pipeline
//!
//! ```text
//! payload.collections[].modes[].tokens[type=color].value
//!     → hex_to_rgba     (sRGB-encoded floats)
//!     → srgb_to_linear  (per RGB channel, alpha untouched)
//!     → ColorToken
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `convert` | Hex parsing and sRGB transfer functions |
//! | `extract` | Token tree walk and [`ColorToken`] |

// ============================================================================
// Submodules
// ============================================================================

/// Hex parsing and sRGB transfer functions.
pub mod convert;

/// Token payload walk.
pub mod extract;

// ============================================================================
// Re-exports
// ============================================================================

pub use convert::{Rgba, hex_to_rgba, linear_to_srgb, srgb_to_linear};
pub use extract::{ColorToken, extract_colors};
