//! Hex parsing and sRGB transfer functions.
//!
//! Hex values parse to sRGB-encoded channels in `[0, 1]`. The piecewise
//! transfer functions use the IEC 61966-2-1 breakpoints exactly, so linear
//! output matches what Blender-style hosts compute for the same hex.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// sRGB-encoded value at which the linear segment ends.
const SRGB_BREAKPOINT: f64 = 0.04045;

/// Linear value at which the linear segment ends.
const LINEAR_BREAKPOINT: f64 = 0.003_130_8;

/// Slope of the linear segment.
const LINEAR_SLOPE: f64 = 12.92;

/// Gamma exponent of the curved segment.
const GAMMA: f64 = 2.4;

// ============================================================================
// Rgba
// ============================================================================

/// Four color channels in `[0, 1]`.
///
/// Whether the RGB channels are sRGB-encoded or linear depends on where the
/// value came from; alpha is always linear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red channel.
    pub r: f64,
    /// Green channel.
    pub g: f64,
    /// Blue channel.
    pub b: f64,
    /// Alpha channel.
    pub a: f64,
}

impl Rgba {
    /// Creates a color from four channels.
    #[inline]
    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Converts sRGB-encoded RGB channels to linear.
    #[inline]
    #[must_use]
    pub fn to_linear(self) -> Self {
        Self::new(
            srgb_to_linear(self.r),
            srgb_to_linear(self.g),
            srgb_to_linear(self.b),
            self.a,
        )
    }

    /// Converts linear RGB channels to sRGB encoding.
    #[inline]
    #[must_use]
    pub fn to_srgb(self) -> Self {
        Self::new(
            linear_to_srgb(self.r),
            linear_to_srgb(self.g),
            linear_to_srgb(self.b),
            self.a,
        )
    }

    /// Returns channels as `[r, g, b, a]`.
    #[inline]
    #[must_use]
    pub const fn to_array(self) -> [f64; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Formats sRGB-encoded channels as `#RRGGBBAA`.
    #[must_use]
    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.to_array().map(channel_to_byte);
        format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
    }
}

impl From<Rgba> for [f64; 4] {
    fn from(color: Rgba) -> Self {
        color.to_array()
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Parses `#RGB`, `#RRGGBB` or `#RRGGBBAA` into sRGB-encoded channels.
///
/// The hash is optional and surrounding whitespace is ignored. Shorthand
/// digits are doubled; a missing alpha is opaque.
///
/// # Errors
///
/// Returns [`Error::InvalidColor`] for any other length or non-hex digits.
pub fn hex_to_rgba(text: &str) -> Result<Rgba> {
    let digits = text.trim().trim_start_matches('#');

    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::invalid_color(text));
    }

    let expanded = match digits.len() {
        3 => {
            let mut doubled: String = digits.chars().flat_map(|c| [c, c]).collect();
            doubled.push_str("FF");
            doubled
        }
        6 => format!("{digits}FF"),
        8 => digits.to_string(),
        _ => return Err(Error::invalid_color(text)),
    };

    let channel = |index: usize| -> Result<f64> {
        u8::from_str_radix(&expanded[index * 2..index * 2 + 2], 16)
            .map(|byte| f64::from(byte) / 255.0)
            .map_err(|_| Error::invalid_color(text))
    };

    Ok(Rgba::new(channel(0)?, channel(1)?, channel(2)?, channel(3)?))
}

/// Decodes one sRGB-encoded channel to linear light.
#[inline]
#[must_use]
pub fn srgb_to_linear(channel: f64) -> f64 {
    if channel <= SRGB_BREAKPOINT {
        channel / LINEAR_SLOPE
    } else {
        ((channel + 0.055) / 1.055).powf(GAMMA)
    }
}

/// Encodes one linear channel back to sRGB.
#[inline]
#[must_use]
pub fn linear_to_srgb(channel: f64) -> f64 {
    if channel <= LINEAR_BREAKPOINT {
        channel * LINEAR_SLOPE
    } else {
        1.055 * channel.powf(1.0 / GAMMA) - 0.055
    }
}

/// Quantizes a `[0, 1]` channel to a byte.
#[inline]
fn channel_to_byte(channel: f64) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPSILON,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_hex_full_red() {
        let color = hex_to_rgba("#FF0000").expect("valid hex");
        assert_eq!(color, Rgba::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_hex_shorthand_matches_long_form() {
        let short = hex_to_rgba("F00").expect("valid hex");
        let long = hex_to_rgba("#FF0000FF").expect("valid hex");
        assert_eq!(short, long);
    }

    #[test]
    fn test_hex_with_alpha() {
        let color = hex_to_rgba("#3366FF80").expect("valid hex");
        assert_close(color.r, 0x33 as f64 / 255.0);
        assert_close(color.g, 0x66 as f64 / 255.0);
        assert_close(color.b, 1.0);
        assert_close(color.a, 128.0 / 255.0);
    }

    #[test]
    fn test_hex_lowercase_and_whitespace() {
        let color = hex_to_rgba("  #00ff00 ").expect("valid hex");
        assert_eq!(color, Rgba::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn test_hex_rejects_bad_length() {
        for input in ["", "#", "#12", "#1234", "#12345", "#1234567", "#123456789"] {
            let err = hex_to_rgba(input).unwrap_err();
            assert!(matches!(err, Error::InvalidColor { .. }), "input {input:?}");
        }
    }

    #[test]
    fn test_hex_rejects_non_hex_digits() {
        assert!(hex_to_rgba("#GG0000").is_err());
        assert!(hex_to_rgba("#ÿÿÿ").is_err());
        assert!(hex_to_rgba("rgb(1,2,3)").is_err());
    }

    #[test]
    fn test_srgb_to_linear_endpoints() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert_close(srgb_to_linear(1.0), 1.0);
    }

    #[test]
    fn test_srgb_to_linear_breakpoint() {
        assert_close(srgb_to_linear(0.04045), 0.04045 / 12.92);
        assert_close(srgb_to_linear(0.5), ((0.5 + 0.055) / 1.055_f64).powf(2.4));
    }

    #[test]
    fn test_linear_to_srgb_breakpoint() {
        assert_close(linear_to_srgb(0.0031308), 0.0031308 * 12.92);
        assert_close(linear_to_srgb(1.0), 1.0);
    }

    #[test]
    fn test_round_trip_samples() {
        for step in 0..=100 {
            let c = f64::from(step) / 100.0;
            assert!((linear_to_srgb(srgb_to_linear(c)) - c).abs() < 1e-6);
        }
    }

    #[test]
    fn test_rgba_to_hex() {
        let color = hex_to_rgba("#3366FF").expect("valid hex");
        assert_eq!(color.to_hex(), "#3366FFFF");
        assert_eq!(color.to_linear().to_srgb().to_hex(), "#3366FFFF");
    }

    #[test]
    fn test_rgba_alpha_untouched_by_linearization() {
        let color = Rgba::new(0.5, 0.5, 0.5, 0.25).to_linear();
        assert_eq!(color.a, 0.25);
        assert!(color.r < 0.5);
    }
}
