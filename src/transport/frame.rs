//! RFC 6455 data framing.
//!
//! Only what the sync channel needs: single-frame messages, client-side
//! masking on send, and incremental decoding of a byte stream.
//!
//! # Wire Format
//!
//! ```text
//! +-----+--------+------+-------------------+-----------+-----------+
//! | FIN | opcode | MASK | len (7 bits)      | ext len   | mask key  | payload
//! | 1b  | 4b     | 1b   | 126 → u16, 127 → u64 (BE)     | 4 bytes   |
//! +-----+--------+------+-------------------+-----------+-----------+
//! ```
//!
//! The FIN bit is read but not acted on; messages on this channel never
//! need fragmentation.

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// FIN bit of the first header byte.
const FIN_BIT: u8 = 0x80;

/// MASK bit of the second header byte.
const MASK_BIT: u8 = 0x80;

/// 7-bit length marker for a 16-bit extended length.
const LEN_16_MARKER: u8 = 126;

/// 7-bit length marker for a 64-bit extended length.
const LEN_64_MARKER: u8 = 127;

/// Smallest payload that needs the 64-bit length form.
const LEN_64_THRESHOLD: usize = 65_536;

/// Default bound on a single inbound payload (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

// ============================================================================
// Opcode
// ============================================================================

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Continuation of a fragmented message.
    Continuation,
    /// UTF-8 text message.
    Text,
    /// Binary message.
    Binary,
    /// Connection close.
    Close,
    /// Transport-level ping.
    Ping,
    /// Transport-level pong.
    Pong,
    /// Reserved or unknown opcode.
    Reserved(u8),
}

impl Opcode {
    /// Parses the low nibble of the first header byte.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Self {
        match byte & 0x0F {
            0x0 => Self::Continuation,
            0x1 => Self::Text,
            0x2 => Self::Binary,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            other => Self::Reserved(other),
        }
    }

    /// Returns the wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
            Self::Reserved(other) => other & 0x0F,
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One decoded frame with its payload already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// FIN bit as received.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: Opcode,
    /// Unmasked payload.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Returns the payload as text for `Text` frames with valid UTF-8.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self.opcode {
            Opcode::Text => std::str::from_utf8(&self.payload).ok(),
            _ => None,
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes a final frame masked with `mask`.
///
/// Length encoding switches at 126 and 65536 bytes, mirroring the decoder.
#[must_use]
pub fn encode_frame(opcode: Opcode, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
    let len = payload.len();
    let mut frame = Vec::with_capacity(len + 14);

    frame.push(FIN_BIT | opcode.as_u8());

    if len < LEN_16_MARKER as usize {
        frame.push(MASK_BIT | len as u8);
    } else if len < LEN_64_THRESHOLD {
        frame.push(MASK_BIT | LEN_16_MARKER);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(MASK_BIT | LEN_64_MARKER);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }

    frame.extend_from_slice(&mask);
    frame.extend(
        payload
            .iter()
            .enumerate()
            .map(|(i, byte)| byte ^ mask[i % 4]),
    );

    frame
}

/// Encodes a client frame with a fresh random mask.
#[inline]
#[must_use]
pub fn encode_client_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    encode_frame(opcode, payload, rand::random())
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes one frame from the front of `buf`.
///
/// Returns `Ok(None)` until `buf` holds a complete frame, otherwise the frame
/// and the number of bytes it occupied.
///
/// # Errors
///
/// Returns [`Error::FrameTooLarge`] when the declared payload exceeds `max_len`.
pub fn decode_frame(buf: &[u8], max_len: usize) -> Result<Option<(Frame, usize)>> {
    let [first, second, ..] = *buf else {
        return Ok(None);
    };

    let fin = first & FIN_BIT != 0;
    let opcode = Opcode::from_u8(first);
    let masked = second & MASK_BIT != 0;

    let mut offset = 2;
    let declared: u64 = match second & 0x7F {
        LEN_16_MARKER => {
            let Some(bytes) = buf.get(2..4) else {
                return Ok(None);
            };
            offset = 4;
            u64::from(u16::from_be_bytes([bytes[0], bytes[1]]))
        }
        LEN_64_MARKER => {
            let Some(bytes) = buf.get(2..10) else {
                return Ok(None);
            };
            offset = 10;
            let mut be = [0u8; 8];
            be.copy_from_slice(bytes);
            u64::from_be_bytes(be)
        }
        short => u64::from(short),
    };

    if declared > max_len as u64 {
        return Err(Error::frame_too_large(declared, max_len));
    }
    let len = declared as usize;

    let mask = if masked {
        let Some(key) = buf.get(offset..offset + 4) else {
            return Ok(None);
        };
        offset += 4;
        Some([key[0], key[1], key[2], key[3]])
    } else {
        None
    };

    let end = offset
        .checked_add(len)
        .ok_or_else(|| Error::frame_too_large(declared, max_len))?;
    let Some(raw) = buf.get(offset..end) else {
        return Ok(None);
    };

    let payload = match mask {
        Some(key) => raw
            .iter()
            .enumerate()
            .map(|(i, byte)| byte ^ key[i % 4])
            .collect(),
        None => raw.to_vec(),
    };

    Ok(Some((
        Frame {
            fin,
            opcode,
            payload,
        },
        end,
    )))
}

// ============================================================================
// FrameDecoder
// ============================================================================

/// Accumulating decoder for a byte stream.
///
/// Feed bytes as they arrive and pull frames until [`FrameDecoder::next_frame`]
/// returns `None`. Incomplete frames stay buffered.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    /// Bytes received but not yet consumed.
    buffer: Vec<u8>,
    /// Bound on a single payload.
    max_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[inline]
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_len,
        }
    }

    /// Creates a decoder primed with bytes left over from the handshake.
    #[inline]
    #[must_use]
    pub fn with_remainder(remainder: Vec<u8>, max_len: usize) -> Self {
        Self {
            buffer: remainder,
            max_len,
        }
    }

    /// Appends received bytes.
    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pops the next complete frame, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] for an oversized frame header.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some((frame, consumed)) = decode_frame(&self.buffer, self.max_len)? else {
            return Ok(None);
        };

        self.buffer.drain(..consumed);
        trace!(opcode = ?frame.opcode, len = frame.payload.len(), "Frame decoded");

        Ok(Some(frame))
    }

    /// Drains every complete frame currently buffered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] for an oversized frame header.
    pub fn decode_all(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Returns the unconsumed bytes.
    #[inline]
    #[must_use]
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }
}

// ============================================================================
// Tests
// ============================================================================
