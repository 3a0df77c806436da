//! Frame codec
//!
//! Decoding is strict about the consumed prefix and tolerant of anything
//! after it: producers append newline remnants and occasional garbage, so
//! only the first `layout.char_len()` characters (after trimming) are read.

use std::fmt::Write;

use crate::error::DecodeError;
use crate::frame::SensorFrame;
use crate::id::{DeviceId, ID_CHARS};
use crate::layout::{Field, FrameLayout, BYTE_CHARS};

/// Decode one frame using the given layout
pub fn decode(raw: &str, layout: FrameLayout) -> Result<SensorFrame, DecodeError> {
    let needed = layout.char_len();
    let trimmed = raw.trim();

    // Byte index where the consumed prefix ends, or the char count if short
    let end = match trimmed.char_indices().nth(needed) {
        Some((idx, _)) => idx,
        None => {
            let actual = trimmed.chars().count();
            if actual < needed {
                return Err(DecodeError::TooShort { needed, actual });
            }
            trimmed.len()
        }
    };
    let prefix = &trimmed[..end];

    if let Some((position, found)) = prefix
        .chars()
        .enumerate()
        .find(|(_, c)| !c.is_ascii_hexdigit())
    {
        return Err(DecodeError::InvalidCharset { position, found });
    }

    // Prefix is pure ASCII from here on, so byte slicing is char slicing
    let id_raw = u16::from_str_radix(&prefix[..ID_CHARS], 16).map_err(|_| {
        DecodeError::InvalidCharset {
            position: 0,
            found: prefix.chars().next().unwrap_or_default(),
        }
    })?;

    let mut frame = SensorFrame::empty(DeviceId::new(id_raw));
    for (field, offset) in layout.offsets() {
        let value = parse_byte(field, &prefix[offset..offset + BYTE_CHARS], offset)?;
        frame.set_field(field, value);
    }
    Ok(frame)
}

/// Parse one hex byte field
///
/// Goes through a wider integer so that a malformed slice wider than two
/// characters is reported as an overflow instead of being truncated.
fn parse_byte(field: Field, hex: &str, offset: usize) -> Result<u8, DecodeError> {
    let value = u32::from_str_radix(hex, 16).map_err(|_| {
        let (position, found) = hex
            .chars()
            .enumerate()
            .find(|(_, c)| !c.is_ascii_hexdigit())
            .unwrap_or((0, hex.chars().next().unwrap_or_default()));
        DecodeError::InvalidCharset {
            position: offset + position,
            found,
        }
    })?;
    u8::try_from(value).map_err(|_| DecodeError::NumericOverflow { field, value })
}

/// Encode a frame as lowercase fixed-width hex, without a terminator
///
/// The compact layout has no tap byte, so `tap_byte` is not emitted.
pub fn encode(frame: &SensorFrame, layout: FrameLayout) -> String {
    let mut out = String::with_capacity(layout.char_len() + 1);
    // Writing into a String cannot fail.
    let _ = write!(out, "{}", frame.device_id);
    for field in layout.fields() {
        let _ = write!(out, "{:02x}", frame.field(*field));
    }
    out
}

/// Encode a frame followed by `\n`, ready for a newline-delimited transport
pub fn encode_line(frame: &SensorFrame, layout: FrameLayout) -> String {
    let mut out = encode(frame, layout);
    out.push('\n');
    out
}

/// Split a transport message into candidate frames
///
/// Accepts `\n` and `\r\n` separators; entries are trimmed and empty ones
/// skipped.
pub fn split_frames(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(str::trim).filter(|s| !s.is_empty())
}

/// A codec bound to one deployment layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCodec {
    layout: FrameLayout,
}

impl FrameCodec {
    /// Create a codec for the given layout
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout }
    }

    /// Layout this codec reads and writes
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Required frame length in hex characters
    pub fn char_len(&self) -> usize {
        self.layout.char_len()
    }

    /// Decode one frame
    pub fn decode(&self, raw: &str) -> Result<SensorFrame, DecodeError> {
        decode(raw, self.layout)
    }

    /// Encode one frame without a terminator
    pub fn encode(&self, frame: &SensorFrame) -> String {
        encode(frame, self.layout)
    }

    /// Encode one frame followed by `\n`
    pub fn encode_line(&self, frame: &SensorFrame) -> String {
        encode_line(frame, self.layout)
    }

    /// Decode every frame of a batched message, keeping failures in order
    pub fn decode_batch<'a>(
        &self,
        text: &'a str,
    ) -> impl Iterator<Item = Result<SensorFrame, DecodeError>> + 'a {
        let layout = self.layout;
        split_frames(text).map(move |raw| decode(raw, layout))
    }
}
