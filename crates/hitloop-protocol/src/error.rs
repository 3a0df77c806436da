//! Error types for hitloop frame decoding

use thiserror::Error;

use crate::layout::Field;

/// Errors that can occur while decoding a sensor frame
///
/// Every variant is recoverable: the producer of a frame is unreliable
/// hardware on a noisy link, so consumers drop the frame and move on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Trimmed input is shorter than the layout requires
    #[error("frame too short: need {needed} hex chars, got {actual}")]
    TooShort { needed: usize, actual: usize },

    /// A non-hex character appeared inside the consumed prefix
    #[error("invalid character {found:?} at position {position}")]
    InvalidCharset { position: usize, found: char },

    /// A parsed field fell outside [0, 255]
    #[error("{field} value {value} does not fit in a byte")]
    NumericOverflow { field: Field, value: u32 },
}

impl DecodeError {
    /// Copyable tag for this failure, used by drop counters and events
    pub fn reason(&self) -> DropReason {
        match self {
            DecodeError::TooShort { .. } => DropReason::TooShort,
            DecodeError::InvalidCharset { .. } => DropReason::InvalidCharset,
            DecodeError::NumericOverflow { .. } => DropReason::NumericOverflow,
        }
    }
}

/// Why a frame was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DropReason {
    /// See [`DecodeError::TooShort`]
    TooShort,
    /// See [`DecodeError::InvalidCharset`]
    InvalidCharset,
    /// See [`DecodeError::NumericOverflow`]
    NumericOverflow,
    /// A transport line exceeded its length cap before a newline
    ///
    /// Raised by transports, never by [`decode`](crate::decode).
    Oversized,
}

impl DropReason {
    /// Short machine-friendly name
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::TooShort => "too_short",
            DropReason::InvalidCharset => "invalid_charset",
            DropReason::NumericOverflow => "numeric_overflow",
            DropReason::Oversized => "oversized",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from parsing a device id key
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Fewer than four characters after trimming
    #[error("device id too short: {0:?}")]
    TooShort(String),

    /// One of the four id characters is not a hex digit
    #[error("device id contains non-hex character {0:?}")]
    InvalidCharset(char),
}
