//! Hitloop Frame Protocol
//!
//! This crate provides parsing and encoding for the compact hexadecimal
//! telegram sent by hitloop motion-sensing devices. A frame carries a 16-bit
//! device id, three accelerometer axes, four corner-beacon proximities and,
//! in the tap layout, a tap byte.
//!
//! # Layouts
//!
//! - **Tap** (20 hex chars, default): `IIII AA AA AA NW NE SE SW TT`
//! - **Compact** (18 hex chars, legacy): `IIII AA AA AA NW NE SE SW`
//!
//! A deployment selects one layout; see [`layout`] for the field table.
//!
//! # Validation
//!
//! Decoding trims the input, requires at least the layout's length, reads
//! exactly that many characters and rejects any non-hex character among them.
//! Decoding is a pure function. Encoding is its lowercase inverse; producers
//! that start from continuous quantities go through [`SensorFrame::from_reading`],
//! which clamps rather than rejects.
//!
//! # Example
//!
//! ```rust
//! use hitloop_protocol::{FrameCodec, FrameLayout};
//!
//! let codec = FrameCodec::new(FrameLayout::Tap);
//! let frame = codec.decode("0A1Bff804020100804ff\n").unwrap();
//!
//! assert_eq!(frame.device_id.to_string(), "0a1b");
//! assert_eq!(frame.accel_y, 0x80);
//! assert!(frame.tap());
//! assert_eq!(codec.encode(&frame), "0a1bff804020100804ff");
//! ```

pub mod codec;
pub mod error;
pub mod frame;
pub mod id;
pub mod layout;

pub use codec::{decode, encode, encode_line, split_frames, FrameCodec};
pub use error::{DecodeError, DropReason, IdError};
pub use frame::{clamp_byte, clamp_word, SensorFrame, SensorReading, TAP_ACTIVE};
pub use id::DeviceId;
pub use layout::{Field, FrameLayout};
