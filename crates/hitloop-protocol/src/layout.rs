//! Frame layouts
//!
//! Two fixed-width layouts exist in the field. Both start with the 4-char
//! device id followed by 2-char byte fields:
//!
//! | Offset | Compact (18) | Tap (20) |
//! |--------|--------------|----------|
//! | 0..4   | id           | id       |
//! | 4..6   | accel x      | accel x  |
//! | 6..8   | accel y      | accel y  |
//! | 8..10  | accel z      | accel z  |
//! | 10..12 | d1 (NW)      | NW       |
//! | 12..14 | d2 (NE)      | NE       |
//! | 14..16 | d3 (SE)      | SE       |
//! | 16..18 | d4 (SW)      | SW       |
//! | 18..20 | -            | tap      |
//!
//! A deployment picks one layout explicitly. The decoder never guesses the
//! layout from the input length.

use std::fmt;

use crate::id::ID_CHARS;

/// Width of every byte field in hex characters
pub const BYTE_CHARS: usize = 2;

/// Named byte field within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Field {
    AccelX,
    AccelY,
    AccelZ,
    DistanceNw,
    DistanceNe,
    DistanceSe,
    DistanceSw,
    Tap,
}

impl Field {
    /// Field name as it appears in logs
    pub fn name(&self) -> &'static str {
        match self {
            Field::AccelX => "accel_x",
            Field::AccelY => "accel_y",
            Field::AccelZ => "accel_z",
            Field::DistanceNw => "distance_nw",
            Field::DistanceNe => "distance_ne",
            Field::DistanceSe => "distance_se",
            Field::DistanceSw => "distance_sw",
            Field::Tap => "tap",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const COMPACT_FIELDS: [Field; 7] = [
    Field::AccelX,
    Field::AccelY,
    Field::AccelZ,
    Field::DistanceNw,
    Field::DistanceNe,
    Field::DistanceSe,
    Field::DistanceSw,
];

const TAP_FIELDS: [Field; 8] = [
    Field::AccelX,
    Field::AccelY,
    Field::AccelZ,
    Field::DistanceNw,
    Field::DistanceNe,
    Field::DistanceSe,
    Field::DistanceSw,
    Field::Tap,
];

/// Fixed-width arrangement of a hex frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FrameLayout {
    /// Legacy 18-char layout without a tap byte (simulators, phone emulator)
    Compact,
    /// 20-char layout with a trailing tap byte (firmware and visualizers)
    #[default]
    Tap,
}

impl FrameLayout {
    /// Number of hex characters a frame of this layout occupies
    pub const fn char_len(&self) -> usize {
        ID_CHARS + self.fields().len() * BYTE_CHARS
    }

    /// Byte fields in wire order, after the id
    pub const fn fields(&self) -> &'static [Field] {
        match self {
            FrameLayout::Compact => &COMPACT_FIELDS,
            FrameLayout::Tap => &TAP_FIELDS,
        }
    }

    /// Whether frames of this layout carry a tap byte
    pub const fn has_tap(&self) -> bool {
        matches!(self, FrameLayout::Tap)
    }

    /// Iterate `(field, char offset)` pairs in wire order
    pub fn offsets(&self) -> impl Iterator<Item = (Field, usize)> {
        self.fields()
            .iter()
            .enumerate()
            .map(|(i, field)| (*field, ID_CHARS + i * BYTE_CHARS))
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            FrameLayout::Compact => "compact (18 chars)",
            FrameLayout::Tap => "tap (20 chars)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_lengths() {
        assert_eq!(FrameLayout::Compact.char_len(), 18);
        assert_eq!(FrameLayout::Tap.char_len(), 20);
    }

    #[test]
    fn test_offsets_follow_table() {
        let offsets: Vec<_> = FrameLayout::Tap.offsets().collect();
        assert_eq!(offsets[0], (Field::AccelX, 4));
        assert_eq!(offsets[3], (Field::DistanceNw, 10));
        assert_eq!(offsets[5], (Field::DistanceSe, 14));
        assert_eq!(offsets[6], (Field::DistanceSw, 16));
        assert_eq!(offsets[7], (Field::Tap, 18));
        assert!(FrameLayout::Compact.offsets().all(|(f, _)| f != Field::Tap));
    }

    #[test]
    fn test_default_is_tap() {
        assert_eq!(FrameLayout::default(), FrameLayout::Tap);
        assert!(FrameLayout::default().has_tap());
        assert!(!FrameLayout::Compact.has_tap());
    }
}
