//! Device identifiers
//!
//! A hitloop device is identified by 16 bits carried as the first four hex
//! characters of every frame. The canonical text form is always four
//! lowercase hex digits, leading zeros included, so `"0A1B"` and `"0a1b"`
//! name the same device.

use std::fmt;
use std::str::FromStr;

use crate::error::IdError;

/// Number of hex characters in a device id
pub const ID_CHARS: usize = 4;

/// 16-bit device identifier with a canonical lowercase hex form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct DeviceId(u16);

impl DeviceId {
    /// Create an id from its raw 16-bit value
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw 16-bit value
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Parse a registry key
    ///
    /// Surrounding whitespace is ignored and only the first four characters
    /// are considered, so a whole frame can be passed as a key. Case is
    /// normalized.
    pub fn parse_key(text: &str) -> Result<Self, IdError> {
        let text = text.trim();
        let mut raw: u16 = 0;
        let mut taken = 0;
        for c in text.chars().take(ID_CHARS) {
            let nibble = c.to_digit(16).ok_or(IdError::InvalidCharset(c))?;
            raw = (raw << 4) | nibble as u16;
            taken += 1;
        }
        if taken < ID_CHARS {
            return Err(IdError::TooShort(text.to_string()));
        }
        Ok(Self(raw))
    }

    /// Canonical four-character lowercase form
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_key(s)
    }
}

impl From<u16> for DeviceId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_key(&value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_leading_zeros() {
        assert_eq!(DeviceId::new(0x000a).to_string(), "000a");
        assert_eq!(DeviceId::new(0xab12).to_hex(), "ab12");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let upper: DeviceId = "AB12".parse().unwrap();
        let lower: DeviceId = "ab12".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "ab12");
    }

    #[test]
    fn test_parse_uses_first_four_chars() {
        let id = DeviceId::parse_key("  0a1bff8040  ").unwrap();
        assert_eq!(id, DeviceId::new(0x0a1b));
    }

    #[test]
    fn test_parse_rejects_short_and_non_hex() {
        assert_eq!(
            DeviceId::parse_key("ab1"),
            Err(IdError::TooShort("ab1".to_string()))
        );
        assert_eq!(DeviceId::parse_key("ab1g"), Err(IdError::InvalidCharset('g')));
    }
}
