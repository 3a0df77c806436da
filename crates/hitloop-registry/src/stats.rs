//! Ingestion counters

use hitloop_protocol::DropReason;
use serde::{Deserialize, Serialize};

/// Running totals kept by the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Non-empty frames seen by `ingest`
    pub frames_received: u64,
    /// Frames decoded and applied to a device
    pub frames_applied: u64,
    pub dropped_too_short: u64,
    pub dropped_invalid_charset: u64,
    pub dropped_numeric_overflow: u64,
    /// Lines a transport rejected for exceeding its length cap
    #[serde(default)]
    pub dropped_oversized: u64,
    /// Devices created by frames or explicit adds
    pub devices_created: u64,
    /// Devices removed by inactivity pruning
    pub devices_pruned: u64,
    /// Devices removed explicitly
    pub devices_removed: u64,
    /// Events discarded because the observer channel was full
    #[serde(default)]
    pub events_lagged: u64,
}

impl RegistryStats {
    /// Count one dropped frame
    pub fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::TooShort => self.dropped_too_short += 1,
            DropReason::InvalidCharset => self.dropped_invalid_charset += 1,
            DropReason::NumericOverflow => self.dropped_numeric_overflow += 1,
            DropReason::Oversized => self.dropped_oversized += 1,
        }
    }

    /// Drops for a single reason
    pub fn dropped(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::TooShort => self.dropped_too_short,
            DropReason::InvalidCharset => self.dropped_invalid_charset,
            DropReason::NumericOverflow => self.dropped_numeric_overflow,
            DropReason::Oversized => self.dropped_oversized,
        }
    }

    /// Drops across all reasons
    pub fn frames_dropped(&self) -> u64 {
        self.dropped_too_short
            + self.dropped_invalid_charset
            + self.dropped_numeric_overflow
            + self.dropped_oversized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_drop_by_reason() {
        let mut stats = RegistryStats::default();
        stats.record_drop(DropReason::TooShort);
        stats.record_drop(DropReason::TooShort);
        stats.record_drop(DropReason::InvalidCharset);
        stats.record_drop(DropReason::Oversized);

        assert_eq!(stats.dropped(DropReason::TooShort), 2);
        assert_eq!(stats.dropped(DropReason::InvalidCharset), 1);
        assert_eq!(stats.dropped(DropReason::NumericOverflow), 0);
        assert_eq!(stats.dropped(DropReason::Oversized), 1);
        assert_eq!(stats.frames_dropped(), 4);
    }
}
