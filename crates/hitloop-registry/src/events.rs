//! Registry event stream
//!
//! Every change to the device set and every dropped frame is buffered as an
//! event. The actor forwards them to observers in the order they happened.

use hitloop_protocol::{DeviceId, DropReason};
use serde::{Deserialize, Serialize};

use crate::transport::TransportHandle;

/// Why a device left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Silent for longer than the inactivity timeout
    Pruned,
    /// Removed by the application
    Explicit,
}

/// Events emitted by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// A device appeared
    DeviceAdded {
        id: DeviceId,
        transport: Option<TransportHandle>,
    },

    /// A known device sent a new frame
    DeviceUpdated { id: DeviceId },

    /// A device was removed
    DeviceRemoved { id: DeviceId, reason: RemovalReason },

    /// A frame failed to decode and was skipped
    FrameDropped {
        reason: DropReason,
        transport: Option<TransportHandle>,
    },
}

impl RegistryEvent {
    /// Whether this event changes the set of known devices
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            RegistryEvent::DeviceAdded { .. } | RegistryEvent::DeviceRemoved { .. }
        )
    }

    /// Device the event concerns, if any
    pub fn device_id(&self) -> Option<DeviceId> {
        match self {
            RegistryEvent::DeviceAdded { id, .. }
            | RegistryEvent::DeviceUpdated { id }
            | RegistryEvent::DeviceRemoved { id, .. } => Some(*id),
            RegistryEvent::FrameDropped { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let id = DeviceId::new(0x0a1b);
        let added = RegistryEvent::DeviceAdded {
            id,
            transport: None,
        };
        let updated = RegistryEvent::DeviceUpdated { id };
        let dropped = RegistryEvent::FrameDropped {
            reason: DropReason::TooShort,
            transport: Some(TransportHandle(1)),
        };

        assert!(added.is_lifecycle());
        assert!(!updated.is_lifecycle());
        assert_eq!(updated.device_id(), Some(id));
        assert_eq!(dropped.device_id(), None);
    }
}
