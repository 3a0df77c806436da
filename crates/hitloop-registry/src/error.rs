//! Error types for the device registry
//!
//! Malformed wire input never produces one of these; it is counted and
//! dropped. These cover the application-facing surface only.

use hitloop_protocol::IdError;
use thiserror::Error;

/// Errors returned by registry operations and the actor handle
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No device with this id is currently tracked
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A key supplied by the application is not a device id
    #[error("invalid device id: {0}")]
    InvalidDeviceId(#[from] IdError),

    /// The registry actor has shut down
    #[error("registry actor is not running")]
    ActorClosed,
}
