//! Transport handles
//!
//! The connection layer owns sockets and simulated links. The registry only
//! remembers which link a device was last heard on, as an opaque id.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque identifier for one transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransportHandle(pub u32);

impl TransportHandle {
    /// Get the raw handle value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport#{}", self.0)
    }
}

/// Issues unique transport handles, starting at 1
#[derive(Debug)]
pub struct TransportAllocator {
    next: AtomicU32,
}

impl TransportAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Allocate the next handle
    pub fn allocate(&self) -> TransportHandle {
        TransportHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TransportAllocator {
    fn default() -> Self {
        Self::new()
    }
}
