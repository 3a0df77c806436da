//! Hitloop Device Registry
//!
//! This crate keeps the live set of hitloop sensor devices. Raw text from
//! any transport is split into frames, decoded with the configured layout,
//! and upserted into an id-keyed map. Devices that stay silent longer than
//! the inactivity timeout are pruned.
//!
//! # Architecture
//!
//! - [`DeviceRegistry`] is a plain synchronous engine with an injected
//!   [`Clock`], so it can be driven deterministically in tests.
//! - [`run_registry_actor`] owns a registry on one tokio task, serializes
//!   ingestion from many transports, and prunes on an interval.
//! - Changes are reported as [`RegistryEvent`]s and counted in
//!   [`RegistryStats`]; malformed frames never raise errors.
//!
//! # Example
//!
//! ```rust
//! use hitloop_registry::DeviceRegistry;
//!
//! let mut registry = DeviceRegistry::new();
//! let applied = registry.ingest("0a1bff804020100804ff\r\nnot-a-frame\n");
//!
//! assert_eq!(applied, 1);
//! assert_eq!(registry.get("0A1B").map(|d| d.tap), Some(true));
//! assert_eq!(registry.stats().frames_dropped(), 1);
//! ```

pub mod actor;
pub mod clock;
pub mod device;
pub mod error;
pub mod events;
pub mod registry;
pub mod stats;
pub mod transport;

pub use actor::{run_registry_actor, spawn_registry_actor, RegistryCommand, RegistryHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use device::{Device, DeviceSummary, DEFAULT_COLOR};
pub use error::RegistryError;
pub use events::{RegistryEvent, RemovalReason};
pub use registry::{DeviceRegistry, RegistryConfig, MAX_BUFFERED_EVENTS};
pub use stats::RegistryStats;
pub use transport::{TransportAllocator, TransportHandle};

pub use hitloop_protocol::{DeviceId, DropReason, FrameLayout};
