//! Hitloop Device Simulation Library
//!
//! This crate provides simulated sensor devices for exercising the registry
//! without physical hardware. It includes:
//!
//! - **VirtualDevice**: Wanders a floor with corner beacons and tumbles randomly
//! - **Emitter**: Ticks a fleet and sends frame batches over a channel
//!
//! # Example
//!
//! ```rust
//! use hitloop_protocol::FrameLayout;
//! use hitloop_sim::{VirtualDevice, VirtualDeviceConfig, World};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let world = World::default();
//! let mut device = VirtualDevice::from_config(&VirtualDeviceConfig::default());
//! let mut rng = StdRng::seed_from_u64(1337);
//!
//! device.tick(0.05, &world, &mut rng);
//! let frame = device.encode_frame(&world, FrameLayout::Tap);
//! assert_eq!(frame.trim_end().len(), 20);
//! ```

pub mod device;
pub mod emitter;

pub use device::{Orientation, VirtualDevice, VirtualDeviceConfig, World};
pub use emitter::{run_emitter, Emitter, DEFAULT_SEED};
