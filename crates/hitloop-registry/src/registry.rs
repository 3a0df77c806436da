//! Device registry engine
//!
//! Owns the id-keyed device map, applies decoded frames, prunes silent
//! devices, and buffers events for the actor to forward.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hitloop_protocol::{
    split_frames, DeviceId, DropReason, FrameCodec, FrameLayout, SensorFrame,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::device::Device;
use crate::events::{RegistryEvent, RemovalReason};
use crate::stats::RegistryStats;
use crate::transport::TransportHandle;

/// Events kept when nobody drains them; oldest are discarded first
pub const MAX_BUFFERED_EVENTS: usize = 4096;

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Frame layout used by this deployment
    pub layout: FrameLayout,
    /// Silence after which a device is pruned (ms)
    pub inactive_timeout_ms: u64,
    /// How often the actor prunes (ms)
    pub prune_interval_ms: u64,
}

impl RegistryConfig {
    pub fn inactive_timeout(&self) -> Duration {
        Duration::from_millis(self.inactive_timeout_ms)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            layout: FrameLayout::Tap,
            inactive_timeout_ms: 5000,
            prune_interval_ms: 1000,
        }
    }
}

/// The device registry
#[derive(Debug)]
pub struct DeviceRegistry {
    config: RegistryConfig,
    codec: FrameCodec,
    devices: BTreeMap<DeviceId, Device>,
    transport: Option<TransportHandle>,
    clock: Arc<dyn Clock>,
    stats: RegistryStats,
    event_buffer: VecDeque<RegistryEvent>,
}

impl DeviceRegistry {
    /// Create a registry with default configuration and the system clock
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create with custom configuration and the system clock
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create with custom configuration and time source
    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            codec: FrameCodec::new(config.layout),
            config,
            devices: BTreeMap::new(),
            transport: None,
            clock,
            stats: RegistryStats::default(),
            event_buffer: VecDeque::new(),
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Codec configured for this registry's layout
    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Change the inactivity timeout used by later prunes
    ///
    /// The timeout is kept in whole milliseconds; any sub-millisecond
    /// remainder is dropped and oversized values saturate.
    pub fn set_inactive_timeout(&mut self, timeout: Duration) {
        self.config.inactive_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }

    /// Bind the transport assigned to devices created by `ingest`
    pub fn bind_transport(&mut self, transport: Option<TransportHandle>) {
        self.transport = transport;
    }

    /// Currently bound transport
    pub fn transport(&self) -> Option<TransportHandle> {
        self.transport
    }

    /// Current time according to the registry clock
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Ingest a batch of newline-delimited frames on the bound transport
    pub fn ingest(&mut self, raw: &str) -> usize {
        let now = self.clock.now();
        self.ingest_from(self.transport, raw, now)
    }

    /// Ingest a batch of frames heard on `transport` at `now`
    ///
    /// Frames are applied in order. Malformed frames are counted, logged at
    /// debug and skipped. Returns the number of frames applied.
    pub fn ingest_from(
        &mut self,
        transport: Option<TransportHandle>,
        raw: &str,
        now: Instant,
    ) -> usize {
        let mut applied = 0;
        for line in split_frames(raw) {
            self.stats.frames_received += 1;
            match self.codec.decode(line) {
                Ok(frame) => {
                    self.apply_frame(&frame, transport, now);
                    applied += 1;
                }
                Err(e) => {
                    let reason = e.reason();
                    debug!(%reason, error = %e, "Dropping malformed frame");
                    self.stats.record_drop(reason);
                    self.push_event(RegistryEvent::FrameDropped { reason, transport });
                }
            }
        }
        applied
    }

    /// Upsert one decoded frame
    ///
    /// Existing devices keep their transport; new devices take `transport`.
    pub fn apply_frame(
        &mut self,
        frame: &SensorFrame,
        transport: Option<TransportHandle>,
        now: Instant,
    ) {
        self.stats.frames_applied += 1;
        let id = frame.device_id;

        if let Some(device) = self.devices.get_mut(&id) {
            device.apply_frame(frame, now);
            self.push_event(RegistryEvent::DeviceUpdated { id });
            return;
        }

        self.devices.insert(id, Device::from_frame(frame, transport, now));
        self.stats.devices_created += 1;
        info!(%id, ?transport, "Device added");
        self.push_event(RegistryEvent::DeviceAdded { id, transport });
    }

    /// Look up a device by key text; any case, extra characters ignored
    pub fn get(&self, id: &str) -> Option<Device> {
        let id = DeviceId::parse_key(id).ok()?;
        self.get_id(id)
    }

    /// Look up a device by id
    pub fn get_id(&self, id: DeviceId) -> Option<Device> {
        self.devices.get(&id).cloned()
    }

    /// Whether a device with this key is tracked
    pub fn contains(&self, id: &str) -> bool {
        DeviceId::parse_key(id)
            .map(|id| self.devices.contains_key(&id))
            .unwrap_or(false)
    }

    /// Snapshot of all devices ordered by id
    pub fn get_all(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    /// Number of tracked devices
    pub fn count(&self) -> usize {
        self.devices.len()
    }

    /// Tracked ids in order
    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.keys().copied().collect()
    }

    /// Prune against the registry clock
    pub fn prune(&mut self) -> Vec<DeviceId> {
        let now = self.clock.now();
        self.prune_at(now)
    }

    /// Remove devices silent for longer than the inactivity timeout
    pub fn prune_at(&mut self, now: Instant) -> Vec<DeviceId> {
        let timeout = self.config.inactive_timeout();
        let expired: Vec<DeviceId> = self
            .devices
            .values()
            .filter(|d| d.is_expired(now, timeout))
            .map(|d| d.id)
            .collect();

        for id in &expired {
            if let Some(device) = self.devices.remove(id) {
                info!(%id, age_ms = device.age(now).as_millis() as u64, "Device pruned");
                self.stats.devices_pruned += 1;
                self.push_event(RegistryEvent::DeviceRemoved {
                    id: *id,
                    reason: RemovalReason::Pruned,
                });
            }
        }
        expired
    }

    /// Insert a device explicitly, replacing any with the same id
    ///
    /// Binds the registry transport if the device has none and stamps
    /// `last_seen` with the registry clock.
    pub fn add_device(&mut self, mut device: Device) -> Option<Device> {
        if device.transport.is_none() {
            device.transport = self.transport;
        }
        device.last_seen = self.clock.now();

        let id = device.id;
        let transport = device.transport;
        let replaced = self.devices.insert(id, device);
        if replaced.is_none() {
            self.stats.devices_created += 1;
            info!(%id, ?transport, "Device added");
            self.push_event(RegistryEvent::DeviceAdded { id, transport });
        } else {
            self.push_event(RegistryEvent::DeviceUpdated { id });
        }
        replaced
    }

    /// Remove a device by key
    pub fn remove_device(&mut self, id: &str) -> Option<Device> {
        let id = DeviceId::parse_key(id).ok()?;
        let device = self.devices.remove(&id)?;
        info!(%id, "Device removed");
        self.stats.devices_removed += 1;
        self.push_event(RegistryEvent::DeviceRemoved {
            id,
            reason: RemovalReason::Explicit,
        });
        Some(device)
    }

    /// Set a device's display color; false if the device is unknown
    pub fn set_color(&mut self, id: &str, color: [u8; 3]) -> bool {
        match self.device_mut(id) {
            Some(device) => {
                device.color = color;
                true
            }
            None => false,
        }
    }

    /// Set a device's motor state; false if the device is unknown
    pub fn set_motor_state(&mut self, id: &str, on: bool) -> bool {
        match self.device_mut(id) {
            Some(device) => {
                device.motor_state = on;
                true
            }
            None => false,
        }
    }

    /// Ingestion counters
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    /// Count a frame a transport rejected before it reached the decoder
    pub fn reject_frame(&mut self, transport: Option<TransportHandle>, reason: DropReason) {
        debug!(%reason, ?transport, "Frame rejected by transport");
        self.stats.record_drop(reason);
        self.push_event(RegistryEvent::FrameDropped { reason, transport });
    }

    /// Count events an observer could not keep up with
    pub fn record_lagged_events(&mut self, count: u64) {
        self.stats.events_lagged += count;
    }

    /// Take all buffered events in order
    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        self.event_buffer.drain(..).collect()
    }

    fn device_mut(&mut self, id: &str) -> Option<&mut Device> {
        let id = DeviceId::parse_key(id).ok()?;
        self.devices.get_mut(&id)
    }

    fn push_event(&mut self, event: RegistryEvent) {
        if self.event_buffer.len() >= MAX_BUFFERED_EVENTS {
            self.event_buffer.pop_front();
        }
        self.event_buffer.push_back(event);
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
