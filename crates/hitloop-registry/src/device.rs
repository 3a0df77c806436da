//! Device state tracking

use std::time::{Duration, Instant};

use hitloop_protocol::{DeviceId, SensorFrame, TAP_ACTIVE};
use serde::{Deserialize, Serialize};

use crate::transport::TransportHandle;

/// Display color assigned to new devices
pub const DEFAULT_COLOR: [u8; 3] = [255, 255, 255];

/// Latest known state of one sensor device
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    /// Canonical id
    pub id: DeviceId,
    /// Raw accelerometer X axis
    pub accel_x: u8,
    /// Raw accelerometer Y axis
    pub accel_y: u8,
    /// Raw accelerometer Z axis
    pub accel_z: u8,
    /// Proximity to the north-west beacon
    pub distance_nw: u8,
    /// Proximity to the north-east beacon
    pub distance_ne: u8,
    /// Proximity to the south-east beacon
    pub distance_se: u8,
    /// Proximity to the south-west beacon
    pub distance_sw: u8,
    /// Tap reported in the latest frame
    pub tap: bool,
    /// When the latest frame was applied
    pub last_seen: Instant,
    /// Link the device was first heard on
    pub transport: Option<TransportHandle>,
    /// Display color, set by the application
    pub color: [u8; 3],
    /// Vibration motor state, set by the application
    pub motor_state: bool,
}

impl Device {
    /// Create a device with zeroed sensors
    pub fn new(id: DeviceId, now: Instant) -> Self {
        Self {
            id,
            accel_x: 0,
            accel_y: 0,
            accel_z: 0,
            distance_nw: 0,
            distance_ne: 0,
            distance_se: 0,
            distance_sw: 0,
            tap: false,
            last_seen: now,
            transport: None,
            color: DEFAULT_COLOR,
            motor_state: false,
        }
    }

    /// Create a device from its first frame
    pub fn from_frame(
        frame: &SensorFrame,
        transport: Option<TransportHandle>,
        now: Instant,
    ) -> Self {
        let mut device = Self::new(frame.device_id, now);
        device.transport = transport;
        device.apply_frame(frame, now);
        device
    }

    /// Overwrite the sensor fields and refresh `last_seen`
    ///
    /// Display attributes and the transport are left alone.
    pub fn apply_frame(&mut self, frame: &SensorFrame, now: Instant) {
        self.accel_x = frame.accel_x;
        self.accel_y = frame.accel_y;
        self.accel_z = frame.accel_z;
        self.distance_nw = frame.distance_nw;
        self.distance_ne = frame.distance_ne;
        self.distance_se = frame.distance_se;
        self.distance_sw = frame.distance_sw;
        self.tap = frame.tap();
        self.last_seen = now;
    }

    /// Sensor fields as a frame
    pub fn sensor_frame(&self) -> SensorFrame {
        SensorFrame {
            device_id: self.id,
            accel_x: self.accel_x,
            accel_y: self.accel_y,
            accel_z: self.accel_z,
            distance_nw: self.distance_nw,
            distance_ne: self.distance_ne,
            distance_se: self.distance_se,
            distance_sw: self.distance_sw,
            tap_byte: if self.tap { TAP_ACTIVE } else { 0 },
        }
    }

    /// Time since the last frame; zero if the clock went backwards
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    /// Whether the device has been silent for longer than `timeout`
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        self.age(now) > timeout
    }

    /// Serializable snapshot
    pub fn summary(&self, now: Instant) -> DeviceSummary {
        DeviceSummary {
            id: self.id,
            accel: [self.accel_x, self.accel_y, self.accel_z],
            distances: [
                self.distance_nw,
                self.distance_ne,
                self.distance_se,
                self.distance_sw,
            ],
            tap: self.tap,
            age_ms: self.age(now).as_millis() as u64,
            transport: self.transport,
            color: self.color,
            motor_state: self.motor_state,
        }
    }
}

/// Snapshot of a device that can cross channels and be logged as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: DeviceId,
    /// x, y, z
    pub accel: [u8; 3],
    /// NW, NE, SE, SW
    pub distances: [u8; 4],
    pub tap: bool,
    /// Milliseconds since the last frame
    pub age_ms: u64,
    pub transport: Option<TransportHandle>,
    pub color: [u8; 3],
    pub motor_state: bool,
}
