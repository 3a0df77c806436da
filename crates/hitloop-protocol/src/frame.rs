//! Decoded sensor frames and producer-side readings

use crate::id::DeviceId;
use crate::layout::Field;

/// Raw tap byte that counts as a tap
///
/// The mapping is an exact match: partial activation codes (1..=254) are
/// not taps.
pub const TAP_ACTIVE: u8 = 0xff;

/// One decoded hitloop telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorFrame {
    /// Sending device
    pub device_id: DeviceId,
    /// Raw accelerometer X axis
    pub accel_x: u8,
    /// Raw accelerometer Y axis
    pub accel_y: u8,
    /// Raw accelerometer Z axis
    pub accel_z: u8,
    /// Proximity to the north-west beacon (255 = near)
    pub distance_nw: u8,
    /// Proximity to the north-east beacon
    pub distance_ne: u8,
    /// Proximity to the south-east beacon
    pub distance_se: u8,
    /// Proximity to the south-west beacon
    pub distance_sw: u8,
    /// Raw tap byte (always 0 for the compact layout)
    pub tap_byte: u8,
}

impl SensorFrame {
    /// Frame with every sensor field zeroed
    pub fn empty(device_id: DeviceId) -> Self {
        Self {
            device_id,
            accel_x: 0,
            accel_y: 0,
            accel_z: 0,
            distance_nw: 0,
            distance_ne: 0,
            distance_se: 0,
            distance_sw: 0,
            tap_byte: 0,
        }
    }

    /// Whether the device reported a tap
    pub fn tap(&self) -> bool {
        self.tap_byte == TAP_ACTIVE
    }

    /// Read a byte field by name
    pub fn field(&self, field: Field) -> u8 {
        match field {
            Field::AccelX => self.accel_x,
            Field::AccelY => self.accel_y,
            Field::AccelZ => self.accel_z,
            Field::DistanceNw => self.distance_nw,
            Field::DistanceNe => self.distance_ne,
            Field::DistanceSe => self.distance_se,
            Field::DistanceSw => self.distance_sw,
            Field::Tap => self.tap_byte,
        }
    }

    /// Write a byte field by name
    pub fn set_field(&mut self, field: Field, value: u8) {
        match field {
            Field::AccelX => self.accel_x = value,
            Field::AccelY => self.accel_y = value,
            Field::AccelZ => self.accel_z = value,
            Field::DistanceNw => self.distance_nw = value,
            Field::DistanceNe => self.distance_ne = value,
            Field::DistanceSe => self.distance_se = value,
            Field::DistanceSw => self.distance_sw = value,
            Field::Tap => self.tap_byte = value,
        }
    }

    /// Build a frame from continuous producer values, clamping every field
    pub fn from_reading(reading: &SensorReading) -> Self {
        Self {
            device_id: DeviceId::new(clamp_word(reading.id)),
            accel_x: clamp_byte(reading.accel_x),
            accel_y: clamp_byte(reading.accel_y),
            accel_z: clamp_byte(reading.accel_z),
            distance_nw: clamp_byte(reading.distance_nw),
            distance_ne: clamp_byte(reading.distance_ne),
            distance_se: clamp_byte(reading.distance_se),
            distance_sw: clamp_byte(reading.distance_sw),
            tap_byte: if reading.tap { TAP_ACTIVE } else { 0 },
        }
    }
}

/// Producer-side reading before quantization
///
/// Simulators and emulators derive these from physical or simulated
/// quantities that may transiently leave the encodable range.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorReading {
    pub id: i64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub distance_nw: f64,
    pub distance_ne: f64,
    pub distance_se: f64,
    pub distance_sw: f64,
    pub tap: bool,
}

/// Round and clamp a value into a byte; NaN becomes 0
pub fn clamp_byte(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

/// Clamp an integer into the 16-bit id range
pub fn clamp_word(value: i64) -> u16 {
    value.clamp(0, u16::MAX as i64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_is_exact_match() {
        let mut frame = SensorFrame::empty(DeviceId::new(1));
        for byte in [0x00, 0x01, 0x80, 0xfe] {
            frame.tap_byte = byte;
            assert!(!frame.tap(), "byte {byte:#04x} must not count as a tap");
        }
        frame.tap_byte = 0xff;
        assert!(frame.tap());
    }

    #[test]
    fn test_clamp_byte() {
        assert_eq!(clamp_byte(-3.0), 0);
        assert_eq!(clamp_byte(127.4), 127);
        assert_eq!(clamp_byte(127.5), 128);
        assert_eq!(clamp_byte(300.0), 255);
        assert_eq!(clamp_byte(f64::NAN), 0);
        assert_eq!(clamp_byte(f64::INFINITY), 255);
    }

    #[test]
    fn test_clamp_word() {
        assert_eq!(clamp_word(-1), 0);
        assert_eq!(clamp_word(0x1234), 0x1234);
        assert_eq!(clamp_word(70_000), 0xffff);
    }

    #[test]
    fn test_from_reading_clamps() {
        let reading = SensorReading {
            id: 0x0a1b,
            accel_x: 260.0,
            accel_y: -5.0,
            accel_z: 64.2,
            distance_nw: 32.0,
            distance_ne: 16.0,
            distance_se: 8.0,
            distance_sw: 4.0,
            tap: true,
        };
        let frame = SensorFrame::from_reading(&reading);
        assert_eq!(frame.device_id.to_string(), "0a1b");
        assert_eq!(frame.accel_x, 255);
        assert_eq!(frame.accel_y, 0);
        assert_eq!(frame.accel_z, 64);
        assert_eq!(frame.distance_sw, 4);
        assert!(frame.tap());
    }

    #[test]
    fn test_field_accessors() {
        let mut frame = SensorFrame::empty(DeviceId::new(7));
        frame.set_field(Field::DistanceSe, 9);
        assert_eq!(frame.distance_se, 9);
        assert_eq!(frame.field(Field::DistanceSe), 9);
    }
}
