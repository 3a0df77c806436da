//! Virtual device simulation
//!
//! A virtual device wanders across a rectangular floor with a beacon in each
//! corner, tumbling randomly as it goes. Its accelerometer and beacon
//! readings are quantized into the same frames real hardware sends.

use std::f64::consts::TAU;

use hitloop_protocol::{encode_line, FrameLayout, SensorFrame, SensorReading};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Maximum random change in angular velocity per tick (rad/s)
const ANGULAR_JITTER: f64 = 0.1;
/// Per-tick angular velocity decay
const ANGULAR_DECAY: f64 = 0.98;
/// Accelerometer full-scale range in g
const ACCEL_RANGE_G: f64 = 2.0;

/// Floor the devices move on
///
/// Coordinates are centered: x spans `[-w/2, w/2]`, z spans `[-h/2, h/2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct World {
    pub grid_width: f64,
    pub grid_height: f64,
    /// Slowest speed for randomly spawned devices (units/s)
    pub min_speed: f64,
    /// Fastest speed for randomly spawned devices (units/s)
    pub max_speed: f64,
}

impl Default for World {
    fn default() -> Self {
        Self {
            grid_width: 800.0,
            grid_height: 600.0,
            min_speed: 40.0,
            max_speed: 120.0,
        }
    }
}

impl World {
    fn half_extent(&self) -> (f64, f64) {
        (self.grid_width / 2.0, self.grid_height / 2.0)
    }

    /// Beacon positions in NW, NE, SE, SW order
    pub fn beacons(&self) -> [(f64, f64); 4] {
        let (hw, hh) = self.half_extent();
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
    }

    /// Distance from the center to a corner; maps to proximity 0
    pub fn max_distance(&self) -> f64 {
        let (hw, hh) = self.half_extent();
        hw.hypot(hh)
    }
}

/// Roll, pitch and yaw in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Configuration for creating a virtual device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualDeviceConfig {
    /// 16-bit device id
    pub id: u16,
    /// Starting position
    pub x: f64,
    pub z: f64,
    /// Starting velocity (units/s)
    pub vx: f64,
    pub vz: f64,
    /// Chance per tick of reporting a tap
    pub tap_probability: f64,
}

impl Default for VirtualDeviceConfig {
    fn default() -> Self {
        Self {
            id: 0x0001,
            x: 0.0,
            z: 0.0,
            vx: 60.0,
            vz: 40.0,
            tap_probability: 0.0,
        }
    }
}

/// A simulated sensor device
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDevice {
    id: u16,
    position: (f64, f64),
    velocity: (f64, f64),
    orientation: Orientation,
    angular_velocity: Orientation,
    tap_probability: f64,
    tap: bool,
}

impl VirtualDevice {
    /// Create a device at rest at the origin
    pub fn new(id: u16) -> Self {
        Self {
            id,
            position: (0.0, 0.0),
            velocity: (0.0, 0.0),
            orientation: Orientation::default(),
            angular_velocity: Orientation::default(),
            tap_probability: 0.0,
            tap: false,
        }
    }

    /// Create a device from configuration
    pub fn from_config(config: &VirtualDeviceConfig) -> Self {
        Self {
            position: (config.x, config.z),
            velocity: (config.vx, config.vz),
            tap_probability: config.tap_probability.clamp(0.0, 1.0),
            ..Self::new(config.id)
        }
    }

    /// Spawn `count` devices with random ids, positions and headings
    pub fn random_fleet<R: Rng>(count: usize, world: &World, rng: &mut R) -> Vec<Self> {
        let (hw, hh) = world.half_extent();
        (0..count)
            .map(|_| {
                let id: u16 = rng.gen();
                let x = jitter(rng, hw);
                let z = jitter(rng, hh);
                let speed =
                    world.min_speed + rng.gen::<f64>() * (world.max_speed - world.min_speed);
                let heading = rng.gen::<f64>() * TAU;
                Self {
                    position: (x, z),
                    velocity: (heading.cos() * speed, heading.sin() * speed),
                    ..Self::new(id)
                }
            })
            .collect()
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Position as (x, z)
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Velocity as (vx, vz)
    pub fn velocity(&self) -> (f64, f64) {
        self.velocity
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    /// Force the tap flag for the next reading
    pub fn set_tap(&mut self, tap: bool) {
        self.tap = tap;
    }

    /// Advance the simulation by `dt` seconds
    pub fn tick<R: Rng>(&mut self, dt: f64, world: &World, rng: &mut R) {
        let av = &mut self.angular_velocity;
        av.roll = (av.roll + jitter(rng, ANGULAR_JITTER)) * ANGULAR_DECAY;
        av.pitch = (av.pitch + jitter(rng, ANGULAR_JITTER)) * ANGULAR_DECAY;
        av.yaw = (av.yaw + jitter(rng, ANGULAR_JITTER)) * ANGULAR_DECAY;

        self.orientation.roll += av.roll * dt;
        self.orientation.pitch += av.pitch * dt;
        self.orientation.yaw += av.yaw * dt;

        self.position.0 += self.velocity.0 * dt;
        self.position.1 += self.velocity.1 * dt;

        let (hw, hh) = world.half_extent();
        if self.position.0 <= -hw || self.position.0 >= hw {
            self.position.0 = self.position.0.clamp(-hw, hw);
            self.velocity.0 = -self.velocity.0;
        }
        if self.position.1 <= -hh || self.position.1 >= hh {
            self.position.1 = self.position.1.clamp(-hh, hh);
            self.velocity.1 = -self.velocity.1;
        }

        self.tap = self.tap_probability > 0.0 && rng.gen::<f64>() < self.tap_probability;
    }

    /// Accelerometer x, y, z mapped from [-2g, 2g] onto [0, 255]
    pub fn accelerometer(&self) -> [f64; 3] {
        let Orientation { roll, pitch, .. } = self.orientation;
        let ax = ACCEL_RANGE_G * pitch.sin();
        let ay = ACCEL_RANGE_G * roll.sin();
        let az = ACCEL_RANGE_G * pitch.cos() * roll.cos();
        [ax, ay, az].map(|g| map_range(g, -ACCEL_RANGE_G, ACCEL_RANGE_G, 0.0, 255.0).round())
    }

    /// Proximity to each beacon in NW, NE, SE, SW order (255 = on top of it)
    pub fn beacon_distances(&self, world: &World) -> [f64; 4] {
        let max = world.max_distance();
        let (x, z) = self.position;
        world.beacons().map(|(bx, bz)| {
            let d = (x - bx).hypot(z - bz);
            map_range(d, 0.0, max, 255.0, 0.0).round().clamp(0.0, 255.0)
        })
    }

    /// Current reading before quantization
    pub fn reading(&self, world: &World) -> SensorReading {
        let [accel_x, accel_y, accel_z] = self.accelerometer();
        let [distance_nw, distance_ne, distance_se, distance_sw] = self.beacon_distances(world);
        SensorReading {
            id: i64::from(self.id),
            accel_x,
            accel_y,
            accel_z,
            distance_nw,
            distance_ne,
            distance_se,
            distance_sw,
            tap: self.tap,
        }
    }

    /// Current reading as a frame
    pub fn frame(&self, world: &World) -> SensorFrame {
        SensorFrame::from_reading(&self.reading(world))
    }

    /// Newline-terminated lowercase frame text
    pub fn encode_frame(&self, world: &World, layout: FrameLayout) -> String {
        encode_line(&self.frame(world), layout)
    }
}

/// Uniform in [-half_width, half_width)
fn jitter<R: Rng>(rng: &mut R, half_width: f64) -> f64 {
    (rng.gen::<f64>() - 0.5) * 2.0 * half_width
}

fn map_range(value: f64, from_lo: f64, from_hi: f64, to_lo: f64, to_hi: f64) -> f64 {
    to_lo + (value - from_lo) * (to_hi - to_lo) / (from_hi - from_lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitloop_protocol::decode;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_level_device_reads_one_g_down() {
        let device = VirtualDevice::new(1);
        // sin(0) = 0 maps to the midpoint, 2g maps to full scale
        assert_eq!(device.accelerometer(), [128.0, 128.0, 255.0]);
    }

    #[test]
    fn test_center_is_equidistant() {
        let world = World::default();
        let device = VirtualDevice::new(1);
        let d = device.beacon_distances(&world);
        assert!(d.iter().all(|v| *v == d[0]));
        assert_eq!(d[0], 0.0);
    }

    #[test]
    fn test_corner_is_near_its_beacon() {
        let world = World::default();
        let config = VirtualDeviceConfig {
            x: -400.0,
            z: -300.0,
            ..Default::default()
        };
        let device = VirtualDevice::from_config(&config);
        let [nw, ne, se, sw] = device.beacon_distances(&world);
        assert_eq!(nw, 255.0);
        // Anything further than the half-diagonal reads as far away
        assert_eq!([ne, se, sw], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_bounce_inverts_velocity() {
        let world = World::default();
        let config = VirtualDeviceConfig {
            x: 395.0,
            vx: 100.0,
            vz: 0.0,
            ..Default::default()
        };
        let mut device = VirtualDevice::from_config(&config);
        let mut rng = StdRng::seed_from_u64(1);
        device.tick(0.1, &world, &mut rng);

        assert_eq!(device.position().0, 400.0);
        assert_eq!(device.velocity().0, -100.0);
    }

    #[test]
    fn test_encoded_frame_decodes() {
        let world = World::default();
        let mut device = VirtualDevice::new(0x0a1b);
        device.set_tap(true);

        let text = device.encode_frame(&world, FrameLayout::Tap);
        assert!(text.ends_with('\n'));
        assert_eq!(text.trim().len(), 20);

        let frame = decode(&text, FrameLayout::Tap).unwrap();
        assert_eq!(frame.device_id.as_u16(), 0x0a1b);
        assert_eq!(frame.accel_z, 255);
        assert!(frame.tap());

        let compact = device.encode_frame(&world, FrameLayout::Compact);
        assert_eq!(compact.trim().len(), 18);
    }

    #[test]
    fn test_random_fleet_is_reproducible() {
        let world = World::default();
        let a = VirtualDevice::random_fleet(5, &world, &mut StdRng::seed_from_u64(1337));
        let b = VirtualDevice::random_fleet(5, &world, &mut StdRng::seed_from_u64(1337));
        assert_eq!(a, b);
        for device in &a {
            let (x, z) = device.position();
            assert!(x.abs() <= 400.0 && z.abs() <= 300.0);
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn stays_inside_world(seed in any::<u64>(), ticks in 1usize..200) {
                let world = World::default();
                let mut rng = StdRng::seed_from_u64(seed);
                let mut fleet = VirtualDevice::random_fleet(3, &world, &mut rng);
                for _ in 0..ticks {
                    for device in &mut fleet {
                        device.tick(0.05, &world, &mut rng);
                    }
                }
                for device in &fleet {
                    let (x, z) = device.position();
                    prop_assert!(x.abs() <= 400.0 && z.abs() <= 300.0);
                    let accel = device.accelerometer();
                    prop_assert!(accel.iter().all(|v| (0.0..=255.0).contains(v)));
                }
            }
        }
    }
}
