//! Frame emitter task
//!
//! Ticks a fleet of virtual devices at a fixed period and sends each round
//! of frames as one newline-joined batch, the way a gateway forwards a burst
//! of readings over a single connection.

use std::time::Duration;

use hitloop_protocol::FrameLayout;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::device::{VirtualDevice, World};

/// Default seed for simulated motion
pub const DEFAULT_SEED: u64 = 1337;

/// A fleet of virtual devices that produces frame batches
#[derive(Debug, Clone)]
pub struct Emitter {
    devices: Vec<VirtualDevice>,
    world: World,
    layout: FrameLayout,
    rng: StdRng,
}

impl Emitter {
    pub fn new(devices: Vec<VirtualDevice>, world: World, layout: FrameLayout, seed: u64) -> Self {
        Self {
            devices,
            world,
            layout,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn devices(&self) -> &[VirtualDevice] {
        &self.devices
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Advance every device by `dt` seconds and encode one batch
    pub fn step(&mut self, dt: f64) -> String {
        let mut batch = String::new();
        for device in &mut self.devices {
            device.tick(dt, &self.world, &mut self.rng);
            batch.push_str(&device.encode_frame(&self.world, self.layout));
        }
        batch
    }

    /// Send a batch every `period` until the receiver goes away
    pub async fn run(mut self, period: Duration, tx: mpsc::Sender<String>) {
        let period = period.max(Duration::from_millis(1));
        info!(
            devices = self.devices.len(),
            layout = self.layout.name(),
            period_ms = period.as_millis() as u64,
            "Emitter started"
        );

        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let dt = period.as_secs_f64();

        loop {
            timer.tick().await;
            if self.devices.is_empty() {
                if tx.is_closed() {
                    debug!("Emitter receiver closed");
                    break;
                }
                continue;
            }
            let batch = self.step(dt);
            if tx.send(batch).await.is_err() {
                debug!("Emitter receiver closed");
                break;
            }
        }

        info!("Emitter stopped");
    }
}

/// Run an emitter for `devices` with the default seed
pub async fn run_emitter(
    devices: Vec<VirtualDevice>,
    world: World,
    layout: FrameLayout,
    period: Duration,
    tx: mpsc::Sender<String>,
) {
    Emitter::new(devices, world, layout, DEFAULT_SEED)
        .run(period, tx)
        .await
}
