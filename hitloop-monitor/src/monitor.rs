//! Background tasks that observe and feed the registry

use std::time::Duration;

use hitloop_registry::{RegistryEvent, RegistryHandle, TransportHandle};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Log the device count and a JSON snapshot every `period`
pub async fn run_snapshots(registry: RegistryHandle, period: Duration) {
    let mut timer = interval(period.max(Duration::from_millis(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        timer.tick().await;

        let (devices, stats) = match (registry.snapshot().await, registry.stats().await) {
            (Ok(devices), Ok(stats)) => (devices, stats),
            _ => break,
        };

        info!(
            devices = devices.len(),
            applied = stats.frames_applied,
            dropped = stats.frames_dropped(),
            pruned = stats.devices_pruned,
            "Registry snapshot"
        );
        match serde_json::to_string(&devices) {
            Ok(json) => debug!(snapshot = %json, "Devices"),
            Err(e) => warn!(error = %e, "Failed to serialize snapshot"),
        }
    }
}

/// Drain registry events, logging lifecycle changes as JSON
pub async fn log_events(mut event_rx: mpsc::Receiver<RegistryEvent>) {
    while let Some(event) = event_rx.recv().await {
        if !event.is_lifecycle() {
            continue;
        }
        match serde_json::to_string(&event) {
            Ok(json) => debug!(event = %json, "Registry event"),
            Err(e) => warn!(error = %e, "Failed to serialize event"),
        }
    }
}

/// Feed simulated frame batches into the registry under one transport
pub async fn forward_simulated(
    mut batches: mpsc::Receiver<String>,
    registry: RegistryHandle,
    transport: TransportHandle,
) {
    while let Some(batch) = batches.recv().await {
        if registry.send_frames(Some(transport), batch).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitloop_protocol::FrameLayout;
    use hitloop_registry::{spawn_registry_actor, DeviceRegistry};
    use hitloop_sim::{run_emitter, VirtualDevice, World};

    #[tokio::test]
    async fn test_simulated_devices_appear() {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (registry, task) = spawn_registry_actor(DeviceRegistry::new(), event_tx);
        let logger = tokio::spawn(log_events(event_rx));

        let (batch_tx, batch_rx) = mpsc::channel(4);
        let devices = vec![VirtualDevice::new(0x0010), VirtualDevice::new(0x0020)];
        let emitter = tokio::spawn(run_emitter(
            devices,
            World::default(),
            FrameLayout::Tap,
            Duration::from_millis(5),
            batch_tx,
        ));
        let forwarder = tokio::spawn(forward_simulated(
            batch_rx,
            registry.clone(),
            TransportHandle(99),
        ));

        let mut count = 0;
        for _ in 0..100 {
            count = registry.count().await.unwrap();
            if count == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(count, 2);
        let device = registry.get("0010").await.unwrap().unwrap();
        assert_eq!(device.transport, Some(TransportHandle(99)));

        registry.shutdown().await.unwrap();
        task.await.unwrap();
        // The forwarder stops once the actor is gone, which drops the
        // emitter's receiver and stops the emitter in turn.
        forwarder.await.unwrap();
        emitter.await.unwrap();
        logger.await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshots_stop_with_registry() {
        let (event_tx, _event_rx) = mpsc::channel(64);
        let (registry, task) = spawn_registry_actor(DeviceRegistry::new(), event_tx);
        let snapshots = tokio::spawn(run_snapshots(registry.clone(), Duration::from_millis(5)));

        tokio::time::sleep(Duration::from_millis(20)).await;
        registry.shutdown().await.unwrap();
        task.await.unwrap();
        snapshots.await.unwrap();
    }
}
