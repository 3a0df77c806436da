//! Registry Actor
//!
//! The registry is owned by a single tokio task. Transports, the simulator
//! and the application all talk to it through a command channel, so every
//! mutation is serialized without locks. Pruning runs on the same task from
//! an interval timer.
//!
//! # Example
//!
//! ```rust,ignore
//! use hitloop_registry::{spawn_registry_actor, DeviceRegistry};
//! use tokio::sync::mpsc;
//!
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//! let (handle, task) = spawn_registry_actor(DeviceRegistry::new(), event_tx);
//!
//! handle.ingest(None, "0a1bff804020100804ff\n".into()).await?;
//! let devices = handle.get_all().await?;
//! ```

use hitloop_protocol::{DeviceId, DropReason};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::device::{Device, DeviceSummary};
use crate::error::RegistryError;
use crate::events::RegistryEvent;
use crate::registry::DeviceRegistry;
use crate::stats::RegistryStats;
use crate::transport::TransportHandle;

/// Capacity of the command channel created by [`spawn_registry_actor`]
pub const COMMAND_BUFFER: usize = 256;

/// Commands sent to the registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// Ingest a batch of newline-delimited frames
    Ingest {
        /// Link the text arrived on
        transport: Option<TransportHandle>,
        /// Raw text, one or more frames
        text: String,
        /// Receives the applied count; `None` for fire-and-forget
        response: Option<oneshot::Sender<usize>>,
    },

    /// Count a frame the transport rejected before decoding
    RejectFrame {
        transport: Option<TransportHandle>,
        reason: DropReason,
    },

    /// Look up one device
    Get {
        id: DeviceId,
        response: oneshot::Sender<Option<Device>>,
    },

    /// Snapshot of all devices ordered by id
    GetAll {
        response: oneshot::Sender<Vec<Device>>,
    },

    /// Serializable snapshot of all devices
    Snapshot {
        response: oneshot::Sender<Vec<DeviceSummary>>,
    },

    /// Number of tracked devices
    Count { response: oneshot::Sender<usize> },

    /// Copy of the ingestion counters
    Stats {
        response: oneshot::Sender<RegistryStats>,
    },

    /// Insert a device explicitly
    AddDevice {
        device: Device,
        /// Receives the replaced device, if any
        response: oneshot::Sender<Option<Device>>,
    },

    /// Remove a device
    RemoveDevice {
        id: DeviceId,
        response: oneshot::Sender<Option<Device>>,
    },

    /// Set a device's display color
    SetColor {
        id: DeviceId,
        color: [u8; 3],
        response: oneshot::Sender<bool>,
    },

    /// Set a device's motor state
    SetMotorState {
        id: DeviceId,
        on: bool,
        response: oneshot::Sender<bool>,
    },

    /// Prune now instead of waiting for the timer
    Prune {
        response: oneshot::Sender<Vec<DeviceId>>,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Run the registry actor
///
/// Processes commands until `Shutdown` arrives or every sender is dropped,
/// and prunes at the configured interval. Buffered registry events are
/// forwarded to `event_tx` after each command and each prune tick. The
/// actor never waits on `event_tx`: events that do not fit are discarded and
/// counted in [`RegistryStats::events_lagged`].
///
/// # Arguments
///
/// * `registry` - The registry to own
/// * `cmd_rx` - Receiver for commands sent to the actor
/// * `event_tx` - Sender for events emitted by the registry
pub async fn run_registry_actor(
    mut registry: DeviceRegistry,
    mut cmd_rx: mpsc::Receiver<RegistryCommand>,
    event_tx: mpsc::Sender<RegistryEvent>,
) {
    let period = registry.config().prune_interval().max(Duration::from_millis(1));
    info!(
        layout = registry.config().layout.name(),
        timeout_ms = registry.config().inactive_timeout_ms,
        prune_ms = period.as_millis() as u64,
        "Registry actor started"
    );

    let mut prune_timer = interval(period);
    prune_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                if !handle_command(&mut registry, cmd) {
                    info!("Registry actor shutting down");
                    forward_events(&mut registry, &event_tx);
                    break;
                }
            }
            _ = prune_timer.tick() => {
                let pruned = registry.prune();
                if !pruned.is_empty() {
                    debug!(count = pruned.len(), remaining = registry.count(), "Prune tick");
                }
            }
        }
        forward_events(&mut registry, &event_tx);
    }

    info!("Registry actor stopped");
}

/// Apply one command; returns false on shutdown
fn handle_command(registry: &mut DeviceRegistry, cmd: RegistryCommand) -> bool {
    match cmd {
        RegistryCommand::Ingest {
            transport,
            text,
            response,
        } => {
            let now = registry.now();
            let applied = registry.ingest_from(transport, &text, now);
            if let Some(response) = response {
                let _ = response.send(applied);
            }
        }
        RegistryCommand::RejectFrame { transport, reason } => {
            registry.reject_frame(transport, reason);
        }
        RegistryCommand::Get { id, response } => {
            let _ = response.send(registry.get_id(id));
        }
        RegistryCommand::GetAll { response } => {
            let _ = response.send(registry.get_all());
        }
        RegistryCommand::Snapshot { response } => {
            let now = registry.now();
            let summaries = registry.get_all().iter().map(|d| d.summary(now)).collect();
            let _ = response.send(summaries);
        }
        RegistryCommand::Count { response } => {
            let _ = response.send(registry.count());
        }
        RegistryCommand::Stats { response } => {
            let _ = response.send(registry.stats().clone());
        }
        RegistryCommand::AddDevice { device, response } => {
            let _ = response.send(registry.add_device(device));
        }
        RegistryCommand::RemoveDevice { id, response } => {
            let _ = response.send(registry.remove_device(&id.to_string()));
        }
        RegistryCommand::SetColor {
            id,
            color,
            response,
        } => {
            let _ = response.send(registry.set_color(&id.to_string(), color));
        }
        RegistryCommand::SetMotorState { id, on, response } => {
            let _ = response.send(registry.set_motor_state(&id.to_string(), on));
        }
        RegistryCommand::Prune { response } => {
            let _ = response.send(registry.prune());
        }
        RegistryCommand::Shutdown => return false,
    }
    true
}

fn forward_events(registry: &mut DeviceRegistry, event_tx: &mpsc::Sender<RegistryEvent>) {
    let mut lagged = 0u64;
    for event in registry.drain_events() {
        match event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => lagged += 1,
            // Nobody is listening; the rest are discarded with the drain.
            Err(TrySendError::Closed(_)) => break,
        }
    }
    if lagged > 0 {
        if registry.stats().events_lagged == 0 {
            warn!(lagged, "Event observer is falling behind; discarding events");
        }
        registry.record_lagged_events(lagged);
    }
}

/// Spawn the actor on the current runtime and return a handle to it
pub fn spawn_registry_actor(
    registry: DeviceRegistry,
    event_tx: mpsc::Sender<RegistryEvent>,
) -> (RegistryHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let task = tokio::spawn(run_registry_actor(registry, cmd_rx, event_tx));
    (RegistryHandle::new(cmd_tx), task)
}

/// Cloneable async front end for the registry actor
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Wrap an existing command sender
    pub fn new(tx: mpsc::Sender<RegistryCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .await
            .map_err(|_| RegistryError::ActorClosed)?;
        rx.await.map_err(|_| RegistryError::ActorClosed)
    }

    /// Ingest frames and wait for the applied count
    pub async fn ingest(
        &self,
        transport: Option<TransportHandle>,
        text: String,
    ) -> Result<usize, RegistryError> {
        self.request(|response| RegistryCommand::Ingest {
            transport,
            text,
            response: Some(response),
        })
        .await
    }

    /// Queue frames without waiting for them to be applied
    pub async fn send_frames(
        &self,
        transport: Option<TransportHandle>,
        text: String,
    ) -> Result<(), RegistryError> {
        self.tx
            .send(RegistryCommand::Ingest {
                transport,
                text,
                response: None,
            })
            .await
            .map_err(|_| RegistryError::ActorClosed)
    }

    /// Report a frame the transport discarded without decoding
    pub async fn reject_frame(
        &self,
        transport: Option<TransportHandle>,
        reason: DropReason,
    ) -> Result<(), RegistryError> {
        self.tx
            .send(RegistryCommand::RejectFrame { transport, reason })
            .await
            .map_err(|_| RegistryError::ActorClosed)
    }

    /// Look up a device by key text
    pub async fn get(&self, id: &str) -> Result<Option<Device>, RegistryError> {
        let id = DeviceId::parse_key(id)?;
        self.request(|response| RegistryCommand::Get { id, response })
            .await
    }

    pub async fn get_all(&self) -> Result<Vec<Device>, RegistryError> {
        self.request(|response| RegistryCommand::GetAll { response })
            .await
    }

    pub async fn snapshot(&self) -> Result<Vec<DeviceSummary>, RegistryError> {
        self.request(|response| RegistryCommand::Snapshot { response })
            .await
    }

    pub async fn count(&self) -> Result<usize, RegistryError> {
        self.request(|response| RegistryCommand::Count { response })
            .await
    }

    pub async fn stats(&self) -> Result<RegistryStats, RegistryError> {
        self.request(|response| RegistryCommand::Stats { response })
            .await
    }

    /// Insert a device, returning the one it replaced
    pub async fn add_device(&self, device: Device) -> Result<Option<Device>, RegistryError> {
        self.request(|response| RegistryCommand::AddDevice { device, response })
            .await
    }

    /// Remove a device by key text
    pub async fn remove_device(&self, id: &str) -> Result<Device, RegistryError> {
        let key = DeviceId::parse_key(id)?;
        self.request(|response| RegistryCommand::RemoveDevice { id: key, response })
            .await?
            .ok_or_else(|| RegistryError::DeviceNotFound(key.to_string()))
    }

    pub async fn set_color(&self, id: &str, color: [u8; 3]) -> Result<(), RegistryError> {
        let key = DeviceId::parse_key(id)?;
        let found = self
            .request(|response| RegistryCommand::SetColor {
                id: key,
                color,
                response,
            })
            .await?;
        if found {
            Ok(())
        } else {
            Err(RegistryError::DeviceNotFound(key.to_string()))
        }
    }

    pub async fn set_motor_state(&self, id: &str, on: bool) -> Result<(), RegistryError> {
        let key = DeviceId::parse_key(id)?;
        let found = self
            .request(|response| RegistryCommand::SetMotorState {
                id: key,
                on,
                response,
            })
            .await?;
        if found {
            Ok(())
        } else {
            Err(RegistryError::DeviceNotFound(key.to_string()))
        }
    }

    /// Prune immediately, returning the removed ids
    pub async fn prune(&self) -> Result<Vec<DeviceId>, RegistryError> {
        self.request(|response| RegistryCommand::Prune { response })
            .await
    }

    /// Ask the actor to stop
    pub async fn shutdown(&self) -> Result<(), RegistryError> {
        self.tx
            .send(RegistryCommand::Shutdown)
            .await
            .map_err(|_| RegistryError::ActorClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RemovalReason;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ingest_and_query() {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(16);

        // Start actor
        let actor_handle =
            tokio::spawn(run_registry_actor(DeviceRegistry::new(), cmd_rx, event_tx));
        let handle = RegistryHandle::new(cmd_tx);

        let applied = handle
            .ingest(Some(TransportHandle(1)), "0a1bff804020100804ff\n0a1b".into())
            .await
            .unwrap();
        assert_eq!(applied, 1);

        match event_rx.recv().await.unwrap() {
            RegistryEvent::DeviceAdded { id, transport } => {
                assert_eq!(id.to_string(), "0a1b");
                assert_eq!(transport, Some(TransportHandle(1)));
            }
            other => panic!("Expected DeviceAdded event, got {other:?}"),
        }
        assert!(matches!(
            event_rx.recv().await.unwrap(),
            RegistryEvent::FrameDropped { .. }
        ));

        let device = handle.get("0A1B").await.unwrap().unwrap();
        assert!(device.tap);
        assert_eq!(handle.count().await.unwrap(), 1);
        assert_eq!(handle.stats().await.unwrap().frames_dropped(), 1);

        handle.shutdown().await.unwrap();
        actor_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_errors_surface_through_handle() {
        let (event_tx, _event_rx) = mpsc::channel(16);
        let (handle, task) = spawn_registry_actor(DeviceRegistry::new(), event_tx);

        assert!(matches!(
            handle.get("zz").await,
            Err(RegistryError::InvalidDeviceId(_))
        ));
        assert!(matches!(
            handle.set_color("beef", [0, 0, 0]).await,
            Err(RegistryError::DeviceNotFound(id)) if id == "beef"
        ));
        assert!(matches!(
            handle.remove_device("BEEF").await,
            Err(RegistryError::DeviceNotFound(_))
        ));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(handle.count().await, Err(RegistryError::ActorClosed)));
    }

    #[tokio::test]
    async fn test_explicit_remove_emits_event() {
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let (handle, task) = spawn_registry_actor(DeviceRegistry::new(), event_tx);

        handle.ingest(None, "00010000000000000000".into()).await.unwrap();
        handle.set_motor_state("0001", true).await.unwrap();
        let removed = handle.remove_device("0001").await.unwrap();
        assert!(removed.motor_state);

        assert!(matches!(event_rx.recv().await, Some(RegistryEvent::DeviceAdded { .. })));
        assert_eq!(
            event_rx.recv().await,
            Some(RegistryEvent::DeviceRemoved {
                id: DeviceId::new(1),
                reason: RemovalReason::Explicit,
            })
        );

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_timer_prunes_silent_devices() {
        let config = crate::registry::RegistryConfig {
            inactive_timeout_ms: 100,
            prune_interval_ms: 20,
            ..Default::default()
        };
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let (handle, task) = spawn_registry_actor(DeviceRegistry::with_config(config), event_tx);

        handle.ingest(None, "00020000000000000000".into()).await.unwrap();
        assert!(matches!(event_rx.recv().await, Some(RegistryEvent::DeviceAdded { .. })));

        let removed = event_rx.recv().await.unwrap();
        assert_eq!(
            removed,
            RegistryEvent::DeviceRemoved {
                id: DeviceId::new(2),
                reason: RemovalReason::Pruned,
            }
        );
        assert_eq!(handle.count().await.unwrap(), 0);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stalled_observer_does_not_block_actor() {
        let config = crate::registry::RegistryConfig {
            prune_interval_ms: 60_000,
            ..Default::default()
        };
        let clock = crate::clock::ManualClock::new();
        let registry = DeviceRegistry::with_clock(config, Arc::new(clock.clone()));
        // Held but never read
        let (event_tx, _event_rx) = mpsc::channel(4);
        let (handle, task) = spawn_registry_actor(registry, event_tx);

        let text = "0a1b0000000000000000\n".repeat(10);
        assert_eq!(handle.ingest(None, text).await.unwrap(), 10);

        let wait = Duration::from_secs(2);
        let count = tokio::time::timeout(wait, handle.count()).await;
        assert_eq!(count.unwrap().unwrap(), 1);

        clock.advance(Duration::from_millis(5001));
        let pruned = tokio::time::timeout(wait, handle.prune()).await;
        assert_eq!(pruned.unwrap().unwrap(), vec![DeviceId::new(0x0a1b)]);

        // Ten frame events and one removal against a capacity of four
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.events_lagged, 7);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
