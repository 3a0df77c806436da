//! Hitloop Device Monitor
//!
//! Accepts newline-delimited hex frames over TCP, keeps the live device
//! registry, optionally runs simulated devices, and logs periodic snapshots.

mod listener;
mod monitor;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hitloop_registry::{spawn_registry_actor, DeviceRegistry, TransportAllocator};
use hitloop_sim::{Emitter, VirtualDevice};
use rand::rngs::StdRng;
use rand::SeedableRng;
use settings::Settings;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Capacity of the registry event channel
const EVENT_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Include all our crates in the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hitloop_monitor=info,hitloop_registry=info,hitloop_protocol=info,hitloop_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hitloop monitor");

    let settings = Settings::load();
    if Settings::settings_path().is_some_and(|path| !path.exists()) {
        match settings.save() {
            Ok(path) => info!(path = %path.display(), "Wrote default settings"),
            Err(e) => warn!(error = %e, "Could not write default settings"),
        }
    }

    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let registry = DeviceRegistry::with_config(settings.registry.clone());
    let (handle, actor) = spawn_registry_actor(registry, event_tx);
    let transports = Arc::new(TransportAllocator::new());

    let tcp = TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.listen_addr))?;
    info!(
        addr = %settings.listen_addr,
        layout = settings.registry.layout.name(),
        "Listening for frames"
    );

    let mut tasks = vec![
        tokio::spawn(listener::run_listener(
            tcp,
            handle.clone(),
            transports.clone(),
        )),
        tokio::spawn(monitor::log_events(event_rx)),
        tokio::spawn(monitor::run_snapshots(
            handle.clone(),
            Duration::from_millis(settings.snapshot_interval_ms),
        )),
    ];

    let mut fleet: Vec<VirtualDevice> = settings
        .simulated_devices
        .iter()
        .map(VirtualDevice::from_config)
        .collect();
    fleet.extend(VirtualDevice::random_fleet(
        settings.random_devices,
        &settings.world,
        &mut StdRng::seed_from_u64(settings.seed),
    ));

    if !fleet.is_empty() {
        let transport = transports.allocate();
        info!(devices = fleet.len(), %transport, "Starting simulated devices");
        let (batch_tx, batch_rx) = mpsc::channel(16);
        let emitter = Emitter::new(fleet, settings.world, settings.registry.layout, settings.seed);
        tasks.push(tokio::spawn(
            emitter.run(Duration::from_millis(settings.emit_interval_ms), batch_tx),
        ));
        tasks.push(tokio::spawn(monitor::forward_simulated(
            batch_rx,
            handle.clone(),
            transport,
        )));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    for task in &tasks {
        task.abort();
    }
    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "Registry already stopped");
    }
    actor.await.context("Registry actor failed")?;

    Ok(())
}
