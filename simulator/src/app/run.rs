//! Main application run loop

use std::future::Future;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::app::options::AppOptions;
use crate::connection::ConnectionManager;
use crate::device::runtime::DeviceRuntime;
use crate::errors::SimulatorError;
use crate::mqtt::client::MqttTransport;
use crate::workers::device;

/// Run the device simulator
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SimulatorError> {
    info!("Initializing device simulator...");

    // Configuration problems fail fast, before any session is opened
    if options.device_types.is_empty() {
        return Err(SimulatorError::ConfigError(
            "No device types configured".to_string(),
        ));
    }
    if options.device_count == 0 {
        return Err(SimulatorError::ConfigError(
            "Device count must be at least 1".to_string(),
        ));
    }

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.max_shutdown_delay);

    let mut picker = StdRng::from_entropy();
    for _ in 0..options.device_count {
        let device_type = options.device_types[picker.gen_range(0..options.device_types.len())];
        let device_id = Uuid::new_v4().to_string();
        let name = format!("{} {}", device_type.label(), &device_id[..6]);

        let runtime = DeviceRuntime::new(
            device_id.clone(),
            name.clone(),
            device_type,
            StdRng::seed_from_u64(picker.gen()),
        );
        let transport = MqttTransport::new(&options.broker, &device_id, options.credentials.clone());
        let conn = ConnectionManager::new(transport, &device_id);

        let worker_options = options.device_worker.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            device::run(&worker_options, runtime, conn, shutdown_rx).await;
        });
        shutdown_manager.add_worker(handle);

        info!(%device_id, %device_type, %name, "Created device");
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    max_shutdown_delay: Duration,
    worker_handles: Vec<JoinHandle<()>>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, max_shutdown_delay: Duration) -> Self {
        Self {
            shutdown_tx,
            max_shutdown_delay,
            worker_handles: Vec::new(),
        }
    }

    fn add_worker(&mut self, handle: JoinHandle<()>) {
        self.worker_handles.push(handle);
    }

    async fn shutdown(&mut self) -> Result<(), SimulatorError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(self.max_shutdown_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), SimulatorError> {
        info!("Shutting down device workers...");

        for handle in self.worker_handles.drain(..) {
            handle
                .await
                .map_err(|e| SimulatorError::ShutdownError(e.to_string()))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
