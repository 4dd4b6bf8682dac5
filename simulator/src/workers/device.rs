//! Device worker: one task per simulated device.
//!
//! The worker is the single owner of a device's runtime and connection,
//! so inbound command handling and scheduler ticks are serialized by
//! construction. Suspension happens only on transport I/O, the tick
//! interval, and the shutdown channel.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::connection::{self, ConnectionManager, ConnectionState};
use crate::device::runtime::DeviceRuntime;
use crate::errors::SimulatorError;
use crate::models::envelope::CommandEnvelope;
use crate::mqtt::topics::Topics;
use crate::mqtt::transport::{Transport, TransportEvent};
use crate::utils::calc_exp_backoff;

/// Device worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Connection retry policy
    pub connection: connection::Options,

    /// Simulation tick granularity
    pub tick_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            connection: connection::Options::default(),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Run one device until shutdown is signalled
pub async fn run<T: Transport>(
    options: &Options,
    mut runtime: DeviceRuntime,
    mut conn: ConnectionManager<T>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!(
        device_id = %runtime.id(),
        device_type = %runtime.device_type(),
        name = %runtime.name(),
        "Device worker starting"
    );

    // Initial connect. connect() itself never retries; the bounded
    // backoff policy lives here.
    let mut attempts = 0;
    while !conn.is_connected() {
        match conn.connect(&mut runtime).await {
            Ok(()) => break,
            Err(e) => {
                attempts += 1;
                error!(device_id = %runtime.id(), "Failed to connect: {}", e);
                if attempts >= options.connection.max_reconnect_attempts {
                    error!(
                        device_id = %runtime.id(),
                        "Max connect attempts reached, device will drift without a session"
                    );
                    break;
                }
                let delay = calc_exp_backoff(&options.connection.reconnect, attempts - 1);
                tokio::select! {
                    _ = shutdown_rx.recv() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    let mut ticker = tokio::time::interval(options.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut telemetry_elapsed = Duration::ZERO;
    let mut retry_attempts = 0;
    let mut next_retry_at: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                if let Err(e) = conn.disconnect(&mut runtime).await {
                    warn!(device_id = %runtime.id(), "Error during disconnect: {}", e);
                }
                info!(device_id = %runtime.id(), "Device worker stopped");
                return;
            }

            _ = ticker.tick() => {
                runtime.tick();

                telemetry_elapsed += options.tick_interval;
                if telemetry_elapsed >= runtime.telemetry_interval() {
                    // A disconnected device keeps drifting but stays silent
                    if conn.is_connected() {
                        if let Err(e) = conn.publish_telemetry(&runtime).await {
                            warn!(device_id = %runtime.id(), "Telemetry publish failed: {}", e);
                            conn.begin_reconnect();
                            retry_attempts = 0;
                            next_retry_at = None;
                        }
                    }
                    telemetry_elapsed = Duration::ZERO;
                }

                if conn.state() == ConnectionState::Reconnecting
                    && next_retry_at.is_none_or(|at| Instant::now() >= at)
                {
                    match conn.reconnect(&mut runtime).await {
                        Ok(()) => {
                            retry_attempts = 0;
                            next_retry_at = None;
                        }
                        Err(e) => {
                            retry_attempts += 1;
                            warn!(
                                device_id = %runtime.id(),
                                attempt = retry_attempts,
                                "Reconnect failed: {}", e
                            );
                            if retry_attempts >= options.connection.max_reconnect_attempts {
                                error!(
                                    device_id = %runtime.id(),
                                    "Max reconnect attempts reached, giving up on the session"
                                );
                                conn.mark_disconnected();
                            } else {
                                let delay = calc_exp_backoff(
                                    &options.connection.reconnect,
                                    retry_attempts - 1,
                                );
                                next_retry_at = Some(Instant::now() + delay);
                            }
                        }
                    }
                }
            }

            event = conn.next_event(), if conn.is_connected() => {
                match event {
                    TransportEvent::Message { topic, payload } => {
                        if let Err(e) = handle_message(&mut conn, &mut runtime, &topic, &payload).await {
                            warn!(device_id = %runtime.id(), "Publish failed: {}", e);
                            conn.begin_reconnect();
                            retry_attempts = 0;
                            next_retry_at = None;
                        }
                    }
                    TransportEvent::Disconnected => {
                        warn!(device_id = %runtime.id(), "Connection lost, reconnecting...");
                        conn.begin_reconnect();
                        retry_attempts = 0;
                        next_retry_at = None;
                    }
                }
            }
        }
    }
}

/// Decode and apply one inbound message.
///
/// Malformed JSON is logged and dropped without a response. For a valid
/// command the response publish always precedes the status publish.
async fn handle_message<T: Transport>(
    conn: &mut ConnectionManager<T>,
    runtime: &mut DeviceRuntime,
    topic: &str,
    payload: &[u8],
) -> Result<(), SimulatorError> {
    if !Topics::is_command_topic(topic) || Topics::parse_device_id(topic) != Some(runtime.id()) {
        return Ok(());
    }

    let envelope: CommandEnvelope = match serde_json::from_slice(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!(device_id = %runtime.id(), "Dropping malformed command: {}", e);
            return Ok(());
        }
    };

    let response = runtime.handle_command(&envelope);
    conn.publish_response(&response).await?;
    conn.publish_status(runtime).await?;
    Ok(())
}
