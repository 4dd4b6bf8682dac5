//! Per-device broker session management.
//!
//! Owns the transport for one device and tracks the session state
//! machine: `Disconnected -> Connecting -> Connected <-> Reconnecting`.
//! Retry pacing lives one level up in the device worker; this layer
//! performs single attempts and reports failures to the caller.

use tracing::{info, warn};

use crate::device::runtime::DeviceRuntime;
use crate::errors::SimulatorError;
use crate::models::envelope::ResponseEnvelope;
use crate::mqtt::topics::Topics;
use crate::mqtt::transport::{Delivery, Transport, TransportEvent};
use crate::utils::CooldownOptions;

/// Session state for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Connection retry policy
#[derive(Debug, Clone)]
pub struct Options {
    /// Backoff schedule between reconnect attempts
    pub reconnect: CooldownOptions,

    /// Max reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            reconnect: CooldownOptions {
                base_delay: std::time::Duration::from_secs(1),
                max_delay: std::time::Duration::from_secs(60),
                multiplier: 2.0,
            },
            max_reconnect_attempts: 10,
        }
    }
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    device_id: String,
    state: ConnectionState,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, device_id: &str) -> Self {
        Self {
            transport,
            device_id: device_id.to_string(),
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Open the session, subscribe to the command topic and announce
    /// the device with an initial status publish.
    ///
    /// On failure the manager stays `Disconnected` and the error is
    /// returned; there is no silent retry at this layer.
    pub async fn connect(&mut self, runtime: &mut DeviceRuntime) -> Result<(), SimulatorError> {
        self.state = ConnectionState::Connecting;

        if let Err(e) = self.establish(runtime).await {
            self.state = ConnectionState::Disconnected;
            return Err(e);
        }

        self.state = ConnectionState::Connected;
        info!(device_id = %self.device_id, "Device connected");
        Ok(())
    }

    /// Flag an unsolicited transport-level disconnect
    pub fn begin_reconnect(&mut self) {
        self.state = ConnectionState::Reconnecting;
    }

    /// One reconnect attempt. Republishes the initial status before any
    /// telemetry can resume. On failure the manager stays
    /// `Reconnecting` until the caller's next retry trigger.
    pub async fn reconnect(&mut self, runtime: &mut DeviceRuntime) -> Result<(), SimulatorError> {
        self.establish(runtime).await?;
        self.state = ConnectionState::Connected;
        info!(device_id = %self.device_id, "Device reconnected");
        Ok(())
    }

    /// Give up on the session without touching the transport
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Graceful teardown: the only path that takes the device offline.
    ///
    /// The offline status is published strictly before the transport
    /// session closes; nothing may be observed after it.
    pub async fn disconnect(&mut self, runtime: &mut DeviceRuntime) -> Result<(), SimulatorError> {
        runtime.mark_offline();

        if self.state == ConnectionState::Connected {
            if let Err(e) = self.publish_status(runtime).await {
                warn!(device_id = %self.device_id, "Failed to publish offline status: {}", e);
            }
        }

        let result = self.transport.disconnect().await;
        self.state = ConnectionState::Disconnected;
        info!(device_id = %self.device_id, "Device disconnected");
        result
    }

    pub async fn publish_status(
        &mut self,
        runtime: &mut DeviceRuntime,
    ) -> Result<(), SimulatorError> {
        let envelope = runtime.status_envelope();
        let payload = serde_json::to_vec(&envelope)?;
        self.transport
            .publish(&Topics::device_status(&self.device_id), Delivery::Confirmed, payload)
            .await
    }

    pub async fn publish_response(
        &mut self,
        response: &ResponseEnvelope,
    ) -> Result<(), SimulatorError> {
        let payload = serde_json::to_vec(response)?;
        self.transport
            .publish(&Topics::device_response(&self.device_id), Delivery::Confirmed, payload)
            .await
    }

    pub async fn publish_telemetry(
        &mut self,
        runtime: &DeviceRuntime,
    ) -> Result<(), SimulatorError> {
        let envelope = runtime.telemetry_envelope();
        let payload = serde_json::to_vec(&envelope)?;
        self.transport
            .publish(
                &Topics::device_telemetry(&self.device_id),
                Delivery::BestEffort,
                payload,
            )
            .await
    }

    /// Wait for the next transport event
    pub async fn next_event(&mut self) -> TransportEvent {
        self.transport.next_event().await
    }

    async fn establish(&mut self, runtime: &mut DeviceRuntime) -> Result<(), SimulatorError> {
        self.transport.connect().await?;
        self.transport
            .subscribe(&Topics::device_command(&self.device_id))
            .await?;
        runtime.mark_online();
        self.publish_status(runtime).await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
