//! Device runtime: owns one device's mutable state.
//!
//! All state mutation flows through here, either from a dispatched
//! command or from the scheduler's drift tick. The runtime never
//! publishes anything itself; the owning worker turns the envelopes it
//! produces into topic publishes.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::Map;
use tracing::{debug, warn};

use crate::capability::{capability, Capability, DeviceType, ThermostatMode};
use crate::device::dispatch::dispatch;
use crate::device::state::{DeviceState, DeviceStatus, PowerState};
use crate::models::envelope::{
    CommandEnvelope, ResponseEnvelope, StatusEnvelope, TelemetryEnvelope,
};

/// Ambient room temperature an idle thermostat drifts toward
const AMBIENT_TEMPERATURE: f64 = 21.0;

pub struct DeviceRuntime {
    id: String,
    name: String,
    device_type: DeviceType,
    capability: &'static Capability,
    state: DeviceState,
    status: DeviceStatus,
    last_seen: DateTime<Utc>,
    rng: StdRng,
}

impl DeviceRuntime {
    /// Create a runtime for one simulated identity.
    ///
    /// The random generator is injected so drift is replayable under a
    /// fixed seed.
    pub fn new(id: String, name: String, device_type: DeviceType, rng: StdRng) -> Self {
        Self {
            id,
            name,
            device_type,
            capability: capability(device_type),
            state: DeviceState::new(device_type),
            status: DeviceStatus::Online,
            last_seen: Utc::now(),
            rng,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn telemetry_interval(&self) -> std::time::Duration {
        self.capability.reporting_interval()
    }

    /// Validate and apply one command, producing the response to publish.
    ///
    /// Every command, including a rejected one, counts as contact with
    /// the device: `last_seen` is refreshed and the device is online.
    pub fn handle_command(&mut self, envelope: &CommandEnvelope) -> ResponseEnvelope {
        let outcome = if self.capability.accepts(&envelope.command) {
            dispatch(
                &mut self.state,
                self.capability,
                &envelope.command,
                &envelope.params,
                &mut self.rng,
            )
        } else {
            warn!(
                device_id = %self.id,
                command = %envelope.command,
                "Received unsupported command"
            );
            crate::device::dispatch::CommandOutcome::rejected(format!(
                "Command '{}' not supported by this device",
                envelope.command
            ))
        };

        self.mark_online();
        debug!(
            device_id = %self.id,
            command = %envelope.command,
            success = outcome.success,
            "Command handled"
        );

        ResponseEnvelope {
            command: envelope.command.clone(),
            success: outcome.success,
            message: outcome.message,
            timestamp: Utc::now(),
        }
    }

    /// Apply one scheduler tick of the drift model.
    ///
    /// The step sizes and probabilities are per tick, not per elapsed
    /// second, so drift rate is coupled to tick granularity.
    pub fn tick(&mut self) {
        match &mut self.state {
            DeviceState::Sensor(sensor) => {
                sensor.temperature += self.rng.gen_range(-0.1..=0.1);
                sensor.humidity = (sensor.humidity + self.rng.gen_range(-0.5..=0.5)).clamp(0.0, 100.0);
                sensor.pressure += self.rng.gen_range(-0.1..=0.1);

                if self.rng.gen_bool(0.1) {
                    sensor.battery_level = (sensor.battery_level - 0.1).max(0.0);
                }
            }
            DeviceState::Thermostat(thermostat) => {
                let active = thermostat.power_state == PowerState::On
                    && thermostat.mode != ThermostatMode::Off;
                let (target, step) = if active {
                    (thermostat.target_temperature, 0.2)
                } else {
                    (AMBIENT_TEMPERATURE, 0.1)
                };

                let delta = target - thermostat.current_temperature;
                thermostat.current_temperature += delta.clamp(-step, step);

                thermostat.humidity =
                    (thermostat.humidity + self.rng.gen_range(-1.0..=1.0)).clamp(20.0, 70.0);
            }
            // Lights and switches have no autonomous drift
            DeviceState::Light(_) | DeviceState::Switch(_) => {}
        }
    }

    /// Snapshot the full state for a status publish, refreshing `last_seen`
    pub fn status_envelope(&mut self) -> StatusEnvelope {
        self.touch();
        StatusEnvelope {
            status: self.status,
            last_seen: self.last_seen,
            state: self.state.clone(),
        }
    }

    /// Current readings restricted to the capability's telemetry fields
    pub fn telemetry_envelope(&self) -> TelemetryEnvelope {
        let mut readings = Map::new();
        for field in self.capability.telemetry {
            if let Some(value) = self.state.reading(field) {
                readings.insert((*field).to_string(), value);
            }
        }

        TelemetryEnvelope {
            timestamp: Utc::now(),
            readings,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    pub fn mark_online(&mut self) {
        self.status = DeviceStatus::Online;
        self.touch();
    }

    /// Entered only on disconnect; stamps `last_seen` one final time
    pub fn mark_offline(&mut self) {
        self.status = DeviceStatus::Offline;
        self.touch();
    }

    fn touch(&mut self) {
        // Guards monotonicity against wall-clock adjustments
        self.last_seen = self.last_seen.max(Utc::now());
    }
}
