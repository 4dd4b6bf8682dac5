//! Typed per-device state records

use serde::Serialize;
use serde_json::{json, Value};

use crate::capability::{DeviceType, ThermostatMode};

/// Power state for devices with an on/off switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn toggled(self) -> Self {
        match self {
            PowerState::On => PowerState::Off,
            PowerState::Off => PowerState::On,
        }
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
        }
    }
}

/// Broker-facing availability of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize)]
pub struct LightState {
    pub power_state: PowerState,
    pub brightness: i64,
    pub color: String,
    pub power_usage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThermostatState {
    pub power_state: PowerState,
    pub current_temperature: f64,
    pub target_temperature: f64,
    pub humidity: f64,
    pub mode: ThermostatMode,
    pub power_usage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchState {
    pub power_state: PowerState,
    pub power_usage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorState {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub battery_level: f64,
}

/// Mutable device state, tagged by device type.
///
/// Serializes untagged so a status publish carries the plain field map
/// the downstream bridge expects.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DeviceState {
    Light(LightState),
    Thermostat(ThermostatState),
    Switch(SwitchState),
    Sensor(SensorState),
}

impl DeviceState {
    /// Initial state for a freshly constructed device
    pub fn new(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Light => DeviceState::Light(LightState {
                power_state: PowerState::Off,
                brightness: 50,
                color: "#ffffff".to_string(),
                power_usage: 0.0,
            }),
            DeviceType::Thermostat => DeviceState::Thermostat(ThermostatState {
                power_state: PowerState::Off,
                current_temperature: 22.0,
                target_temperature: 22.0,
                humidity: 40.0,
                mode: ThermostatMode::Off,
                power_usage: 0.0,
            }),
            DeviceType::Switch => DeviceState::Switch(SwitchState {
                power_state: PowerState::Off,
                power_usage: 0.0,
            }),
            DeviceType::Sensor => DeviceState::Sensor(SensorState {
                temperature: 22.0,
                humidity: 40.0,
                pressure: 1013.25,
                battery_level: 100.0,
            }),
        }
    }

    pub fn power_state(&self) -> Option<PowerState> {
        match self {
            DeviceState::Light(s) => Some(s.power_state),
            DeviceState::Thermostat(s) => Some(s.power_state),
            DeviceState::Switch(s) => Some(s.power_state),
            DeviceState::Sensor(_) => None,
        }
    }

    /// Fetch one telemetry reading by field name
    pub fn reading(&self, field: &str) -> Option<Value> {
        match self {
            DeviceState::Light(s) => match field {
                "power_state" => Some(json!(s.power_state)),
                "brightness" => Some(json!(s.brightness)),
                "color" => Some(json!(s.color)),
                "power_usage" => Some(json!(s.power_usage)),
                _ => None,
            },
            DeviceState::Thermostat(s) => match field {
                "power_state" => Some(json!(s.power_state)),
                "current_temperature" => Some(json!(s.current_temperature)),
                "target_temperature" => Some(json!(s.target_temperature)),
                "humidity" => Some(json!(s.humidity)),
                "mode" => Some(json!(s.mode)),
                "power_usage" => Some(json!(s.power_usage)),
                _ => None,
            },
            DeviceState::Switch(s) => match field {
                "power_state" => Some(json!(s.power_state)),
                "power_usage" => Some(json!(s.power_usage)),
                _ => None,
            },
            DeviceState::Sensor(s) => match field {
                "temperature" => Some(json!(s.temperature)),
                "humidity" => Some(json!(s.humidity)),
                "pressure" => Some(json!(s.pressure)),
                "battery_level" => Some(json!(s.battery_level)),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_defaults() {
        let state = DeviceState::new(DeviceType::Light);
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["power_state"], "off");
        assert_eq!(value["brightness"], 50);
        assert_eq!(value["color"], "#ffffff");
        assert_eq!(value["power_usage"], 0.0);
    }

    #[test]
    fn test_untagged_serialization_is_flat() {
        let state = DeviceState::new(DeviceType::Sensor);
        let value = serde_json::to_value(&state).unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map["pressure"], 1013.25);
    }

    #[test]
    fn test_reading_lookup() {
        let state = DeviceState::new(DeviceType::Thermostat);
        assert_eq!(state.reading("mode").unwrap(), "off");
        assert_eq!(state.reading("current_temperature").unwrap(), 22.0);
        assert!(state.reading("brightness").is_none());
    }
}
