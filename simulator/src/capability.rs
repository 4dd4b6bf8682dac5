//! Static capability descriptors per device type

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Supported device types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Light,
    Thermostat,
    Switch,
    Sensor,
}

impl DeviceType {
    /// Capitalized label used in generated device names
    pub fn label(self) -> &'static str {
        match self {
            DeviceType::Light => "Light",
            DeviceType::Thermostat => "Thermostat",
            DeviceType::Switch => "Switch",
            DeviceType::Sensor => "Sensor",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeviceType::Light => "light",
            DeviceType::Thermostat => "thermostat",
            DeviceType::Switch => "switch",
            DeviceType::Sensor => "sensor",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(DeviceType::Light),
            "thermostat" => Ok(DeviceType::Thermostat),
            "switch" => Ok(DeviceType::Switch),
            "sensor" => Ok(DeviceType::Sensor),
            other => Err(format!("Unknown device type: {}", other)),
        }
    }
}

/// Thermostat operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermostatMode {
    Auto,
    Heat,
    Cool,
    Off,
}

impl std::fmt::Display for ThermostatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ThermostatMode::Auto => "auto",
            ThermostatMode::Heat => "heat",
            ThermostatMode::Cool => "cool",
            ThermostatMode::Off => "off",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ThermostatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ThermostatMode::Auto),
            "heat" => Ok(ThermostatMode::Heat),
            "cool" => Ok(ThermostatMode::Cool),
            "off" => Ok(ThermostatMode::Off),
            other => Err(format!("Unknown mode: {}", other)),
        }
    }
}

/// Configuration bounds for a device type
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    /// Inclusive brightness range, where applicable
    pub brightness: Option<(i64, i64)>,

    /// Inclusive target temperature range, where applicable
    pub temperature: Option<(f64, f64)>,

    /// Supported thermostat modes
    pub modes: &'static [ThermostatMode],

    /// Telemetry reporting interval in seconds
    pub reporting_interval_secs: u64,
}

/// Static capability descriptor for one device type.
///
/// Shared by every device of that type; loaded once, read-only for the
/// process lifetime.
#[derive(Debug)]
pub struct Capability {
    /// Commands accepted on the command topic
    pub commands: &'static [&'static str],

    /// Field names emitted in telemetry readings, in order
    pub telemetry: &'static [&'static str],

    /// Configuration bounds
    pub bounds: Bounds,
}

impl Capability {
    pub fn accepts(&self, command: &str) -> bool {
        self.commands.contains(&command)
    }

    pub fn supports_mode(&self, mode: ThermostatMode) -> bool {
        self.bounds.modes.contains(&mode)
    }

    pub fn reporting_interval(&self) -> Duration {
        Duration::from_secs(self.bounds.reporting_interval_secs)
    }
}

const DEFAULT_REPORTING_INTERVAL_SECS: u64 = 30;

static LIGHT: Capability = Capability {
    commands: &["power", "set_brightness", "set_color", "status"],
    telemetry: &["power_state", "brightness", "color", "power_usage"],
    bounds: Bounds {
        brightness: Some((0, 100)),
        temperature: None,
        modes: &[],
        reporting_interval_secs: DEFAULT_REPORTING_INTERVAL_SECS,
    },
};

static THERMOSTAT: Capability = Capability {
    commands: &["power", "set_temperature", "set_mode", "status"],
    telemetry: &[
        "power_state",
        "current_temperature",
        "target_temperature",
        "humidity",
        "mode",
    ],
    bounds: Bounds {
        brightness: None,
        temperature: Some((16.0, 30.0)),
        modes: &[
            ThermostatMode::Auto,
            ThermostatMode::Heat,
            ThermostatMode::Cool,
            ThermostatMode::Off,
        ],
        reporting_interval_secs: DEFAULT_REPORTING_INTERVAL_SECS,
    },
};

static SWITCH: Capability = Capability {
    commands: &["power", "status"],
    telemetry: &["power_state", "power_usage"],
    bounds: Bounds {
        brightness: None,
        temperature: None,
        modes: &[],
        reporting_interval_secs: DEFAULT_REPORTING_INTERVAL_SECS,
    },
};

static SENSOR: Capability = Capability {
    commands: &["status", "calibrate"],
    telemetry: &["temperature", "humidity", "pressure", "battery_level"],
    bounds: Bounds {
        brightness: None,
        temperature: None,
        modes: &[],
        reporting_interval_secs: 60,
    },
};

/// Look up the capability descriptor for a device type
pub fn capability(device_type: DeviceType) -> &'static Capability {
    match device_type {
        DeviceType::Light => &LIGHT,
        DeviceType::Thermostat => &THERMOSTAT,
        DeviceType::Switch => &SWITCH,
        DeviceType::Sensor => &SENSOR,
    }
}
