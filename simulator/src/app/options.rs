//! Application configuration options

use std::time::Duration;

use crate::capability::DeviceType;
use crate::mqtt::client::{Credentials, MqttAddress};
use crate::workers::device;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// MQTT broker address
    pub broker: MqttAddress,

    /// Optional broker credentials
    pub credentials: Option<Credentials>,

    /// Number of devices to simulate
    pub device_count: usize,

    /// Device types to draw from when instantiating devices
    pub device_types: Vec<DeviceType>,

    /// Device worker options
    pub device_worker: device::Options,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            broker: MqttAddress::default(),
            credentials: None,
            device_count: 1,
            device_types: vec![
                DeviceType::Light,
                DeviceType::Thermostat,
                DeviceType::Switch,
                DeviceType::Sensor,
            ],
            device_worker: device::Options::default(),
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}
