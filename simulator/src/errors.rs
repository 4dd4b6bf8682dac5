//! Error types for the device simulator

use thiserror::Error;

/// Main error type for the device simulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("MQTT error: {0}")]
    MqttError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}
