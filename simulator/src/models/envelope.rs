//! Message envelopes exchanged over the device topics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::device::state::{DeviceState, DeviceStatus};

/// Inbound command received on `devices/{id}/command`
#[derive(Debug, Clone, Deserialize)]
pub struct CommandEnvelope {
    pub command: String,

    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Outbound reply to a command, published on `devices/{id}/response`
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub command: String,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Full state snapshot published on `devices/{id}/status`.
///
/// The state fields are flattened so the payload is one flat JSON
/// object, the shape the bridge consumer upserts from.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEnvelope {
    pub status: DeviceStatus,
    pub last_seen: DateTime<Utc>,

    #[serde(flatten)]
    pub state: DeviceState,
}

/// Periodic readings published on `devices/{id}/telemetry`
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEnvelope {
    pub timestamp: DateTime<Utc>,
    pub readings: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::DeviceType;

    #[test]
    fn test_command_envelope_params_default() {
        let envelope: CommandEnvelope = serde_json::from_str(r#"{"command":"status"}"#).unwrap();
        assert_eq!(envelope.command, "status");
        assert!(envelope.params.is_empty());
    }

    #[test]
    fn test_command_envelope_rejects_missing_command() {
        let result = serde_json::from_str::<CommandEnvelope>(r#"{"params":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_status_envelope_is_flat() {
        let envelope = StatusEnvelope {
            status: DeviceStatus::Online,
            last_seen: Utc::now(),
            state: DeviceState::new(DeviceType::Switch),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["status"], "online");
        assert_eq!(value["power_state"], "off");
        assert_eq!(value["power_usage"], 0.0);
        assert!(value.get("state").is_none());
    }
}
