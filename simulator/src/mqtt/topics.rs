//! MQTT topic definitions

/// Topic patterns for the device namespace
pub struct Topics;

impl Topics {
    /// Inbound command topic for one device
    pub fn device_command(device_id: &str) -> String {
        format!("devices/{}/command", device_id)
    }

    /// Outbound status topic for one device
    pub fn device_status(device_id: &str) -> String {
        format!("devices/{}/status", device_id)
    }

    /// Outbound telemetry topic for one device
    pub fn device_telemetry(device_id: &str) -> String {
        format!("devices/{}/telemetry", device_id)
    }

    /// Outbound command response topic for one device
    pub fn device_response(device_id: &str) -> String {
        format!("devices/{}/response", device_id)
    }

    /// Wildcard patterns covering every topic the simulator publishes
    /// to. The simulator never subscribes to these itself; they document
    /// the contract for the bridge consumer on the controller side.
    pub fn bridge_subscriptions() -> [&'static str; 3] {
        ["devices/+/status", "devices/+/telemetry", "devices/+/response"]
    }

    /// Parse a topic to extract the device ID
    pub fn parse_device_id(topic: &str) -> Option<&str> {
        let mut parts = topic.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("devices"), Some(id), Some(_), None) if !id.is_empty() => Some(id),
            _ => None,
        }
    }

    /// Check if topic is a command topic
    pub fn is_command_topic(topic: &str) -> bool {
        topic.starts_with("devices/") && topic.ends_with("/command")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_generation() {
        assert_eq!(
            Topics::device_command("device-123"),
            "devices/device-123/command"
        );
        assert_eq!(
            Topics::device_telemetry("device-123"),
            "devices/device-123/telemetry"
        );
        assert_eq!(
            Topics::device_response("device-123"),
            "devices/device-123/response"
        );
    }

    #[test]
    fn test_topic_parsing() {
        assert_eq!(
            Topics::parse_device_id("devices/device-123/command"),
            Some("device-123")
        );
        assert_eq!(Topics::parse_device_id("devices//status"), None);
        assert_eq!(Topics::parse_device_id("other/device-123/command"), None);
        assert_eq!(Topics::parse_device_id("devices/device-123"), None);
    }

    #[test]
    fn test_bridge_subscriptions_cover_outbound_topics() {
        let patterns = Topics::bridge_subscriptions();
        assert!(patterns.contains(&"devices/+/status"));
        assert!(patterns.contains(&"devices/+/telemetry"));
        assert!(patterns.contains(&"devices/+/response"));
    }

    #[test]
    fn test_command_topic_check() {
        assert!(Topics::is_command_topic("devices/abc/command"));
        assert!(!Topics::is_command_topic("devices/abc/status"));
        assert!(!Topics::is_command_topic("workflows/abc/command"));
    }
}
