use serde::{Deserialize, Serialize};

/// Where the device's control API lives.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceEndpoint {
    pub api_url: String,
}

impl Default for DeviceEndpoint {
    fn default() -> Self {
        Self {
            api_url: "http://esp32-ip-address/api/config".to_string(),
        }
    }
}

/// Configuration pushed to the device.
///
/// The wire names are fixed by the firmware: `mqtt_server` and `api_url`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    #[serde(rename = "mqtt_server")]
    pub target_broker_host: String,
    #[serde(rename = "api_url")]
    pub target_api_url: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new("new-mqtt.example.com", "http://new-api-server.com/hdlc-data")
    }
}

impl DeviceConfig {
    pub fn new(target_broker_host: impl Into<String>, target_api_url: impl Into<String>) -> Self {
        Self {
            target_broker_host: target_broker_host.into(),
            target_api_url: target_api_url.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_uses_firmware_field_names() {
        let body = DeviceConfig::new("H", "U").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value, json!({"mqtt_server": "H", "api_url": "U"}));
    }

    #[test]
    fn test_default_payload_targets_new_servers() {
        let config = DeviceConfig::default();
        assert_eq!(config.target_broker_host, "new-mqtt.example.com");
        assert_eq!(config.target_api_url, "http://new-api-server.com/hdlc-data");
    }
}
