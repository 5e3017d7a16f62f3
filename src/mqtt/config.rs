use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Broker the listener connects to and the single topic it subscribes to.
///
/// Built once at startup from [`crate::config::BridgeConfig`] and never
/// mutated afterwards.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub topic: String,
    /// Keep-alive interval in seconds, sent in the CONNECT packet
    pub keep_alive_secs: u64,
    pub client_id: String,
    /// Largest packet accepted from the broker, in bytes. A publish above
    /// this size ends the session.
    pub max_packet_size: usize,
}

impl Default for BrokerEndpoint {
    fn default() -> Self {
        Self {
            host: "mqtt.example.com".to_string(),
            port: 1883,
            topic: "esp32/hdlc".to_string(),
            keep_alive_secs: 60,
            client_id: "esp32-bridge".to_string(),
            max_packet_size: 1024 * 1024,
        }
    }
}

impl BrokerEndpoint {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
