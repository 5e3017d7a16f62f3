//! Bridge configuration with fail-safe defaults
//!
//! Every address the bridge uses comes from [`BridgeConfig`]. The defaults
//! match the deployed ESP32 firmware, so running without a config file
//! behaves exactly like the stock setup. An optional TOML file overrides
//! individual fields:
//!
//! ```toml
//! warmup_secs = 5
//!
//! [broker]
//! host = "mqtt.example.com"
//! port = 1883
//! topic = "esp32/hdlc"
//!
//! [device]
//! api_url = "http://esp32-ip-address/api/config"
//!
//! [update]
//! mqtt_server = "new-mqtt.example.com"
//! api_url = "http://new-api-server.com/hdlc-data"
//! ```

use crate::device::config::{DeviceConfig, DeviceEndpoint};
use crate::mqtt::config::BrokerEndpoint;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/esp32-bridge";
const CONFIG_FILE: &str = "bridge.toml";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Broker the telemetry listener subscribes on
    pub broker: BrokerEndpoint,
    /// Control API of the device being reconfigured
    pub device: DeviceEndpoint,
    /// Values pushed to the device after warm-up
    pub update: DeviceConfig,
    /// Delay between starting the listener and pushing the device config
    pub warmup_secs: u64,
    /// Sleep interval of the idle loop once startup is done
    pub idle_poll_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            broker: BrokerEndpoint::default(),
            device: DeviceEndpoint::default(),
            update: DeviceConfig::default(),
            warmup_secs: 5,
            idle_poll_secs: 10,
        }
    }
}

impl BridgeConfig {
    /// Loads `~/.config/esp32-bridge/bridge.toml`, or the defaults if it
    /// does not exist.
    pub async fn load() -> Result<Self> {
        Self::from_path(&default_config_path()).await
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?;

        if !exists {
            warn!(
                "Config file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

        let config = Self::from_toml_str(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

        info!("Loaded bridge config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_secs(self.idle_poll_secs)
    }
}

fn default_config_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    });
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    debug!("Config path resolved to {}", path.display());
    path
}
