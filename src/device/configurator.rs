use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{error, info, warn};

use super::config::{DeviceConfig, DeviceEndpoint};

#[derive(Debug, Error)]
pub enum ConfiguratorError {
    #[error("Failed to serialize device config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// What the device answered
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceResponse {
    pub status: u16,
    pub body: String,
}

impl DeviceResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct Configurator {
    endpoint: DeviceEndpoint,
    client: reqwest::Client,
}

impl Configurator {
    pub fn new(endpoint: DeviceEndpoint) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    /// Sends `config` to the device once.
    ///
    /// Any HTTP status is returned as a [`DeviceResponse`]; only transport
    /// failures become errors. There is no retry.
    pub async fn push(&self, config: &DeviceConfig) -> Result<DeviceResponse, ConfiguratorError> {
        let body = config.to_json()?;
        let url = self.endpoint.api_url.clone();

        info!(
            "Pushing config to {}: mqtt_server={}, api_url={}",
            url, config.target_broker_host, config.target_api_url
        );

        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| ConfiguratorError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|source| ConfiguratorError::Transport { url, source })?;

        Ok(DeviceResponse { status, body })
    }

    /// Startup entry point: pushes once and logs whatever happened.
    pub async fn push_and_log(&self, config: &DeviceConfig) {
        match self.push(config).await {
            Ok(resp) if resp.is_success() => info!("Device answered {} {}", resp.status, resp.body),
            Ok(resp) => warn!("Device answered {} {}", resp.status, resp.body),
            Err(e) => error!("Device config push failed: {}", e),
        }
    }
}
