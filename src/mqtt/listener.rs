//! Telemetry listener - subscribes on connect and decodes every frame
//!
//! [`Listener`] holds no I/O of its own. It reacts to the two broker events
//! through [`BrokerEvents`] and issues its one subscription through a
//! [`Subscriber`], which keeps it testable without a broker. The live wiring
//! to rumqttc happens in [`ListenerHandle::spawn`].

use std::sync::Arc;

use rumqttc::{AsyncClient, QoS};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::BrokerEndpoint;
use super::frame::InboundFrame;
use super::mqtt_handler::MqttHandler;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Subscribe request failed: {0}")]
    Subscribe(#[from] rumqttc::ClientError),

    /// Broker answered CONNACK with a nonzero return code
    #[error("Connection refused by broker, return code {0}")]
    Refused(u8),

    #[error("Connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("Listener task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Callbacks the event loop fires for the listener
pub trait BrokerEvents: Send {
    /// Called with the CONNACK return code; `0` is success
    fn on_connect(&mut self, code: u8);

    fn on_message(&mut self, frame: InboundFrame);
}

/// The one client capability the listener needs
pub trait Subscriber: Send + Sync {
    fn subscribe(&self, topic: &str) -> Result<(), ListenerError>;
}

impl Subscriber for AsyncClient {
    fn subscribe(&self, topic: &str) -> Result<(), ListenerError> {
        self.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Failed,
}

/// In-memory counters, logged once the receive loop ends
#[derive(Clone, Debug, Default)]
pub struct ListenerStats {
    pub connection_state: ConnectionState,
    pub subscriptions: usize,
    pub frames_decoded: usize,
    pub frames_rejected: usize,
    pub last_activity: Option<chrono::DateTime<chrono::Local>>,
}

pub struct Listener {
    endpoint: BrokerEndpoint,
    subscriber: Arc<dyn Subscriber>,
    stats: ListenerStats,
}

impl Listener {
    pub fn new(endpoint: BrokerEndpoint, subscriber: Arc<dyn Subscriber>) -> Self {
        Self {
            endpoint,
            subscriber,
            stats: ListenerStats::default(),
        }
    }

    pub fn stats(&self) -> &ListenerStats {
        &self.stats
    }

    pub fn into_stats(self) -> ListenerStats {
        self.stats
    }
}

impl BrokerEvents for Listener {
    fn on_connect(&mut self, code: u8) {
        if code != 0 {
            self.stats.connection_state = ConnectionState::Failed;
            error!(
                "MQTT connection to {} failed, return code {}",
                self.endpoint.address(),
                code
            );
            return;
        }

        self.stats.connection_state = ConnectionState::Connected;
        info!("Connected to MQTT broker {}", self.endpoint.address());

        match self.subscriber.subscribe(&self.endpoint.topic) {
            Ok(()) => {
                self.stats.subscriptions += 1;
                info!("Subscribed to {}", self.endpoint.topic);
            }
            Err(e) => error!("Failed to subscribe to {}: {}", self.endpoint.topic, e),
        }
    }

    fn on_message(&mut self, frame: InboundFrame) {
        self.stats.last_activity = Some(chrono::Local::now());
        debug!("Inbound frame: {}", frame);

        match frame.render() {
            Ok(hex) => {
                self.stats.frames_decoded += 1;
                info!("Received MQTT frame on {}: {}", frame.topic(), hex);
            }
            Err(e) => {
                self.stats.frames_rejected += 1;
                warn!("LZ4 decompression failed on {}: {}", frame.topic(), e);
            }
        }
    }
}

/// Owns the background receive loop.
///
/// Dropping the handle leaves the task running; call [`shutdown`](Self::shutdown)
/// to stop it and collect its stats.
pub struct ListenerHandle {
    token: CancellationToken,
    task: JoinHandle<ListenerStats>,
}

impl ListenerHandle {
    /// Connects to `endpoint` and starts the receive loop on its own task
    pub fn spawn(endpoint: BrokerEndpoint) -> Self {
        info!(
            "Spawning MQTT listener for {} on topic {}",
            endpoint.address(),
            endpoint.topic
        );

        let handler = MqttHandler::new(&endpoint);
        let listener = Listener::new(endpoint, Arc::new(handler.client()));
        Self::spawn_with(handler, listener)
    }

    fn spawn_with(handler: MqttHandler, mut listener: Listener) -> Self {
        let token = CancellationToken::new();
        let loop_token = token.clone();

        let task = tokio::spawn(async move {
            match handler.run(&mut listener, loop_token).await {
                Ok(()) => info!("MQTT listener stopped"),
                Err(e) => error!("MQTT listener terminated: {}", e),
            }
            let stats = listener.into_stats();
            info!(
                "Listener summary: state={:?}, decoded={}, rejected={}",
                stats.connection_state, stats.frames_decoded, stats.frames_rejected
            );
            stats
        });

        debug!("Listener task spawned with handle: {:?}", task);
        Self { token, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the receive loop and waits for the task to exit
    pub async fn shutdown(self) -> Result<ListenerStats, ListenerError> {
        info!("Shutting down MQTT listener");
        self.token.cancel();
        Ok(self.task.await?)
    }
}
