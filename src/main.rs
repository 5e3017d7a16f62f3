pub mod config;
pub mod device;
pub mod mqtt;
#[cfg(test)]
mod test_support;

use crate::config::BridgeConfig;
use crate::device::configurator::Configurator;
use crate::mqtt::listener::ListenerHandle;
use color_eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = BridgeConfig::load().await?;
    info!("Starting esp32-bridge with config: {:?}", config);

    // Listener läuft als eigener Task und wird beim Beenden abgebrochen
    let listener = ListenerHandle::spawn(config.broker.clone());

    tokio::time::sleep(config.warmup()).await;

    let configurator = Configurator::new(config.device.clone());
    configurator.push_and_log(&config.update).await;

    idle(&config, &listener).await;

    let stats = listener.shutdown().await?;
    info!(
        "Bridge stopped after {} decoded and {} rejected frames",
        stats.frames_decoded, stats.frames_rejected
    );
    Ok(())
}

/// Sleeps in `idle_poll` steps until Ctrl-C arrives
async fn idle(config: &BridgeConfig, listener: &ListenerHandle) {
    let mut reported_stop = false;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Unable to listen for shutdown signal: {}", e);
                }
                info!("Shutdown requested");
                return;
            }
            _ = tokio::time::sleep(config.idle_poll()) => {
                if listener.is_finished() && !reported_stop {
                    warn!("MQTT listener is no longer running; not reconnecting");
                    reported_stop = true;
                }
            }
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
