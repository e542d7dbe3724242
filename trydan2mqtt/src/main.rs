//! Bridge between a V2C Trydan EV charger and MQTT.
//!
//! Polls the charger and publishes its state to MQTT, and forwards MQTT
//! commands to the charger.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use trydan_bridge_framework::{
    BridgeArgs, BridgeConfig, BridgeController, MqttBus, shutdown_signal,
};
use trydan2mqtt::{
    DEFAULT_CONFIG, FALLBACK_CONFIGS, LOG_DIRS, LOG_FILE_NAME, TrydanBridgeConfig, TrydanClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse();

    // Load configuration
    let path = args.resolve_config(DEFAULT_CONFIG, FALLBACK_CONFIGS);
    let config = TrydanBridgeConfig::load(&path)
        .with_context(|| format!("Failed to load config from {:?}", path))?;

    // Initialize logging
    let logging = args
        .logging(config.logging())
        .with_default_file(LOG_DIRS, LOG_FILE_NAME);
    trydan_common::init_tracing(&logging)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!(
        config = %path.display(),
        log_file = ?logging.file,
        "Loaded configuration"
    );

    let charger = TrydanClient::new(&config.trydan).context("Invalid charger settings")?;
    let bus = MqttBus::new(config.mqtt.clone());

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let stats = BridgeController::new("trydan2mqtt", charger, bus, config.topics(), cancel)
        .with_poll_interval(config.bridge.poll_interval())
        .run()
        .await?;

    info!(
        cycles = stats.cycles,
        snapshots = stats.snapshots,
        read_failures = stats.read_failures,
        publish_failures = stats.publish_failures,
        "Goodbye!"
    );

    Ok(())
}
