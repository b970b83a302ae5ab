//! M-TEC Bridge - reads an M-TEC Energybutler over Modbus and publishes to MQTT

use anyhow::{Context, Result};
use chrono::Local;
use mtec_bridge::config::BridgeConfig;
use mtec_bridge::hass::HassDiscovery;
use mtec_bridge::modbus::ModbusReader;
use mtec_bridge::mqtt::{BirthWatch, MqttPublisher};
use mtec_bridge::state;
use mtec_bridge::{shutdown, Bridge};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let config = BridgeConfig::load().await.context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(if config.debug { Level::DEBUG } else { Level::INFO })
        .init();

    info!("Starting M-TEC bridge v{}", env!("CARGO_PKG_VERSION"));
    let settings = config.settings().context("Invalid configuration")?;

    let (trigger, shutdown) = shutdown::channel();
    shutdown::spawn_signal_listener(trigger);

    let announcements = state::announcements();
    let birth = config.hass.enable.then(|| BirthWatch {
        status_topic: format!("{}/status", config.hass.base_topic.trim_end_matches('/')),
        announcements: announcements.clone(),
    });
    let publisher = MqttPublisher::connect(&config.mqtt, birth);

    let discovery = config.hass.enable.then(|| {
        HassDiscovery::new(
            &config.hass.base_topic,
            &settings.base_topic,
            publisher.clone(),
            announcements.clone(),
        )
    });

    let mut reader = ModbusReader::new(&config.modbus);
    if let Err(e) = reader.connect().await {
        warn!(
            "Initial connection to {}:{} failed: {} - retrying on first read",
            config.modbus.host, config.modbus.port, e
        );
    }

    Bridge::new(settings, reader, publisher, discovery, Local::now())
        .run(shutdown)
        .await;

    Ok(())
}
