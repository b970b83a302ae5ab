//! Home Assistant MQTT discovery
//!
//! Announces one sensor per published metric so Home Assistant picks the
//! inverter up without manual configuration. Announcements are not retained;
//! the MQTT event loop replays them whenever Home Assistant comes back online.

use crate::catalog::Category;
use crate::error::TransportError;
use crate::ports::{DiscoverySink, Publisher};
use crate::state::{snapshot, Announcements};
use serde::Serialize;
use tracing::info;

/// One discovery config message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub topic: String,
    pub payload: String,
}

struct SensorDef {
    category: Category,
    metric: &'static str,
    name: &'static str,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
    state_class: Option<&'static str>,
}

const fn sensor(
    category: Category,
    metric: &'static str,
    name: &'static str,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
    state_class: Option<&'static str>,
) -> SensorDef {
    SensorDef { category, metric, name, unit, device_class, state_class }
}

const POWER: (Option<&str>, Option<&str>, Option<&str>) =
    (Some("W"), Some("power"), Some("measurement"));
const ENERGY: (Option<&str>, Option<&str>, Option<&str>) =
    (Some("kWh"), Some("energy"), Some("total_increasing"));
const RATE: (Option<&str>, Option<&str>, Option<&str>) = (Some("%"), None, Some("measurement"));

const SENSORS: &[SensorDef] = &[
    sensor(Category::Config, "firmware_version", "Firmware version", None, None, None),
    sensor(Category::Current, "inverter_status", "Inverter status", None, None, None),
    sensor(Category::Current, "PV", "Solar power", POWER.0, POWER.1, POWER.2),
    sensor(Category::Current, "grid", "Grid power", POWER.0, POWER.1, POWER.2),
    sensor(Category::Current, "battery", "Battery power", POWER.0, POWER.1, POWER.2),
    sensor(Category::Current, "inverter", "Inverter power", POWER.0, POWER.1, POWER.2),
    sensor(Category::Current, "backup", "Backup power", POWER.0, POWER.1, POWER.2),
    sensor(Category::Current, "consumption", "Household consumption", POWER.0, POWER.1, POWER.2),
    sensor(Category::Current, "battery_SOC", "Battery SOC", Some("%"), Some("battery"), Some("measurement")),
    sensor(Category::Day, "PV", "Solar energy (day)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Day, "grid_feed", "Grid injection (day)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Day, "grid_purchase", "Grid purchase (day)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Day, "battery_charge", "Battery charge (day)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Day, "battery_discharge", "Battery discharge (day)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Day, "consumption", "Household consumption (day)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Day, "autarky_rate", "Autarky rate (day)", RATE.0, RATE.1, RATE.2),
    sensor(Category::Day, "own_consumption_rate", "Own consumption rate (day)", RATE.0, RATE.1, RATE.2),
    sensor(Category::Total, "PV", "Solar energy (total)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Total, "grid_feed", "Grid injection (total)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Total, "grid_purchase", "Grid purchase (total)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Total, "battery_charge", "Battery charge (total)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Total, "battery_discharge", "Battery discharge (total)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Total, "consumption", "Household consumption (total)", ENERGY.0, ENERGY.1, ENERGY.2),
    sensor(Category::Total, "autarky_rate", "Autarky rate (total)", RATE.0, RATE.1, RATE.2),
    sensor(Category::Total, "own_consumption_rate", "Own consumption rate (total)", RATE.0, RATE.1, RATE.2),
];

#[derive(Debug, Serialize)]
struct SensorConfig<'a> {
    name: &'a str,
    unique_id: String,
    state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<&'a str>,
    device: DeviceInfo<'a>,
}

#[derive(Debug, Serialize)]
struct DeviceInfo<'a> {
    identifiers: Vec<String>,
    name: &'a str,
    manufacturer: &'a str,
    model: &'a str,
    serial_number: &'a str,
}

/// Discovery config messages for every sensor of the device `serial_no`
pub fn discovery_messages(hass_base: &str, mqtt_base: &str, serial_no: &str) -> Vec<DiscoveryMessage> {
    let device_id = format!("MTEC_{serial_no}");
    SENSORS
        .iter()
        .map(|s| {
            let object_id = format!("{}_{}", s.category, s.metric.to_lowercase());
            let config = SensorConfig {
                name: s.name,
                unique_id: format!("{device_id}_{object_id}"),
                state_topic: format!("{mqtt_base}/{serial_no}/{}/{}", s.category, s.metric),
                unit_of_measurement: s.unit,
                device_class: s.device_class,
                state_class: s.state_class,
                device: DeviceInfo {
                    identifiers: vec![device_id.clone()],
                    name: "MTEC Energybutler",
                    manufacturer: "M-TEC",
                    model: "Energybutler",
                    serial_number: serial_no,
                },
            };
            DiscoveryMessage {
                topic: format!("{hass_base}/sensor/{device_id}/{object_id}/config"),
                // plain struct of strings, serialization cannot fail
                payload: serde_json::to_string(&config).unwrap_or_default(),
            }
        })
        .collect()
}

pub struct HassDiscovery<P> {
    hass_base: String,
    mqtt_base: String,
    publisher: P,
    announced: Announcements,
}

impl<P: Publisher> HassDiscovery<P> {
    /// `announced` is shared with the MQTT event loop for birth-message replays
    pub fn new(
        hass_base: &str,
        mqtt_base: &str,
        publisher: P,
        announced: Announcements,
    ) -> Self {
        Self {
            hass_base: hass_base.trim_end_matches('/').to_string(),
            mqtt_base: mqtt_base.trim_end_matches('/').to_string(),
            publisher,
            announced,
        }
    }

    pub fn announced(&self) -> Vec<DiscoveryMessage> {
        snapshot(&self.announced)
    }
}

impl<P: Publisher> DiscoverySink for HassDiscovery<P> {
    async fn initialize(&mut self, serial_no: &str) -> Result<(), TransportError> {
        let messages = discovery_messages(&self.hass_base, &self.mqtt_base, serial_no);
        let total = messages.len();
        self.announced.lock().clear();
        for message in messages {
            self.publisher
                .publish(&message.topic, message.payload.clone())
                .await?;
            // recorded per message so a partial announcement is still withdrawn
            self.announced.lock().push(message);
        }
        info!("Sent Home Assistant discovery info for {} sensors", total);
        Ok(())
    }

    async fn announce_offline(&mut self) -> Result<(), TransportError> {
        let messages = std::mem::take(&mut *self.announced.lock());
        for message in &messages {
            self.publisher.publish(&message.topic, String::new()).await?;
        }
        info!("Sent Home Assistant unregister info for {} sensors", messages.len());
        Ok(())
    }
}
