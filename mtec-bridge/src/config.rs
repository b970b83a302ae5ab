//! Bridge configuration
//!
//! Handles:
//! - Modbus endpoint of the inverter
//! - MQTT broker, base topic and float format
//! - Refresh cadences per category
//! - Home Assistant discovery switch
//!
//! Read from `$MTEC_BRIDGE_CONFIG` or the OS config directory; a missing file
//! yields the defaults.

use crate::error::BridgeError;
use crate::payload::FloatFormat;
use crate::scheduler::Cadences;
use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "MTEC_BRIDGE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub modbus: ModbusConfig,
    pub mqtt: MqttConfig,
    pub refresh: RefreshConfig,
    pub hass: HassConfig,
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    pub host: String,
    pub port: u16,
    pub slave: u8,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    pub topic: String,
    pub float_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub current_secs: u64,
    pub config_hours: u64,
    pub day_minutes: u64,
    pub total_minutes: u64,
    /// Retry interval while the device identity is unknown; defaults to `current_secs`
    pub retry_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HassConfig {
    pub enable: bool,
    pub base_topic: String,
}

/// Values consumed by the bridge loop
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSettings {
    pub base_topic: String,
    pub float_format: FloatFormat,
    pub tick_interval: Duration,
    pub retry_interval: Duration,
    pub cadences: Cadences,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            modbus: ModbusConfig::default(),
            mqtt: MqttConfig::default(),
            refresh: RefreshConfig::default(),
            hass: HassConfig::default(),
            debug: false,
        }
    }
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            host: "espressif".to_string(),
            port: 5743,
            slave: 252,
            timeout_secs: 5,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: 30,
            topic: "MTEC".to_string(),
            float_format: "{:.3f}".to_string(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            current_secs: 10,
            config_hours: 24,
            day_minutes: 5,
            total_minutes: 5,
            retry_secs: None,
        }
    }
}

impl Default for HassConfig {
    fn default() -> Self {
        Self {
            enable: false,
            base_topic: "homeassistant".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load config from `$MTEC_BRIDGE_CONFIG` or the OS-specific location
    pub async fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path).await
    }

    /// Load config from a file; a missing file yields the defaults
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        path.push("mtec-bridge");
        path.push("config.toml");
        Ok(path)
    }

    pub fn retry_secs(&self) -> u64 {
        self.refresh.retry_secs.unwrap_or(self.refresh.current_secs)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.refresh.current_secs == 0 {
            return Err(BridgeError::Config("refresh.current_secs must be > 0".into()));
        }
        if self.retry_secs() == 0 {
            return Err(BridgeError::Config("refresh.retry_secs must be > 0".into()));
        }
        if self.mqtt.topic.trim().is_empty() {
            return Err(BridgeError::Config("mqtt.topic must not be empty".into()));
        }
        if self.modbus.host.trim().is_empty() {
            return Err(BridgeError::Config("modbus.host must not be empty".into()));
        }
        self.mqtt.float_format.parse::<FloatFormat>()?;
        Ok(())
    }

    /// Validated settings for the bridge loop
    pub fn settings(&self) -> Result<BridgeSettings, BridgeError> {
        self.validate()?;
        let cadences = Cadences {
            config: time_delta(self.refresh.config_hours, 3600, "refresh.config_hours")?,
            day: time_delta(self.refresh.day_minutes, 60, "refresh.day_minutes")?,
            total: time_delta(self.refresh.total_minutes, 60, "refresh.total_minutes")?,
        };
        Ok(BridgeSettings {
            base_topic: self.mqtt.topic.trim_end_matches('/').to_string(),
            float_format: self.mqtt.float_format.parse()?,
            tick_interval: Duration::from_secs(self.refresh.current_secs),
            retry_interval: Duration::from_secs(self.retry_secs()),
            cadences,
        })
    }
}

fn time_delta(value: u64, unit_secs: u64, field: &str) -> Result<TimeDelta, BridgeError> {
    value
        .checked_mul(unit_secs)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| BridgeError::Config(format!("{field} is out of range")))
}
