//! M-TEC Bridge - Modbus inverter telemetry to MQTT
//!
//! Periodically reads the registers of an M-TEC Energybutler inverter, derives
//! consumption and self-sufficiency metrics and publishes everything under
//! `<topic>/<serial>/<category>/<metric>`:
//! - `config` (serial number, firmware) every few hours
//! - `current` power flows on every tick
//! - `day` / `total` energy counters every few minutes
//! - optional Home Assistant discovery announcements

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hass;
pub mod model;
pub mod modbus;
pub mod mqtt;
pub mod payload;
pub mod ports;
pub mod registers;
pub mod scheduler;
pub mod shutdown;
pub mod state;
pub mod transform;

pub use bridge::{Bridge, DeviceIdentity, TickOutcome};
pub use catalog::{register_list, Category};
pub use config::{BridgeConfig, BridgeSettings};
pub use error::{BridgeError, TransportError};
pub use model::{Number, RawReadingSet, RegisterValue, Value};
pub use payload::{format_value, FloatFormat};
pub use ports::{DiscoverySink, Publisher, RegisterReader};
pub use registers::RegisterId;
pub use scheduler::{CadenceScheduler, Cadences};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use transform::{transform, Metric, MetricsBundle, LOCAL_TIMESTAMP};
