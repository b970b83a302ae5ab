/*!
Complete register readings for every category

Values are in the units the register map decodes to: W for power, kWh for
energy, % for the state of charge.
*/

use mtec_bridge::{Category, RegisterId, Value};

pub const SERIAL_NO: &str = "2024MTEC0001";
pub const FIRMWARE_VERSION: &str = "V27.52.4.0-V27.60.4.0";

pub fn config_readings(serial_no: &str) -> Vec<(RegisterId, Value)> {
    vec![
        (RegisterId::SerialNumber, Value::Text(serial_no.to_string())),
        (RegisterId::FirmwareVersion, Value::Text(FIRMWARE_VERSION.to_string())),
    ]
}

/// `current` readings with the given grid and inverter power
pub fn current_readings(grid: i64, inverter: i64) -> Vec<(RegisterId, Value)> {
    vec![
        (RegisterId::InverterDate, Value::Text("2024-03-15 12:30:05".to_string())),
        (RegisterId::InverterStatus, Value::Int(2)),
        (RegisterId::PvPower, Value::Int(1500)),
        (RegisterId::GridPower, Value::Int(grid)),
        (RegisterId::BatteryPower, Value::Int(-300)),
        (RegisterId::InverterPower, Value::Int(inverter)),
        (RegisterId::BackupPower, Value::Int(0)),
        (RegisterId::BatterySoc, Value::Float(55.0)),
    ]
}

/// `day` readings: PV, grid feed, grid purchase, battery charge, battery discharge
pub fn day_readings(pv: i64, feed: i64, purchase: i64, charge: i64, discharge: i64) -> Vec<(RegisterId, Value)> {
    vec![
        (RegisterId::PvEnergyDay, Value::Int(pv)),
        (RegisterId::GridFeedDay, Value::Int(feed)),
        (RegisterId::GridPurchaseDay, Value::Int(purchase)),
        (RegisterId::BatteryChargeDay, Value::Int(charge)),
        (RegisterId::BatteryDischargeDay, Value::Int(discharge)),
    ]
}

pub fn total_readings() -> Vec<(RegisterId, Value)> {
    vec![
        (RegisterId::PvEnergyTotal, Value::Float(12000.5)),
        (RegisterId::GridFeedTotal, Value::Float(4000.0)),
        (RegisterId::GridPurchaseTotal, Value::Float(2500.0)),
        (RegisterId::BatteryChargeTotal, Value::Float(3000.0)),
        (RegisterId::BatteryDischargeTotal, Value::Float(2800.0)),
    ]
}

/// Readings of one category using the defaults above
pub fn readings(category: Category) -> Vec<(RegisterId, Value)> {
    match category {
        Category::Config => config_readings(SERIAL_NO),
        Category::Current => current_readings(500, 1200),
        Category::Day => day_readings(10, 2, 1, 3, 1),
        Category::Total => total_readings(),
    }
}

/// Every register of the device
pub fn full_device() -> Vec<(RegisterId, Value)> {
    Category::ALL.into_iter().flat_map(readings).collect()
}
