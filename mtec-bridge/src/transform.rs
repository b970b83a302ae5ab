//! Reading transform: raw register readings to a metrics bundle
//!
//! Each category selects and renames its raw fields and adds derived values:
//! - `current`: `consumption = inverter - grid`
//! - `day` / `total`: `consumption`, `autarky_rate` and `own_consumption_rate`,
//!   with the rates forced to 0 whenever their denominator is not positive
//!
//! A read is all-or-nothing. A missing register or a non-numeric operand
//! abandons the whole category with `IncompleteData`; no partial bundle exists.

use crate::catalog::Category;
use crate::error::BridgeError;
use crate::model::{Number, RawReadingSet, RegisterValue, Value};
use crate::registers::RegisterId;
use chrono::{DateTime, Local};

/// Metric name under which the local read time is published
pub const LOCAL_TIMESTAMP: &str = "api_date";

/// Format of the local read time
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One entry of a metrics bundle
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    /// Derived or bridge-generated value
    Scalar(Value),
    /// Raw register passed through with its transport metadata
    Structured(RegisterValue),
}

impl Metric {
    pub fn value(&self) -> &Value {
        match self {
            Metric::Scalar(v) => v,
            Metric::Structured(r) => &r.value,
        }
    }
}

/// Metrics produced by one successful category read
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsBundle {
    category: Category,
    local_timestamp: DateTime<Local>,
    metrics: Vec<(&'static str, Metric)>,
}

impl MetricsBundle {
    fn new(category: Category, now: DateTime<Local>) -> Self {
        let stamp = Value::Text(now.format(TIMESTAMP_FORMAT).to_string());
        Self {
            category,
            local_timestamp: now,
            metrics: vec![(LOCAL_TIMESTAMP, Metric::Scalar(stamp))],
        }
    }

    fn push(&mut self, name: &'static str, metric: Metric) {
        self.metrics.push((name, metric));
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn local_timestamp(&self) -> DateTime<Local> {
        self.local_timestamp
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, m)| m)
    }

    /// Value of a metric, if present
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).map(Metric::value)
    }

    /// Metrics in publish order, local timestamp first
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Metric)> {
        self.metrics.iter().map(|(n, m)| (*n, m))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Registers feeding the energy balance of the `day` and `total` categories
struct EnergyRegisters {
    pv: RegisterId,
    grid_feed: RegisterId,
    grid_purchase: RegisterId,
    battery_charge: RegisterId,
    battery_discharge: RegisterId,
}

const DAY_ENERGY: EnergyRegisters = EnergyRegisters {
    pv: RegisterId::PvEnergyDay,
    grid_feed: RegisterId::GridFeedDay,
    grid_purchase: RegisterId::GridPurchaseDay,
    battery_charge: RegisterId::BatteryChargeDay,
    battery_discharge: RegisterId::BatteryDischargeDay,
};

const TOTAL_ENERGY: EnergyRegisters = EnergyRegisters {
    pv: RegisterId::PvEnergyTotal,
    grid_feed: RegisterId::GridFeedTotal,
    grid_purchase: RegisterId::GridPurchaseTotal,
    battery_charge: RegisterId::BatteryChargeTotal,
    battery_discharge: RegisterId::BatteryDischargeTotal,
};

/// Checked access to the readings of one category
struct Readings<'a> {
    raw: &'a RawReadingSet,
}

impl<'a> Readings<'a> {
    fn field(&self, register: RegisterId) -> Result<&'a RegisterValue, BridgeError> {
        self.raw
            .get(&register)
            .ok_or_else(|| BridgeError::IncompleteData(format!("register {register} missing")))
    }

    fn passthrough(&self, register: RegisterId) -> Result<Metric, BridgeError> {
        self.field(register).map(|r| Metric::Structured(r.clone()))
    }

    fn number(&self, register: RegisterId) -> Result<Number, BridgeError> {
        let field = self.field(register)?;
        field.value.as_number().ok_or_else(|| {
            BridgeError::IncompleteData(format!(
                "register {register} is not numeric: {:?}",
                field.value
            ))
        })
    }
}

/// Convert the raw readings of a category into its metrics bundle
pub fn transform(
    category: Category,
    raw: &RawReadingSet,
    now: DateTime<Local>,
) -> Result<MetricsBundle, BridgeError> {
    let readings = Readings { raw };

    // every required register up front, even those only passed through
    for register in category.registers() {
        readings.field(*register)?;
    }

    let mut bundle = MetricsBundle::new(category, now);
    match category {
        Category::Config => {
            bundle.push("serial_no", readings.passthrough(RegisterId::SerialNumber)?);
            bundle.push("firmware_version", readings.passthrough(RegisterId::FirmwareVersion)?);
        }
        Category::Current => current_metrics(&readings, &mut bundle)?,
        Category::Day => energy_metrics(&readings, &DAY_ENERGY, &mut bundle)?,
        Category::Total => energy_metrics(&readings, &TOTAL_ENERGY, &mut bundle)?,
    }
    Ok(bundle)
}

fn current_metrics(readings: &Readings<'_>, bundle: &mut MetricsBundle) -> Result<(), BridgeError> {
    let consumption =
        readings.number(RegisterId::InverterPower)? - readings.number(RegisterId::GridPower)?;

    bundle.push("inverter_date", readings.passthrough(RegisterId::InverterDate)?);
    bundle.push("inverter_status", readings.passthrough(RegisterId::InverterStatus)?);
    bundle.push("PV", readings.passthrough(RegisterId::PvPower)?);
    bundle.push("grid", readings.passthrough(RegisterId::GridPower)?);
    bundle.push("battery", readings.passthrough(RegisterId::BatteryPower)?);
    bundle.push("inverter", readings.passthrough(RegisterId::InverterPower)?);
    bundle.push("backup", readings.passthrough(RegisterId::BackupPower)?);
    bundle.push("consumption", Metric::Scalar(consumption.into()));
    bundle.push("battery_SOC", readings.passthrough(RegisterId::BatterySoc)?);
    Ok(())
}

fn energy_metrics(
    readings: &Readings<'_>,
    registers: &EnergyRegisters,
    bundle: &mut MetricsBundle,
) -> Result<(), BridgeError> {
    let pv = readings.number(registers.pv)?;
    let grid_feed = readings.number(registers.grid_feed)?;
    let grid_purchase = readings.number(registers.grid_purchase)?;
    let battery_charge = readings.number(registers.battery_charge)?;
    let battery_discharge = readings.number(registers.battery_discharge)?;

    let consumption = pv + grid_purchase + battery_discharge - grid_feed - battery_charge;
    let autarky_rate = percentage_complement(grid_purchase, consumption);
    let own_consumption_rate = percentage_complement(grid_feed, pv);

    bundle.push("PV", readings.passthrough(registers.pv)?);
    bundle.push("grid_feed", readings.passthrough(registers.grid_feed)?);
    bundle.push("grid_purchase", readings.passthrough(registers.grid_purchase)?);
    bundle.push("battery_charge", readings.passthrough(registers.battery_charge)?);
    bundle.push("battery_discharge", readings.passthrough(registers.battery_discharge)?);
    bundle.push("consumption", Metric::Scalar(consumption.into()));
    bundle.push("autarky_rate", Metric::Scalar(autarky_rate));
    bundle.push("own_consumption_rate", Metric::Scalar(own_consumption_rate));
    Ok(())
}

/// `100 * (1 - part / whole)`, or 0 when `whole` is not positive
fn percentage_complement(part: Number, whole: Number) -> Value {
    let whole = whole.as_f64();
    if whole > 0.0 {
        Value::Float(100.0 * (1.0 - part.as_f64() / whole))
    } else {
        Value::Int(0)
    }
}
