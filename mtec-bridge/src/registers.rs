//! M-TEC Energybutler register map
//!
//! Every register the bridge reads is named by a `RegisterId` variant, so a typo
//! in a category definition is a compile error instead of a failed lookup at
//! runtime. Each register knows its Modbus address, word length, data kind,
//! scale and unit, and how to decode the raw holding-register words.

use crate::error::TransportError;
use crate::model::Value;
use std::fmt;

/// Identifier of one inverter register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterId {
    // config
    SerialNumber,
    FirmwareVersion,
    // current
    InverterDate,
    InverterStatus,
    GridPower,
    InverterPower,
    PvPower,
    BackupPower,
    BatteryPower,
    BatterySoc,
    // day
    GridFeedDay,
    GridPurchaseDay,
    BatteryChargeDay,
    BatteryDischargeDay,
    PvEnergyDay,
    // total
    GridFeedTotal,
    GridPurchaseTotal,
    BatteryChargeTotal,
    BatteryDischargeTotal,
    PvEnergyTotal,
}

/// Encoding of a register's words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    U16,
    I16,
    U32,
    I32,
    /// ASCII text spread over the given number of words
    Str(u16),
    /// Raw bytes rendered as a dotted version string
    Bytes(u16),
    /// Packed date: yy mm / dd hh / mi ss
    Date,
}

/// Static description of one register
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterSpec {
    pub address: u16,
    pub kind: RegisterKind,
    pub scale: u16,
    pub unit: Option<&'static str>,
    pub name: &'static str,
}

impl RegisterId {
    pub const ALL: [RegisterId; 20] = [
        RegisterId::SerialNumber,
        RegisterId::FirmwareVersion,
        RegisterId::InverterDate,
        RegisterId::InverterStatus,
        RegisterId::GridPower,
        RegisterId::InverterPower,
        RegisterId::PvPower,
        RegisterId::BackupPower,
        RegisterId::BatteryPower,
        RegisterId::BatterySoc,
        RegisterId::GridFeedDay,
        RegisterId::GridPurchaseDay,
        RegisterId::BatteryChargeDay,
        RegisterId::BatteryDischargeDay,
        RegisterId::PvEnergyDay,
        RegisterId::GridFeedTotal,
        RegisterId::GridPurchaseTotal,
        RegisterId::BatteryChargeTotal,
        RegisterId::BatteryDischargeTotal,
        RegisterId::PvEnergyTotal,
    ];

    pub fn spec(self) -> RegisterSpec {
        use RegisterKind::*;
        let (address, kind, scale, unit, name) = match self {
            RegisterId::SerialNumber => (10000, Str(8), 1, None, "Inverter serial number"),
            RegisterId::FirmwareVersion => (10011, Bytes(4), 1, None, "Firmware version"),
            RegisterId::InverterDate => (10100, Date, 1, None, "Inverter date"),
            RegisterId::InverterStatus => (10105, U16, 1, None, "Inverter status"),
            RegisterId::GridPower => (11000, I32, 1, Some("W"), "Grid power"),
            RegisterId::InverterPower => (11016, I32, 1, Some("W"), "Inverter AC power"),
            RegisterId::PvPower => (11028, U32, 1, Some("W"), "PV power"),
            RegisterId::BackupPower => (30230, I32, 1, Some("W"), "Backup power"),
            RegisterId::BatteryPower => (30258, I32, 1, Some("W"), "Battery power"),
            RegisterId::BatterySoc => (33000, U16, 100, Some("%"), "Battery SOC"),
            RegisterId::GridFeedDay => (31000, U16, 10, Some("kWh"), "Grid injection energy (day)"),
            RegisterId::GridPurchaseDay => (31001, U16, 10, Some("kWh"), "Grid purchased energy (day)"),
            RegisterId::BatteryChargeDay => (31003, U16, 10, Some("kWh"), "Battery charge energy (day)"),
            RegisterId::BatteryDischargeDay => {
                (31004, U16, 10, Some("kWh"), "Battery discharge energy (day)")
            }
            RegisterId::PvEnergyDay => (31005, U16, 10, Some("kWh"), "PV energy generated (day)"),
            RegisterId::GridFeedTotal => (31102, U32, 10, Some("kWh"), "Grid energy injected (total)"),
            RegisterId::GridPurchaseTotal => {
                (31104, U32, 10, Some("kWh"), "Grid energy purchased (total)")
            }
            RegisterId::BatteryChargeTotal => {
                (31108, U32, 10, Some("kWh"), "Battery energy charged (total)")
            }
            RegisterId::BatteryDischargeTotal => {
                (31110, U32, 10, Some("kWh"), "Battery energy discharged (total)")
            }
            RegisterId::PvEnergyTotal => (31112, U32, 10, Some("kWh"), "PV energy generated (total)"),
        };
        RegisterSpec { address, kind, scale, unit, name }
    }

    pub fn address(self) -> u16 {
        self.spec().address
    }

    /// Number of 16-bit words occupied by this register
    pub fn words(self) -> u16 {
        self.spec().kind.words()
    }

    /// Look a register up by its decimal address string, e.g. `"10000"`
    pub fn from_address(address: &str) -> Option<Self> {
        let address: u16 = address.parse().ok()?;
        Self::ALL.into_iter().find(|id| id.address() == address)
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}

impl RegisterKind {
    pub fn words(self) -> u16 {
        match self {
            RegisterKind::U16 | RegisterKind::I16 => 1,
            RegisterKind::U32 | RegisterKind::I32 => 2,
            RegisterKind::Str(n) | RegisterKind::Bytes(n) => n,
            RegisterKind::Date => 3,
        }
    }
}

impl RegisterSpec {
    /// Decode the raw words of this register into a typed value
    pub fn decode(&self, words: &[u16]) -> Result<Value, TransportError> {
        let expected = self.kind.words() as usize;
        if words.len() != expected {
            return Err(TransportError::Decode(format!(
                "register {} expects {} words, got {}",
                self.address,
                expected,
                words.len()
            )));
        }

        let raw = match self.kind {
            RegisterKind::U16 => i64::from(words[0]),
            RegisterKind::I16 => i64::from(words[0] as i16),
            RegisterKind::U32 => i64::from(join_words(words[0], words[1])),
            RegisterKind::I32 => i64::from(join_words(words[0], words[1]) as i32),
            RegisterKind::Str(_) => return Ok(Value::Text(decode_text(words))),
            RegisterKind::Bytes(_) => return Ok(Value::Text(decode_version(words))),
            RegisterKind::Date => return Ok(Value::Text(decode_date(words))),
        };

        if self.scale > 1 {
            Ok(Value::Float(raw as f64 / f64::from(self.scale)))
        } else {
            Ok(Value::Int(raw))
        }
    }
}

fn join_words(high: u16, low: u16) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

fn bytes_of(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

fn decode_text(words: &[u16]) -> String {
    let bytes = bytes_of(words);
    String::from_utf8_lossy(&bytes)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

fn decode_version(words: &[u16]) -> String {
    bytes_of(words)
        .chunks(4)
        .map(|group| {
            let parts: Vec<String> = group.iter().map(|b| b.to_string()).collect();
            format!("V{}", parts.join("."))
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn decode_date(words: &[u16]) -> String {
    let [yy, mm, dd, hh, mi, ss] = match bytes_of(words)[..] {
        [a, b, c, d, e, f] => [a, b, c, d, e, f],
        _ => return String::new(),
    };
    format!("20{yy:02}-{mm:02}-{dd:02} {hh:02}:{mi:02}:{ss:02}")
}
