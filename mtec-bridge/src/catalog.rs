//! Register set catalog: which registers make up each read category

use crate::error::BridgeError;
use crate::registers::RegisterId;
use std::fmt;
use std::str::FromStr;

/// Group of registers read together on a shared cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Config,
    Current,
    Day,
    Total,
}

const CONFIG_REGISTERS: &[RegisterId] = &[RegisterId::SerialNumber, RegisterId::FirmwareVersion];

const CURRENT_REGISTERS: &[RegisterId] = &[
    RegisterId::InverterDate,
    RegisterId::InverterStatus,
    RegisterId::PvPower,
    RegisterId::GridPower,
    RegisterId::BatteryPower,
    RegisterId::InverterPower,
    RegisterId::BackupPower,
    RegisterId::BatterySoc,
];

const DAY_REGISTERS: &[RegisterId] = &[
    RegisterId::GridFeedDay,
    RegisterId::GridPurchaseDay,
    RegisterId::BatteryChargeDay,
    RegisterId::BatteryDischargeDay,
    RegisterId::PvEnergyDay,
];

const TOTAL_REGISTERS: &[RegisterId] = &[
    RegisterId::GridFeedTotal,
    RegisterId::GridPurchaseTotal,
    RegisterId::BatteryChargeTotal,
    RegisterId::BatteryDischargeTotal,
    RegisterId::PvEnergyTotal,
];

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Config,
        Category::Current,
        Category::Day,
        Category::Total,
    ];

    /// Ordered list of registers required for this category
    pub fn registers(self) -> &'static [RegisterId] {
        match self {
            Category::Config => CONFIG_REGISTERS,
            Category::Current => CURRENT_REGISTERS,
            Category::Day => DAY_REGISTERS,
            Category::Total => TOTAL_REGISTERS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Config => "config",
            Category::Current => "current",
            Category::Day => "day",
            Category::Total => "total",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| BridgeError::UnknownCategory(s.to_string()))
    }
}

/// Register list for a category given by name
pub fn register_list(category: &str) -> Result<&'static [RegisterId], BridgeError> {
    category.parse::<Category>().map(Category::registers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_registers() {
        for category in Category::ALL {
            let registers = register_list(category.as_str()).unwrap();
            assert!(!registers.is_empty(), "{category} has no registers");
            assert_eq!(registers, category.registers());
        }
    }

    #[test]
    fn test_register_order_is_stable() {
        let first = register_list("current").unwrap();
        let second = register_list("current").unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0], RegisterId::InverterDate);
        assert_eq!(first.len(), 8);
    }

    #[test]
    fn test_unknown_category() {
        let err = register_list("week").unwrap_err();
        assert!(matches!(err, BridgeError::UnknownCategory(name) if name == "week"));
        assert!("Config".parse::<Category>().is_err());
    }

    #[test]
    fn test_categories_do_not_share_registers() {
        let mut all: Vec<RegisterId> = Category::ALL
            .iter()
            .flat_map(|c| c.registers().iter().copied())
            .collect();
        let count = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), count);
        assert_eq!(count, RegisterId::ALL.len());
    }
}
