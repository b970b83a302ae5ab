//! Publish payload formatting
//!
//! Booleans become `"0"`/`"1"`, floats use the configured fixed format and
//! everything else is forwarded as-is.

use crate::error::BridgeError;
use crate::model::Value;
use std::str::FromStr;

/// Float format parsed from strings like `{:.3f}`, `{:.2}` or `{}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FloatFormat {
    precision: Option<usize>,
}

impl FloatFormat {
    pub fn fixed(precision: usize) -> Self {
        Self { precision: Some(precision) }
    }

    pub fn format(&self, value: f64) -> String {
        match self.precision {
            Some(p) => format!("{value:.p$}"),
            None => format!("{value}"),
        }
    }
}

impl FromStr for FloatFormat {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BridgeError::Config(format!("unsupported float format: {s:?}"));

        let inner = s
            .trim()
            .strip_prefix('{')
            .and_then(|r| r.strip_suffix('}'))
            .ok_or_else(invalid)?;
        if inner.is_empty() || inner == ":" {
            return Ok(FloatFormat::default());
        }

        let digits = inner.strip_prefix(":.").ok_or_else(invalid)?;
        let digits = digits.strip_suffix('f').unwrap_or(digits);
        let precision = digits.parse::<usize>().map_err(|_| invalid())?;
        Ok(FloatFormat::fixed(precision))
    }
}

/// Render a metric value as a publish payload
pub fn format_value(value: &Value, float_format: &FloatFormat) -> String {
    match value {
        Value::Bool(b) => u8::from(*b).to_string(),
        Value::Float(f) => float_format.format(*f),
        Value::Int(i) => i.to_string(),
        Value::Text(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float_formats() {
        assert_eq!("{:.3f}".parse::<FloatFormat>().unwrap(), FloatFormat::fixed(3));
        assert_eq!("{:.1}".parse::<FloatFormat>().unwrap(), FloatFormat::fixed(1));
        assert_eq!("{}".parse::<FloatFormat>().unwrap(), FloatFormat::default());
        assert!("%.2f".parse::<FloatFormat>().is_err());
        assert!("{:.xf}".parse::<FloatFormat>().is_err());
    }

    #[test]
    fn test_format_values() {
        let fmt = FloatFormat::fixed(3);
        assert_eq!(format_value(&Value::Bool(true), &fmt), "1");
        assert_eq!(format_value(&Value::Bool(false), &fmt), "0");
        assert_eq!(format_value(&Value::Float(85.714285), &fmt), "85.714");
        assert_eq!(format_value(&Value::Float(80.0), &fmt), "80.000");
        assert_eq!(format_value(&Value::Int(-700), &fmt), "-700");
        assert_eq!(format_value(&Value::Text("ABC".into()), &fmt), "ABC");
    }
}
