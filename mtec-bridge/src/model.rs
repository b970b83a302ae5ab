//! Raw readings and typed values exchanged with the register transport

use crate::registers::RegisterId;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Sub};

/// Typed value of a register or a derived metric
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

/// Numeric view of a `Value`, used for derived-value arithmetic
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// One raw register reading plus the transport metadata forwarded with it
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterValue {
    pub value: Value,
    pub name: &'static str,
    pub unit: Option<&'static str>,
}

/// Readings of one category read, keyed by register
pub type RawReadingSet = HashMap<RegisterId, RegisterValue>;

impl Value {
    /// Numeric view; text, booleans and non-finite floats cannot take part in arithmetic
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) if f.is_finite() => Some(Number::Float(*f)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(Number::as_f64)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

// Integer operands stay integral unless the result would overflow.
impl Add for Number {
    type Output = Number;

    fn add(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_add(b)
                .map(Number::Int)
                .unwrap_or(Number::Float(a as f64 + b as f64)),
            (a, b) => Number::Float(a.as_f64() + b.as_f64()),
        }
    }
}

impl Sub for Number {
    type Output = Number;

    fn sub(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_sub(b)
                .map(Number::Int)
                .unwrap_or(Number::Float(a as f64 - b as f64)),
            (a, b) => Number::Float(a.as_f64() - b.as_f64()),
        }
    }
}

impl RegisterValue {
    /// Wrap a decoded value with the metadata of its register
    pub fn from_register(register: RegisterId, value: Value) -> Self {
        let spec = register.spec();
        Self {
            value,
            name: spec.name,
            unit: spec.unit,
        }
    }
}
