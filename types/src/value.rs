//! Property and setting values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of an element parameter or a configuration key.
///
/// Element parameters and settings are numbers or booleans; the variant
/// records which one was produced, the declared kind of the destination
/// decides how it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

/// Coarse type of a [`PropertyValue`], used to check bindings ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    UInt,
    Float,
}

impl ValueType {
    /// Numeric types convert into each other; booleans only into booleans.
    pub fn converts_to(self, other: ValueType) -> bool {
        match (self, other) {
            (ValueType::Bool, ValueType::Bool) => true,
            (ValueType::Bool, _) | (_, ValueType::Bool) => false,
            _ => true,
        }
    }
}

impl PropertyValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            PropertyValue::Int(_) => ValueType::Int,
            PropertyValue::UInt(_) => ValueType::UInt,
            PropertyValue::Float(_) => ValueType::Float,
            PropertyValue::Bool(_) => ValueType::Bool,
        }
    }

    /// Numeric view of the value. Booleans have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::UInt(u) => Some(*u as f64),
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Bool(_) => None,
        }
    }

    /// Integer view of the value, rounding floats to the nearest integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            PropertyValue::UInt(u) => i64::try_from(*u).ok(),
            PropertyValue::Float(f) => Some(f.round() as i64),
            PropertyValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::UInt(u) => write!(f, "{}", u),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<u64> for PropertyValue {
    fn from(u: u64) -> Self {
        PropertyValue::UInt(u)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}
