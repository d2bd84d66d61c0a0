//! Unit transforms applied by parameter bindings.
//!
//! Every transform is pure and total: the result is always converted to the
//! destination's value type and clamped to its range, so an out-of-range
//! setting can never produce an invalid parameter write.

use autolimit_types::{PropertyValue, ValueType};

/// Lowest level returned by [`linear_to_db`], for zero or negative input.
pub const DB_FLOOR: f64 = -120.0;

/// Convert dB to linear scale.
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear scale to dB.
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        DB_FLOOR
    } else {
        20.0 * linear.log10()
    }
}

/// Value type and optional inclusive range of a binding endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub ty: ValueType,
    pub bounds: Option<(f64, f64)>,
}

impl Domain {
    pub fn new(ty: ValueType, bounds: Option<(f64, f64)>) -> Self {
        Self { ty, bounds }
    }

    fn clamp(&self, v: f64) -> f64 {
        let v = if v.is_nan() {
            self.bounds.map(|(min, _)| min).unwrap_or(0.0)
        } else {
            v
        };
        match self.bounds {
            Some((min, max)) => v.clamp(min, max),
            None => v,
        }
    }

    /// Convert a numeric result into this domain.
    fn number(&self, v: f64) -> PropertyValue {
        let v = self.clamp(v);
        match self.ty {
            ValueType::Int => PropertyValue::Int(v.round() as i64),
            ValueType::UInt => PropertyValue::UInt(v.round().max(0.0) as u64),
            ValueType::Float => PropertyValue::Float(v),
            ValueType::Bool => PropertyValue::Bool(v != 0.0),
        }
    }
}

/// Transform between a configuration value and a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Direct copy, with type conversion and clamping only
    Identity,
    /// dB to linear amplitude gain, `10^(dB/20)`
    DbToGain,
    /// Linear amplitude gain to dB
    GainToDb,
    /// Double to single precision, deliberately lossy
    DoubleToFloat,
    /// Milliseconds to nanoseconds
    MsToNs,
    /// Integer setting to a float parameter
    IntToFloat,
}

impl Transform {
    /// Type produced from an input of type `input`, or `None` when the
    /// transform does not accept it.
    pub fn output_type(self, input: ValueType) -> Option<ValueType> {
        match (self, input) {
            (Transform::Identity, ty) => Some(ty),
            (_, ValueType::Bool) => None,
            (Transform::MsToNs, _) => Some(ValueType::UInt),
            (Transform::DbToGain, _)
            | (Transform::GainToDb, _)
            | (Transform::DoubleToFloat, _)
            | (Transform::IntToFloat, _) => Some(ValueType::Float),
        }
    }

    /// Apply the transform and fit the result into `domain`.
    pub fn apply(self, value: &PropertyValue, domain: &Domain) -> PropertyValue {
        let number = match (self, value) {
            (Transform::Identity, PropertyValue::Bool(b)) => return PropertyValue::Bool(*b),
            (_, PropertyValue::Bool(b)) => {
                // Rejected by `output_type` when the binding is created
                return domain.number(if *b { 1.0 } else { 0.0 });
            }
            (_, v) => v.as_f64().unwrap_or_default(),
        };

        let out = match self {
            Transform::Identity | Transform::IntToFloat => number,
            Transform::DbToGain => db_to_linear(number),
            Transform::GainToDb => linear_to_db(number),
            Transform::DoubleToFloat => number as f32 as f64,
            Transform::MsToNs => number * 1_000_000.0,
        };
        domain.number(out)
    }
}
