//! Typed key schema of the configuration store.

use super::SettingsError;
use crate::transform::Domain;
use autolimit_types::{PropertyValue, ValueType};

/// Key names of the limiter schema.
pub mod keys {
    pub const POST_MESSAGES: &str = "post-messages";
    pub const INPUT_GAIN: &str = "input-gain";
    pub const LIMIT: &str = "limit";
    pub const LOOKAHEAD: &str = "lookahead";
    pub const RELEASE: &str = "release";
    pub const ASC: &str = "asc";
    pub const ASC_LEVEL: &str = "asc-level";
    pub const OVERSAMPLING: &str = "oversampling";
    pub const AUTOVOLUME_STATE: &str = "autovolume-state";
    pub const AUTOVOLUME_WINDOW: &str = "autovolume-window";
    pub const AUTOVOLUME_TARGET: &str = "autovolume-target";
    pub const AUTOVOLUME_TOLERANCE: &str = "autovolume-tolerance";
}

/// Type and range of a key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingKind {
    Bool,
    Int { min: i64, max: i64 },
    Double { min: f64, max: f64 },
}

impl SettingKind {
    pub fn value_type(&self) -> ValueType {
        match self {
            SettingKind::Bool => ValueType::Bool,
            SettingKind::Int { .. } => ValueType::Int,
            SettingKind::Double { .. } => ValueType::Float,
        }
    }

    pub fn domain(&self) -> Domain {
        let bounds = match *self {
            SettingKind::Bool => None,
            SettingKind::Int { min, max } => Some((min as f64, max as f64)),
            SettingKind::Double { min, max } => Some((min, max)),
        };
        Domain::new(self.value_type(), bounds)
    }

    /// Validate a value for this kind, converting between numeric variants.
    ///
    /// Integers accept floats only when they carry no fractional part.
    pub fn check(&self, key: &str, value: &PropertyValue) -> Result<PropertyValue, SettingsError> {
        let mismatch = || SettingsError::TypeMismatch {
            key: key.to_string(),
            expected: self.value_type(),
            found: value.value_type(),
        };
        let out_of_range = || SettingsError::OutOfRange {
            key: key.to_string(),
            value: *value,
        };

        match *self {
            SettingKind::Bool => value.as_bool().map(PropertyValue::Bool).ok_or_else(mismatch),
            SettingKind::Int { min, max } => {
                let v = match value {
                    PropertyValue::Int(i) => *i,
                    PropertyValue::UInt(u) => i64::try_from(*u).map_err(|_| out_of_range())?,
                    PropertyValue::Float(f) if f.fract() == 0.0 => *f as i64,
                    _ => return Err(mismatch()),
                };
                if (min..=max).contains(&v) {
                    Ok(PropertyValue::Int(v))
                } else {
                    Err(out_of_range())
                }
            }
            SettingKind::Double { min, max } => {
                let v = value.as_f64().ok_or_else(mismatch)?;
                if v >= min && v <= max {
                    Ok(PropertyValue::Float(v))
                } else {
                    Err(out_of_range())
                }
            }
        }
    }

    /// Parse the textual form of a value, as typed on the command line.
    pub fn parse(&self, key: &str, text: &str) -> Result<PropertyValue, SettingsError> {
        let invalid = || SettingsError::Parse {
            key: key.to_string(),
            text: text.to_string(),
        };
        let value = match self {
            SettingKind::Bool => PropertyValue::Bool(text.trim().parse().map_err(|_| invalid())?),
            SettingKind::Int { .. } => PropertyValue::Int(text.trim().parse().map_err(|_| invalid())?),
            SettingKind::Double { .. } => {
                PropertyValue::Float(text.trim().parse().map_err(|_| invalid())?)
            }
        };
        self.check(key, &value)
    }
}

/// One key of a schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingSpec {
    pub key: &'static str,
    pub kind: SettingKind,
    pub default: PropertyValue,
    pub summary: &'static str,
}

/// Set of keys a store accepts.
#[derive(Debug, Clone)]
pub struct Schema {
    id: &'static str,
    specs: Vec<SettingSpec>,
}

impl Schema {
    pub fn new(id: &'static str, specs: Vec<SettingSpec>) -> Self {
        Self { id, specs }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn get(&self, key: &str) -> Option<&SettingSpec> {
        self.specs.iter().find(|spec| spec.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SettingSpec> {
        self.specs.iter()
    }
}

fn double(key: &'static str, min: f64, max: f64, default: f64, summary: &'static str) -> SettingSpec {
    SettingSpec {
        key,
        kind: SettingKind::Double { min, max },
        default: PropertyValue::Float(default),
        summary,
    }
}

fn int(key: &'static str, min: i64, max: i64, default: i64, summary: &'static str) -> SettingSpec {
    SettingSpec {
        key,
        kind: SettingKind::Int { min, max },
        default: PropertyValue::Int(default),
        summary,
    }
}

fn boolean(key: &'static str, default: bool, summary: &'static str) -> SettingSpec {
    SettingSpec {
        key,
        kind: SettingKind::Bool,
        default: PropertyValue::Bool(default),
        summary,
    }
}

/// Schema of the limiter node.
pub fn limiter_schema() -> Schema {
    use keys::*;

    Schema::new(
        "limiter",
        vec![
            boolean(POST_MESSAGES, false, "Publish input, output and attenuation meters"),
            double(INPUT_GAIN, -36.0, 36.0, 0.0, "Input gain (dB)"),
            double(LIMIT, -24.0, 0.0, 0.0, "Limit (dB)"),
            double(LOOKAHEAD, 0.1, 10.0, 5.0, "Lookahead (ms)"),
            double(RELEASE, 1.0, 1000.0, 50.0, "Release (ms)"),
            boolean(ASC, false, "Automatic smooth compression"),
            double(ASC_LEVEL, 0.25, 1.0, 0.5, "ASC level"),
            int(OVERSAMPLING, 1, 4, 1, "Oversampling factor"),
            boolean(AUTOVOLUME_STATE, false, "Adjust input gain to the target loudness"),
            double(AUTOVOLUME_WINDOW, 100.0, 10000.0, 1000.0, "Loudness window (ms)"),
            int(AUTOVOLUME_TARGET, -60, 0, -12, "Target loudness (LUFS)"),
            int(AUTOVOLUME_TOLERANCE, 0, 20, 2, "Loudness tolerance (LU)"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pass_their_own_check() {
        let schema = limiter_schema();
        for spec in schema.iter() {
            assert_eq!(
                spec.kind.check(spec.key, &spec.default).unwrap(),
                spec.default,
                "{}",
                spec.key
            );
        }
    }

    #[test]
    fn test_int_accepts_integral_float() {
        let kind = SettingKind::Int { min: 1, max: 4 };
        assert_eq!(
            kind.check("oversampling", &PropertyValue::Float(2.0)).unwrap(),
            PropertyValue::Int(2)
        );
        assert!(matches!(
            kind.check("oversampling", &PropertyValue::Float(2.5)),
            Err(SettingsError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let kind = SettingKind::Double {
            min: -36.0,
            max: 36.0,
        };
        assert!(matches!(
            kind.check("input-gain", &PropertyValue::Float(40.0)),
            Err(SettingsError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_parse() {
        let schema = limiter_schema();
        let target = schema.get(keys::AUTOVOLUME_TARGET).unwrap();
        assert_eq!(
            target.kind.parse(target.key, "-23").unwrap(),
            PropertyValue::Int(-23)
        );
        assert!(target.kind.parse(target.key, "loud").is_err());

        let asc = schema.get(keys::ASC).unwrap();
        assert_eq!(asc.kind.parse(asc.key, "true").unwrap(), PropertyValue::Bool(true));
    }
}
