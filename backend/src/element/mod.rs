//! Typed parameter access to the elements wrapped by the node.
//!
//! Every wrapped element type has a closed set of parameters ([`ParamId`]),
//! each with a declared kind and valid range. Access goes through
//! [`ParamElement`], implemented in memory ([`MemoryElement`]) and on top of
//! GStreamer (`GstParamElement`, feature `gst`).

#[cfg(feature = "gst")]
mod gst_element;
mod memory;
mod params;
mod watch;

#[cfg(feature = "gst")]
pub use gst_element::GstParamElement;
pub use memory::MemoryElement;
pub use params::{LimiterParam, LoudnessParam};

use autolimit_types::{PropertyValue, ValueType};
use std::fmt::Debug;
use std::hash::Hash;

use crate::transform::Domain;

/// Storage kind and valid range of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// Single precision float (`gfloat`)
    Float { min: f32, max: f32 },
    /// Double precision float (`gdouble`)
    Double { min: f64, max: f64 },
    /// Unsigned 64-bit integer (`guint64`)
    UInt64 { min: u64, max: u64 },
    Bool,
}

impl ParamKind {
    pub fn value_type(&self) -> ValueType {
        match self {
            ParamKind::Float { .. } | ParamKind::Double { .. } => ValueType::Float,
            ParamKind::UInt64 { .. } => ValueType::UInt,
            ParamKind::Bool => ValueType::Bool,
        }
    }

    pub fn domain(&self) -> Domain {
        let bounds = match *self {
            ParamKind::Float { min, max } => Some((min as f64, max as f64)),
            ParamKind::Double { min, max } => Some((min, max)),
            ParamKind::UInt64 { min, max } => Some((min as f64, max as f64)),
            ParamKind::Bool => None,
        };
        Domain::new(self.value_type(), bounds)
    }

    /// Convert a value to the representation stored by this kind.
    ///
    /// Numbers are clamped to the range and narrowed to the storage width.
    /// Returns `None` when a boolean meets a numeric kind or vice versa.
    pub fn coerce(&self, value: &PropertyValue) -> Option<PropertyValue> {
        match *self {
            ParamKind::Bool => value.as_bool().map(PropertyValue::Bool),
            ParamKind::Float { min, max } => {
                let v = finite_or(value.as_f64()?, min as f64);
                Some(PropertyValue::Float((v as f32).clamp(min, max) as f64))
            }
            ParamKind::Double { min, max } => {
                let v = finite_or(value.as_f64()?, min);
                Some(PropertyValue::Float(v.clamp(min, max)))
            }
            ParamKind::UInt64 { min, max } => {
                let v = finite_or(value.as_f64()?, min as f64);
                let v = v.round().clamp(min as f64, max as f64) as u64;
                Some(PropertyValue::UInt(v))
            }
        }
    }
}

fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v
    } else if v == f64::INFINITY {
        f64::MAX
    } else if v == f64::NEG_INFINITY {
        f64::MIN
    } else {
        fallback
    }
}

/// Declaration of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub default: PropertyValue,
    /// Read-only parameters are outputs of the element (meters, loudness)
    pub writable: bool,
}

impl ParamSpec {
    pub const fn new(kind: ParamKind, default: PropertyValue) -> Self {
        Self {
            kind,
            default,
            writable: true,
        }
    }

    pub const fn read_only(kind: ParamKind, default: PropertyValue) -> Self {
        Self {
            kind,
            default,
            writable: false,
        }
    }
}

/// Identifier of a parameter of one element type.
pub trait ParamId: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every parameter of the element type.
    const ALL: &'static [Self];

    /// Property name on the underlying element.
    fn name(self) -> &'static str;

    fn spec(self) -> ParamSpec;

    /// Boolean parameter that must be on for this one to notify.
    fn enabled_by(self) -> Option<Self> {
        None
    }
}

/// Handle of a registered parameter watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub(crate) u64);

/// Callback invoked with the new value of a watched parameter.
pub type ParamHandler = Box<dyn Fn(&PropertyValue)>;

/// Parameter get/set/notify interface of a wrapped element.
///
/// All calls happen on the host event loop. Writes are synchronous and
/// immediately visible to the next read.
pub trait ParamElement<P: ParamId> {
    /// Factory name the element was created from.
    fn factory_name(&self) -> &str;

    /// Whether the element actually exposes the parameter.
    fn has_param(&self, param: P) -> bool;

    fn get(&self, param: P) -> PropertyValue;

    /// Write a parameter. Values are coerced to the parameter's kind; writes
    /// to read-only parameters are ignored with a warning.
    fn set(&self, param: P, value: PropertyValue);

    /// Register a handler called each time the element reports a new value.
    fn watch(&self, param: P, handler: ParamHandler) -> WatchId;

    /// Remove a handler. It is never called again, even from a notification
    /// that is already being dispatched.
    fn unwatch(&self, id: WatchId);
}
