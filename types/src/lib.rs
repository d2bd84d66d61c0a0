//! Shared types for the autolimit limiter node.
//!
//! This crate contains the value and event types exchanged between the
//! node, the configuration store and any observer (UI, logger).

/// Default cadence of the meter timers, in milliseconds.
pub const DEFAULT_METER_INTERVAL_MS: u64 = 100;

pub mod events;
pub mod meter;
pub mod value;

// Re-export commonly used types
pub use events::LimiterEvent;
pub use meter::{MeterKind, MeterSample};
pub use value::{PropertyValue, ValueType};
