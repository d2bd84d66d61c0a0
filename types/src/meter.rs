//! Meter samples emitted by the limiter node.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stereo level reading taken from the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterSample {
    pub left: f64,
    pub right: f64,
}

impl MeterSample {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }
}

/// The three independent meters of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeterKind {
    /// Input level (left/right)
    Input,
    /// Output level (left/right)
    Output,
    /// Gain reduction applied by the limiter
    Attenuation,
}

impl MeterKind {
    pub const ALL: [MeterKind; 3] = [MeterKind::Input, MeterKind::Output, MeterKind::Attenuation];
}

impl fmt::Display for MeterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeterKind::Input => "input",
            MeterKind::Output => "output",
            MeterKind::Attenuation => "attenuation",
        };
        f.write_str(name)
    }
}
