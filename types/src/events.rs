//! Events broadcast by a limiter node to its observers.

use crate::meter::{MeterKind, MeterSample};
use serde::{Deserialize, Serialize};

/// Event types that can be broadcast to all observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LimiterEvent {
    /// Input level of the limiter, linear per channel
    InputLevel { node: String, sample: MeterSample },
    /// Output level of the limiter, linear per channel
    OutputLevel { node: String, sample: MeterSample },
    /// Current attenuation of the limiter
    Attenuation { node: String, value: f64 },
}

impl LimiterEvent {
    /// Name of the node that produced the event.
    pub fn node(&self) -> &str {
        match self {
            LimiterEvent::InputLevel { node, .. }
            | LimiterEvent::OutputLevel { node, .. }
            | LimiterEvent::Attenuation { node, .. } => node,
        }
    }

    /// Which meter produced the event.
    pub fn meter(&self) -> MeterKind {
        match self {
            LimiterEvent::InputLevel { .. } => MeterKind::Input,
            LimiterEvent::OutputLevel { .. } => MeterKind::Output,
            LimiterEvent::Attenuation { .. } => MeterKind::Attenuation,
        }
    }

    /// Get a human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            LimiterEvent::InputLevel { node, sample } => {
                format!("{} input level {:.4}/{:.4}", node, sample.left, sample.right)
            }
            LimiterEvent::OutputLevel { node, sample } => {
                format!("{} output level {:.4}/{:.4}", node, sample.left, sample.right)
            }
            LimiterEvent::Attenuation { node, value } => {
                format!("{} attenuation {:.4}", node, value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = LimiterEvent::Attenuation {
            node: "limiter".to_string(),
            value: 0.5,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"Attenuation","data":{"node":"limiter","value":0.5}}"#
        );
    }

    #[test]
    fn test_event_meter_kind() {
        let event = LimiterEvent::OutputLevel {
            node: "limiter".to_string(),
            sample: MeterSample::new(0.1, 0.2),
        };
        assert_eq!(event.meter(), MeterKind::Output);
        assert_eq!(event.node(), "limiter");
    }
}
