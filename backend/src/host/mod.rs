//! Creation and linking of the node's element chain.
//!
//! A [`Host`] instantiates the converter, limiter and loudness meter by
//! factory name, links them in series and exposes the two ends of the chain
//! as the node's ports. The limiter and meter come back wrapped behind the
//! typed parameter interface.

#[cfg(feature = "gst")]
mod gst_host;
mod memory;

#[cfg(feature = "gst")]
pub use gst_host::GstHost;
pub use memory::{MemoryHost, MemoryPorts};

use crate::element::{LimiterParam, LoudnessParam, ParamElement};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

pub const CONVERTER_FACTORY: &str = "audioconvert";
pub const LIMITER_FACTORY: &str = "calf-sourceforge-net-plugins-Limiter";
pub const LOUDNESS_FACTORY: &str = "peebur";

/// Error type for chain assembly.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Element {0} is not available")]
    Unavailable(String),

    #[error("Failed to link {from} to {to}")]
    Link { from: String, to: String },

    #[error("Missing pad {pad} on {element}")]
    MissingPad { element: String, pad: String },

    #[cfg(feature = "gst")]
    #[error("GStreamer boolean error: {0}")]
    BoolError(#[from] gstreamer::glib::BoolError),
}

/// Factory names of the three chain elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementNames {
    pub converter: String,
    pub limiter: String,
    pub loudness: String,
}

impl Default for ElementNames {
    fn default() -> Self {
        Self {
            converter: CONVERTER_FACTORY.to_string(),
            limiter: LIMITER_FACTORY.to_string(),
            loudness: LOUDNESS_FACTORY.to_string(),
        }
    }
}

/// Assembled chain: the parameter handles plus the host's port object.
pub struct Chain<T> {
    pub limiter: Rc<dyn ParamElement<LimiterParam>>,
    pub loudness: Rc<dyn ParamElement<LoudnessParam>>,
    pub ports: T,
}

/// Media pipeline host.
pub trait Host {
    /// What the host exposes as the node's input and output.
    type Ports;

    /// Create converter → limiter → loudness, linked in that order.
    ///
    /// A factory that cannot be instantiated yields [`HostError::Unavailable`]
    /// naming it.
    fn assemble(&self, name: &str, elements: &ElementNames)
        -> Result<Chain<Self::Ports>, HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_element_names() {
        let names = ElementNames::default();
        assert_eq!(names.converter, "audioconvert");
        assert_eq!(names.limiter, "calf-sourceforge-net-plugins-Limiter");
        assert_eq!(names.loudness, "peebur");
    }

    #[test]
    fn test_element_names_partial_override() {
        let names: ElementNames = serde_json::from_str(r#"{"limiter":"x-limiter"}"#).unwrap();
        assert_eq!(names.limiter, "x-limiter");
        assert_eq!(names.loudness, LOUDNESS_FACTORY);
    }
}
