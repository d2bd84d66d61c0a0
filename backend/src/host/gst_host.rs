//! Host that assembles the chain as a GStreamer bin.

use super::{Chain, ElementNames, Host, HostError};
use crate::element::{GstParamElement, LimiterParam, LoudnessParam};
use gstreamer as gst;
use gstreamer::prelude::*;
use std::rc::Rc;
use tracing::info;

/// GStreamer host. The node's ports are a `gst::Bin` with ghost pads
/// `sink` (converter input) and `src` (loudness meter output).
///
/// Assembly wraps the elements for parameter access, which needs the host
/// event loop: call it from inside a `LocalSet`.
#[derive(Debug, Default)]
pub struct GstHost;

impl GstHost {
    pub fn new() -> Self {
        Self
    }
}

fn make(name: &str, role: &str, factory: &str) -> Result<gst::Element, HostError> {
    gst::ElementFactory::make(factory)
        .name(format!("{}:{}", name, role))
        .build()
        .map_err(|_| HostError::Unavailable(factory.to_string()))
}

fn link(from: &gst::Element, to: &gst::Element) -> Result<(), HostError> {
    from.link(to).map_err(|_| HostError::Link {
        from: from.name().to_string(),
        to: to.name().to_string(),
    })
}

fn ghost(element: &gst::Element, pad: &str) -> Result<gst::GhostPad, HostError> {
    let target = element
        .static_pad(pad)
        .ok_or_else(|| HostError::MissingPad {
            element: element.name().to_string(),
            pad: pad.to_string(),
        })?;
    Ok(gst::GhostPad::builder_with_target(&target)?.name(pad).build())
}

impl Host for GstHost {
    type Ports = gst::Bin;

    fn assemble(&self, name: &str, elements: &ElementNames) -> Result<Chain<gst::Bin>, HostError> {
        let converter = make(name, "convert", &elements.converter)?;
        let limiter = make(name, "limiter", &elements.limiter)?;
        let loudness = make(name, "loudness", &elements.loudness)?;

        let bin = gst::Bin::builder().name(name).build();
        bin.add_many([&converter, &limiter, &loudness])?;
        link(&converter, &limiter)?;
        link(&limiter, &loudness)?;

        bin.add_pad(&ghost(&converter, "sink")?)?;
        bin.add_pad(&ghost(&loudness, "src")?)?;

        info!(
            "Assembled {}: {} -> {} -> {}",
            name, elements.converter, elements.limiter, elements.loudness
        );

        Ok(Chain {
            limiter: Rc::new(GstParamElement::<LimiterParam>::new(limiter, &elements.limiter)),
            loudness: Rc::new(GstParamElement::<LoudnessParam>::new(loudness, &elements.loudness)),
            ports: bin,
        })
    }
}
