//! Host that builds the chain out of in-process elements.

use super::{Chain, ElementNames, Host, HostError};
use crate::element::{LimiterParam, LoudnessParam, MemoryElement};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};
use tracing::debug;

/// Port names of a chain built by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPorts {
    pub sink: String,
    pub src: String,
    /// Factory names in link order
    pub chain: Vec<String>,
}

/// In-process host.
///
/// Factories can be marked unavailable to reproduce a missing plugin. The
/// host keeps weak handles to the last elements it built so that callers can
/// drive them (publish meter values, loudness estimates) without owning them.
#[derive(Default)]
pub struct MemoryHost {
    unavailable: HashSet<String>,
    limiter: RefCell<Weak<MemoryElement<LimiterParam>>>,
    loudness: RefCell<Weak<MemoryElement<LoudnessParam>>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `factory` fail to instantiate.
    pub fn without(mut self, factory: &str) -> Self {
        self.unavailable.insert(factory.to_string());
        self
    }

    /// The limiter of the last assembled chain, while it is alive.
    pub fn limiter(&self) -> Option<Rc<MemoryElement<LimiterParam>>> {
        self.limiter.borrow().upgrade()
    }

    /// The loudness meter of the last assembled chain, while it is alive.
    pub fn loudness(&self) -> Option<Rc<MemoryElement<LoudnessParam>>> {
        self.loudness.borrow().upgrade()
    }

    fn check(&self, factory: &str) -> Result<(), HostError> {
        if self.unavailable.contains(factory) {
            Err(HostError::Unavailable(factory.to_string()))
        } else {
            Ok(())
        }
    }
}

impl Host for MemoryHost {
    type Ports = MemoryPorts;

    fn assemble(
        &self,
        name: &str,
        elements: &ElementNames,
    ) -> Result<Chain<MemoryPorts>, HostError> {
        self.check(&elements.converter)?;
        self.check(&elements.limiter)?;
        self.check(&elements.loudness)?;

        let limiter = Rc::new(MemoryElement::<LimiterParam>::new(elements.limiter.as_str()));
        let loudness = Rc::new(MemoryElement::<LoudnessParam>::new(elements.loudness.as_str()));
        *self.limiter.borrow_mut() = Rc::downgrade(&limiter);
        *self.loudness.borrow_mut() = Rc::downgrade(&loudness);

        debug!(
            "{}: linked {} -> {} -> {}",
            name, elements.converter, elements.limiter, elements.loudness
        );

        Ok(Chain {
            limiter,
            loudness,
            ports: MemoryPorts {
                sink: format!("{}:sink", name),
                src: format!("{}:src", name),
                chain: vec![
                    elements.converter.clone(),
                    elements.limiter.clone(),
                    elements.loudness.clone(),
                ],
            },
        })
    }
}
