//! In-process element used when no GStreamer host is available.

use super::watch::Watchers;
use super::{ParamElement, ParamHandler, ParamId, WatchId};
use autolimit_types::PropertyValue;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use tracing::{trace, warn};

/// Parameter store with the same contract as a real element.
///
/// Writes through [`ParamElement::set`] notify watchers only when the stored
/// value changes. [`MemoryElement::publish`] plays the role of the element's
/// processing side: it may update read-only parameters and notifies even when
/// the value did not move, the way a meter reports every new estimate. A
/// parameter whose [`ParamId::enabled_by`] switch is off stays silent.
pub struct MemoryElement<P: ParamId> {
    factory: String,
    values: RefCell<HashMap<P, PropertyValue>>,
    missing: RefCell<HashSet<P>>,
    watchers: Watchers<P>,
}

impl<P: ParamId> MemoryElement<P> {
    /// Create an element with every parameter at its declared default.
    pub fn new(factory: impl Into<String>) -> Self {
        let values = P::ALL
            .iter()
            .map(|param| (*param, param.spec().default))
            .collect();
        Self {
            factory: factory.into(),
            values: RefCell::new(values),
            missing: RefCell::new(HashSet::new()),
            watchers: Watchers::new(),
        }
    }

    /// Drop a parameter from the element, as an older plugin build would.
    pub fn remove_param(&self, param: P) {
        self.missing.borrow_mut().insert(param);
    }

    /// Report a new value from the processing side and notify watchers.
    pub fn publish(&self, param: P, value: PropertyValue) {
        let Some(value) = param.spec().kind.coerce(&value) else {
            warn!(
                "{}: ignoring {:?} published to {}",
                self.factory,
                value,
                param.name()
            );
            return;
        };
        self.values.borrow_mut().insert(param, value);
        if let Some(switch) = param.enabled_by() {
            if self.get(switch) != PropertyValue::Bool(true) {
                trace!(
                    "{}: {} not posted, {} is off",
                    self.factory,
                    param.name(),
                    switch.name()
                );
                return;
            }
        }
        self.watchers.notify(param, &value);
    }

    pub fn is_watched(&self, param: P) -> bool {
        self.watchers.is_watched(param)
    }
}

impl<P: ParamId> ParamElement<P> for MemoryElement<P> {
    fn factory_name(&self) -> &str {
        &self.factory
    }

    fn has_param(&self, param: P) -> bool {
        !self.missing.borrow().contains(&param)
    }

    fn get(&self, param: P) -> PropertyValue {
        self.values
            .borrow()
            .get(&param)
            .copied()
            .unwrap_or_else(|| param.spec().default)
    }

    fn set(&self, param: P, value: PropertyValue) {
        let spec = param.spec();
        if !spec.writable {
            warn!(
                "{}: parameter {} is read-only",
                self.factory,
                param.name()
            );
            return;
        }
        let Some(value) = spec.kind.coerce(&value) else {
            warn!(
                "{}: {:?} does not fit parameter {}",
                self.factory,
                value,
                param.name()
            );
            return;
        };

        let previous = self.values.borrow_mut().insert(param, value);
        if previous == Some(value) {
            return;
        }
        trace!("{}: {} = {}", self.factory, param.name(), value);
        self.watchers.notify(param, &value);
    }

    fn watch(&self, param: P, handler: ParamHandler) -> WatchId {
        self.watchers.add(param, handler)
    }

    fn unwatch(&self, id: WatchId) {
        self.watchers.remove(id);
    }
}
