//! Parameter access on a live GStreamer element.

use super::watch::Watchers;
use super::{ParamElement, ParamHandler, ParamId, WatchId};
use autolimit_types::PropertyValue;
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Wraps a `gst::Element` behind the typed parameter interface.
///
/// GStreamer emits `notify::<property>` from whatever thread changed the
/// property, usually a streaming thread. Those notifications are forwarded
/// over a channel and dispatched to watchers on the host event loop.
pub struct GstParamElement<P: ParamId> {
    element: gst::Element,
    factory: String,
    watchers: Rc<Watchers<P>>,
    notify_tx: mpsc::UnboundedSender<P>,
    signal_handlers: RefCell<HashMap<P, glib::SignalHandlerId>>,
    pump: JoinHandle<()>,
}

impl<P: ParamId> GstParamElement<P> {
    /// Wrap an element. Must be called on the host event loop (inside a `LocalSet`).
    ///
    /// The factory name is passed in rather than read back with `factory()`,
    /// which is unreliable for LV2-wrapped elements.
    pub fn new(element: gst::Element, factory: &str) -> Self {
        let watchers = Rc::new(Watchers::new());
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<P>();

        let pump_element = element.clone();
        let pump_watchers = watchers.clone();
        let pump = tokio::task::spawn_local(async move {
            while let Some(param) = notify_rx.recv().await {
                let value = read_param(&pump_element, param);
                pump_watchers.notify(param, &value);
            }
        });

        Self {
            element,
            factory: factory.to_string(),
            watchers,
            notify_tx,
            signal_handlers: RefCell::new(HashMap::new()),
            pump,
        }
    }

    pub fn element(&self) -> &gst::Element {
        &self.element
    }
}

impl<P: ParamId> ParamElement<P> for GstParamElement<P> {
    fn factory_name(&self) -> &str {
        &self.factory
    }

    fn has_param(&self, param: P) -> bool {
        self.element.find_property(param.name()).is_some()
    }

    fn get(&self, param: P) -> PropertyValue {
        read_param(&self.element, param)
    }

    fn set(&self, param: P, value: PropertyValue) {
        let spec = param.spec();
        if !spec.writable {
            warn!("{}: parameter {} is read-only", self.factory, param.name());
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
        if read_param(&self.element, param) == value {
            return;
        }
        write_param(&self.element, param.name(), value);
    }

    fn watch(&self, param: P, handler: ParamHandler) -> WatchId {
        let id = self.watchers.add(param, handler);

        let mut signal_handlers = self.signal_handlers.borrow_mut();
        if !signal_handlers.contains_key(&param) {
            debug!("{}: connecting notify::{}", self.factory, param.name());
            let tx = self.notify_tx.clone();
            let signal = self
                .element
                .connect_notify(Some(param.name()), move |_element, _pspec| {
                    // The receiver only goes away with the wrapper itself
                    let _ = tx.send(param);
                });
            signal_handlers.insert(param, signal);
        }
        id
    }

    fn unwatch(&self, id: WatchId) {
        let Some(param) = self.watchers.remove(id) else {
            return;
        };
        if !self.watchers.is_watched(param) {
            if let Some(signal) = self.signal_handlers.borrow_mut().remove(&param) {
                debug!("{}: disconnecting notify::{}", self.factory, param.name());
                self.element.disconnect(signal);
            }
        }
    }
}

impl<P: ParamId> Drop for GstParamElement<P> {
    fn drop(&mut self) {
        for (_, signal) in self.signal_handlers.borrow_mut().drain() {
            self.element.disconnect(signal);
        }
        self.pump.abort();
    }
}

/// Read a property and convert it to the parameter's declared kind.
fn read_param<P: ParamId>(element: &gst::Element, param: P) -> PropertyValue {
    let spec = param.spec();
    if element.find_property(param.name()).is_none() {
        return spec.default;
    }
    let raw = element.property_value(param.name());
    value_from_glib(&raw)
        .and_then(|v| spec.kind.coerce(&v))
        .unwrap_or(spec.default)
}

fn value_from_glib(value: &glib::Value) -> Option<PropertyValue> {
    if let Ok(v) = value.get::<f32>() {
        return Some(PropertyValue::Float(v as f64));
    }
    if let Ok(v) = value.get::<f64>() {
        return Some(PropertyValue::Float(v));
    }
    if let Ok(v) = value.get::<bool>() {
        return Some(PropertyValue::Bool(v));
    }
    if let Ok(v) = value.get::<i32>() {
        return Some(PropertyValue::Int(v as i64));
    }
    if let Ok(v) = value.get::<i64>() {
        return Some(PropertyValue::Int(v));
    }
    if let Ok(v) = value.get::<u32>() {
        return Some(PropertyValue::UInt(v as u64));
    }
    if let Ok(v) = value.get::<u64>() {
        return Some(PropertyValue::UInt(v));
    }
    None
}

/// Set a property using the GLib type the element declares for it.
///
/// LV2-wrapped plugins expose control ports as `gfloat`, integer ports as
/// `gint` and toggles as `gboolean`, so the declared type wins over the
/// variant of the value.
fn write_param(element: &gst::Element, name: &str, value: PropertyValue) {
    let Some(pspec) = element.find_property(name) else {
        warn!("Property {} not found on {}", name, element.name());
        return;
    };
    let type_name = pspec.value_type().name();

    match (type_name, value) {
        ("gboolean", PropertyValue::Bool(b)) => element.set_property(name, b),
        ("gfloat", v) => {
            if let Some(f) = v.as_f64() {
                element.set_property(name, f as f32);
            }
        }
        ("gdouble", v) => {
            if let Some(f) = v.as_f64() {
                element.set_property(name, f);
            }
        }
        ("gint", v) => {
            if let Some(i) = v.as_i64() {
                element.set_property(name, i.clamp(i32::MIN as i64, i32::MAX as i64) as i32);
            }
        }
        ("gint64", v) => {
            if let Some(i) = v.as_i64() {
                element.set_property(name, i);
            }
        }
        ("guint", v) => {
            if let Some(f) = v.as_f64() {
                element.set_property(name, f.round().clamp(0.0, u32::MAX as f64) as u32);
            }
        }
        ("guint64", v) => {
            if let Some(f) = v.as_f64() {
                element.set_property(name, f.round().max(0.0) as u64);
            }
        }
        (_, v) => {
            // Enums and anything else: let GLib parse the textual form
            element.set_property_from_str(name, &v.to_string());
        }
    }
}
