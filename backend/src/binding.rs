//! Bindings between configuration keys and element parameters.
//!
//! A [`BindingRule`] describes one key/parameter pair, the direction values
//! flow in and the transform applied each way. [`bind`] checks the rule once,
//! pushes the persisted value into the element and returns a [`Binding`] that
//! keeps both subscriptions alive until it is dropped.

use crate::element::{ParamElement, ParamId, WatchId};
use crate::settings::{Settings, SettingsHandlerId};
use crate::transform::{Domain, Transform};
use autolimit_types::{PropertyValue, ValueType};
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// Which way values flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Configuration to parameter
    Get,
    /// Parameter to configuration
    Set,
    Both,
}

impl Direction {
    fn writes_element(self) -> bool {
        matches!(self, Direction::Get | Direction::Both)
    }

    fn writes_settings(self) -> bool {
        matches!(self, Direction::Set | Direction::Both)
    }
}

/// Error type for binding creation.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Element {element} has no parameter {param}")]
    MissingParameter {
        element: String,
        param: &'static str,
    },

    #[error("Parameter {0} is read-only")]
    ReadOnly(&'static str),

    #[error("{transform:?} cannot map {from} ({from_type:?}) onto {to} ({to_type:?})")]
    Incompatible {
        from: String,
        to: String,
        from_type: ValueType,
        to_type: ValueType,
        transform: Transform,
    },
}

/// Declaration of one key/parameter binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindingRule<P: ParamId> {
    pub key: &'static str,
    pub param: P,
    pub direction: Direction,
    /// Configuration to parameter, identity when `None`
    pub forward: Option<Transform>,
    /// Parameter to configuration, identity when `None`
    pub backward: Option<Transform>,
}

impl<P: ParamId> BindingRule<P> {
    pub fn new(key: &'static str, param: P, direction: Direction) -> Self {
        Self {
            key,
            param,
            direction,
            forward: None,
            backward: None,
        }
    }

    pub fn forward(mut self, transform: Transform) -> Self {
        self.forward = Some(transform);
        self
    }

    pub fn backward(mut self, transform: Transform) -> Self {
        self.backward = Some(transform);
        self
    }
}

/// Live binding. Dropping it disconnects both directions.
pub struct Binding<P: ParamId> {
    rule: BindingRule<P>,
    settings: Weak<Settings>,
    element: Weak<dyn ParamElement<P>>,
    settings_handler: Option<SettingsHandlerId>,
    watch: Option<WatchId>,
}

impl<P: ParamId> Drop for Binding<P> {
    fn drop(&mut self) {
        if let (Some(id), Some(settings)) = (self.settings_handler.take(), self.settings.upgrade())
        {
            settings.disconnect(id);
        }
        if let (Some(id), Some(element)) = (self.watch.take(), self.element.upgrade()) {
            element.unwatch(id);
        }
        debug!("Unbound {} from {}", self.rule.key, self.rule.param.name());
    }
}

impl<P: ParamId> std::fmt::Debug for Binding<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding").field("rule", &self.rule).finish()
    }
}

fn check_transform(
    transform: Transform,
    from: (&str, ValueType),
    to: (&str, ValueType),
) -> Result<(), BindError> {
    match transform.output_type(from.1) {
        Some(ty) if ty.converts_to(to.1) => Ok(()),
        _ => Err(BindError::Incompatible {
            from: from.0.to_string(),
            to: to.0.to_string(),
            from_type: from.1,
            to_type: to.1,
            transform,
        }),
    }
}

/// Register a binding rule.
///
/// For rules writing the element, the current configuration value is pushed
/// into the parameter before this returns. A `Set`-only rule publishes the
/// element's current value into the configuration instead.
pub fn bind<P: ParamId>(
    settings: &Rc<Settings>,
    element: &Rc<dyn ParamElement<P>>,
    rule: BindingRule<P>,
) -> Result<Binding<P>, BindError> {
    let key_spec = *settings
        .spec(rule.key)
        .map_err(|_| BindError::UnknownKey(rule.key.to_string()))?;
    let param = rule.param;
    let param_spec = param.spec();

    if !element.has_param(param) {
        return Err(BindError::MissingParameter {
            element: element.factory_name().to_string(),
            param: param.name(),
        });
    }
    if rule.direction.writes_element() && !param_spec.writable {
        return Err(BindError::ReadOnly(param.name()));
    }

    let key_domain = key_spec.kind.domain();
    let param_domain = param_spec.kind.domain();
    let forward = rule.forward.unwrap_or(Transform::Identity);
    let backward = rule.backward.unwrap_or(Transform::Identity);

    if rule.direction.writes_element() {
        check_transform(
            forward,
            (rule.key, key_domain.ty),
            (param.name(), param_domain.ty),
        )?;
    }
    if rule.direction.writes_settings() {
        check_transform(
            backward,
            (param.name(), param_domain.ty),
            (rule.key, key_domain.ty),
        )?;
    }

    let mut binding = Binding {
        rule,
        settings: Rc::downgrade(settings),
        element: Rc::downgrade(element),
        settings_handler: None,
        watch: None,
    };

    if rule.direction.writes_element() {
        let value = forward.apply(&settings.get(rule.key).unwrap_or(key_spec.default), &param_domain);
        debug!("Bootstrapping {} = {} from {}", param.name(), value, rule.key);
        element.set(param, value);

        let weak_element = Rc::downgrade(element);
        let both = rule.direction == Direction::Both;
        binding.settings_handler = Some(settings.connect_changed(
            Some(rule.key),
            move |key: &str, value: &PropertyValue| {
                let Some(element) = weak_element.upgrade() else {
                    return;
                };
                let out = forward.apply(value, &param_domain);
                if both && param_spec.kind.coerce(&out) == Some(element.get(param)) {
                    return;
                }
                debug!("{} = {} -> {} = {}", key, value, param.name(), out);
                element.set(param, out);
            },
        ));
    }

    if rule.direction.writes_settings() {
        if rule.direction == Direction::Set {
            publish_back(settings, rule.key, &element.get(param), backward, &key_domain);
        }

        let weak_settings = Rc::downgrade(settings);
        let both = rule.direction == Direction::Both;
        let key = rule.key;
        binding.watch = Some(element.watch(
            param,
            Box::new(move |value: &PropertyValue| {
                let Some(settings) = weak_settings.upgrade() else {
                    return;
                };
                if both {
                    // Compare in the parameter's storage width, f32 for most
                    let current = settings.get(key).unwrap_or(key_spec.default);
                    let expected = param_spec.kind.coerce(&forward.apply(&current, &param_domain));
                    if expected.as_ref() == Some(value) {
                        return;
                    }
                }
                publish_back(&settings, key, value, backward, &key_domain);
            }),
        ));
    }

    Ok(binding)
}

fn publish_back(
    settings: &Settings,
    key: &str,
    value: &PropertyValue,
    backward: Transform,
    key_domain: &Domain,
) {
    let out = backward.apply(value, key_domain);
    debug!("{} <- {}", key, out);
    if let Err(e) = settings.set(key, out) {
        warn!("Failed to publish parameter value to {}: {}", key, e);
    }
}
