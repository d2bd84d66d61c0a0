//! The limiter node: element chain, bindings, metering and gain control.

use crate::autovolume::{AutoVolumeController, TolerancePolicy};
use crate::binding::{bind, BindError, Binding, BindingRule, Direction};
use crate::element::{LimiterParam, LoudnessParam, ParamElement, WatchId};
use crate::events::EventBroadcaster;
use crate::host::{ElementNames, Host, HostError};
use crate::metering::MeteringSubscription;
use crate::settings::{keys, Settings, SettingsHandlerId};
use crate::transform::Transform;
use autolimit_types::{PropertyValue, DEFAULT_METER_INTERVAL_MS};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Error type for node construction.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Binding error: {0}")]
    Bind(#[from] BindError),
}

/// Construction options of a [`LimiterNode`].
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub elements: ElementNames,
    pub meter_interval: Duration,
    pub tolerance: TolerancePolicy,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            elements: ElementNames::default(),
            meter_interval: Duration::from_millis(DEFAULT_METER_INTERVAL_MS),
            tolerance: TolerancePolicy::default(),
        }
    }
}

/// Bindings between the limiter and the configuration.
pub fn limiter_rules() -> Vec<BindingRule<LimiterParam>> {
    use Direction::{Both, Get};

    vec![
        BindingRule::new(keys::INPUT_GAIN, LimiterParam::LevelIn, Both)
            .forward(Transform::DbToGain)
            .backward(Transform::GainToDb),
        BindingRule::new(keys::LIMIT, LimiterParam::Limit, Get).forward(Transform::DbToGain),
        // Cancels the makeup gain the limiter applies on its own
        BindingRule::new(keys::LIMIT, LimiterParam::LevelOut, Get).forward(Transform::DbToGain),
        BindingRule::new(keys::LOOKAHEAD, LimiterParam::Attack, Get)
            .forward(Transform::DoubleToFloat),
        BindingRule::new(keys::RELEASE, LimiterParam::Release, Get)
            .forward(Transform::DoubleToFloat),
        BindingRule::new(keys::ASC, LimiterParam::Asc, Both),
        BindingRule::new(keys::ASC_LEVEL, LimiterParam::AscCoeff, Get)
            .forward(Transform::DoubleToFloat),
        BindingRule::new(keys::OVERSAMPLING, LimiterParam::Oversampling, Both)
            .forward(Transform::IntToFloat),
    ]
}

/// Bindings between the loudness meter and the configuration.
pub fn loudness_rules() -> Vec<BindingRule<LoudnessParam>> {
    vec![
        BindingRule::new(
            keys::AUTOVOLUME_STATE,
            LoudnessParam::PostMessages,
            Direction::Both,
        ),
        BindingRule::new(keys::AUTOVOLUME_WINDOW, LoudnessParam::Interval, Direction::Get)
            .forward(Transform::MsToNs),
    ]
}

/// Everything that exists only when the chain could be built.
///
/// Dropping it tears down in a fixed order: configuration subscriptions,
/// meter timers, loudness watch, bindings, then the elements.
struct Installed<T> {
    settings: Rc<Settings>,
    settings_handlers: Vec<SettingsHandlerId>,
    metering: Rc<MeteringSubscription>,
    loudness_watch: Option<WatchId>,
    limiter_bindings: Vec<Binding<LimiterParam>>,
    loudness_bindings: Vec<Binding<LoudnessParam>>,
    controller: Rc<AutoVolumeController>,
    limiter: Rc<dyn ParamElement<LimiterParam>>,
    loudness: Rc<dyn ParamElement<LoudnessParam>>,
    ports: T,
}

impl<T> Drop for Installed<T> {
    fn drop(&mut self) {
        for id in self.settings_handlers.drain(..) {
            self.settings.disconnect(id);
        }
        self.metering.stop();
        if let Some(id) = self.loudness_watch.take() {
            self.loudness.unwatch(id);
        }
        self.limiter_bindings.clear();
        self.loudness_bindings.clear();
        // The elements and ports go with the remaining fields
    }
}

enum NodeState<T> {
    Installed(Box<Installed<T>>),
    Uninstalled { reason: String },
}

/// Limiter with automatic input gain, metering and persisted parameters.
///
/// When the limiter plugin is missing the node is still created, in an
/// uninstalled state with no bindings, timers or gain control.
pub struct LimiterNode<T> {
    name: String,
    state: NodeState<T>,
}

impl<T> LimiterNode<T> {
    /// Assemble the chain on `host` and wire it to `settings`.
    ///
    /// Must run inside a `LocalSet` on the host event loop.
    pub fn new<H>(
        name: &str,
        host: &H,
        settings: &Rc<Settings>,
        events: EventBroadcaster,
        options: &NodeOptions,
    ) -> Result<Self, NodeError>
    where
        H: Host<Ports = T>,
    {
        let chain = match host.assemble(name, &options.elements) {
            Ok(chain) => chain,
            Err(HostError::Unavailable(factory)) => {
                warn!("{}: element {} is not available, node left uninstalled", name, factory);
                return Ok(Self {
                    name: name.to_string(),
                    state: NodeState::Uninstalled {
                        reason: format!("{} is not available", factory),
                    },
                });
            }
            Err(e) => return Err(e.into()),
        };

        chain.limiter.set(LimiterParam::Bypass, PropertyValue::Bool(false));

        let limiter_bindings = limiter_rules()
            .into_iter()
            .map(|rule| bind(settings, &chain.limiter, rule))
            .collect::<Result<Vec<_>, _>>()?;
        let loudness_bindings = loudness_rules()
            .into_iter()
            .map(|rule| bind(settings, &chain.loudness, rule))
            .collect::<Result<Vec<_>, _>>()?;

        let metering = Rc::new(MeteringSubscription::new(
            name,
            &chain.limiter,
            events,
            options.meter_interval,
        ));
        let weak_metering = Rc::downgrade(&metering);
        let post_messages = settings.connect_changed(
            Some(keys::POST_MESSAGES),
            move |_: &str, value: &PropertyValue| {
                if let (Some(metering), Some(enabled)) = (weak_metering.upgrade(), value.as_bool())
                {
                    metering.set_enabled(enabled);
                }
            },
        );

        let controller = Rc::new(AutoVolumeController::new(
            &chain.limiter,
            settings.clone(),
            options.tolerance,
        ));
        let weak_controller = Rc::downgrade(&controller);
        let loudness_watch = chain.loudness.watch(
            LoudnessParam::Loudness,
            Box::new(move |value: &PropertyValue| {
                if let (Some(controller), Some(peak)) = (weak_controller.upgrade(), value.as_f64()) {
                    controller.on_loudness(peak);
                }
            }),
        );

        metering.evaluate(settings);

        info!(
            "{}: installed with {} bindings, metering every {:?}",
            name,
            limiter_bindings.len() + loudness_bindings.len(),
            options.meter_interval
        );

        Ok(Self {
            name: name.to_string(),
            state: NodeState::Installed(Box::new(Installed {
                settings: settings.clone(),
                settings_handlers: vec![post_messages],
                metering,
                loudness_watch: Some(loudness_watch),
                limiter_bindings,
                loudness_bindings,
                controller,
                limiter: chain.limiter,
                loudness: chain.loudness,
                ports: chain.ports,
            })),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_installed(&self) -> bool {
        matches!(self.state, NodeState::Installed(_))
    }

    /// Why the node is uninstalled, if it is.
    pub fn uninstalled_reason(&self) -> Option<&str> {
        match &self.state {
            NodeState::Uninstalled { reason } => Some(reason.as_str()),
            NodeState::Installed(_) => None,
        }
    }

    fn installed(&self) -> Option<&Installed<T>> {
        match &self.state {
            NodeState::Installed(installed) => Some(installed.as_ref()),
            NodeState::Uninstalled { .. } => None,
        }
    }

    /// Input and output of the node, as exposed by the host.
    pub fn ports(&self) -> Option<&T> {
        self.installed().map(|i| &i.ports)
    }

    pub fn limiter(&self) -> Option<&Rc<dyn ParamElement<LimiterParam>>> {
        self.installed().map(|i| &i.limiter)
    }

    pub fn loudness(&self) -> Option<&Rc<dyn ParamElement<LoudnessParam>>> {
        self.installed().map(|i| &i.loudness)
    }

    pub fn binding_count(&self) -> usize {
        self.installed()
            .map(|i| i.limiter_bindings.len() + i.loudness_bindings.len())
            .unwrap_or(0)
    }

    /// Number of meter timers currently running.
    pub fn armed_meters(&self) -> usize {
        self.installed()
            .map(|i| i.metering.armed_count())
            .unwrap_or(0)
    }

    /// Feed one loudness estimate to the gain controller directly.
    pub fn apply_loudness(&self, peak: f64) -> Option<f64> {
        self.installed()?.controller.on_loudness(peak)
    }
}

impl<T> Drop for LimiterNode<T> {
    fn drop(&mut self) {
        debug!("{}: tearing down", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::settings::limiter_schema;

    #[test]
    fn test_rules_cover_every_bound_key() {
        let keys: Vec<&str> = limiter_rules()
            .iter()
            .map(|r| r.key)
            .chain(loudness_rules().iter().map(|r| r.key))
            .collect();
        for key in [
            keys::INPUT_GAIN,
            keys::LIMIT,
            keys::LOOKAHEAD,
            keys::RELEASE,
            keys::ASC,
            keys::ASC_LEVEL,
            keys::OVERSAMPLING,
            keys::AUTOVOLUME_STATE,
            keys::AUTOVOLUME_WINDOW,
        ] {
            assert!(keys.contains(&key), "{} is not bound", key);
        }
    }

    #[tokio::test]
    async fn test_construction_forces_processing() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let host = MemoryHost::new();
                let settings = Rc::new(Settings::new(limiter_schema()));
                let node = LimiterNode::new(
                    "limiter",
                    &host,
                    &settings,
                    EventBroadcaster::default(),
                    &NodeOptions::default(),
                )
                .unwrap();

                assert!(node.is_installed());
                assert_eq!(node.binding_count(), 10);
                let limiter = host.limiter().unwrap();
                assert_eq!(limiter.get(LimiterParam::Bypass), PropertyValue::Bool(false));
            })
            .await;
    }

    #[test]
    fn test_missing_converter_is_also_uninstalled() {
        let host = MemoryHost::new().without("audioconvert");
        let settings = Rc::new(Settings::new(limiter_schema()));
        let node = LimiterNode::new(
            "limiter",
            &host,
            &settings,
            EventBroadcaster::default(),
            &NodeOptions::default(),
        )
        .unwrap();

        assert!(!node.is_installed());
        assert_eq!(node.uninstalled_reason(), Some("audioconvert is not available"));
        assert_eq!(settings.subscription_count(), 0);
    }

    #[test]
    fn test_missing_parameter_is_fatal() {
        struct OldPluginHost(MemoryHost);

        impl Host for OldPluginHost {
            type Ports = crate::host::MemoryPorts;

            fn assemble(
                &self,
                name: &str,
                elements: &ElementNames,
            ) -> Result<crate::host::Chain<Self::Ports>, HostError> {
                let chain = self.0.assemble(name, elements)?;
                if let Some(limiter) = self.0.limiter() {
                    limiter.remove_param(LimiterParam::AscCoeff);
                }
                Ok(chain)
            }
        }

        let host = OldPluginHost(MemoryHost::new());
        let settings = Rc::new(Settings::new(limiter_schema()));
        let result = LimiterNode::new(
            "limiter",
            &host,
            &settings,
            EventBroadcaster::default(),
            &NodeOptions::default(),
        );
        assert!(matches!(
            result,
            Err(NodeError::Bind(BindError::MissingParameter { .. }))
        ));
        assert_eq!(settings.subscription_count(), 0);
    }
}
