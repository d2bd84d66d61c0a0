//! Periodic sampling of the limiter meters.
//!
//! While metering is enabled, three timers run on the host event loop, one
//! per meter (input level, output level, attenuation). Each tick reads the
//! related read-only parameters and broadcasts a [`LimiterEvent`].

use crate::element::{LimiterParam, ParamElement};
use crate::events::EventBroadcaster;
use crate::settings::{keys, Settings};
use autolimit_types::{LimiterEvent, MeterKind, MeterSample};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// One periodic sampler.
#[derive(Debug)]
pub struct MeterTimer {
    kind: MeterKind,
    task: Option<JoinHandle<()>>,
}

impl MeterTimer {
    fn new(kind: MeterKind) -> Self {
        Self { kind, task: None }
    }

    pub fn kind(&self) -> MeterKind {
        self.kind
    }

    /// Whether the sampler task exists and has not ended.
    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn arm(&mut self, task: JoinHandle<()>) {
        if let Some(old) = self.task.replace(task) {
            old.abort();
        }
    }

    fn disarm(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

/// The three meter timers of a node, switched by the `post-messages` key.
pub struct MeteringSubscription {
    node: String,
    limiter: Weak<dyn ParamElement<LimiterParam>>,
    events: EventBroadcaster,
    period: Duration,
    timers: RefCell<[MeterTimer; 3]>,
}

impl MeteringSubscription {
    /// Create an idle subscription. Nothing runs until [`evaluate`] or
    /// [`set_enabled`] is called.
    ///
    /// [`evaluate`]: MeteringSubscription::evaluate
    /// [`set_enabled`]: MeteringSubscription::set_enabled
    pub fn new(
        node: impl Into<String>,
        limiter: &Rc<dyn ParamElement<LimiterParam>>,
        events: EventBroadcaster,
        period: Duration,
    ) -> Self {
        Self {
            node: node.into(),
            limiter: Rc::downgrade(limiter),
            events,
            period,
            timers: RefCell::new(MeterKind::ALL.map(MeterTimer::new)),
        }
    }

    /// Apply the current value of `post-messages`.
    pub fn evaluate(&self, settings: &Settings) {
        match settings.get_bool(keys::POST_MESSAGES) {
            Ok(enabled) => self.set_enabled(enabled),
            Err(e) => warn!("Cannot read {}: {}", keys::POST_MESSAGES, e),
        }
    }

    /// Start or stop the timers. Timers already in the requested state are
    /// left alone, so repeated calls never create duplicates.
    ///
    /// Starting must happen inside a `LocalSet`.
    pub fn set_enabled(&self, enabled: bool) {
        let mut timers = self.timers.borrow_mut();
        for timer in timers.iter_mut() {
            match (enabled, timer.is_armed()) {
                (true, false) => {
                    debug!("{}: starting {} meter", self.node, timer.kind);
                    timer.arm(tokio::task::spawn_local(run_meter(
                        timer.kind,
                        self.node.clone(),
                        self.limiter.clone(),
                        self.events.clone(),
                        self.period,
                    )));
                }
                (false, _) => {
                    if timer.disarm() {
                        debug!("{}: stopped {} meter", self.node, timer.kind);
                    }
                }
                (true, true) => {}
            }
        }
    }

    pub fn armed_count(&self) -> usize {
        self.timers.borrow().iter().filter(|t| t.is_armed()).count()
    }

    /// Stop every timer.
    pub fn stop(&self) {
        self.set_enabled(false);
    }
}

impl Drop for MeteringSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_meter(
    kind: MeterKind,
    node: String,
    limiter: Weak<dyn ParamElement<LimiterParam>>,
    events: EventBroadcaster,
    period: Duration,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let Some(limiter) = limiter.upgrade() else {
            debug!("{}: limiter gone, ending {} meter", node, kind);
            break;
        };
        events.broadcast(sample(kind, &node, limiter.as_ref()));
    }
}

fn sample(kind: MeterKind, node: &str, limiter: &dyn ParamElement<LimiterParam>) -> LimiterEvent {
    let read = |param: LimiterParam| limiter.get(param).as_f64().unwrap_or_default();
    let node = node.to_string();

    match kind {
        MeterKind::Input => LimiterEvent::InputLevel {
            node,
            sample: MeterSample::new(read(LimiterParam::MeterInL), read(LimiterParam::MeterInR)),
        },
        MeterKind::Output => LimiterEvent::OutputLevel {
            node,
            sample: MeterSample::new(read(LimiterParam::MeterOutL), read(LimiterParam::MeterOutR)),
        },
        MeterKind::Attenuation => LimiterEvent::Attenuation {
            node,
            value: read(LimiterParam::Attenuation),
        },
    }
}
