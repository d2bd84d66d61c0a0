//! Automatic input gain tracking a target loudness.
//!
//! Every loudness estimate reported by the measurement element moves the
//! limiter's input gain one dB toward the target, within ±36 dB. There is
//! no state besides the gain parameter itself, which is read fresh each time.

use crate::element::{LimiterParam, ParamElement};
use crate::settings::{keys, Settings};
use crate::transform::{db_to_linear, linear_to_db};
use autolimit_types::PropertyValue;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

pub const MIN_GAIN_DB: f64 = -36.0;
pub const MAX_GAIN_DB: f64 = 36.0;
pub const GAIN_STEP_DB: f64 = 1.0;

/// Slack on the bounds check. The gain is stored as f32 linear amplitude,
/// so a value written as 35 dB may read back as 35.0000002 dB.
const BOUND_EPSILON: f64 = 1e-4;

/// Next gain for one loudness estimate.
///
/// Louder than the target steps down, quieter steps up, equal stays put. A
/// step that would leave `[MIN_GAIN_DB, MAX_GAIN_DB]` is not taken.
pub fn step_gain(gain_db: f64, peak: f64, target: f64) -> f64 {
    if peak > target {
        let next = gain_db - GAIN_STEP_DB;
        if next >= MIN_GAIN_DB - BOUND_EPSILON {
            return next;
        }
    } else if peak < target {
        let next = gain_db + GAIN_STEP_DB;
        if next <= MAX_GAIN_DB + BOUND_EPSILON {
            return next;
        }
    }
    gain_db
}

/// How `autovolume-tolerance` takes part in the decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TolerancePolicy {
    /// Step on every estimate that differs from the target
    #[default]
    Ignore,
    /// Hold the gain while the estimate is within tolerance of the target
    Respect,
}

impl From<bool> for TolerancePolicy {
    fn from(respect: bool) -> Self {
        if respect {
            TolerancePolicy::Respect
        } else {
            TolerancePolicy::Ignore
        }
    }
}

impl TolerancePolicy {
    pub fn step(self, gain_db: f64, peak: f64, target: f64, tolerance: f64) -> f64 {
        match self {
            TolerancePolicy::Respect if (peak - target).abs() <= tolerance => gain_db,
            _ => step_gain(gain_db, peak, target),
        }
    }
}

/// Feedback loop from the loudness estimate to the limiter's `level-in`.
pub struct AutoVolumeController {
    limiter: Weak<dyn ParamElement<LimiterParam>>,
    settings: Rc<Settings>,
    policy: TolerancePolicy,
}

impl AutoVolumeController {
    pub fn new(
        limiter: &Rc<dyn ParamElement<LimiterParam>>,
        settings: Rc<Settings>,
        policy: TolerancePolicy,
    ) -> Self {
        Self {
            limiter: Rc::downgrade(limiter),
            settings,
            policy,
        }
    }

    /// Apply one loudness estimate (LUFS). Returns the gain written, in dB,
    /// or `None` when the limiter is gone or the target cannot be read.
    pub fn on_loudness(&self, peak: f64) -> Option<f64> {
        let limiter = self.limiter.upgrade()?;

        let target = match self.settings.get_int(keys::AUTOVOLUME_TARGET) {
            Ok(target) => target as f64,
            Err(e) => {
                warn!("Cannot read {}: {}", keys::AUTOVOLUME_TARGET, e);
                return None;
            }
        };
        let tolerance = match self.policy {
            TolerancePolicy::Ignore => 0.0,
            TolerancePolicy::Respect => self
                .settings
                .get_int(keys::AUTOVOLUME_TOLERANCE)
                .map(|t| t as f64)
                .unwrap_or_default(),
        };

        let gain_db = linear_to_db(limiter.get(LimiterParam::LevelIn).as_f64()?);
        let next = self.policy.step(gain_db, peak, target, tolerance);

        if next != gain_db {
            debug!(
                "Loudness {:.1} LUFS, target {}: gain {:.1} -> {:.1} dB",
                peak, target, gain_db, next
            );
        } else {
            trace!("Loudness {:.1} LUFS, gain held at {:.1} dB", peak, gain_db);
        }
        limiter.set(LimiterParam::LevelIn, PropertyValue::Float(db_to_linear(next)));

        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::MemoryElement;
    use crate::settings::limiter_schema;
    use proptest::prelude::*;

    fn assert_db(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {} dB, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_step_direction() {
        assert_eq!(step_gain(0.0, -18.0, -23.0), -1.0);
        assert_eq!(step_gain(0.0, -30.0, -23.0), 1.0);
        assert_eq!(step_gain(5.0, -23.0, -23.0), 5.0);
    }

    #[test]
    fn test_step_saturates_at_bounds() {
        assert_eq!(step_gain(36.0, -30.0, -23.0), 36.0);
        assert_eq!(step_gain(-36.0, -10.0, -23.0), -36.0);
        assert_eq!(step_gain(35.0, -30.0, -23.0), 36.0);
        assert_eq!(step_gain(-35.0, -10.0, -23.0), -36.0);
    }

    #[test]
    fn test_step_over_whole_grid() {
        for gain in -36..=36 {
            let gain = gain as f64;
            let down = step_gain(gain, 0.0, -23.0);
            let up = step_gain(gain, -60.0, -23.0);
            assert_eq!(down, if gain > MIN_GAIN_DB { gain - 1.0 } else { gain });
            assert_eq!(up, if gain < MAX_GAIN_DB { gain + 1.0 } else { gain });
        }
    }

    #[test]
    fn test_step_tolerates_f32_readback() {
        assert_db(step_gain(35.000_000_2, -30.0, -23.0), 36.0);
        assert_db(step_gain(-35.000_000_2, -10.0, -23.0), -36.0);
    }

    #[test]
    fn test_tolerance_policy() {
        assert_eq!(TolerancePolicy::Ignore.step(0.0, -22.0, -23.0, 2.0), -1.0);
        assert_eq!(TolerancePolicy::Respect.step(0.0, -22.0, -23.0, 2.0), 0.0);
        assert_eq!(TolerancePolicy::Respect.step(0.0, -20.0, -23.0, 2.0), -1.0);
        assert_eq!(TolerancePolicy::from(true), TolerancePolicy::Respect);
        assert_eq!(TolerancePolicy::default(), TolerancePolicy::Ignore);
    }

    fn controller(
        gain_db: f64,
        target: i64,
        policy: TolerancePolicy,
    ) -> (AutoVolumeController, Rc<MemoryElement<LimiterParam>>) {
        let settings = Rc::new(Settings::new(limiter_schema()));
        settings.set(keys::AUTOVOLUME_TARGET, target).unwrap();
        let limiter = Rc::new(MemoryElement::<LimiterParam>::new("limiter"));
        limiter.set(LimiterParam::LevelIn, PropertyValue::Float(db_to_linear(gain_db)));

        let dyn_limiter: Rc<dyn ParamElement<LimiterParam>> = limiter.clone();
        (
            AutoVolumeController::new(&dyn_limiter, settings, policy),
            limiter,
        )
    }

    #[test]
    fn test_controller_follows_loudness() {
        let (controller, limiter) = controller(0.0, -23, TolerancePolicy::Ignore);

        let gains: Vec<f64> = [-18.0, -18.0, -30.0]
            .into_iter()
            .map(|peak| controller.on_loudness(peak).unwrap())
            .collect();

        assert_db(gains[0], -1.0);
        assert_db(gains[1], -2.0);
        assert_db(gains[2], -1.0);
        let level = limiter.get(LimiterParam::LevelIn).as_f64().unwrap();
        assert_db(linear_to_db(level), -1.0);
    }

    #[test]
    fn test_controller_saturates() {
        let (controller, limiter) = controller(36.0, -23, TolerancePolicy::Ignore);
        assert_db(controller.on_loudness(-30.0).unwrap(), 36.0);
        let level = limiter.get(LimiterParam::LevelIn).as_f64().unwrap();
        assert_db(linear_to_db(level), 36.0);
    }

    #[test]
    fn test_controller_reads_gain_fresh() {
        let (controller, limiter) = controller(0.0, -23, TolerancePolicy::Ignore);
        controller.on_loudness(-18.0);
        limiter.set(LimiterParam::LevelIn, PropertyValue::Float(db_to_linear(10.0)));
        assert_db(controller.on_loudness(-18.0).unwrap(), 9.0);
    }

    #[test]
    fn test_controller_respects_tolerance_when_asked() {
        let (controller, _limiter) = controller(0.0, -23, TolerancePolicy::Respect);
        assert_db(controller.on_loudness(-22.0).unwrap(), 0.0);
        assert_db(controller.on_loudness(-18.0).unwrap(), -1.0);
    }

    #[test]
    fn test_controller_without_limiter() {
        let (controller, limiter) = controller(0.0, -23, TolerancePolicy::Ignore);
        drop(limiter);
        assert_eq!(controller.on_loudness(-18.0), None);
    }

    proptest! {
        #[test]
        fn prop_step_is_bounded_and_moves_toward_target(
            gain in -36i32..=36,
            peak in -70.0f64..10.0,
            target in -60i32..=0,
        ) {
            let gain = gain as f64;
            let target = target as f64;
            let next = step_gain(gain, peak, target);

            prop_assert!((MIN_GAIN_DB..=MAX_GAIN_DB).contains(&next));
            let delta = next - gain;
            prop_assert!(delta == 0.0 || delta.abs() == GAIN_STEP_DB);
            if delta != 0.0 {
                prop_assert_eq!(delta.signum(), (target - peak).signum());
            }
            if peak == target {
                prop_assert_eq!(next, gain);
            }
        }
    }
}
