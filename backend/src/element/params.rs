//! Parameter sets of the Calf limiter and the peebur loudness meter.

use super::{ParamId, ParamKind, ParamSpec};
use autolimit_types::PropertyValue;

/// Linear gain bounds of the limiter's level controls (±36 dB).
const LEVEL_MIN: f32 = 0.015625;
const LEVEL_MAX: f32 = 64.0;

const METER: ParamKind = ParamKind::Float {
    min: 0.0,
    max: LEVEL_MAX,
};

/// Parameters of `calf-sourceforge-net-plugins-Limiter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterParam {
    LevelIn,
    LevelOut,
    Limit,
    /// Lookahead, in milliseconds
    Attack,
    /// Milliseconds
    Release,
    /// Automatic smooth compression
    Asc,
    AscCoeff,
    Oversampling,
    Bypass,
    MeterInL,
    MeterInR,
    MeterOutL,
    MeterOutR,
    Attenuation,
}

impl ParamId for LimiterParam {
    const ALL: &'static [Self] = &[
        LimiterParam::LevelIn,
        LimiterParam::LevelOut,
        LimiterParam::Limit,
        LimiterParam::Attack,
        LimiterParam::Release,
        LimiterParam::Asc,
        LimiterParam::AscCoeff,
        LimiterParam::Oversampling,
        LimiterParam::Bypass,
        LimiterParam::MeterInL,
        LimiterParam::MeterInR,
        LimiterParam::MeterOutL,
        LimiterParam::MeterOutR,
        LimiterParam::Attenuation,
    ];

    fn name(self) -> &'static str {
        match self {
            LimiterParam::LevelIn => "level-in",
            LimiterParam::LevelOut => "level-out",
            LimiterParam::Limit => "limit",
            LimiterParam::Attack => "attack",
            LimiterParam::Release => "release",
            LimiterParam::Asc => "asc",
            LimiterParam::AscCoeff => "asc-coeff",
            LimiterParam::Oversampling => "oversampling",
            LimiterParam::Bypass => "bypass",
            LimiterParam::MeterInL => "meter-inL",
            LimiterParam::MeterInR => "meter-inR",
            LimiterParam::MeterOutL => "meter-outL",
            LimiterParam::MeterOutR => "meter-outR",
            LimiterParam::Attenuation => "att",
        }
    }

    fn spec(self) -> ParamSpec {
        use PropertyValue::{Bool, Float};
        match self {
            LimiterParam::LevelIn | LimiterParam::LevelOut => ParamSpec::new(
                ParamKind::Float {
                    min: LEVEL_MIN,
                    max: LEVEL_MAX,
                },
                Float(1.0),
            ),
            LimiterParam::Limit => ParamSpec::new(
                ParamKind::Float {
                    min: 0.0625,
                    max: 1.0,
                },
                Float(1.0),
            ),
            LimiterParam::Attack => {
                ParamSpec::new(ParamKind::Float { min: 0.1, max: 10.0 }, Float(5.0))
            }
            LimiterParam::Release => ParamSpec::new(
                ParamKind::Float {
                    min: 1.0,
                    max: 1000.0,
                },
                Float(50.0),
            ),
            LimiterParam::Asc | LimiterParam::Bypass => {
                ParamSpec::new(ParamKind::Bool, Bool(false))
            }
            LimiterParam::AscCoeff => {
                ParamSpec::new(ParamKind::Float { min: 0.25, max: 1.0 }, Float(0.5))
            }
            LimiterParam::Oversampling => {
                ParamSpec::new(ParamKind::Float { min: 1.0, max: 4.0 }, Float(1.0))
            }
            LimiterParam::MeterInL
            | LimiterParam::MeterInR
            | LimiterParam::MeterOutL
            | LimiterParam::MeterOutR => ParamSpec::read_only(METER, Float(0.0)),
            LimiterParam::Attenuation => {
                ParamSpec::read_only(ParamKind::Float { min: 0.0, max: 1.0 }, Float(1.0))
            }
        }
    }
}

/// Parameters of the `peebur` loudness meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoudnessParam {
    /// Enables loudness notifications
    PostMessages,
    /// Measurement window, in nanoseconds
    Interval,
    /// Latest loudness estimate (LUFS)
    Loudness,
}

impl ParamId for LoudnessParam {
    const ALL: &'static [Self] = &[
        LoudnessParam::PostMessages,
        LoudnessParam::Interval,
        LoudnessParam::Loudness,
    ];

    fn name(self) -> &'static str {
        match self {
            LoudnessParam::PostMessages => "post-messages",
            LoudnessParam::Interval => "interval",
            LoudnessParam::Loudness => "loudness",
        }
    }

    fn spec(self) -> ParamSpec {
        match self {
            LoudnessParam::PostMessages => {
                ParamSpec::new(ParamKind::Bool, PropertyValue::Bool(false))
            }
            LoudnessParam::Interval => ParamSpec::new(
                ParamKind::UInt64 {
                    min: 1_000_000,
                    max: 60_000_000_000,
                },
                PropertyValue::UInt(1_000_000_000),
            ),
            LoudnessParam::Loudness => ParamSpec::read_only(
                ParamKind::Double {
                    min: -200.0,
                    max: 20.0,
                },
                PropertyValue::Float(-70.0),
            ),
        }
    }

    fn enabled_by(self) -> Option<Self> {
        match self {
            LoudnessParam::Loudness => Some(LoudnessParam::PostMessages),
            _ => None,
        }
    }
}
