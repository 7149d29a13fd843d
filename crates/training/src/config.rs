//! Session configuration submitted by supervisors.

use serde::{Deserialize, Serialize};

use crate::{Difficulty, TrainingMode};

/// Target size before the difficulty is applied.
pub const DEFAULT_TARGET_SIZE: u16 = 2;
/// Brightness a node reports before it is told otherwise.
pub const DEFAULT_BRIGHTNESS: u8 = 128;

/// Target arrangement carried in [`ModeConfig::target_pattern`].
pub const PATTERN_RANDOM: u8 = 0;
pub const PATTERN_SEQUENCE: u8 = 1;
pub const PATTERN_WAVE: u8 = 2;

/// Movement speed of moving-target profiles.
const MOVING_SPEED: u8 = 5;
/// Distraction level of a stress profile at medium difficulty.
const BASE_DISTRACTION: u8 = 10;

/// Mode-specific tuning. Stored with the session, not sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModeConfig {
    pub movement_speed: u8,
    pub distraction_level: u8,
    pub team_mode: bool,
    pub target_pattern: u8,
}

/// Parameters of one timed exercise.
///
/// `mode` and `difficulty` are required when deserializing. Every other field
/// may be omitted and is then taken from [`TrainingConfig::defaults_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TrainingConfigFields")]
pub struct TrainingConfig {
    pub mode: TrainingMode,
    pub difficulty: Difficulty,
    /// Session length in seconds.
    pub duration: u16,
    pub target_count: u16,
    /// Time a target stays up, in milliseconds.
    pub react_time: u16,
    /// Target size in LEDs (1-64).
    pub target_size: u16,
    pub sound_enabled: bool,
    pub stressors_enabled: bool,
    pub brightness: u8,
    pub mode_config: ModeConfig,
}

/// Wire shape of a [`TrainingConfig`] with the optional fields left open.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainingConfigFields {
    mode: TrainingMode,
    difficulty: Difficulty,
    duration: Option<u16>,
    target_count: Option<u16>,
    react_time: Option<u16>,
    target_size: Option<u16>,
    #[serde(alias = "sound")]
    sound_enabled: Option<bool>,
    #[serde(alias = "stressors")]
    stressors_enabled: Option<bool>,
    brightness: Option<u8>,
    mode_config: Option<ModeConfig>,
}

impl From<TrainingConfigFields> for TrainingConfig {
    fn from(fields: TrainingConfigFields) -> Self {
        let defaults = Self::defaults_for(fields.mode, fields.difficulty);
        Self {
            mode: fields.mode,
            difficulty: fields.difficulty,
            duration: fields.duration.unwrap_or(defaults.duration),
            target_count: fields.target_count.unwrap_or(defaults.target_count),
            react_time: fields.react_time.unwrap_or(defaults.react_time),
            target_size: fields.target_size.unwrap_or(defaults.target_size),
            sound_enabled: fields.sound_enabled.unwrap_or(defaults.sound_enabled),
            stressors_enabled: fields.stressors_enabled.unwrap_or(defaults.stressors_enabled),
            brightness: fields.brightness.unwrap_or(defaults.brightness),
            mode_config: fields.mode_config.unwrap_or(defaults.mode_config),
        }
    }
}

/// Base values shared by a family of modes, at medium difficulty.
struct Profile {
    duration: u16,
    target_count: u16,
    react_time: u16,
    stressors: bool,
    /// Percent of full brightness.
    brightness_pct: u16,
    target_pattern: u8,
    moving: bool,
}

const BASIC: Profile = Profile {
    duration: 300,
    target_count: 10,
    react_time: 1000,
    stressors: false,
    brightness_pct: 75,
    target_pattern: PATTERN_RANDOM,
    moving: false,
};

const REACTION: Profile = Profile {
    duration: 180,
    target_count: 20,
    react_time: 500,
    stressors: false,
    brightness_pct: 100,
    target_pattern: PATTERN_RANDOM,
    moving: false,
};

const PRECISION: Profile = Profile {
    duration: 420,
    target_count: 15,
    react_time: 2000,
    stressors: false,
    brightness_pct: 50,
    target_pattern: PATTERN_SEQUENCE,
    moving: false,
};

const STRESS: Profile = Profile {
    duration: 240,
    target_count: 30,
    react_time: 750,
    stressors: true,
    brightness_pct: 100,
    target_pattern: PATTERN_RANDOM,
    moving: true,
};

const MULTI: Profile = Profile {
    duration: 360,
    target_count: 40,
    react_time: 1500,
    stressors: false,
    brightness_pct: 85,
    target_pattern: PATTERN_WAVE,
    moving: true,
};

impl TrainingMode {
    fn profile(self) -> &'static Profile {
        match self {
            Self::BasicTraining
            | Self::TimedTraining
            | Self::Endurance
            | Self::TeamTraining
            | Self::Competition
            | Self::NightVision => &BASIC,
            Self::ReactionTraining | Self::ColorCoded => &REACTION,
            Self::SkillFocus | Self::Distance => &PRECISION,
            Self::StressTraining | Self::Adrenaline | Self::HostageRescue => &STRESS,
            Self::MovingTarget | Self::MultiTarget => &MULTI,
        }
    }
}

impl Difficulty {
    /// Multiplier on reaction time and target size, in percent.
    const fn size_factor(self) -> u32 {
        match self {
            Self::Easy => 150,
            Self::Medium => 100,
            Self::Hard => 70,
        }
    }

    /// Multiplier on the distraction level, in percent.
    const fn stress_factor(self) -> u32 {
        match self {
            Self::Easy => 50,
            Self::Medium => 100,
            Self::Hard => 150,
        }
    }
}

/// `value * percent / 100`, rounded half up and clamped to `u16`.
fn scale(value: u16, percent: u32) -> u16 {
    let scaled = (u32::from(value) * percent + 50) / 100;
    u16::try_from(scaled).unwrap_or(u16::MAX)
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::defaults_for(TrainingMode::default(), Difficulty::default())
    }
}

impl TrainingConfig {
    /// The values a session of `mode` at `difficulty` starts with.
    ///
    /// Reaction time and target size shrink as the difficulty rises, and the
    /// distraction level of stress profiles grows with it.
    pub fn defaults_for(mode: TrainingMode, difficulty: Difficulty) -> Self {
        let profile = mode.profile();
        let distraction_level = if profile.stressors {
            scale(u16::from(BASE_DISTRACTION), difficulty.stress_factor()) as u8
        } else {
            0
        };
        Self {
            mode,
            difficulty,
            duration: profile.duration,
            target_count: profile.target_count,
            react_time: scale(profile.react_time, difficulty.size_factor()),
            target_size: scale(DEFAULT_TARGET_SIZE, difficulty.size_factor()).max(1),
            sound_enabled: true,
            stressors_enabled: profile.stressors,
            brightness: (profile.brightness_pct * 255 / 100) as u8,
            mode_config: ModeConfig {
                movement_speed: if profile.moving { MOVING_SPEED } else { 0 },
                distraction_level,
                team_mode: mode == TrainingMode::TeamTraining,
                target_pattern: profile.target_pattern,
            },
        }
    }

    pub fn new(mode: TrainingMode, difficulty: Difficulty) -> Self {
        Self::defaults_for(mode, difficulty)
    }

    pub fn with_duration(mut self, secs: u16) -> Self {
        self.duration = secs;
        self
    }

    /// Session length in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration) * 1000
    }
}
