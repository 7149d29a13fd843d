//! Training modes and difficulty levels.

use serde::{Deserialize, Serialize};

/// A numeric training field carried a value outside its enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} value {value}")]
pub struct InvalidTrainingField {
    pub field: &'static str,
    pub value: u8,
}

/// The fifteen exercise types a target node can run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::FromRepr,
    strum::EnumIter,
)]
#[repr(u8)]
#[serde(into = "u8", try_from = "u8")]
#[strum(serialize_all = "snake_case")]
pub enum TrainingMode {
    /// Static target shooting.
    #[default]
    BasicTraining = 0,
    /// Randomly placed targets.
    ReactionTraining = 1,
    /// Color and sound cues decide which target to engage.
    ColorCoded = 2,
    MovingTarget = 3,
    /// Distractions while shooting.
    StressTraining = 4,
    TimedTraining = 5,
    /// Endurance and precision.
    Endurance = 6,
    /// Cooperative shooting.
    TeamTraining = 7,
    Competition = 8,
    SkillFocus = 9,
    /// Stress simulation.
    Adrenaline = 10,
    /// Low-light shooting.
    NightVision = 11,
    Distance = 12,
    MultiTarget = 13,
    /// Scenario with no-shoot targets.
    HostageRescue = 14,
}

impl TrainingMode {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for TrainingMode {
    type Error = InvalidTrainingField;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_repr(value).ok_or(InvalidTrainingField {
            field: "mode",
            value,
        })
    }
}

impl From<TrainingMode> for u8 {
    fn from(mode: TrainingMode) -> Self {
        mode.as_u8()
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::FromRepr,
    strum::EnumIter,
)]
#[repr(u8)]
#[serde(into = "u8", try_from = "u8")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy = 0,
    Medium = 1,
    Hard = 2,
}

impl Difficulty {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = InvalidTrainingField;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_repr(value).ok_or(InvalidTrainingField {
            field: "difficulty",
            value,
        })
    }
}

impl From<Difficulty> for u8 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.as_u8()
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_fifteen_modes() {
        assert_eq!(TrainingMode::iter().count(), 15);
        assert_eq!(TrainingMode::HostageRescue.as_u8(), 14);
    }

    #[test]
    fn test_mode_try_from() {
        assert_eq!(TrainingMode::try_from(8), Ok(TrainingMode::Competition));
        assert_eq!(
            TrainingMode::try_from(15),
            Err(InvalidTrainingField {
                field: "mode",
                value: 15
            })
        );
    }

    #[test]
    fn test_difficulty_try_from() {
        assert_eq!(Difficulty::try_from(2), Ok(Difficulty::Hard));
        assert!(Difficulty::try_from(3).is_err());
    }

    #[test]
    fn test_serde_numeric() {
        assert_eq!(serde_json::to_string(&TrainingMode::Distance).unwrap(), "12");
        let difficulty: Difficulty = serde_json::from_str("1").unwrap();
        assert_eq!(difficulty, Difficulty::Medium);
        assert!(serde_json::from_str::<TrainingMode>("20").is_err());
    }
}
