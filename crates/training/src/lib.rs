//! Training session model.
//!
//! This crate holds the data side of a training session: the fifteen
//! [`TrainingMode`]s, the [`TrainingConfig`] a supervisor submits, the running
//! [`TrainingResult`] and the [`ScoringPolicy`] that turns counters into a
//! score. The state machine that drives sessions lives in the host crate.

mod config;
mod mode;
mod result;
mod scoring;
mod session;

pub use config::{
    DEFAULT_BRIGHTNESS, DEFAULT_TARGET_SIZE, ModeConfig, PATTERN_RANDOM, PATTERN_SEQUENCE,
    PATTERN_WAVE, TrainingConfig,
};
pub use mode::{Difficulty, InvalidTrainingField, TrainingMode};
pub use result::{MAX_ROUNDS, TrainingResult};
pub use scoring::{DefaultScoring, ScoringPolicy};
pub use session::{SessionSnapshot, TrainingSession};
