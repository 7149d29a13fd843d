use rangehost_primitives::Timestamp;
use serde::Serialize;

use crate::{ScoringPolicy, TrainingConfig, TrainingResult};

/// A client's training slot.
///
/// `started_at` is `Some` exactly while a session runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingSession {
    pub config: TrainingConfig,
    started_at: Option<Timestamp>,
    pub result: TrainingResult,
}

impl TrainingSession {
    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    /// Replaces config and clears counters. Restarting a running session is
    /// allowed and discards its counters.
    pub fn begin(&mut self, config: TrainingConfig, now: Timestamp) {
        self.config = config;
        self.result = TrainingResult::default();
        self.started_at = Some(now);
    }

    /// Milliseconds since start, or zero when idle.
    pub fn elapsed_ms(&self, now: Timestamp) -> u64 {
        self.started_at
            .map(|started| now.saturating_sub(started))
            .unwrap_or_default()
    }

    /// Whether the configured duration has run out.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.is_running() && self.elapsed_ms(now) >= self.config.duration_ms()
    }

    /// Ends the session and returns its final result; `None` when idle.
    pub fn finish(&mut self, now: Timestamp, policy: &dyn ScoringPolicy) -> Option<TrainingResult> {
        if !self.is_running() {
            return None;
        }
        let elapsed = self.elapsed_ms(now);
        let mut result = std::mem::take(&mut self.result);
        result.total_time_ms = u32::try_from(elapsed).unwrap_or(u32::MAX);
        result.rescore(policy);
        self.started_at = None;
        Some(result)
    }

    pub fn snapshot(&self, now: Timestamp) -> SessionSnapshot {
        SessionSnapshot {
            running: self.is_running(),
            config: self.config,
            elapsed_ms: self.elapsed_ms(now),
            result: self.result.clone(),
        }
    }
}

/// Serializable view of a session at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub running: bool,
    pub config: TrainingConfig,
    pub elapsed_ms: u64,
    pub result: TrainingResult,
}
