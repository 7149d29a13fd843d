//! Running and final session counters.

use serde::Serialize;

use crate::ScoringPolicy;

/// Number of per-round scores kept.
pub const MAX_ROUNDS: usize = 8;

/// Counters of one session.
///
/// `score` has no setter: it is only ever derived from the other fields by
/// [`TrainingResult::rescore`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingResult {
    pub hits: u16,
    pub misses: u16,
    pub total_time_ms: u32,
    pub avg_reaction_time_ms: u16,
    score: u32,
    /// Score after each of the most recent status reports, oldest first.
    round_scores: Vec<u32>,
}

impl TrainingResult {
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn round_scores(&self) -> &[u32] {
        &self.round_scores
    }

    /// Recomputes `score` from the counters.
    pub fn rescore(&mut self, policy: &dyn ScoringPolicy) -> u32 {
        self.score = policy.score(self.hits, self.misses, self.avg_reaction_time_ms);
        self.score
    }

    /// Applies a status report and records the resulting round score.
    pub fn apply_report(
        &mut self,
        hits: u16,
        misses: u16,
        avg_reaction_time_ms: Option<u16>,
        policy: &dyn ScoringPolicy,
    ) -> u32 {
        self.hits = hits;
        self.misses = misses;
        if let Some(avg) = avg_reaction_time_ms {
            self.avg_reaction_time_ms = avg;
        }
        let score = self.rescore(policy);
        if self.round_scores.len() == MAX_ROUNDS {
            self.round_scores.remove(0);
        }
        self.round_scores.push(score);
        score
    }
}
