//! Scoring policy.
//!
//! Score is a pure function of `(hits, misses, avg_reaction_time_ms)`. The
//! weights are policy, not protocol: swap the [`ScoringPolicy`] to change them.

/// Turns session counters into a score.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait ScoringPolicy: Send + Sync + std::fmt::Debug {
    /// Must be deterministic: same inputs, same score.
    fn score(&self, hits: u16, misses: u16, avg_reaction_time_ms: u16) -> u32;
}

/// Default weights.
///
/// ```text
/// score = hits * 100
///       + accuracy% * 5            (accuracy = hits / (hits + misses))
///       + (2000 - avg_ms) / 10     (only when 0 < avg_ms < 2000)
///       - misses * 25              (floored at zero)
/// ```
///
/// An average reaction time of zero means "not measured" and earns no bonus.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScoring;

impl DefaultScoring {
    pub const HIT_POINTS: u64 = 100;
    pub const ACCURACY_WEIGHT: u64 = 5;
    pub const MISS_PENALTY: u64 = 25;
    pub const REACTION_CEILING_MS: u64 = 2000;
    pub const REACTION_DIVISOR: u64 = 10;
}

impl ScoringPolicy for DefaultScoring {
    fn score(&self, hits: u16, misses: u16, avg_reaction_time_ms: u16) -> u32 {
        let hits = u64::from(hits);
        let misses = u64::from(misses);
        let avg = u64::from(avg_reaction_time_ms);

        let shots = hits + misses;
        let accuracy_bonus = if shots == 0 {
            0
        } else {
            hits * 100 * Self::ACCURACY_WEIGHT / shots
        };

        let reaction_bonus = if avg > 0 && avg < Self::REACTION_CEILING_MS {
            (Self::REACTION_CEILING_MS - avg) / Self::REACTION_DIVISOR
        } else {
            0
        };

        let gross = hits * Self::HIT_POINTS + accuracy_bonus + reaction_bonus;
        let net = gross.saturating_sub(misses * Self::MISS_PENALTY);
        u32::try_from(net).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_exact_values() {
        // 200 + 333 - 25
        assert_eq!(DefaultScoring.score(2, 1, 0), 508);
        // 1000 + 500 + 150
        assert_eq!(DefaultScoring.score(10, 0, 500), 1650);
        // all misses floor at zero
        assert_eq!(DefaultScoring.score(0, 4, 0), 0);
        assert_eq!(DefaultScoring.score(0, 0, 0), 0);
    }

    #[test]
    fn test_slow_reactions_earn_nothing() {
        assert_eq!(DefaultScoring.score(1, 0, 2000), 600);
        assert_eq!(DefaultScoring.score(1, 0, 5000), 600);
    }

    proptest! {
        #[test]
        fn prop_deterministic(hits: u16, misses: u16, avg: u16) {
            prop_assert_eq!(
                DefaultScoring.score(hits, misses, avg),
                DefaultScoring.score(hits, misses, avg)
            );
        }

        #[test]
        fn prop_more_hits_never_lower(hits in 0u16..u16::MAX, misses: u16, avg: u16) {
            prop_assert!(
                DefaultScoring.score(hits + 1, misses, avg) >= DefaultScoring.score(hits, misses, avg)
            );
        }

        #[test]
        fn prop_more_misses_never_higher(hits: u16, misses in 0u16..u16::MAX, avg: u16) {
            prop_assert!(
                DefaultScoring.score(hits, misses + 1, avg) <= DefaultScoring.score(hits, misses, avg)
            );
        }

        #[test]
        fn prop_faster_never_lower(hits: u16, misses: u16, avg in 2u16..u16::MAX) {
            prop_assert!(
                DefaultScoring.score(hits, misses, avg - 1) >= DefaultScoring.score(hits, misses, avg)
            );
        }
    }
}
