use crate::config::SurpriseParams;
use crate::types::{SurprisePreferenceState, SURPRISE_LEVELS};

const Q_EPSILON: f64 = 1e-6;

/// Tabular Q-learning tracker over six discrete surprise levels.
///
/// Tolerance is the argmax of the Q-table; confidence is the spread of the
/// table relative to its maximum. The exploration rate decays multiplicatively
/// per update with a floor.
pub struct SurpriseTracker {
    params: SurpriseParams,
}

impl SurpriseTracker {
    pub fn new(params: SurpriseParams) -> Self {
        Self { params }
    }

    pub fn update(&self, state: &mut SurprisePreferenceState, level: usize, reward: f64, rate: f64) {
        let level = level.min(SURPRISE_LEVELS - 1);
        let reward = if reward.is_finite() {
            reward.clamp(0.0, 1.0)
        } else {
            tracing::warn!(value = reward, "non-finite surprise reward, using 0.5");
            0.5
        };
        let rate = rate.clamp(0.0, 1.0);

        state.q_values[level] += rate * (reward - state.q_values[level]);

        let (mut max_q, mut min_q, mut best) = (f64::NEG_INFINITY, f64::INFINITY, 0);
        for (i, q) in state.q_values.iter().enumerate() {
            if *q > max_q {
                max_q = *q;
                best = i;
            }
            if *q < min_q {
                min_q = *q;
            }
        }

        state.tolerance = best;
        state.confidence = ((max_q - min_q) / (max_q + Q_EPSILON)).clamp(0.0, 1.0);
        state.exploration_rate =
            (state.exploration_rate * self.params.exploration_decay).max(self.params.min_exploration);
    }
}

impl Default for SurpriseTracker {
    fn default() -> Self {
        Self::new(SurpriseParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_reward_level_becomes_tolerance() {
        let tracker = SurpriseTracker::default();
        let mut state = SurprisePreferenceState::default();
        for _ in 0..20 {
            tracker.update(&mut state, 4, 0.9, 0.1);
            for lvl in [0, 1, 2, 3, 5] {
                tracker.update(&mut state, lvl, 0.1, 0.1);
            }
        }
        assert_eq!(state.tolerance, 4);
        assert!(state.confidence > 0.5);
    }

    #[test]
    fn exploration_rate_decays_to_floor() {
        let tracker = SurpriseTracker::default();
        let mut state = SurprisePreferenceState::default();
        for _ in 0..100 {
            tracker.update(&mut state, 0, 0.5, 0.1);
        }
        assert!((state.exploration_rate - 0.1).abs() < 1e-12);
    }

    #[test]
    fn all_zero_rewards_do_not_divide_by_zero() {
        let tracker = SurpriseTracker::default();
        let mut state = SurprisePreferenceState::default();
        tracker.update(&mut state, 2, 0.0, 0.1);
        assert!(state.confidence.is_finite());
        assert_eq!(state.confidence, 0.0);
    }
}
