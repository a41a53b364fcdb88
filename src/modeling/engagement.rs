use crate::config::EngagementParams;
use crate::types::{
    EngagementModelState, EngagementObservation, EngagementStateKind, EngagementSummary,
    StateRecord, ENGAGEMENT_STATES, OBSERVATION_CHANNELS,
};

const MIN_LIKELIHOOD: f64 = 0.01;

/// Discrete hidden-state tracker over {engaged, distracted, bored,
/// overwhelmed} driven by five playback channels.
///
/// Emission likelihood is a similarity proxy (inverted mean absolute
/// difference against the state's expected channel profile), not a
/// probabilistic density. Emission rows adapt slowly toward the recent
/// observation mean.
pub struct EngagementTracker {
    params: EngagementParams,
}

impl EngagementTracker {
    pub fn new(params: EngagementParams) -> Self {
        Self { params }
    }

    pub fn infer(
        &self,
        state: &mut EngagementModelState,
        observation: &EngagementObservation,
    ) -> EngagementSummary {
        let obs = sanitize(observation.as_array());

        let mut likelihood = [0.0; ENGAGEMENT_STATES];
        for s in 0..ENGAGEMENT_STATES {
            likelihood[s] = (1.0 - mean_abs_diff(&state.emission[s], &obs)).max(MIN_LIKELIHOOD);
        }

        // prior propagation through the transition matrix, then reweighting
        let mut predicted = [0.0; ENGAGEMENT_STATES];
        for (i, p) in state.probs.iter().enumerate() {
            for (j, pj) in predicted.iter_mut().enumerate() {
                *pj += p * state.transition[i][j];
            }
        }

        let mut new_probs = [0.0; ENGAGEMENT_STATES];
        for j in 0..ENGAGEMENT_STATES {
            new_probs[j] = predicted[j] * likelihood[j];
        }
        normalize(&mut new_probs);
        state.probs = new_probs;

        let best = argmax(&new_probs);
        let kind = EngagementStateKind::from_index(best);

        state.observations.push_back(obs);
        if state.observations.len() > self.params.max_history {
            state.observations.pop_front();
        }
        state.states.push_back(StateRecord {
            state: kind,
            confidence: new_probs[best],
        });
        if state.states.len() > self.params.max_history {
            state.states.pop_front();
        }

        self.adapt_emissions(state);

        EngagementSummary {
            state: kind,
            distribution: new_probs,
            attention_weights: self.attention_weights(&state.emission[best], &obs),
            accuracy: self.rolling_accuracy(state),
        }
    }

    /// Nudges every emission row toward the mean of the recent observations,
    /// clipped to the configured band; transition rows are renormalized.
    fn adapt_emissions(&self, state: &mut EngagementModelState) {
        let recent: Vec<&[f64; OBSERVATION_CHANNELS]> = state
            .observations
            .iter()
            .rev()
            .take(self.params.adaptation_window)
            .collect();
        if recent.is_empty() {
            return;
        }

        let mut target = [0.0; OBSERVATION_CHANNELS];
        for obs in &recent {
            for (c, t) in target.iter_mut().enumerate() {
                *t += obs[c];
            }
        }
        for t in target.iter_mut() {
            *t /= recent.len() as f64;
        }

        for row in state.emission.iter_mut() {
            for (c, value) in row.iter_mut().enumerate() {
                *value += self.params.adaptation_rate * (target[c] - *value);
                *value = value.clamp(self.params.min_emission, self.params.max_emission);
            }
        }

        for row in state.transition.iter_mut() {
            let total: f64 = row.iter().sum();
            if total > 1e-9 {
                for v in row.iter_mut() {
                    *v /= total;
                }
            }
        }
    }

    /// Per-channel agreement between the winning state's profile and the
    /// observation, normalized to sum 1.
    fn attention_weights(
        &self,
        emission_row: &[f64; OBSERVATION_CHANNELS],
        obs: &[f64; OBSERVATION_CHANNELS],
    ) -> [f64; OBSERVATION_CHANNELS] {
        let mut weights = [0.0; OBSERVATION_CHANNELS];
        for c in 0..OBSERVATION_CHANNELS {
            weights[c] = (1.0 - (emission_row[c] - obs[c]).abs()).max(0.0);
        }
        let total: f64 = weights.iter().sum();
        if total > 1e-9 {
            for w in weights.iter_mut() {
                *w /= total;
            }
        } else {
            weights = [1.0 / OBSERVATION_CHANNELS as f64; OBSERVATION_CHANNELS];
        }
        weights
    }

    /// Mean winning probability over the recent predictions. A confidence
    /// proxy, not ground-truth accuracy.
    fn rolling_accuracy(&self, state: &EngagementModelState) -> f64 {
        let recent: Vec<f64> = state
            .states
            .iter()
            .rev()
            .take(self.params.accuracy_window)
            .map(|r| r.confidence)
            .collect();
        if recent.is_empty() {
            return 0.5;
        }
        recent.iter().sum::<f64>() / recent.len() as f64
    }
}

impl Default for EngagementTracker {
    fn default() -> Self {
        Self::new(EngagementParams::default())
    }
}

fn sanitize(mut obs: [f64; OBSERVATION_CHANNELS]) -> [f64; OBSERVATION_CHANNELS] {
    for v in obs.iter_mut() {
        if !v.is_finite() {
            *v = 0.5;
        }
        *v = v.clamp(0.0, 1.0);
    }
    obs
}

fn mean_abs_diff(a: &[f64; OBSERVATION_CHANNELS], b: &[f64; OBSERVATION_CHANNELS]) -> f64 {
    let mut total = 0.0;
    for c in 0..OBSERVATION_CHANNELS {
        total += (a[c] - b[c]).abs();
    }
    total / OBSERVATION_CHANNELS as f64
}

fn normalize(probs: &mut [f64; ENGAGEMENT_STATES]) {
    let total: f64 = probs.iter().sum();
    if total > 1e-9 {
        for p in probs.iter_mut() {
            *p /= total;
        }
    } else {
        *probs = [1.0 / ENGAGEMENT_STATES as f64; ENGAGEMENT_STATES];
    }
}

fn argmax(probs: &[f64; ENGAGEMENT_STATES]) -> usize {
    let mut best = 0;
    for (i, p) in probs.iter().enumerate() {
        if *p > probs[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engaged_obs() -> EngagementObservation {
        EngagementObservation {
            speed_change_rate: 0.1,
            pause_frequency: 0.1,
            skip_rate: 0.05,
            replay_rate: 0.3,
            completion_fraction: 0.9,
        }
    }

    fn bored_obs() -> EngagementObservation {
        EngagementObservation {
            speed_change_rate: 0.5,
            pause_frequency: 0.3,
            skip_rate: 0.85,
            replay_rate: 0.05,
            completion_fraction: 0.2,
        }
    }

    #[test]
    fn engaged_pattern_is_recognized() {
        let tracker = EngagementTracker::default();
        let mut state = EngagementModelState::default();
        let mut summary = EngagementSummary::default();
        for _ in 0..5 {
            summary = tracker.infer(&mut state, &engaged_obs());
        }
        assert_eq!(summary.state, EngagementStateKind::Engaged);
    }

    #[test]
    fn sustained_skipping_moves_to_bored() {
        let tracker = EngagementTracker::default();
        let mut state = EngagementModelState::default();
        for _ in 0..3 {
            tracker.infer(&mut state, &engaged_obs());
        }
        let mut summary = EngagementSummary::default();
        for _ in 0..10 {
            summary = tracker.infer(&mut state, &bored_obs());
        }
        assert_eq!(summary.state, EngagementStateKind::Bored);
    }

    #[test]
    fn distribution_stays_normalized() {
        let tracker = EngagementTracker::default();
        let mut state = EngagementModelState::default();
        for i in 0..50 {
            let obs = EngagementObservation {
                speed_change_rate: (i as f64 * 0.07) % 1.0,
                pause_frequency: (i as f64 * 0.13) % 1.0,
                skip_rate: (i as f64 * 0.29) % 1.0,
                replay_rate: (i as f64 * 0.41) % 1.0,
                completion_fraction: (i as f64 * 0.53) % 1.0,
            };
            let summary = tracker.infer(&mut state, &obs);
            let total: f64 = summary.distribution.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
            let wsum: f64 = summary.attention_weights.iter().sum();
            assert!((wsum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn emission_values_stay_clipped() {
        let tracker = EngagementTracker::default();
        let mut state = EngagementModelState::default();
        let extreme = EngagementObservation {
            speed_change_rate: 1.0,
            pause_frequency: 1.0,
            skip_rate: 1.0,
            replay_rate: 1.0,
            completion_fraction: 0.0,
        };
        for _ in 0..300 {
            tracker.infer(&mut state, &extreme);
        }
        for row in &state.emission {
            for v in row {
                assert!((0.01..=0.99).contains(v));
            }
        }
    }

    #[test]
    fn histories_are_bounded() {
        let tracker = EngagementTracker::default();
        let mut state = EngagementModelState::default();
        for _ in 0..250 {
            tracker.infer(&mut state, &engaged_obs());
        }
        assert!(state.observations.len() <= 100);
        assert!(state.states.len() <= 100);
    }

    #[test]
    fn non_finite_observation_is_recovered() {
        let tracker = EngagementTracker::default();
        let mut state = EngagementModelState::default();
        let summary = tracker.infer(
            &mut state,
            &EngagementObservation {
                completion_fraction: f64::NAN,
                ..engaged_obs()
            },
        );
        let total: f64 = summary.distribution.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
