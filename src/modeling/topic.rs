use std::collections::HashMap;

use crate::config::TopicParams;
use crate::types::{TopicPreference, TopicPreferenceState};

/// Exponential-moving-average tracker over per-topic affinity weights.
///
/// Confidence grows with the interaction count and is capped; a topic seen
/// for the first time starts at the initial confidence regardless of rate.
pub struct TopicTracker {
    params: TopicParams,
}

impl TopicTracker {
    pub fn new(params: TopicParams) -> Self {
        Self { params }
    }

    /// Applies one batch of topic signals at the given learning rate.
    /// Returns the keys that were touched. Non-finite signals are dropped;
    /// out-of-range signals and rates are clamped.
    pub fn update(
        &self,
        state: &mut TopicPreferenceState,
        signals: &HashMap<String, f64>,
        rate: f64,
    ) -> Vec<String> {
        let rate = if rate.is_finite() {
            rate.clamp(0.0, 1.0)
        } else {
            self.params.default_rate
        };

        let mut updated = Vec::with_capacity(signals.len());
        for (key, raw) in signals {
            if !raw.is_finite() {
                tracing::warn!(topic = %key, value = raw, "dropping non-finite topic signal");
                continue;
            }
            let signal = raw.clamp(0.0, 1.0);

            match state.topics.get_mut(key) {
                Some(pref) => {
                    pref.weight = rate * signal + (1.0 - rate) * pref.weight;
                    pref.interactions += 1;
                    pref.confidence = (self.params.initial_confidence
                        + self.params.confidence_step * pref.interactions as f64)
                        .min(self.params.max_confidence);
                }
                None => {
                    state.topics.insert(
                        key.clone(),
                        TopicPreference {
                            weight: signal,
                            confidence: self.params.initial_confidence,
                            interactions: 0,
                        },
                    );
                }
            }
            updated.push(key.clone());
        }
        updated.sort();
        updated
    }
}

impl Default for TopicTracker {
    fn default() -> Self {
        Self::new(TopicParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn first_signal_creates_entry_at_signal_value() {
        let tracker = TopicTracker::default();
        let mut state = TopicPreferenceState::default();

        tracker.update(&mut state, &signals(&[("history.ancient", 0.8)]), 0.1);

        let pref = &state.topics["history.ancient"];
        assert!((pref.weight - 0.8).abs() < 1e-12);
        assert!((pref.confidence - 0.30).abs() < 1e-12);
        assert_eq!(pref.interactions, 0);
    }

    #[test]
    fn ema_moves_toward_signal() {
        let tracker = TopicTracker::default();
        let mut state = TopicPreferenceState::default();
        let s = signals(&[("tech", 1.0)]);

        tracker.update(&mut state, &s, 0.1);
        for _ in 0..20 {
            tracker.update(&mut state, &signals(&[("tech", 0.0)]), 0.2);
        }
        let w = state.topics["tech"].weight;
        assert!(w < 0.05, "weight should decay toward 0, got {w}");
    }

    #[test]
    fn weight_stays_in_unit_interval_for_any_rate() {
        let tracker = TopicTracker::default();
        let mut state = TopicPreferenceState::default();
        for (i, rate) in [0.0, 0.3, 0.7, 1.0, 2.5, -1.0].iter().enumerate() {
            let v = (i as f64 * 0.37) % 1.0;
            tracker.update(&mut state, &signals(&[("t", v)]), *rate);
            let w = state.topics["t"].weight;
            assert!((0.0..=1.0).contains(&w), "weight {w} escaped [0,1]");
        }
    }

    #[test]
    fn confidence_caps_at_max() {
        let tracker = TopicTracker::default();
        let mut state = TopicPreferenceState::default();
        let s = signals(&[("t", 0.5)]);
        for _ in 0..40 {
            tracker.update(&mut state, &s, 0.1);
        }
        assert!((state.topics["t"].confidence - 0.95).abs() < 1e-12);
    }

    #[test]
    fn confidence_after_ten_updates() {
        let tracker = TopicTracker::default();
        let mut state = TopicPreferenceState::default();
        let s = signals(&[("technology.ai_ml", 0.9)]);
        tracker.update(&mut state, &signals(&[("technology.ai_ml", 1.0)]), 0.3);
        for _ in 0..10 {
            tracker.update(&mut state, &s, 0.1);
        }
        let pref = &state.topics["technology.ai_ml"];
        assert!((pref.confidence - 0.80).abs() < 1e-9);
        assert!((pref.weight - 0.9).abs() < 0.05);
    }

    #[test]
    fn non_finite_signal_is_dropped() {
        let tracker = TopicTracker::default();
        let mut state = TopicPreferenceState::default();
        let updated = tracker.update(&mut state, &signals(&[("t", f64::NAN)]), 0.1);
        assert!(updated.is_empty());
        assert!(state.topics.is_empty());
    }
}
