use crate::config::DriftParams;
use crate::types::DriftDetectionState;

/// Split-window drift detector over the engagement-score stream.
///
/// Returns false until the window holds enough samples; once it does, the
/// window is split at its midpoint and the half means compared. On drift the
/// window is truncated to the most recent samples and the running mean is
/// reseeded from the second half. Never raises.
pub struct DriftDetector {
    params: DriftParams,
}

impl DriftDetector {
    pub fn new(params: DriftParams) -> Self {
        Self { params }
    }

    pub fn observe(&self, state: &mut DriftDetectionState, score: f64) -> bool {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            tracing::warn!(value = score, "non-finite engagement score, using running mean");
            state.running_mean
        };

        state.window.push_back(score);
        if state.window.len() > self.params.max_window {
            state.window.pop_front();
        }

        if state.window.len() < self.params.min_samples {
            return false;
        }

        if state.window.len() >= self.params.split_min_samples {
            let mid = state.window.len() / 2;
            let first: Vec<f64> = state.window.iter().copied().take(mid).collect();
            let second: Vec<f64> = state.window.iter().copied().skip(mid).collect();
            let mean1 = mean(&first);
            let mean2 = mean(&second);

            if (mean1 - mean2).abs() > self.params.mean_delta_threshold {
                state.drift_count += 1;
                let keep = self.params.truncate_to.min(state.window.len());
                while state.window.len() > keep {
                    state.window.pop_front();
                }
                state.running_mean = mean2;
                return true;
            }
        }

        let full: Vec<f64> = state.window.iter().copied().collect();
        state.running_mean = mean(&full);
        false
    }
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new(DriftParams::default())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_below_minimum_samples() {
        let detector = DriftDetector::default();
        let mut state = DriftDetectionState::default();
        for i in 0..29 {
            assert!(!detector.observe(&mut state, if i < 15 { 0.1 } else { 0.9 }));
        }
    }

    #[test]
    fn shifted_halves_report_drift() {
        let detector = DriftDetector::default();
        let mut state = DriftDetectionState::default();
        let mut detected = false;
        for _ in 0..30 {
            detected |= detector.observe(&mut state, 0.1);
        }
        for _ in 0..30 {
            detected |= detector.observe(&mut state, 0.9);
        }
        assert!(detected);
        assert!(state.drift_count >= 1);
        assert!(state.window.len() <= 30);
    }

    #[test]
    fn constant_stream_never_drifts() {
        let detector = DriftDetector::default();
        let mut state = DriftDetectionState::default();
        for _ in 0..200 {
            assert!(!detector.observe(&mut state, 0.42));
        }
        assert_eq!(state.drift_count, 0);
        assert!((state.running_mean - 0.42).abs() < 1e-9);
    }

    #[test]
    fn window_is_bounded() {
        let detector = DriftDetector::default();
        let mut state = DriftDetectionState::default();
        for i in 0..500 {
            detector.observe(&mut state, (i as f64 * 0.0137) % 1.0);
        }
        assert!(state.window.len() <= 100);
    }

    #[test]
    fn running_mean_reseeds_from_second_half_on_drift() {
        let detector = DriftDetector::default();
        let mut state = DriftDetectionState::default();
        for _ in 0..30 {
            detector.observe(&mut state, 0.1);
        }
        let mut drifted = false;
        for _ in 0..30 {
            if detector.observe(&mut state, 0.9) {
                drifted = true;
                break;
            }
        }
        assert!(drifted);
        assert!(state.running_mean > 0.5);
    }
}
