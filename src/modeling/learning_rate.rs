use crate::config::AdaptationParams;
use crate::types::AdaptationState;

/// Modulates the shared learning rate: boosted multiplicatively on drift,
/// otherwise decayed toward the floor as updates accumulate.
pub struct LearningRateController {
    params: AdaptationParams,
}

impl LearningRateController {
    pub fn new(params: AdaptationParams) -> Self {
        Self { params }
    }

    pub fn update(&self, state: &mut AdaptationState, drift_detected: bool) -> f64 {
        if drift_detected {
            state.learning_rate =
                (state.learning_rate * self.params.drift_boost).min(self.params.max_rate);
        } else {
            state.learning_rate = (self.params.base_rate
                / (1.0 + self.params.count_decay * state.update_count as f64))
                .max(self.params.min_rate);
        }
        state.update_count += 1;
        state.learning_rate
    }
}

impl Default for LearningRateController {
    fn default() -> Self {
        Self::new(AdaptationParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_boosts_up_to_max() {
        let controller = LearningRateController::default();
        let mut state = AdaptationState::default();
        for _ in 0..10 {
            controller.update(&mut state, true);
        }
        assert!((state.learning_rate - 0.3).abs() < 1e-12);
    }

    #[test]
    fn rate_decays_with_update_count() {
        let controller = LearningRateController::default();
        let mut state = AdaptationState::default();
        let first = controller.update(&mut state, false);
        for _ in 0..500 {
            controller.update(&mut state, false);
        }
        let later = state.learning_rate;
        assert!(later < first);
        assert!(later >= 0.01);
    }

    #[test]
    fn update_count_is_monotone() {
        let controller = LearningRateController::default();
        let mut state = AdaptationState::default();
        controller.update(&mut state, true);
        controller.update(&mut state, false);
        assert_eq!(state.update_count, 2);
    }
}
