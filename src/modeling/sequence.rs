use crate::config::SequenceParams;
use crate::types::{SequenceModelState, SequenceScores, SEQUENCE_HIDDEN_SIZE, SEQUENCE_INPUT_SIZE};

const ENGAGEMENT_SLOTS: usize = 32;
const FEATURE_SLOTS: usize = 64;

/// Recurrent-style scorer over a fixed 128-slot input window.
///
/// A lightweight pointwise approximation of a recurrent cell: the input is
/// folded against the persistent 64-wide hidden/cell state through sigmoid
/// and tanh gates, with no separate trainable weight matrices. Each of the
/// four output scores is a sigmoid of the mean over one quarter-slice of the
/// new hidden state. "Training" scores the previous prediction against the
/// actual outcome (MSE) and records an accuracy proxy; it performs no
/// gradient descent.
pub struct SequencePredictor {
    params: SequenceParams,
}

/// Slot layout of the 128-wide input window.
pub struct SequenceInput {
    /// Most recent engagement scores, newest last (up to 32 slots).
    pub engagement_history: Vec<f64>,
    /// Content feature vector (up to 64 slots).
    pub content_features: Vec<f64>,
    /// Hour of day 0-23.
    pub hour_of_day: u32,
    /// Day of week 0-6 (Monday = 0).
    pub weekday: u32,
    /// Device class index 0-5.
    pub device_index: usize,
    /// Position of this interaction within the session, normalized.
    pub session_position: f64,
}

impl SequencePredictor {
    pub fn new(params: SequenceParams) -> Self {
        Self { params }
    }

    pub fn assemble_input(&self, input: &SequenceInput) -> [f64; SEQUENCE_INPUT_SIZE] {
        let mut slots = [0.0; SEQUENCE_INPUT_SIZE];

        // 0..32: recent engagement sequence, newest in the highest slot
        let eng = &input.engagement_history;
        let n = eng.len().min(ENGAGEMENT_SLOTS);
        for (i, v) in eng.iter().rev().take(n).enumerate() {
            slots[ENGAGEMENT_SLOTS - 1 - i] = v.clamp(0.0, 1.0);
        }

        // 32..96: content features
        for (i, v) in input.content_features.iter().take(FEATURE_SLOTS).enumerate() {
            let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
            slots[ENGAGEMENT_SLOTS + i] = v;
        }

        // 96..98: cyclical time of day
        let hour_angle = input.hour_of_day as f64 / 24.0 * std::f64::consts::TAU;
        slots[96] = (hour_angle.sin() + 1.0) / 2.0;
        slots[97] = (hour_angle.cos() + 1.0) / 2.0;

        // 98..104: one-hot device class
        let device = input.device_index.min(5);
        slots[98 + device] = 1.0;

        // 104..111: one-hot weekday
        let weekday = (input.weekday as usize).min(6);
        slots[104 + weekday] = 1.0;

        // 111..: remaining temporal features
        slots[111] = input.hour_of_day as f64 / 24.0;
        slots[112] = if weekday >= 5 { 1.0 } else { 0.0 };
        slots[113] = input.session_position.clamp(0.0, 1.0);

        slots
    }

    /// Runs one recurrent step and produces the four scores. The prediction
    /// is appended to the bounded history so a later training step can score
    /// it against the actual outcome.
    pub fn predict(
        &self,
        state: &mut SequenceModelState,
        input: &[f64; SEQUENCE_INPUT_SIZE],
    ) -> SequenceScores {
        if state.hidden.len() != SEQUENCE_HIDDEN_SIZE {
            state.hidden = vec![0.0; SEQUENCE_HIDDEN_SIZE];
        }
        if state.cell.len() != SEQUENCE_HIDDEN_SIZE {
            state.cell = vec![0.0; SEQUENCE_HIDDEN_SIZE];
        }

        for j in 0..SEQUENCE_HIDDEN_SIZE {
            let x = 0.5 * (input[j] + input[j + SEQUENCE_HIDDEN_SIZE]);
            let h = state.hidden[j];

            let forget = sigmoid(h + x);
            let input_gate = sigmoid(x);
            let candidate = (x + h).tanh();
            let cell = forget * state.cell[j] + input_gate * candidate;
            let output_gate = sigmoid(x + cell);

            state.cell[j] = cell;
            state.hidden[j] = output_gate * cell.tanh();
        }

        let quarter = SEQUENCE_HIDDEN_SIZE / 4;
        let scores = SequenceScores {
            engagement_probability: sigmoid(slice_mean(&state.hidden[0..quarter])),
            completion_likelihood: sigmoid(slice_mean(&state.hidden[quarter..2 * quarter])),
            preference_strength: sigmoid(slice_mean(&state.hidden[2 * quarter..3 * quarter])),
            churn_risk: sigmoid(slice_mean(&state.hidden[3 * quarter..])),
        };

        state.predictions.push_back(scores);
        if state.predictions.len() > self.params.max_history {
            state.predictions.pop_front();
        }

        scores
    }

    /// Scores the last stored prediction against the actual outcome.
    /// Returns the updated accuracy proxy.
    pub fn train(&self, state: &mut SequenceModelState, actual: &SequenceScores) -> f64 {
        let Some(last) = state.predictions.back().copied() else {
            return state.accuracy;
        };

        let loss = ((last.engagement_probability - actual.engagement_probability).powi(2)
            + (last.completion_likelihood - actual.completion_likelihood).powi(2)
            + (last.preference_strength - actual.preference_strength).powi(2)
            + (last.churn_risk - actual.churn_risk).powi(2))
            / 4.0;

        state.accuracy = 1.0 - loss.min(1.0);
        state.training_iterations += 1;
        state.accuracy
    }
}

impl Default for SequencePredictor {
    fn default() -> Self {
        Self::new(SequenceParams::default())
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn slice_mean(slice: &[f64]) -> f64 {
    if slice.is_empty() {
        return 0.0;
    }
    slice.iter().sum::<f64>() / slice.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_for(engagement: f64) -> SequenceInput {
        SequenceInput {
            engagement_history: vec![engagement; 16],
            content_features: vec![0.5; 64],
            hour_of_day: 14,
            weekday: 2,
            device_index: 0,
            session_position: 0.3,
        }
    }

    #[test]
    fn scores_are_bounded() {
        let predictor = SequencePredictor::default();
        let mut state = SequenceModelState::default();
        for i in 0..50 {
            let input = predictor.assemble_input(&input_for((i as f64 * 0.19) % 1.0));
            let scores = predictor.predict(&mut state, &input);
            for s in [
                scores.engagement_probability,
                scores.completion_likelihood,
                scores.preference_strength,
                scores.churn_risk,
            ] {
                assert!((0.0..=1.0).contains(&s), "score {s} out of bounds");
            }
        }
    }

    #[test]
    fn hidden_state_discriminates_inputs() {
        let predictor = SequencePredictor::default();

        let mut high = SequenceModelState::default();
        let mut low = SequenceModelState::default();
        let mut high_scores = SequenceScores::default();
        let mut low_scores = SequenceScores::default();
        for _ in 0..10 {
            let hi = predictor.assemble_input(&input_for(1.0));
            let lo = predictor.assemble_input(&SequenceInput {
                engagement_history: vec![0.0; 16],
                content_features: vec![0.0; 64],
                ..input_for(0.0)
            });
            high_scores = predictor.predict(&mut high, &hi);
            low_scores = predictor.predict(&mut low, &lo);
        }
        assert!(high_scores.engagement_probability > low_scores.engagement_probability);
    }

    #[test]
    fn training_records_accuracy_against_last_prediction() {
        let predictor = SequencePredictor::default();
        let mut state = SequenceModelState::default();
        let input = predictor.assemble_input(&input_for(0.8));
        let predicted = predictor.predict(&mut state, &input);

        let accuracy = predictor.train(&mut state, &predicted);
        assert!((accuracy - 1.0).abs() < 1e-12);
        assert_eq!(state.training_iterations, 1);

        let far = SequenceScores {
            engagement_probability: 1.0 - predicted.engagement_probability,
            completion_likelihood: 1.0 - predicted.completion_likelihood,
            preference_strength: 1.0 - predicted.preference_strength,
            churn_risk: 1.0 - predicted.churn_risk,
        };
        let worse = predictor.train(&mut state, &far);
        assert!(worse < accuracy);
    }

    #[test]
    fn train_without_prediction_is_a_no_op() {
        let predictor = SequencePredictor::default();
        let mut state = SequenceModelState::default();
        let acc = predictor.train(&mut state, &SequenceScores::default());
        assert!((acc - 0.5).abs() < 1e-12);
        assert_eq!(state.training_iterations, 0);
    }

    #[test]
    fn prediction_history_is_bounded() {
        let predictor = SequencePredictor::default();
        let mut state = SequenceModelState::default();
        let input = predictor.assemble_input(&input_for(0.5));
        for _ in 0..250 {
            predictor.predict(&mut state, &input);
        }
        assert!(state.predictions.len() <= 100);
    }
}
