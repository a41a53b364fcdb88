use thiserror::Error;

use crate::persistence::StoreError;

/// Errors surfaced by the engine's public API.
///
/// Only `Persistence` aborts an interaction transaction; sub-model failures
/// are recovered internally with neutral defaults.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("unknown questionnaire section: {0}")]
    UnknownSection(String),

    #[error("questionnaire section {submitted} submitted out of order (expected {expected})")]
    SectionOutOfOrder { submitted: String, expected: String },

    #[error("onboarding already complete")]
    OnboardingComplete,

    #[error("blend weights must sum to 1.0 +/- 0.01 (got {0:.3})")]
    InvalidBlendWeights(f64),
}
