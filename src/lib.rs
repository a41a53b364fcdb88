//! # opal-engine
//!
//! Online personalization engine. For every user it maintains a
//! continuously-updated statistical profile and uses it to rank candidate
//! content and to decide how aggressively to explore unfamiliar content.
//!
//! - [`modeling`] - per-dimension preference trackers, drift detection,
//!   adaptive learning rate, engagement-state and sequence models
//! - [`decision`] - contextual bandit, cold-start controller, hybrid
//!   recommendation blender
//! - [`engine`] - per-user orchestration and the interaction transaction
//! - [`persistence`] - the profile store contract and an in-memory store
//!
//! The models are deliberately lightweight online approximations: bounded
//! state, closed-form updates, no trained weight matrices. One interaction is
//! processed at a time per user.

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod modeling;
pub mod persistence;
pub mod types;

pub use config::{BlendWeights, EngineConfig, FeatureFlags};
pub use engine::PersonalizationEngine;
pub use error::EngineError;
pub use persistence::{MemoryStore, PreferenceStore, StoreError};
pub use types::{
    AnswerValue, CandidateItem, EngagementObservation, InteractionEvent, InteractionOutcome,
    OnboardingStep, PersistedProfile, RankedItem,
};
