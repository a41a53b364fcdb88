use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicParams {
    pub default_rate: f64,
    pub initial_confidence: f64,
    pub confidence_step: f64,
    pub max_confidence: f64,
}

impl Default for TopicParams {
    fn default() -> Self {
        Self {
            default_rate: 0.1,
            initial_confidence: 0.30,
            confidence_step: 0.05,
            max_confidence: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthParams {
    pub satisfaction_threshold: f64,
}

impl Default for DepthParams {
    fn default() -> Self {
        Self {
            satisfaction_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurpriseParams {
    pub exploration_decay: f64,
    pub min_exploration: f64,
}

impl Default for SurpriseParams {
    fn default() -> Self {
        Self {
            exploration_decay: 0.95,
            min_exploration: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftParams {
    pub max_window: usize,
    pub min_samples: usize,
    pub split_min_samples: usize,
    pub mean_delta_threshold: f64,
    pub truncate_to: usize,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            max_window: 100,
            min_samples: 30,
            split_min_samples: 60,
            mean_delta_threshold: 0.002,
            truncate_to: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationParams {
    pub base_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub count_decay: f64,
    pub drift_boost: f64,
}

impl Default for AdaptationParams {
    fn default() -> Self {
        Self {
            base_rate: 0.1,
            min_rate: 0.01,
            max_rate: 0.3,
            count_decay: 0.001,
            drift_boost: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementParams {
    pub adaptation_rate: f64,
    pub adaptation_window: usize,
    pub min_emission: f64,
    pub max_emission: f64,
    pub max_history: usize,
    pub accuracy_window: usize,
}

impl Default for EngagementParams {
    fn default() -> Self {
        Self {
            adaptation_rate: 0.01,
            adaptation_window: 10,
            min_emission: 0.01,
            max_emission: 0.99,
            max_history: 100,
            accuracy_window: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceParams {
    pub max_history: usize,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self { max_history: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditParams {
    pub exploration_constant: f64,
    pub context_weight: f64,
    pub max_history: usize,
    pub reported_exploration_base: f64,
    pub reported_exploration_decay: f64,
    pub reported_exploration_floor: f64,
}

impl Default for BanditParams {
    fn default() -> Self {
        Self {
            exploration_constant: 2.0,
            context_weight: 0.2,
            max_history: 100,
            reported_exploration_base: 0.4,
            reported_exploration_decay: 0.05,
            reported_exploration_floor: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColdStartParams {
    pub seed_rate: f64,
    pub initial_exploration: f64,
    pub exploration_decay: f64,
    pub min_exploration: f64,
}

impl Default for ColdStartParams {
    fn default() -> Self {
        Self {
            seed_rate: 0.3,
            initial_exploration: 0.5,
            exploration_decay: 0.95,
            min_exploration: 0.1,
        }
    }
}

/// Fixed fusion weights for the four recommendation scorers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendWeights {
    pub collaborative: f64,
    pub content_based: f64,
    pub knowledge_based: f64,
    pub demographic: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            collaborative: 0.4,
            content_based: 0.3,
            knowledge_based: 0.2,
            demographic: 0.1,
        }
    }
}

impl BlendWeights {
    pub fn sum(&self) -> f64 {
        self.collaborative + self.content_based + self.knowledge_based + self.demographic
    }

    /// Weights are rejected unless they sum to 1.0 within 0.01.
    pub fn validate(&self) -> Result<(), EngineError> {
        let total = self.sum();
        if (total - 1.0).abs() > 0.01 {
            return Err(EngineError::InvalidBlendWeights(total));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendParams {
    pub weights: BlendWeights,
    pub diversity_boost: f64,
    pub secondary_threshold: f64,
}

impl Default for BlendParams {
    fn default() -> Self {
        Self {
            weights: BlendWeights::default(),
            diversity_boost: 0.15,
            secondary_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub drift_enabled: bool,
    pub engagement_enabled: bool,
    pub sequence_enabled: bool,
    pub bandit_context_enabled: bool,
    pub diversity_default: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            drift_enabled: true,
            engagement_enabled: true,
            sequence_enabled: true,
            bandit_context_enabled: true,
            diversity_default: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub topic: TopicParams,
    pub depth: DepthParams,
    pub surprise: SurpriseParams,
    pub drift: DriftParams,
    pub adaptation: AdaptationParams,
    pub engagement: EngagementParams,
    pub sequence: SequenceParams,
    pub bandit: BanditParams,
    pub cold_start: ColdStartParams,
    pub blend: BlendParams,
    pub feature_flags: FeatureFlags,
    /// Seed for exploration picks; `None` draws from OS entropy.
    pub exploration_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            topic: TopicParams::default(),
            depth: DepthParams::default(),
            surprise: SurpriseParams::default(),
            drift: DriftParams::default(),
            adaptation: AdaptationParams::default(),
            engagement: EngagementParams::default(),
            sequence: SequenceParams::default(),
            bandit: BanditParams::default(),
            cold_start: ColdStartParams::default(),
            blend: BlendParams::default(),
            feature_flags: FeatureFlags::default(),
            exploration_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("OPAL_DRIFT_ENABLED") {
            config.feature_flags.drift_enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("OPAL_ENGAGEMENT_ENABLED") {
            config.feature_flags.engagement_enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("OPAL_SEQUENCE_ENABLED") {
            config.feature_flags.sequence_enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("OPAL_BANDIT_CONTEXT_ENABLED") {
            config.feature_flags.bandit_context_enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("OPAL_DIVERSITY_DEFAULT") {
            config.feature_flags.diversity_default = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("OPAL_EXPLORATION_SEED") {
            config.exploration_seed = val.parse().ok();
        }

        config
    }
}
