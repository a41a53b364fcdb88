use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Timelike};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{Mutex, RwLock};

use crate::config::{BlendWeights, EngineConfig, FeatureFlags};
use crate::decision::{BanditSelector, ColdStartController, RecommendationBlender};
use crate::error::EngineError;
use crate::modeling::sequence::SequenceInput;
use crate::modeling::{
    DepthTracker, DriftDetector, EngagementTracker, LearningRateController, SequencePredictor,
    SurpriseTracker, TopicTracker,
};
use crate::persistence::PreferenceStore;
use crate::types::{
    CandidateItem, EngagementSummary, ExplorationPick, ExplorationUpdate, InteractionEvent,
    InteractionOutcome, OnboardingStep, PersistedProfile, PreferenceUpdates, QuestionnaireSection,
    RankedItem, SequenceScores,
};

/// Stateless component set built from one config snapshot.
struct Components {
    topic: TopicTracker,
    depth: DepthTracker,
    surprise: SurpriseTracker,
    drift: DriftDetector,
    learning_rate: LearningRateController,
    engagement: EngagementTracker,
    sequence: SequencePredictor,
    bandit: BanditSelector,
    cold_start: ColdStartController,
}

impl Components {
    fn new(config: &EngineConfig) -> Self {
        Self {
            topic: TopicTracker::new(config.topic.clone()),
            depth: DepthTracker::new(config.depth.clone()),
            surprise: SurpriseTracker::new(config.surprise.clone()),
            drift: DriftDetector::new(config.drift.clone()),
            learning_rate: LearningRateController::new(config.adaptation.clone()),
            engagement: EngagementTracker::new(config.engagement.clone()),
            sequence: SequencePredictor::new(config.sequence.clone()),
            bandit: BanditSelector::new(config.bandit.clone()),
            cold_start: ColdStartController::new(config.cold_start.clone()),
        }
    }
}

/// Orchestrates the per-user model pipeline behind a pluggable profile store.
///
/// Writes for one user are serialized through a per-user mutex held across
/// the whole load-update-save transaction; the store's optimistic version
/// check guards against writers outside this process. Read paths clone the
/// cached profile and run without coordination.
pub struct PersonalizationEngine {
    config: Arc<RwLock<EngineConfig>>,
    store: Arc<dyn PreferenceStore>,
    profiles: Arc<RwLock<HashMap<String, PersistedProfile>>>,
    user_locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
    rng: parking_lot::Mutex<ChaCha8Rng>,
}

impl PersonalizationEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn PreferenceStore>) -> Self {
        let rng = match config.exploration_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };
        Self {
            config: Arc::new(RwLock::new(config)),
            store,
            profiles: Arc::new(RwLock::new(HashMap::new())),
            user_locks: Arc::new(RwLock::new(HashMap::new())),
            rng: parking_lot::Mutex::new(rng),
        }
    }

    /// Runs the full update pipeline for one interaction as a single
    /// transaction. Only a store failure aborts; individual sub-models
    /// degrade to neutral defaults.
    pub async fn process_interaction(
        &self,
        user_id: &str,
        event: InteractionEvent,
    ) -> Result<InteractionOutcome, EngineError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let config = self.config.read().await.clone();
        let components = Components::new(&config);
        let mut profile = self.load_or_init(user_id).await?;

        let engagement_score = event.observation.engagement_score();
        let rate = profile.adaptation.learning_rate;

        let topics_updated =
            components
                .topic
                .update(&mut profile.topics, &event.topic_signals, rate);

        if let Some(bucket) = event.depth_level {
            let satisfaction = event.satisfaction.unwrap_or(engagement_score);
            components
                .depth
                .update(&mut profile.depth, bucket, satisfaction);
        }

        if let Some(level) = event.surprise_level {
            let reward = event.reward.unwrap_or(engagement_score);
            components
                .surprise
                .update(&mut profile.surprise, level, reward, rate);
        }

        let drift_detected = if config.feature_flags.drift_enabled {
            components.drift.observe(&mut profile.drift, engagement_score)
        } else {
            false
        };
        if drift_detected {
            tracing::info!(user_id, drift_count = profile.drift.drift_count, "engagement drift");
        }

        let learning_rate = components
            .learning_rate
            .update(&mut profile.adaptation, drift_detected);

        let engagement = if config.feature_flags.engagement_enabled {
            components
                .engagement
                .infer(&mut profile.engagement, &event.observation)
        } else {
            EngagementSummary::default()
        };

        let predictions = if config.feature_flags.sequence_enabled {
            let actual = SequenceScores {
                engagement_probability: engagement_score,
                completion_likelihood: event.observation.completion_fraction.clamp(0.0, 1.0),
                preference_strength: mean_signal(&event.topic_signals),
                churn_risk: event.observation.skip_rate.clamp(0.0, 1.0),
            };
            components.sequence.train(&mut profile.sequence, &actual);

            let input = components
                .sequence
                .assemble_input(&self.sequence_input(&profile, &event));
            components.sequence.predict(&mut profile.sequence, &input)
        } else {
            SequenceScores::default()
        };

        if let Some(arm_id) = &event.arm_id {
            let reward = event.reward.unwrap_or(engagement_score);
            let context = if config.feature_flags.bandit_context_enabled {
                event.context.clone()
            } else {
                HashMap::new()
            };
            components
                .bandit
                .update(&mut profile.bandit, arm_id, reward, &context);
        }

        profile.interaction_count += 1;
        profile.last_updated = chrono::Utc::now().timestamp_millis();

        let exploration = ExplorationUpdate {
            bandit_exploration_rate: components.bandit.exploration_rate(&profile.bandit),
            cold_start_exploration_rate: profile.cold_start.exploration_rate,
            total_pulls: profile.bandit.total_pulls,
            regret: profile.bandit.regret,
        };
        let outcome = InteractionOutcome {
            preference_updates: PreferenceUpdates {
                topics_updated,
                preferred_depth: profile.depth.preferred,
                depth_confidence: profile.depth.confidence,
                surprise_tolerance: profile.surprise.tolerance,
                surprise_confidence: profile.surprise.confidence,
            },
            drift_detected,
            learning_rate,
            engagement,
            predictions,
            exploration,
        };

        self.commit(profile).await?;
        Ok(outcome)
    }

    /// Ranks candidates with the hybrid blender. Read-only: a missing
    /// profile scores with documented defaults and nothing is persisted.
    pub async fn get_recommendations(
        &self,
        user_id: &str,
        candidates: &[CandidateItem],
        n: usize,
        diversity: Option<bool>,
    ) -> Result<Vec<RankedItem>, EngineError> {
        let config = self.config.read().await.clone();
        let blender = RecommendationBlender::new(config.blend.clone())?;
        let diversity = diversity.unwrap_or(config.feature_flags.diversity_default);

        let profile = match self.peek(user_id).await? {
            Some(profile) => profile,
            None => PersistedProfile::new(user_id),
        };

        Ok(blender.rank(&profile, candidates, n, diversity))
    }

    /// Epsilon-greedy picks for a user still in the cold-start phase.
    /// Decays and persists the exploration rate.
    pub async fn get_exploration_recommendations(
        &self,
        user_id: &str,
        candidates: &[String],
        n: usize,
    ) -> Result<Vec<ExplorationPick>, EngineError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let config = self.config.read().await.clone();
        let components = Components::new(&config);
        let mut profile = self.load_or_init(user_id).await?;

        let picks = {
            let mut rng = self.rng.lock();
            components
                .cold_start
                .exploration_picks(&mut profile.cold_start, candidates, n, &mut *rng)
        };

        profile.last_updated = chrono::Utc::now().timestamp_millis();
        self.commit(profile).await?;
        Ok(picks)
    }

    pub async fn start_onboarding(
        &self,
        user_id: &str,
    ) -> Result<QuestionnaireSection, EngineError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let config = self.config.read().await.clone();
        let components = Components::new(&config);
        let mut profile = self.load_or_init(user_id).await?;

        let section = components.cold_start.start(&mut profile.cold_start);
        self.commit(profile).await?;
        Ok(section)
    }

    pub async fn submit_answers(
        &self,
        user_id: &str,
        section_id: &str,
        answers: &HashMap<String, crate::types::AnswerValue>,
    ) -> Result<OnboardingStep, EngineError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let config = self.config.read().await.clone();
        let components = Components::new(&config);
        let mut profile = self.load_or_init(user_id).await?;

        let step =
            components
                .cold_start
                .submit(&mut profile, &components.topic, section_id, answers)?;
        self.commit(profile).await?;
        Ok(step)
    }

    pub async fn get_profile_snapshot(
        &self,
        user_id: &str,
    ) -> Result<Option<PersistedProfile>, EngineError> {
        self.peek(user_id).await
    }

    pub async fn get_config(&self) -> EngineConfig {
        self.config.read().await.clone()
    }

    pub async fn set_feature_flags(&self, flags: FeatureFlags) {
        self.config.write().await.feature_flags = flags;
        tracing::info!("engine feature flags updated at runtime");
    }

    /// Rejects the update unless the weights sum to 1.0 within tolerance.
    pub async fn set_blend_weights(&self, weights: BlendWeights) -> Result<(), EngineError> {
        weights.validate()?;
        self.config.write().await.blend.weights = weights;
        Ok(())
    }

    pub async fn reload_config(&self) {
        let fresh = EngineConfig::from_env();
        *self.config.write().await = fresh;
        tracing::info!("engine config reloaded from environment");
    }

    pub async fn invalidate_cache(&self, user_id: &str) {
        self.profiles.write().await.remove(user_id);
    }

    /// Evicts cached profiles idle longer than `max_age_ms`. The store copy
    /// is untouched.
    pub async fn cleanup_stale_users(&self, max_age_ms: i64) -> usize {
        let now = chrono::Utc::now().timestamp_millis();
        let stale: Vec<String> = {
            let profiles = self.profiles.read().await;
            profiles
                .iter()
                .filter(|(_, p)| now - p.last_updated > max_age_ms)
                .map(|(user_id, _)| user_id.clone())
                .collect()
        };

        if !stale.is_empty() {
            let mut profiles = self.profiles.write().await;
            let mut locks = self.user_locks.write().await;
            for user_id in &stale {
                profiles.remove(user_id);
                locks.remove(user_id);
            }
        }
        stale.len()
    }

    pub async fn cached_profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.user_locks.read().await;
            if let Some(lock) = locks.get(user_id) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.user_locks.write().await;
        Arc::clone(
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    async fn load_or_init(&self, user_id: &str) -> Result<PersistedProfile, EngineError> {
        if let Some(profile) = self.profiles.read().await.get(user_id) {
            return Ok(profile.clone());
        }

        if let Some(profile) = self.store.get_profile(user_id).await? {
            self.profiles
                .write()
                .await
                .insert(user_id.to_string(), profile.clone());
            return Ok(profile);
        }

        tracing::debug!(user_id, "initializing fresh profile");
        Ok(PersistedProfile::new(user_id))
    }

    /// Read-only lookup that never creates a profile.
    async fn peek(&self, user_id: &str) -> Result<Option<PersistedProfile>, EngineError> {
        if let Some(profile) = self.profiles.read().await.get(user_id) {
            return Ok(Some(profile.clone()));
        }
        Ok(self.store.get_profile(user_id).await?)
    }

    /// Bumps the version, saves, and only then refreshes the cache, so a
    /// failed save leaves no trace of the transaction.
    async fn commit(&self, mut profile: PersistedProfile) -> Result<(), EngineError> {
        profile.version += 1;
        if let Err(err) = self.store.save_profile(&profile).await {
            tracing::warn!(user_id = %profile.user_id, error = %err, "profile save failed");
            return Err(err.into());
        }
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
        Ok(())
    }

    fn sequence_input(&self, profile: &PersistedProfile, event: &InteractionEvent) -> SequenceInput {
        let when = chrono::DateTime::from_timestamp_millis(event.timestamp)
            .unwrap_or_else(chrono::Utc::now);

        SequenceInput {
            engagement_history: profile.drift.window.iter().copied().collect(),
            content_features: event.content_features.clone(),
            hour_of_day: when.hour(),
            weekday: when.weekday().num_days_from_monday(),
            device_index: device_index(event.device_type.as_deref()),
            session_position: event
                .session_position
                .map(|p| (p as f64 / 50.0).min(1.0))
                .unwrap_or(0.0),
        }
    }
}

fn device_index(device: Option<&str>) -> usize {
    match device.map(|d| d.to_ascii_lowercase()).as_deref() {
        Some("phone") => 0,
        Some("tablet") => 1,
        Some("desktop") => 2,
        Some("speaker") => 3,
        Some("car") => 4,
        _ => 5,
    }
}

fn mean_signal(signals: &HashMap<String, f64>) -> f64 {
    let finite: Vec<f64> = signals
        .values()
        .copied()
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
        .collect();
    if finite.is_empty() {
        return 0.5;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}
