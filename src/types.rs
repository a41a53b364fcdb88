use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

pub const DEPTH_BUCKETS: usize = 6;
pub const SURPRISE_LEVELS: usize = 6;
pub const ENGAGEMENT_STATES: usize = 4;
pub const OBSERVATION_CHANNELS: usize = 5;
pub const SEQUENCE_INPUT_SIZE: usize = 128;
pub const SEQUENCE_HIDDEN_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum EngagementStateKind {
    #[default]
    Engaged,
    Distracted,
    Bored,
    Overwhelmed,
}

impl EngagementStateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engaged => "engaged",
            Self::Distracted => "distracted",
            Self::Bored => "bored",
            Self::Overwhelmed => "overwhelmed",
        }
    }

    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => Self::Distracted,
            2 => Self::Bored,
            3 => Self::Overwhelmed,
            _ => Self::Engaged,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Engaged => 0,
            Self::Distracted => 1,
            Self::Bored => 2,
            Self::Overwhelmed => 3,
        }
    }
}

/// One playback observation over the five behavioral channels.
/// All channels are normalized to [0,1] by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementObservation {
    pub speed_change_rate: f64,
    pub pause_frequency: f64,
    pub skip_rate: f64,
    pub replay_rate: f64,
    pub completion_fraction: f64,
}

impl Default for EngagementObservation {
    fn default() -> Self {
        Self {
            speed_change_rate: 0.1,
            pause_frequency: 0.1,
            skip_rate: 0.1,
            replay_rate: 0.1,
            completion_fraction: 0.7,
        }
    }
}

impl EngagementObservation {
    pub fn as_array(&self) -> [f64; OBSERVATION_CHANNELS] {
        [
            self.speed_change_rate,
            self.pause_frequency,
            self.skip_rate,
            self.replay_rate,
            self.completion_fraction,
        ]
    }

    /// Scalar engagement score fed to drift detection and the bandit when no
    /// explicit reward accompanies the event.
    pub fn engagement_score(&self) -> f64 {
        let score = 0.5 * self.completion_fraction
            + 0.25 * (1.0 - self.skip_rate)
            + 0.15 * (1.0 - self.pause_frequency)
            + 0.10 * self.replay_rate;
        score.clamp(0.0, 1.0)
    }
}

/// One user interaction as reported by the delivery layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub item_id: Option<String>,
    /// Topic-key -> signal in [0,1]. Out-of-range values are clamped.
    #[serde(default)]
    pub topic_signals: HashMap<String, f64>,
    /// Observed content depth bucket (0-5).
    pub depth_level: Option<usize>,
    /// Satisfaction with the observed depth, in [0,1].
    pub satisfaction: Option<f64>,
    /// Observed surprise level (0-5).
    pub surprise_level: Option<usize>,
    /// Explicit reward in [0,1]; falls back to the engagement score.
    pub reward: Option<f64>,
    #[serde(default)]
    pub observation: EngagementObservation,
    /// Bandit arm credited with this interaction, if any.
    pub arm_id: Option<String>,
    /// Active context keys, e.g. {"timeOfDay": "morning", "locale": "museum"}.
    #[serde(default)]
    pub context: HashMap<String, String>,
    /// Content feature vector for the sequence model (truncated/padded to 64).
    #[serde(default)]
    pub content_features: Vec<f64>,
    pub device_type: Option<String>,
    pub session_position: Option<u32>,
    pub timestamp: i64,
}

impl Default for InteractionEvent {
    fn default() -> Self {
        Self {
            item_id: None,
            topic_signals: HashMap::new(),
            depth_level: None,
            satisfaction: None,
            surprise_level: None,
            reward: None,
            observation: EngagementObservation::default(),
            arm_id: None,
            context: HashMap::new(),
            content_features: Vec::new(),
            device_type: None,
            session_position: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// ============================================
// Profile state
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPreference {
    pub weight: f64,
    pub confidence: f64,
    pub interactions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TopicPreferenceState {
    pub topics: HashMap<String, TopicPreference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthPreferenceState {
    /// Weight vector over the six depth buckets; sums to 1.
    pub weights: [f64; DEPTH_BUCKETS],
    pub alpha: f64,
    pub beta: f64,
    pub preferred: usize,
    pub confidence: f64,
}

impl Default for DepthPreferenceState {
    fn default() -> Self {
        Self {
            weights: [1.0 / DEPTH_BUCKETS as f64; DEPTH_BUCKETS],
            alpha: 1.0,
            beta: 1.0,
            preferred: 2,
            confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurprisePreferenceState {
    pub q_values: [f64; SURPRISE_LEVELS],
    pub exploration_rate: f64,
    pub tolerance: usize,
    pub confidence: f64,
}

impl Default for SurprisePreferenceState {
    fn default() -> Self {
        Self {
            q_values: [0.0; SURPRISE_LEVELS],
            exploration_rate: 0.3,
            tolerance: 2,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DriftDetectionState {
    pub window: VecDeque<f64>,
    pub running_mean: f64,
    pub drift_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationState {
    pub learning_rate: f64,
    pub update_count: u64,
}

impl Default for AdaptationState {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            update_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub state: EngagementStateKind,
    /// Winning probability at inference time.
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementModelState {
    pub probs: [f64; ENGAGEMENT_STATES],
    pub transition: [[f64; ENGAGEMENT_STATES]; ENGAGEMENT_STATES],
    pub emission: [[f64; OBSERVATION_CHANNELS]; ENGAGEMENT_STATES],
    pub observations: VecDeque<[f64; OBSERVATION_CHANNELS]>,
    pub states: VecDeque<StateRecord>,
}

impl Default for EngagementModelState {
    fn default() -> Self {
        Self {
            probs: [1.0 / ENGAGEMENT_STATES as f64; ENGAGEMENT_STATES],
            transition: default_transition_matrix(),
            emission: default_emission_matrix(),
            observations: VecDeque::new(),
            states: VecDeque::new(),
        }
    }
}

/// Row = from-state, column = to-state. Rows sum to 1.
pub fn default_transition_matrix() -> [[f64; ENGAGEMENT_STATES]; ENGAGEMENT_STATES] {
    [
        // engaged: sticky, occasional slips into distraction
        [0.82, 0.08, 0.05, 0.05],
        // distracted: often recovers
        [0.25, 0.55, 0.12, 0.08],
        // bored
        [0.15, 0.15, 0.60, 0.10],
        // overwhelmed
        [0.12, 0.18, 0.10, 0.60],
    ]
}

/// Row = state, column = expected channel value
/// (speed changes, pauses, skips, replays, completion).
pub fn default_emission_matrix() -> [[f64; OBSERVATION_CHANNELS]; ENGAGEMENT_STATES] {
    [
        [0.10, 0.10, 0.05, 0.30, 0.90], // engaged
        [0.30, 0.60, 0.40, 0.10, 0.50], // distracted
        [0.50, 0.30, 0.80, 0.05, 0.30], // bored
        [0.70, 0.70, 0.50, 0.40, 0.20], // overwhelmed
    ]
}

/// The four scores produced per prediction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SequenceScores {
    pub engagement_probability: f64,
    pub completion_likelihood: f64,
    pub preference_strength: f64,
    pub churn_risk: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceModelState {
    pub hidden: Vec<f64>,
    pub cell: Vec<f64>,
    pub predictions: VecDeque<SequenceScores>,
    pub training_iterations: u64,
    pub accuracy: f64,
}

impl Default for SequenceModelState {
    fn default() -> Self {
        Self {
            hidden: vec![0.0; SEQUENCE_HIDDEN_SIZE],
            cell: vec![0.0; SEQUENCE_HIDDEN_SIZE],
            predictions: VecDeque::new(),
            training_iterations: 0,
            accuracy: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArmStats {
    pub pulls: u64,
    pub reward_sum: f64,
}

impl ArmStats {
    pub fn mean(&self) -> f64 {
        if self.pulls == 0 {
            0.0
        } else {
            self.reward_sum / self.pulls as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRecord {
    pub arm_id: String,
    pub reward: f64,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BanditState {
    pub arms: HashMap<String, ArmStats>,
    /// Keyed by "contextType:contextValue".
    pub contexts: HashMap<String, ArmStats>,
    pub total_pulls: u64,
    pub regret: f64,
    pub history: VecDeque<PullRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAssignment {
    pub cluster_id: usize,
    pub confidence: f64,
}

/// Answer to a single questionnaire question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
}

impl AnswerValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdStartState {
    pub exploration_rate: f64,
    pub responses: HashMap<String, HashMap<String, AnswerValue>>,
    pub next_section: usize,
    pub completed: bool,
    pub cluster: Option<ClusterAssignment>,
}

impl Default for ColdStartState {
    fn default() -> Self {
        Self {
            exploration_rate: 0.5,
            responses: HashMap::new(),
            next_section: 0,
            completed: false,
            cluster: None,
        }
    }
}

/// Everything the store persists for one user. `version` increases by one on
/// every committed interaction and backs the store's optimistic write check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProfile {
    pub user_id: String,
    pub version: u64,
    pub topics: TopicPreferenceState,
    pub depth: DepthPreferenceState,
    pub surprise: SurprisePreferenceState,
    pub drift: DriftDetectionState,
    pub adaptation: AdaptationState,
    pub engagement: EngagementModelState,
    pub sequence: SequenceModelState,
    pub bandit: BanditState,
    pub cold_start: ColdStartState,
    pub interaction_count: u64,
    pub last_updated: i64,
}

impl PersistedProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            version: 0,
            topics: TopicPreferenceState::default(),
            depth: DepthPreferenceState::default(),
            surprise: SurprisePreferenceState::default(),
            drift: DriftDetectionState::default(),
            adaptation: AdaptationState::default(),
            engagement: EngagementModelState::default(),
            sequence: SequenceModelState::default(),
            bandit: BanditState::default(),
            cold_start: ColdStartState::default(),
            interaction_count: 0,
            last_updated: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// ============================================
// Interaction outcome
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceUpdates {
    pub topics_updated: Vec<String>,
    pub preferred_depth: usize,
    pub depth_confidence: f64,
    pub surprise_tolerance: usize,
    pub surprise_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementSummary {
    pub state: EngagementStateKind,
    pub distribution: [f64; ENGAGEMENT_STATES],
    /// Normalized per-channel weights describing which observation channels
    /// drove the inferred state.
    pub attention_weights: [f64; OBSERVATION_CHANNELS],
    /// Rolling mean of the winning probability over recent predictions.
    /// A confidence proxy, not ground-truth accuracy.
    pub accuracy: f64,
}

impl Default for EngagementSummary {
    fn default() -> Self {
        Self {
            state: EngagementStateKind::Engaged,
            distribution: [1.0 / ENGAGEMENT_STATES as f64; ENGAGEMENT_STATES],
            attention_weights: [1.0 / OBSERVATION_CHANNELS as f64; OBSERVATION_CHANNELS],
            accuracy: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationUpdate {
    pub bandit_exploration_rate: f64,
    pub cold_start_exploration_rate: f64,
    pub total_pulls: u64,
    pub regret: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionOutcome {
    pub preference_updates: PreferenceUpdates,
    pub drift_detected: bool,
    pub learning_rate: f64,
    pub engagement: EngagementSummary,
    pub predictions: SequenceScores,
    pub exploration: ExplorationUpdate,
}

// ============================================
// Recommendation types
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateItem {
    pub item_id: String,
    #[serde(default)]
    pub topic_tags: Vec<String>,
    #[serde(default)]
    pub feature_vector: Vec<f64>,
    /// Depth bucket 0-5.
    #[serde(default = "default_depth_level")]
    pub depth_level: usize,
    /// Surprise level 0-5.
    #[serde(default = "default_surprise_level")]
    pub surprise_level: usize,
    /// Community signal in [0,1]; neutral when absent.
    pub avg_rating: Option<f64>,
    #[serde(default)]
    pub popularity: f64,
}

fn default_depth_level() -> usize {
    2
}

fn default_surprise_level() -> usize {
    2
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentScores {
    pub collaborative: f64,
    pub content_based: f64,
    pub knowledge_based: f64,
    pub demographic: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedItem {
    pub item_id: String,
    pub score: f64,
    pub component_scores: ComponentScores,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickKind {
    Explore,
    Exploit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationPick {
    pub item_id: String,
    pub kind: PickKind,
}

// ============================================
// Onboarding types
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// 1-5 interest rating.
    Rating,
    /// Single choice from `options`.
    Choice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireSection {
    pub id: String,
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingSummary {
    pub seeded_topics: usize,
    pub preferred_depth: usize,
    pub surprise_tolerance: usize,
    pub cluster: Option<ClusterAssignment>,
    pub exploration_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "step")]
pub enum OnboardingStep {
    Section(QuestionnaireSection),
    Complete(OnboardingSummary),
}
