use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::ColdStartParams;
use crate::error::EngineError;
use crate::modeling::TopicTracker;
use crate::types::{
    AnswerValue, ClusterAssignment, ColdStartState, ExplorationPick, OnboardingStep,
    OnboardingSummary, PersistedProfile, PickKind, Question, QuestionKind, QuestionnaireSection,
    DEPTH_BUCKETS, SURPRISE_LEVELS,
};

/// Topic domains offered during onboarding, with the subtopic keys each
/// domain seeds.
const TOPIC_DOMAINS: &[(&str, &[&str])] = &[
    ("technology", &["ai_ml", "gadgets", "programming"]),
    ("history", &["ancient", "modern"]),
    ("science", &["space", "biology", "physics"]),
    ("culture", &["food", "traditions"]),
    ("travel", &["landmarks", "hidden_gems"]),
    ("arts", &["music", "visual_arts"]),
    ("nature", &["wildlife", "landscapes"]),
    ("business", &["startups", "economics"]),
];

const DEPTH_OPTIONS: &[&str] = &[
    "overview",
    "introductory",
    "balanced",
    "detailed",
    "in_depth",
    "expert",
];

const SURPRISE_OPTIONS: &[&str] = &[
    "very_familiar",
    "mostly_familiar",
    "balanced",
    "some_surprises",
    "adventurous",
    "maximum_novelty",
];

const AGE_OPTIONS: &[&str] = &["under_18", "18_24", "25_34", "35_49", "50_64", "65_plus"];
const EDUCATION_OPTIONS: &[&str] = &["secondary", "bachelor", "master", "doctorate"];
const OCCUPATION_OPTIONS: &[&str] = &[
    "student",
    "engineering",
    "science",
    "humanities",
    "business",
    "other",
];

const DEMOGRAPHIC_DIM: usize = 16; // 6 age + 4 education + 6 occupation

/// Hand-tuned cluster centroids over the one-hot demographic space.
const CLUSTER_CENTROIDS: [[f64; DEMOGRAPHIC_DIM]; 4] = [
    // early-career tech-leaning
    [
        0.1, 0.6, 0.3, 0.0, 0.0, 0.0, // age
        0.1, 0.7, 0.2, 0.0, // education
        0.5, 0.4, 0.05, 0.0, 0.05, 0.0, // occupation
    ],
    // working professionals
    [
        0.0, 0.1, 0.5, 0.4, 0.0, 0.0, //
        0.0, 0.4, 0.5, 0.1, //
        0.0, 0.4, 0.05, 0.05, 0.5, 0.0,
    ],
    // academic / research
    [
        0.0, 0.1, 0.4, 0.4, 0.1, 0.0, //
        0.0, 0.1, 0.3, 0.6, //
        0.1, 0.1, 0.5, 0.3, 0.0, 0.0,
    ],
    // leisure listeners
    [
        0.0, 0.0, 0.0, 0.2, 0.4, 0.4, //
        0.5, 0.4, 0.1, 0.0, //
        0.0, 0.05, 0.05, 0.1, 0.1, 0.7,
    ],
];

const SECTION_TOPICS: &str = "topics";
const SECTION_DEPTH: &str = "depth";
const SECTION_SURPRISE: &str = "surprise";
const SECTION_PROFILE: &str = "profile";

const SECTION_ORDER: &[&str] = &[
    SECTION_TOPICS,
    SECTION_DEPTH,
    SECTION_SURPRISE,
    SECTION_PROFILE,
];

/// Questionnaire-driven bootstrap for brand-new users, plus epsilon-greedy
/// exploration picks while the profile is still thin.
pub struct ColdStartController {
    params: ColdStartParams,
}

impl ColdStartController {
    pub fn new(params: ColdStartParams) -> Self {
        Self { params }
    }

    pub fn questionnaire() -> Vec<QuestionnaireSection> {
        vec![
            QuestionnaireSection {
                id: SECTION_TOPICS.to_string(),
                title: "What would you like to hear about?".to_string(),
                questions: TOPIC_DOMAINS
                    .iter()
                    .map(|(domain, _)| Question {
                        id: domain.to_string(),
                        text: format!("How interested are you in {domain}? (1-5)"),
                        kind: QuestionKind::Rating,
                        options: Vec::new(),
                    })
                    .collect(),
            },
            QuestionnaireSection {
                id: SECTION_DEPTH.to_string(),
                title: "How deep should the content go?".to_string(),
                questions: vec![Question {
                    id: "preferred_depth".to_string(),
                    text: "Pick the level of detail you enjoy most".to_string(),
                    kind: QuestionKind::Choice,
                    options: DEPTH_OPTIONS.iter().map(|s| s.to_string()).collect(),
                }],
            },
            QuestionnaireSection {
                id: SECTION_SURPRISE.to_string(),
                title: "How adventurous should we be?".to_string(),
                questions: vec![Question {
                    id: "surprise_openness".to_string(),
                    text: "How open are you to unfamiliar content?".to_string(),
                    kind: QuestionKind::Choice,
                    options: SURPRISE_OPTIONS.iter().map(|s| s.to_string()).collect(),
                }],
            },
            QuestionnaireSection {
                id: SECTION_PROFILE.to_string(),
                title: "A little about you (optional)".to_string(),
                questions: vec![
                    Question {
                        id: "age_range".to_string(),
                        text: "Your age range".to_string(),
                        kind: QuestionKind::Choice,
                        options: AGE_OPTIONS.iter().map(|s| s.to_string()).collect(),
                    },
                    Question {
                        id: "education".to_string(),
                        text: "Your education level".to_string(),
                        kind: QuestionKind::Choice,
                        options: EDUCATION_OPTIONS.iter().map(|s| s.to_string()).collect(),
                    },
                    Question {
                        id: "occupation".to_string(),
                        text: "Your field of work".to_string(),
                        kind: QuestionKind::Choice,
                        options: OCCUPATION_OPTIONS.iter().map(|s| s.to_string()).collect(),
                    },
                ],
            },
        ]
    }

    /// Restarts onboarding and returns the first section.
    pub fn start(&self, state: &mut ColdStartState) -> QuestionnaireSection {
        state.next_section = 0;
        state.completed = false;
        Self::questionnaire()
            .into_iter()
            .next()
            .expect("questionnaire has at least one section")
    }

    /// Applies one section's answers to the profile and advances onboarding.
    pub fn submit(
        &self,
        profile: &mut PersistedProfile,
        topic_tracker: &TopicTracker,
        section_id: &str,
        answers: &HashMap<String, AnswerValue>,
    ) -> Result<OnboardingStep, EngineError> {
        if profile.cold_start.completed {
            return Err(EngineError::OnboardingComplete);
        }

        let position = SECTION_ORDER
            .iter()
            .position(|s| *s == section_id)
            .ok_or_else(|| EngineError::UnknownSection(section_id.to_string()))?;
        if position != profile.cold_start.next_section {
            return Err(EngineError::SectionOutOfOrder {
                submitted: section_id.to_string(),
                expected: SECTION_ORDER
                    .get(profile.cold_start.next_section)
                    .unwrap_or(&SECTION_PROFILE)
                    .to_string(),
            });
        }

        match section_id {
            SECTION_TOPICS => self.seed_topics(profile, topic_tracker, answers),
            SECTION_DEPTH => self.seed_depth(profile, answers),
            SECTION_SURPRISE => self.seed_surprise(profile, answers),
            SECTION_PROFILE => self.assign_cluster(profile, answers),
            _ => unreachable!("section id validated above"),
        }

        profile
            .cold_start
            .responses
            .insert(section_id.to_string(), answers.clone());
        profile.cold_start.next_section += 1;

        if profile.cold_start.next_section >= SECTION_ORDER.len() {
            profile.cold_start.completed = true;
            profile.cold_start.exploration_rate = self.params.initial_exploration;
            tracing::info!(user_id = %profile.user_id, "onboarding complete");
            return Ok(OnboardingStep::Complete(OnboardingSummary {
                seeded_topics: profile.topics.topics.len(),
                preferred_depth: profile.depth.preferred,
                surprise_tolerance: profile.surprise.tolerance,
                cluster: profile.cold_start.cluster.clone(),
                exploration_rate: profile.cold_start.exploration_rate,
            }));
        }

        let next = Self::questionnaire()
            .into_iter()
            .nth(profile.cold_start.next_section)
            .expect("next_section bounded by section count");
        Ok(OnboardingStep::Section(next))
    }

    fn seed_topics(
        &self,
        profile: &mut PersistedProfile,
        topic_tracker: &TopicTracker,
        answers: &HashMap<String, AnswerValue>,
    ) {
        let mut signals = HashMap::new();
        for (domain, subtopics) in TOPIC_DOMAINS {
            let Some(rating) = answers.get(*domain).and_then(AnswerValue::as_number) else {
                continue;
            };
            let signal = (rating / 5.0).clamp(0.0, 1.0);
            for sub in *subtopics {
                signals.insert(format!("{domain}.{sub}"), signal);
            }
        }
        topic_tracker.update(&mut profile.topics, &signals, self.params.seed_rate);
    }

    fn seed_depth(&self, profile: &mut PersistedProfile, answers: &HashMap<String, AnswerValue>) {
        let Some(bucket) = answers
            .get("preferred_depth")
            .and_then(|a| option_index(a, DEPTH_OPTIONS))
        else {
            return;
        };
        let bucket = bucket.min(DEPTH_BUCKETS - 1);

        // strong prior on the stated bucket, uniform mass elsewhere
        let mut weights = [0.1; DEPTH_BUCKETS];
        weights[bucket] = 0.5;
        profile.depth.weights = weights;
        profile.depth.preferred = bucket;
    }

    fn seed_surprise(
        &self,
        profile: &mut PersistedProfile,
        answers: &HashMap<String, AnswerValue>,
    ) {
        let Some(level) = answers
            .get("surprise_openness")
            .and_then(|a| option_index(a, SURPRISE_OPTIONS))
        else {
            return;
        };
        let level = level.min(SURPRISE_LEVELS - 1);
        profile.surprise.q_values[level] = 0.5;
        profile.surprise.tolerance = level;
    }

    fn assign_cluster(
        &self,
        profile: &mut PersistedProfile,
        answers: &HashMap<String, AnswerValue>,
    ) {
        let mut features = [0.0; DEMOGRAPHIC_DIM];
        let mut answered = false;

        if let Some(idx) = answers
            .get("age_range")
            .and_then(|a| option_index(a, AGE_OPTIONS))
        {
            features[idx] = 1.0;
            answered = true;
        }
        if let Some(idx) = answers
            .get("education")
            .and_then(|a| option_index(a, EDUCATION_OPTIONS))
        {
            features[6 + idx] = 1.0;
            answered = true;
        }
        if let Some(idx) = answers
            .get("occupation")
            .and_then(|a| option_index(a, OCCUPATION_OPTIONS))
        {
            features[10 + idx] = 1.0;
            answered = true;
        }

        if !answered {
            return;
        }

        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, centroid) in CLUSTER_CENTROIDS.iter().enumerate() {
            let dist = euclidean(&features, centroid);
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }

        profile.cold_start.cluster = Some(ClusterAssignment {
            cluster_id: best,
            confidence: 1.0 / (1.0 + best_dist),
        });
    }

    /// Splits `n` picks into uniform-random explore picks and the remainder
    /// of exploit picks. Exploit picks are currently also uniform-random
    /// pending a real ranking signal. Decays epsilon after each call.
    pub fn exploration_picks<R: Rng>(
        &self,
        state: &mut ColdStartState,
        candidates: &[String],
        n: usize,
        rng: &mut R,
    ) -> Vec<ExplorationPick> {
        let n = n.min(candidates.len());
        if n == 0 {
            return Vec::new();
        }

        let n_explore = ((n as f64) * state.exploration_rate).floor() as usize;

        let mut pool: Vec<&String> = candidates.iter().collect();
        pool.shuffle(rng);

        let picks = pool
            .into_iter()
            .take(n)
            .enumerate()
            .map(|(i, item_id)| ExplorationPick {
                item_id: item_id.clone(),
                kind: if i < n_explore {
                    PickKind::Explore
                } else {
                    PickKind::Exploit
                },
            })
            .collect();

        state.exploration_rate = (state.exploration_rate * self.params.exploration_decay)
            .max(self.params.min_exploration);

        picks
    }
}

impl Default for ColdStartController {
    fn default() -> Self {
        Self::new(ColdStartParams::default())
    }
}

fn option_index(answer: &AnswerValue, options: &[&str]) -> Option<usize> {
    match answer {
        AnswerValue::Number(n) => {
            let idx = n.round() as i64 - 1;
            if (0..options.len() as i64).contains(&idx) {
                Some(idx as usize)
            } else {
                None
            }
        }
        AnswerValue::Text(s) => options.iter().position(|o| o.eq_ignore_ascii_case(s)),
    }
}

fn euclidean(a: &[f64; DEMOGRAPHIC_DIM], b: &[f64; DEMOGRAPHIC_DIM]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
