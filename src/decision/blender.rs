use std::collections::HashSet;

use crate::config::BlendParams;
use crate::error::EngineError;
use crate::types::{
    CandidateItem, ComponentScores, PersistedProfile, RankedItem, DEPTH_BUCKETS, SURPRISE_LEVELS,
};

/// Per-cluster topic-domain affinities for the demographic scorer.
const CLUSTER_DOMAIN_AFFINITY: [&[(&str, f64)]; 4] = [
    &[
        ("technology", 0.9),
        ("science", 0.7),
        ("business", 0.5),
        ("arts", 0.4),
    ],
    &[
        ("business", 0.8),
        ("technology", 0.7),
        ("travel", 0.6),
        ("history", 0.5),
    ],
    &[
        ("science", 0.9),
        ("history", 0.8),
        ("culture", 0.6),
        ("arts", 0.5),
    ],
    &[
        ("travel", 0.8),
        ("nature", 0.8),
        ("culture", 0.7),
        ("history", 0.6),
    ],
];

/// Weighted fusion of four independently-computed per-item scores, with an
/// optional greedy diversity re-rank and a per-item explanation naming the
/// dominant scorer.
pub struct RecommendationBlender {
    params: BlendParams,
}

impl RecommendationBlender {
    /// Rejects the configuration unless the weights sum to 1.0 within 0.01.
    pub fn new(params: BlendParams) -> Result<Self, EngineError> {
        params.weights.validate()?;
        Ok(Self { params })
    }

    pub fn rank(
        &self,
        profile: &PersistedProfile,
        candidates: &[CandidateItem],
        n: usize,
        diversity: bool,
    ) -> Vec<RankedItem> {
        let mut scored: Vec<(f64, ComponentScores, &CandidateItem)> = candidates
            .iter()
            .map(|item| {
                let components = self.component_scores(profile, item);
                (self.blend(&components), components, item)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        if diversity {
            self.apply_diversity(&mut scored);
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        scored
            .into_iter()
            .take(n)
            .map(|(score, components, item)| RankedItem {
                item_id: item.item_id.clone(),
                score,
                component_scores: components,
                explanation: self.explain(&components),
            })
            .collect()
    }

    pub fn component_scores(
        &self,
        profile: &PersistedProfile,
        item: &CandidateItem,
    ) -> ComponentScores {
        ComponentScores {
            collaborative: collaborative_score(item),
            content_based: content_score(profile, item),
            knowledge_based: knowledge_score(profile, item),
            demographic: demographic_score(profile, item),
        }
    }

    fn blend(&self, c: &ComponentScores) -> f64 {
        let w = &self.params.weights;
        w.collaborative * c.collaborative
            + w.content_based * c.content_based
            + w.knowledge_based * c.knowledge_based
            + w.demographic * c.demographic
    }

    /// Walks candidates in score order and boosts each item by the fraction
    /// of its topic tags not yet seen among already-ranked items.
    fn apply_diversity(&self, scored: &mut [(f64, ComponentScores, &CandidateItem)]) {
        let mut seen: HashSet<&str> = HashSet::new();
        for (score, _, item) in scored.iter_mut() {
            let diversity_score = if item.topic_tags.is_empty() {
                0.0
            } else {
                let unseen = item
                    .topic_tags
                    .iter()
                    .filter(|t| !seen.contains(t.as_str()))
                    .count();
                unseen as f64 / item.topic_tags.len() as f64
            };
            *score *= 1.0 + self.params.diversity_boost * diversity_score;
            for tag in &item.topic_tags {
                seen.insert(tag.as_str());
            }
        }
    }

    /// Dominant contributing scorer, plus any secondary scorer whose raw
    /// score clears the threshold.
    fn explain(&self, c: &ComponentScores) -> String {
        let w = &self.params.weights;
        let contributions = [
            ("community favorites", w.collaborative * c.collaborative, c.collaborative),
            ("topic similarity", w.content_based * c.content_based, c.content_based),
            ("depth and novelty fit", w.knowledge_based * c.knowledge_based, c.knowledge_based),
            ("listeners like you", w.demographic * c.demographic, c.demographic),
        ];

        let dominant = contributions
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _, _)| *name)
            .unwrap_or("topic similarity");

        let secondary: Vec<&str> = contributions
            .iter()
            .filter(|(name, _, raw)| *name != dominant && *raw > self.params.secondary_threshold)
            .map(|(name, _, _)| *name)
            .collect();

        if secondary.is_empty() {
            format!("Recommended via {dominant}")
        } else {
            format!("Recommended via {dominant}; also {}", secondary.join(", "))
        }
    }
}

/// Community signal supplied by the candidate metadata; neutral when absent.
fn collaborative_score(item: &CandidateItem) -> f64 {
    item.avg_rating
        .map(|r| r.clamp(0.0, 1.0))
        .unwrap_or_else(|| {
            if item.popularity > 0.0 {
                item.popularity.clamp(0.0, 1.0)
            } else {
                0.5
            }
        })
}

/// Cosine similarity between the item's topic tags and the profile's topic
/// weight vector.
fn content_score(profile: &PersistedProfile, item: &CandidateItem) -> f64 {
    if item.topic_tags.is_empty() || profile.topics.topics.is_empty() {
        return 0.0;
    }

    let dot: f64 = item
        .topic_tags
        .iter()
        .filter_map(|tag| profile.topics.topics.get(tag))
        .map(|pref| pref.weight)
        .sum();

    let user_norm: f64 = profile
        .topics
        .topics
        .values()
        .map(|p| p.weight * p.weight)
        .sum::<f64>()
        .sqrt();
    let item_norm = (item.topic_tags.len() as f64).sqrt();

    if user_norm < 1e-9 || item_norm < 1e-9 {
        return 0.0;
    }
    (dot / (user_norm * item_norm)).clamp(0.0, 1.0)
}

/// Rule-based fit against the stated depth preference and surprise tolerance.
fn knowledge_score(profile: &PersistedProfile, item: &CandidateItem) -> f64 {
    let depth_span = (DEPTH_BUCKETS - 1) as f64;
    let depth_gap =
        (item.depth_level.min(DEPTH_BUCKETS - 1) as f64 - profile.depth.preferred as f64).abs()
            / depth_span;
    let depth_fit = (1.0 - depth_gap) * profile.depth.confidence;

    let surprise_span = (SURPRISE_LEVELS - 1) as f64;
    let surprise_gap = (item.surprise_level.min(SURPRISE_LEVELS - 1) as f64
        - profile.surprise.tolerance as f64)
        .abs()
        / surprise_span;
    let surprise_fit = (1.0 - surprise_gap) * profile.surprise.confidence.clamp(0.0, 1.0);

    (0.5 + 0.3 * depth_fit + 0.2 * surprise_fit).clamp(0.0, 1.0)
}

/// Cluster-affinity score over the item's topic-tag domains.
fn demographic_score(profile: &PersistedProfile, item: &CandidateItem) -> f64 {
    let Some(cluster) = &profile.cold_start.cluster else {
        return 0.5;
    };
    let affinities = CLUSTER_DOMAIN_AFFINITY[cluster.cluster_id.min(3)];
    if item.topic_tags.is_empty() {
        return 0.5;
    }

    let mut total = 0.0;
    for tag in &item.topic_tags {
        let domain = tag.split('.').next().unwrap_or(tag.as_str());
        let affinity = affinities
            .iter()
            .find(|(d, _)| *d == domain)
            .map(|(_, a)| *a)
            .unwrap_or(0.3);
        total += affinity;
    }
    let mean = total / item.topic_tags.len() as f64;
    (0.5 + (mean - 0.5) * cluster.confidence).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlendWeights;
    use crate::types::TopicPreference;

    fn profile_with_topics(pairs: &[(&str, f64)]) -> PersistedProfile {
        let mut profile = PersistedProfile::new("u1");
        for (key, weight) in pairs {
            profile.topics.topics.insert(
                key.to_string(),
                TopicPreference {
                    weight: *weight,
                    confidence: 0.8,
                    interactions: 10,
                },
            );
        }
        profile
    }

    fn item(id: &str, tags: &[&str]) -> CandidateItem {
        CandidateItem {
            item_id: id.to_string(),
            topic_tags: tags.iter().map(|s| s.to_string()).collect(),
            feature_vector: Vec::new(),
            depth_level: 2,
            surprise_level: 2,
            avg_rating: None,
            popularity: 0.0,
        }
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let mut params = BlendParams::default();
        params.weights = BlendWeights {
            collaborative: 0.5,
            content_based: 0.5,
            knowledge_based: 0.5,
            demographic: 0.5,
        };
        assert!(matches!(
            RecommendationBlender::new(params),
            Err(EngineError::InvalidBlendWeights(_))
        ));
    }

    #[test]
    fn weights_within_tolerance_are_accepted() {
        let mut params = BlendParams::default();
        params.weights.collaborative = 0.405; // sum = 1.005
        assert!(RecommendationBlender::new(params).is_ok());
    }

    #[test]
    fn topical_match_ranks_first() {
        let blender = RecommendationBlender::new(BlendParams::default()).unwrap();
        let profile = profile_with_topics(&[("technology.ai_ml", 0.95), ("history.ancient", 0.1)]);

        let candidates = vec![
            item("dull", &["history.ancient"]),
            item("match", &["technology.ai_ml"]),
        ];
        let ranked = blender.rank(&profile, &candidates, 2, false);
        assert_eq!(ranked[0].item_id, "match");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn diversity_never_reduces_distinct_topics_in_top_k() {
        let blender = RecommendationBlender::new(BlendParams::default()).unwrap();
        let profile = profile_with_topics(&[("technology.ai_ml", 0.9)]);

        let mut candidates = vec![
            item("a1", &["technology.ai_ml"]),
            item("a2", &["technology.ai_ml"]),
            item("a3", &["technology.ai_ml"]),
            item("b", &["history.ancient"]),
            item("c", &["nature.wildlife"]),
        ];
        candidates[3].avg_rating = Some(0.6);
        candidates[4].avg_rating = Some(0.6);

        let distinct = |ranked: &[RankedItem], candidates: &[CandidateItem]| {
            let mut topics: HashSet<String> = HashSet::new();
            for r in ranked {
                let cand = candidates.iter().find(|c| c.item_id == r.item_id).unwrap();
                topics.extend(cand.topic_tags.iter().cloned());
            }
            topics.len()
        };

        let plain = blender.rank(&profile, &candidates, 3, false);
        let diverse = blender.rank(&profile, &candidates, 3, true);
        assert!(distinct(&diverse, &candidates) >= distinct(&plain, &candidates));
    }

    #[test]
    fn explanation_names_dominant_scorer() {
        let blender = RecommendationBlender::new(BlendParams::default()).unwrap();
        let profile = profile_with_topics(&[("technology.ai_ml", 1.0)]);
        let ranked = blender.rank(&profile, &[item("x", &["technology.ai_ml"])], 1, false);
        assert!(ranked[0].explanation.contains("Recommended via"));
    }

    #[test]
    fn neutral_scores_for_empty_profile() {
        let blender = RecommendationBlender::new(BlendParams::default()).unwrap();
        let profile = PersistedProfile::new("u1");
        let components = blender.component_scores(&profile, &item("x", &["a"]));
        assert_eq!(components.content_based, 0.0);
        assert_eq!(components.collaborative, 0.5);
        assert_eq!(components.demographic, 0.5);
    }
}
