use std::collections::HashMap;

use crate::config::BanditParams;
use crate::types::{ArmStats, BanditState, PullRecord};

/// UCB1 arm selector with multiplicative contextual reweighting.
///
/// An arm with zero pulls always wins over any finite-UCB arm (forced
/// exploration). Selection is deterministic given state; the reported
/// exploration rate is informational only.
pub struct BanditSelector {
    params: BanditParams,
}

#[derive(Debug, Clone)]
pub struct ArmScore {
    pub arm_id: String,
    pub score: f64,
    pub forced: bool,
}

impl BanditSelector {
    pub fn new(params: BanditParams) -> Self {
        Self { params }
    }

    /// Scores every candidate arm and returns the argmax. Unseen arms score
    /// infinite and win in candidate order.
    pub fn select(
        &self,
        state: &BanditState,
        candidates: &[String],
        context: &HashMap<String, String>,
    ) -> Option<ArmScore> {
        let mut best: Option<ArmScore> = None;
        for arm_id in candidates {
            let scored = self.score_arm(state, arm_id, context);
            let replace = match &best {
                None => true,
                Some(current) => scored.score > current.score,
            };
            if replace {
                best = Some(scored);
            }
        }
        best
    }

    pub fn score_arm(
        &self,
        state: &BanditState,
        arm_id: &str,
        context: &HashMap<String, String>,
    ) -> ArmScore {
        let Some(stats) = state.arms.get(arm_id).filter(|s| s.pulls > 0) else {
            return ArmScore {
                arm_id: arm_id.to_string(),
                score: f64::INFINITY,
                forced: true,
            };
        };

        let bonus = self.params.exploration_constant
            * ((state.total_pulls as f64 + 1.0).ln() / stats.pulls as f64).sqrt();
        let mut score = stats.mean() + bonus;

        for (ctx_type, ctx_value) in context {
            let key = context_key(ctx_type, ctx_value);
            if let Some(ctx_stats) = state.contexts.get(&key) {
                if ctx_stats.pulls > 0 {
                    score *= 1.0 + (ctx_stats.mean() - 0.5) * self.params.context_weight;
                }
            }
        }

        ArmScore {
            arm_id: arm_id.to_string(),
            score,
            forced: false,
        }
    }

    /// Credits a reward to an arm and the active contexts, then refreshes the
    /// regret estimate.
    pub fn update(
        &self,
        state: &mut BanditState,
        arm_id: &str,
        reward: f64,
        context: &HashMap<String, String>,
    ) {
        let reward = if reward.is_finite() {
            reward.clamp(0.0, 1.0)
        } else {
            tracing::warn!(arm = %arm_id, value = reward, "non-finite bandit reward, using 0.5");
            0.5
        };

        let stats = state.arms.entry(arm_id.to_string()).or_default();
        stats.pulls += 1;
        stats.reward_sum += reward;
        state.total_pulls += 1;

        for (ctx_type, ctx_value) in context {
            let ctx = state
                .contexts
                .entry(context_key(ctx_type, ctx_value))
                .or_insert_with(ArmStats::default);
            ctx.pulls += 1;
            ctx.reward_sum += reward;
        }

        state.history.push_back(PullRecord {
            arm_id: arm_id.to_string(),
            reward,
            ts: chrono::Utc::now().timestamp_millis(),
        });
        if state.history.len() > self.params.max_history {
            state.history.pop_front();
        }

        state.regret = self.estimate_regret(state);
    }

    /// Cumulative gap between the best arm's mean and the overall mean,
    /// clamped at zero.
    fn estimate_regret(&self, state: &BanditState) -> f64 {
        if state.total_pulls == 0 {
            return 0.0;
        }
        let best_mean = state
            .arms
            .values()
            .map(ArmStats::mean)
            .fold(f64::NEG_INFINITY, f64::max);
        let overall_reward: f64 = state.arms.values().map(|s| s.reward_sum).sum();
        let overall_mean = overall_reward / state.total_pulls as f64;
        ((best_mean - overall_mean) * state.total_pulls as f64).max(0.0)
    }

    /// Informational exploration rate; selection itself is deterministic.
    pub fn exploration_rate(&self, state: &BanditState) -> f64 {
        let decayed = self.params.reported_exploration_base
            * (-self.params.reported_exploration_decay * state.total_pulls as f64 / 100.0).exp();
        decayed.max(self.params.reported_exploration_floor)
    }
}

impl Default for BanditSelector {
    fn default() -> Self {
        Self::new(BanditParams::default())
    }
}

fn context_key(ctx_type: &str, ctx_value: &str) -> String {
    format!("{ctx_type}:{ctx_value}")
}
