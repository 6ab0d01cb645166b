mod policy;
mod rules;

pub use policy::{
    PolicyError, ScoringPolicy, TierPolicy, TierRequirement, STANDARD_POLICY_VERSION,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{AwardTier, AwardeeInfo, Criterion};

/// Per-criterion scores with the weighted total derived from them.
///
/// Only [`ScoreCard::from_scores`] builds a card, so the total always matches the
/// criterion scores under the policy that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    criteria: BTreeMap<Criterion, f64>,
    total_weighted: f64,
}

impl ScoreCard {
    /// Clamps each score into `[0, 10]`, fills absent criteria with zero and
    /// recomputes the total.
    pub fn from_scores(scores: BTreeMap<Criterion, f64>, policy: &ScoringPolicy) -> Self {
        let criteria: BTreeMap<Criterion, f64> = Criterion::ordered()
            .into_iter()
            .map(|criterion| {
                let raw = scores.get(&criterion).copied().unwrap_or_default();
                (criterion, rules::clamp_score(raw))
            })
            .collect();
        let total_weighted = policy.weighted_total(&criteria);
        Self {
            criteria,
            total_weighted,
        }
    }

    /// Returns a new card with one score replaced and the total recomputed.
    pub fn with_score(&self, criterion: Criterion, score: f64, policy: &ScoringPolicy) -> Self {
        let mut scores = self.criteria.clone();
        scores.insert(criterion, score);
        Self::from_scores(scores, policy)
    }

    pub fn score(&self, criterion: Criterion) -> f64 {
        self.criteria.get(&criterion).copied().unwrap_or_default()
    }

    pub fn total_weighted(&self) -> f64 {
        self.total_weighted
    }

    /// Scores in the fixed criterion order.
    pub fn iter(&self) -> impl Iterator<Item = (Criterion, f64)> + '_ {
        Criterion::ordered()
            .into_iter()
            .map(|criterion| (criterion, self.score(criterion)))
    }

    pub fn all_at_maximum(&self) -> bool {
        self.iter().all(|(_, score)| score >= 10.0)
    }
}

/// Outcome of one scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub scores: ScoreCard,
    pub tier: AwardTier,
    pub requirements_met: bool,
    pub operational_device: bool,
    pub policy_version: String,
}

/// Stateless scorer applying the active [`ScoringPolicy`] to a narrative.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    policy: Arc<ScoringPolicy>,
}

impl ScoringEngine {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn score(&self, narrative: &str, awardee: &AwardeeInfo) -> Assessment {
        let scores = ScoreCard::from_scores(rules::score_narrative(narrative), &self.policy);
        let tier = self.policy.tier_for_total(scores.total_weighted());
        let requirements_met = self.policy.requirements_met(tier, &scores);
        let operational_device =
            awardee.operational_device && self.policy.operational_device_authorized(tier);

        tracing::debug!(
            policy = %self.policy.version,
            total = scores.total_weighted(),
            tier = tier.abbreviation(),
            requirements_met,
            "narrative scored"
        );

        Assessment {
            scores,
            tier,
            requirements_met,
            operational_device,
            policy_version: self.policy.version.clone(),
        }
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringPolicy::standard())
    }
}
