use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::super::domain::{AwardTier, Criterion};
use super::ScoreCard;

pub const STANDARD_POLICY_VERSION: &str = "cg-2024.1";

/// Minimum criterion score a tier expects before it is considered well supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRequirement {
    pub criterion: Criterion,
    pub minimum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPolicy {
    pub tier: AwardTier,
    pub minimum_total: f64,
    #[serde(default)]
    pub requirements: Vec<TierRequirement>,
}

/// Versioned weight table and tier thresholds. Loaded once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub version: String,
    pub weights: BTreeMap<Criterion, u32>,
    pub tiers: Vec<TierPolicy>,
    #[serde(default)]
    pub operational_device_tiers: Vec<AwardTier>,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read scoring policy {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scoring policy: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("scoring policy version must not be empty")]
    MissingVersion,
    #[error("no weight configured for {}", .0.label())]
    MissingWeight(Criterion),
    #[error("weight for {} must be positive", .0.label())]
    NonPositiveWeight(Criterion),
    #[error("no threshold configured for {0}")]
    MissingTier(AwardTier),
    #[error("{0} may not carry a threshold or appear twice")]
    UnexpectedTier(AwardTier),
    #[error("threshold {value} for {tier} must lie in (0, 100]")]
    ThresholdOutOfRange { tier: AwardTier, value: f64 },
    #[error("threshold for {tier} must exceed the threshold for {previous}")]
    ThresholdOrder {
        tier: AwardTier,
        previous: AwardTier,
    },
    #[error("requirement for {} under {tier} must lie in [0, 10]", .criterion.label())]
    RequirementOutOfRange {
        tier: AwardTier,
        criterion: Criterion,
    },
}

impl ScoringPolicy {
    /// Coast Guard weight table and thresholds.
    pub fn standard() -> Self {
        use AwardTier::*;
        use Criterion::*;

        let weights = BTreeMap::from([
            (MeasurableImpact, 5),
            (Leadership, 5),
            (Innovation, 4),
            (Scope, 5),
            (Challenges, 3),
            (Justification, 3),
        ]);

        let tier = |tier, minimum_total, requirements: &[(Criterion, f64)]| TierPolicy {
            tier,
            minimum_total,
            requirements: requirements
                .iter()
                .map(|(criterion, minimum)| TierRequirement {
                    criterion: *criterion,
                    minimum: *minimum,
                })
                .collect(),
        };

        Self {
            version: STANDARD_POLICY_VERSION.to_string(),
            weights,
            tiers: vec![
                tier(LetterOfCommendation, 40.0, &[(MeasurableImpact, 2.0)]),
                tier(AchievementMedal, 50.0, &[(MeasurableImpact, 4.0), (Scope, 4.0)]),
                tier(
                    CommendationMedal,
                    60.0,
                    &[(Leadership, 5.0), (MeasurableImpact, 5.0), (Scope, 6.0)],
                ),
                tier(
                    MeritoriousServiceMedal,
                    70.0,
                    &[(Leadership, 7.0), (MeasurableImpact, 7.0), (Scope, 8.0)],
                ),
                tier(
                    LegionOfMerit,
                    80.0,
                    &[(Leadership, 8.0), (MeasurableImpact, 8.0), (Scope, 8.0)],
                ),
                tier(
                    DistinguishedServiceMedal,
                    90.0,
                    &[(Leadership, 9.0), (MeasurableImpact, 9.0), (Scope, 9.0)],
                ),
            ],
            operational_device_tiers: vec![
                LetterOfCommendation,
                AchievementMedal,
                CommendationMedal,
                MeritoriousServiceMedal,
                LegionOfMerit,
            ],
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, PolicyError> {
        let mut policy: Self = serde_json::from_str(raw)?;
        policy.tiers.sort_by_key(|tier| tier.tier);
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_path(path: &Path) -> Result<Self, PolicyError> {
        let raw = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.version.trim().is_empty() {
            return Err(PolicyError::MissingVersion);
        }

        for criterion in Criterion::ordered() {
            match self.weights.get(&criterion) {
                None => return Err(PolicyError::MissingWeight(criterion)),
                Some(0) => return Err(PolicyError::NonPositiveWeight(criterion)),
                Some(_) => {}
            }
        }

        let mut previous: Option<&TierPolicy> = None;
        for entry in &self.tiers {
            if entry.tier == AwardTier::NoAward
                || previous.is_some_and(|prior| prior.tier >= entry.tier)
            {
                return Err(PolicyError::UnexpectedTier(entry.tier));
            }
            if !(entry.minimum_total > 0.0 && entry.minimum_total <= 100.0) {
                return Err(PolicyError::ThresholdOutOfRange {
                    tier: entry.tier,
                    value: entry.minimum_total,
                });
            }
            if let Some(prior) = previous {
                if entry.minimum_total <= prior.minimum_total {
                    return Err(PolicyError::ThresholdOrder {
                        tier: entry.tier,
                        previous: prior.tier,
                    });
                }
            }
            if let Some(requirement) = entry
                .requirements
                .iter()
                .find(|requirement| !(0.0..=10.0).contains(&requirement.minimum))
            {
                return Err(PolicyError::RequirementOutOfRange {
                    tier: entry.tier,
                    criterion: requirement.criterion,
                });
            }
            previous = Some(entry);
        }

        for tier in AwardTier::ordered().into_iter().skip(1) {
            if !self.tiers.iter().any(|entry| entry.tier == tier) {
                return Err(PolicyError::MissingTier(tier));
            }
        }

        Ok(())
    }

    pub fn weight(&self, criterion: Criterion) -> u32 {
        self.weights.get(&criterion).copied().unwrap_or_default()
    }

    /// `sum(score * weight) / (sum(weight) * 10) * 100`, one decimal.
    pub fn weighted_total(&self, scores: &BTreeMap<Criterion, f64>) -> f64 {
        let denominator: u32 = Criterion::ordered()
            .into_iter()
            .map(|criterion| self.weight(criterion))
            .sum();
        if denominator == 0 {
            return 0.0;
        }

        let numerator: f64 = Criterion::ordered()
            .into_iter()
            .map(|criterion| {
                scores.get(&criterion).copied().unwrap_or_default()
                    * f64::from(self.weight(criterion))
            })
            .sum();

        round_tenth(numerator / (f64::from(denominator) * 10.0) * 100.0)
    }

    pub fn tier_for_total(&self, total: f64) -> AwardTier {
        self.tiers
            .iter()
            .rev()
            .find(|entry| entry.minimum_total <= total)
            .map(|entry| entry.tier)
            .unwrap_or(AwardTier::NoAward)
    }

    pub fn threshold_for(&self, tier: AwardTier) -> Option<f64> {
        self.tier_policy(tier).map(|entry| entry.minimum_total)
    }

    pub fn next_tier(&self, tier: AwardTier) -> Option<&TierPolicy> {
        self.tiers.iter().find(|entry| entry.tier > tier)
    }

    /// At least two of a tier's requirements (or all, when fewer) must hold.
    pub fn requirements_met(&self, tier: AwardTier, card: &ScoreCard) -> bool {
        let Some(entry) = self.tier_policy(tier) else {
            return true;
        };
        let needed = entry.requirements.len().min(2);
        let satisfied = entry
            .requirements
            .iter()
            .filter(|requirement| card.score(requirement.criterion) >= requirement.minimum)
            .count();
        satisfied >= needed
    }

    /// The tier's requirements the card falls short of, in policy order.
    pub fn unmet_requirements(&self, tier: AwardTier, card: &ScoreCard) -> Vec<&TierRequirement> {
        self.tier_policy(tier)
            .map(|entry| {
                entry
                    .requirements
                    .iter()
                    .filter(|requirement| card.score(requirement.criterion) < requirement.minimum)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn operational_device_authorized(&self, tier: AwardTier) -> bool {
        self.operational_device_tiers.contains(&tier)
    }

    fn tier_policy(&self, tier: AwardTier) -> Option<&TierPolicy> {
        self.tiers.iter().find(|entry| entry.tier == tier)
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
