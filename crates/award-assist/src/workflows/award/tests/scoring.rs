use std::collections::BTreeMap;

use super::common::{awardee, SCENARIO_NARRATIVE, STRONG_NARRATIVE};
use crate::workflows::award::advisor;
use crate::workflows::award::domain::{AwardTier, AwardeeInfo, Criterion};
use crate::workflows::award::explanation;
use crate::workflows::award::scoring::{
    Assessment, PolicyError, ScoreCard, ScoringEngine, ScoringPolicy,
};

fn card(score: f64) -> ScoreCard {
    let scores = Criterion::ordered()
        .into_iter()
        .map(|criterion| (criterion, score))
        .collect();
    ScoreCard::from_scores(scores, &ScoringPolicy::standard())
}

#[test]
fn scenario_scores_every_criterion_within_bounds() {
    let engine = ScoringEngine::default();
    let assessment = engine.score(SCENARIO_NARRATIVE, &AwardeeInfo::default());

    assert_eq!(assessment.scores.iter().count(), 6);
    for (criterion, score) in assessment.scores.iter() {
        assert!(
            (0.0..=10.0).contains(&score),
            "{} out of range: {score}",
            criterion.label()
        );
    }
    let total = assessment.scores.total_weighted();
    assert!((0.0..=100.0).contains(&total));
    assert!(assessment.scores.score(Criterion::Leadership) > 0.0);
    assert!(assessment.scores.score(Criterion::MeasurableImpact) > 0.0);
    assert_eq!(assessment.policy_version, "cg-2024.1");
}

#[test]
fn scoring_is_deterministic() {
    let engine = ScoringEngine::default();
    let first = engine.score(STRONG_NARRATIVE, &awardee());
    let second = engine.score(STRONG_NARRATIVE, &awardee());
    assert_eq!(first, second);
}

#[test]
fn strong_narrative_earns_an_award() {
    let engine = ScoringEngine::default();
    let assessment = engine.score(STRONG_NARRATIVE, &awardee());
    assert!(assessment.tier >= AwardTier::LetterOfCommendation);
    assert!(assessment.scores.total_weighted() >= 40.0);
}

#[test]
fn empty_narrative_scores_zero() {
    let engine = ScoringEngine::default();
    let assessment = engine.score("", &AwardeeInfo::default());
    assert_eq!(assessment.scores.total_weighted(), 0.0);
    assert_eq!(assessment.tier, AwardTier::NoAward);
}

#[test]
fn raising_one_criterion_never_lowers_the_total() {
    let policy = ScoringPolicy::standard();
    let base = card(3.0);
    for criterion in Criterion::ordered() {
        let raised = base.with_score(criterion, 7.5, &policy);
        assert!(raised.total_weighted() > base.total_weighted());
        let lowered = base.with_score(criterion, 1.0, &policy);
        assert!(lowered.total_weighted() < base.total_weighted());
    }
}

#[test]
fn scores_are_clamped_and_missing_criteria_default_to_zero() {
    let policy = ScoringPolicy::standard();
    let card = ScoreCard::from_scores(
        BTreeMap::from([(Criterion::Leadership, 14.0), (Criterion::Scope, -2.0)]),
        &policy,
    );
    assert_eq!(card.score(Criterion::Leadership), 10.0);
    assert_eq!(card.score(Criterion::Scope), 0.0);
    assert_eq!(card.score(Criterion::Innovation), 0.0);
}

#[test]
fn full_marks_total_one_hundred() {
    let full = card(10.0);
    assert_eq!(full.total_weighted(), 100.0);
    assert!(full.all_at_maximum());
    assert_eq!(
        ScoringPolicy::standard().tier_for_total(full.total_weighted()),
        AwardTier::DistinguishedServiceMedal
    );
}

#[test]
fn every_total_maps_to_exactly_one_tier() {
    let policy = ScoringPolicy::standard();
    let mut previous = AwardTier::NoAward;
    for step in 0..=1000 {
        let total = f64::from(step) / 10.0;
        let tier = policy.tier_for_total(total);
        assert!(tier >= previous, "tiers must not drop as totals rise");
        previous = tier;
    }
    assert_eq!(policy.tier_for_total(39.9), AwardTier::NoAward);
    assert_eq!(policy.tier_for_total(40.0), AwardTier::LetterOfCommendation);
    assert_eq!(policy.tier_for_total(59.9), AwardTier::AchievementMedal);
    assert_eq!(policy.tier_for_total(60.0), AwardTier::CommendationMedal);
    assert_eq!(policy.tier_for_total(89.9), AwardTier::LegionOfMerit);
    assert_eq!(policy.tier_for_total(90.0), AwardTier::DistinguishedServiceMedal);
}

#[test]
fn requirements_are_checked_against_the_tier_table() {
    let policy = ScoringPolicy::standard();
    let strong = card(9.0);
    assert!(policy.requirements_met(AwardTier::DistinguishedServiceMedal, &strong));

    let thin_scope = strong.with_score(Criterion::Scope, 2.0, &policy);
    let thin_leadership = thin_scope.with_score(Criterion::Leadership, 2.0, &policy);
    assert!(!policy.requirements_met(AwardTier::DistinguishedServiceMedal, &thin_leadership));
    assert!(policy.requirements_met(AwardTier::NoAward, &card(0.0)));
}

#[test]
fn operational_device_excludes_the_top_and_bottom_tiers() {
    let policy = ScoringPolicy::standard();
    assert!(policy.operational_device_authorized(AwardTier::CommendationMedal));
    assert!(!policy.operational_device_authorized(AwardTier::DistinguishedServiceMedal));
    assert!(!policy.operational_device_authorized(AwardTier::NoAward));
}

#[test]
fn policy_json_round_trips_and_sorts_tiers() {
    let mut policy = ScoringPolicy::standard();
    policy.version = "local-test".to_string();
    policy.tiers.reverse();
    let raw = serde_json::to_string(&policy).expect("serialize policy");

    let loaded = ScoringPolicy::from_json(&raw).expect("policy loads");
    assert_eq!(loaded.version, "local-test");
    assert_eq!(
        loaded.tiers.first().map(|tier| tier.tier),
        Some(AwardTier::LetterOfCommendation)
    );
}

#[test]
fn policy_validation_rejects_bad_tables() {
    let mut unversioned = ScoringPolicy::standard();
    unversioned.version = "  ".to_string();
    assert!(matches!(
        unversioned.validate(),
        Err(PolicyError::MissingVersion)
    ));

    let mut zero_weight = ScoringPolicy::standard();
    zero_weight.weights.insert(Criterion::Innovation, 0);
    assert!(matches!(
        zero_weight.validate(),
        Err(PolicyError::NonPositiveWeight(Criterion::Innovation))
    ));

    let mut missing_weight = ScoringPolicy::standard();
    missing_weight.weights.remove(&Criterion::Scope);
    assert!(matches!(
        missing_weight.validate(),
        Err(PolicyError::MissingWeight(Criterion::Scope))
    ));

    let mut unordered = ScoringPolicy::standard();
    unordered.tiers[1].minimum_total = 35.0;
    assert!(matches!(
        unordered.validate(),
        Err(PolicyError::ThresholdOrder { .. })
    ));

    let mut missing_tier = ScoringPolicy::standard();
    missing_tier.tiers.pop();
    assert!(matches!(
        missing_tier.validate(),
        Err(PolicyError::MissingTier(AwardTier::DistinguishedServiceMedal))
    ));

    assert!(matches!(
        ScoringPolicy::from_json("{ not json"),
        Err(PolicyError::Parse(_))
    ));
}

#[test]
fn suggestions_list_weakest_criteria_first_then_next_tier() {
    let policy = ScoringPolicy::standard();
    let scores = card(6.0)
        .with_score(Criterion::Innovation, 1.0, &policy)
        .with_score(Criterion::Challenges, 4.0, &policy);

    let suggestions = advisor::suggest(&scores, AwardTier::AchievementMedal, &policy);
    assert_eq!(suggestions.len(), 7);
    assert!(suggestions[0].starts_with("Innovation (1.0/10)"));
    assert!(suggestions[1].starts_with("Challenges Overcome (4.0/10)"));
    assert!(suggestions[6].contains("Commendation Medal"));
    assert!(suggestions[6].contains("reaches 60"));
}

#[test]
fn no_suggestions_when_every_criterion_is_maxed() {
    let policy = ScoringPolicy::standard();
    let suggestions = advisor::suggest(&card(10.0), AwardTier::DistinguishedServiceMedal, &policy);
    assert!(suggestions.is_empty());
}

#[test]
fn explanation_names_the_tier_and_policy_version() {
    let engine = ScoringEngine::default();
    let assessment = engine.score(STRONG_NARRATIVE, &awardee());
    let text = explanation::build(&assessment, engine.policy());
    assert!(text.contains(assessment.tier.label()));
    assert!(text.contains("cg-2024.1"));
}

#[test]
fn requirements_note_lists_only_the_unmet_criteria() {
    let policy = ScoringPolicy::standard();
    let scores = card(6.0).with_score(Criterion::MeasurableImpact, 1.0, &policy);
    let tier = AwardTier::LetterOfCommendation;
    let assessment = Assessment {
        requirements_met: policy.requirements_met(tier, &scores),
        scores,
        tier,
        operational_device: false,
        policy_version: policy.version.clone(),
    };
    assert!(!assessment.requirements_met);

    let text = explanation::build(&assessment, &policy);
    let note = text
        .lines()
        .find(|line| line.starts_with("*Note:*"))
        .expect("requirements note");
    assert!(note.contains("Measurable Impact 1.0 (expects 2.0)"));
    assert!(!note.contains("Leadership"));
    assert!(!note.contains("Scope"));
}
