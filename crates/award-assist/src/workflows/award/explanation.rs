use super::domain::{AwardTier, Criterion};
use super::scoring::{Assessment, ScoringPolicy};

/// Renders the recommendation explanation as light markdown.
pub fn build(assessment: &Assessment, policy: &ScoringPolicy) -> String {
    let tier = assessment.tier;
    let total = assessment.scores.total_weighted();
    let mut out = String::new();

    out.push_str(&format!("## Recommended: {}\n\n", tier.label()));
    out.push_str(tier.description());
    out.push_str("\n\n");

    match policy.threshold_for(tier) {
        Some(threshold) => out.push_str(&format!(
            "**Weighted score:** {total:.1}/100 (threshold {threshold:.0})\n"
        )),
        None => {
            let lowest = policy
                .next_tier(AwardTier::NoAward)
                .map(|entry| entry.minimum_total)
                .unwrap_or(100.0);
            out.push_str(&format!(
                "**Weighted score:** {total:.1}/100 (lowest award threshold {lowest:.0})\n"
            ));
        }
    }

    if tier != AwardTier::NoAward && !assessment.requirements_met {
        let shortfalls = policy
            .unmet_requirements(tier, &assessment.scores)
            .into_iter()
            .map(|requirement| {
                format!(
                    "{} {:.1} (expects {:.1})",
                    requirement.criterion.label(),
                    assessment.scores.score(requirement.criterion),
                    requirement.minimum
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "\n*Note:* below what this award usually shows: {shortfalls}. Review the narrative before submitting.\n"
        ));
    }
    if assessment.operational_device {
        out.push_str("\nThe Operational Distinguishing Device is authorized for this award.\n");
    }

    let group = |keep: fn(f64) -> bool| -> Vec<String> {
        assessment
            .scores
            .iter()
            .filter(|(_, score)| keep(*score))
            .map(|(criterion, score)| describe(criterion, score))
            .collect()
    };

    for (heading, entries) in [
        ("Strengths", group(|score| score >= 8.0)),
        ("Solid", group(|score| (4.0..8.0).contains(&score))),
        ("Needs more detail", group(|score| score < 4.0)),
    ] {
        if entries.is_empty() {
            continue;
        }
        out.push_str(&format!("\n### {heading}\n"));
        for entry in entries {
            out.push_str(&format!("- {entry}\n"));
        }
    }

    out.push_str(&format!("\n_Scoring policy {}_", assessment.policy_version));
    out
}

fn describe(criterion: Criterion, score: f64) -> String {
    format!("{}: {score:.1}/10", criterion.label())
}
