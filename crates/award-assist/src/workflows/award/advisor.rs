use super::domain::{AwardTier, Criterion};
use super::scoring::{ScoreCard, ScoringPolicy};

fn guidance(criterion: Criterion) -> &'static str {
    match criterion {
        Criterion::MeasurableImpact => {
            "add quantified results such as percentages, dollar savings, lives saved, or time reduced"
        }
        Criterion::Leadership => {
            "describe the people you led, how many, and the decisions you owned"
        }
        Criterion::Innovation => {
            "explain any new process, tool, or approach you developed and what it replaced"
        }
        Criterion::Scope => {
            "state how far the effect reached, for example unit, sector, district, or national level"
        }
        Criterion::Challenges => {
            "note the obstacles overcome, such as weather, time pressure, or limited resources"
        }
        Criterion::Justification => {
            "connect actions to results with dates and complete sentences"
        }
    }
}

/// Produces ordered improvement suggestions targeting the weakest criteria.
///
/// One entry per criterion below the maximum, lowest score first (ties keep the
/// fixed criterion order), followed by a pointer to the next tier up when one exists.
/// Returns nothing when every criterion is already at the maximum.
pub fn suggest(scores: &ScoreCard, current: AwardTier, policy: &ScoringPolicy) -> Vec<String> {
    let mut weakest: Vec<(Criterion, f64)> =
        scores.iter().filter(|(_, score)| *score < 10.0).collect();
    // stable sort keeps criterion order among ties
    weakest.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut suggestions: Vec<String> = weakest
        .iter()
        .map(|(criterion, score)| {
            format!("{} ({score:.1}/10): {}", criterion.label(), guidance(*criterion))
        })
        .collect();

    if suggestions.is_empty() {
        return suggestions;
    }

    if let Some(next) = policy.next_tier(current) {
        suggestions.push(format!(
            "To reach the {}, strengthen the narrative until the weighted total reaches {:.0} (currently {:.1}).",
            next.tier.label(),
            next.minimum_total,
            scores.total_weighted()
        ));
    }

    suggestions
}
