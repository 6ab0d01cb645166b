use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::super::domain::Criterion;
use super::policy::round_tenth;

const MAX_SCORE: f64 = 10.0;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?\s*(?:%|percent\b)").expect("percent pattern"));

static DOLLAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?\d[\d,]*(?:\.\d+)?(?:\s*(?:million|billion|thousand|k|m)\b)?")
        .expect("dollar pattern")
});

static LIVES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:sav|rescu)(?:ed|ing)\s+(?:\w+\s+){0,2}(?:lives|people|persons|mariners|boaters|survivors)\b|lives\s+saved",
    )
    .expect("lives pattern")
});

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d[\d,]*(?:\.\d+)?\b").expect("number pattern"));

static PERSONNEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d[\d,]*)[\s-]*(?:person|people|personnel|members?|staff|crew|sailors|team|subordinates|volunteers|cadets|students)\b",
    )
    .expect("personnel pattern")
});

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+[\s-]*(?:hours?|days?|weeks?|months?)\b").expect("duration pattern")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(?:19|20)\d{2}|january|february|march|april|june|july|august|september|october|november|december)\b",
    )
    .expect("date pattern")
});

const IMPACT_TERMS: &[&str] = &[
    "prevented",
    "reduced",
    "increased",
    "improved",
    "eliminated",
    "saved",
    "rescued",
    "recovered",
    "averted",
    "mitigated",
    "accelerated",
    "streamlined",
    "mission-critical",
];

const LEADERSHIP_HIGH: &[&str] = &[
    "led",
    "commanded",
    "directed",
    "supervised",
    "managed",
    "oversaw",
    "spearheaded",
    "coordinated",
    "in charge",
    "took command",
    "team leader",
    "officer in charge",
    "incident commander",
];

const LEADERSHIP_MEDIUM: &[&str] = &[
    "mentored",
    "trained",
    "guided",
    "coached",
    "delegated",
    "organized",
    "facilitated",
    "instructed",
    "motivated",
    "briefed",
];

const INNOVATION_TERMS: &[&str] = &[
    "developed",
    "created",
    "designed",
    "pioneered",
    "innovative",
    "invented",
    "established",
    "implemented",
    "automated",
    "redesigned",
    "new process",
    "new procedure",
    "first time",
    "novel",
    "streamlined",
];

/// Organisational reach indicators, broadest first.
const SCOPE_LEVELS: &[(f64, &[&str])] = &[
    (
        9.0,
        &[
            "national",
            "nationwide",
            "international",
            "coast guard-wide",
            "service-wide",
            "federal",
            "multinational",
            "global",
        ],
    ),
    (
        7.0,
        &[
            "district",
            "area",
            "regional",
            "interagency",
            "inter-agency",
            "headquarters",
            "multi-unit",
            "state-wide",
        ],
    ),
    (
        5.0,
        &[
            "sector",
            "multiple units",
            "base",
            "air station",
            "training center",
            "flotilla",
        ],
    ),
    (
        3.0,
        &["unit", "station", "cutter", "vessel", "department", "division", "office"],
    ),
    (2.0, &["team", "crew", "watch", "shift", "section"]),
];

const CHALLENGE_TERMS: &[&str] = &[
    "emergency",
    "crisis",
    "difficult",
    "complex",
    "challenging",
    "adverse",
    "severe weather",
    "heavy seas",
    "storm",
    "hazardous",
    "dangerous",
    "limited resources",
    "deadline",
    "under pressure",
    "despite",
    "overcame",
    "search and rescue",
];

const RESULT_CONNECTORS: &[&str] = &[
    "resulting in",
    "resulted in",
    "leading to",
    "which",
    "ensuring",
    "enabling",
    "saving",
    "thereby",
    "as a result",
];

/// Scores every criterion from the narrative. Pure and deterministic.
pub(crate) fn score_narrative(narrative: &str) -> BTreeMap<Criterion, f64> {
    let text = narrative.to_lowercase();

    Criterion::ordered()
        .into_iter()
        .map(|criterion| {
            let raw = match criterion {
                Criterion::MeasurableImpact => measurable_impact(&text),
                Criterion::Leadership => leadership(&text),
                Criterion::Innovation => innovation(&text),
                Criterion::Scope => scope(&text),
                Criterion::Challenges => challenges(&text),
                Criterion::Justification => justification(&text),
            };
            (criterion, clamp_score(raw))
        })
        .collect()
}

pub(crate) fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    round_tenth(raw.clamp(0.0, MAX_SCORE))
}

fn measurable_impact(text: &str) -> f64 {
    let mut score = 0.0;
    score += (PERCENT_RE.find_iter(text).count() as f64 * 2.0).min(4.0);
    score += (DOLLAR_RE.find_iter(text).count() as f64 * 2.0).min(4.0);
    if LIVES_RE.is_match(text) {
        score += 3.0;
    }
    score += (NUMBER_RE.find_iter(text).count() as f64 * 0.5).min(2.0);
    score += (count_terms(text, IMPACT_TERMS) as f64).min(3.0);
    score
}

fn leadership(text: &str) -> f64 {
    let mut score = match count_terms(text, LEADERSHIP_HIGH) {
        0 => 0.0,
        1 => 2.5,
        2 => 3.5,
        _ => 4.5,
    };
    score += match count_terms(text, LEADERSHIP_MEDIUM) {
        0 => 0.0,
        1 => 1.0,
        _ => 2.0,
    };

    let largest_group = PERSONNEL_RE
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .filter_map(|number| number.as_str().replace(',', "").parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    score += match largest_group {
        100.. => 3.0,
        50..=99 => 2.5,
        25..=49 => 2.0,
        10..=24 => 1.5,
        5..=9 => 1.0,
        2..=4 => 0.5,
        _ => 0.0,
    };

    score
}

fn innovation(text: &str) -> f64 {
    count_terms(text, INNOVATION_TERMS) as f64 * 1.5
}

fn scope(text: &str) -> f64 {
    let matched: Vec<f64> = SCOPE_LEVELS
        .iter()
        .filter(|(_, terms)| count_terms(text, terms) > 0)
        .map(|(points, _)| *points)
        .collect();

    match matched.first() {
        None => 1.0,
        Some(best) if matched.len() > 1 => best + 1.0,
        Some(best) => *best,
    }
}

fn challenges(text: &str) -> f64 {
    let mut score = count_terms(text, CHALLENGE_TERMS) as f64 * 1.5;
    if DURATION_RE.is_match(text) {
        score += 1.0;
    }
    score
}

fn justification(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    let mut score = match words {
        0 => return 0.0,
        1..=14 => 0.5,
        15..=39 => 1.0,
        40..=79 => 2.0,
        80..=149 => 3.0,
        _ => 4.0,
    };

    let sentences = text
        .split(['.', '!', '?'])
        .filter(|sentence| sentence.split_whitespace().count() >= 3)
        .count();
    score += match sentences {
        0 | 1 => 0.5,
        2 => 1.0,
        3..=5 => 1.5,
        _ => 2.0,
    };

    score += (count_terms(text, RESULT_CONNECTORS) as f64).min(2.0);
    if DATE_RE.is_match(text) {
        score += 1.0;
    }
    if NUMBER_RE.is_match(text) {
        score += 1.0;
    }
    score
}

fn count_terms(text: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|term| contains_term(text, term)).count()
}

/// Substring match that refuses to split words ("led" does not match "ledger").
pub(crate) fn contains_term(text: &str, term: &str) -> bool {
    let mut offset = 0;
    while let Some(found) = text[offset..].find(term) {
        let start = offset + found;
        let end = start + term.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        let boundary = |c: Option<char>| c.map_or(true, |c| !c.is_alphanumeric());
        if boundary(before) && boundary(after) {
            return true;
        }
        offset = start + text[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}
