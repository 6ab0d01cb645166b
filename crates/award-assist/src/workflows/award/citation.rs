use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::domain::{AwardTier, AwardeeInfo};

pub const REFLEXIVE_PRONOUN: &str = "himself or herself";
pub const PERIOD_PLACEHOLDER: &str = "[dates of service]";
pub const DEVICE_SENTENCE: &str = "The Operational Distinguishing Device is authorized.";

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("link pattern"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:[-*+>]|\d+[.)]|#+)\s+").expect("bullet pattern"));
static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*_`~#]+").expect("emphasis pattern"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));
static FIRST_PERSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:I|[Mm]e|[Mm]y|[Mm]ine|[Mm]yself|[Ww]e|[Uu]s|[Oo]ur|[Oo]urs|[Oo]urselves)\b",
    )
    .expect("first person pattern")
});

/// Words that take a roman numeral, as in "Phase I".
const NUMBERED_TERMS: [&str; 14] = [
    "phase", "part", "level", "tier", "stage", "class", "type", "block", "step", "title",
    "grade", "chapter", "section", "war",
];

/// Line geometry for printed citations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationLayout {
    pub max_line_length: usize,
    pub extended_line_limit: usize,
    pub standard_line_limit: usize,
}

impl CitationLayout {
    pub fn line_limit(&self, tier: AwardTier) -> usize {
        match tier {
            AwardTier::DistinguishedServiceMedal | AwardTier::LegionOfMerit => {
                self.extended_line_limit
            }
            _ => self.standard_line_limit,
        }
    }
}

impl Default for CitationLayout {
    fn default() -> Self {
        Self {
            max_line_length: 95,
            extended_line_limit: 16,
            standard_line_limit: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CitationError {
    #[error("a citation cannot be generated for {0}")]
    NoAward(AwardTier),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationIssue {
    LineTooLong { line: usize, length: usize },
    TooManyLines { count: usize, limit: usize },
    MissingOpening,
    MissingClosing,
    FirstPerson,
}

fn opening_phrase(tier: AwardTier) -> &'static str {
    match tier {
        AwardTier::DistinguishedServiceMedal => {
            "For exceptionally meritorious service to the Government of the United States in a duty of great responsibility"
        }
        AwardTier::LegionOfMerit => {
            "For exceptionally meritorious conduct in the performance of outstanding services"
        }
        AwardTier::MeritoriousServiceMedal => "For outstanding meritorious service",
        AwardTier::CommendationMedal => "For superior performance of duty",
        AwardTier::AchievementMedal => "For professional achievement",
        AwardTier::LetterOfCommendation | AwardTier::NoAward => {
            "For outstanding performance of duty"
        }
    }
}

fn closing_phrase(tier: AwardTier, name: &str) -> String {
    const TRADITIONS: &str =
        "are in keeping with the highest traditions of the United States Coast Guard.";
    match tier {
        AwardTier::DistinguishedServiceMedal => format!(
            "{name}'s distinctive accomplishments, unrelenting perseverance, and steadfast devotion to duty reflect great credit upon {REFLEXIVE_PRONOUN} and {TRADITIONS}"
        ),
        AwardTier::LegionOfMerit => format!(
            "{name}'s initiative, perseverance, and devotion to duty reflect great credit upon {REFLEXIVE_PRONOUN} and {TRADITIONS}"
        ),
        AwardTier::MeritoriousServiceMedal => format!(
            "{name}'s dedication, judgment, and devotion to duty are most heartily commended and {TRADITIONS}"
        ),
        AwardTier::CommendationMedal => format!(
            "{name}'s dedication, professional knowledge, and devotion to duty are most heartily commended and {TRADITIONS}"
        ),
        AwardTier::AchievementMedal => format!(
            "{name}'s dedication, perseverance, and devotion to duty are most heartily commended and {TRADITIONS}"
        ),
        AwardTier::LetterOfCommendation | AwardTier::NoAward => format!(
            "{name}'s initiative, perseverance, and devotion to duty reflect credit upon {REFLEXIVE_PRONOUN} and the United States Coast Guard."
        ),
    }
}

/// Builds the canonical plain-text citation. Same inputs always give the same text.
#[derive(Debug, Clone, Default)]
pub struct CitationGenerator {
    layout: CitationLayout,
}

impl CitationGenerator {
    pub fn new(layout: CitationLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &CitationLayout {
        &self.layout
    }

    pub fn generate(
        &self,
        tier: AwardTier,
        awardee: &AwardeeInfo,
        narrative: &str,
        operational_device: bool,
    ) -> Result<String, CitationError> {
        if tier == AwardTier::NoAward {
            return Err(CitationError::NoAward(tier));
        }

        let name = awardee.citation_name();
        let opening = opening_sentence(tier, awardee);
        let intro = format!("{name} distinguished {REFLEXIVE_PRONOUN} through exemplary service.");
        let mut closing = closing_phrase(tier, &name);
        if operational_device {
            closing.push(' ');
            closing.push_str(DEVICE_SENTENCE);
        }

        let mut body = body_sentences(narrative);
        let limit = self.layout.line_limit(tier);

        loop {
            let mut parts = Vec::with_capacity(body.len() + 3);
            parts.push(opening.as_str());
            parts.push(intro.as_str());
            parts.extend(body.iter().map(String::as_str));
            parts.push(closing.as_str());

            let lines = wrap(&parts.join(" "), self.layout.max_line_length);
            if lines.len() <= limit {
                return Ok(lines.join("\n"));
            }
            if body.pop().is_none() {
                tracing::warn!(
                    tier = tier.abbreviation(),
                    lines = lines.len(),
                    limit,
                    "citation frame exceeds line limit; truncating"
                );
                return Ok(truncate_keeping_closing(
                    &opening,
                    &closing,
                    self.layout.max_line_length,
                    limit,
                ));
            }
        }
    }

    /// Checks a citation against the layout and the standard phrasing.
    pub fn audit(&self, tier: AwardTier, citation: &str) -> Vec<CitationIssue> {
        let mut issues = Vec::new();
        let lines: Vec<&str> = citation.lines().collect();
        let limit = self.layout.line_limit(tier);

        if lines.len() > limit {
            issues.push(CitationIssue::TooManyLines {
                count: lines.len(),
                limit,
            });
        }
        for (index, line) in lines.iter().enumerate() {
            let length = line.chars().count();
            if length > self.layout.max_line_length {
                issues.push(CitationIssue::LineTooLong {
                    line: index + 1,
                    length,
                });
            }
        }

        let flattened = lines.join(" ");
        if !flattened.starts_with(opening_phrase(tier)) {
            issues.push(CitationIssue::MissingOpening);
        }
        let lowered = flattened.to_lowercase();
        if !["traditions of the united states coast guard", "credit upon"]
            .iter()
            .any(|phrase| lowered.contains(phrase))
        {
            issues.push(CitationIssue::MissingClosing);
        }
        if FIRST_PERSON_RE.is_match(&flattened) {
            issues.push(CitationIssue::FirstPerson);
        }

        issues
    }
}

fn opening_sentence(tier: AwardTier, awardee: &AwardeeInfo) -> String {
    let mut opening = opening_phrase(tier).to_string();
    let position = awardee.position.trim();
    let unit = awardee.unit.trim();
    match (position.is_empty(), unit.is_empty()) {
        (false, false) => opening.push_str(&format!(" while serving as {position}, {unit},")),
        (true, false) => opening.push_str(&format!(" while serving at {unit},")),
        (false, true) => opening.push_str(&format!(" while serving as {position},")),
        (true, true) => {}
    }
    let period = awardee
        .service_period()
        .unwrap_or_else(|| PERIOD_PLACEHOLDER.to_string());
    opening.push_str(&format!(" from {period}."));
    opening
}

fn body_sentences(narrative: &str) -> Vec<String> {
    let cleaned = strip_markdown(narrative);
    split_sentences(&cleaned)
        .into_iter()
        .filter(|sentence| sentence.split_whitespace().count() >= 3)
        .map(|sentence| finish_sentence(&third_person(&sentence)))
        .collect()
}

fn strip_markdown(text: &str) -> String {
    let text = LINK_RE.replace_all(text, "$1");
    let text = TAG_RE.replace_all(&text, "");
    let text = BULLET_RE.replace_all(&text, "");
    EMPHASIS_RE.replace_all(&text, "").into_owned()
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |next| next.is_whitespace())
        {
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let normalized = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        sentences.push(normalized);
    }
    current.clear();
}

fn third_person(sentence: &str) -> String {
    let rewritten = FIRST_PERSON_RE.replace_all(sentence, |captures: &regex::Captures<'_>| {
        let found = &captures[0];
        let start = captures.get(0).map_or(0, |m| m.start());
        let previous = sentence[..start]
            .split_whitespace()
            .next_back()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .unwrap_or_default();

        if found == "I" && NUMBERED_TERMS.contains(&previous.as_str()) {
            return found.to_string();
        }
        let replacement = match found.to_lowercase().as_str() {
            "i" | "we" | "me" | "us" => "the member",
            "my" | "our" | "mine" | "ours" => "the member's",
            _ => REFLEXIVE_PRONOUN,
        };
        match replacement.strip_prefix("the ") {
            Some(rest) if previous == "the" => rest.to_string(),
            _ => replacement.to_string(),
        }
    });
    rewritten.into_owned()
}

fn finish_sentence(sentence: &str) -> String {
    let trimmed = sentence.trim().trim_end_matches([',', ';', ':']);
    let mut chars = trimmed.chars();
    let mut out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

/// Greedy word wrap; words longer than the width are split.
pub(crate) fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let mut word: String = word.to_string();
        while word.chars().count() > width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            lines.push(head);
        }
        if line.is_empty() {
            line = word;
        } else if line.chars().count() + 1 + word.chars().count() <= width {
            line.push(' ');
            line.push_str(&word);
        } else {
            lines.push(std::mem::replace(&mut line, word));
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn truncate_keeping_closing(opening: &str, closing: &str, width: usize, limit: usize) -> String {
    let closing_lines = wrap(closing, width);
    let room = limit.saturating_sub(closing_lines.len());
    let mut lines: Vec<String> = wrap(opening, width).into_iter().take(room).collect();
    lines.extend(closing_lines);
    lines.truncate(limit);
    lines.join("\n")
}

/// Escaped HTML rendering; one `<br>` per line break.
pub fn render_html(citation: &str) -> String {
    citation
        .lines()
        .map(escape_html)
        .collect::<Vec<_>>()
        .join("<br>")
}

/// Plain lines with any markup removed.
pub fn render_plain(citation: &str) -> String {
    let without_breaks = citation.replace("<br>", "\n").replace("<br/>", "\n");
    // entities contain "#" and may hide tags; unescape before stripping either
    let unescaped = unescape_html(&without_breaks);
    let untagged = TAG_RE.replace_all(&unescaped, "");
    EMPHASIS_RE
        .replace_all(&untagged, "")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
