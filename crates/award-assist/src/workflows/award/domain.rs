use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scoring::ScoreCard;

/// Identifier wrapper for persisted drafting sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coast Guard award ladder, lowest first. Ordering drives "next tier up" advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardTier {
    NoAward,
    LetterOfCommendation,
    AchievementMedal,
    CommendationMedal,
    MeritoriousServiceMedal,
    LegionOfMerit,
    DistinguishedServiceMedal,
}

impl AwardTier {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::NoAward,
            Self::LetterOfCommendation,
            Self::AchievementMedal,
            Self::CommendationMedal,
            Self::MeritoriousServiceMedal,
            Self::LegionOfMerit,
            Self::DistinguishedServiceMedal,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NoAward => "No Award",
            Self::LetterOfCommendation => "Coast Guard Letter of Commendation",
            Self::AchievementMedal => "Coast Guard Achievement Medal",
            Self::CommendationMedal => "Coast Guard Commendation Medal",
            Self::MeritoriousServiceMedal => "Meritorious Service Medal",
            Self::LegionOfMerit => "Legion of Merit",
            Self::DistinguishedServiceMedal => "Distinguished Service Medal",
        }
    }

    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::NoAward => "NONE",
            Self::LetterOfCommendation => "LOC",
            Self::AchievementMedal => "CGAM",
            Self::CommendationMedal => "CGCM",
            Self::MeritoriousServiceMedal => "MSM",
            Self::LegionOfMerit => "LOM",
            Self::DistinguishedServiceMedal => "DSM",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NoAward => {
                "The accomplishments described do not yet meet the threshold for a personal award."
            }
            Self::LetterOfCommendation => {
                "May be awarded for an act or service resulting in unusual and/or outstanding achievement but lesser than that required for the Achievement Medal."
            }
            Self::AchievementMedal => {
                "May be awarded for professional and/or leadership achievement based on sustained performance or specific achievement of a superlative nature."
            }
            Self::CommendationMedal => {
                "May be awarded to a person who distinguishes themselves by heroic or meritorious achievement or service."
            }
            Self::MeritoriousServiceMedal => {
                "May be awarded to any member who distinguishes themselves by outstanding meritorious achievement or service to the United States."
            }
            Self::LegionOfMerit => {
                "Awarded for exceptionally meritorious service, except as to the degree of responsibility required for the Distinguished Service Medal."
            }
            Self::DistinguishedServiceMedal => {
                "May be awarded to any person who distinguishes themselves by exceptionally meritorious service to the United States Government in a duty of great responsibility."
            }
        }
    }

    pub fn next(self) -> Option<Self> {
        let ordered = Self::ordered();
        let index = ordered.iter().position(|tier| *tier == self)?;
        ordered.get(index + 1).copied()
    }

    /// Accepts the snake_case key, the abbreviation, or the display label (with or
    /// without the "Coast Guard" prefix).
    pub fn from_label(raw: &str) -> Option<Self> {
        let needle = raw.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return None;
        }

        Self::ordered().into_iter().find(|tier| {
            let label = tier.label().to_ascii_lowercase();
            let key = serde_json::to_value(tier)
                .ok()
                .and_then(|value| value.as_str().map(str::to_owned))
                .unwrap_or_default();
            needle == label
                || needle == key
                || needle == tier.abbreviation().to_ascii_lowercase()
                || label
                    .strip_prefix("coast guard ")
                    .is_some_and(|short| short == needle)
        })
    }
}

impl fmt::Display for AwardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scoring criteria in their fixed evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    MeasurableImpact,
    Leadership,
    Innovation,
    Scope,
    Challenges,
    Justification,
}

impl Criterion {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::MeasurableImpact,
            Self::Leadership,
            Self::Innovation,
            Self::Scope,
            Self::Challenges,
            Self::Justification,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::MeasurableImpact => "Measurable Impact",
            Self::Leadership => "Leadership",
            Self::Innovation => "Innovation",
            Self::Scope => "Scope of Impact",
            Self::Challenges => "Challenges Overcome",
            Self::Justification => "Justification Quality",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat turn. Never edited after it is appended to a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp,
        }
    }
}

/// Append-only conversation log; user turns form the scoring narrative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn user_turns(&self) -> impl Iterator<Item = &Message> {
        self.0.iter().filter(|message| message.role == Role::User)
    }

    pub fn has_user_turns(&self) -> bool {
        self.user_turns()
            .any(|message| !message.content.trim().is_empty())
    }

    pub fn narrative(&self) -> String {
        self.user_turns()
            .map(|message| message.content.trim())
            .filter(|content| !content.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}

/// Awardee form contents. Replaced wholesale whenever the client sends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwardeeInfo {
    pub name: String,
    pub rank: String,
    pub unit: String,
    pub position: String,
    #[serde(deserialize_with = "deserialize_optional_date")]
    pub date_start: Option<NaiveDate>,
    #[serde(deserialize_with = "deserialize_optional_date")]
    pub date_end: Option<NaiveDate>,
    pub operational_device: bool,
}

impl AwardeeInfo {
    pub fn validate(&self) -> Result<(), AwardeeValidationError> {
        if let (Some(start), Some(end)) = (self.date_start, self.date_end) {
            if start > end {
                return Err(AwardeeValidationError::DateOrder { start, end });
            }
        }

        let name = self.name.trim();
        if !name.is_empty()
            && !name
                .chars()
                .all(|c| c.is_alphabetic() || c.is_whitespace() || matches!(c, '-' | '.' | '\''))
        {
            return Err(AwardeeValidationError::InvalidName(name.to_string()));
        }

        let rank = self.rank.trim();
        if !rank.is_empty() && rank.chars().all(|c| c.is_ascii_digit()) {
            return Err(AwardeeValidationError::NumericRank(rank.to_string()));
        }

        Ok(())
    }

    /// Rank and name in the upper-case form used by citations.
    pub fn citation_name(&self) -> String {
        let full = format!("{} {}", self.rank.trim(), self.name.trim());
        let full = full.trim();
        if full.is_empty() {
            "THE MEMBER".to_string()
        } else {
            full.to_uppercase()
        }
    }

    pub fn service_period(&self) -> Option<String> {
        const FORMAT: &str = "%B %-d, %Y";
        match (self.date_start, self.date_end) {
            (Some(start), Some(end)) => Some(format!(
                "{} to {}",
                start.format(FORMAT),
                end.format(FORMAT)
            )),
            (Some(start), None) => Some(format!("{} to present", start.format(FORMAT))),
            (None, Some(end)) => Some(format!("[start date] to {}", end.format(FORMAT))),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AwardeeValidationError {
    #[error("start date {start} must not be after end date {end}")]
    DateOrder { start: NaiveDate, end: NaiveDate },
    #[error("name '{0}' contains invalid characters")]
    InvalidName(String),
    #[error("rank '{0}' must include text, not just numbers")]
    NumericRank(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Input,
    Recommendation,
    Improvement,
    Finalized,
}

impl WorkflowState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Recommendation => "recommendation",
            Self::Improvement => "improvement",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scored recommendation. Rebuilt from the full transcript on every generate/refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub award: AwardTier,
    pub explanation: String,
    pub scores: ScoreCard,
    pub suggestions: Vec<String>,
    pub policy_version: String,
    pub requirements_met: bool,
    pub operational_device: bool,
    pub generated_at: DateTime<Utc>,
}

/// Snapshot taken by finalize; later refreshes never touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedAward {
    pub award: AwardTier,
    pub citation: String,
    pub display_citation: String,
    pub operational_device: bool,
    pub finalized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementAdvice {
    pub current_award: AwardTier,
    pub suggestions: Vec<String>,
    pub current_scores: ScoreCard,
    pub generated_at: DateTime<Utc>,
}

pub const DEFAULT_SESSION_NAME: &str = "Unnamed Session";

/// Full conversation record persisted by a [`SessionRepository`](super::repository::SessionRepository).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "session_id")]
    pub id: SessionId,
    #[serde(rename = "session_name")]
    pub name: String,
    pub messages: Transcript,
    pub awardee_info: AwardeeInfo,
    pub recommendation: Option<Recommendation>,
    pub finalized_award: Option<FinalizedAward>,
    #[serde(default)]
    pub improvement: Option<ImprovementAdvice>,
    #[serde(default)]
    pub workflow_state: WorkflowState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_id(SessionId::new(), now)
    }

    pub fn with_id(id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: DEFAULT_SESSION_NAME.to_string(),
            messages: Transcript::new(),
            awardee_info: AwardeeInfo::default(),
            recommendation: None,
            finalized_award: None,
            improvement: None,
            workflow_state: WorkflowState::Input,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_award(&self) -> Option<AwardTier> {
        self.recommendation
            .as_ref()
            .map(|recommendation| recommendation.award)
    }

    /// Drops transcript and workflow artifacts; the id and name survive.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.messages = Transcript::new();
        self.awardee_info = AwardeeInfo::default();
        self.recommendation = None;
        self.finalized_award = None;
        self.improvement = None;
        self.workflow_state = WorkflowState::Input;
        self.updated_at = now;
    }
}

/// Parses the `YYYY-MM-DD` form used by date inputs and the CLI.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Browser date inputs post "" when left blank.
pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.filter(|value| !value.trim().is_empty())
        .map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_step_up_the_ladder() {
        assert_eq!(AwardTier::NoAward.next(), Some(AwardTier::LetterOfCommendation));
        assert_eq!(
            AwardTier::LegionOfMerit.next(),
            Some(AwardTier::DistinguishedServiceMedal)
        );
        assert_eq!(AwardTier::DistinguishedServiceMedal.next(), None);
        assert!(AwardTier::AchievementMedal < AwardTier::CommendationMedal);
    }

    #[test]
    fn tier_labels_parse_in_several_spellings() {
        assert_eq!(
            AwardTier::from_label("Coast Guard Achievement Medal"),
            Some(AwardTier::AchievementMedal)
        );
        assert_eq!(
            AwardTier::from_label("achievement medal"),
            Some(AwardTier::AchievementMedal)
        );
        assert_eq!(
            AwardTier::from_label("meritorious_service_medal"),
            Some(AwardTier::MeritoriousServiceMedal)
        );
        assert_eq!(AwardTier::from_label("LOM"), Some(AwardTier::LegionOfMerit));
        assert_eq!(AwardTier::from_label("Purple Heart"), None);
        assert_eq!(AwardTier::from_label("  "), None);
    }

    #[test]
    fn narrative_joins_user_turns_in_order() {
        let now = Utc::now();
        let transcript = Transcript::from(vec![
            Message::user("First accomplishment.", now),
            Message::assistant("Noted.", now),
            Message::user("  ", now),
            Message::user("Second accomplishment.", now),
        ]);

        assert!(transcript.has_user_turns());
        assert_eq!(
            transcript.narrative(),
            "First accomplishment.\n\nSecond accomplishment."
        );
    }

    #[test]
    fn blank_user_turns_do_not_count_as_achievements() {
        let now = Utc::now();
        let transcript = Transcript::from(vec![
            Message::assistant("Welcome!", now),
            Message::user("   ", now),
        ]);
        assert!(!transcript.has_user_turns());
    }

    #[test]
    fn parse_date_accepts_only_iso_dates() {
        assert_eq!(
            parse_date(" 2025-02-28 ").ok(),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert!(parse_date("02/28/2025").is_err());
    }

    #[test]
    fn awardee_dates_accept_blank_form_values() {
        let info: AwardeeInfo = serde_json::from_value(serde_json::json!({
            "name": "J. Smith",
            "rank": "PO2",
            "date_start": "",
            "date_end": "2025-06-30",
            "operational_device": true
        }))
        .expect("awardee parses");

        assert_eq!(info.date_start, None);
        assert_eq!(NaiveDate::from_ymd_opt(2025, 6, 30), info.date_end);
        assert!(info.operational_device);
        assert_eq!(info.unit, "");
    }

    #[test]
    fn awardee_validation_rejects_inverted_dates_and_numeric_ranks() {
        let mut info = AwardeeInfo {
            name: "J. Smith".to_string(),
            rank: "PO2".to_string(),
            date_start: NaiveDate::from_ymd_opt(2025, 6, 30),
            date_end: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..AwardeeInfo::default()
        };
        assert!(matches!(
            info.validate(),
            Err(AwardeeValidationError::DateOrder { .. })
        ));

        info.date_end = None;
        info.rank = "42".to_string();
        assert!(matches!(
            info.validate(),
            Err(AwardeeValidationError::NumericRank(_))
        ));

        info.rank = "PO2".to_string();
        info.name = "J. Smith <script>".to_string();
        assert!(matches!(
            info.validate(),
            Err(AwardeeValidationError::InvalidName(_))
        ));
    }

    #[test]
    fn citation_name_and_period_format() {
        let info = AwardeeInfo {
            name: "Jordan Smith".to_string(),
            rank: "po2".to_string(),
            date_start: NaiveDate::from_ymd_opt(2024, 3, 1),
            date_end: NaiveDate::from_ymd_opt(2025, 6, 30),
            ..AwardeeInfo::default()
        };
        assert_eq!(info.citation_name(), "PO2 JORDAN SMITH");
        assert_eq!(
            info.service_period().as_deref(),
            Some("March 1, 2024 to June 30, 2025")
        );
        assert_eq!(AwardeeInfo::default().citation_name(), "THE MEMBER");
    }

    #[test]
    fn reset_keeps_identity_only() {
        let now = Utc::now();
        let mut session = Session::new(now);
        let id = session.id;
        session.name = "Smith CGAM".to_string();
        session.messages.push(Message::user("Led a boarding team.", now));
        session.workflow_state = WorkflowState::Finalized;

        session.reset(now);

        assert_eq!(session.id, id);
        assert_eq!(session.name, "Smith CGAM");
        assert!(session.messages.is_empty());
        assert_eq!(session.workflow_state, WorkflowState::Input);
        assert!(session.current_award().is_none());
    }
}
