use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::citation::render_plain;
use super::domain::{
    AwardeeInfo, FinalizedAward, Message, Recommendation, Session, SessionId, WorkflowState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Txt,
    Json,
}

impl ExportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }

    pub const fn mimetype(self) -> &'static str {
        match self {
            Self::Txt => "text/plain",
            Self::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDocument {
    pub filename: String,
    pub content: String,
    pub mimetype: &'static str,
    pub size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export while the session is in the {0} state")]
    NothingToExport(WorkflowState),
    #[error("failed to serialize export package: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Snapshot written by the JSON export.
#[derive(Debug, Serialize)]
struct ExportPackage<'a> {
    generated_at: DateTime<Utc>,
    session_id: SessionId,
    workflow_state: WorkflowState,
    awardee_info: &'a AwardeeInfo,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    recommendation: Option<&'a Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finalized_award: Option<&'a FinalizedAward>,
}

enum Selected<'a> {
    Finalized(&'a FinalizedAward),
    Recommended(&'a Recommendation),
}

fn select(session: &Session) -> Result<Selected<'_>, ExportError> {
    let nothing = || ExportError::NothingToExport(session.workflow_state);
    match session.workflow_state {
        WorkflowState::Finalized => session
            .finalized_award
            .as_ref()
            .map(Selected::Finalized)
            .ok_or_else(nothing),
        WorkflowState::Recommendation | WorkflowState::Improvement => session
            .recommendation
            .as_ref()
            .map(Selected::Recommended)
            .ok_or_else(nothing),
        WorkflowState::Input => Err(nothing()),
    }
}

pub fn export(
    session: &Session,
    format: ExportFormat,
    now: DateTime<Utc>,
) -> Result<ExportDocument, ExportError> {
    let selected = select(session)?;

    let content = match format {
        ExportFormat::Json => {
            let (recommendation, finalized_award) = match selected {
                Selected::Finalized(award) => (None, Some(award)),
                Selected::Recommended(recommendation) => (Some(recommendation), None),
            };
            serde_json::to_string_pretty(&ExportPackage {
                generated_at: now,
                session_id: session.id,
                workflow_state: session.workflow_state,
                awardee_info: &session.awardee_info,
                messages: session.messages.messages(),
                recommendation,
                finalized_award,
            })?
        }
        ExportFormat::Txt => text_package(session, &selected, now),
    };

    let name = match session.awardee_info.name.trim() {
        "" => "Unknown".to_string(),
        name => name.split_whitespace().collect::<Vec<_>>().join("_"),
    };
    let filename = format!(
        "award_package_{name}_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    );

    Ok(ExportDocument {
        filename,
        size: content.len(),
        content,
        mimetype: format.mimetype(),
    })
}

fn text_package(session: &Session, selected: &Selected<'_>, now: DateTime<Utc>) -> String {
    let rule = "=".repeat(60);
    let minor = "-".repeat(30);
    let mut lines = vec![
        rule.clone(),
        "COAST GUARD AWARD PACKAGE EXPORT".to_string(),
        rule,
        format!("Generated: {}", now.to_rfc3339()),
        String::new(),
    ];

    let info = &session.awardee_info;
    let fields = [
        ("Name", info.name.trim().to_string()),
        ("Rank", info.rank.trim().to_string()),
        ("Unit", info.unit.trim().to_string()),
        ("Position", info.position.trim().to_string()),
        ("Service Period", info.service_period().unwrap_or_default()),
    ];
    if fields.iter().any(|(_, value)| !value.is_empty()) {
        lines.push("AWARDEE INFORMATION:".to_string());
        lines.push(minor.clone());
        for (label, value) in fields.iter().filter(|(_, value)| !value.is_empty()) {
            lines.push(format!("{label}: {value}"));
        }
        if info.operational_device {
            lines.push("Operational Device: Requested".to_string());
        }
        lines.push(String::new());
    }

    match selected {
        Selected::Finalized(award) => {
            lines.push("FINAL AWARD:".to_string());
            lines.push(minor.clone());
            lines.push(format!("Award: {}", award.award.label()));
            lines.push(String::new());
            lines.push("CITATION:".to_string());
            lines.push(render_plain(&award.citation));
            lines.push(String::new());
        }
        Selected::Recommended(recommendation) => {
            lines.push("RECOMMENDED AWARD:".to_string());
            lines.push(minor.clone());
            lines.push(format!("Award: {}", recommendation.award.label()));
            lines.push(format!(
                "Weighted Score: {:.1}/100",
                recommendation.scores.total_weighted()
            ));
            lines.push(String::new());
            lines.push("EXPLANATION:".to_string());
            lines.push(render_plain(&recommendation.explanation));
            lines.push(String::new());
            lines.push("CRITERION SCORES:".to_string());
            lines.push(minor);
            for (criterion, score) in recommendation.scores.iter() {
                lines.push(format!("  {}: {score:.1}/10", criterion.label()));
            }
            lines.push(String::new());
        }
    }

    lines.join("\n")
}
