use serde::Serialize;

use super::citation::render_html;
use super::domain::{FinalizedAward, ImprovementAdvice, Recommendation, WorkflowState};
use super::state::{transition, TransitionGuards, WorkflowAction};

/// DOM-free description of what the drafting page should show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    pub state: WorkflowState,
    pub busy: bool,
    pub controls: Vec<Control>,
    pub panel: Panel,
}

impl ViewModel {
    pub fn control(&self, action: WorkflowAction) -> Option<&Control> {
        self.controls.iter().find(|control| control.action == action)
    }

    pub fn visible_actions(&self) -> Vec<WorkflowAction> {
        self.controls
            .iter()
            .filter(|control| control.visible)
            .map(|control| control.action)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Control {
    pub action: WorkflowAction,
    pub visible: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRow {
    pub label: &'static str,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Panel {
    Empty,
    Generating,
    Recommendation {
        award: String,
        total: f64,
        explanation: String,
        scores: Vec<ScoreRow>,
    },
    Improvement {
        award: String,
        suggestions: Vec<String>,
    },
    Finalized {
        award: String,
        citation_html: String,
    },
    Error {
        message: String,
    },
}

/// Inputs to [`render`], borrowed from the controller.
pub(crate) struct RenderInput<'a> {
    pub state: WorkflowState,
    pub busy: bool,
    pub guards: TransitionGuards,
    pub error: Option<&'a str>,
    pub recommendation: Option<&'a Recommendation>,
    pub improvement: Option<&'a ImprovementAdvice>,
    pub finalized: Option<&'a FinalizedAward>,
}

fn shown_in(state: WorkflowState, action: WorkflowAction) -> bool {
    use WorkflowAction::*;
    match state {
        WorkflowState::Input => matches!(action, Generate | Clear),
        WorkflowState::Recommendation | WorkflowState::Improvement => {
            matches!(action, Refresh | Improve | Finalize | Clear)
        }
        WorkflowState::Finalized => matches!(action, Refresh | Clear),
    }
}

pub(crate) fn render(input: RenderInput<'_>) -> ViewModel {
    let controls = WorkflowAction::ordered()
        .into_iter()
        .map(|action| {
            let visible = shown_in(input.state, action);
            let enabled =
                visible && !input.busy && transition(input.state, action, &input.guards).is_ok();
            Control {
                action,
                visible,
                enabled,
            }
        })
        .collect();

    let panel = if input.busy {
        Panel::Generating
    } else if let Some(message) = input.error {
        Panel::Error {
            message: message.to_string(),
        }
    } else {
        content_panel(&input)
    };

    ViewModel {
        state: input.state,
        busy: input.busy,
        controls,
        panel,
    }
}

fn content_panel(input: &RenderInput<'_>) -> Panel {
    match input.state {
        WorkflowState::Input => Panel::Empty,
        WorkflowState::Finalized => match input.finalized {
            Some(award) => Panel::Finalized {
                award: award.award.label().to_string(),
                citation_html: render_html(&award.citation),
            },
            None => Panel::Empty,
        },
        WorkflowState::Improvement => match input.improvement {
            Some(advice) => Panel::Improvement {
                award: advice.current_award.label().to_string(),
                suggestions: advice.suggestions.clone(),
            },
            None => recommendation_panel(input.recommendation),
        },
        WorkflowState::Recommendation => recommendation_panel(input.recommendation),
    }
}

fn recommendation_panel(recommendation: Option<&Recommendation>) -> Panel {
    let Some(recommendation) = recommendation else {
        return Panel::Empty;
    };
    Panel::Recommendation {
        award: recommendation.award.label().to_string(),
        total: recommendation.scores.total_weighted(),
        explanation: recommendation.explanation.clone(),
        scores: recommendation
            .scores
            .iter()
            .map(|(criterion, score)| ScoreRow {
                label: criterion.label(),
                score,
            })
            .collect(),
    }
}
