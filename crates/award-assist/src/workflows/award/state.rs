use serde::{Deserialize, Serialize};

use super::domain::{AwardTier, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Generate,
    Refresh,
    Improve,
    Finalize,
    Clear,
}

impl WorkflowAction {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Generate,
            Self::Refresh,
            Self::Improve,
            Self::Finalize,
            Self::Clear,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Refresh => "refresh",
            Self::Improve => "improve",
            Self::Finalize => "finalize",
            Self::Clear => "clear",
        }
    }
}

/// Facts about the session that gate a transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionGuards {
    pub has_achievements: bool,
    pub current_award: Option<AwardTier>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("no achievements provided")]
    NoAchievements,
    #[error("cannot {} from the {} state", .action.label(), .state.label())]
    IllegalFrom {
        action: WorkflowAction,
        state: WorkflowState,
    },
    #[error("no current recommendation to {}", .0.label())]
    NoCurrentAward(WorkflowAction),
    #[error("cannot finalize without an award recommendation")]
    NothingToFinalize,
}

impl TransitionError {
    /// Validation failures come from missing input; every other variant is a state conflict.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::NoAchievements)
    }
}

/// Decides whether `action` is legal in `state` and which state it leads to.
pub fn transition(
    state: WorkflowState,
    action: WorkflowAction,
    guards: &TransitionGuards,
) -> Result<WorkflowState, TransitionError> {
    use WorkflowState::*;

    match action {
        WorkflowAction::Generate => {
            if guards.has_achievements {
                Ok(Recommendation)
            } else {
                Err(TransitionError::NoAchievements)
            }
        }
        WorkflowAction::Refresh => match state {
            Input => Err(TransitionError::IllegalFrom { action, state }),
            Recommendation | Improvement | Finalized => Ok(Recommendation),
        },
        WorkflowAction::Improve => match state {
            Recommendation | Improvement => guards
                .current_award
                .map(|_| Improvement)
                .ok_or(TransitionError::NoCurrentAward(action)),
            Input | Finalized => Err(TransitionError::IllegalFrom { action, state }),
        },
        WorkflowAction::Finalize => match state {
            Recommendation | Improvement | Finalized => match guards.current_award {
                None => Err(TransitionError::NoCurrentAward(action)),
                Some(AwardTier::NoAward) => Err(TransitionError::NothingToFinalize),
                Some(_) => Ok(Finalized),
            },
            Input => Err(TransitionError::IllegalFrom { action, state }),
        },
        WorkflowAction::Clear => Ok(Input),
    }
}

/// Actions the reducer would accept right now.
pub fn available_actions(state: WorkflowState, guards: &TransitionGuards) -> Vec<WorkflowAction> {
    WorkflowAction::ordered()
        .into_iter()
        .filter(|action| transition(state, *action, guards).is_ok())
        .collect()
}
