use chrono::{DateTime, Duration, Utc};

use super::domain::{
    AwardeeInfo, FinalizedAward, ImprovementAdvice, Message, Recommendation, Session,
    Transcript, WorkflowState,
};
use super::state::{transition, TransitionError, TransitionGuards, WorkflowAction};
use super::view::{render, RenderInput, ViewModel};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: i64 = 60;

/// Handle for one in-flight request. Only the most recent ticket may apply its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub sequence: u64,
    pub action: WorkflowAction,
}

/// Server result for a completed request.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Recommended(Recommendation),
    Improved(ImprovementAdvice),
    Finalized(FinalizedAward),
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Failed,
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    ticket: Ticket,
    prior_state: WorkflowState,
    started_at: DateTime<Utc>,
}

/// Client-side workflow model: sequence-stamped requests, last-request-wins.
#[derive(Debug, Clone)]
pub struct WorkflowController {
    state: WorkflowState,
    transcript: Transcript,
    awardee: AwardeeInfo,
    recommendation: Option<Recommendation>,
    improvement: Option<ImprovementAdvice>,
    finalized: Option<FinalizedAward>,
    error: Option<String>,
    pending: Option<PendingRequest>,
    last_issued: u64,
    timeout: Duration,
}

impl WorkflowController {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: WorkflowState::Input,
            transcript: Transcript::new(),
            awardee: AwardeeInfo::default(),
            recommendation: None,
            improvement: None,
            finalized: None,
            error: None,
            pending: None,
            last_issued: 0,
            timeout,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        self.recommendation.as_ref()
    }

    pub fn finalized(&self) -> Option<&FinalizedAward> {
        self.finalized.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn set_awardee(&mut self, awardee: AwardeeInfo) {
        self.awardee = awardee;
    }

    pub fn awardee(&self) -> &AwardeeInfo {
        &self.awardee
    }

    pub fn record_message(&mut self, message: Message) {
        self.transcript.push(message);
    }

    /// Restores the controller from a server session.
    pub fn hydrate(&mut self, session: &Session) {
        self.state = session.workflow_state;
        self.transcript = session.messages.clone();
        self.awardee = session.awardee_info.clone();
        self.recommendation = session.recommendation.clone();
        self.improvement = session.improvement.clone();
        self.finalized = session.finalized_award.clone();
        self.error = None;
        self.pending = None;
    }

    /// Session load failed; start from an empty session.
    pub fn hydrate_failed(&mut self) {
        *self = Self {
            last_issued: self.last_issued,
            ..Self::new(self.timeout)
        };
    }

    fn guards(&self) -> TransitionGuards {
        TransitionGuards {
            has_achievements: self.transcript.has_user_turns(),
            current_award: self.recommendation.as_ref().map(|rec| rec.award),
        }
    }

    /// Stamps a new request. Any request still in flight is superseded.
    pub fn begin(
        &mut self,
        action: WorkflowAction,
        now: DateTime<Utc>,
    ) -> Result<Ticket, TransitionError> {
        transition(self.state, action, &self.guards())?;

        self.last_issued += 1;
        let ticket = Ticket {
            sequence: self.last_issued,
            action,
        };
        self.pending = Some(PendingRequest {
            ticket,
            prior_state: self.state,
            started_at: now,
        });
        Ok(ticket)
    }

    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<ActionOutcome, String>,
        now: DateTime<Utc>,
    ) -> Completion {
        let Some(pending) = self.pending else {
            return Completion::Stale;
        };
        if pending.ticket != ticket {
            return Completion::Stale;
        }
        self.pending = None;

        match result {
            Ok(outcome) => {
                self.apply(outcome);
                Completion::Applied
            }
            Err(message) => {
                self.fail(pending.prior_state, message, now);
                Completion::Failed
            }
        }
    }

    /// Fails the pending request once it has outlived the timeout.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<Ticket> {
        let pending = self.pending?;
        if now - pending.started_at < self.timeout {
            return None;
        }
        self.pending = None;
        self.fail(
            pending.prior_state,
            format!(
                "The {} request timed out. Please try again.",
                pending.ticket.action.label()
            ),
            now,
        );
        Some(pending.ticket)
    }

    fn apply(&mut self, outcome: ActionOutcome) {
        self.error = None;
        match outcome {
            ActionOutcome::Recommended(recommendation) => {
                self.recommendation = Some(recommendation);
                self.improvement = None;
                self.state = WorkflowState::Recommendation;
            }
            ActionOutcome::Improved(advice) => {
                self.improvement = Some(advice);
                self.state = WorkflowState::Improvement;
            }
            ActionOutcome::Finalized(award) => {
                self.finalized = Some(award);
                self.state = WorkflowState::Finalized;
            }
            ActionOutcome::Cleared => {
                self.state = WorkflowState::Input;
                self.transcript = Transcript::new();
                self.awardee = AwardeeInfo::default();
                self.recommendation = None;
                self.improvement = None;
                self.finalized = None;
            }
        }
    }

    fn fail(&mut self, prior: WorkflowState, message: String, now: DateTime<Utc>) {
        self.state = prior;
        self.transcript
            .push(Message::assistant(format!("Error: {message}"), now));
        self.error = Some(message);
    }

    pub fn render(&self) -> ViewModel {
        render(RenderInput {
            state: self.state,
            busy: self.is_busy(),
            guards: self.guards(),
            error: self.error.as_deref(),
            recommendation: self.recommendation.as_ref(),
            improvement: self.improvement.as_ref(),
            finalized: self.finalized.as_ref(),
        })
    }
}

impl Default for WorkflowController {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_REQUEST_TIMEOUT_SECS))
    }
}
