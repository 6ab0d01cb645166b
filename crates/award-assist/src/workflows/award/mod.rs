//! Award recommendation drafting: transcript accumulation, scoring, tier
//! recommendation, improvement advice, citation finalization, and export.
//!
//! The server side is [`AwardWorkflowService`] behind [`award_router`]; the
//! client contract is modelled by [`WorkflowController`], which renders a
//! DOM-free [`ViewModel`].

pub mod advisor;
pub mod citation;
pub mod collaborators;
pub mod controller;
pub mod domain;
pub mod explanation;
pub mod export;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod state;
pub mod store;
pub mod view;

#[cfg(test)]
mod tests;

pub use citation::{render_html, render_plain, CitationGenerator, CitationIssue, CitationLayout};
pub use collaborators::{
    AcknowledgingResponder, AssistantResponder, CollaboratorError, DocumentExtractor,
    DocumentKind, PlainTextExtractor,
};
pub use controller::{ActionOutcome, Completion, Ticket, WorkflowController};
pub use domain::{
    parse_date, AwardTier, AwardeeInfo, Criterion, FinalizedAward, ImprovementAdvice, Message,
    Recommendation, Role, Session, SessionId, Transcript, WorkflowState,
};
pub use export::{ExportDocument, ExportFormat};
pub use repository::{RepositoryError, SessionRepository};
pub use router::{award_router, SESSION_HEADER};
pub use scoring::{Assessment, PolicyError, ScoreCard, ScoringEngine, ScoringPolicy};
pub use service::{AwardWorkflowService, ChatTurn, SessionUpsert, UploadOutcome, WorkflowError};
pub use state::{transition, TransitionError, TransitionGuards, WorkflowAction};
pub use store::FileSessionRepository;
pub use view::{Control, Panel, ViewModel};
