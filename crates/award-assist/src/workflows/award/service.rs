use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::advisor;
use super::citation::{render_html, CitationError, CitationGenerator};
use super::collaborators::{
    AssistantResponder, CollaboratorError, DocumentExtractor, DocumentKind,
};
use super::domain::{
    AwardTier, AwardeeInfo, AwardeeValidationError, FinalizedAward, ImprovementAdvice, Message,
    Recommendation, Session, SessionId, DEFAULT_SESSION_NAME,
};
use super::explanation;
use super::export::{self, ExportDocument, ExportError, ExportFormat};
use super::repository::{RepositoryError, SessionRepository};
use super::scoring::ScoringEngine;
use super::state::{transition, TransitionError, TransitionGuards, WorkflowAction};

pub const MAX_MESSAGE_CHARS: usize = 5_000;
pub const MAX_SESSION_NAME_CHARS: usize = 100;
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_EXTRACTED_CHARS: usize = 10_000;

/// Request to create or rename a session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUpsert {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub session_name: String,
    #[serde(default)]
    pub awardee_info: Option<AwardeeInfo>,
}

/// The user turn and the assistant reply appended by one chat call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub user: Message,
    pub reply: Message,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub filename: String,
    pub kind: DocumentKind,
    pub extracted_text: String,
    pub truncated: bool,
}

/// Service composing the repository, scoring engine, citation generator, and
/// conversational collaborators.
pub struct AwardWorkflowService<R, A> {
    repository: Arc<R>,
    responder: Arc<A>,
    extractor: Arc<dyn DocumentExtractor>,
    engine: Arc<ScoringEngine>,
    citations: Arc<CitationGenerator>,
}

impl<R, A> AwardWorkflowService<R, A>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    pub fn new(
        repository: Arc<R>,
        responder: Arc<A>,
        extractor: Arc<dyn DocumentExtractor>,
        engine: ScoringEngine,
    ) -> Self {
        Self {
            repository,
            responder,
            extractor,
            engine: Arc::new(engine),
            citations: Arc::new(CitationGenerator::default()),
        }
    }

    pub fn with_citations(mut self, citations: CitationGenerator) -> Self {
        self.citations = Arc::new(citations);
        self
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Returns the identified session, creating a fresh one when the id is absent or unknown.
    pub fn current_session(&self, id: Option<SessionId>) -> Result<Session, WorkflowError> {
        if let Some(id) = id {
            if let Some(session) = self.repository.fetch(&id)? {
                return Ok(session);
            }
        }
        let session = self.repository.insert(Session::new(Utc::now()))?;
        tracing::info!(session = %session.id, "session created");
        Ok(session)
    }

    pub fn load(&self, id: &SessionId) -> Result<Session, WorkflowError> {
        self.repository
            .fetch(id)?
            .ok_or(WorkflowError::NotFound(*id))
    }

    pub fn upsert(&self, request: SessionUpsert) -> Result<Session, WorkflowError> {
        let name = request.session_name.trim();
        if name.chars().count() > MAX_SESSION_NAME_CHARS {
            return Err(WorkflowError::Validation(format!(
                "session name must be at most {MAX_SESSION_NAME_CHARS} characters"
            )));
        }
        if let Some(info) = &request.awardee_info {
            info.validate()?;
        }

        let now = Utc::now();
        let existing = match request.session_id {
            Some(id) => self.repository.fetch(&id)?,
            None => None,
        };
        let created = existing.is_none();
        let mut session = existing.unwrap_or_else(|| match request.session_id {
            Some(id) => Session::with_id(id, now),
            None => Session::new(now),
        });

        session.name = if name.is_empty() {
            DEFAULT_SESSION_NAME.to_string()
        } else {
            name.to_string()
        };
        if let Some(info) = request.awardee_info {
            session.awardee_info = info;
        }
        session.updated_at = now;

        if created {
            self.repository.insert(session.clone())?;
        } else {
            self.repository.save(&session)?;
        }
        tracing::info!(session = %session.id, created, "session saved");
        Ok(session)
    }

    pub fn clear(&self, id: &SessionId) -> Result<Session, WorkflowError> {
        let mut session = self.load(id)?;
        transition(
            session.workflow_state,
            WorkflowAction::Clear,
            &guards(&session),
        )?;
        session.reset(Utc::now());
        self.repository.save(&session)?;
        tracing::info!(session = %session.id, "session cleared");
        Ok(session)
    }

    /// Appends the user turn and the assistant reply. Nothing is stored when the reply fails.
    pub fn chat(&self, id: &SessionId, message: &str) -> Result<ChatTurn, WorkflowError> {
        let content = message.trim();
        if content.is_empty() {
            return Err(WorkflowError::Validation("message must not be empty".into()));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(WorkflowError::Validation(format!(
                "message must be at most {MAX_MESSAGE_CHARS} characters"
            )));
        }

        let mut session = self.load(id)?;
        let reply = self.responder.reply(&session.messages, content)?;

        let now = Utc::now();
        let user = Message::user(content, now);
        let reply = Message::assistant(reply, now);
        session.messages.push(user.clone());
        session.messages.push(reply.clone());
        session.updated_at = now;
        self.repository.save(&session)?;

        tracing::debug!(session = %session.id, turns = session.messages.len(), "chat turn stored");
        Ok(ChatTurn { user, reply })
    }

    pub fn recommend(
        &self,
        id: &SessionId,
        awardee: Option<AwardeeInfo>,
    ) -> Result<Recommendation, WorkflowError> {
        self.rescore(id, awardee, WorkflowAction::Generate)
    }

    /// Recomputes from the full transcript; a stored finalized award is left as is.
    pub fn refresh(
        &self,
        id: &SessionId,
        awardee: Option<AwardeeInfo>,
    ) -> Result<Recommendation, WorkflowError> {
        self.rescore(id, awardee, WorkflowAction::Refresh)
    }

    fn rescore(
        &self,
        id: &SessionId,
        awardee: Option<AwardeeInfo>,
        action: WorkflowAction,
    ) -> Result<Recommendation, WorkflowError> {
        let mut session = self.load(id)?;
        apply_awardee(&mut session, awardee)?;
        let next = transition(session.workflow_state, action, &guards(&session))?;

        let narrative = session.messages.narrative();
        let assessment = self.engine.score(&narrative, &session.awardee_info);
        let policy = self.engine.policy();
        let now = Utc::now();

        let recommendation = Recommendation {
            award: assessment.tier,
            explanation: explanation::build(&assessment, policy),
            suggestions: advisor::suggest(&assessment.scores, assessment.tier, policy),
            scores: assessment.scores,
            policy_version: assessment.policy_version,
            requirements_met: assessment.requirements_met,
            operational_device: assessment.operational_device,
            generated_at: now,
        };

        session.recommendation = Some(recommendation.clone());
        session.improvement = None;
        session.workflow_state = next;
        session.updated_at = now;
        self.repository.save(&session)?;

        tracing::info!(
            session = %session.id,
            action = action.label(),
            award = recommendation.award.abbreviation(),
            total = recommendation.scores.total_weighted(),
            "recommendation generated"
        );
        Ok(recommendation)
    }

    /// Suggestions for the stored recommendation. The tier never changes here.
    pub fn improve(
        &self,
        id: &SessionId,
        current_award: Option<AwardTier>,
    ) -> Result<ImprovementAdvice, WorkflowError> {
        let mut session = self.load(id)?;
        let next = transition(
            session.workflow_state,
            WorkflowAction::Improve,
            &guards(&session),
        )?;
        let recommendation = session
            .recommendation
            .as_ref()
            .ok_or(TransitionError::NoCurrentAward(WorkflowAction::Improve))?;

        if let Some(hint) = current_award.filter(|hint| *hint != recommendation.award) {
            tracing::debug!(
                session = %session.id,
                requested = hint.abbreviation(),
                stored = recommendation.award.abbreviation(),
                "client award differs from stored recommendation; using stored"
            );
        }

        let now = Utc::now();
        let advice = ImprovementAdvice {
            current_award: recommendation.award,
            suggestions: advisor::suggest(
                &recommendation.scores,
                recommendation.award,
                self.engine.policy(),
            ),
            current_scores: recommendation.scores.clone(),
            generated_at: now,
        };

        session.improvement = Some(advice.clone());
        session.workflow_state = next;
        session.updated_at = now;
        self.repository.save(&session)?;
        Ok(advice)
    }

    /// Freezes the recommendation (or an explicitly chosen tier) into a citation.
    pub fn finalize(
        &self,
        id: &SessionId,
        award: Option<AwardTier>,
        awardee: Option<AwardeeInfo>,
    ) -> Result<FinalizedAward, WorkflowError> {
        let mut session = self.load(id)?;
        apply_awardee(&mut session, awardee)?;

        let mut checks = guards(&session);
        if checks
            .current_award
            .is_some_and(|stored| stored != AwardTier::NoAward)
        {
            if let Some(chosen) = award {
                checks.current_award = Some(chosen);
            }
        }
        let next = transition(session.workflow_state, WorkflowAction::Finalize, &checks)?;
        let tier = checks
            .current_award
            .ok_or(TransitionError::NoCurrentAward(WorkflowAction::Finalize))?;

        let operational_device = session.awardee_info.operational_device
            && self.engine.policy().operational_device_authorized(tier);
        let citation = self.citations.generate(
            tier,
            &session.awardee_info,
            &session.messages.narrative(),
            operational_device,
        )?;

        let now = Utc::now();
        let finalized = FinalizedAward {
            award: tier,
            display_citation: render_html(&citation),
            citation,
            operational_device,
            finalized_at: now,
        };

        session.finalized_award = Some(finalized.clone());
        session.workflow_state = next;
        session.updated_at = now;
        self.repository.save(&session)?;

        tracing::info!(session = %session.id, award = tier.abbreviation(), "award finalized");
        Ok(finalized)
    }

    pub fn export(
        &self,
        id: &SessionId,
        format: ExportFormat,
        awardee: Option<AwardeeInfo>,
    ) -> Result<ExportDocument, WorkflowError> {
        let mut session = self.load(id)?;
        if awardee.is_some() {
            apply_awardee(&mut session, awardee)?;
            session.updated_at = Utc::now();
            self.repository.save(&session)?;
        }
        let document = export::export(&session, format, Utc::now())?;
        tracing::info!(
            session = %session.id,
            format = format.extension(),
            bytes = document.size,
            "award package exported"
        );
        Ok(document)
    }

    /// Extracts text from an uploaded document and folds it into the transcript as a user turn.
    pub fn upload(
        &self,
        id: &SessionId,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<UploadOutcome, WorkflowError> {
        if bytes.is_empty() {
            return Err(WorkflowError::Validation("uploaded file is empty".into()));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(WorkflowError::Validation(format!(
                "file exceeds the {} MB upload limit",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }
        let kind = DocumentKind::detect(filename, content_type).ok_or_else(|| {
            WorkflowError::Validation(format!(
                "unsupported file type for '{filename}'; allowed: pdf, doc, docx, txt, md"
            ))
        })?;

        let mut session = self.load(id)?;
        let raw = self.extractor.extract(kind, bytes)?;
        let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(WorkflowError::Validation(
                "no text could be extracted from the document".into(),
            ));
        }
        let truncated = text.chars().count() > MAX_EXTRACTED_CHARS;
        let text: String = text.chars().take(MAX_EXTRACTED_CHARS).collect();

        let now = Utc::now();
        session.messages.push(Message::user(
            format!("Document content from {filename}:\n\n{text}"),
            now,
        ));
        session.updated_at = now;
        self.repository.save(&session)?;

        tracing::info!(
            session = %session.id,
            kind = kind.label(),
            characters = text.chars().count(),
            truncated,
            "document folded into transcript"
        );
        Ok(UploadOutcome {
            filename: filename.to_string(),
            kind,
            extracted_text: text,
            truncated,
        })
    }

    /// Drops sessions idle for longer than `max_age`.
    pub fn purge_expired(&self, max_age: Duration) -> Result<usize, WorkflowError> {
        let removed = self.repository.purge_expired(Utc::now() - max_age)?;
        if removed > 0 {
            tracing::info!(removed, "expired sessions purged");
        }
        Ok(removed)
    }
}

fn guards(session: &Session) -> TransitionGuards {
    TransitionGuards {
        has_achievements: session.messages.has_user_turns(),
        current_award: session.current_award(),
    }
}

fn apply_awardee(
    session: &mut Session,
    awardee: Option<AwardeeInfo>,
) -> Result<(), AwardeeValidationError> {
    if let Some(info) = awardee {
        info.validate()?;
        session.awardee_info = info;
    }
    Ok(())
}

/// Error raised by the award workflow service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    State(String),
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::State(_) => "state",
            Self::NotFound(_) => "not_found",
            Self::Upstream(_) => "upstream",
            Self::Repository(_) => "repository",
        }
    }
}

impl From<TransitionError> for WorkflowError {
    fn from(err: TransitionError) -> Self {
        if err.is_validation() {
            Self::Validation(err.to_string())
        } else {
            Self::State(err.to_string())
        }
    }
}

impl From<AwardeeValidationError> for WorkflowError {
    fn from(err: AwardeeValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CitationError> for WorkflowError {
    fn from(err: CitationError) -> Self {
        Self::State(err.to_string())
    }
}

impl From<CollaboratorError> for WorkflowError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::Unsupported(_) | CollaboratorError::Unreadable(_) => {
                Self::Validation(err.to_string())
            }
            CollaboratorError::Unavailable(_) => Self::Upstream(err.to_string()),
        }
    }
}

impl From<ExportError> for WorkflowError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::NothingToExport(_) => Self::State(err.to_string()),
            ExportError::Serialization(_) => Self::Upstream(err.to_string()),
        }
    }
}
