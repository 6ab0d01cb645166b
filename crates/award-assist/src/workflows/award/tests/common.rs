use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::workflows::award::collaborators::{
    AcknowledgingResponder, AssistantResponder, CollaboratorError, PlainTextExtractor,
};
use crate::workflows::award::domain::{AwardeeInfo, Session, SessionId, Transcript};
use crate::workflows::award::repository::{RepositoryError, SessionRepository};
use crate::workflows::award::scoring::ScoringEngine;
use crate::workflows::award::{award_router, AwardWorkflowService};

pub(super) const SCENARIO_NARRATIVE: &str =
    "Led a 10-person team during a 72-hour search and rescue, saving 3 lives";

pub(super) const STRONG_NARRATIVE: &str = "As officer in charge of Station Grand Haven, I led 45 personnel through the 2024 search and rescue season. \
I directed 312 cases across the district, saving 27 lives and preventing $4.2 million in property loss. \
I developed a new process for night boat crew qualification that reduced training time by 35 percent, and I mentored and trained 12 coxswains. \
Despite severe weather and limited resources, our crews responded within 15 minutes, resulting in a 98% success rate recognized at the national level.";

pub(super) fn awardee() -> AwardeeInfo {
    AwardeeInfo {
        name: "J. Smith".to_string(),
        rank: "PO2".to_string(),
        unit: "Station Grand Haven".to_string(),
        position: "Boatswain's Mate".to_string(),
        date_start: NaiveDate::from_ymd_opt(2024, 1, 1),
        date_end: NaiveDate::from_ymd_opt(2024, 12, 31),
        operational_device: false,
    }
}

pub(super) type TestService = AwardWorkflowService<MemoryRepository, AcknowledgingResponder>;

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = AwardWorkflowService::new(
        repository.clone(),
        Arc::new(AcknowledgingResponder),
        Arc::new(PlainTextExtractor),
        ScoringEngine::default(),
    );
    (service, repository)
}

/// Creates a session and chats each narrative turn into it.
pub(super) fn seeded_session(service: &TestService, turns: &[&str]) -> SessionId {
    let session = service.current_session(None).expect("session created");
    for turn in turns {
        service.chat(&session.id, turn).expect("chat stored");
    }
    session.id
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl MemoryRepository {
    pub(super) fn stored(&self, id: &SessionId) -> Option<Session> {
        self.sessions
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
    }
}

impl SessionRepository for MemoryRepository {
    fn insert(&self, session: Session) -> Result<Session, RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        if guard.contains_key(&session.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(session.id, session.clone());
        Ok(session)
    }

    fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        guard.insert(session.id, session.clone());
        Ok(())
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let guard = self.sessions.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        Ok(guard.remove(id).is_some())
    }

    fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        let before = guard.len();
        guard.retain(|_, session| session.updated_at >= cutoff);
        Ok(before - guard.len())
    }
}

pub(super) struct UnavailableRepository;

impl SessionRepository for UnavailableRepository {
    fn insert(&self, _session: Session) -> Result<Session, RepositoryError> {
        Err(RepositoryError::Unavailable("disk offline".to_string()))
    }

    fn save(&self, _session: &Session) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("disk offline".to_string()))
    }

    fn fetch(&self, _id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Err(RepositoryError::Unavailable("disk offline".to_string()))
    }

    fn delete(&self, _id: &SessionId) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("disk offline".to_string()))
    }

    fn purge_expired(&self, _cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("disk offline".to_string()))
    }
}

pub(super) struct OfflineResponder;

impl AssistantResponder for OfflineResponder {
    fn reply(&self, _transcript: &Transcript, _message: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable("model endpoint timed out".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn award_router_with_service(service: TestService) -> axum::Router {
    award_router(Arc::new(service))
}
