use award_assist::config::ScoringConfig;
use award_assist::error::AppError;
use award_assist::workflows::award::{
    RepositoryError, ScoringEngine, ScoringPolicy, Session, SessionId, SessionRepository,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySessionRepository {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl SessionRepository for InMemorySessionRepository {
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

/// Builds the scoring engine from the configured policy file, or the built-in table.
pub(crate) fn load_engine(config: &ScoringConfig) -> Result<ScoringEngine, AppError> {
    let policy = match &config.policy_path {
        Some(path) => ScoringPolicy::from_path(path)?,
        None => ScoringPolicy::standard(),
    };
    info!(version = %policy.version, "scoring policy loaded");
    Ok(ScoringEngine::new(policy))
}
