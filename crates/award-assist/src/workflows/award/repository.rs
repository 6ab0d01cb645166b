use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::domain::{Session, SessionId};

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Implementations serialize individual reads and writes; the service never holds a
/// lock across a whole workflow action.
pub trait SessionRepository: Send + Sync {
    fn insert(&self, session: Session) -> Result<Session, RepositoryError>;
    fn save(&self, session: &Session) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;
    fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError>;
    /// Removes sessions last updated before `cutoff`, returning how many were dropped.
    fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("session already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("session storage io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session record {path} is unreadable: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
