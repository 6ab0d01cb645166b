use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::domain::{Session, SessionId};
use super::repository::{RepositoryError, SessionRepository};

/// One JSON document per session under a directory, named `{uuid}.json`.
#[derive(Debug, Clone)]
pub struct FileSessionRepository {
    root: PathBuf,
}

impl FileSessionRepository {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| RepositoryError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn read(&self, path: &Path) -> Result<Option<Session>, RepositoryError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(RepositoryError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| RepositoryError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Writes through a sibling temp file so readers never see half a record.
    fn write(&self, session: &Session) -> Result<(), RepositoryError> {
        let path = self.path_for(&session.id);
        let staging = self.root.join(format!(".{}.json.tmp", session.id));
        let io_error = |source| RepositoryError::Io {
            path: path.clone(),
            source,
        };

        let payload = serde_json::to_vec_pretty(session).map_err(|source| {
            RepositoryError::Corrupt {
                path: path.clone(),
                source,
            }
        })?;
        let mut file = fs::File::create(&staging).map_err(io_error)?;
        file.write_all(&payload).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        fs::rename(&staging, &path).map_err(io_error)?;
        Ok(())
    }

    fn session_paths(&self) -> Result<Vec<PathBuf>, RepositoryError> {
        let entries = fs::read_dir(&self.root).map_err(|source| RepositoryError::Io {
            path: self.root.clone(),
            source,
        })?;
        Ok(entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .and_then(SessionId::parse)
                        .is_some()
            })
            .collect())
    }
}

impl SessionRepository for FileSessionRepository {
    fn insert(&self, session: Session) -> Result<Session, RepositoryError> {
        if self.path_for(&session.id).exists() {
            return Err(RepositoryError::Conflict);
        }
        self.write(&session)?;
        Ok(session)
    }

    fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        self.write(session)
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        self.read(&self.path_for(id))
    }

    fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(RepositoryError::Io { path, source }),
        }
    }

    fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut removed = 0;
        for path in self.session_paths()? {
            let stale = match self.read(&path) {
                Ok(Some(session)) => session.updated_at < cutoff,
                Ok(None) => false,
                Err(RepositoryError::Corrupt { .. }) => {
                    tracing::warn!(path = %path.display(), "removing unreadable session record");
                    true
                }
                Err(err) => return Err(err),
            };
            if stale {
                fs::remove_file(&path).map_err(|source| RepositoryError::Io {
                    path: path.clone(),
                    source,
                })?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
