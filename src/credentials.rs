use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Long-lived OAuth 1.0a authorization material. Immutable once obtained;
/// replaced wholesale when the user re-authorizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

/// Durable, exclusive owner of the persisted credential. The file lives at
/// a fixed user-scoped path; absence means "not yet authorized".
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("credentials.json"),
        }
    }

    /// Read the persisted credential. A missing file or unparsable contents
    /// degrade to `None` (forcing re-authorization) rather than failing:
    /// losing cached tokens is recoverable.
    pub fn load(&self) -> Option<Credential> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(cred) => Some(cred),
            Err(e) => {
                warn!(
                    "Ignoring unparsable credential file {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Atomically replace the persisted credential. Failing to persist is
    /// fatal: silently dropping tokens would force the interactive flow on
    /// every run without warning.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Storage {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let payload = serde_json::to_string_pretty(credential)
            .map_err(|e| Error::Storage {
                path: self.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).map_err(|e| Error::Storage {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::Storage {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Delete the persisted credential; the next `acquire` re-runs the
    /// interactive flow. No-op when nothing is persisted.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    /// Return the cached credential, or run the injected interactive
    /// authorization collaborator once and persist its result.
    pub async fn acquire<F, Fut>(&self, authorize: F) -> Result<Credential>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Credential>>,
    {
        if let Some(cred) = self.load() {
            return Ok(cred);
        }
        let cred = authorize().await?;
        self.save(&cred)?;
        Ok(cred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credential {
        Credential {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            access_token: "at".into(),
            access_token_secret: "ats".into(),
        }
    }

    #[test]
    fn save_then_load_roundtrip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let cred = sample();
        CredentialStore::new(dir.path()).save(&cred).unwrap();
        // Fresh instance simulates a process restart.
        let loaded = CredentialStore::new(dir.path()).load().unwrap();
        assert_eq!(cred, loaded);
    }

    #[test]
    fn load_absent_and_corrupt_degrade_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        assert!(store.load().is_none());
        fs::write(dir.path().join("credentials.json"), "{not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.clear().unwrap();
        store.save(&sample()).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[tokio::test]
    async fn acquire_runs_collaborator_once_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        let cred = store.acquire(|| async { Ok(sample()) }).await.unwrap();
        assert_eq!(cred, sample());
        // Second acquire must hit the cache; a collaborator that panics
        // proves it is never invoked.
        let again = store
            .acquire(|| async { panic!("interactive flow re-run despite cache") })
            .await
            .unwrap();
        assert_eq!(again, sample());
    }

    #[tokio::test]
    async fn acquire_surfaces_denial_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        let err = store
            .acquire(|| async { Err(Error::AuthorizationDenied("declined".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthorizationDenied(_)));
        assert!(store.load().is_none());
    }
}
