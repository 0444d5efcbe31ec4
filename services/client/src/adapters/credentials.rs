//! services/client/src/adapters/credentials.rs
//!
//! A `CredentialStore` backed by a small JSON file, so a sign-in survives
//! between runs of the binary.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use evaluation_core::domain::{Credential, StoredSession, User};
use evaluation_core::ports::{CredentialStore, PortError, PortResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

//=========================================================================================
// "Impure" On-Disk Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize, Default)]
struct SessionFile {
    token: Option<String>,
    user: Option<UserRecord>,
    #[serde(default)]
    login_count: u64,
}

#[derive(Serialize, Deserialize)]
struct UserRecord {
    id: i64,
    email: String,
}

impl SessionFile {
    fn to_domain(self) -> StoredSession {
        let credential = match (self.token, self.user) {
            (Some(token), Some(user)) => Some(Credential {
                token,
                user: User { id: user.id, email: user.email },
            }),
            _ => None,
        };
        StoredSession { credential, login_count: self.login_count }
    }

    fn from_domain(session: &StoredSession) -> Self {
        Self {
            token: session.credential.as_ref().map(|c| c.token.clone()),
            user: session.credential.as_ref().map(|c| UserRecord {
                id: c.user.id,
                email: c.user.email.clone(),
            }),
            login_count: session.login_count,
        }
    }
}

//=========================================================================================
// The Store
//=========================================================================================

pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> PortResult<StoredSession> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoredSession::default()),
            Err(e) => return Err(PortError::Unexpected(format!("{}: {}", self.path.display(), e))),
        };
        match serde_json::from_slice::<SessionFile>(&raw) {
            Ok(file) => Ok(file.to_domain()),
            Err(e) => {
                warn!("Ignoring unreadable session file {}: {}", self.path.display(), e);
                Ok(StoredSession::default())
            }
        }
    }

    async fn save(&self, session: &StoredSession) -> PortResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(format!("{}: {}", parent.display(), e)))?;
        }
        let body = serde_json::to_vec_pretty(&SessionFile::from_domain(session))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| PortError::Unexpected(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("evaluator-{}-{}", std::process::id(), name))
            .join("session.json")
    }

    #[tokio::test]
    async fn missing_file_means_signed_out() {
        let store = FileCredentialStore::new(scratch("missing"));
        assert_eq!(store.load().await.unwrap(), StoredSession::default());
    }

    #[tokio::test]
    async fn saved_session_loads_back() {
        let path = scratch("roundtrip");
        let store = FileCredentialStore::new(&path);
        let session = StoredSession {
            credential: Some(Credential {
                token: "abc".into(),
                user: User { id: 4, email: "ada@example.com".into() },
            }),
            login_count: 9,
        };
        store.save(&session).await.unwrap();
        assert_eq!(store.load().await.unwrap(), session);

        let signed_out = StoredSession { credential: None, login_count: 9 };
        store.save(&signed_out).await.unwrap();
        assert_eq!(store.load().await.unwrap(), signed_out);

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_empty() {
        let path = scratch("corrupt");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert_eq!(
            FileCredentialStore::new(&path).load().await.unwrap(),
            StoredSession::default()
        );
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
