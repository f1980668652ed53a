//! Persisted cookie credential record.

use std::path::{Path, PathBuf};

use bullhorn_platform::{CookieCredentials, PlatformContext};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::SessionResult;

/// Contents of the credential file written after a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    pub status: String,
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_time: Option<String>,
    pub cookie: String,
    pub device_id: String,
    pub user_agent: String,
}

impl StoredCredentials {
    pub fn from_context(context: PlatformContext) -> Self {
        let now = Utc::now();
        Self {
            status: "success".to_string(),
            timestamp_ms: now.timestamp_millis(),
            login_time: Some(now.to_rfc3339()),
            cookie: context.cookie,
            device_id: context.device_id,
            user_agent: context.user_agent,
        }
    }

    pub fn cookie_credentials(&self) -> CookieCredentials {
        CookieCredentials {
            cookie: self.cookie.clone(),
            device_id: self.device_id.clone(),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Milliseconds elapsed since the record was written. Clock skew into
    /// the future counts as age zero.
    pub fn age_ms(&self) -> i64 {
        (Utc::now().timestamp_millis() - self.timestamp_ms).max(0)
    }

    pub fn is_complete(&self) -> bool {
        !self.cookie.is_empty() && !self.device_id.is_empty() && !self.user_agent.is_empty()
    }
}

/// The credential file on disk.
#[derive(Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record; a missing or unreadable file yields `None`.
    pub async fn load(&self) -> Option<StoredCredentials> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "credential file unreadable");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "credential file corrupt");
                None
            }
        }
    }

    pub async fn save(&self, record: &StoredCredentials) -> SessionResult<()> {
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), "credential record saved");
        Ok(())
    }

    /// Delete the record; a file that never existed is fine.
    pub async fn clear(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "credential record cleared"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to clear credential record");
            }
        }
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}
