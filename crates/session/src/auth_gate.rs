//! Credential revalidation on protected-request entry.

use std::sync::Arc;
use std::time::Duration;

use bullhorn_platform::PlatformConnector;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{CredentialFile, SessionStore};

/// Validates the persisted credential record and, when needed,
/// re-establishes a live handle through a cookie login.
///
/// Called on every protected request; concurrent callers are serialised by
/// an internal mutex so the store is only ever mutated by one re-login at a
/// time.
pub struct AuthGate {
    store: SessionStore,
    credentials: CredentialFile,
    connector: Arc<dyn PlatformConnector>,
    max_age: Duration,
    relogin: Mutex<()>,
}

impl AuthGate {
    pub fn new(
        store: SessionStore,
        credentials: CredentialFile,
        connector: Arc<dyn PlatformConnector>,
        max_age: Duration,
    ) -> Self {
        Self {
            store,
            credentials,
            connector,
            max_age,
            relogin: Mutex::new(()),
        }
    }

    /// True when a usable session exists (or could be re-established from
    /// the credential record). Any invalid record is deleted on the way out.
    pub async fn ensure_session(&self) -> bool {
        let _serialised = self.relogin.lock().await;

        let Some(record) = self.credentials.load().await else {
            self.credentials.clear().await;
            return false;
        };

        let max_age_ms = self.max_age.as_millis() as i64;
        if record.status != "success" || record.age_ms() >= max_age_ms || !record.is_complete() {
            debug!("credential record invalid or expired, clearing");
            self.credentials.clear().await;
            return false;
        }

        if self.store.handle().await.is_some() {
            return true;
        }

        match self
            .connector
            .login_with_credentials(&record.cookie_credentials())
            .await
        {
            Ok(handle) => {
                self.store.bind_cookie_session(handle).await;
                debug!("session re-established from stored credentials");
                true
            }
            Err(err) => {
                warn!(error = %err, "cookie login failed, clearing credential record");
                self.credentials.clear().await;
                false
            }
        }
    }
}
