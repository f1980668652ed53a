//! Shared application state for the API surface.

use std::sync::Arc;
use std::time::Duration;

use bullhorn_broadcast::BroadcastEngine;
use bullhorn_config::{AppConfig, StorageConfig};
use bullhorn_platform::PlatformConnector;
use bullhorn_session::{
    AuthGate, CredentialFile, LoginFlow, LoginOptions, SessionStore, StatusBroadcaster,
};
use bullhorn_store::{FailedMessageStore, TemplateStore};

use crate::ApiError;

/// Shared application state wiring the session machinery, the flat-file
/// stores, and the broadcast engine together. One instance per process;
/// tests build isolated instances against a mock connector.
#[derive(Clone)]
pub struct AppState {
    session: SessionStore,
    auth_gate: Arc<AuthGate>,
    login_flow: Arc<LoginFlow>,
    events: StatusBroadcaster,
    templates: Arc<TemplateStore>,
    failed: Arc<FailedMessageStore>,
    broadcast: Arc<BroadcastEngine>,
    storage: StorageConfig,
}

impl AppState {
    pub fn new(config: &AppConfig, connector: Arc<dyn PlatformConnector>) -> Self {
        let session = SessionStore::new();
        let credentials = CredentialFile::new(&config.storage.auth_file);
        let events = StatusBroadcaster::new();

        let login_flow = Arc::new(LoginFlow::new(
            session.clone(),
            Arc::clone(&connector),
            credentials.clone(),
            events.clone(),
            LoginOptions::from_config(&config.storage, &config.platform),
        ));
        let auth_gate = Arc::new(AuthGate::new(
            session.clone(),
            credentials,
            connector,
            Duration::from_secs(config.auth.credential_max_age_seconds),
        ));

        let templates = Arc::new(TemplateStore::new(&config.storage.templates_file));
        let failed = Arc::new(FailedMessageStore::new(&config.storage.failed_messages_file));
        let broadcast = Arc::new(BroadcastEngine::new(
            session.clone(),
            Arc::clone(&templates),
            Arc::clone(&failed),
            &config.storage.uploads_dir,
        ));

        Self {
            session,
            auth_gate,
            login_flow,
            events,
            templates,
            failed,
            broadcast,
            storage: config.storage.clone(),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn login_flow(&self) -> &Arc<LoginFlow> {
        &self.login_flow
    }

    pub fn events(&self) -> &StatusBroadcaster {
        &self.events
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn failed_messages(&self) -> &FailedMessageStore {
        &self.failed
    }

    pub fn broadcast(&self) -> &BroadcastEngine {
        &self.broadcast
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Gate for protected routes: revalidates the credential record and the
    /// in-memory session, answering 401 when neither yields a usable login.
    pub async fn require_session(&self) -> Result<(), ApiError> {
        if self.auth_gate.ensure_session().await && self.session.is_authenticated().await {
            return Ok(());
        }
        Err(ApiError::unauthorized("not logged in"))
    }
}
