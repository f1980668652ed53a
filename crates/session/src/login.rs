//! QR login flow.
//!
//! `waiting → generating_qr → {success | error}`, with success and error
//! returning to `waiting` through logout and `generating_qr` re-enterable
//! through refresh. The HTTP caller never waits for the login race itself:
//! the QR call runs in the background against a timeout, and the caller gets
//! the QR reference back after a short settle delay. Every background
//! continuation carries the epoch it was minted under and drops itself once
//! the store has moved on.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bullhorn_config::{GroupFetchMode, PlatformConfig, StorageConfig};
use bullhorn_platform::{PlatformConnector, PlatformEvent, PlatformHandle};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::roster::sync_roster;
use crate::{
    CredentialFile, LoginStatus, SessionResult, SessionStore, StatusBroadcaster, StatusEvent,
    StoredCredentials,
};

/// Tunables for the QR handshake, usually taken from configuration.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    pub qr_path: PathBuf,
    pub login_timeout: Duration,
    pub settle_delay: Duration,
    pub group_fetch: GroupFetchMode,
}

impl LoginOptions {
    pub fn from_config(storage: &StorageConfig, platform: &PlatformConfig) -> Self {
        Self {
            qr_path: storage.qr_file.clone(),
            login_timeout: Duration::from_secs(platform.qr_login_timeout_seconds),
            settle_delay: Duration::from_millis(platform.qr_settle_delay_ms),
            group_fetch: platform.group_fetch,
        }
    }
}

/// What the HTTP caller gets back once a QR attempt is underway.
#[derive(Debug, Clone)]
pub struct QrLoginStarted {
    pub qr_url: String,
    pub generation: u64,
}

/// Orchestrates QR login attempts against the platform connector.
pub struct LoginFlow {
    store: SessionStore,
    connector: Arc<dyn PlatformConnector>,
    credentials: CredentialFile,
    events: StatusBroadcaster,
    options: LoginOptions,
    // Guards the attempt setup phase; concurrent refresh requests would
    // otherwise interleave their teardowns.
    begin_lock: Mutex<()>,
}

impl LoginFlow {
    pub fn new(
        store: SessionStore,
        connector: Arc<dyn PlatformConnector>,
        credentials: CredentialFile,
        events: StatusBroadcaster,
        options: LoginOptions,
    ) -> Self {
        Self {
            store,
            connector,
            credentials,
            events,
            options,
            begin_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn events(&self) -> &StatusBroadcaster {
        &self.events
    }

    /// Whether a QR artifact currently exists on disk.
    pub async fn has_qr(&self) -> bool {
        tokio::fs::try_exists(&self.options.qr_path)
            .await
            .unwrap_or(false)
    }

    /// Start (or restart) a QR login attempt. Tears down the superseded
    /// attempt, launches the login race in the background, and returns the
    /// QR reference after the settle delay without waiting for the race.
    pub async fn begin_qr_login(self: &Arc<Self>) -> SessionResult<QrLoginStarted> {
        let _serialised = self.begin_lock.lock().await;

        let (generation, superseded) = self.store.begin_attempt().await;
        if let Some(handle) = superseded {
            handle.stop_listener().await;
            debug!(generation, "stopped listener of superseded attempt");
        }
        remove_artifact(&self.options.qr_path).await;
        self.events.emit(StatusEvent::generating_qr());
        info!(generation, "QR login attempt started");

        let flow = Arc::clone(self);
        tokio::spawn(async move {
            flow.run_login_race(generation).await;
        });

        // Give the platform a moment to produce the QR artifact, then hand
        // the reference back regardless of how the race is doing.
        tokio::time::sleep(self.options.settle_delay).await;
        self.store.advance_to_waiting(generation).await;
        let qr_url = format!("/qr.png?t={}", Utc::now().timestamp_millis());
        self.events.emit(StatusEvent::waiting(qr_url.clone()));

        Ok(QrLoginStarted { qr_url, generation })
    }

    /// Re-fetch the roster for the live session.
    pub async fn refresh_roster(&self) -> SessionResult<usize> {
        let handle = self
            .store
            .handle()
            .await
            .ok_or(crate::SessionError::NotAuthenticated)?;
        let roster = sync_roster(&handle, self.options.group_fetch).await?;
        let count = roster.len();
        self.store.replace_roster(roster).await;
        info!(count, "roster refreshed");
        Ok(count)
    }

    /// Tear the session down and clear every persisted artifact.
    pub async fn logout(&self) {
        if let Some(handle) = self.store.logout().await {
            handle.stop_listener().await;
        }
        self.credentials.clear().await;
        remove_artifact(&self.options.qr_path).await;
        self.events.emit(StatusEvent::logged_out());
        info!("session logged out");
    }

    async fn run_login_race(self: Arc<Self>, generation: u64) {
        match tokio::time::timeout(
            self.options.login_timeout,
            self.connector.login_qr(&self.options.qr_path),
        )
        .await
        {
            Ok(Ok(handle)) => self.finish_login(generation, handle).await,
            Ok(Err(err)) => {
                warn!(generation, error = %err, "QR login failed");
            }
            Err(_) => {
                // Not fatal: the QR stays displayed and a later scan or an
                // explicit refresh can still succeed.
                warn!(generation, "QR login timed out");
            }
        }
    }

    async fn finish_login(self: &Arc<Self>, generation: u64, handle: Arc<dyn PlatformHandle>) {
        if !self
            .store
            .complete_login(generation, Arc::clone(&handle))
            .await
        {
            warn!(generation, "login resolved for a superseded attempt, discarding");
            return;
        }
        info!(generation, "QR login confirmed");

        self.persist_credentials(&handle).await;
        self.events.emit(StatusEvent::success());
        self.load_roster(generation, &handle).await;
        self.attach_listener(generation, handle).await;
    }

    async fn load_roster(&self, generation: u64, handle: &Arc<dyn PlatformHandle>) {
        match sync_roster(handle, self.options.group_fetch).await {
            Ok(roster) => {
                let count = roster.len();
                if self.store.replace_roster_if_current(generation, roster).await {
                    info!(generation, count, "roster loaded");
                }
            }
            Err(err) => {
                error!(generation, error = %err, "failed to load roster");
                self.events
                    .emit(StatusEvent::error(format!("Failed to load chat list: {err}")));
            }
        }
    }

    async fn persist_credentials(&self, handle: &Arc<dyn PlatformHandle>) {
        match handle.context().await {
            Ok(context) => {
                let record = StoredCredentials::from_context(context);
                if let Err(err) = self.credentials.save(&record).await {
                    warn!(error = %err, "failed to persist credentials");
                }
            }
            Err(err) => warn!(error = %err, "failed to read session context"),
        }
    }

    async fn attach_listener(self: &Arc<Self>, generation: u64, handle: Arc<dyn PlatformHandle>) {
        let mut events = match handle.start_listener().await {
            Ok(events) => events,
            Err(err) => {
                warn!(generation, error = %err, "failed to start session listener");
                return;
            }
        };

        let flow = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                flow.on_listener_event(generation, &handle, event).await;
            }
            debug!(generation, "session listener channel closed");
        });
    }

    async fn on_listener_event(
        &self,
        generation: u64,
        handle: &Arc<dyn PlatformHandle>,
        event: PlatformEvent,
    ) {
        if self.store.generation().await != generation {
            debug!(generation, ?event, "listener event for superseded attempt, ignoring");
            return;
        }

        match event {
            PlatformEvent::Connected => {
                self.store
                    .set_status_if_current(generation, LoginStatus::Success)
                    .await;
                self.persist_credentials(handle).await;
                self.events.emit(StatusEvent::success());
                self.load_roster(generation, handle).await;
            }
            PlatformEvent::Error { message } => {
                error!(generation, message, "session listener reported an error");
                self.store.mark_error_if_current(generation).await;
                self.events
                    .emit(StatusEvent::error(format!("Login error: {message}")));
            }
        }
    }
}

async fn remove_artifact(path: &PathBuf) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed stale artifact"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove artifact"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bullhorn_platform::mock::{MockPlatform, QrLoginBehavior};
    use bullhorn_platform::Friend;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> LoginOptions {
        LoginOptions {
            qr_path: dir.path().join("qr.png"),
            login_timeout: Duration::from_millis(200),
            settle_delay: Duration::from_millis(10),
            group_fetch: GroupFetchMode::Individual,
        }
    }

    fn flow(dir: &TempDir, platform: &MockPlatform) -> Arc<LoginFlow> {
        Arc::new(LoginFlow::new(
            SessionStore::new(),
            Arc::new(platform.clone()),
            CredentialFile::new(dir.path().join("auth.json")),
            StatusBroadcaster::new(),
            options(dir),
        ))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn immediate_scan_reaches_success_with_roster_and_credentials() {
        let dir = TempDir::new().unwrap();
        let platform = MockPlatform::new();
        platform.set_friends(vec![Friend {
            user_id: "u1".to_string(),
            display_name: "Alice".to_string(),
            avatar: String::new(),
        }]);
        let flow = flow(&dir, &platform);

        let started = flow.begin_qr_login().await.unwrap();
        assert_eq!(started.generation, 1);
        assert!(started.qr_url.starts_with("/qr.png?t="));
        assert!(flow.has_qr().await);

        settle().await;

        assert_eq!(flow.store().status().await, LoginStatus::Success);
        assert!(flow.store().is_authenticated().await);
        assert_eq!(flow.store().roster().await.len(), 1);
        assert!(platform.listener_active());
        assert!(CredentialFile::new(dir.path().join("auth.json"))
            .exists()
            .await);
    }

    #[tokio::test]
    async fn timeout_keeps_waiting_with_qr_displayed() {
        let dir = TempDir::new().unwrap();
        let platform = MockPlatform::new();
        platform.set_qr_behavior(QrLoginBehavior::Pending);
        let flow = flow(&dir, &platform);

        flow.begin_qr_login().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(flow.store().status().await, LoginStatus::Waiting);
        assert!(flow.store().handle().await.is_none());
        assert!(flow.has_qr().await);
        assert!(!CredentialFile::new(dir.path().join("auth.json"))
            .exists()
            .await);
    }

    #[tokio::test]
    async fn refresh_supersedes_a_slow_attempt() {
        let dir = TempDir::new().unwrap();
        let platform = MockPlatform::new();
        platform.set_qr_behavior(QrLoginBehavior::ResolveAfter(Duration::from_millis(120)));
        let flow = flow(&dir, &platform);

        let first = flow.begin_qr_login().await.unwrap();

        platform.set_qr_behavior(QrLoginBehavior::Pending);
        let second = flow.begin_qr_login().await.unwrap();
        assert!(second.generation > first.generation);

        // The first attempt resolves now, but its epoch is stale.
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(flow.store().status().await, LoginStatus::Waiting);
        assert!(flow.store().handle().await.is_none());
    }

    #[tokio::test]
    async fn refresh_stops_the_previous_listener() {
        let dir = TempDir::new().unwrap();
        let platform = MockPlatform::new();
        let flow = flow(&dir, &platform);

        flow.begin_qr_login().await.unwrap();
        settle().await;
        assert!(platform.listener_active());

        platform.set_qr_behavior(QrLoginBehavior::Pending);
        flow.begin_qr_login().await.unwrap();

        assert_eq!(platform.listener_stops(), 1);
    }

    #[tokio::test]
    async fn stale_listener_events_leave_state_untouched() {
        let dir = TempDir::new().unwrap();
        let platform = MockPlatform::new();
        let flow = flow(&dir, &platform);

        flow.begin_qr_login().await.unwrap();
        settle().await;
        let generation = flow.store().generation().await;
        let handle = flow.store().handle().await.unwrap();

        flow.on_listener_event(
            generation - 1,
            &handle,
            PlatformEvent::Error {
                message: "stale".to_string(),
            },
        )
        .await;
        assert_eq!(flow.store().status().await, LoginStatus::Success);

        flow.on_listener_event(
            generation,
            &handle,
            PlatformEvent::Error {
                message: "connection lost".to_string(),
            },
        )
        .await;
        assert_eq!(flow.store().status().await, LoginStatus::Error);
        // The epoch advanced, so later events from the dead attempt no-op.
        assert!(flow.store().generation().await > generation);
    }

    #[tokio::test]
    async fn connected_event_resyncs_the_roster() {
        let dir = TempDir::new().unwrap();
        let platform = MockPlatform::new();
        let flow = flow(&dir, &platform);

        flow.begin_qr_login().await.unwrap();
        settle().await;
        assert!(flow.store().roster().await.is_empty());

        platform.set_friends(vec![Friend {
            user_id: "u9".to_string(),
            display_name: "Late Friend".to_string(),
            avatar: String::new(),
        }]);
        assert!(platform.emit(PlatformEvent::Connected).await);
        settle().await;

        assert_eq!(flow.store().roster().await.len(), 1);
    }

    #[tokio::test]
    async fn logout_clears_session_and_artifacts() {
        let dir = TempDir::new().unwrap();
        let platform = MockPlatform::new();
        let flow = flow(&dir, &platform);

        flow.begin_qr_login().await.unwrap();
        settle().await;
        assert!(flow.store().is_authenticated().await);

        flow.logout().await;

        assert_eq!(flow.store().status().await, LoginStatus::Waiting);
        assert!(flow.store().handle().await.is_none());
        assert!(!flow.has_qr().await);
        assert!(!CredentialFile::new(dir.path().join("auth.json"))
            .exists()
            .await);
        assert_eq!(platform.listener_stops(), 1);
    }

    #[tokio::test]
    async fn status_events_follow_the_handshake() {
        let dir = TempDir::new().unwrap();
        let platform = MockPlatform::new();
        // Resolve after the settle delay so the event order is fixed.
        platform.set_qr_behavior(QrLoginBehavior::ResolveAfter(Duration::from_millis(40)));
        let flow = flow(&dir, &platform);
        let mut events = flow.events().subscribe();

        flow.begin_qr_login().await.unwrap();
        settle().await;

        assert_eq!(events.recv().await.unwrap(), StatusEvent::generating_qr());
        let waiting = events.recv().await.unwrap();
        assert_eq!(waiting.status, LoginStatus::Waiting);
        assert!(waiting.qr_url.is_some());
        let success = events.recv().await.unwrap();
        assert_eq!(success.status, LoginStatus::Success);
        assert_eq!(success.redirect.as_deref(), Some("/chats"));
    }
}
