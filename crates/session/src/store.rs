//! Process-wide session state.

use std::sync::Arc;

use bullhorn_platform::{PlatformHandle, ThreadKind};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Login state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    Waiting,
    GeneratingQr,
    Success,
    Error,
    LoggedOut,
}

/// A broadcast target: one friend or one group, normalised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: String,
    pub display_name: String,
    pub kind: ThreadKind,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u32>,
}

struct SessionInner {
    status: LoginStatus,
    handle: Option<Arc<dyn PlatformHandle>>,
    /// Monotonically increasing login-attempt epoch. 0 means no attempt has
    /// been made yet; every callback compares its captured epoch against the
    /// current one and drops itself on mismatch.
    generation: u64,
    roster: Vec<Recipient>,
}

/// Owned, injectable session state. All mutation goes through accessor
/// methods under one mutex, so compound transitions (logout, login
/// completion) are atomic from the caller's perspective.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<SessionInner>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                status: LoginStatus::Waiting,
                handle: None,
                generation: 0,
                roster: Vec::new(),
            })),
        }
    }

    pub async fn status(&self) -> LoginStatus {
        self.inner.lock().await.status
    }

    pub async fn handle(&self) -> Option<Arc<dyn PlatformHandle>> {
        self.inner.lock().await.handle.clone()
    }

    pub async fn generation(&self) -> u64 {
        self.inner.lock().await.generation
    }

    pub async fn roster(&self) -> Vec<Recipient> {
        self.inner.lock().await.roster.clone()
    }

    pub async fn find_recipient(&self, id: &str) -> Option<Recipient> {
        self.inner
            .lock()
            .await
            .roster
            .iter()
            .find(|recipient| recipient.id == id)
            .cloned()
    }

    pub async fn is_authenticated(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.status == LoginStatus::Success && inner.handle.is_some()
    }

    /// Start a fresh login attempt: advance the epoch, drop the handle and
    /// roster, and enter `generating_qr`. Returns the new epoch plus the
    /// superseded handle so the caller can stop its listener outside the
    /// lock.
    pub async fn begin_attempt(&self) -> (u64, Option<Arc<dyn PlatformHandle>>) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.status = LoginStatus::GeneratingQr;
        inner.roster.clear();
        let superseded = inner.handle.take();
        (inner.generation, superseded)
    }

    /// Bind the handle of a completed QR login. Rejected (returns false)
    /// when the attempt has been superseded.
    pub async fn complete_login(
        &self,
        generation: u64,
        handle: Arc<dyn PlatformHandle>,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return false;
        }
        inner.handle = Some(handle);
        inner.status = LoginStatus::Success;
        true
    }

    /// Bind a handle recovered through cookie credentials, outside any QR
    /// attempt.
    pub async fn bind_cookie_session(&self, handle: Arc<dyn PlatformHandle>) {
        let mut inner = self.inner.lock().await;
        inner.handle = Some(handle);
        inner.status = LoginStatus::Success;
    }

    pub async fn set_status_if_current(&self, generation: u64, status: LoginStatus) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return false;
        }
        inner.status = status;
        true
    }

    /// Move `generating_qr → waiting` once the QR is on display. A login
    /// that already completed during the settle delay stays `success`.
    pub async fn advance_to_waiting(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation || inner.status != LoginStatus::GeneratingQr {
            return false;
        }
        inner.status = LoginStatus::Waiting;
        true
    }

    /// Mark the current attempt failed and advance the epoch, so anything
    /// else still running for that attempt discards itself.
    pub async fn mark_error_if_current(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return false;
        }
        inner.status = LoginStatus::Error;
        inner.generation += 1;
        true
    }

    /// Wholesale roster swap, epoch-checked; readers never observe a partial
    /// roster.
    pub async fn replace_roster_if_current(
        &self,
        generation: u64,
        roster: Vec<Recipient>,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return false;
        }
        inner.roster = roster;
        true
    }

    /// Wholesale roster swap for the live session (explicit refresh).
    pub async fn replace_roster(&self, roster: Vec<Recipient>) {
        self.inner.lock().await.roster = roster;
    }

    /// Tear the session down: back to `waiting`, roster cleared, handle
    /// released. Returns the released handle so the caller can stop its
    /// listener.
    pub async fn logout(&self) -> Option<Arc<dyn PlatformHandle>> {
        let mut inner = self.inner.lock().await;
        inner.status = LoginStatus::Waiting;
        inner.roster.clear();
        inner.handle.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bullhorn_platform::mock::MockPlatform;

    #[tokio::test]
    async fn begin_attempt_advances_epoch_and_clears_state() {
        let store = SessionStore::new();
        let platform = MockPlatform::new();
        store.bind_cookie_session(platform.handle()).await;
        store
            .replace_roster(vec![Recipient {
                id: "u1".to_string(),
                display_name: "Alice".to_string(),
                kind: ThreadKind::Individual,
                avatar_url: String::new(),
                member_count: None,
            }])
            .await;

        let (generation, superseded) = store.begin_attempt().await;

        assert_eq!(generation, 1);
        assert!(superseded.is_some());
        assert_eq!(store.status().await, LoginStatus::GeneratingQr);
        assert!(store.roster().await.is_empty());
        assert!(store.handle().await.is_none());
    }

    #[tokio::test]
    async fn stale_completion_is_rejected() {
        let store = SessionStore::new();
        let platform = MockPlatform::new();

        let (first, _) = store.begin_attempt().await;
        let (second, _) = store.begin_attempt().await;

        assert!(!store.complete_login(first, platform.handle()).await);
        assert!(store.handle().await.is_none());

        assert!(store.complete_login(second, platform.handle()).await);
        assert_eq!(store.status().await, LoginStatus::Success);
        assert!(store.is_authenticated().await);
    }

    #[tokio::test]
    async fn mark_error_invalidates_the_attempt() {
        let store = SessionStore::new();
        let platform = MockPlatform::new();
        let (generation, _) = store.begin_attempt().await;

        assert!(store.mark_error_if_current(generation).await);
        assert_eq!(store.status().await, LoginStatus::Error);

        // The epoch moved on, so the attempt's late completion is dropped.
        assert!(!store.complete_login(generation, platform.handle()).await);
        assert!(!store.replace_roster_if_current(generation, Vec::new()).await);
    }

    #[tokio::test]
    async fn advance_to_waiting_never_demotes_a_completed_login() {
        let store = SessionStore::new();
        let platform = MockPlatform::new();
        let (generation, _) = store.begin_attempt().await;

        assert!(store.complete_login(generation, platform.handle()).await);
        assert!(!store.advance_to_waiting(generation).await);
        assert_eq!(store.status().await, LoginStatus::Success);

        let (next, _) = store.begin_attempt().await;
        assert!(store.advance_to_waiting(next).await);
        assert_eq!(store.status().await, LoginStatus::Waiting);
    }

    #[tokio::test]
    async fn logout_releases_handle_and_roster_atomically() {
        let store = SessionStore::new();
        let platform = MockPlatform::new();
        store.bind_cookie_session(platform.handle()).await;
        store
            .replace_roster(vec![Recipient {
                id: "g1".to_string(),
                display_name: "Ops".to_string(),
                kind: ThreadKind::Group,
                avatar_url: String::new(),
                member_count: Some(4),
            }])
            .await;

        let released = store.logout().await;

        assert!(released.is_some());
        assert_eq!(store.status().await, LoginStatus::Waiting);
        assert!(store.roster().await.is_empty());
        assert!(!store.is_authenticated().await);
    }
}
