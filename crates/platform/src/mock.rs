//! Scriptable in-memory platform for tests.
//!
//! Mirrors the real connector/handle pair but keeps everything in process:
//! tests preload friends and groups, mark recipients or group lookups as
//! failing, choose how the QR login resolves, and push listener events by
//! hand.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    CookieCredentials, Friend, GroupInfo, OutgoingMessage, PlatformConnector, PlatformContext,
    PlatformError, PlatformEvent, PlatformHandle, PlatformResult, ThreadKind,
};

/// How [`PlatformConnector::login_qr`] behaves on the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrLoginBehavior {
    /// Resolve immediately with a live handle.
    Resolve,
    /// Resolve after the given delay.
    ResolveAfter(Duration),
    /// Never resolve; the caller's timeout wins the race.
    Pending,
}

/// A message the mock accepted for delivery.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient_id: String,
    pub kind: ThreadKind,
    pub message: OutgoingMessage,
}

#[derive(Default)]
struct MockShared {
    friends: Mutex<Vec<Friend>>,
    groups: Mutex<Vec<GroupInfo>>,
    failing_group_ids: Mutex<HashSet<String>>,
    batch_details_fail: AtomicBool,
    failing_recipients: Mutex<HashSet<String>>,
    cookie_login_fails: AtomicBool,
    qr_behavior: Mutex<Option<QrLoginBehavior>>,
    sent: Mutex<Vec<SentMessage>>,
    event_tx: Mutex<Option<mpsc::Sender<PlatformEvent>>>,
    listener_stops: AtomicUsize,
}

/// Shared-state mock implementing [`PlatformConnector`].
#[derive(Clone, Default)]
pub struct MockPlatform {
    shared: Arc<MockShared>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_friends(&self, friends: Vec<Friend>) {
        *self.shared.friends.lock().unwrap() = friends;
    }

    pub fn set_groups(&self, groups: Vec<GroupInfo>) {
        *self.shared.groups.lock().unwrap() = groups;
    }

    /// Make metadata lookups containing `group_id` fail.
    pub fn fail_group(&self, group_id: impl Into<String>) {
        self.shared
            .failing_group_ids
            .lock()
            .unwrap()
            .insert(group_id.into());
    }

    pub fn set_batch_details_fail(&self, fail: bool) {
        self.shared.batch_details_fail.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sends_to(&self, recipient_id: impl Into<String>) {
        self.shared
            .failing_recipients
            .lock()
            .unwrap()
            .insert(recipient_id.into());
    }

    pub fn clear_send_failure(&self, recipient_id: &str) {
        self.shared
            .failing_recipients
            .lock()
            .unwrap()
            .remove(recipient_id);
    }

    pub fn set_cookie_login_fails(&self, fail: bool) {
        self.shared.cookie_login_fails.store(fail, Ordering::SeqCst);
    }

    pub fn set_qr_behavior(&self, behavior: QrLoginBehavior) {
        *self.shared.qr_behavior.lock().unwrap() = Some(behavior);
    }

    /// A live handle without going through a login call.
    pub fn handle(&self) -> Arc<dyn PlatformHandle> {
        Arc::new(MockHandle {
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.shared.sent.lock().unwrap().clone()
    }

    /// Push an event into the active listener. Returns false if no listener
    /// is running or the receiver was dropped.
    pub async fn emit(&self, event: PlatformEvent) -> bool {
        let tx = self.shared.event_tx.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn listener_active(&self) -> bool {
        self.shared.event_tx.lock().unwrap().is_some()
    }

    pub fn listener_stops(&self) -> usize {
        self.shared.listener_stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformConnector for MockPlatform {
    async fn login_qr(&self, qr_path: &Path) -> PlatformResult<Arc<dyn PlatformHandle>> {
        // Minimal placeholder artifact; tests only check for existence.
        tokio::fs::write(qr_path, b"mock-qr-png").await?;

        let behavior = self
            .shared
            .qr_behavior
            .lock()
            .unwrap()
            .unwrap_or(QrLoginBehavior::Resolve);
        match behavior {
            QrLoginBehavior::Resolve => {}
            QrLoginBehavior::ResolveAfter(delay) => tokio::time::sleep(delay).await,
            QrLoginBehavior::Pending => std::future::pending::<()>().await,
        }

        Ok(self.handle())
    }

    async fn login_with_credentials(
        &self,
        _credentials: &CookieCredentials,
    ) -> PlatformResult<Arc<dyn PlatformHandle>> {
        if self.shared.cookie_login_fails.load(Ordering::SeqCst) {
            return Err(PlatformError::LoginRejected("cookie expired".to_string()));
        }
        Ok(self.handle())
    }
}

struct MockHandle {
    shared: Arc<MockShared>,
}

#[async_trait]
impl PlatformHandle for MockHandle {
    async fn list_friends(&self) -> PlatformResult<Vec<Friend>> {
        Ok(self.shared.friends.lock().unwrap().clone())
    }

    async fn list_group_ids(&self) -> PlatformResult<Vec<String>> {
        Ok(self
            .shared
            .groups
            .lock()
            .unwrap()
            .iter()
            .map(|group| group.group_id.clone())
            .collect())
    }

    async fn group_details(&self, ids: &[String]) -> PlatformResult<Vec<GroupInfo>> {
        if self.shared.batch_details_fail.load(Ordering::SeqCst) {
            return Err(PlatformError::InvalidResponse(
                "group details unavailable".to_string(),
            ));
        }
        {
            let failing = self.shared.failing_group_ids.lock().unwrap();
            if ids.iter().any(|id| failing.contains(id)) {
                return Err(PlatformError::InvalidResponse(format!(
                    "no details for {}",
                    ids.join(",")
                )));
            }
        }
        let groups = self.shared.groups.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| groups.iter().find(|group| &group.group_id == id).cloned())
            .collect())
    }

    async fn send_message(
        &self,
        message: &OutgoingMessage,
        recipient_id: &str,
        kind: ThreadKind,
    ) -> PlatformResult<()> {
        if self
            .shared
            .failing_recipients
            .lock()
            .unwrap()
            .contains(recipient_id)
        {
            return Err(PlatformError::send_failed(recipient_id, "delivery refused"));
        }
        self.shared.sent.lock().unwrap().push(SentMessage {
            recipient_id: recipient_id.to_string(),
            kind,
            message: message.clone(),
        });
        Ok(())
    }

    async fn context(&self) -> PlatformResult<PlatformContext> {
        Ok(PlatformContext {
            cookie: "mock-cookie".to_string(),
            device_id: "mock-device".to_string(),
            user_agent: "mock-agent".to_string(),
        })
    }

    async fn start_listener(&self) -> PlatformResult<mpsc::Receiver<PlatformEvent>> {
        let (tx, rx) = mpsc::channel(8);
        *self.shared.event_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn stop_listener(&self) {
        if self.shared.event_tx.lock().unwrap().take().is_some() {
            self.shared.listener_stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}
