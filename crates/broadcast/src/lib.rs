//! Broadcast engine: one template to many recipients, sequentially, with
//! per-recipient outcome tracking.
//!
//! Sends are strictly sequential; the platform's rate limits are implicit
//! and unverified, so the loop trades throughput for not getting the
//! account flagged. A failed send is recorded for later retry before the
//! loop moves on; a failed record write is logged and does not stop the
//! loop.

use std::path::PathBuf;
use std::sync::Arc;

use bullhorn_platform::OutgoingMessage;
use bullhorn_session::SessionStore;
use bullhorn_store::{FailedMessageStore, MessageTemplate, StoreError, TemplateStore};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

/// Result type alias for broadcast operations
pub type BroadcastResult<T> = Result<T, BroadcastError>;

/// Errors that abort a broadcast before any send is attempted.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("template not found: {id}")]
    TemplateNotFound { id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one recipient within a broadcast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub chat_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SendOutcome {
    fn delivered(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            success: true,
            message: None,
        }
    }

    fn failed(chat_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Full per-recipient report of one broadcast call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed_count: usize,
    pub results: Vec<SendOutcome>,
}

impl BroadcastReport {
    pub fn all_delivered(&self) -> bool {
        self.failed_count == 0
    }
}

/// Sends one template to a set of roster recipients.
pub struct BroadcastEngine {
    store: SessionStore,
    templates: Arc<TemplateStore>,
    failed: Arc<FailedMessageStore>,
    uploads_dir: PathBuf,
}

impl BroadcastEngine {
    pub fn new(
        store: SessionStore,
        templates: Arc<TemplateStore>,
        failed: Arc<FailedMessageStore>,
        uploads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            templates,
            failed,
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Send `template_id` to every id in `recipient_ids`, in order. An
    /// unknown template aborts the whole call before any send; everything
    /// past that point is per-recipient and never aborts the loop.
    pub async fn broadcast(
        &self,
        recipient_ids: &[String],
        template_id: &str,
    ) -> BroadcastResult<BroadcastReport> {
        if !self.store.is_authenticated().await {
            return Err(BroadcastError::NotAuthenticated);
        }
        let handle = self
            .store
            .handle()
            .await
            .ok_or(BroadcastError::NotAuthenticated)?;

        let template = self
            .templates
            .get(template_id)
            .await
            .ok_or_else(|| BroadcastError::TemplateNotFound {
                id: template_id.to_string(),
            })?;
        let message = self.render(&template);

        let mut results = Vec::with_capacity(recipient_ids.len());
        let mut sent = 0usize;

        for recipient_id in recipient_ids {
            let Some(recipient) = self.store.find_recipient(recipient_id).await else {
                warn!(recipient_id, "recipient not in roster");
                results.push(SendOutcome::failed(recipient_id, "recipient not found"));
                continue;
            };

            match handle
                .send_message(&message, &recipient.id, recipient.kind)
                .await
            {
                Ok(()) => {
                    sent += 1;
                    results.push(SendOutcome::delivered(recipient_id));
                }
                Err(err) => {
                    warn!(recipient_id, error = %err, "send failed, recording for retry");
                    results.push(SendOutcome::failed(recipient_id, err.to_string()));
                    if let Err(store_err) = self
                        .failed
                        .add(
                            &recipient.id,
                            &recipient.display_name,
                            &template.id,
                            &template.display_name,
                        )
                        .await
                    {
                        error!(recipient_id, error = %store_err, "could not persist failed-send record");
                    }
                }
            }
        }

        let failed_count = results.iter().filter(|outcome| !outcome.success).count();
        info!(
            template = %template.id,
            sent,
            failed = failed_count,
            "broadcast finished"
        );
        Ok(BroadcastReport {
            sent,
            failed_count,
            results,
        })
    }

    fn render(&self, template: &MessageTemplate) -> OutgoingMessage {
        OutgoingMessage {
            text: template.content.clone(),
            attachments: template
                .attachments
                .iter()
                .map(|attachment| self.uploads_dir.join(&attachment.stored_filename))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bullhorn_platform::mock::MockPlatform;
    use bullhorn_platform::{Friend, GroupInfo, ThreadKind};
    use bullhorn_session::Recipient;
    use bullhorn_store::AttachmentRef;
    use tempfile::TempDir;

    struct Fixture {
        platform: MockPlatform,
        engine: BroadcastEngine,
        templates: Arc<TemplateStore>,
        failed: Arc<FailedMessageStore>,
        store: SessionStore,
        _dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let platform = MockPlatform::new();
        let store = SessionStore::new();
        store.bind_cookie_session(platform.handle()).await;
        store
            .replace_roster(vec![
                Recipient::from_friend(Friend {
                    user_id: "a".to_string(),
                    display_name: "Alice".to_string(),
                    avatar: String::new(),
                }),
                Recipient::from_friend(Friend {
                    user_id: "b".to_string(),
                    display_name: "Bob".to_string(),
                    avatar: String::new(),
                }),
                Recipient::from_group(GroupInfo {
                    group_id: "c".to_string(),
                    name: "Ops".to_string(),
                    avatar: String::new(),
                    member_count: Some(3),
                }),
            ])
            .await;

        let templates = Arc::new(TemplateStore::new(dir.path().join("templates.json")));
        let failed = Arc::new(FailedMessageStore::new(dir.path().join("failed.json")));
        let engine = BroadcastEngine::new(
            store.clone(),
            Arc::clone(&templates),
            Arc::clone(&failed),
            dir.path().join("uploads"),
        );

        Fixture {
            platform,
            engine,
            templates,
            failed,
            store,
            _dir: dir,
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn partial_failure_records_exactly_the_failing_recipient() {
        let fx = fixture().await;
        let template = fx
            .templates
            .create("Welcome", "hello", Vec::new())
            .await
            .unwrap();
        fx.platform.fail_sends_to("b");

        let report = fx
            .engine
            .broadcast(&ids(&["a", "b", "c"]), &template.id)
            .await
            .unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(report.failed_count, 1);
        assert!(!report.all_delivered());
        assert!(!report.results[1].success);
        assert_eq!(report.results[1].chat_id, "b");

        let records = fx.failed.all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].recipient_id, "b");
        assert_eq!(records[0].recipient_display_name, "Bob");
        assert_eq!(records[0].template_id, template.id);
        assert_eq!(records[0].template_name, "Welcome");
    }

    #[tokio::test]
    async fn unknown_template_aborts_with_zero_side_effects() {
        let fx = fixture().await;

        let err = fx
            .engine
            .broadcast(&ids(&["a", "b"]), "no-such-template")
            .await
            .expect_err("template lookup must fail");

        assert!(matches!(err, BroadcastError::TemplateNotFound { .. }));
        assert!(fx.platform.sent_messages().is_empty());
        assert!(fx.failed.all().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_recipient_is_a_local_failure_without_a_record() {
        let fx = fixture().await;
        let template = fx
            .templates
            .create("Welcome", "hello", Vec::new())
            .await
            .unwrap();

        let report = fx
            .engine
            .broadcast(&ids(&["a", "ghost"]), &template.id)
            .await
            .unwrap();

        assert_eq!(report.sent, 1);
        assert_eq!(report.failed_count, 1);
        assert_eq!(
            report.results[1].message.as_deref(),
            Some("recipient not found")
        );
        assert!(fx.failed.all().await.is_empty());
    }

    #[tokio::test]
    async fn retry_then_delete_clears_the_failed_record() {
        let fx = fixture().await;
        let template = fx
            .templates
            .create("Retry me", "hello again", Vec::new())
            .await
            .unwrap();
        fx.platform.fail_sends_to("b");

        fx.engine
            .broadcast(&ids(&["b"]), &template.id)
            .await
            .unwrap();
        let record = fx.failed.all().await.into_iter().next().unwrap();

        fx.platform.clear_send_failure("b");
        let retry = fx
            .engine
            .broadcast(&ids(&["b"]), &template.id)
            .await
            .unwrap();
        assert!(retry.all_delivered());

        // Retry and cleanup are two separate operations by design.
        assert!(fx.failed.remove(&record.id).await.unwrap());
        assert!(fx.failed.all().await.is_empty());
    }

    #[tokio::test]
    async fn attachments_resolve_against_the_uploads_dir() {
        let fx = fixture().await;
        let template = fx
            .templates
            .create(
                "With media",
                "see attached",
                vec![AttachmentRef {
                    original_name: "banner.png".to_string(),
                    stored_filename: "1712-99.png".to_string(),
                    relative_path: "/uploads/1712-99.png".to_string(),
                    size_bytes: 10,
                    mime_type: "image/png".to_string(),
                }],
            )
            .await
            .unwrap();

        fx.engine
            .broadcast(&ids(&["c"]), &template.id)
            .await
            .unwrap();

        let sent = fx.platform.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, ThreadKind::Group);
        assert_eq!(sent[0].message.text, "see attached");
        assert!(sent[0].message.attachments[0].ends_with("uploads/1712-99.png"));
    }

    #[tokio::test]
    async fn unauthenticated_session_is_rejected() {
        let fx = fixture().await;
        let template = fx
            .templates
            .create("Welcome", "hello", Vec::new())
            .await
            .unwrap();
        fx.store.logout().await;

        let err = fx
            .engine
            .broadcast(&ids(&["a"]), &template.id)
            .await
            .expect_err("must require authentication");
        assert!(matches!(err, BroadcastError::NotAuthenticated));
        assert!(fx.platform.sent_messages().is_empty());
    }
}
