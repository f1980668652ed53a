use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Whether a thread is a direct (1:1) conversation or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadKind {
    Individual,
    Group,
}

/// A friend entry as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friend {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar: String,
}

/// Group metadata as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub member_count: Option<u32>,
}

/// Cookie credentials sufficient to re-establish a session without a QR scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieCredentials {
    pub cookie: String,
    pub device_id: String,
    pub user_agent: String,
}

/// The credential context of a live session, as exported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformContext {
    #[serde(default)]
    pub cookie: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub user_agent: String,
}

impl From<PlatformContext> for CookieCredentials {
    fn from(context: PlatformContext) -> Self {
        Self {
            cookie: context.cookie,
            device_id: context.device_id,
            user_agent: context.user_agent,
        }
    }
}

/// One outgoing message: text plus absolute paths of media attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl OutgoingMessage {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// Events emitted by the long-lived session listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// The session connected (or reconnected) successfully.
    Connected,
    /// The listener hit an error; the session may no longer be usable.
    Error { message: String },
}
