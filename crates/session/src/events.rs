//! Login-flow status events pushed to connected console clients.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::LoginStatus;

const CHANNEL_CAPACITY: usize = 32;

/// One status transition, as delivered over the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub status: LoginStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl StatusEvent {
    pub fn generating_qr() -> Self {
        Self {
            status: LoginStatus::GeneratingQr,
            message: "Generating QR code...".to_string(),
            qr_url: None,
            redirect: None,
        }
    }

    pub fn waiting(qr_url: impl Into<String>) -> Self {
        Self {
            status: LoginStatus::Waiting,
            message: "Scan the QR code to log in".to_string(),
            qr_url: Some(qr_url.into()),
            redirect: None,
        }
    }

    pub fn success() -> Self {
        Self {
            status: LoginStatus::Success,
            message: "Login successful, redirecting...".to_string(),
            qr_url: None,
            redirect: Some("/chats".to_string()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: LoginStatus::Error,
            message: message.into(),
            qr_url: None,
            redirect: None,
        }
    }

    pub fn logged_out() -> Self {
        Self {
            status: LoginStatus::LoggedOut,
            message: "Logged out".to_string(),
            qr_url: None,
            redirect: None,
        }
    }
}

/// Fan-out of [`StatusEvent`]s to however many console clients are connected.
#[derive(Clone)]
pub struct StatusBroadcaster {
    tx: broadcast::Sender<StatusEvent>,
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Send to all current subscribers; having none is not an error.
    pub fn emit(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_every_subscriber() {
        let broadcaster = StatusBroadcaster::new();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        broadcaster.emit(StatusEvent::generating_qr());

        assert_eq!(first.recv().await.unwrap(), StatusEvent::generating_qr());
        assert_eq!(second.recv().await.unwrap(), StatusEvent::generating_qr());
    }

    #[test]
    fn emit_without_subscribers_is_a_no_op() {
        let broadcaster = StatusBroadcaster::new();
        broadcaster.emit(StatusEvent::logged_out());
    }
}
