//! HTTP bridge implementation of the platform traits.
//!
//! The vendor client library runs inside a separate bridge process; this
//! module talks to it over a small JSON-over-HTTP protocol:
//!
//!   POST /qr/start                       -> { attempt_id, qr_png_b64 }
//!   GET  /qr/:attempt_id/result          -> { session_id }           (long poll)
//!   POST /sessions/cookie                -> { session_id }
//!   GET  /sessions/:id/context           -> PlatformContext
//!   GET  /sessions/:id/friends           -> { friends }
//!   GET  /sessions/:id/groups            -> { ids }
//!   POST /sessions/:id/groups/details    -> { groups }
//!   POST /sessions/:id/messages          -> 200 | error body
//!   GET  /sessions/:id/events?cursor=N   -> { events, cursor }       (long poll)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bullhorn_config::PlatformConfig;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    CookieCredentials, Friend, GroupInfo, OutgoingMessage, PlatformConnector, PlatformContext,
    PlatformError, PlatformEvent, PlatformHandle, PlatformResult, ThreadKind,
};

const EVENT_CHANNEL_CAPACITY: usize = 32;
const EVENT_POLL_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct QrStartResponse {
    attempt_id: String,
    qr_png_b64: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct FriendsResponse {
    friends: Vec<Friend>,
}

#[derive(Debug, Deserialize)]
struct GroupIdsResponse {
    ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GroupDetailsRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct GroupDetailsResponse {
    groups: Vec<GroupInfo>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    recipient_id: &'a str,
    kind: ThreadKind,
    text: &'a str,
    attachments: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<PlatformEvent>,
    cursor: u64,
}

/// Connector talking to the bridge process over HTTP.
pub struct HttpBridgeConnector {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBridgeConnector {
    pub fn new(config: &PlatformConfig) -> PlatformResult<Self> {
        let base_url = config.bridge_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|err| PlatformError::BridgeUnavailable(err.to_string()))?;

        Ok(Self { base_url, http })
    }

    /// Client without a global request timeout, for long-poll endpoints.
    fn long_poll_client() -> PlatformResult<reqwest::Client> {
        reqwest::Client::builder()
            .build()
            .map_err(|err| PlatformError::BridgeUnavailable(err.to_string()))
    }

    fn handle(&self, session_id: String) -> Arc<dyn PlatformHandle> {
        Arc::new(HttpBridgeHandle {
            base_url: self.base_url.clone(),
            http: self.http.clone(),
            session_id,
            listener: Mutex::new(None),
        })
    }
}

#[async_trait]
impl PlatformConnector for HttpBridgeConnector {
    async fn login_qr(&self, qr_path: &Path) -> PlatformResult<Arc<dyn PlatformHandle>> {
        let url = format!("{}/qr/start", self.base_url);
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let started: QrStartResponse = parse_success(resp).await?;

        let png = base64::engine::general_purpose::STANDARD
            .decode(started.qr_png_b64.as_bytes())
            .map_err(|err| PlatformError::InvalidResponse(format!("qr image: {err}")))?;
        tokio::fs::write(qr_path, png).await?;
        debug!(path = %qr_path.display(), "QR image written");

        // The result endpoint blocks until the operator scans the code, so
        // it goes through a client without a request timeout; the caller
        // applies its own deadline.
        let waiter = Self::long_poll_client()?;
        let url = format!("{}/qr/{}/result", self.base_url, started.attempt_id);
        let resp = waiter.get(&url).send().await.map_err(map_transport_error)?;
        let session: SessionResponse = parse_success(resp).await?;

        Ok(self.handle(session.session_id))
    }

    async fn login_with_credentials(
        &self,
        credentials: &CookieCredentials,
    ) -> PlatformResult<Arc<dyn PlatformHandle>> {
        let url = format!("{}/sessions/cookie", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(credentials)
            .send()
            .await
            .map_err(map_transport_error)?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            let message = error_message(resp).await;
            return Err(PlatformError::LoginRejected(message));
        }

        let session: SessionResponse = parse_success(resp).await?;
        Ok(self.handle(session.session_id))
    }
}

/// Live bridge session.
pub struct HttpBridgeHandle {
    base_url: String,
    http: reqwest::Client,
    session_id: String,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl HttpBridgeHandle {
    fn session_url(&self, suffix: &str) -> String {
        format!("{}/sessions/{}/{}", self.base_url, self.session_id, suffix)
    }
}

#[async_trait]
impl PlatformHandle for HttpBridgeHandle {
    async fn list_friends(&self) -> PlatformResult<Vec<Friend>> {
        let resp = self
            .http
            .get(self.session_url("friends"))
            .send()
            .await
            .map_err(map_transport_error)?;
        let parsed: FriendsResponse = parse_success(resp).await?;
        Ok(parsed.friends)
    }

    async fn list_group_ids(&self) -> PlatformResult<Vec<String>> {
        let resp = self
            .http
            .get(self.session_url("groups"))
            .send()
            .await
            .map_err(map_transport_error)?;
        let parsed: GroupIdsResponse = parse_success(resp).await?;
        Ok(parsed.ids)
    }

    async fn group_details(&self, ids: &[String]) -> PlatformResult<Vec<GroupInfo>> {
        let resp = self
            .http
            .post(self.session_url("groups/details"))
            .json(&GroupDetailsRequest { ids })
            .send()
            .await
            .map_err(map_transport_error)?;
        let parsed: GroupDetailsResponse = parse_success(resp).await?;
        Ok(parsed.groups)
    }

    async fn send_message(
        &self,
        message: &OutgoingMessage,
        recipient_id: &str,
        kind: ThreadKind,
    ) -> PlatformResult<()> {
        let payload = SendMessageRequest {
            recipient_id,
            kind,
            text: &message.text,
            attachments: message
                .attachments
                .iter()
                .map(|path| path.to_string_lossy().to_string())
                .collect(),
        };
        let resp = self
            .http
            .post(self.session_url("messages"))
            .json(&payload)
            .send()
            .await
            .map_err(|err| PlatformError::send_failed(recipient_id, err.to_string()))?;

        if resp.status().is_success() {
            return Ok(());
        }
        let reason = error_message(resp).await;
        Err(PlatformError::send_failed(recipient_id, reason))
    }

    async fn context(&self) -> PlatformResult<PlatformContext> {
        let resp = self
            .http
            .get(self.session_url("context"))
            .send()
            .await
            .map_err(map_transport_error)?;
        parse_success(resp).await
    }

    async fn start_listener(&self) -> PlatformResult<mpsc::Receiver<PlatformEvent>> {
        self.stop_listener().await;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let http = HttpBridgeConnector::long_poll_client()?;
        let events_url = self.session_url("events");

        let task = tokio::spawn(async move {
            let mut cursor = 0u64;
            loop {
                let request = http
                    .get(&events_url)
                    .query(&[("cursor", cursor)])
                    .send()
                    .await;
                match request {
                    Ok(resp) if resp.status().is_success() => {
                        match resp.json::<EventsResponse>().await {
                            Ok(batch) => {
                                cursor = batch.cursor;
                                for event in batch.events {
                                    if tx.send(event).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, "malformed event batch from bridge");
                                tokio::time::sleep(EVENT_POLL_RETRY_DELAY).await;
                            }
                        }
                    }
                    Ok(resp) => {
                        let message = error_message(resp).await;
                        if tx
                            .send(PlatformEvent::Error { message })
                            .await
                            .is_err()
                        {
                            return;
                        }
                        tokio::time::sleep(EVENT_POLL_RETRY_DELAY).await;
                    }
                    Err(err) => {
                        warn!(error = %err, "event poll failed, retrying");
                        tokio::time::sleep(EVENT_POLL_RETRY_DELAY).await;
                    }
                }
            }
        });

        *self.listener.lock().await = Some(task);
        Ok(rx)
    }

    async fn stop_listener(&self) {
        if let Some(task) = self.listener.lock().await.take() {
            task.abort();
            debug!(session = %self.session_id, "stopped bridge event listener");
        }
    }
}

impl Drop for HttpBridgeHandle {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.try_lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> PlatformError {
    PlatformError::BridgeUnavailable(err.to_string())
}

async fn error_message(resp: Response) -> String {
    let status = resp.status();
    resp.json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| format!("bridge returned {status}"))
}

async fn parse_success<T: for<'de> Deserialize<'de>>(resp: Response) -> PlatformResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let message = error_message(resp).await;
        return Err(PlatformError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    resp.json::<T>()
        .await
        .map_err(|err| PlatformError::InvalidResponse(err.to_string()))
}
