//! Status push channel.
//!
//! One-way stream restricted to the login flow: each client gets a status
//! snapshot on connect, then every [`StatusEvent`] the session machinery
//! broadcasts.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bullhorn_session::{LoginStatus, StatusEvent};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub status: LoginStatus,
    #[serde(rename = "hasQR")]
    pub has_qr: bool,
}

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let snapshot = StatusSnapshot {
        status: state.session().status().await,
        has_qr: state.login_flow().has_qr().await,
    };
    if send_json(&mut sender, &snapshot).await.is_err() {
        return;
    }

    let mut events = state.events().subscribe();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_json(&mut sender, &event).await.is_err() {
                        break;
                    }
                    if matches!(event, StatusEvent { status: LoginStatus::LoggedOut, .. }) {
                        debug!("client notified of logout");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "status subscriber lagged, continuing");
                }
                Err(RecvError::Closed) => break,
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                // The channel is one-way; inbound text is ignored.
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("status push connection closed");
}

async fn send_json<T, S>(sender: &mut S, value: &T) -> Result<(), axum::Error>
where
    T: Serialize,
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(value).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}
