//! QR login, logout, and the QR image artifact.

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bullhorn_session::LoginStatus;
use serde::{Deserialize, Serialize};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct QrRequest {
    /// "create" or "refresh"; both restart the flow, the distinction is
    /// informational for the console.
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    pub message: String,
    pub qr_url: String,
    pub qr_session_id: u64,
}

pub async fn create_qr(
    State(state): State<AppState>,
    Json(request): Json<QrRequest>,
) -> Result<Json<QrResponse>, ApiError> {
    if state.session().status().await == LoginStatus::Success {
        return Err(ApiError::bad_request("already logged in"));
    }

    tracing::info!(action = request.action.as_deref().unwrap_or("create"), "QR requested");
    let started = state.login_flow().begin_qr_login().await?;

    Ok(Json(QrResponse {
        message: "QR code ready".to_string(),
        qr_url: started.qr_url,
        qr_session_id: started.generation,
    }))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

pub async fn logout(State(state): State<AppState>) -> Json<LogoutResponse> {
    state.login_flow().logout().await;
    Json(LogoutResponse {
        message: "Logged out".to_string(),
    })
}

pub async fn qr_image(State(state): State<AppState>) -> Result<Response, ApiError> {
    match tokio::fs::read(&state.storage().qr_file).await {
        Ok(bytes) => Ok(([(CONTENT_TYPE, "image/png")], bytes).into_response()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::not_found("QR code not found"))
        }
        Err(err) => Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to read QR image: {err}"),
        )),
    }
}
