//! Broadcast endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bullhorn_broadcast::SendOutcome;
use serde::{Deserialize, Serialize};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub chat_ids: Vec<String>,
    #[serde(default)]
    pub template_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub message: String,
    pub sent: usize,
    pub failed_count: usize,
    pub results: Vec<SendOutcome>,
}

/// Runs the broadcast and reports per-recipient outcomes. Full success is a
/// 200; partial failure carries the same body under a 500 so the console can
/// render both paths identically.
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    state.require_session().await?;

    let template_id = request
        .template_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let (chat_ids, template_id) = match (request.chat_ids.as_slice(), template_id) {
        (ids, Some(template_id)) if !ids.is_empty() => (ids, template_id),
        _ => return Err(ApiError::bad_request("missing chatIds or templateId")),
    };

    let report = state.broadcast().broadcast(chat_ids, template_id).await?;

    let status = if report.all_delivered() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let message = if report.all_delivered() {
        "messages sent".to_string()
    } else {
        format!("sending failed for {} chats", report.failed_count)
    };

    Ok((
        status,
        Json(SendMessageResponse {
            message,
            sent: report.sent,
            failed_count: report.failed_count,
            results: report.results,
        }),
    )
        .into_response())
}
