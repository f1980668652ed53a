//! Failed-send record listing and deletion.

use axum::{
    extract::{Path, State},
    Json,
};
use bullhorn_store::FailedSendRecord;
use serde::Serialize;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMessagesResponse {
    pub failed_messages: Vec<FailedSendRecord>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}

pub async fn list_failed_messages(State(state): State<AppState>) -> Json<FailedMessagesResponse> {
    Json(FailedMessagesResponse {
        failed_messages: state.failed_messages().all().await,
    })
}

pub async fn delete_failed_message(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if !state.failed_messages().remove(&record_id).await? {
        return Err(ApiError::not_found("failed message not found"));
    }
    Ok(Json(DeletedResponse {
        message: "failed message deleted".to_string(),
    }))
}
