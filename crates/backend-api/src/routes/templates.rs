//! Message template CRUD.

use axum::{
    extract::{Path, State},
    Json,
};
use bullhorn_store::{AttachmentRef, MessageTemplate};
use serde::{Deserialize, Serialize};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePayload {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

impl TemplatePayload {
    fn validated(self) -> Result<(String, String, Vec<AttachmentRef>), ApiError> {
        let display_name = self
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let content = self.content.filter(|content| !content.is_empty());
        match (display_name, content) {
            (Some(display_name), Some(content)) => Ok((display_name, content, self.attachments)),
            _ => Err(ApiError::bad_request("missing displayName or content")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TemplatesResponse {
    pub templates: Vec<MessageTemplate>,
}

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub template: MessageTemplate,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}

pub async fn list_templates(State(state): State<AppState>) -> Json<TemplatesResponse> {
    Json(TemplatesResponse {
        templates: state.templates().all().await,
    })
}

pub async fn create_template(
    State(state): State<AppState>,
    Json(payload): Json<TemplatePayload>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let (display_name, content, attachments) = payload.validated()?;
    let template = state
        .templates()
        .create(display_name, content, attachments)
        .await?;
    Ok(Json(TemplateResponse { template }))
}

pub async fn update_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    Json(payload): Json<TemplatePayload>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let (display_name, content, attachments) = payload.validated()?;
    let template = state
        .templates()
        .update(&template_id, display_name, content, attachments)
        .await?
        .ok_or_else(|| ApiError::not_found("template not found"))?;
    Ok(Json(TemplateResponse { template }))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if !state.templates().delete(&template_id).await? {
        return Err(ApiError::not_found("template not found"));
    }
    Ok(Json(DeletedResponse {
        message: "template deleted".to_string(),
    }))
}
