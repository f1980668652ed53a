//! Media upload for template attachments.

use std::path::Path as FsPath;

use axum::{
    extract::{Multipart, State},
    Json,
};
use bullhorn_store::AttachmentRef;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::{ApiError, AppState};

const ALLOWED_MIME_PREFIXES: &[&str] = &["image/", "video/", "audio/"];

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub files: Vec<AttachmentRef>,
}

/// Accepts a multipart form of `files` fields and stores each under the
/// uploads directory with a collision-free name, keeping the original
/// extension. Only media types the platform can forward are accepted.
pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let uploads_dir = state.storage().uploads_dir.clone();
    tokio::fs::create_dir_all(&uploads_dir)
        .await
        .map_err(|err| {
            ApiError::internal_server_error(format!("failed to create uploads dir: {err}"))
        })?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("malformed upload: {err}")))?
    {
        if field.name() != Some("files") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field.content_type().unwrap_or_default().to_string();
        if !ALLOWED_MIME_PREFIXES
            .iter()
            .any(|prefix| mime_type.starts_with(prefix))
        {
            return Err(ApiError::bad_request("unsupported file type"));
        }

        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(format!("failed to read upload: {err}")))?;

        let stored_filename = stored_filename(&original_name);
        tokio::fs::write(uploads_dir.join(&stored_filename), &data)
            .await
            .map_err(|err| {
                ApiError::internal_server_error(format!("failed to store upload: {err}"))
            })?;

        files.push(AttachmentRef {
            original_name,
            relative_path: format!("/uploads/{stored_filename}"),
            stored_filename,
            size_bytes: data.len() as u64,
            mime_type,
        });
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("no files uploaded"));
    }

    info!(count = files.len(), "stored uploaded files");
    Ok(Json(UploadResponse {
        message: format!("uploaded {} files", files.len()),
        files,
    }))
}

fn stored_filename(original_name: &str) -> String {
    let extension = FsPath::new(original_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    format!(
        "{}-{}{}",
        Utc::now().timestamp_millis(),
        rand::thread_rng().gen_range(0..1_000_000_000u32),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_filename_keeps_the_extension() {
        let name = stored_filename("banner.final.PNG");
        assert!(name.ends_with(".PNG"));
        assert!(name.contains('-'));
    }

    #[test]
    fn stored_filename_without_extension() {
        let name = stored_filename("README");
        assert!(!name.contains('.'));
    }
}
