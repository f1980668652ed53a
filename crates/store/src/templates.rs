//! Message template store.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{StoreError, StoreResult};

/// A file uploaded through the console, referenced (not copied) by templates.
///
/// Attachment files on disk outlive the templates that reference them;
/// deleting or editing a template does not remove the files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub original_name: String,
    pub stored_filename: String,
    /// URL path under the uploads mount, e.g. `/uploads/17123-42.png`.
    pub relative_path: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

/// A reusable broadcast message: text content plus attachment references.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTemplate {
    pub id: String,
    pub display_name: String,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// CRUD over the templates JSON file.
pub struct TemplateStore {
    path: PathBuf,
}

impl TemplateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn all(&self) -> Vec<MessageTemplate> {
        read_collection(&self.path).await
    }

    pub async fn get(&self, id: &str) -> Option<MessageTemplate> {
        self.all().await.into_iter().find(|t| t.id == id)
    }

    pub async fn create(
        &self,
        display_name: impl Into<String>,
        content: impl Into<String>,
        attachments: Vec<AttachmentRef>,
    ) -> StoreResult<MessageTemplate> {
        let mut templates = self.all().await;
        let template = MessageTemplate {
            id: Uuid::new_v4().to_string(),
            display_name: display_name.into(),
            content: content.into(),
            attachments,
            created_at: Some(Utc::now().to_rfc3339()),
            updated_at: None,
        };
        templates.push(template.clone());
        write_collection(&self.path, &templates).await?;
        Ok(template)
    }

    /// Replaces the template wholesale, stamping `updated_at`. Returns `None`
    /// when the id is unknown.
    pub async fn update(
        &self,
        id: &str,
        display_name: impl Into<String>,
        content: impl Into<String>,
        attachments: Vec<AttachmentRef>,
    ) -> StoreResult<Option<MessageTemplate>> {
        let mut templates = self.all().await;
        let Some(slot) = templates.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        *slot = MessageTemplate {
            id: id.to_string(),
            display_name: display_name.into(),
            content: content.into(),
            attachments,
            created_at: None,
            updated_at: Some(Utc::now().to_rfc3339()),
        };
        let updated = slot.clone();
        write_collection(&self.path, &templates).await?;
        Ok(Some(updated))
    }

    /// Returns false when the id is unknown.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut templates = self.all().await;
        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == before {
            return Ok(false);
        }
        write_collection(&self.path, &templates).await?;
        Ok(true)
    }
}

pub(crate) async fn read_collection<T: for<'de> Deserialize<'de>>(path: &Path) -> Vec<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "store unreadable, treating as empty");
            return Vec::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(items) => items,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "store corrupt, treating as empty");
            Vec::new()
        }
    }
}

pub(crate) async fn write_collection<T: Serialize>(path: &Path, items: &[T]) -> StoreResult<()> {
    let json = serde_json::to_vec_pretty(items).map_err(StoreError::Serialize)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
