//! Failed-send record store.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::templates::{read_collection, write_collection};
use crate::StoreResult;

/// One delivery failure, kept until the operator retries or discards it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSendRecord {
    pub id: String,
    pub recipient_id: String,
    pub recipient_display_name: String,
    pub template_id: String,
    pub template_name: String,
    pub timestamp: String,
}

/// Keyed-array CRUD over the failed-messages JSON file.
pub struct FailedMessageStore {
    path: PathBuf,
}

impl FailedMessageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn all(&self) -> Vec<FailedSendRecord> {
        read_collection(&self.path).await
    }

    pub async fn get(&self, id: &str) -> Option<FailedSendRecord> {
        self.all().await.into_iter().find(|record| record.id == id)
    }

    pub async fn add(
        &self,
        recipient_id: impl Into<String>,
        recipient_display_name: impl Into<String>,
        template_id: impl Into<String>,
        template_name: impl Into<String>,
    ) -> StoreResult<FailedSendRecord> {
        let mut records = self.all().await;
        let record = FailedSendRecord {
            id: Uuid::new_v4().to_string(),
            recipient_id: recipient_id.into(),
            recipient_display_name: recipient_display_name.into(),
            template_id: template_id.into(),
            template_name: template_name.into(),
            timestamp: Utc::now().to_rfc3339(),
        };
        records.push(record.clone());
        write_collection(&self.path, &records).await?;
        Ok(record)
    }

    /// Returns false when the id is unknown.
    pub async fn remove(&self, id: &str) -> StoreResult<bool> {
        let mut records = self.all().await;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            return Ok(false);
        }
        write_collection(&self.path, &records).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FailedMessageStore {
        FailedMessageStore::new(dir.path().join("failed.json"))
    }

    #[tokio::test]
    async fn add_then_remove_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let record = store
            .add("u1", "Alice", "tpl-1", "Welcome")
            .await
            .unwrap();
        assert_eq!(store.all().await.len(), 1);
        assert_eq!(store.get(&record.id).await.unwrap().recipient_id, "u1");

        assert!(store.remove(&record.id).await.unwrap());
        assert!(store.all().await.is_empty());
        assert!(store.get(&record.id).await.is_none());
    }

    #[tokio::test]
    async fn remove_unknown_id_reports_missing() {
        let dir = TempDir::new().unwrap();
        assert!(!store(&dir).remove("missing").await.unwrap());
    }

    #[tokio::test]
    async fn records_accumulate_in_insertion_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.add("u1", "Alice", "tpl-1", "Welcome").await.unwrap();
        store.add("g1", "Ops group", "tpl-1", "Welcome").await.unwrap();

        let all = store.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].recipient_id, "u1");
        assert_eq!(all[1].recipient_id, "g1");
    }
}
