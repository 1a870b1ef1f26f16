//! In-memory document store backed by a concurrent map.
//!
//! Each operation holds the map shard lock for exactly one document, which
//! gives the same single-document atomicity a real store offers and no more.

use super::{Document, DocumentStore, DocumentUpdate, WriteMode};
use crate::error::{KiorgaError, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

type DocumentKey = (String, String);

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: DashMap<DocumentKey, Document>,
    writes: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` and `update` calls
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of documents stored in a collection
    pub fn document_count(&self, collection: &str) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .count()
    }

    /// Snapshot of all documents in a collection
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn key(collection: &str, id: &str) -> DocumentKey {
        (collection.to_string(), id.to_string())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .documents
            .get(&Self::key(collection, id))
            .map(|entry| entry.value().clone()))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        document: Document,
        mode: WriteMode,
    ) -> Result<()> {
        let mut entry = self.documents.entry(Self::key(collection, id)).or_default();
        match mode {
            WriteMode::Replace => *entry = document,
            WriteMode::Merge => entry.extend(document),
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, update: DocumentUpdate) -> Result<()> {
        let mut entry = self
            .documents
            .get_mut(&Self::key(collection, id))
            .ok_or_else(|| {
                KiorgaError::store("update", format!("document {collection}/{id} not found"))
            })?;
        entry.extend(update.resolve(Utc::now()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .filter(|entry| entry.value().get(field) == Some(value))
            .take(limit)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_merge_preserves_absent_fields() {
        let store = InMemoryDocumentStore::new();
        store
            .set("tasks", "t-1", doc(json!({"title": "a", "assignedToAgentId": "sda"})), WriteMode::Replace)
            .await
            .unwrap();
        store
            .set("tasks", "t-1", doc(json!({"title": "b"})), WriteMode::Merge)
            .await
            .unwrap();

        let stored = store.get("tasks", "t-1").await.unwrap().unwrap();
        assert_eq!(stored["title"], "b");
        assert_eq!(stored["assignedToAgentId"], "sda");
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_replace_drops_absent_fields() {
        let store = InMemoryDocumentStore::new();
        store
            .set("tasks", "t-1", doc(json!({"title": "a", "extra": true})), WriteMode::Replace)
            .await
            .unwrap();
        store
            .set("tasks", "t-1", doc(json!({"title": "b"})), WriteMode::Replace)
            .await
            .unwrap();

        let stored = store.get("tasks", "t-1").await.unwrap().unwrap();
        assert!(stored.get("extra").is_none());
    }

    #[tokio::test]
    async fn test_update_requires_existing_document() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .update("tasks", "missing", DocumentUpdate::new().set("status", 2))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.write_count(), 0);
        assert!(store.get("tasks", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_stamps_server_time() {
        let store = InMemoryDocumentStore::new();
        store
            .set("tasks", "t-1", doc(json!({"status": "TASK_STATUS_PENDING"})), WriteMode::Replace)
            .await
            .unwrap();
        store
            .update(
                "tasks",
                "t-1",
                DocumentUpdate::new()
                    .set("status", "TASK_STATUS_IN_PROGRESS")
                    .server_timestamp("updatedAt"),
            )
            .await
            .unwrap();

        let stored = store.get("tasks", "t-1").await.unwrap().unwrap();
        assert_eq!(stored["status"], "TASK_STATUS_IN_PROGRESS");
        assert!(stored["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_find_by_field_scopes_to_collection_and_limit() {
        let store = InMemoryDocumentStore::new();
        for id in ["r-1", "r-2", "r-3"] {
            store
                .set("final_reports", id, doc(json!({"taskId": "t-1"})), WriteMode::Replace)
                .await
                .unwrap();
        }
        store
            .set("tasks", "t-1", doc(json!({"taskId": "t-1"})), WriteMode::Replace)
            .await
            .unwrap();

        let hits = store
            .find_by_field("final_reports", "taskId", &json!("t-1"), 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let all = store
            .find_by_field("final_reports", "taskId", &json!("t-1"), 10)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let none = store
            .find_by_field("final_reports", "taskId", &json!("t-2"), 10)
            .await
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(store.document_count("final_reports"), 3);
    }
}
