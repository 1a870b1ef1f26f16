//! # Document Store Facade
//!
//! Key/value document interface the delegation core depends on. Documents
//! are flat JSON objects addressed by `(collection, id)`. Every operation is
//! atomic for a single document; nothing spans documents, so idempotency is
//! enforced through witness fields rather than transactions.
//!
//! Backends:
//! - [`InMemoryDocumentStore`] for local runs and tests
//! - [`PostgresDocumentStore`] for deployments (JSONB rows via sqlx)

pub mod memory;
pub mod postgres;

pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

use crate::error::{KiorgaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// A stored document: a flat JSON object
pub type Document = Map<String, Value>;

/// How `set` treats an existing document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole document
    Replace,
    /// Overwrite only the top-level fields present in the new document
    Merge,
}

/// Value assigned to a field by [`DocumentUpdate`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Resolved by the store to its own clock at write time
    ServerTimestamp,
}

/// Partial update applied to an existing document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    fields: Vec<(String, FieldValue)>,
}

impl DocumentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), FieldValue::Value(value.into())));
        self
    }

    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldValue::ServerTimestamp));
        self
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Literal field values, without the server timestamps
    pub fn literal_fields(&self) -> Document {
        self.fields
            .iter()
            .filter_map(|(field, value)| match value {
                FieldValue::Value(v) => Some((field.clone(), v.clone())),
                FieldValue::ServerTimestamp => None,
            })
            .collect()
    }

    /// Names of the fields stamped with server time
    pub fn server_timestamp_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, value)| matches!(value, FieldValue::ServerTimestamp))
            .map(|(field, _)| field.clone())
            .collect()
    }

    /// Resolve every field against the given clock reading
    pub fn resolve(&self, now: DateTime<Utc>) -> Document {
        self.fields
            .iter()
            .map(|(field, value)| {
                let resolved = match value {
                    FieldValue::Value(v) => v.clone(),
                    FieldValue::ServerTimestamp => Value::String(format_timestamp(now)),
                };
                (field.clone(), resolved)
            })
            .collect()
    }
}

/// Document store operations used by the dispatcher and the worker
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document by id
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Create or overwrite a document
    async fn set(&self, collection: &str, id: &str, document: Document, mode: WriteMode)
        -> Result<()>;

    /// Apply a partial update; fails when the document does not exist
    async fn update(&self, collection: &str, id: &str, update: DocumentUpdate) -> Result<()>;

    /// Documents whose top-level `field` equals `value`, at most `limit`
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>>;
}

/// Render a timestamp the way the wire schema stores it
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Convert a domain object into a storable document
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(KiorgaError::unexpected(format!(
            "expected a JSON object document, got {other}"
        ))),
    }
}

/// Read a stored document back into a domain object
pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T> {
    serde_json::from_value(Value::Object(document)).map_err(|e| {
        KiorgaError::store("decode", format!("stored document does not match schema: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_update_resolves_server_timestamp() {
        let update = DocumentUpdate::new()
            .set("status", "TASK_STATUS_IN_PROGRESS")
            .server_timestamp("updatedAt");
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();

        let resolved = update.resolve(now);
        assert_eq!(resolved["status"], json!("TASK_STATUS_IN_PROGRESS"));
        assert_eq!(resolved["updatedAt"], json!("2025-06-01T10:00:00Z"));
        assert_eq!(update.server_timestamp_fields(), vec!["updatedAt".to_string()]);
        assert!(!update.literal_fields().contains_key("updatedAt"));
    }

    #[test]
    fn test_to_document_requires_object() {
        assert!(to_document(&json!({"a": 1})).is_ok());
        assert!(to_document(&json!([1, 2])).is_err());
    }
}
