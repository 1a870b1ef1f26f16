//! PostgreSQL document store.
//!
//! All collections share one JSONB table keyed by `(collection, document_id)`.
//! Merges use the JSONB concatenation operator, which overwrites top-level
//! keys and keeps the rest, matching [`WriteMode::Merge`]. Server timestamps
//! come from the database clock.

use super::{Document, DocumentStore, DocumentUpdate, WriteMode};
use crate::error::{KiorgaError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kiorga_documents (
    collection   TEXT        NOT NULL,
    document_id  TEXT        NOT NULL,
    data         JSONB       NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (collection, document_id)
)"#;

const CREATE_TASK_ID_INDEX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_kiorga_documents_task_id
    ON kiorga_documents (collection, (data->>'taskId'))"#;

const SELECT_SQL: &str =
    "SELECT data FROM kiorga_documents WHERE collection = $1 AND document_id = $2";

const REPLACE_SQL: &str = r#"
INSERT INTO kiorga_documents (collection, document_id, data)
VALUES ($1, $2, $3)
ON CONFLICT (collection, document_id)
DO UPDATE SET data = EXCLUDED.data, updated_at = now()"#;

const MERGE_SQL: &str = r#"
INSERT INTO kiorga_documents (collection, document_id, data)
VALUES ($1, $2, $3)
ON CONFLICT (collection, document_id)
DO UPDATE SET data = kiorga_documents.data || EXCLUDED.data, updated_at = now()"#;

const UPDATE_SQL: &str = r#"
UPDATE kiorga_documents
SET data = data || $3 || COALESCE(
        (SELECT jsonb_object_agg(
                    field,
                    to_jsonb(to_char(now() AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.US"Z"')))
         FROM unnest($4::text[]) AS field),
        '{}'::jsonb),
    updated_at = now()
WHERE collection = $1 AND document_id = $2"#;

const FIND_BY_FIELD_SQL: &str = r#"
SELECT data FROM kiorga_documents
WHERE collection = $1 AND data -> $2 = $3
LIMIT $4"#;

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Connect with a fresh pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting document store to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self::with_pool(pool))
    }

    /// Use an existing pool (shared with the message bus)
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the documents table and index if they are missing
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        sqlx::query(CREATE_TASK_ID_INDEX_SQL)
            .execute(&self.pool)
            .await?;
        info!("Document store schema ready");
        Ok(())
    }
}

fn row_document(row: &sqlx::postgres::PgRow) -> Result<Document> {
    let data: Value = row.try_get("data")?;
    match data {
        Value::Object(map) => Ok(map),
        other => Err(KiorgaError::store(
            "decode",
            format!("stored document is not an object: {other}"),
        )),
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(SELECT_SQL)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_document).transpose()
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        document: Document,
        mode: WriteMode,
    ) -> Result<()> {
        let sql = match mode {
            WriteMode::Replace => REPLACE_SQL,
            WriteMode::Merge => MERGE_SQL,
        };
        sqlx::query(sql)
            .bind(collection)
            .bind(id)
            .bind(Value::Object(document))
            .execute(&self.pool)
            .await?;

        debug!(collection = %collection, document_id = %id, mode = ?mode, "Document written");
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, update: DocumentUpdate) -> Result<()> {
        let result = sqlx::query(UPDATE_SQL)
            .bind(collection)
            .bind(id)
            .bind(Value::Object(update.literal_fields()))
            .bind(update.server_timestamp_fields())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(KiorgaError::store(
                "update",
                format!("document {collection}/{id} not found"),
            ));
        }

        debug!(collection = %collection, document_id = %id, "Document updated");
        Ok(())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(FIND_BY_FIELD_SQL)
            .bind(collection)
            .bind(field)
            .bind(value)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_document).collect()
    }
}
