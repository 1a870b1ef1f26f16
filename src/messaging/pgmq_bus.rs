//! # pgmq Message Bus
//!
//! Publishes to PostgreSQL message queues (pgmq) through its SQL functions.
//! Each logical topic maps to one queue; see [`queue_name_for_topic`].

use super::bus::MessageBus;
use crate::error::{KiorgaError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info};

/// Longest queue name pgmq accepts (its table names carry a prefix)
const MAX_QUEUE_NAME_LENGTH: usize = 47;

/// Map a logical topic to a pgmq queue name.
///
/// pgmq queue names become table names, so everything outside
/// `[a-z0-9_]` is replaced with `_`.
pub fn queue_name_for_topic(topic: &str) -> Result<String> {
    let name: String = topic
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() || name.len() > MAX_QUEUE_NAME_LENGTH {
        return Err(KiorgaError::bus(
            topic,
            format!("cannot map topic to a queue name of 1..={MAX_QUEUE_NAME_LENGTH} characters"),
        ));
    }
    Ok(name)
}

#[derive(Debug, Clone)]
pub struct PgmqMessageBus {
    pool: PgPool,
}

impl PgmqMessageBus {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the queue behind a topic if it does not exist yet
    pub async fn ensure_topic(&self, topic: &str) -> Result<()> {
        let queue = queue_name_for_topic(topic)?;
        sqlx::query("SELECT pgmq.create($1)")
            .bind(&queue)
            .execute(&self.pool)
            .await
            .map_err(|e| KiorgaError::bus(topic, format!("failed to create queue {queue}: {e}")))?;

        info!(topic = %topic, queue = %queue, "Queue ready");
        Ok(())
    }
}

#[async_trait]
impl MessageBus for PgmqMessageBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<String> {
        let queue = queue_name_for_topic(topic)?;
        let message: Value = serde_json::from_str(payload).map_err(|e| {
            KiorgaError::unexpected(format!("refusing to publish non-JSON payload: {e}"))
        })?;

        debug!(topic = %topic, queue = %queue, "Sending message to queue");

        let message_id: i64 = sqlx::query_scalar("SELECT * FROM pgmq.send($1, $2)")
            .bind(&queue)
            .bind(&message)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| KiorgaError::bus(topic, e.to_string()))?;

        Ok(message_id.to_string())
    }
}
