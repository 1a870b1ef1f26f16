//! # Queue Consumer
//!
//! Pull-side transport adapter: polls a pgmq queue and feeds each message to
//! a [`DeliveryHandler`] as a push envelope, so handlers see the same input
//! whether they run behind HTTP push or this loop.
//!
//! Acknowledgement follows the error class of the handler result:
//! - success or duplicate: the message is deleted
//! - permanent failure: the message is archived and never redelivered
//! - transient failure: the message is left alone and reappears once its
//!   visibility timeout expires

use super::envelope;
use super::pgmq_bus::queue_name_for_topic;
use crate::agents::{DeliveryHandler, DeliveryOutcome};
use crate::error::{ErrorClass, KiorgaError, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const READ_SQL: &str =
    "SELECT msg_id, read_ct, enqueued_at, message FROM pgmq.read($1, $2, $3)";
const DELETE_SQL: &str = "SELECT pgmq.delete($1, $2)";
const ARCHIVE_SQL: &str = "SELECT pgmq.archive($1, $2)";

/// What happens to a queue message after its handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Delete,
    Archive,
    /// Leave in the queue for redelivery after the visibility timeout
    Retry,
}

/// Map a handler result to the queue action
pub fn disposition_for(result: &Result<DeliveryOutcome>) -> Disposition {
    match result {
        Ok(_) => Disposition::Delete,
        Err(err) => match err.class() {
            ErrorClass::Permanent => Disposition::Archive,
            ErrorClass::Transient => Disposition::Retry,
        },
    }
}

/// Polling parameters for one consumer
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Logical topic; mapped to its queue name
    pub topic: String,
    pub visibility_timeout_seconds: i32,
    pub batch_size: i32,
    pub poll_interval: Duration,
}

/// A message read from the queue
#[derive(Debug, Clone)]
struct QueueMessage {
    msg_id: i64,
    read_ct: i32,
    enqueued_at: DateTime<Utc>,
    message: Value,
}

pub struct QueueConsumer {
    pool: PgPool,
    queue: String,
    handler: Arc<dyn DeliveryHandler>,
    settings: ConsumerSettings,
}

impl std::fmt::Debug for QueueConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConsumer")
            .field("queue", &self.queue)
            .field("role", &self.handler.role())
            .field("settings", &self.settings)
            .finish()
    }
}

impl QueueConsumer {
    pub fn new(
        pool: PgPool,
        handler: Arc<dyn DeliveryHandler>,
        settings: ConsumerSettings,
    ) -> Result<Self> {
        let queue = queue_name_for_topic(&settings.topic)?;
        Ok(Self {
            pool,
            queue,
            handler,
            settings,
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Poll until `shutdown` flips to `true` or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            queue = %self.queue,
            role = %self.handler.role(),
            agent_id = %self.handler.agent_id(),
            "🚀 Queue consumer started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let handled = match self.poll_once().await {
                Ok(handled) => handled,
                Err(err) => {
                    warn!(queue = %self.queue, error = %err, "Queue poll failed");
                    0
                }
            };

            if handled == 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(queue = %self.queue, "🛑 Queue consumer stopped");
        Ok(())
    }

    /// Read one batch and handle its messages concurrently, returning the
    /// batch size
    pub async fn poll_once(&self) -> Result<usize> {
        let messages = self.read_batch().await?;
        let count = messages.len();
        if count > 0 {
            debug!(queue = %self.queue, count, "📨 Read messages");
        }

        let results = join_all(messages.into_iter().map(|message| self.handle(message))).await;
        results.into_iter().collect::<Result<Vec<()>>>()?;
        Ok(count)
    }

    async fn read_batch(&self) -> Result<Vec<QueueMessage>> {
        let rows = sqlx::query(READ_SQL)
            .bind(&self.queue)
            .bind(self.settings.visibility_timeout_seconds)
            .bind(self.settings.batch_size)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| KiorgaError::bus(&self.queue, format!("read failed: {e}")))?;

        rows.iter()
            .map(|row| -> Result<QueueMessage> {
                Ok(QueueMessage {
                    msg_id: row.try_get("msg_id")?,
                    read_ct: row.try_get("read_ct")?,
                    enqueued_at: row.try_get("enqueued_at")?,
                    message: row.try_get("message")?,
                })
            })
            .collect()
    }

    async fn handle(&self, message: QueueMessage) -> Result<()> {
        let payload = message.message.to_string();
        let envelope = envelope::wrap(
            &payload,
            Some(message.enqueued_at),
            Some(&message.msg_id.to_string()),
        );

        let result = self.handler.handle_delivery(&envelope).await;
        let disposition = disposition_for(&result);

        match (&result, disposition) {
            (Ok(outcome), _) => debug!(
                queue = %self.queue,
                msg_id = message.msg_id,
                outcome = ?outcome,
                "Message handled"
            ),
            (Err(err), Disposition::Archive) => error!(
                queue = %self.queue,
                msg_id = message.msg_id,
                error = %err,
                "Permanent failure, archiving message"
            ),
            (Err(err), _) => warn!(
                queue = %self.queue,
                msg_id = message.msg_id,
                read_count = message.read_ct,
                error = %err,
                "Transient failure, message will be redelivered"
            ),
        }

        match disposition {
            Disposition::Delete => self.acknowledge(DELETE_SQL, message.msg_id).await,
            Disposition::Archive => self.acknowledge(ARCHIVE_SQL, message.msg_id).await,
            Disposition::Retry => Ok(()),
        }
    }

    async fn acknowledge(&self, sql: &str, msg_id: i64) -> Result<()> {
        sqlx::query(sql)
            .bind(&self.queue)
            .bind(msg_id)
            .execute(&self.pool)
            .await
            .map_err(|e| KiorgaError::bus(&self.queue, format!("ack of {msg_id} failed: {e}")))?;
        Ok(())
    }
}
