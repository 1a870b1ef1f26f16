//! # Message Bus Facade
//!
//! The delegation core only ever publishes; consumption is the transport
//! adapter's job. A publish either returns the broker's message id as
//! delivery confirmation or fails.

use crate::error::{KiorgaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Publish side of an at-least-once message bus
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a JSON payload to a logical topic, returning the message id
    async fn publish(&self, topic: &str, payload: &str) -> Result<String>;
}

/// Publish and wait for the broker's confirmation, bounded by `timeout`.
///
/// An expired wait is reported as a dependency failure even though the
/// message may still reach the topic; redelivery then relies on the
/// downstream idempotency checks.
pub async fn publish_with_confirmation(
    bus: &dyn MessageBus,
    topic: &str,
    payload: &str,
    timeout: Duration,
) -> Result<String> {
    debug!(topic = %topic, bytes = payload.len(), "Publishing message");

    let message_id = tokio::time::timeout(timeout, bus.publish(topic, payload))
        .await
        .map_err(|_| KiorgaError::publish_timeout(topic, timeout.as_secs()))??;

    info!(topic = %topic, message_id = %message_id, "Message published");
    Ok(message_id)
}

/// A message captured by [`InMemoryMessageBus`]
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub message_id: String,
    pub topic: String,
    pub payload: String,
    pub published_at: DateTime<Utc>,
}

/// Process-local bus that records every publish.
///
/// Used for local runs without a broker and as the wiring between the
/// dispatcher and the worker in pipeline tests.
#[derive(Debug, Default)]
pub struct InMemoryMessageBus {
    messages: Mutex<Vec<PublishedMessage>>,
    next_id: AtomicU64,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message published so far, in publish order
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.messages.lock().clone()
    }

    /// Messages published to one topic, in publish order
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Remove and return the messages pending on a topic
    pub fn drain(&self, topic: &str) -> Vec<PublishedMessage> {
        let mut messages = self.messages.lock();
        let (drained, kept): (Vec<_>, Vec<_>) =
            messages.drain(..).partition(|m| m.topic == topic);
        *messages = kept;
        drained
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<String> {
        let message_id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        self.messages.lock().push(PublishedMessage {
            message_id: message_id.clone(),
            topic: topic.to_string(),
            payload: payload.to_string(),
            published_at: Utc::now(),
        });
        Ok(message_id)
    }
}
