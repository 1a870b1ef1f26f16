//! # Push Envelope Codec
//!
//! Inbound deliveries arrive wrapped in a push envelope:
//!
//! ```json
//! { "message": { "data": "<base64 JSON>", "publish_time": "2025-06-01T10:00:00Z" } }
//! ```
//!
//! [`decode`] unwraps it into the raw JSON payload plus the publish
//! timestamp; [`encode`] renders an outgoing domain object as payload text;
//! [`wrap`] builds an envelope around a payload (used by the queue consumer
//! and the producer tool). Nothing here performs I/O.

use crate::error::{KiorgaError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;

/// Payload and delivery metadata extracted from a push envelope
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Decoded UTF-8 payload text
    pub payload: String,
    /// Publish time as fractional Unix seconds, or receipt time when unknown
    pub publish_timestamp: f64,
    /// Transport message id, when the envelope carries one
    pub message_id: Option<String>,
}

impl DecodedMessage {
    /// Seconds between publication and now; never negative
    pub fn receive_latency_seconds(&self) -> f64 {
        (unix_seconds(Utc::now()) - self.publish_timestamp).max(0.0)
    }
}

/// Unwrap a push envelope.
///
/// Fails with `MalformedEnvelope` when the envelope is not an object, lacks
/// `message` or `message.data`, or the data is not base64-encoded UTF-8. A
/// missing or unparseable publish time never fails the call.
pub fn decode(envelope: &Value) -> Result<DecodedMessage> {
    let message = envelope
        .as_object()
        .and_then(|outer| outer.get("message"))
        .ok_or_else(|| KiorgaError::malformed_envelope("invalid Pub/Sub message format"))?;

    let message = message
        .as_object()
        .ok_or_else(|| KiorgaError::malformed_envelope("invalid Pub/Sub message format"))?;

    let data = message
        .get("data")
        .ok_or_else(|| KiorgaError::malformed_envelope("Pub/Sub message missing 'data' field"))?
        .as_str()
        .ok_or_else(|| KiorgaError::malformed_envelope("Pub/Sub 'data' field is not a string"))?;

    let publish_timestamp = publish_timestamp(message);

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| KiorgaError::malformed_envelope(format!("base64 decode error: {e}")))?;
    let payload = String::from_utf8(bytes)
        .map_err(|e| KiorgaError::malformed_envelope(format!("payload is not UTF-8: {e}")))?;

    let message_id = message
        .get("message_id")
        .or_else(|| message.get("messageId"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(DecodedMessage {
        payload,
        publish_timestamp,
        message_id,
    })
}

/// Render a domain object as canonical JSON payload text
pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Build a push envelope around a payload
pub fn wrap(
    payload: &str,
    publish_time: Option<DateTime<Utc>>,
    message_id: Option<&str>,
) -> Value {
    let mut message = Map::new();
    message.insert("data".to_string(), json!(STANDARD.encode(payload)));
    if let Some(published) = publish_time {
        message.insert(
            "publish_time".to_string(),
            json!(published.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)),
        );
    }
    if let Some(id) = message_id {
        message.insert("message_id".to_string(), json!(id));
    }
    json!({ "message": Value::Object(message) })
}

fn publish_timestamp(message: &Map<String, Value>) -> f64 {
    let raw = message
        .get("publish_time")
        .or_else(|| message.get("publishTime"))
        .and_then(Value::as_str);

    match raw {
        Some(text) => match DateTime::parse_from_rfc3339(text) {
            Ok(parsed) => unix_seconds(parsed.with_timezone(&Utc)),
            Err(e) => {
                warn!(publish_time = %text, error = %e, "Could not parse publish_time, using receipt time");
                unix_seconds(Utc::now())
            }
        },
        None => unix_seconds(Utc::now()),
    }
}

fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}
