//! # Push Delivery Handler
//!
//! `POST /` receives one push envelope and hands it to the agent.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::ErrorClass;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

const NO_MESSAGE: &str = "no Pub/Sub message received";

/// Receive a push envelope: POST /
///
/// Answers 204 for processed and duplicate deliveries alike.
pub async fn receive_push(State(state): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let envelope = parse_body(&body)?;

    match state.handler.handle_delivery(&envelope).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(err) => {
            match err.class() {
                ErrorClass::Permanent => warn!(error = %err, "Bad request while processing delivery"),
                ErrorClass::Transient => error!(error = %err, "Delivery failed, requesting redelivery"),
            }
            Err(err.into())
        }
    }
}

/// An empty, `null` or `{}` body carries no message
fn parse_body(body: &Bytes) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        error!("{}", NO_MESSAGE);
        return Err(ApiError::bad_request(NO_MESSAGE));
    }

    let envelope: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("request body is not JSON: {e}")))?;

    let is_empty = match &envelope {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if is_empty {
        error!("{}", NO_MESSAGE);
        return Err(ApiError::bad_request(NO_MESSAGE));
    }
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bodies_are_rejected() {
        for body in ["", "  ", "null", "{}", "[]"] {
            let err = parse_body(&Bytes::from(body)).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "body {body:?}");
        }
    }

    #[test]
    fn test_non_json_body_is_rejected() {
        let err = parse_body(&Bytes::from("not json")).unwrap_err();
        assert!(err.to_string().contains("not JSON"));
    }

    #[test]
    fn test_envelope_passes_through() {
        let envelope = parse_body(&Bytes::from(r#"{"message":{"data":"e30="}}"#)).unwrap();
        assert_eq!(envelope["message"]["data"], "e30=");
    }
}
