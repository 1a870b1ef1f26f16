//! # Error Types
//!
//! Structured error handling for the delegation pipeline using thiserror.
//!
//! Every failure a handler can hit falls into one of four kinds. The kind
//! decides whether the transport should redeliver the message:
//!
//! | Kind                | Class     | HTTP |
//! |---------------------|-----------|------|
//! | `MalformedEnvelope` | permanent | 400  |
//! | `Validation`        | permanent | 400  |
//! | `Dependency`        | transient | 500  |
//! | `Unexpected`        | transient | 500  |

use crate::validation::FieldError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while handling a delivery
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KiorgaError {
    #[error("Malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    #[error("Validation failed: {}", FieldError::join(.errors))]
    Validation { errors: Vec<FieldError> },

    #[error("Dependency error: {component}: {operation}: {message}")]
    Dependency {
        component: DependencyComponent,
        operation: String,
        message: String,
    },

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

/// External collaborator that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyComponent {
    DocumentStore,
    MessageBus,
}

impl fmt::Display for DependencyComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DocumentStore => write!(f, "document_store"),
            Self::MessageBus => write!(f, "message_bus"),
        }
    }
}

/// Error kinds of the delivery taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedEnvelope,
    Validation,
    Dependency,
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedEnvelope => write!(f, "malformed_envelope"),
            Self::Validation => write!(f, "validation"),
            Self::Dependency => write!(f, "dependency"),
            Self::Unexpected => write!(f, "unexpected"),
        }
    }
}

/// Whether a failed delivery may succeed when redelivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Will never succeed; the message must not be redelivered
    Permanent,
    /// May succeed on redelivery
    Transient,
}

impl KiorgaError {
    /// Create a malformed envelope error
    pub fn malformed_envelope(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    /// Create a validation error from the collected field errors
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation { errors }
    }

    /// Create a document store error
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dependency {
            component: DependencyComponent::DocumentStore,
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a message bus error for a topic
    pub fn bus(topic: impl AsRef<str>, message: impl Into<String>) -> Self {
        Self::Dependency {
            component: DependencyComponent::MessageBus,
            operation: format!("publish:{}", topic.as_ref()),
            message: message.into(),
        }
    }

    /// Create a publish confirmation timeout error
    pub fn publish_timeout(topic: impl AsRef<str>, timeout_seconds: u64) -> Self {
        Self::Dependency {
            component: DependencyComponent::MessageBus,
            operation: format!("publish:{}", topic.as_ref()),
            message: format!("confirmation timed out after {timeout_seconds}s"),
        }
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedEnvelope { .. } => ErrorKind::MalformedEnvelope,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Dependency { .. } => ErrorKind::Dependency,
            Self::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self.kind() {
            ErrorKind::MalformedEnvelope | ErrorKind::Validation => ErrorClass::Permanent,
            ErrorKind::Dependency | ErrorKind::Unexpected => ErrorClass::Transient,
        }
    }

    /// Transient errors must reach the transport so the bus redelivers
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Conversion from sqlx::Error, used by the PostgreSQL backends
impl From<sqlx::Error> for KiorgaError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => KiorgaError::store("query", "No rows found"),
            sqlx::Error::PoolTimedOut => KiorgaError::store("pool", "Connection pool timed out"),
            sqlx::Error::PoolClosed => KiorgaError::store("pool", "Connection pool is closed"),
            sqlx::Error::Database(db_err) => KiorgaError::store("database", db_err.to_string()),
            other => KiorgaError::store("connection", other.to_string()),
        }
    }
}

/// Serialization of our own types should never fail, so anything that does
/// is reported as unexpected rather than blamed on the sender.
impl From<serde_json::Error> for KiorgaError {
    fn from(err: serde_json::Error) -> Self {
        KiorgaError::unexpected(format!("JSON serialization failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, KiorgaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            KiorgaError::malformed_envelope("missing data").class(),
            ErrorClass::Permanent
        );
        assert_eq!(
            KiorgaError::validation(vec![FieldError::new("title", "missing")]).class(),
            ErrorClass::Permanent
        );
        assert!(KiorgaError::store("get", "unavailable").is_retryable());
        assert!(KiorgaError::bus("sda-be-tasks", "rejected").is_retryable());
        assert!(KiorgaError::unexpected("boom").is_retryable());
        assert!(!KiorgaError::malformed_envelope("bad base64").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = KiorgaError::validation(vec![
            FieldError::new("task_id", "is missing"),
            FieldError::new("title", "is missing or blank"),
        ]);
        let display = err.to_string();
        assert!(display.contains("task_id: is missing"));
        assert!(display.contains("title: is missing or blank"));

        let timeout = KiorgaError::publish_timeout("reports", 30);
        assert_eq!(timeout.kind(), ErrorKind::Dependency);
        assert!(timeout.to_string().contains("publish:reports"));
        assert!(timeout.to_string().contains("30s"));
    }

    #[test]
    fn test_sqlx_conversion_is_transient() {
        let err: KiorgaError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(
            err,
            KiorgaError::Dependency {
                component: DependencyComponent::DocumentStore,
                ..
            }
        ));
        assert!(err.is_retryable());
    }
}
