//! Input validation for inbound tasks
//!
//! Validation collects every defect instead of stopping at the first one. A
//! producer on the other side of a message bus cannot fix fields one round
//! trip at a time, so it gets the complete list in a single rejection.

use crate::error::{KiorgaError, Result};
use crate::models::Task;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Render a list of errors as one line for logs and error messages
    pub fn join(errors: &[FieldError]) -> String {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check the required fields and enum domains of a task.
///
/// Returns an empty list for a valid task. `UNSPECIFIED` status and priority
/// are valid: they are the unset defaults, not errors.
pub fn validate_task(task: &Task) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if task.task_id.is_empty() {
        errors.push(FieldError::new("task_id", "is missing"));
    }
    if task.title.trim().is_empty() {
        errors.push(FieldError::new("title", "is missing or blank"));
    }
    if task.description.trim().is_empty() {
        errors.push(FieldError::new("description", "is missing or blank"));
    }
    if !task.status.is_declared() {
        errors.push(FieldError::new(
            "status",
            format!("is not a valid task status: {}", task.status),
        ));
    }
    if !task.priority.is_declared() {
        errors.push(FieldError::new(
            "priority",
            format!("is not a valid task priority: {}", task.priority),
        ));
    }
    if task.creator_agent_id.is_empty() {
        errors.push(FieldError::new("creator_agent_id", "is missing"));
    }
    if task.created_at_seconds() == 0 {
        errors.push(FieldError::new("created_at", "is missing or zero"));
    }

    errors
}

/// Parse a decoded payload into a task, validating it when asked.
///
/// An unparseable payload is a malformed envelope; a parseable but invalid
/// task is a validation error carrying every field defect.
pub fn parse_and_validate_task(payload: &str, validate: bool) -> Result<Task> {
    let task: Task = serde_json::from_str(payload).map_err(|e| {
        KiorgaError::malformed_envelope(format!("payload is not a valid task document: {e}"))
    })?;

    if validate {
        let errors = validate_task(&task);
        if !errors.is_empty() {
            return Err(KiorgaError::validation(errors));
        }
    }

    Ok(task)
}
